//! Source readers
//!
//! Turn the two raw files into [`RawTable`](crate::table::RawTable)s. The
//! registry is a delimited export in a legacy single-byte encoding; the price
//! table is a spreadsheet whose header row sits under a free-form preamble.

mod header;
mod price;
mod registry;

pub use header::{HeaderLocator, HeaderScan};
pub use price::{PriceReadOptions, read_price};
pub use registry::{encoding_for_label, read_registry};
