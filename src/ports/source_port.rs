//! Raw source access port trait.

use crate::domain::error::PricecastError;
use crate::domain::normalizer::SourceKind;
use crate::domain::table::RawTable;

pub trait SourcePort {
    /// The raw table for `kind`, or `None` when the source does not exist.
    fn read_table(&self, kind: SourceKind) -> Result<Option<RawTable>, PricecastError>;

    /// Human-readable location of `kind`, for messages.
    fn describe(&self, kind: SourceKind) -> String;
}
