//! Byte-level table decoding port.
//!
//! The concrete delimited/spreadsheet decoding is an external library
//! contract: `read(bytes) -> RawTable | error`. The pipeline owns no wire
//! format of its own.

use crate::domain::table::RawTable;

/// Error classes a reader can report.
///
/// `BinaryContent` is the class that triggers the single
/// delimited-to-spreadsheet fallback retry; the other classes fail the
/// attempt outright.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("content is not delimited text")]
    BinaryContent,

    #[error("no usable table found: {reason}")]
    Empty { reason: String },

    #[error("malformed table: {}", errors.join("; "))]
    Malformed { errors: Vec<String> },
}

pub trait TableReader {
    fn read(&self, bytes: &[u8]) -> Result<RawTable, ReadError>;
}
