//! Two-step parse strategy with explicit format fallback.
//!
//! Attempt A is the detected format. A delimited attempt that fails on the
//! binary-content error class earns exactly one spreadsheet retry; any other
//! failure is terminal. When both attempts fail the caller gets a single
//! `ParseFailure` and zero partial rows.

use tracing::debug;

use super::detect::{FileFormat, detect_format};
use super::error::TradeportError;
use super::table::{RawTable, UploadedFile};
use crate::ports::table_reader::{ReadError, TableReader};

pub struct ParseStrategy<'a> {
    delimited: &'a dyn TableReader,
    spreadsheet: &'a dyn TableReader,
}

impl<'a> ParseStrategy<'a> {
    pub fn new(delimited: &'a dyn TableReader, spreadsheet: &'a dyn TableReader) -> Self {
        Self {
            delimited,
            spreadsheet,
        }
    }

    pub fn parse(&self, file: &UploadedFile) -> Result<RawTable, TradeportError> {
        match detect_format(&file.bytes) {
            FileFormat::Spreadsheet => self
                .spreadsheet
                .read(&file.bytes)
                .map_err(|e| parse_failure(&file.name, e)),
            FileFormat::Delimited => match self.delimited.read(&file.bytes) {
                Ok(table) => Ok(table),
                Err(ReadError::BinaryContent) => {
                    debug!(
                        file = %file.name,
                        "delimited parse hit binary content, retrying as spreadsheet"
                    );
                    self.spreadsheet
                        .read(&file.bytes)
                        .map_err(|e| parse_failure(&file.name, e))
                }
                Err(e) => Err(parse_failure(&file.name, e)),
            },
        }
    }
}

fn parse_failure(name: &str, err: ReadError) -> TradeportError {
    TradeportError::ParseFailure {
        reason: format!("{name}: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct StubReader {
        result: fn() -> Result<RawTable, ReadError>,
        calls: Cell<usize>,
    }

    impl StubReader {
        fn new(result: fn() -> Result<RawTable, ReadError>) -> Self {
            Self {
                result,
                calls: Cell::new(0),
            }
        }
    }

    impl TableReader for StubReader {
        fn read(&self, _bytes: &[u8]) -> Result<RawTable, ReadError> {
            self.calls.set(self.calls.get() + 1);
            (self.result)()
        }
    }

    fn one_row_table() -> Result<RawTable, ReadError> {
        Ok(RawTable::new(vec!["Symbol".into()], vec![Default::default()]))
    }

    fn text_file() -> UploadedFile {
        UploadedFile::new("trades.csv", b"Symbol\nBTC\n".to_vec())
    }

    fn workbook_file() -> UploadedFile {
        UploadedFile::new("trades.csv", vec![0x50, 0x4B, 0x03, 0x04, 1, 2, 3])
    }

    #[test]
    fn text_content_goes_to_the_delimited_reader() {
        let delimited = StubReader::new(one_row_table);
        let spreadsheet = StubReader::new(|| {
            Err(ReadError::Empty {
                reason: "unused".into(),
            })
        });

        let strategy = ParseStrategy::new(&delimited, &spreadsheet);
        strategy.parse(&text_file()).unwrap();

        assert_eq!(delimited.calls.get(), 1);
        assert_eq!(spreadsheet.calls.get(), 0);
    }

    #[test]
    fn workbook_magic_skips_the_delimited_reader() {
        let delimited = StubReader::new(one_row_table);
        let spreadsheet = StubReader::new(one_row_table);

        let strategy = ParseStrategy::new(&delimited, &spreadsheet);
        strategy.parse(&workbook_file()).unwrap();

        assert_eq!(delimited.calls.get(), 0);
        assert_eq!(spreadsheet.calls.get(), 1);
    }

    #[test]
    fn binary_content_error_earns_one_spreadsheet_retry() {
        let delimited = StubReader::new(|| Err(ReadError::BinaryContent));
        let spreadsheet = StubReader::new(one_row_table);

        let strategy = ParseStrategy::new(&delimited, &spreadsheet);
        strategy.parse(&text_file()).unwrap();

        assert_eq!(delimited.calls.get(), 1);
        assert_eq!(spreadsheet.calls.get(), 1);
    }

    #[test]
    fn malformed_delimited_text_fails_without_retry() {
        let delimited = StubReader::new(|| {
            Err(ReadError::Malformed {
                errors: vec!["row 3: wrong field count".into()],
            })
        });
        let spreadsheet = StubReader::new(one_row_table);

        let strategy = ParseStrategy::new(&delimited, &spreadsheet);
        let err = strategy.parse(&text_file()).unwrap_err();

        assert!(matches!(err, TradeportError::ParseFailure { .. }));
        assert_eq!(spreadsheet.calls.get(), 0);
    }

    #[test]
    fn both_attempts_failing_is_a_single_parse_failure() {
        let delimited = StubReader::new(|| Err(ReadError::BinaryContent));
        let spreadsheet = StubReader::new(|| {
            Err(ReadError::Empty {
                reason: "no worksheet".into(),
            })
        });

        let strategy = ParseStrategy::new(&delimited, &spreadsheet);
        let err = strategy.parse(&text_file()).unwrap_err();

        assert!(matches!(err, TradeportError::ParseFailure { .. }));
        assert_eq!(err.stage(), "parse");
    }
}
