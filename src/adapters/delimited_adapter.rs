//! Delimited text adapter over the `csv` crate.
//!
//! Handles the mess real broker exports ship with: sniffed delimiters,
//! preamble lines before the header, blank lines between records, and quoted
//! fields. Non-text bytes are reported as `BinaryContent` so the parse
//! strategy can retry the file as a spreadsheet.

use csv::ReaderBuilder;
use tracing::debug;

use crate::domain::table::{RawTable, unique_headers};
use crate::ports::table_reader::{ReadError, TableReader};

/// How many leading rows are scanned for the header before giving up.
const HEADER_SCAN_ROWS: usize = 10;

#[derive(Debug, Default)]
pub struct DelimitedAdapter;

impl DelimitedAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl TableReader for DelimitedAdapter {
    fn read(&self, bytes: &[u8]) -> Result<RawTable, ReadError> {
        let text = std::str::from_utf8(bytes).map_err(|_| ReadError::BinaryContent)?;
        if text.contains('\0') {
            return Err(ReadError::BinaryContent);
        }
        if text.trim().is_empty() {
            return Err(ReadError::Empty {
                reason: "file is empty".into(),
            });
        }

        let delimiter = sniff_delimiter(text);
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter as u8)
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let mut records: Vec<Vec<String>> = Vec::new();
        let mut errors: Vec<String> = Vec::new();
        for (i, result) in reader.records().enumerate() {
            match result {
                Ok(record) => records.push(record.iter().map(str::to_string).collect()),
                Err(e) => errors.push(format!("row {}: {}", i + 1, e)),
            }
        }

        if records.is_empty() {
            if errors.is_empty() {
                return Err(ReadError::Empty {
                    reason: "no rows".into(),
                });
            }
            return Err(ReadError::Malformed { errors });
        }
        if !errors.is_empty() {
            debug!(skipped = errors.len(), "skipped malformed rows");
        }

        let header_idx = infer_header_row(&records).ok_or_else(|| ReadError::Malformed {
            errors: vec!["no header row found".into()],
        })?;
        let headers = unique_headers(records[header_idx].clone());

        let rows = records
            .into_iter()
            .skip(header_idx + 1)
            .filter(|record| record.iter().any(|cell| !cell.is_empty()))
            .map(|record| {
                headers
                    .iter()
                    .cloned()
                    .zip(record.into_iter().chain(std::iter::repeat(String::new())))
                    .collect()
            })
            .collect();

        Ok(RawTable::new(headers, rows))
    }
}

/// Most frequent of `, ; \t |` across the leading lines; comma by default.
/// Scanning more than one line keeps preamble text ahead of a semicolon
/// header from deciding the delimiter.
fn sniff_delimiter(text: &str) -> char {
    let mut best = (',', 0usize);
    for line in text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(HEADER_SCAN_ROWS)
    {
        for delimiter in [',', ';', '\t', '|'] {
            let count = line.matches(delimiter).count();
            if count > best.1 {
                best = (delimiter, count);
            }
        }
    }
    best.0
}

/// First row that looks like a header: at least two populated cells, none of
/// which reads as a number. Rows before it are preamble and get skipped.
fn infer_header_row(records: &[Vec<String>]) -> Option<usize> {
    records
        .iter()
        .take(HEADER_SCAN_ROWS)
        .position(|record| {
            let populated = record.iter().filter(|cell| !cell.is_empty()).count();
            populated >= 2 && !record.iter().any(|cell| looks_numeric(cell))
        })
}

/// True when a cell parses as a number once currency noise is removed.
fn looks_numeric(cell: &str) -> bool {
    let cleaned: String = cell
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | ',' | ' '))
        .collect();
    !cleaned.is_empty() && cleaned.parse::<f64>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(content: &str) -> RawTable {
        DelimitedAdapter::new().read(content.as_bytes()).unwrap()
    }

    #[test]
    fn parses_comma_delimited_with_header() {
        let table = read(
            "Date,Symbol,Side,Entry,Exit,Qty\n\
             2024-01-01,BTCUSDT,Buy,100,110,2\n\
             2024-01-02,ETHUSDT,Sell,50,40,3\n",
        );

        assert_eq!(
            table.headers,
            vec!["Date", "Symbol", "Side", "Entry", "Exit", "Qty"]
        );
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0]["Symbol"], "BTCUSDT");
        assert_eq!(table.rows[1]["Exit"], "40");
    }

    #[test]
    fn sniffs_semicolons() {
        let table = read(
            "Datum;Typ;Kurs\n\
             01.02.2024;Kauf;10,50\n",
        );

        assert_eq!(table.headers, vec!["Datum", "Typ", "Kurs"]);
        assert_eq!(table.rows[0]["Kurs"], "10,50");
    }

    #[test]
    fn sniffs_tabs_and_pipes() {
        let table = read("Date\tSymbol\n2024-01-01\tBTC\n");
        assert_eq!(table.headers, vec!["Date", "Symbol"]);

        let table = read("Date|Symbol\n2024-01-01|BTC\n");
        assert_eq!(table.headers, vec!["Date", "Symbol"]);
    }

    #[test]
    fn skips_preamble_before_the_header() {
        let table = read(
            "Account Statement\n\
             \n\
             Date,Symbol,Side\n\
             2024-01-01,BTCUSDT,Buy\n",
        );

        assert_eq!(table.headers, vec!["Date", "Symbol", "Side"]);
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn preamble_does_not_decide_the_delimiter() {
        let table = read(
            "Kontoauszug 2024\n\
             Datum;Typ;Kurs\n\
             01.02.2024;Kauf;10,50\n",
        );

        assert_eq!(table.headers, vec!["Datum", "Typ", "Kurs"]);
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn skips_blank_lines_between_records() {
        let table = read(
            "Date,Symbol\n\
             2024-01-01,BTC\n\
             \n\
             2024-01-02,ETH\n",
        );

        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn quoted_fields_keep_their_delimiters() {
        let table = read("Symbol,Note\nBTC,\"entry, late\"\n");
        assert_eq!(table.rows[0]["Note"], "entry, late");
    }

    #[test]
    fn short_rows_fill_with_empty_cells() {
        let table = read("Date,Symbol,Side\n2024-01-01,BTC\n");
        assert_eq!(table.rows[0]["Side"], "");
    }

    #[test]
    fn duplicate_headers_are_disambiguated() {
        let table = read("Price,Price\n1,2\n");
        assert_eq!(table.headers, vec!["Price", "Price_2"]);
        assert_eq!(table.rows[0]["Price_2"], "2");
    }

    #[test]
    fn invalid_utf8_is_binary_content() {
        let err = DelimitedAdapter::new()
            .read(&[0xFF, 0xFE, 0x00, 0x41])
            .unwrap_err();
        assert!(matches!(err, ReadError::BinaryContent));
    }

    #[test]
    fn empty_input_is_empty() {
        let err = DelimitedAdapter::new().read(b"  \n \n").unwrap_err();
        assert!(matches!(err, ReadError::Empty { .. }));
    }

    #[test]
    fn all_numeric_rows_have_no_header() {
        let err = DelimitedAdapter::new()
            .read(b"1,2,3\n4,5,6\n")
            .unwrap_err();
        assert!(matches!(err, ReadError::Malformed { .. }));
    }
}
