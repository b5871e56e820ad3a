//! Spreadsheet adapter over the `calamine` crate.
//!
//! Reads the first worksheet of an xlsx/xls workbook into a `RawTable`.
//! Embedded date cells are converted to ISO-like strings here, up front, so
//! downstream stages only ever see strings.

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use std::io::Cursor;

use crate::domain::table::{RawTable, unique_headers};
use crate::ports::table_reader::{ReadError, TableReader};

/// How many leading rows are scanned for the header before giving up.
const HEADER_SCAN_ROWS: usize = 10;

#[derive(Debug, Default)]
pub struct SpreadsheetAdapter;

impl SpreadsheetAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl TableReader for SpreadsheetAdapter {
    fn read(&self, bytes: &[u8]) -> Result<RawTable, ReadError> {
        let cursor = Cursor::new(bytes.to_vec());
        let mut workbook = open_workbook_auto_from_rs(cursor).map_err(|e| ReadError::Malformed {
            errors: vec![format!("unrecognized workbook: {e}")],
        })?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ReadError::Empty {
                reason: "workbook has no sheets".into(),
            })?
            .map_err(|e| ReadError::Malformed {
                errors: vec![format!("first sheet: {e}")],
            })?;

        let grid: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect();

        let header_idx = grid
            .iter()
            .take(HEADER_SCAN_ROWS)
            .position(|row| is_header_row(row))
            .ok_or_else(|| ReadError::Empty {
                reason: "no header row found in first sheet".into(),
            })?;
        let headers = unique_headers(grid[header_idx].clone());

        let rows = grid
            .into_iter()
            .skip(header_idx + 1)
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .map(|row| {
                headers
                    .iter()
                    .cloned()
                    .zip(row.into_iter().chain(std::iter::repeat(String::new())))
                    .collect()
            })
            .collect();

        Ok(RawTable::new(headers, rows))
    }
}

/// At least two populated cells, none of which reads as a number.
fn is_header_row(row: &[String]) -> bool {
    let populated = row.iter().filter(|cell| !cell.is_empty()).count();
    populated >= 2 && !row.iter().any(|cell| cell.parse::<f64>().is_ok())
}

/// Stringify one cell; date serials become ISO-like strings right here.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y-%m-%dT%H:%M:%S").to_string())
            .unwrap_or_default(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}
