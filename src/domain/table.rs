//! Raw tabular data as produced by the parsers.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// An uploaded broker export, before any format detection.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let bytes = fs::read(path)?;
        Ok(Self { name, bytes })
    }
}

/// A parsed table: ordered unique headers plus string-keyed rows.
///
/// Ephemeral — never persisted. Cell values are strings at this boundary;
/// typing happens in the row transformer.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<HashMap<String, String>>) -> Self {
        Self { headers, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }
}

/// Make a parsed header row usable: trim, name blanks positionally, and
/// disambiguate duplicates with a numeric suffix so headers stay unique.
pub fn unique_headers(cells: Vec<String>) -> Vec<String> {
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut headers = Vec::with_capacity(cells.len());

    for (i, cell) in cells.into_iter().enumerate() {
        let base = cell.trim().to_string();
        let base = if base.is_empty() {
            format!("column_{}", i + 1)
        } else {
            base
        };

        let mut name = base.clone();
        let mut n = 2;
        while !seen.insert(name.clone()) {
            name = format!("{base}_{n}");
            n += 1;
        }
        headers.push(name);
    }

    headers
}
