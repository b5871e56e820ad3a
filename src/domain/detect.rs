//! Content-based file format detection.
//!
//! Broker exports are routinely mislabeled — a `.csv` that is actually an
//! xlsx workbook is common — so classification sniffs bytes and ignores the
//! file extension entirely. Ambiguity is resolved by the parse fallback in
//! [`crate::domain::parser`], not here.

/// The two table formats the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Delimited,
    Spreadsheet,
}

/// Magic prefix of ZIP containers (xlsx workbooks).
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
/// Magic prefix of OLE2 compound documents (legacy xls workbooks).
const OLE2_MAGIC: [u8; 4] = [0xD0, 0xCF, 0x11, 0xE0];

/// How many leading bytes the text heuristic inspects.
const SNIFF_WINDOW: usize = 1024;

/// Classify raw upload bytes as delimited text or a binary spreadsheet.
pub fn detect_format(bytes: &[u8]) -> FileFormat {
    if bytes.starts_with(&ZIP_MAGIC) || bytes.starts_with(&OLE2_MAGIC) {
        return FileFormat::Spreadsheet;
    }

    let window = &bytes[..bytes.len().min(SNIFF_WINDOW)];
    if window.contains(&0) {
        return FileFormat::Spreadsheet;
    }

    // Mostly-printable content reads as delimited text; a high density of
    // control bytes means some other binary container.
    let control = window
        .iter()
        .filter(|b| b.is_ascii_control() && !matches!(b, b'\n' | b'\r' | b'\t'))
        .count();
    if !window.is_empty() && control * 10 > window.len() {
        return FileFormat::Spreadsheet;
    }

    FileFormat::Delimited
}
