//! CSV source discovery and decoding
//!
//! Source files come from many publishers. Most are UTF-8; older exports
//! are Latin-1. A file is decoded as UTF-8 first and, on failure, once more
//! as Windows-1252 (the WHATWG superset of Latin-1). There is no further
//! retry.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::RecordBatch;
use arrow_csv::ReaderBuilder;
use arrow_csv::reader::Format;
use arrow_select::concat::concat_batches;
use diagnostics::*;
use encoding_rs::WINDOWS_1252;

use crate::schema::empty_table;
use crate::{Error, Result};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// List `*.csv` files in `dir`, sorted by file name.
///
/// A missing directory is not an error: it yields no files.
pub fn discover_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        let dir_path = dir.display().to_string();
        warn!("no source directory found at {dir_path}", dir_path: dir_path);
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv && path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let count = files.len();
    debug!("discovered {count} csv files", count: count);
    Ok(files)
}

/// Decode raw bytes as UTF-8, falling back to Windows-1252.
///
/// Windows-1252 assigns a character to every byte, so the fallback cannot
/// fail.
#[must_use]
pub fn decode_text(path: &Path, bytes: &[u8]) -> String {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(body) {
        return text.to_owned();
    }

    let source_path = path.display().to_string();
    let fallback = WINDOWS_1252.name();
    warn!(
        "{source_path} is not valid UTF-8, decoding as {fallback}",
        source_path: source_path,
        fallback: fallback
    );
    let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
    text.into_owned()
}

/// Parse CSV text with a header row into one frame, inferring column types.
pub fn parse_csv_text(text: &str) -> Result<RecordBatch> {
    if text.trim().is_empty() {
        return Ok(empty_table());
    }

    let format = Format::default()
        .with_header(true)
        .with_truncated_rows(true);
    let (schema, _) = format.infer_schema(Cursor::new(text.as_bytes()), None)?;
    let schema = Arc::new(schema);

    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_truncated_rows(true)
        .build(Cursor::new(text.as_bytes()))?;

    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

/// Read and parse one CSV file.
pub fn read_csv_frame(path: &Path) -> Result<RecordBatch> {
    let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    let text = decode_text(path, &bytes);
    let frame = parse_csv_text(&text)?;

    let source_path = path.display().to_string();
    let rows = frame.num_rows();
    let columns = frame.num_columns();
    debug!(
        "read {rows} rows x {columns} columns from {source_path}",
        rows: rows,
        columns: columns,
        source_path: source_path
    );
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{Array, Int64Array, StringArray};
    use arrow_schema::DataType;

    #[test]
    fn test_decode_falls_back_to_latin1() {
        let bytes = b"country\nC\xF4te d'Ivoire\n";
        let text = decode_text(Path::new("x.csv"), bytes);
        assert_eq!(text, "country\nC\u{f4}te d'Ivoire\n");
    }

    #[test]
    fn test_decode_accepts_any_byte() {
        let bytes: Vec<u8> = (0..=255u8).collect();
        let text = decode_text(Path::new("x.csv"), &bytes);
        assert_eq!(text.chars().count(), 256);
        assert_eq!(text.chars().nth(0x80), Some('\u{20ac}'));
    }

    #[test]
    fn test_decode_strips_utf8_bom() {
        let text = decode_text(Path::new("x.csv"), b"\xEF\xBB\xBFa,b\n1,2\n");
        assert!(text.starts_with("a,b"));
    }

    #[test]
    fn test_parse_infers_types() {
        let frame =
            parse_csv_text("Team,Gold,Population\nFrance,3,\"60,000,000\"\nItaly,,\n").unwrap();
        assert_eq!(frame.num_rows(), 2);
        let schema = frame.schema();
        assert_eq!(schema.field(0).data_type(), &DataType::Utf8);
        assert_eq!(schema.field(1).data_type(), &DataType::Int64);
        assert_eq!(schema.field(2).data_type(), &DataType::Utf8);

        let gold = frame.column(1).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(gold.value(0), 3);
        assert!(gold.is_null(1));

        let pop = frame.column(2).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(pop.value(0), "60,000,000");
    }

    #[test]
    fn test_header_only_and_empty_files() {
        let frame = parse_csv_text("team,gold\n").unwrap();
        assert_eq!(frame.num_rows(), 0);
        assert_eq!(frame.num_columns(), 2);

        let frame = parse_csv_text("  \n").unwrap();
        assert_eq!(frame.num_columns(), 0);
    }

    #[test]
    fn test_discover_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("results_2004.csv"), "a\n1\n").unwrap();
        std::fs::write(dir.path().join("results_2000.CSV"), "a\n1\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let files = discover_csv_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["results_2000.CSV", "results_2004.csv"]);

        let missing = discover_csv_files(&dir.path().join("nope")).unwrap();
        assert!(missing.is_empty());
    }
}
