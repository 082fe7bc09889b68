//! Batch assembly for both sides of the store
//!
//! The fact side is many per-period files stacked into one table with
//! provenance columns; the reference side is a single file. Both end with
//! an identity token column derived from the unified name column.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use arrow_array::{Int64Array, RecordBatch, StringArray};
use diagnostics::*;
use regex::Regex;

use crate::Result;
use crate::identity::derive_identity_column;
use crate::normalize::{FrameRules, coerce_numeric_columns, normalize_columns, unify_alias};
use crate::schema::{concat_frames, empty_table, set_column};
use crate::source::read_csv_frame;

/// Identity token column shared by both tables.
pub const ID_COLUMN: &str = "country_id";
/// Period column of the fact table.
pub const YEAR_COLUMN: &str = "year";
/// Originating file name of each fact row.
pub const SOURCE_FILE_COLUMN: &str = "source_file";

fn period_re() -> &'static Regex {
    static PERIOD_RE: OnceLock<Regex> = OnceLock::new();
    PERIOD_RE.get_or_init(|| Regex::new(r"[0-9]{4}").expect("valid period regex"))
}

/// First run of four digits in a file name, if any.
#[must_use]
pub fn extract_period(file_name: &str) -> Option<i64> {
    period_re()
        .find(file_name)
        .and_then(|m| m.as_str().parse().ok())
}

/// Add the identity token column computed from `rules.canonical`.
fn with_identity(frame: &RecordBatch, rules: &FrameRules) -> Result<RecordBatch> {
    let Some(names) = frame.column_by_name(&rules.canonical) else {
        return Ok(frame.clone());
    };
    let tokens = derive_identity_column(names)?;
    set_column(frame, ID_COLUMN, Arc::new(tokens))
}

/// Normalize one fact frame and stamp its provenance.
pub fn prepare_fact_frame(
    frame: &RecordBatch,
    file_name: &str,
    period: Option<i64>,
    rules: &FrameRules,
) -> Result<RecordBatch> {
    let rows = frame.num_rows();
    let frame = normalize_columns(frame)?;
    let frame = set_column(
        &frame,
        SOURCE_FILE_COLUMN,
        Arc::new(StringArray::from(vec![file_name; rows])),
    )?;
    let frame = set_column(
        &frame,
        YEAR_COLUMN,
        Arc::new(Int64Array::from(vec![period; rows])),
    )?;
    let frame = unify_alias(&frame, rules)?;
    let frame = coerce_numeric_columns(&frame, &rules.numeric)?;
    with_identity(&frame, rules)
}

/// Read, normalize and stack every fact file.
///
/// No files, or files without rows, produce an empty table rather than an
/// error.
pub fn assemble_fact_batch(files: &[PathBuf], rules: &FrameRules) -> Result<RecordBatch> {
    let mut frames = Vec::with_capacity(files.len());
    for path in files {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let period = extract_period(&file_name);

        let raw = read_csv_frame(path)?;
        if raw.num_columns() == 0 {
            debug!("skipping empty file {file_name}", file_name: file_name);
            continue;
        }
        frames.push(prepare_fact_frame(&raw, &file_name, period, rules)?);
    }

    if frames.iter().all(|f| f.num_rows() == 0) {
        return Ok(empty_table());
    }

    let batch = concat_frames(&frames)?;
    let file_count = frames.len();
    let rows = batch.num_rows();
    info!(
        "assembled {rows} fact rows from {file_count} files",
        rows: rows,
        file_count: file_count
    );
    Ok(batch)
}

/// Normalize the reference frame.
pub fn prepare_reference_frame(frame: &RecordBatch, rules: &FrameRules) -> Result<RecordBatch> {
    let frame = normalize_columns(frame)?;
    let frame = unify_alias(&frame, rules)?;
    let frame = with_identity(&frame, rules)?;
    coerce_numeric_columns(&frame, &rules.numeric)
}

/// Build the reference table from its file; a missing file yields an empty table.
pub fn build_reference_table(path: &Path, rules: &FrameRules) -> Result<RecordBatch> {
    if !path.is_file() {
        let reference_path = path.display().to_string();
        warn!("reference file not found at {reference_path}", reference_path: reference_path);
        return Ok(empty_table());
    }

    let raw = read_csv_frame(path)?;
    if raw.num_columns() == 0 {
        return Ok(empty_table());
    }
    let table = prepare_reference_frame(&raw, rules)?;

    let rows = table.num_rows();
    info!("built {rows} reference rows", rows: rows);
    Ok(table)
}
