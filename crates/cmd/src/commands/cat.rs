use anyhow::{Result, anyhow};
use arrow::array::RecordBatch;
use arrow_cast::display::FormatOptions;
use arrow_cast::pretty::pretty_format_batches_with_options;
use diagnostics::*;
use medalstore::{ParquetStore, PipelineConfig, TableStore};

use crate::common::TableChoice;

/// Format a table as ASCII, followed by a row count line.
pub fn format_table(batch: &RecordBatch, limit: Option<usize>) -> Result<String> {
    let total_rows = batch.num_rows();
    let shown = limit.map_or(total_rows, |n| n.min(total_rows));
    let batch = batch.slice(0, shown);

    let options = FormatOptions::default()
        .with_display_error(true)
        .with_null("NULL");
    let formatted = pretty_format_batches_with_options(&[batch], &options)
        .map_err(|e| anyhow!("Failed to format table: {}", e))?
        .to_string();

    let summary = if shown < total_rows {
        format!("Summary: {shown} of {total_rows} rows")
    } else {
        format!("Summary: {total_rows} total rows")
    };
    Ok(format!("{}\n{summary}\n", formatted.trim_end()))
}

/// Pretty-print one persisted table.
#[allow(clippy::print_stdout)]
pub fn cat_command(
    config: &PipelineConfig,
    table: TableChoice,
    limit: Option<usize>,
    output: Option<&mut String>,
) -> Result<()> {
    let store = ParquetStore::new(table.path(config));
    let location = store.describe();
    debug!("cat_command reading {location}", location: location);

    let batch = store
        .load()?
        .ok_or_else(|| anyhow!("No table at {} (has the pipeline run?)", location))?;
    let formatted = format_table(&batch, limit)?;

    if let Some(output_buffer) = output {
        output_buffer.push_str(&formatted);
    } else {
        print!("{formatted}");
    }
    Ok(())
}
