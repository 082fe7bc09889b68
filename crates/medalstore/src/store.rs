//! Durable table storage
//!
//! A [`TableStore`] holds exactly one full-table snapshot. Callers never
//! touch the filesystem directly: they `load` the previous snapshot, compute
//! a new one, and `save` it, replacing the old one wholesale.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use arrow_array::RecordBatch;
use arrow_select::concat::concat_batches;
use diagnostics::*;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::properties::WriterProperties;

use crate::{Error, Result};

/// Load/save access to one persisted table.
pub trait TableStore {
    /// The current snapshot, or `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<RecordBatch>>;

    /// Replace the snapshot with `table`.
    fn save(&self, table: &RecordBatch) -> Result<()>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Serialize a RecordBatch to parquet bytes in memory
pub fn serialize_batch_to_parquet(batch: &RecordBatch) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let cursor = Cursor::new(&mut buffer);
        let props = WriterProperties::builder().build();
        let mut writer = ArrowWriter::try_new(cursor, batch.schema(), Some(props))?;
        writer.write(batch)?;
        let _ = writer.close()?;
    }
    Ok(buffer)
}

/// Parse parquet bytes into one concatenated RecordBatch
///
/// A file with a schema but no row groups yields an empty batch.
pub fn parse_parquet_to_batch(data: Vec<u8>) -> Result<RecordBatch> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes::Bytes::from(data))?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

/// A table persisted as a single Parquet file.
#[derive(Debug, Clone)]
pub struct ParquetStore {
    path: PathBuf,
}

impl ParquetStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TableStore for ParquetStore {
    fn load(&self) -> Result<Option<RecordBatch>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = std::fs::read(&self.path).map_err(|e| Error::io(&self.path, e))?;
        let table = parse_parquet_to_batch(data)?;

        let location = self.describe();
        let rows = table.num_rows();
        debug!("loaded {rows} rows from {location}", rows: rows, location: location);
        Ok(Some(table))
    }

    fn save(&self, table: &RecordBatch) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
        }
        let buffer = serialize_batch_to_parquet(table)?;
        std::fs::write(&self.path, &buffer).map_err(|e| Error::io(&self.path, e))?;

        let location = self.describe();
        let rows = table.num_rows();
        let byte_count = buffer.len();
        debug!(
            "wrote {rows} rows ({byte_count} bytes) to {location}",
            rows: rows,
            byte_count: byte_count,
            location: location
        );
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// An in-process table, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: Mutex<Option<RecordBatch>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `table`.
    #[must_use]
    pub fn with_table(table: RecordBatch) -> Self {
        Self {
            table: Mutex::new(Some(table)),
            saves: Mutex::new(0),
        }
    }

    /// How many times `save` has been called.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }
}

impl TableStore for MemoryStore {
    fn load(&self) -> Result<Option<RecordBatch>> {
        let table = self
            .table
            .lock()
            .map_err(|e| Error::StorePoisoned(e.to_string()))?;
        Ok(table.clone())
    }

    fn save(&self, table: &RecordBatch) -> Result<()> {
        let mut slot = self
            .table
            .lock()
            .map_err(|e| Error::StorePoisoned(e.to_string()))?;
        *slot = Some(table.clone());
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
