//! Last-write-wins upsert against a [`TableStore`]
//!
//! The merge rule is positional: prior rows first, incoming rows after, and
//! for every composite key only the last row survives. A surviving row is
//! taken whole; columns are never merged field by field.

use std::collections::HashMap;

use arrow::row::{RowConverter, SortField};
use arrow_array::{RecordBatch, UInt32Array};
use arrow_select::take::take_record_batch;
use diagnostics::*;

use crate::schema::concat_frames;
use crate::store::TableStore;
use crate::{Error, Result};

/// Keep only the last row for each distinct value of `keys`.
///
/// Survivors keep their relative order. Null key components compare equal
/// to each other.
pub fn dedupe_keep_last(table: &RecordBatch, keys: &[&str]) -> Result<RecordBatch> {
    if keys.is_empty() {
        return Err(Error::Config("upsert requires at least one key column".into()));
    }

    let key_columns = keys
        .iter()
        .map(|key| {
            table
                .column_by_name(key)
                .cloned()
                .ok_or_else(|| Error::missing_key(*key))
        })
        .collect::<Result<Vec<_>>>()?;

    let converter = RowConverter::new(
        key_columns
            .iter()
            .map(|c| SortField::new(c.data_type().clone()))
            .collect(),
    )?;
    let rows = converter.convert_columns(&key_columns)?;

    let mut last = HashMap::with_capacity(rows.num_rows());
    for (idx, row) in rows.iter().enumerate() {
        let _ = last.insert(row, idx);
    }

    let keep: UInt32Array = rows
        .iter()
        .enumerate()
        .filter(|(idx, row)| last.get(row) == Some(idx))
        .map(|(idx, _)| idx as u32)
        .collect();

    if keep.len() == table.num_rows() {
        return Ok(table.clone());
    }

    let dropped = table.num_rows() - keep.len();
    debug!("dropped {dropped} superseded rows", dropped: dropped);
    Ok(take_record_batch(table, &keep)?)
}

/// Stack `incoming` after `prior` and resolve key conflicts, last write wins.
pub fn merge_tables(
    prior: &RecordBatch,
    incoming: &RecordBatch,
    keys: &[&str],
) -> Result<RecordBatch> {
    let combined = concat_frames(&[prior.clone(), incoming.clone()])?;
    dedupe_keep_last(&combined, keys)
}

/// Merge `incoming` into the table held by `store`, save, and return the result.
///
/// - No prior snapshot: the incoming batch (deduplicated) becomes the table.
/// - Empty incoming batch: the prior snapshot is re-saved unchanged.
/// - A result without columns is not saved.
pub fn upsert<S>(store: &S, incoming: &RecordBatch, keys: &[&str]) -> Result<RecordBatch>
where
    S: TableStore + ?Sized,
{
    let location = store.describe();
    let incoming_rows = incoming.num_rows();

    let merged = match store.load()? {
        Some(prior) if incoming_rows == 0 => {
            debug!("empty batch for {location}, keeping prior table", location: location);
            prior
        }
        Some(prior) => {
            let prior_rows = prior.num_rows();
            debug!(
                "merging {incoming_rows} rows into {prior_rows} rows at {location}",
                incoming_rows: incoming_rows,
                prior_rows: prior_rows,
                location: location
            );
            merge_tables(&prior, incoming, keys)?
        }
        None if incoming_rows == 0 => incoming.clone(),
        None => dedupe_keep_last(incoming, keys)?,
    };

    if merged.num_columns() == 0 {
        warn!("nothing to persist at {location}", location: location);
        return Ok(merged);
    }

    store.save(&merged)?;
    let rows = merged.num_rows();
    info!("upserted {location}: {rows} rows", location: location, rows: rows);
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::empty_table;
    use crate::store::MemoryStore;
    use arrow_array::{Array, Float64Array, Int64Array, StringArray, record_batch};

    fn values(batch: &RecordBatch) -> Vec<Option<f64>> {
        batch
            .column_by_name("v")
            .unwrap()
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap()
            .iter()
            .collect()
    }

    #[test]
    fn test_last_write_wins() {
        let store = MemoryStore::with_table(
            record_batch!(("k", Utf8, ["a", "b"]), ("v", Float64, [1.0, 10.0])).unwrap(),
        );
        let incoming = record_batch!(("k", Utf8, ["a", "a"]), ("v", Float64, [2.0, 3.0])).unwrap();

        let merged = upsert(&store, &incoming, &["k"]).unwrap();
        assert_eq!(merged.num_rows(), 2);

        let keys = merged.column(0).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(keys.value(0), "b");
        assert_eq!(keys.value(1), "a");
        assert_eq!(values(&merged), vec![Some(10.0), Some(3.0)]);
        assert_eq!(store.load().unwrap().unwrap(), merged);
    }

    #[test]
    fn test_composite_key_with_null_component() {
        let prior = record_batch!(
            ("id", Utf8, ["x", "x", "x"]),
            ("year", Int64, [Some(2000), Some(2004), None]),
            ("v", Float64, [1.0, 2.0, 3.0])
        )
        .unwrap();
        let incoming = record_batch!(
            ("id", Utf8, ["x", "x"]),
            ("year", Int64, [None, Some(2004)]),
            ("v", Float64, [30.0, 20.0])
        )
        .unwrap();

        let merged = merge_tables(&prior, &incoming, &["id", "year"]).unwrap();
        assert_eq!(merged.num_rows(), 3);
        let years = merged.column(1).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(years.value(0), 2000);
        assert!(years.is_null(1));
        assert_eq!(years.value(2), 2004);
        assert_eq!(values(&merged), vec![Some(1.0), Some(30.0), Some(20.0)]);
    }

    #[test]
    fn test_incoming_row_replaces_whole_row() {
        let prior = record_batch!(
            ("k", Utf8, ["a", "b"]),
            ("v", Float64, [1.0, 2.0]),
            ("old", Utf8, ["keep", "lost"])
        )
        .unwrap();
        let incoming = record_batch!(("k", Utf8, ["b", "c"]), ("v", Float64, [5.0, 6.0])).unwrap();

        let merged = merge_tables(&prior, &incoming, &["k"]).unwrap();
        let old = merged.column_by_name("old").unwrap();
        assert_eq!(old.as_any().downcast_ref::<StringArray>().unwrap().value(0), "keep");
        assert!(old.is_null(1));
        assert!(old.is_null(2));
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = MemoryStore::with_table(
            record_batch!(("k", Utf8, ["a", "b"]), ("v", Float64, [1.0, 2.0])).unwrap(),
        );
        let incoming = record_batch!(
            ("k", Utf8, ["b", "c", "c"]),
            ("v", Float64, [3.0, 4.0, 5.0])
        )
        .unwrap();

        let once = upsert(&store, &incoming, &["k"]).unwrap();
        let twice = upsert(&store, &incoming, &["k"]).unwrap();
        assert_eq!(once, twice);
        assert_eq!(values(&twice), vec![Some(1.0), Some(3.0), Some(5.0)]);
    }

    #[test]
    fn test_empty_batch_keeps_prior() {
        let prior = record_batch!(("k", Utf8, ["a"]), ("v", Float64, [1.0])).unwrap();
        let store = MemoryStore::with_table(prior.clone());

        let merged = upsert(&store, &empty_table(), &["k"]).unwrap();
        assert_eq!(merged, prior);
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.load().unwrap().unwrap(), prior);
    }

    #[test]
    fn test_empty_batch_without_prior_is_not_saved() {
        let store = MemoryStore::new();
        let merged = upsert(&store, &empty_table(), &["k"]).unwrap();
        assert_eq!(merged.num_columns(), 0);
        assert_eq!(store.save_count(), 0);
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_missing_key_column() {
        let store = MemoryStore::new();
        let incoming = record_batch!(("v", Float64, [1.0])).unwrap();
        let err = upsert(&store, &incoming, &["k"]).unwrap_err();
        assert!(matches!(err, Error::MissingKeyColumn { ref column } if column == "k"));
    }
}
