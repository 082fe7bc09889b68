//! Schema union and alignment
//!
//! Frames from different files, and the persisted table from an earlier
//! run, rarely share an identical schema. Before rows can be stacked every
//! frame is padded to a common schema: missing columns become nulls and
//! type conflicts are widened.

use std::collections::HashMap;
use std::sync::Arc;

use arrow_array::{ArrayRef, RecordBatch, RecordBatchOptions, new_null_array};
use arrow_cast::cast;
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use arrow_select::concat::concat_batches;
use diagnostics::*;

use crate::Result;

/// A table with no columns and no rows.
#[must_use]
pub fn empty_table() -> RecordBatch {
    RecordBatch::new_empty(Arc::new(Schema::empty()))
}

/// Build a batch with an explicit row count, so zero-column frames work.
pub fn rebuild_batch(
    fields: Vec<Field>,
    columns: Vec<ArrayRef>,
    num_rows: usize,
) -> Result<RecordBatch> {
    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    Ok(RecordBatch::try_new_with_options(
        Arc::new(Schema::new(fields)),
        columns,
        &options,
    )?)
}

/// Replace the column called `name`, or append it when absent.
pub fn set_column(batch: &RecordBatch, name: &str, array: ArrayRef) -> Result<RecordBatch> {
    let schema = batch.schema();
    let field = Field::new(name, array.data_type().clone(), true);
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut columns = batch.columns().to_vec();

    match schema.index_of(name) {
        Ok(idx) => {
            fields[idx] = field;
            columns[idx] = array;
        }
        Err(_) => {
            fields.push(field);
            columns.push(array);
        }
    }
    rebuild_batch(fields, columns, batch.num_rows())
}

/// Widen two column types to one both can be cast to.
fn widen(left: &DataType, right: &DataType) -> DataType {
    match (left, right) {
        (l, r) if l == r => l.clone(),
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),
        (l, r) if l.is_numeric() && r.is_numeric() => DataType::Float64,
        _ => DataType::Utf8,
    }
}

/// Union of schemas: fields in order of first appearance, all nullable.
#[must_use]
pub fn unify_schemas<'a, I>(schemas: I) -> SchemaRef
where
    I: IntoIterator<Item = &'a Schema>,
{
    let mut order: Vec<String> = Vec::new();
    let mut types: HashMap<String, DataType> = HashMap::new();

    for schema in schemas {
        for field in schema.fields() {
            match types.get_mut(field.name()) {
                Some(existing) => {
                    let widened = widen(existing, field.data_type());
                    if widened != *existing {
                        let column_name = field.name();
                        let dtype = widened.to_string();
                        debug!(
                            "widening column {column_name} to {dtype}",
                            column_name: column_name,
                            dtype: dtype
                        );
                    }
                    *existing = widened;
                }
                None => {
                    order.push(field.name().clone());
                    let _ = types.insert(field.name().clone(), field.data_type().clone());
                }
            }
        }
    }

    let fields: Vec<Field> = order
        .into_iter()
        .map(|name| {
            let dtype = types.remove(&name).unwrap_or(DataType::Null);
            Field::new(name, dtype, true)
        })
        .collect();
    Arc::new(Schema::new(fields))
}

/// Reshape `batch` to `schema`: reorder, cast, and null-pad.
pub fn align_batch(batch: &RecordBatch, schema: &SchemaRef) -> Result<RecordBatch> {
    let num_rows = batch.num_rows();
    let columns = schema
        .fields()
        .iter()
        .map(|field| match batch.column_by_name(field.name()) {
            Some(column) if column.data_type() == field.data_type() => Ok(column.clone()),
            Some(column) => Ok(cast(column, field.data_type())?),
            None => Ok(new_null_array(field.data_type(), num_rows)),
        })
        .collect::<Result<Vec<_>>>()?;

    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    Ok(RecordBatch::try_new_with_options(schema.clone(), columns, &options)?)
}

/// Stack frames vertically under the union of their schemas.
///
/// Frame order and row order within each frame are preserved.
pub fn concat_frames(frames: &[RecordBatch]) -> Result<RecordBatch> {
    if frames.is_empty() {
        return Ok(empty_table());
    }

    let schema = unify_schemas(frames.iter().map(|f| f.schema_ref().as_ref()));
    let aligned = frames
        .iter()
        .map(|frame| align_batch(frame, &schema))
        .collect::<Result<Vec<_>>>()?;

    if schema.fields().is_empty() {
        // concat_batches cannot infer a row count without columns
        let rows = aligned.iter().map(RecordBatch::num_rows).sum();
        return rebuild_batch(Vec::new(), Vec::new(), rows);
    }

    Ok(concat_batches(&schema, &aligned)?)
}
