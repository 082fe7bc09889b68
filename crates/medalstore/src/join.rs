//! Denormalization: left join of the fact table onto the reference table

use std::collections::{HashMap, HashSet};

use arrow_array::{Array, ArrayRef, RecordBatch, StringArray, UInt32Array};
use arrow_cast::cast;
use arrow_schema::{DataType, Field};
use arrow_select::take::take;
use diagnostics::*;
use serde::{Deserialize, Serialize};

use crate::schema::{empty_table, rebuild_batch};
use crate::{Error, Result};

/// Suffixes appended to column names present on both sides of the join.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JoinSuffixes {
    pub fact: String,
    pub reference: String,
}

impl Default for JoinSuffixes {
    fn default() -> Self {
        Self {
            fact: "_olymp".into(),
            reference: "_country".into(),
        }
    }
}

fn key_strings(table: &RecordBatch, key: &str) -> Result<Option<StringArray>> {
    let Some(column) = table.column_by_name(key) else {
        return Ok(None);
    };
    let text = cast(column, &DataType::Utf8)?;
    Ok(text.as_any().downcast_ref::<StringArray>().cloned())
}

/// Left outer join on `key`.
///
/// Every fact row appears exactly once and in its original order. If the
/// reference table holds a key more than once, its last row is used. The
/// key column is emitted once, from the fact side.
pub fn left_join(
    fact: &RecordBatch,
    reference: &RecordBatch,
    key: &str,
    suffixes: &JoinSuffixes,
) -> Result<RecordBatch> {
    if fact.num_columns() == 0 {
        return Ok(empty_table());
    }
    let fact_keys = key_strings(fact, key)?.ok_or_else(|| Error::missing_key(key))?;

    let Some(reference_keys) = key_strings(reference, key)? else {
        warn!("reference table has no {key} column, joining nothing", key: key);
        return Ok(fact.clone());
    };

    let mut lookup: HashMap<&str, u32> = HashMap::with_capacity(reference_keys.len());
    for (idx, token) in reference_keys.iter().enumerate() {
        if let Some(token) = token {
            let _ = lookup.insert(token, idx as u32);
        }
    }

    let indices: UInt32Array = fact_keys
        .iter()
        .map(|token| token.and_then(|t| lookup.get(t).copied()))
        .collect();
    let matched = indices.len() - indices.null_count();

    let fact_schema = fact.schema();
    let reference_schema = reference.schema();
    let fact_names: HashSet<&str> = fact_schema
        .fields()
        .iter()
        .map(|f| f.name().as_str())
        .collect();
    let collides = |name: &str| {
        name != key && fact_names.contains(name) && reference_schema.index_of(name).is_ok()
    };

    let mut fields: Vec<Field> = Vec::with_capacity(fact.num_columns() + reference.num_columns());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(fields.capacity());

    for (field, column) in fact_schema.fields().iter().zip(fact.columns()) {
        let name = if collides(field.name()) {
            format!("{}{}", field.name(), suffixes.fact)
        } else {
            field.name().clone()
        };
        fields.push(Field::new(name, field.data_type().clone(), true));
        columns.push(column.clone());
    }

    for (field, column) in reference_schema.fields().iter().zip(reference.columns()) {
        if field.name() == key {
            continue;
        }
        let name = if collides(field.name()) {
            format!("{}{}", field.name(), suffixes.reference)
        } else {
            field.name().clone()
        };
        fields.push(Field::new(name, field.data_type().clone(), true));
        columns.push(take(column.as_ref(), &indices, None)?);
    }

    let rows = fact.num_rows();
    debug!("joined {rows} fact rows, {matched} with reference data", rows: rows, matched: matched);
    rebuild_batch(fields, columns, rows)
}
