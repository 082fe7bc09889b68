//! Identity tokens derived from free-text names
//!
//! A token is the hex SHA-256 of the normalized name. Fact and reference
//! rows compute tokens independently, so the normalization and the digest
//! must never change between runs.

use arrow_cast::cast;
use arrow_array::{Array, ArrayRef, StringArray};
use arrow_schema::DataType;
use sha2::{Digest, Sha256};

use crate::Result;

/// Collapse whitespace runs to one space, trim, lower-case.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Derive the identity token for a possibly missing name.
///
/// `None` hashes exactly like the empty string.
#[must_use]
pub fn derive_identity(name: Option<&str>) -> String {
    let key = normalize_name(name.unwrap_or(""));
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Derive one token per cell of `names`, stringifying non-text columns first.
pub fn derive_identity_column(names: &ArrayRef) -> Result<StringArray> {
    let text = if names.data_type() == &DataType::Utf8 {
        names.clone()
    } else {
        cast(names, &DataType::Utf8)?
    };
    let text = text
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| arrow_schema::ArrowError::CastError("name column is not text".into()))?;

    Ok(text
        .iter()
        .map(|name| Some(derive_identity(name)))
        .collect())
}
