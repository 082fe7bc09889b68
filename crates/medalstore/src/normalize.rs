//! Frame normalization
//!
//! Source files disagree on column spelling, on which column carries the
//! country name, and on how numbers are written ("1,234", "12 %", "N/A").
//! Everything here turns a freshly parsed frame into one with predictable
//! column names and numeric outcome columns, without ever dropping a row.

use std::collections::HashSet;
use std::sync::Arc;

use arrow_array::{Array, ArrayRef, Float64Array, RecordBatch, StringArray, new_null_array};
use arrow_cast::cast;
use arrow_schema::{DataType, Field};
use diagnostics::*;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::schema::rebuild_batch;

/// Which columns of a frame hold numbers written as text.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct NumericSelector {
    /// Column names that must match exactly.
    pub exact: Vec<String>,
    /// Substrings; any column whose name contains one is selected.
    pub patterns: Vec<String>,
}

impl NumericSelector {
    #[must_use]
    pub fn exact(names: &[&str]) -> Self {
        Self {
            exact: names.iter().map(|s| (*s).to_string()).collect(),
            patterns: Vec::new(),
        }
    }

    #[must_use]
    pub fn patterns(parts: &[&str]) -> Self {
        Self {
            exact: Vec::new(),
            patterns: parts.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[must_use]
    pub fn matches(&self, column: &str) -> bool {
        self.exact.iter().any(|n| n == column)
            || self.patterns.iter().any(|p| column.contains(p.as_str()))
    }
}

/// Per-side normalization rules.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FrameRules {
    /// Name the unified name column ends up with.
    pub canonical: String,
    /// Candidate source columns for `canonical`, highest priority first.
    pub aliases: Vec<String>,
    pub numeric: NumericSelector,
}

impl FrameRules {
    /// Rules for per-year results files.
    #[must_use]
    pub fn fact() -> Self {
        Self {
            canonical: "country".into(),
            aliases: vec!["nation".into(), "country".into(), "team".into()],
            numeric: NumericSelector::exact(&["gold", "silver", "bronze", "total", "rank"]),
        }
    }

    /// Rules for the national attributes file.
    #[must_use]
    pub fn reference() -> Self {
        Self {
            canonical: "country".into(),
            aliases: vec!["country".into(), "name".into(), "country_name".into()],
            numeric: NumericSelector::patterns(&[
                "population",
                "area",
                "density",
                "gdp",
                "percapita",
                "index",
                "%",
                "rate",
            ]),
        }
    }
}

/// Trim, lower-case, and join internal whitespace runs with `_`.
#[must_use]
pub fn normalize_column_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Rename every column with [`normalize_column_name`].
///
/// Names that collide after normalization get `_1`, `_2`, ... appended in
/// column order, so the result never carries duplicate names.
pub fn normalize_columns(batch: &RecordBatch) -> Result<RecordBatch> {
    let mut seen = HashSet::new();
    let fields: Vec<Field> = batch
        .schema()
        .fields()
        .iter()
        .map(|field| {
            let base = normalize_column_name(field.name());
            let mut name = base.clone();
            let mut n = 1;
            while seen.contains(&name) {
                name = format!("{base}_{n}");
                n += 1;
            }
            let _ = seen.insert(name.clone());
            Field::new(name, field.data_type().clone(), true)
        })
        .collect();

    rebuild_batch(fields, batch.columns().to_vec(), batch.num_rows())
}

/// Rename the highest-priority alias column to the canonical name.
///
/// When none of the aliases is present a canonical column of nulls is
/// appended. When the chosen alias is not itself the canonical name, an
/// existing column called canonical is dropped rather than merged.
pub fn unify_alias(batch: &RecordBatch, rules: &FrameRules) -> Result<RecordBatch> {
    let schema = batch.schema();
    let chosen = rules
        .aliases
        .iter()
        .find_map(|alias| schema.index_of(alias).ok().map(|idx| (alias, idx)));

    let mut fields = Vec::with_capacity(schema.fields().len() + 1);
    let mut columns = Vec::with_capacity(schema.fields().len() + 1);

    match chosen {
        Some((alias, chosen_idx)) => {
            let canonical = &rules.canonical;
            debug!("using column {alias} as {canonical}", alias: alias, canonical: canonical);
            for (idx, field) in schema.fields().iter().enumerate() {
                if idx == chosen_idx {
                    fields.push(Field::new(&rules.canonical, field.data_type().clone(), true));
                } else if field.name() == &rules.canonical {
                    let shadowed = field.name();
                    debug!(
                        "dropping column {shadowed} shadowed by alias {alias}",
                        shadowed: shadowed,
                        alias: alias
                    );
                    continue;
                } else {
                    fields.push(field.as_ref().clone());
                }
                columns.push(batch.column(idx).clone());
            }
        }
        None => {
            for (idx, field) in schema.fields().iter().enumerate() {
                fields.push(field.as_ref().clone());
                columns.push(batch.column(idx).clone());
            }
            fields.push(Field::new(&rules.canonical, DataType::Utf8, true));
            columns.push(new_null_array(&DataType::Utf8, batch.num_rows()));
        }
    }

    rebuild_batch(fields, columns, batch.num_rows())
}

/// Parse a number out of noisy text.
///
/// Every character other than an ASCII digit, `.` or `-` is removed and the
/// remainder parsed as `f64`. Anything unparseable yields `None`.
///
/// ```
/// use medalstore::parse_numeric;
/// assert_eq!(parse_numeric("1,234 kg"), Some(1234.0));
/// assert_eq!(parse_numeric("N/A"), None);
/// ```
#[must_use]
pub fn parse_numeric(text: &str) -> Option<f64> {
    let kept: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    kept.parse::<f64>().ok()
}

/// Coerce one column to Float64 using [`parse_numeric`] on its text form.
pub fn coerce_numeric(array: &ArrayRef) -> Result<ArrayRef> {
    if array.data_type().is_numeric() {
        return Ok(cast(array, &DataType::Float64)?);
    }

    let text = cast(array, &DataType::Utf8)?;
    let text = text
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| arrow_schema::ArrowError::CastError("expected text column".into()))?;

    let values: Float64Array = text.iter().map(|v| v.and_then(parse_numeric)).collect();
    Ok(Arc::new(values))
}

/// Coerce every column selected by `selector` to Float64.
pub fn coerce_numeric_columns(
    batch: &RecordBatch,
    selector: &NumericSelector,
) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut columns = Vec::with_capacity(schema.fields().len());

    for (idx, field) in schema.fields().iter().enumerate() {
        if selector.matches(field.name()) {
            let column_name = field.name();
            let coerced = coerce_numeric(batch.column(idx))?;
            let missing = coerced.null_count();
            debug!(
                "coerced {column_name} to numeric ({missing} missing)",
                column_name: column_name,
                missing: missing
            );
            fields.push(Field::new(field.name(), DataType::Float64, true));
            columns.push(coerced);
        } else {
            fields.push(field.as_ref().clone());
            columns.push(batch.column(idx).clone());
        }
    }

    rebuild_batch(fields, columns, batch.num_rows())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::record_batch;

    fn names(batch: &RecordBatch) -> Vec<String> {
        batch.schema().fields().iter().map(|f| f.name().clone()).collect()
    }

    #[test]
    fn test_parse_numeric_tolerates_noise() {
        assert_eq!(parse_numeric("1,234 kg"), Some(1234.0));
        assert_eq!(parse_numeric("60,000,000"), Some(60_000_000.0));
        assert_eq!(parse_numeric("-12.5%"), Some(-12.5));
        assert_eq!(parse_numeric(" 7 "), Some(7.0));
        assert_eq!(parse_numeric("N/A"), None);
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("1.2.3"), None);
        assert_eq!(parse_numeric("-"), None);
    }

    #[test]
    fn test_normalize_column_name() {
        assert_eq!(
            normalize_column_name("  Pop. Density (per sq. mi.) "),
            "pop._density_(per_sq._mi.)"
        );
        assert_eq!(normalize_column_name("Gold"), "gold");
        assert_eq!(normalize_column_name("Country\t Name"), "country_name");
    }

    #[test]
    fn test_duplicate_names_are_disambiguated() {
        let batch = record_batch!(
            ("Gold", Int64, [1]),
            ("gold ", Int64, [2]),
            ("GOLD", Int64, [3])
        )
        .unwrap();
        let out = normalize_columns(&batch).unwrap();
        assert_eq!(names(&out), vec!["gold", "gold_1", "gold_2"]);
    }

    #[test]
    fn test_alias_priority_and_shadowing() {
        let batch = record_batch!(
            ("country", Utf8, ["dropped"]),
            ("team", Utf8, ["kept"]),
            ("nation", Utf8, ["France"])
        )
        .unwrap();
        let out = unify_alias(&batch, &FrameRules::fact()).unwrap();
        assert_eq!(names(&out), vec!["team", "country"]);
        let country = out
            .column_by_name("country")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(country.value(0), "France");
    }

    #[test]
    fn test_missing_alias_adds_null_column() {
        let batch = record_batch!(("gold", Int64, [1, 2])).unwrap();
        let out = unify_alias(&batch, &FrameRules::fact()).unwrap();
        assert_eq!(names(&out), vec!["gold", "country"]);
        assert_eq!(out.column(1).null_count(), 2);
        assert_eq!(out.column(1).data_type(), &DataType::Utf8);
    }

    #[test]
    fn test_numeric_coercion_keeps_rows() {
        let batch = record_batch!(
            ("gold", Utf8, [Some("3"), Some("N/A"), None]),
            ("rank", Int64, [Some(1), Some(2), None]),
            ("note", Utf8, [Some("1,000"), Some("x"), Some("y")])
        )
        .unwrap();
        let out = coerce_numeric_columns(&batch, &FrameRules::fact().numeric).unwrap();
        assert_eq!(out.num_rows(), 3);

        let gold = out.column(0).as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(gold.value(0), 3.0);
        assert!(gold.is_null(1));
        assert!(gold.is_null(2));

        let rank = out.column(1).as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(rank.value(1), 2.0);
        assert_eq!(out.column(2).data_type(), &DataType::Utf8);
    }

    #[test]
    fn test_reference_patterns() {
        let selector = FrameRules::reference().numeric;
        assert!(selector.matches("population"));
        assert!(selector.matches("pop._density_(per_sq._mi.)"));
        assert!(selector.matches("literacy_(%)"));
        assert!(selector.matches("birthrate"));
        assert!(!selector.matches("country"));
        assert!(!selector.matches("region"));
    }
}
