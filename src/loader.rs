//! Dataset loading with kind inference and validation.
//!
//! Turns a [`RawTable`] (a header plus rows of loosely-typed cells) into an
//! immutable [`Dataset`]. Column kinds are either declared explicitly or
//! inferred from content with the priority Numeric → Temporal → Categorical.
//!
//! # Features
//!
//! - Standard missing markers recognized: empty, `NA`, `N/A`, `null`, `NULL`,
//!   `None`, `NaN`, `.`, `#N/A`
//! - Numeric strings are coerced (`" 3.5 "` → `3.5`), booleans become 1/0
//! - A configurable share of non-coercible cells may be tolerated as missing
//! - Records (JSON-like objects) can be loaded directly
//!
//! # Example
//!
//! ```
//! use tabular_insight::dataset::ColumnKind;
//! use tabular_insight::loader::{load, KindDeclaration, LoaderConfig, RawTable, RawValue};
//!
//! let mut table = RawTable::new(vec!["name".into(), "value".into()]);
//! table.push_row(vec![RawValue::from("Alice"), RawValue::from(1.5)]);
//! table.push_row(vec![RawValue::from("Bob"), RawValue::from("2.25")]);
//!
//! let ds = load(&table, &KindDeclaration::inferred(), &LoaderConfig::default()).unwrap();
//! assert_eq!(ds.row_count(), 2);
//! assert_eq!(ds.schema()[0].1, ColumnKind::Categorical);
//! assert_eq!(ds.schema()[1].1, ColumnKind::Numeric);
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::dataset::{parse_temporal, Column, ColumnKind, Dataset, ValidityBitmap};
use crate::error::InsightError;

/// Standard missing-value markers recognized in text cells.
const DEFAULT_NULL_MARKERS: &[&str] = &[
    "", "NA", "N/A", "na", "n/a", "null", "NULL", "None", "none", ".", "NaN", "nan", "NAN",
    "#N/A", "#NA",
];

// ── Raw input ─────────────────────────────────────────────────────────

/// A single loosely-typed input cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// Explicitly missing.
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<bool> for RawValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<&serde_json::Value> for RawValue {
    fn from(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            serde_json::Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }
}

/// Row-major input table: a header and rows of cells in header order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    /// Column names.
    pub columns: Vec<String>,
    /// Rows of cells, each expected to match `columns` in length.
    pub rows: Vec<Vec<RawValue>>,
}

impl RawTable {
    /// Creates an empty table with the given header.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Appends one row. Length is checked when the table is loaded.
    pub fn push_row(&mut self, row: Vec<RawValue>) -> &mut Self {
        self.rows.push(row);
        self
    }

    /// Builds a table from a list of records (JSON objects).
    ///
    /// Columns appear in first-seen key order; a record without a given
    /// key contributes a missing cell.
    ///
    /// ```
    /// use serde_json::json;
    /// use tabular_insight::loader::{RawTable, RawValue};
    ///
    /// let records = vec![json!({"a": 1, "b": "x"}), json!({"a": 2, "c": true})];
    /// let table = RawTable::from_records(&records).unwrap();
    /// assert_eq!(table.columns, vec!["a", "b", "c"]);
    /// assert_eq!(table.rows[1][1], RawValue::Null);
    /// ```
    pub fn from_records(records: &[serde_json::Value]) -> Result<Self, InsightError> {
        let mut columns: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut objects = Vec::with_capacity(records.len());

        for (row, record) in records.iter().enumerate() {
            let obj = record.as_object().ok_or(InsightError::NotARecord { row })?;
            for key in obj.keys() {
                if seen.insert(key.clone()) {
                    columns.push(key.clone());
                }
            }
            objects.push(obj);
        }

        let rows = objects
            .into_iter()
            .map(|obj| {
                columns
                    .iter()
                    .map(|name| obj.get(name).map_or(RawValue::Null, RawValue::from))
                    .collect()
            })
            .collect();

        Ok(Self { columns, rows })
    }
}

// ── Declarations and configuration ────────────────────────────────────

/// Per-column kind declarations. Undeclared columns are inferred.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KindDeclaration {
    explicit: BTreeMap<String, ColumnKind>,
}

impl KindDeclaration {
    /// Infers every column's kind from its content.
    pub fn inferred() -> Self {
        Self::default()
    }

    /// Declares the kind of one column.
    pub fn declare(mut self, column: impl Into<String>, kind: ColumnKind) -> Self {
        self.explicit.insert(column.into(), kind);
        self
    }

    /// Returns the declared kind for `column`, if any.
    pub fn get(&self, column: &str) -> Option<ColumnKind> {
        self.explicit.get(column).copied()
    }
}

/// Loader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Fraction of non-missing cells in a declared column that may fail
    /// coercion and be treated as missing instead. Default: 0.0.
    pub missing_tolerance: f64,
    /// Text values treated as missing (compared after trimming).
    pub null_markers: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            missing_tolerance: 0.0,
            null_markers: DEFAULT_NULL_MARKERS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl LoaderConfig {
    /// Sets the coercion-failure tolerance (fraction in `[0, 1]`).
    pub fn missing_tolerance(mut self, tolerance: f64) -> Self {
        self.missing_tolerance = tolerance;
        self
    }

    /// Replaces the missing-value markers.
    pub fn null_markers(mut self, markers: Vec<String>) -> Self {
        self.null_markers = markers;
        self
    }

    /// Checks that the tolerance lies in `[0, 1]`.
    pub fn validate(&self) -> Result<(), InsightError> {
        if !(0.0..=1.0).contains(&self.missing_tolerance) {
            return Err(InsightError::InvalidThreshold {
                name: "missing_tolerance",
                value: self.missing_tolerance,
            });
        }
        Ok(())
    }

    fn is_null(&self, value: &RawValue) -> bool {
        match value {
            RawValue::Null => true,
            RawValue::Number(v) => !v.is_finite(),
            RawValue::Text(s) => {
                let trimmed = s.trim();
                self.null_markers.iter().any(|m| m == trimmed)
            }
            RawValue::Bool(_) => false,
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────

/// Validates `table` and builds a [`Dataset`].
///
/// # Errors
///
/// - [`InsightError::InvalidThreshold`] for a tolerance outside `[0, 1]`
/// - [`InsightError::EmptySchema`], [`InsightError::DuplicateColumn`],
///   [`InsightError::UnknownColumn`], [`InsightError::RaggedRow`] for
///   structural problems
/// - [`InsightError::KindMismatch`] when a declared column has more
///   non-coercible cells than the tolerance allows
pub fn load(
    table: &RawTable,
    kinds: &KindDeclaration,
    config: &LoaderConfig,
) -> Result<Dataset, InsightError> {
    config.validate()?;

    if table.columns.is_empty() {
        return Err(InsightError::EmptySchema);
    }

    let mut seen = HashSet::with_capacity(table.columns.len());
    for name in &table.columns {
        if !seen.insert(name.as_str()) {
            return Err(InsightError::DuplicateColumn { name: name.clone() });
        }
    }

    if let Some(unknown) = kinds.explicit.keys().find(|k| !seen.contains(k.as_str())) {
        return Err(InsightError::UnknownColumn {
            name: unknown.clone(),
        });
    }

    let n_cols = table.columns.len();
    for (row, cells) in table.rows.iter().enumerate() {
        if cells.len() != n_cols {
            return Err(InsightError::RaggedRow {
                row,
                expected: n_cols,
                actual: cells.len(),
            });
        }
    }

    let mut columns = Vec::with_capacity(n_cols);
    for (col_idx, name) in table.columns.iter().enumerate() {
        let cells: Vec<&RawValue> = table.rows.iter().map(|r| &r[col_idx]).collect();
        let nulls: Vec<bool> = cells.iter().map(|c| config.is_null(c)).collect();

        let kind = match kinds.get(name) {
            Some(kind) => kind,
            None => infer_kind(&cells, &nulls),
        };
        tracing::debug!(column = %name, %kind, declared = kinds.get(name).is_some(), "column kind");

        let column = match kind {
            ColumnKind::Numeric => build_numeric(name, &cells, &nulls, config.missing_tolerance)?,
            ColumnKind::Temporal => build_temporal(name, &cells, &nulls, config.missing_tolerance)?,
            ColumnKind::Categorical => build_categorical(&cells, &nulls),
        };
        columns.push((name.clone(), column));
    }

    Dataset::from_columns(columns)
}

/// Determines the most specific kind that fits all non-missing cells.
fn infer_kind(cells: &[&RawValue], nulls: &[bool]) -> ColumnKind {
    let present: Vec<&RawValue> = cells
        .iter()
        .zip(nulls)
        .filter(|(_, &is_null)| !is_null)
        .map(|(&c, _)| c)
        .collect();

    // All missing: default to numeric so the column still gets a summary
    if present.iter().all(|c| coerce_numeric(c).is_some()) {
        return ColumnKind::Numeric;
    }
    if present.iter().all(|c| coerce_temporal(c).is_some()) {
        return ColumnKind::Temporal;
    }
    ColumnKind::Categorical
}

fn coerce_numeric(value: &RawValue) -> Option<f64> {
    let v = match value {
        RawValue::Number(v) => *v,
        RawValue::Bool(b) => f64::from(u8::from(*b)),
        RawValue::Text(s) => s.trim().parse::<f64>().ok()?,
        RawValue::Null => return None,
    };
    v.is_finite().then_some(v)
}

fn coerce_temporal(value: &RawValue) -> Option<NaiveDateTime> {
    match value {
        RawValue::Text(s) => parse_temporal(s),
        _ => None,
    }
}

fn category_label(value: &RawValue) -> String {
    match value {
        RawValue::Text(s) => s.trim().to_string(),
        RawValue::Number(v) => v.to_string(),
        RawValue::Bool(b) => b.to_string(),
        RawValue::Null => String::new(),
    }
}

/// Maximum number of failed coercions tolerated among `present` cells.
fn allowed_failures(present: usize, tolerance: f64) -> usize {
    (present as f64 * tolerance).floor() as usize
}

fn check_tolerance(
    column: &str,
    kind: ColumnKind,
    invalid: usize,
    present: usize,
    tolerance: f64,
) -> Result<(), InsightError> {
    let allowed = allowed_failures(present, tolerance);
    if invalid > allowed {
        return Err(InsightError::KindMismatch {
            column: column.to_string(),
            kind,
            invalid,
            allowed,
        });
    }
    if invalid > 0 {
        tracing::warn!(column, %kind, invalid, "treating non-coercible values as missing");
    }
    Ok(())
}

fn build_numeric(
    name: &str,
    cells: &[&RawValue],
    nulls: &[bool],
    tolerance: f64,
) -> Result<Column, InsightError> {
    let mut values = Vec::with_capacity(cells.len());
    let mut validity = ValidityBitmap::empty();
    let mut invalid = 0usize;

    for (cell, &is_null) in cells.iter().zip(nulls) {
        let parsed = if is_null { None } else { coerce_numeric(cell) };
        if !is_null && parsed.is_none() {
            invalid += 1;
        }
        values.push(parsed.unwrap_or(0.0));
        validity.push(parsed.is_some());
    }

    let present = nulls.iter().filter(|&&n| !n).count();
    check_tolerance(name, ColumnKind::Numeric, invalid, present, tolerance)?;
    Ok(Column::numeric(values, validity))
}

fn build_temporal(
    name: &str,
    cells: &[&RawValue],
    nulls: &[bool],
    tolerance: f64,
) -> Result<Column, InsightError> {
    let mut instants = Vec::with_capacity(cells.len());
    let mut validity = ValidityBitmap::empty();
    let mut invalid = 0usize;

    for (cell, &is_null) in cells.iter().zip(nulls) {
        let parsed = if is_null { None } else { coerce_temporal(cell) };
        if !is_null && parsed.is_none() {
            invalid += 1;
        }
        match parsed {
            Some(instant) => {
                instants.push(instant);
                validity.push(true);
            }
            None => {
                instants.push(NaiveDateTime::default());
                validity.push(false);
            }
        }
    }

    let present = nulls.iter().filter(|&&n| !n).count();
    check_tolerance(name, ColumnKind::Temporal, invalid, present, tolerance)?;
    Ok(Column::temporal(instants, validity))
}

fn build_categorical(cells: &[&RawValue], nulls: &[bool]) -> Column {
    let mut dict_map: HashMap<String, u32> = HashMap::new();
    let mut dictionary: Vec<String> = Vec::new();
    let mut indices = Vec::with_capacity(cells.len());
    let mut validity = ValidityBitmap::empty();

    for (cell, &is_null) in cells.iter().zip(nulls) {
        if is_null {
            indices.push(0);
            validity.push(false);
            continue;
        }
        let label = category_label(cell);
        let idx = match dict_map.get(&label) {
            Some(&existing) => existing,
            None => {
                let idx = dictionary.len() as u32;
                dictionary.push(label.clone());
                dict_map.insert(label, idx);
                idx
            }
        };
        indices.push(idx);
        validity.push(true);
    }

    Column::categorical(dictionary, indices, validity)
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(columns: &[&str], rows: Vec<Vec<RawValue>>) -> RawTable {
        RawTable {
            columns: columns.iter().map(|s| (*s).to_string()).collect(),
            rows,
        }
    }

    #[test]
    fn infers_numeric_temporal_categorical() {
        let t = table(
            &["x", "when", "city"],
            vec![
                vec![RawValue::Number(1.0), "2024-01-01".into(), "NYC".into()],
                vec!["2.5".into(), "2024-01-02".into(), "LA".into()],
                vec![RawValue::Null, "2024-01-03".into(), "NYC".into()],
            ],
        );
        let ds = load(&t, &KindDeclaration::inferred(), &LoaderConfig::default()).unwrap();
        assert_eq!(
            ds.schema(),
            vec![
                ("x", ColumnKind::Numeric),
                ("when", ColumnKind::Temporal),
                ("city", ColumnKind::Categorical)
            ]
        );
        let x = ds.column_by_name("x").unwrap();
        assert_eq!(x.valid_numeric_pairs().unwrap(), vec![(0, 1.0), (1, 2.5)]);
        assert_eq!(x.null_count(), 1);
        let city = ds.column_by_name("city").unwrap();
        assert_eq!(city.category_at(2), Some("NYC"));
    }

    #[test]
    fn null_markers_and_booleans() {
        let t = table(
            &["v"],
            vec![vec!["NA".into()], vec![true.into()], vec![" 4 ".into()], vec![f64::NAN.into()]],
        );
        let ds = load(&t, &KindDeclaration::inferred(), &LoaderConfig::default()).unwrap();
        let v = ds.column(0).unwrap();
        assert_eq!(v.kind(), ColumnKind::Numeric);
        assert_eq!(v.valid_numeric_pairs().unwrap(), vec![(1, 1.0), (2, 4.0)]);
    }

    #[test]
    fn all_missing_column_is_numeric() {
        let t = table(&["v"], vec![vec![RawValue::Null], vec!["".into()]]);
        let ds = load(&t, &KindDeclaration::inferred(), &LoaderConfig::default()).unwrap();
        assert_eq!(ds.column(0).unwrap().kind(), ColumnKind::Numeric);
        assert_eq!(ds.column(0).unwrap().valid_count(), 0);
    }

    #[test]
    fn ragged_row_is_schema_error() {
        let t = table(
            &["a", "b"],
            vec![
                vec![RawValue::Number(1.0), RawValue::Number(2.0)],
                vec![RawValue::Number(3.0)],
            ],
        );
        let err = load(&t, &KindDeclaration::inferred(), &LoaderConfig::default()).unwrap_err();
        assert_eq!(
            err,
            InsightError::RaggedRow {
                row: 1,
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn duplicate_header_is_schema_error() {
        let t = table(&["a", "a"], vec![vec![RawValue::Number(1.0), RawValue::Number(2.0)]]);
        let err = load(&t, &KindDeclaration::inferred(), &LoaderConfig::default()).unwrap_err();
        assert_eq!(err, InsightError::DuplicateColumn { name: "a".into() });
    }

    #[test]
    fn empty_header_and_unknown_declaration() {
        let err = load(&RawTable::default(), &KindDeclaration::inferred(), &LoaderConfig::default())
            .unwrap_err();
        assert_eq!(err, InsightError::EmptySchema);

        let t = table(&["a"], vec![vec![RawValue::Number(1.0)]]);
        let kinds = KindDeclaration::inferred().declare("b", ColumnKind::Numeric);
        let err = load(&t, &kinds, &LoaderConfig::default()).unwrap_err();
        assert_eq!(err, InsightError::UnknownColumn { name: "b".into() });
    }

    #[test]
    fn declared_numeric_with_text_is_type_error() {
        let t = table(&["price"], vec![vec!["10".into()], vec!["n/a-ish".into()], vec!["12".into()]]);
        let kinds = KindDeclaration::inferred().declare("price", ColumnKind::Numeric);
        let err = load(&t, &kinds, &LoaderConfig::default()).unwrap_err();
        assert_eq!(
            err,
            InsightError::KindMismatch {
                column: "price".into(),
                kind: ColumnKind::Numeric,
                invalid: 1,
                allowed: 0,
            }
        );
    }

    #[test]
    fn tolerance_converts_failures_to_missing() {
        let t = table(
            &["price"],
            vec![vec!["10".into()], vec!["oops".into()], vec!["12".into()], vec!["13".into()]],
        );
        let kinds = KindDeclaration::inferred().declare("price", ColumnKind::Numeric);
        let config = LoaderConfig::default().missing_tolerance(0.25);
        let ds = load(&t, &kinds, &config).unwrap();
        let price = ds.column(0).unwrap();
        assert_eq!(price.null_count(), 1);
        assert_eq!(price.numeric_at(1), None);
    }

    #[test]
    fn invalid_tolerance_is_configuration_error() {
        let t = table(&["a"], vec![vec![RawValue::Number(1.0)]]);
        let config = LoaderConfig::default().missing_tolerance(1.5);
        let err = load(&t, &KindDeclaration::inferred(), &config).unwrap_err();
        assert!(matches!(err, InsightError::InvalidThreshold { name: "missing_tolerance", .. }));
    }

    #[test]
    fn declared_categorical_keeps_numbers_as_labels() {
        let t = table(&["zip"], vec![vec![RawValue::Number(10001.0)], vec!["10002".into()]]);
        let kinds = KindDeclaration::inferred().declare("zip", ColumnKind::Categorical);
        let ds = load(&t, &kinds, &LoaderConfig::default()).unwrap();
        let zip = ds.column(0).unwrap();
        assert_eq!(zip.category_at(0), Some("10001"));
        assert_eq!(zip.category_at(1), Some("10002"));
    }

    #[test]
    fn records_with_missing_keys() {
        let records = vec![
            json!({"id": 1, "value": 10.0, "timestamp": "2024-02-01"}),
            json!({"id": 2, "timestamp": "2024-01-01"}),
        ];
        let t = RawTable::from_records(&records).unwrap();
        assert_eq!(t.columns, vec!["id", "value", "timestamp"]);
        let ds = load(&t, &KindDeclaration::inferred(), &LoaderConfig::default()).unwrap();
        assert_eq!(ds.column_by_name("value").unwrap().null_count(), 1);
        assert_eq!(ds.column_by_name("timestamp").unwrap().kind(), ColumnKind::Temporal);
    }

    #[test]
    fn non_object_record_rejected() {
        let err = RawTable::from_records(&[json!({"a": 1}), json!([1, 2])]).unwrap_err();
        assert_eq!(err, InsightError::NotARecord { row: 1 });
    }
}
