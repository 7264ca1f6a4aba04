//! Column-major dataset model.
//!
//! The [`Dataset`] stores named, typed columns in column-major order with a
//! compact validity bitmap per column for tracking missing values. Datasets
//! are immutable once built: construct them through the
//! [`loader`](crate::loader) or [`Dataset::from_columns`], both of which
//! enforce unique names and equal column lengths.
//!
//! # Column Kinds
//!
//! | Kind | Storage | Use case |
//! |------|---------|----------|
//! | [`Numeric`](Column::Numeric) | `Vec<f64>` + bitmap | Measurements, counts |
//! | [`Categorical`](Column::Categorical) | Dictionary + `Vec<u32>` | Labels, groups |
//! | [`Temporal`](Column::Temporal) | `Vec<NaiveDateTime>` + bitmap | Dates, timestamps |
//!
//! # Example
//!
//! ```
//! use tabular_insight::dataset::{Column, Dataset, ValidityBitmap};
//!
//! let ds = Dataset::from_columns(vec![(
//!     "temperature".to_string(),
//!     Column::numeric(vec![20.5, 21.3, 19.8], ValidityBitmap::all_valid(3)),
//! )])
//! .unwrap();
//! assert_eq!(ds.row_count(), 3);
//! assert_eq!(ds.column_count(), 1);
//! ```

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::InsightError;

// ── ValidityBitmap ────────────────────────────────────────────────────

/// Bit-packed validity bitmap using `Vec<u64>`.
///
/// Each bit indicates whether the corresponding row is valid (1) or
/// missing (0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidityBitmap {
    bits: Vec<u64>,
    len: usize,
}

impl ValidityBitmap {
    /// Creates a bitmap where all `len` positions are valid.
    pub fn all_valid(len: usize) -> Self {
        let n_words = len.div_ceil(64);
        let mut bits = vec![u64::MAX; n_words];
        let trailing = len % 64;
        if trailing != 0 && n_words > 0 {
            bits[n_words - 1] = (1u64 << trailing) - 1;
        }
        Self { bits, len }
    }

    /// Creates an empty bitmap with no rows.
    pub fn empty() -> Self {
        Self {
            bits: Vec::new(),
            len: 0,
        }
    }

    /// Returns `true` if the value at `idx` is present.
    #[inline]
    pub fn is_valid(&self, idx: usize) -> bool {
        debug_assert!(idx < self.len, "index {idx} out of bounds (len={})", self.len);
        let (word, bit) = (idx / 64, idx % 64);
        (self.bits[word] >> bit) & 1 == 1
    }

    /// Marks position `idx` as missing.
    #[inline]
    pub fn set_invalid(&mut self, idx: usize) {
        debug_assert!(idx < self.len, "index {idx} out of bounds (len={})", self.len);
        let (word, bit) = (idx / 64, idx % 64);
        self.bits[word] &= !(1u64 << bit);
    }

    /// Appends a new position.
    pub fn push(&mut self, valid: bool) {
        let idx = self.len;
        self.len += 1;
        let (word, bit) = (idx / 64, idx % 64);
        if word >= self.bits.len() {
            self.bits.push(0);
        }
        if valid {
            self.bits[word] |= 1u64 << bit;
        }
    }

    /// Returns the total number of tracked positions.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the bitmap tracks zero positions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Counts the number of missing positions.
    pub fn null_count(&self) -> usize {
        self.len - self.valid_count()
    }

    /// Counts the number of present positions.
    pub fn valid_count(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns an iterator over indices of present positions.
    pub fn valid_indices(&self) -> ValidIndicesIter<'_> {
        ValidIndicesIter {
            bitmap: self,
            current: 0,
        }
    }
}

impl FromIterator<bool> for ValidityBitmap {
    fn from_iter<I: IntoIterator<Item = bool>>(flags: I) -> Self {
        let mut bitmap = Self::empty();
        for valid in flags {
            bitmap.push(valid);
        }
        bitmap
    }
}

/// Iterator over valid indices in a [`ValidityBitmap`].
pub struct ValidIndicesIter<'a> {
    bitmap: &'a ValidityBitmap,
    current: usize,
}

impl Iterator for ValidIndicesIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.current < self.bitmap.len {
            let idx = self.current;
            self.current += 1;
            if self.bitmap.is_valid(idx) {
                return Some(idx);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.bitmap.len - self.current))
    }
}

// ── ColumnKind ────────────────────────────────────────────────────────

/// Declared or inferred kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Continuous or integer values stored as `f64`.
    Numeric,
    /// Labels drawn from a finite set (dictionary-encoded).
    Categorical,
    /// Dates or timestamps.
    Temporal,
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric => write!(f, "numeric"),
            Self::Categorical => write!(f, "categorical"),
            Self::Temporal => write!(f, "temporal"),
        }
    }
}

/// Parses an ISO-8601 date or date-time into a naive UTC timestamp.
///
/// Accepts RFC 3339 (`2024-03-01T10:00:00Z`), naive date-times with `T`
/// or space separators, and plain dates (`2024-03-01`, midnight).
pub fn parse_temporal(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// ── Column ────────────────────────────────────────────────────────────

/// A typed column with validity bitmap for missing values.
///
/// Invalid positions hold a placeholder (0.0, index 0, the epoch) that
/// must be ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Dense `f64` values. Missing positions hold `0.0`.
    Numeric {
        values: Vec<f64>,
        validity: ValidityBitmap,
    },
    /// Dictionary-encoded labels.
    ///
    /// `dictionary` holds unique values in first-seen order and
    /// `indices` maps each row into it.
    Categorical {
        dictionary: Vec<String>,
        indices: Vec<u32>,
        validity: ValidityBitmap,
    },
    /// Parsed timestamps, naive UTC.
    Temporal {
        instants: Vec<NaiveDateTime>,
        validity: ValidityBitmap,
    },
}

impl Column {
    /// Creates a numeric column.
    pub fn numeric(values: Vec<f64>, validity: ValidityBitmap) -> Self {
        Self::Numeric { values, validity }
    }

    /// Creates a categorical column from a dictionary and indices.
    pub fn categorical(dictionary: Vec<String>, indices: Vec<u32>, validity: ValidityBitmap) -> Self {
        Self::Categorical {
            dictionary,
            indices,
            validity,
        }
    }

    /// Creates a temporal column from parsed instants.
    pub fn temporal(instants: Vec<NaiveDateTime>, validity: ValidityBitmap) -> Self {
        Self::Temporal { instants, validity }
    }

    /// Returns the kind of this column.
    pub fn kind(&self) -> ColumnKind {
        match self {
            Self::Numeric { .. } => ColumnKind::Numeric,
            Self::Categorical { .. } => ColumnKind::Categorical,
            Self::Temporal { .. } => ColumnKind::Temporal,
        }
    }

    /// Returns the number of rows in this column.
    pub fn len(&self) -> usize {
        self.validity().len()
    }

    /// Returns `true` if the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a reference to the validity bitmap.
    pub fn validity(&self) -> &ValidityBitmap {
        match self {
            Self::Numeric { validity, .. }
            | Self::Categorical { validity, .. }
            | Self::Temporal { validity, .. } => validity,
        }
    }

    /// Returns the number of missing values.
    pub fn null_count(&self) -> usize {
        self.validity().null_count()
    }

    /// Returns the number of present values.
    pub fn valid_count(&self) -> usize {
        self.validity().valid_count()
    }

    /// Returns `true` if the value at `idx` is present.
    pub fn is_valid(&self, idx: usize) -> bool {
        self.validity().is_valid(idx)
    }

    /// Returns the raw numeric storage, or `None` if not numeric.
    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            Self::Numeric { values, .. } => Some(values),
            _ => None,
        }
    }

    /// Returns the numeric value at `idx` if present.
    pub fn numeric_at(&self, idx: usize) -> Option<f64> {
        match self {
            Self::Numeric { values, validity } if validity.is_valid(idx) => Some(values[idx]),
            _ => None,
        }
    }

    /// Returns `(row, value)` pairs for present numeric values.
    pub fn valid_numeric_pairs(&self) -> Option<Vec<(usize, f64)>> {
        match self {
            Self::Numeric { values, validity } => {
                Some(validity.valid_indices().map(|i| (i, values[i])).collect())
            }
            _ => None,
        }
    }

    /// Returns the category at `idx` in a categorical column.
    pub fn category_at(&self, idx: usize) -> Option<&str> {
        match self {
            Self::Categorical {
                dictionary,
                indices,
                validity,
            } if validity.is_valid(idx) => dictionary.get(indices[idx] as usize).map(|s| s.as_str()),
            _ => None,
        }
    }

    /// Returns the instant at `idx` in a temporal column.
    pub fn instant_at(&self, idx: usize) -> Option<NaiveDateTime> {
        match self {
            Self::Temporal { instants, validity } if validity.is_valid(idx) => Some(instants[idx]),
            _ => None,
        }
    }
}

// ── Dataset ───────────────────────────────────────────────────────────

/// Immutable column-major table.
///
/// All columns have the same number of rows and names are unique.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    names: Vec<String>,
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    /// Builds a dataset from named columns.
    ///
    /// Fails with [`InsightError::DuplicateColumn`] or
    /// [`InsightError::DimensionMismatch`] when the invariants don't hold.
    pub fn from_columns(columns: Vec<(String, Column)>) -> Result<Self, InsightError> {
        let row_count = columns.first().map_or(0, |(_, c)| c.len());
        let mut seen = HashSet::with_capacity(columns.len());
        let mut names = Vec::with_capacity(columns.len());
        let mut cols = Vec::with_capacity(columns.len());

        for (name, column) in columns {
            if !seen.insert(name.clone()) {
                return Err(InsightError::DuplicateColumn { name });
            }
            if column.len() != row_count {
                return Err(InsightError::DimensionMismatch {
                    column: name,
                    expected: row_count,
                    actual: column.len(),
                });
            }
            names.push(name);
            cols.push(column);
        }

        Ok(Self {
            names,
            columns: cols,
            row_count,
        })
    }

    /// Returns the number of rows.
    #[inline]
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Returns the number of columns.
    #[inline]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the dataset has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns column names in order.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Returns the column at `index`.
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Returns the column with the given `name`.
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.column_index(name).map(|i| &self.columns[i])
    }

    /// Returns the position of the column with the given `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Returns an iterator over `(name, column)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(|s| s.as_str()).zip(self.columns.iter())
    }

    /// Returns names of numeric columns in dataset order.
    pub fn numeric_column_names(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, c)| c.kind() == ColumnKind::Numeric)
            .map(|(n, _)| n)
            .collect()
    }

    /// Returns `(name, kind)` for every column.
    pub fn schema(&self) -> Vec<(&str, ColumnKind)> {
        self.iter().map(|(n, c)| (n, c.kind())).collect()
    }

    /// Returns the shape of the dataset as an owned, serializable value.
    pub fn meta(&self) -> DatasetMeta {
        DatasetMeta {
            row_count: self.row_count,
            column_count: self.columns.len(),
            columns: self
                .iter()
                .map(|(name, col)| ColumnMeta {
                    name: name.to_string(),
                    kind: col.kind(),
                    missing: col.null_count(),
                })
                .collect(),
        }
    }
}

/// Per-column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub kind: ColumnKind,
    pub missing: usize,
}

/// Shape of a dataset: row count and per-column kind and missing count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMeta {
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<ColumnMeta>,
}

impl DatasetMeta {
    /// Number of columns of `kind`.
    pub fn count_of(&self, kind: ColumnKind) -> usize {
        self.columns.iter().filter(|c| c.kind == kind).count()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_all_valid() {
        let bm = ValidityBitmap::all_valid(100);
        assert_eq!(bm.len(), 100);
        assert_eq!(bm.null_count(), 0);
        assert!((0..100).all(|i| bm.is_valid(i)));
    }

    #[test]
    fn bitmap_boundary_64() {
        let bm = ValidityBitmap::all_valid(64);
        assert_eq!(bm.bits.len(), 1);
        assert_eq!(bm.valid_count(), 64);

        let bm65 = ValidityBitmap::all_valid(65);
        assert_eq!(bm65.bits.len(), 2);
        assert!(bm65.is_valid(64));
    }

    #[test]
    fn bitmap_push_across_word_boundary() {
        let mut bm = ValidityBitmap::empty();
        for i in 0..130 {
            bm.push(i % 3 != 0);
        }
        let expected_nulls = (0..130).filter(|i| i % 3 == 0).count();
        assert_eq!(bm.null_count(), expected_nulls);
        assert!(!bm.is_valid(129));
        assert!(bm.is_valid(128));
    }

    #[test]
    fn bitmap_valid_indices() {
        let mut bm = ValidityBitmap::all_valid(5);
        bm.set_invalid(1);
        bm.set_invalid(3);
        let indices: Vec<usize> = bm.valid_indices().collect();
        assert_eq!(indices, vec![0, 2, 4]);

        let missing: ValidityBitmap = [false; 5].into_iter().collect();
        assert_eq!(missing.len(), 5);
        assert_eq!(missing.valid_indices().count(), 0);
    }

    #[test]
    fn numeric_column_access() {
        let mut validity = ValidityBitmap::all_valid(3);
        validity.set_invalid(1);
        let col = Column::numeric(vec![1.0, 0.0, 3.0], validity);
        assert_eq!(col.kind(), ColumnKind::Numeric);
        assert_eq!(col.numeric_at(0), Some(1.0));
        assert_eq!(col.numeric_at(1), None);
        assert_eq!(col.valid_numeric_pairs(), Some(vec![(0, 1.0), (2, 3.0)]));
    }

    #[test]
    fn categorical_column_access() {
        let mut validity = ValidityBitmap::all_valid(3);
        validity.set_invalid(1);
        let col = Column::categorical(vec!["a".into(), "b".into()], vec![0, 0, 1], validity);
        assert_eq!(col.category_at(0), Some("a"));
        assert_eq!(col.category_at(1), None);
        assert_eq!(col.category_at(2), Some("b"));
        assert!(col.valid_numeric_pairs().is_none());
    }

    #[test]
    fn temporal_parsing() {
        let day = parse_temporal("2024-03-05").expect("date");
        assert_eq!(day.to_string(), "2024-03-05 00:00:00");
        let ts = parse_temporal("2024-03-05T10:30:00Z").expect("rfc3339");
        assert!(ts > day);
        assert!(parse_temporal("2024-03-05 10:30:00").is_some());
        assert!(parse_temporal("yesterday").is_none());
        assert!(parse_temporal("42").is_none());
    }

    #[test]
    fn from_columns_rejects_duplicates() {
        let err = Dataset::from_columns(vec![
            ("x".into(), Column::numeric(vec![1.0], ValidityBitmap::all_valid(1))),
            ("x".into(), Column::numeric(vec![2.0], ValidityBitmap::all_valid(1))),
        ])
        .unwrap_err();
        assert_eq!(err, InsightError::DuplicateColumn { name: "x".into() });
    }

    #[test]
    fn from_columns_rejects_length_mismatch() {
        let err = Dataset::from_columns(vec![
            ("x".into(), Column::numeric(vec![1.0, 2.0], ValidityBitmap::all_valid(2))),
            ("y".into(), Column::numeric(vec![1.0], ValidityBitmap::all_valid(1))),
        ])
        .unwrap_err();
        assert!(matches!(err, InsightError::DimensionMismatch { .. }));
    }

    #[test]
    fn schema_and_lookup() {
        let ds = Dataset::from_columns(vec![
            ("x".into(), Column::numeric(vec![1.0], ValidityBitmap::all_valid(1))),
            (
                "label".into(),
                Column::categorical(vec!["a".into()], vec![0], ValidityBitmap::all_valid(1)),
            ),
        ])
        .unwrap();
        assert_eq!(ds.schema(), vec![("x", ColumnKind::Numeric), ("label", ColumnKind::Categorical)]);
        assert_eq!(ds.numeric_column_names(), vec!["x"]);
        assert_eq!(ds.column_index("label"), Some(1));
        assert!(ds.column_by_name("missing").is_none());
    }

    #[test]
    fn meta_counts_kinds_and_missing() {
        let mut validity = ValidityBitmap::all_valid(2);
        validity.set_invalid(0);
        let ds = Dataset::from_columns(vec![
            ("a".into(), Column::numeric(vec![0.0, 2.0], validity)),
            ("b".into(), Column::numeric(vec![1.0, 2.0], ValidityBitmap::all_valid(2))),
            (
                "label".into(),
                Column::categorical(vec!["x".into()], vec![0, 0], ValidityBitmap::all_valid(2)),
            ),
        ])
        .unwrap();
        let meta = ds.meta();
        assert_eq!(meta.row_count, 2);
        assert_eq!(meta.column_count, 3);
        assert_eq!(meta.columns[0].missing, 1);
        assert_eq!(meta.count_of(ColumnKind::Numeric), 2);
        assert_eq!(meta.count_of(ColumnKind::Categorical), 1);
        assert_eq!(meta.count_of(ColumnKind::Temporal), 0);
    }
}
