//! Descriptive statistics per column.
//!
//! Numeric columns get a [`ColumnSummary`] computed over present values
//! only. Statistics that are undefined (no present values, or a result
//! beyond the `f64` range) are `None` rather than `0.0` or NaN, so
//! consumers can tell "no data" from "zero".
//!
//! Quartiles use linear interpolation between order statistics: for
//! probability `p` over `n` sorted values the position is `p·(n−1)`.
//!
//! Categorical and temporal columns get lighter summaries
//! ([`CategoricalSummary`], [`TemporalSummary`]).
//!
//! # Example
//!
//! ```
//! use tabular_insight::dataset::{Column, ValidityBitmap};
//! use tabular_insight::stats::summarize_column;
//!
//! let col = Column::numeric(vec![1.0, 2.0, 3.0, 4.0, 100.0], ValidityBitmap::all_valid(5));
//! let summary = summarize_column("value", &col).unwrap();
//! assert_eq!(summary.count, 5);
//! assert!((summary.mean.unwrap() - 22.0).abs() < 1e-12);
//! assert_eq!(summary.q1, Some(2.0));
//! assert_eq!(summary.q3, Some(4.0));
//! ```

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::dataset::{Column, Dataset};

/// Number of most frequent categories kept in a [`CategoricalSummary`].
const TOP_VALUES: usize = 5;

// ── Numeric summary ───────────────────────────────────────────────────

/// Descriptive statistics for a numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    /// Column name.
    pub column: String,
    /// Number of present values.
    pub count: usize,
    /// Number of missing values.
    pub missing: usize,
    /// Arithmetic mean.
    pub mean: Option<f64>,
    /// Median (equal to `q2`).
    pub median: Option<f64>,
    /// Sample standard deviation (n−1 denominator, 0 for a single value).
    pub std_dev: Option<f64>,
    /// Minimum value.
    pub min: Option<f64>,
    /// Maximum value.
    pub max: Option<f64>,
    /// 25th percentile.
    pub q1: Option<f64>,
    /// 50th percentile.
    pub q2: Option<f64>,
    /// 75th percentile.
    pub q3: Option<f64>,
}

impl ColumnSummary {
    /// Interquartile range `Q3 − Q1`.
    pub fn iqr(&self) -> Option<f64> {
        Some(self.q3? - self.q1?)
    }

    /// `max − min`.
    pub fn range(&self) -> Option<f64> {
        Some(self.max? - self.min?)
    }

    /// Returns `true` when at least one value was present.
    pub fn has_data(&self) -> bool {
        self.count > 0
    }
}

/// Summarizes a numeric column, or returns `None` for other kinds.
pub fn summarize_column(name: &str, col: &Column) -> Option<ColumnSummary> {
    let pairs = col.valid_numeric_pairs()?;
    let values: Vec<f64> = pairs.into_iter().map(|(_, v)| v).collect();
    Some(summarize_values(name, &values, col.null_count()))
}

/// Summarizes every numeric column, in dataset order.
pub fn summarize_dataset(ds: &Dataset) -> Vec<ColumnSummary> {
    ds.iter()
        .filter_map(|(name, col)| summarize_column(name, col))
        .collect()
}

/// Computes a summary over present `values`.
pub fn summarize_values(name: &str, values: &[f64], missing: usize) -> ColumnSummary {
    let count = values.len();
    if count == 0 {
        return ColumnSummary {
            column: name.to_string(),
            count: 0,
            missing,
            mean: None,
            median: None,
            std_dev: None,
            min: None,
            max: None,
            q1: None,
            q2: None,
            q3: None,
        };
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let std_dev = if count <= 1 {
        Some(0.0)
    } else {
        finite(u_numflow::stats::std_dev(values))
    };
    let quartile = |p| finite(u_numflow::stats::quantile_sorted(&sorted, p));
    let q2 = quartile(0.5);

    ColumnSummary {
        column: name.to_string(),
        count,
        missing,
        mean: finite(u_numflow::stats::mean(values)),
        median: q2,
        std_dev,
        min: u_numflow::stats::min(values),
        max: u_numflow::stats::max(values),
        q1: quartile(0.25),
        q2,
        q3: quartile(0.75),
    }
}

/// Keeps a statistic only if it fits in an `f64`; sums over values near
/// `f64::MAX` overflow.
fn finite(stat: Option<f64>) -> Option<f64> {
    stat.filter(|v| v.is_finite())
}

/// Power of two at or just below the largest magnitude in `values`.
///
/// Dividing by it keeps sums of squares in range without changing any
/// mantissa bits. `1.0` for all-zero or non-finite input.
pub(crate) fn magnitude_scale(values: &[f64]) -> f64 {
    let peak = values.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if peak > 0.0 && peak.is_finite() {
        peak.log2().floor().exp2()
    } else {
        1.0
    }
}

/// `values / scale`, with the scaled mean.
pub(crate) fn rescaled(values: &[f64], scale: f64) -> (Vec<f64>, Option<f64>) {
    let scaled: Vec<f64> = values.iter().map(|v| v / scale).collect();
    let mean = u_numflow::stats::mean(&scaled);
    (scaled, mean)
}

// ── Categorical summary ───────────────────────────────────────────────

/// A category and how often it occurs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// Frequency statistics for a categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalSummary {
    /// Column name.
    pub column: String,
    /// Number of present values.
    pub count: usize,
    /// Number of missing values.
    pub missing: usize,
    /// Number of distinct categories.
    pub distinct: usize,
    /// Most frequent categories, count descending then value ascending.
    pub top_values: Vec<ValueCount>,
}

/// Summarizes a categorical column, or returns `None` for other kinds.
pub fn summarize_categorical(name: &str, col: &Column) -> Option<CategoricalSummary> {
    let Column::Categorical {
        dictionary,
        indices,
        validity,
    } = col
    else {
        return None;
    };

    let mut counts: HashMap<u32, usize> = HashMap::new();
    for i in validity.valid_indices() {
        *counts.entry(indices[i]).or_insert(0) += 1;
    }

    let mut top_values: Vec<ValueCount> = counts
        .into_iter()
        .map(|(idx, count)| ValueCount {
            value: dictionary[idx as usize].clone(),
            count,
        })
        .collect();
    let distinct = top_values.len();
    top_values.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    top_values.truncate(TOP_VALUES);

    Some(CategoricalSummary {
        column: name.to_string(),
        count: col.valid_count(),
        missing: col.null_count(),
        distinct,
        top_values,
    })
}

// ── Temporal summary ──────────────────────────────────────────────────

/// Coverage of a temporal column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalSummary {
    /// Column name.
    pub column: String,
    /// Number of present values.
    pub count: usize,
    /// Number of missing values.
    pub missing: usize,
    /// Earliest instant.
    pub earliest: Option<NaiveDateTime>,
    /// Latest instant.
    pub latest: Option<NaiveDateTime>,
}

/// Summarizes a temporal column, or returns `None` for other kinds.
pub fn summarize_temporal(name: &str, col: &Column) -> Option<TemporalSummary> {
    let Column::Temporal {
        instants, validity, ..
    } = col
    else {
        return None;
    };

    let present = || validity.valid_indices().map(|i| instants[i]);
    Some(TemporalSummary {
        column: name.to_string(),
        count: col.valid_count(),
        missing: col.null_count(),
        earliest: present().min(),
        latest: present().max(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────
