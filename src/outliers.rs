//! Univariate outlier detection.
//!
//! Two methods are always run side by side on every numeric column and
//! reported separately, so a value may be flagged by both, one or neither:
//!
//! - **IQR (Tukey fences)**: flagged if `v < Q1 − k·IQR` or `v > Q3 + k·IQR`.
//!   Score is the distance to the nearest fence in IQR units.
//! - **Z-score**: `z = (v − mean) / std`, flagged if `|z| > threshold`.
//!   Zero-variance columns produce no Z-score flags.
//!
//! Quartiles, mean and standard deviation are taken from the column's
//! [`ColumnSummary`] rather than recomputed.
//!
//! # Example
//!
//! ```
//! use tabular_insight::dataset::{Column, ValidityBitmap};
//! use tabular_insight::outliers::{detect_outliers, OutlierConfig, OutlierMethod};
//! use tabular_insight::stats::summarize_column;
//!
//! let col = Column::numeric(vec![1.0, 2.0, 3.0, 4.0, 100.0], ValidityBitmap::all_valid(5));
//! let summary = summarize_column("value", &col).unwrap();
//! let report = detect_outliers("value", &col, &summary, &OutlierConfig::default()).unwrap();
//!
//! assert_eq!(report.count(OutlierMethod::Iqr), 1);
//! assert_eq!(report.count(OutlierMethod::ZScore), 0);
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::dataset::Column;
use crate::error::InsightError;
use crate::stats::ColumnSummary;

/// Standard deviations below this are treated as zero variance.
const ZERO_VARIANCE: f64 = 1e-15;

// ── Configuration ─────────────────────────────────────────────────────

/// Thresholds for outlier detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    /// Tukey fence multiplier `k`. Default: 1.5.
    pub iqr_factor: f64,
    /// Absolute Z-score above which a value is flagged. Default: 3.0.
    pub zscore_threshold: f64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            iqr_factor: 1.5,
            zscore_threshold: 3.0,
        }
    }
}

impl OutlierConfig {
    /// Sets the IQR fence multiplier.
    pub fn iqr_factor(mut self, k: f64) -> Self {
        self.iqr_factor = k;
        self
    }

    /// Sets the Z-score threshold.
    pub fn zscore_threshold(mut self, threshold: f64) -> Self {
        self.zscore_threshold = threshold;
        self
    }

    /// Rejects negative or non-finite factors and non-positive thresholds.
    pub fn validate(&self) -> Result<(), InsightError> {
        if !self.iqr_factor.is_finite() || self.iqr_factor < 0.0 {
            return Err(InsightError::InvalidThreshold {
                name: "iqr_factor",
                value: self.iqr_factor,
            });
        }
        if !self.zscore_threshold.is_finite() || self.zscore_threshold <= 0.0 {
            return Err(InsightError::InvalidThreshold {
                name: "zscore_threshold",
                value: self.zscore_threshold,
            });
        }
        Ok(())
    }
}

// ── Results ───────────────────────────────────────────────────────────

/// Method that flagged an outlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OutlierMethod {
    #[serde(rename = "IQR")]
    Iqr,
    #[serde(rename = "Z-SCORE")]
    ZScore,
}

impl std::fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Iqr => write!(f, "IQR"),
            Self::ZScore => write!(f, "Z-SCORE"),
        }
    }
}

/// One flagged value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outlier {
    /// Row index in the dataset.
    pub row: usize,
    /// The flagged value.
    pub value: f64,
    /// Method that flagged it.
    pub method: OutlierMethod,
    /// IQR units beyond the fence, or the signed Z-score.
    pub score: f64,
}

/// Lower and upper acceptance bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fences {
    pub lower: f64,
    pub upper: f64,
}

impl Fences {
    /// Returns `true` if `v` lies strictly outside the bounds.
    pub fn excludes(&self, v: f64) -> bool {
        v < self.lower || v > self.upper
    }
}

/// Outliers found in one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    /// Column name.
    pub column: String,
    /// Number of present values examined.
    pub valid_count: usize,
    /// Tukey fences, `None` when the column has no data.
    pub iqr_fences: Option<Fences>,
    /// Z-score acceptance bounds in value space, `None` for zero variance or
    /// bounds beyond the `f64` range.
    pub zscore_bounds: Option<Fences>,
    /// Flagged values: IQR first, then Z-score, each by row.
    pub outliers: Vec<Outlier>,
}

impl OutlierReport {
    /// Flags raised by `method`.
    pub fn by_method(&self, method: OutlierMethod) -> impl Iterator<Item = &Outlier> {
        self.outliers.iter().filter(move |o| o.method == method)
    }

    /// Number of flags raised by `method`.
    pub fn count(&self, method: OutlierMethod) -> usize {
        self.by_method(method).count()
    }

    /// Share of present values flagged by `method`, in percent.
    pub fn pct(&self, method: OutlierMethod) -> Option<f64> {
        (self.valid_count > 0).then(|| self.count(method) as f64 / self.valid_count as f64 * 100.0)
    }

    /// Distinct rows flagged by any method.
    pub fn flagged_rows(&self) -> BTreeSet<usize> {
        self.outliers.iter().map(|o| o.row).collect()
    }

    /// Returns `true` if no method flagged anything.
    pub fn is_empty(&self) -> bool {
        self.outliers.is_empty()
    }
}

// ── Detection ─────────────────────────────────────────────────────────

/// Runs both methods on a numeric column.
///
/// Returns `None` if the column is not numeric.
pub fn detect_outliers(
    name: &str,
    col: &Column,
    summary: &ColumnSummary,
    config: &OutlierConfig,
) -> Option<OutlierReport> {
    let valid = col.valid_numeric_pairs()?;
    Some(detect_in_values(name, &valid, summary, config))
}

/// Runs both methods over `(row, value)` pairs described by `summary`.
pub fn detect_in_values(
    name: &str,
    valid: &[(usize, f64)],
    summary: &ColumnSummary,
    config: &OutlierConfig,
) -> OutlierReport {
    let iqr_fences = iqr_fences(summary, config.iqr_factor);
    let zscore = zscore_params(summary);

    let mut outliers = Vec::new();
    if let (Some(fences), Some(iqr)) = (iqr_fences, summary.iqr()) {
        for &(row, value) in valid {
            if fences.excludes(value) {
                // A zero IQR has no unit; report the raw distance instead
                let unit = if iqr > 0.0 { iqr } else { 1.0 };
                let score = if value < fences.lower {
                    gap_in_units(value, fences.lower, unit)
                } else {
                    gap_in_units(fences.upper, value, unit)
                };
                outliers.push(Outlier {
                    row,
                    value,
                    method: OutlierMethod::Iqr,
                    score,
                });
            }
        }
    }

    if let Some((mean, std)) = zscore {
        for &(row, value) in valid {
            let z = gap_in_units(mean, value, std);
            if z.abs() > config.zscore_threshold {
                outliers.push(Outlier {
                    row,
                    value,
                    method: OutlierMethod::ZScore,
                    score: z,
                });
            }
        }
    }

    let zscore_bounds = zscore.and_then(|(mean, std)| {
        let reach = config.zscore_threshold * std;
        finite_fences(mean - reach, mean + reach)
    });

    OutlierReport {
        column: name.to_string(),
        valid_count: valid.len(),
        iqr_fences,
        zscore_bounds,
        outliers,
    }
}

fn iqr_fences(summary: &ColumnSummary, k: f64) -> Option<Fences> {
    let (q1, q3) = (summary.q1?, summary.q3?);
    let iqr = q3 - q1;
    finite_fences(q1 - k * iqr, q3 + k * iqr)
}

/// Fences beyond the `f64` range would flag nothing and cannot be exported.
fn finite_fences(lower: f64, upper: f64) -> Option<Fences> {
    (lower.is_finite() && upper.is_finite()).then_some(Fences { lower, upper })
}

/// `(to − from) / unit`, halving first when the difference overflows.
/// Saturates at `±f64::MAX`.
fn gap_in_units(from: f64, to: f64, unit: f64) -> f64 {
    let gap = to - from;
    let scaled = if gap.is_finite() {
        gap / unit
    } else {
        (to / 2.0 - from / 2.0) / unit * 2.0
    };
    scaled.clamp(f64::MIN, f64::MAX)
}

fn zscore_params(summary: &ColumnSummary) -> Option<(f64, f64)> {
    let mean = summary.mean?;
    let std = summary.std_dev?;
    (std >= ZERO_VARIANCE).then_some((mean, std))
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ValidityBitmap;
    use crate::stats::summarize_column;

    fn run(values: Vec<f64>, config: &OutlierConfig) -> OutlierReport {
        let n = values.len();
        let col = Column::numeric(values, ValidityBitmap::all_valid(n));
        let summary = summarize_column("x", &col).unwrap();
        detect_outliers("x", &col, &summary, config).unwrap()
    }

    #[test]
    fn iqr_and_zscore_disagree() {
        let report = run(vec![1.0, 2.0, 3.0, 4.0, 100.0], &OutlierConfig::default());
        let fences = report.iqr_fences.unwrap();
        assert_eq!(fences.lower, -1.0);
        assert_eq!(fences.upper, 7.0);

        let iqr: Vec<&Outlier> = report.by_method(OutlierMethod::Iqr).collect();
        assert_eq!(iqr.len(), 1);
        assert_eq!(iqr[0].row, 4);
        assert_eq!(iqr[0].value, 100.0);
        assert!((iqr[0].score - 46.5).abs() < 1e-12);

        assert_eq!(report.count(OutlierMethod::ZScore), 0);
        assert_eq!(report.pct(OutlierMethod::Iqr), Some(20.0));
    }

    #[test]
    fn zscore_flags_extreme_value() {
        let mut data: Vec<f64> = (0..50).map(|i| i as f64).collect();
        data.push(500.0);
        let report = run(data, &OutlierConfig::default());
        let z: Vec<&Outlier> = report.by_method(OutlierMethod::ZScore).collect();
        assert_eq!(z.len(), 1);
        assert_eq!(z[0].row, 50);
        assert!(z[0].score > 3.0);
        assert!(report.flagged_rows().contains(&50));
    }

    #[test]
    fn zero_variance_produces_no_zscore_flags() {
        let report = run(vec![5.0; 10], &OutlierConfig::default());
        assert!(report.is_empty());
        assert!(report.zscore_bounds.is_none());
    }

    #[test]
    fn zero_iqr_scores_raw_distance() {
        let report = run(vec![5.0, 5.0, 5.0, 5.0, 5.0, 9.0], &OutlierConfig::default());
        let iqr: Vec<&Outlier> = report.by_method(OutlierMethod::Iqr).collect();
        assert_eq!(iqr.len(), 1);
        assert_eq!(iqr[0].score, 4.0);
    }

    #[test]
    fn missing_values_skipped() {
        let mut validity = ValidityBitmap::all_valid(5);
        validity.set_invalid(2);
        let col = Column::numeric(vec![1.0, 2.0, 0.0, 3.0, 100.0], validity);
        let summary = summarize_column("x", &col).unwrap();
        let report = detect_outliers("x", &col, &summary, &OutlierConfig::default()).unwrap();
        assert_eq!(report.valid_count, 4);
        assert!(report.flagged_rows().contains(&4));
        assert!(!report.flagged_rows().contains(&2));
    }

    #[test]
    fn empty_column_has_no_fences() {
        let col = Column::numeric(vec![0.0; 2], [false, false].into_iter().collect());
        let summary = summarize_column("x", &col).unwrap();
        let report = detect_outliers("x", &col, &summary, &OutlierConfig::default()).unwrap();
        assert!(report.iqr_fences.is_none());
        assert!(report.is_empty());
        assert_eq!(report.pct(OutlierMethod::Iqr), None);
    }

    #[test]
    fn not_numeric() {
        let col = Column::categorical(vec!["a".into()], vec![0], ValidityBitmap::all_valid(1));
        let summary = crate::stats::summarize_values("x", &[], 1);
        assert!(detect_outliers("x", &col, &summary, &OutlierConfig::default()).is_none());
    }

    #[test]
    fn flags_respect_bounds() {
        let data = vec![
            -40.0, 1.0, 2.0, 2.5, 3.0, 2.0, 3.0, 2.5, 3.5, 1.5, 2.0, 2.2, 2.8, 60.0, 2.1, 1.9,
        ];
        for config in [
            OutlierConfig::default(),
            OutlierConfig::default().iqr_factor(0.5).zscore_threshold(1.0),
            OutlierConfig::default().iqr_factor(3.0).zscore_threshold(2.0),
        ] {
            let report = run(data.clone(), &config);
            let fences = report.iqr_fences.unwrap();
            let bounds = report.zscore_bounds.unwrap();
            for (row, &v) in data.iter().enumerate() {
                let by_iqr = report.by_method(OutlierMethod::Iqr).any(|o| o.row == row);
                assert_eq!(by_iqr, fences.excludes(v), "IQR row {row}");
                let by_z = report.by_method(OutlierMethod::ZScore).any(|o| o.row == row);
                if by_z {
                    assert!(bounds.excludes(v), "Z row {row}");
                }
            }
            let iqr_rows: Vec<usize> = report.by_method(OutlierMethod::Iqr).map(|o| o.row).collect();
            let unique: BTreeSet<usize> = iqr_rows.iter().copied().collect();
            assert_eq!(iqr_rows.len(), unique.len());
        }
    }

    #[test]
    fn extreme_magnitudes_yield_no_unbounded_fences() {
        let report = run(vec![1e308, -1e308, -1e308, 5.0], &OutlierConfig::default());
        assert_eq!(report.valid_count, 4);
        assert!(report.iqr_fences.is_none());
        assert!(report.zscore_bounds.is_none());
        assert!(report.outliers.iter().all(|o| o.score.is_finite()));
    }

    #[test]
    fn gap_survives_overflowing_difference() {
        assert_eq!(gap_in_units(1.0, 4.0, 2.0), 1.5);
        let halved = gap_in_units(-1.5e308, 1.5e308, 4.0);
        assert!((halved / 7.5e307 - 1.0).abs() < 1e-12);
        assert_eq!(gap_in_units(-1.5e308, 1.5e308, 0.5), f64::MAX);
        assert_eq!(gap_in_units(1.5e308, -1.5e308, 0.5), f64::MIN);
    }

    #[test]
    fn config_validation() {
        assert!(OutlierConfig::default().validate().is_ok());
        assert!(OutlierConfig::default().iqr_factor(-1.0).validate().is_err());
        assert!(OutlierConfig::default().iqr_factor(f64::NAN).validate().is_err());
        assert!(OutlierConfig::default().zscore_threshold(0.0).validate().is_err());
        assert!(OutlierConfig::default().iqr_factor(0.0).validate().is_ok());
    }
}
