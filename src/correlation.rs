//! Pairwise Pearson correlation between numeric columns.
//!
//! Each unordered pair is evaluated over rows where both columns are
//! present. Pairs with fewer than two overlapping rows, or where either
//! side has zero variance over the overlap, are omitted entirely rather
//! than reported as zero.
//!
//! # Strength bands (on |r|)
//!
//! | Band | Label |
//! |------|-------|
//! | [0.8, 1.0] | very strong |
//! | [0.6, 0.8) | strong |
//! | [0.4, 0.6) | moderate |
//! | [0.2, 0.4) | weak |
//! | [0.0, 0.2) | negligible |
//!
//! # Example
//!
//! ```
//! use tabular_insight::correlation::{pearson, Sign, Strength};
//!
//! let r = pearson(&[1.0, 2.0, 3.0, 4.0], &[8.0, 6.0, 4.0, 2.0]).unwrap();
//! assert_eq!(r, -1.0);
//! assert_eq!(Strength::from_r(r), Strength::VeryStrong);
//! assert_eq!(Sign::from_r(r), Sign::Negative);
//! ```

use serde::{Deserialize, Serialize};

use crate::dataset::{Column, Dataset};
use crate::error::InsightError;
use crate::stats::{magnitude_scale, rescaled};

// ── Labels ────────────────────────────────────────────────────────────

/// Strength band of a correlation coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Negligible,
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl Strength {
    /// Classifies `|r|` into its band.
    pub fn from_r(r: f64) -> Self {
        let a = r.abs();
        if a >= 0.8 {
            Self::VeryStrong
        } else if a >= 0.6 {
            Self::Strong
        } else if a >= 0.4 {
            Self::Moderate
        } else if a >= 0.2 {
            Self::Weak
        } else {
            Self::Negligible
        }
    }

    /// Returns `true` for bands above "moderate".
    pub fn is_strong(self) -> bool {
        self > Self::Moderate
    }
}

impl std::fmt::Display for Strength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Negligible => write!(f, "negligible"),
            Self::Weak => write!(f, "weak"),
            Self::Moderate => write!(f, "moderate"),
            Self::Strong => write!(f, "strong"),
            Self::VeryStrong => write!(f, "very strong"),
        }
    }
}

/// Direction of a correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sign {
    Positive,
    Negative,
    None,
}

impl Sign {
    pub fn from_r(r: f64) -> Self {
        if r > 0.0 {
            Self::Positive
        } else if r < 0.0 {
            Self::Negative
        } else {
            Self::None
        }
    }
}

impl std::fmt::Display for Sign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Positive => write!(f, "positive"),
            Self::Negative => write!(f, "negative"),
            Self::None => write!(f, "no"),
        }
    }
}

// ── Entries ───────────────────────────────────────────────────────────

/// Correlation between two columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationEntry {
    /// First column (earlier in dataset order).
    pub column_a: String,
    /// Second column.
    pub column_b: String,
    /// Pearson coefficient in `[-1, 1]`.
    pub r: f64,
    pub strength: Strength,
    pub sign: Sign,
    /// Rows where both columns are present.
    pub overlap: usize,
    /// Two-sided p-value for `r ≠ 0`, when defined.
    pub p_value: Option<f64>,
}

/// Pearson's r over paired samples.
///
/// Fails with [`InsightError::InsufficientData`] for fewer than two
/// pairs and [`InsightError::ZeroVariance`] when either side is constant.
/// The result is clamped to `[-1, 1]`.
pub fn pearson(x: &[f64], y: &[f64]) -> Result<f64, InsightError> {
    let n = x.len().min(y.len());
    if n < 2 {
        return Err(InsightError::InsufficientData {
            min_required: 2,
            actual: n,
        });
    }
    let (x, y) = (&x[..n], &y[..n]);
    if is_constant(x) || is_constant(y) {
        return Err(InsightError::ZeroVariance);
    }

    // r is scale-free; shrinking both sides keeps the sums below f64::MAX
    let (xs, mean_x) = rescaled(x, magnitude_scale(x));
    let (ys, mean_y) = rescaled(y, magnitude_scale(y));
    let (Some(mean_x), Some(mean_y)) = (mean_x, mean_y) else {
        return Err(InsightError::OutOfRange { quantity: "mean" });
    };

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (&a, &b) in xs.iter().zip(&ys) {
        let (dx, dy) = (a - mean_x, b - mean_y);
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    if sxx <= 0.0 || syy <= 0.0 {
        return Err(InsightError::ZeroVariance);
    }

    Ok((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// Correlates two numeric columns over their overlapping rows.
pub fn correlate_pair(
    name_a: &str,
    a: &Column,
    name_b: &str,
    b: &Column,
) -> Result<CorrelationEntry, InsightError> {
    let (xs, ys) = overlapping_values(a, b).ok_or_else(|| InsightError::NotNumeric {
        name: if a.as_numeric().is_none() { name_a } else { name_b }.to_string(),
    })?;

    let r = pearson(&xs, &ys)?;
    let p_value = u_analytics::correlation::pearson(&xs, &ys)
        .map(|res| res.p_value)
        .filter(|p| p.is_finite());

    Ok(CorrelationEntry {
        column_a: name_a.to_string(),
        column_b: name_b.to_string(),
        r,
        strength: Strength::from_r(r),
        sign: Sign::from_r(r),
        overlap: xs.len(),
        p_value,
    })
}

/// Correlates every unordered pair of `columns` (or of all numeric
/// columns when `None`), in dataset order.
///
/// Pairs without enough data are skipped. Unknown or non-numeric names
/// are configuration errors.
pub fn correlate_columns(
    ds: &Dataset,
    columns: Option<&[String]>,
) -> Result<Vec<CorrelationEntry>, InsightError> {
    let selected: Vec<(&str, &Column)> = match columns {
        Some(names) => {
            let mut picked = Vec::with_capacity(names.len());
            for name in names {
                let col = ds
                    .column_by_name(name)
                    .ok_or_else(|| InsightError::ColumnNotFound { name: name.clone() })?;
                if col.as_numeric().is_none() {
                    return Err(InsightError::NotNumeric { name: name.clone() });
                }
                picked.push((name.as_str(), col));
            }
            // Keep dataset order so results don't depend on request order
            picked.sort_by_key(|(name, _)| ds.column_index(name));
            picked.dedup_by_key(|(name, _)| *name);
            picked
        }
        None => ds.iter().filter(|(_, c)| c.as_numeric().is_some()).collect(),
    };

    let mut entries = Vec::new();
    for i in 0..selected.len() {
        for j in (i + 1)..selected.len() {
            let (name_a, a) = selected[i];
            let (name_b, b) = selected[j];
            match correlate_pair(name_a, a, name_b, b) {
                Ok(entry) => entries.push(entry),
                Err(err) if err.is_recoverable() => {
                    tracing::debug!(column_a = name_a, column_b = name_b, %err, "correlation omitted");
                }
                Err(err) => return Err(err),
            }
        }
    }
    Ok(entries)
}

fn is_constant(values: &[f64]) -> bool {
    values.iter().all(|&v| v == values[0])
}

fn overlapping_values(a: &Column, b: &Column) -> Option<(Vec<f64>, Vec<f64>)> {
    a.as_numeric()?;
    b.as_numeric()?;
    let (xs, ys) = (0..a.len())
        .filter_map(|i| Some((a.numeric_at(i)?, b.numeric_at(i)?)))
        .unzip();
    Some((xs, ys))
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ValidityBitmap;

    fn numeric(values: Vec<f64>) -> Column {
        let n = values.len();
        Column::numeric(values, ValidityBitmap::all_valid(n))
    }

    fn dataset(cols: Vec<(&str, Column)>) -> Dataset {
        Dataset::from_columns(cols.into_iter().map(|(n, c)| (n.to_string(), c)).collect()).unwrap()
    }

    #[test]
    fn perfect_anticorrelation() {
        let ds = dataset(vec![
            ("x", numeric(vec![1.0, 2.0, 3.0, 4.0])),
            ("y", numeric(vec![8.0, 6.0, 4.0, 2.0])),
        ]);
        let entries = correlate_columns(&ds, None).unwrap();
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!((e.column_a.as_str(), e.column_b.as_str()), ("x", "y"));
        assert_eq!(e.r, -1.0);
        assert_eq!(e.strength, Strength::VeryStrong);
        assert_eq!(e.sign, Sign::Negative);
        assert_eq!(e.overlap, 4);
    }

    #[test]
    fn self_correlation_is_exactly_one() {
        let samples = [
            vec![1.0, 2.0, 3.0, 4.0],
            vec![0.1, 0.7, -3.3, 12.25, 5.5],
            vec![1e-3, 2e-3, 7e-3],
        ];
        for xs in samples {
            assert_eq!(pearson(&xs, &xs).unwrap(), 1.0);
        }
    }

    #[test]
    fn near_constant_float_column_is_zero_variance() {
        let flat = [0.1, 0.1, 0.1];
        assert_eq!(pearson(&[1.0, 2.0, 3.0], &flat), Err(InsightError::ZeroVariance));
    }

    #[test]
    fn huge_magnitudes_do_not_overflow() {
        let expected = -0.866_025_403_784_438_6;
        let r = pearson(&[1e200, -1e200, -1e200], &[1.0, 2.0, 3.0]).unwrap();
        assert!((r - expected).abs() < 1e-12, "r = {r}");
        let small = pearson(&[1.0, -1.0, -1.0], &[1.0, 2.0, 3.0]).unwrap();
        assert!((r - small).abs() < 1e-12);
        let both = pearson(&[1e308, -1e308, 0.0], &[-1.7e308, 1.7e308, 0.0]).unwrap();
        assert!((both + 1.0).abs() < 1e-12);
    }

    #[test]
    fn zero_variance_pair_omitted() {
        let ds = dataset(vec![
            ("x", numeric(vec![1.0, 2.0, 3.0])),
            ("flat", numeric(vec![5.0, 5.0, 5.0])),
        ]);
        assert!(correlate_columns(&ds, None).unwrap().is_empty());
    }

    #[test]
    fn insufficient_overlap_omitted() {
        let mut va = ValidityBitmap::all_valid(3);
        va.set_invalid(0);
        va.set_invalid(1);
        let ds = dataset(vec![
            ("a", Column::numeric(vec![0.0, 0.0, 3.0], va)),
            ("b", numeric(vec![1.0, 2.0, 3.0])),
        ]);
        assert!(correlate_columns(&ds, None).unwrap().is_empty());
    }

    #[test]
    fn overlap_uses_pairwise_complete_rows() {
        let mut vb = ValidityBitmap::all_valid(5);
        vb.set_invalid(4);
        let ds = dataset(vec![
            ("a", numeric(vec![1.0, 2.0, 3.0, 4.0, 5.0])),
            ("b", Column::numeric(vec![2.0, 4.0, 6.0, 8.0, -100.0], vb)),
        ]);
        let entries = correlate_columns(&ds, None).unwrap();
        assert_eq!(entries[0].overlap, 4);
        assert!((entries[0].r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn strength_bands() {
        assert_eq!(Strength::from_r(0.8), Strength::VeryStrong);
        assert_eq!(Strength::from_r(-0.79), Strength::Strong);
        assert_eq!(Strength::from_r(0.6), Strength::Strong);
        assert_eq!(Strength::from_r(0.45), Strength::Moderate);
        assert_eq!(Strength::from_r(-0.2), Strength::Weak);
        assert_eq!(Strength::from_r(0.19), Strength::Negligible);
        assert!(Strength::Strong.is_strong());
        assert!(!Strength::Moderate.is_strong());
        assert_eq!(Strength::VeryStrong.to_string(), "very strong");
        assert_eq!(Sign::from_r(0.0), Sign::None);
    }

    #[test]
    fn magnitude_within_unit_interval() {
        let a: Vec<f64> = (0..40).map(|i| ((i * 37) % 17) as f64).collect();
        let b: Vec<f64> = (0..40).map(|i| ((i * 11) % 13) as f64 * 0.5 + i as f64).collect();
        let c: Vec<f64> = (0..40).map(|i| -(i as f64).powi(2)).collect();
        let ds = dataset(vec![("a", numeric(a)), ("b", numeric(b)), ("c", numeric(c))]);
        let entries = correlate_columns(&ds, None).unwrap();
        assert_eq!(entries.len(), 3);
        for e in entries {
            assert!((0.0..=1.0).contains(&e.r.abs()));
        }
    }

    #[test]
    fn explicit_selection_and_errors() {
        let ds = dataset(vec![
            ("x", numeric(vec![1.0, 2.0, 3.0])),
            ("y", numeric(vec![2.0, 1.0, 4.0])),
            ("z", numeric(vec![3.0, 3.5, 9.0])),
            (
                "label",
                Column::categorical(vec!["a".into()], vec![0, 0, 0], ValidityBitmap::all_valid(3)),
            ),
        ]);

        let names = vec!["z".to_string(), "x".to_string()];
        let entries = correlate_columns(&ds, Some(&names)).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].column_a, "x");
        assert_eq!(entries[0].column_b, "z");

        let bad = vec!["x".to_string(), "nope".to_string()];
        assert_eq!(
            correlate_columns(&ds, Some(&bad)).unwrap_err(),
            InsightError::ColumnNotFound { name: "nope".into() }
        );

        let text = vec!["label".to_string()];
        assert_eq!(
            correlate_columns(&ds, Some(&text)).unwrap_err(),
            InsightError::NotNumeric { name: "label".into() }
        );
    }
}
