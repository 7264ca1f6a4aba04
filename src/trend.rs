//! Linear trend estimation over an ordered series.
//!
//! A target numeric column is ordered along a time axis and fitted with
//! ordinary least squares:
//!
//! - slope = cov(x, y) / var(x)
//! - intercept = ȳ − slope·x̄
//! - R² = 1 − SS_res / SS_tot (1.0 when SS_tot = 0)
//!
//! The axis is either the row position or a named column. A numeric axis
//! supplies x directly; a temporal axis orders rows chronologically and
//! uses the ordinal position as x.
//!
//! Degenerate inputs give a defined neutral fit instead of an undefined
//! slope: a constant target is flat with R² = 1, and a constant axis
//! yields slope 0 through ȳ. Fewer than two points is an
//! [`InsightError::InsufficientData`].
//!
//! # Example
//!
//! ```
//! use tabular_insight::trend::{fit_line, Direction};
//!
//! let fit = fit_line(&[0.0, 1.0, 2.0, 3.0], &[5.0, 5.0, 5.0, 5.0]).unwrap();
//! assert_eq!(fit.slope, 0.0);
//! assert_eq!(fit.r_squared, 1.0);
//! assert_eq!(Direction::from_slope(fit.slope, 1e-9), Direction::Stable);
//! ```

use serde::{Deserialize, Serialize};

use crate::dataset::{Column, Dataset};
use crate::error::InsightError;
use crate::stats::{magnitude_scale, rescaled};

/// Default dead band around zero slope.
pub const DEFAULT_EPSILON: f64 = 1e-9;

// ── Axis and labels ───────────────────────────────────────────────────

/// What orders the series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeAxis {
    /// Row position in the dataset.
    #[default]
    RowIndex,
    /// A numeric or temporal column.
    Column(String),
}

impl TimeAxis {
    /// Name used in reports.
    pub fn label(&self) -> &str {
        match self {
            Self::RowIndex => "row_index",
            Self::Column(name) => name,
        }
    }
}

/// Direction of a fitted trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increasing,
    Decreasing,
    Stable,
}

impl Direction {
    /// Labels `slope` using a symmetric dead band of width `epsilon`.
    pub fn from_slope(slope: f64, epsilon: f64) -> Self {
        if slope > epsilon {
            Self::Increasing
        } else if slope < -epsilon {
            Self::Decreasing
        } else {
            Self::Stable
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Increasing => write!(f, "increasing"),
            Self::Decreasing => write!(f, "decreasing"),
            Self::Stable => write!(f, "stable"),
        }
    }
}

// ── Fitting ───────────────────────────────────────────────────────────

/// Ordinary least-squares line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// Number of points fitted.
    pub n: usize,
}

/// Fits `y = intercept + slope·x`.
pub fn fit_line(x: &[f64], y: &[f64]) -> Result<LinearFit, InsightError> {
    if x.len() != y.len() {
        return Err(InsightError::DimensionMismatch {
            column: "y".to_string(),
            expected: x.len(),
            actual: y.len(),
        });
    }
    let n = x.len();
    if n < 2 {
        return Err(InsightError::InsufficientData {
            min_required: 2,
            actual: n,
        });
    }

    if is_constant(y) {
        return Ok(LinearFit {
            slope: 0.0,
            intercept: y[0],
            r_squared: 1.0,
            n,
        });
    }

    // Fit in power-of-two rescaled units so the sums stay finite
    let (sx, sy) = (magnitude_scale(x), magnitude_scale(y));
    let (xs, mean_x) = rescaled(x, sx);
    let (ys, mean_y) = rescaled(y, sy);
    let (Some(mean_x), Some(mean_y)) = (mean_x, mean_y) else {
        return Err(InsightError::OutOfRange { quantity: "mean" });
    };

    if is_constant(x) {
        // Vertical data: no slope is identifiable, the flat line explains nothing
        return Ok(LinearFit {
            slope: 0.0,
            intercept: in_range("intercept", mean_y * sy)?,
            r_squared: 0.0,
            n,
        });
    }

    let (mut sxx, mut sxy, mut ss_tot) = (0.0, 0.0, 0.0);
    for (&xi, &yi) in xs.iter().zip(&ys) {
        let (dx, dy) = (xi - mean_x, yi - mean_y);
        sxx += dx * dx;
        sxy += dx * dy;
        ss_tot += dy * dy;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let ss_res: f64 = xs
        .iter()
        .zip(&ys)
        .map(|(&xi, &yi)| {
            let e = yi - (intercept + slope * xi);
            e * e
        })
        .sum();
    let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 1.0 };

    Ok(LinearFit {
        slope: in_range("slope", slope * sy / sx)?,
        intercept: in_range("intercept", intercept * sy)?,
        r_squared,
        n,
    })
}

fn in_range(quantity: &'static str, value: f64) -> Result<f64, InsightError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(InsightError::OutOfRange { quantity })
    }
}

fn is_constant(values: &[f64]) -> bool {
    values.iter().all(|&v| v == values[0])
}

// ── Trend results ─────────────────────────────────────────────────────

/// Trend of one target column along a time axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    /// Target column.
    pub column: String,
    /// Axis label (`row_index` or the axis column's name).
    pub time_axis: String,
    pub slope: f64,
    pub intercept: f64,
    pub direction: Direction,
    /// Coefficient of determination.
    pub r_squared: f64,
    /// Number of points fitted.
    pub points: usize,
    /// First value along the axis.
    pub start_value: f64,
    /// Last value along the axis.
    pub end_value: f64,
    /// `(end − start) / |start|` in percent; `None` when start is 0.
    pub change_pct: Option<f64>,
    /// Coefficient of variation (sample std / mean); `None` when the mean is 0.
    pub volatility: Option<f64>,
    /// Two-sided p-value of the slope, when at least three points allow one.
    pub slope_p_value: Option<f64>,
}

/// Builds the `(x, y)` series for `target` ordered along `axis`.
///
/// Rows missing either coordinate are skipped.
pub fn trend_series(
    ds: &Dataset,
    target: &str,
    axis: &TimeAxis,
) -> Result<(Vec<f64>, Vec<f64>), InsightError> {
    let y_col = numeric_column(ds, target)?;

    match axis {
        TimeAxis::RowIndex => Ok((0..ds.row_count())
            .filter_map(|i| Some((i as f64, y_col.numeric_at(i)?)))
            .unzip()),
        TimeAxis::Column(name) => {
            let x_col = ds
                .column_by_name(name)
                .ok_or_else(|| InsightError::ColumnNotFound { name: name.clone() })?;
            match x_col {
                Column::Numeric { .. } => {
                    let mut points: Vec<(f64, f64)> = (0..ds.row_count())
                        .filter_map(|i| Some((x_col.numeric_at(i)?, y_col.numeric_at(i)?)))
                        .collect();
                    points.sort_by(|a, b| a.0.total_cmp(&b.0));
                    Ok(points.into_iter().unzip())
                }
                Column::Temporal { .. } => {
                    let mut points: Vec<_> = (0..ds.row_count())
                        .filter_map(|i| Some((x_col.instant_at(i)?, y_col.numeric_at(i)?)))
                        .collect();
                    points.sort_by_key(|&(instant, _)| instant);
                    Ok(points
                        .into_iter()
                        .enumerate()
                        .map(|(pos, (_, y))| (pos as f64, y))
                        .unzip())
                }
                Column::Categorical { .. } => Err(InsightError::NotNumeric { name: name.clone() }),
            }
        }
    }
}

/// Fits and characterizes the trend of one target column.
pub fn analyze_trend(
    ds: &Dataset,
    target: &str,
    axis: &TimeAxis,
    epsilon: f64,
) -> Result<TrendResult, InsightError> {
    let (x, y) = trend_series(ds, target, axis)?;
    let fit = fit_line(&x, &y)?;

    let start_value = y[0];
    let end_value = y[y.len() - 1];
    let change_pct = (start_value != 0.0)
        .then(|| (end_value - start_value) / start_value.abs() * 100.0)
        .filter(|pct| pct.is_finite());
    let volatility = match (u_numflow::stats::mean(&y), u_numflow::stats::std_dev(&y)) {
        (Some(mean), Some(std)) if mean != 0.0 => Some(std / mean),
        _ => None,
    }
    .filter(|cv| cv.is_finite());
    let slope_p_value = if fit.n >= 3 && !is_constant(&x) && !is_constant(&y) {
        u_analytics::regression::simple_linear_regression(&x, &y)
            .map(|r| r.slope_p)
            .filter(|p| p.is_finite())
    } else {
        None
    };

    Ok(TrendResult {
        column: target.to_string(),
        time_axis: axis.label().to_string(),
        slope: fit.slope,
        intercept: fit.intercept,
        direction: Direction::from_slope(fit.slope, epsilon),
        r_squared: fit.r_squared,
        points: fit.n,
        start_value,
        end_value,
        change_pct,
        volatility,
        slope_p_value,
    })
}

/// Analyzes every target, dropping those without enough data.
///
/// `targets = None` means every numeric column except the axis column.
/// Unknown or non-numeric targets and axes are configuration errors.
pub fn analyze_trends(
    ds: &Dataset,
    targets: Option<&[String]>,
    axis: &TimeAxis,
    epsilon: f64,
) -> Result<Vec<TrendResult>, InsightError> {
    let names: Vec<&str> = match targets {
        Some(names) => names.iter().map(String::as_str).collect(),
        None => ds
            .numeric_column_names()
            .into_iter()
            .filter(|name| !matches!(axis, TimeAxis::Column(a) if a == name))
            .collect(),
    };

    let mut results = Vec::with_capacity(names.len());
    for name in names {
        match analyze_trend(ds, name, axis, epsilon) {
            Ok(result) => results.push(result),
            Err(err) if err.is_recoverable() => {
                tracing::debug!(column = name, axis = axis.label(), %err, "trend omitted");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(results)
}

fn numeric_column<'a>(ds: &'a Dataset, name: &str) -> Result<&'a Column, InsightError> {
    let col = ds.column_by_name(name).ok_or_else(|| InsightError::ColumnNotFound {
        name: name.to_string(),
    })?;
    if col.as_numeric().is_none() {
        return Err(InsightError::NotNumeric {
            name: name.to_string(),
        });
    }
    Ok(col)
}

// ── Tests ─────────────────────────────────────────────────────────────
