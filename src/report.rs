//! Analysis directive, pipeline and the aggregated report.
//!
//! [`analyze`] runs the requested categories over a [`Dataset`] and
//! collects everything into an [`AnalysisReport`]:
//!
//! 1. validate the directive (thresholds, referenced columns)
//! 2. descriptive statistics per column
//! 3. outliers per numeric column (IQR and Z-score)
//! 4. pairwise correlations
//! 5. trends along the time axis
//! 6. insights phrased from the above
//!
//! Configuration problems abort before anything is computed. A category
//! that lacks data for a column or pair simply omits that entry.

use serde::{Deserialize, Serialize};

use crate::correlation::{correlate_columns, CorrelationEntry};
use crate::dataset::{ColumnKind, Dataset, DatasetMeta};
use crate::error::InsightError;
use crate::insights::{generate_insights, Insight};
use crate::loader::{load, KindDeclaration, LoaderConfig, RawTable};
use crate::outliers::{detect_outliers, OutlierConfig, OutlierReport};
use crate::stats::{
    summarize_categorical, summarize_dataset, summarize_temporal, CategoricalSummary,
    ColumnSummary, TemporalSummary,
};
use crate::trend::{analyze_trends, TimeAxis, TrendResult, DEFAULT_EPSILON};

// ── Directive ─────────────────────────────────────────────────────────

/// What to analyze and with which thresholds.
///
/// Every category is enabled by default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisDirective {
    pub statistics: bool,
    pub outliers: bool,
    pub correlation: bool,
    pub trend: bool,
    pub insights: bool,
    /// Column ordering trend series; `None` uses the row position.
    pub time_axis: Option<String>,
    /// Trend targets; `None` means every numeric column except the axis.
    pub trend_targets: Option<Vec<String>>,
    /// Columns to correlate; `None` means every numeric column.
    pub correlation_columns: Option<Vec<String>>,
    pub outlier: OutlierConfig,
    /// Slopes within `±trend_epsilon` are labelled stable. Default: 1e-9.
    pub trend_epsilon: f64,
}

impl Default for AnalysisDirective {
    fn default() -> Self {
        Self {
            statistics: true,
            outliers: true,
            correlation: true,
            trend: true,
            insights: true,
            time_axis: None,
            trend_targets: None,
            correlation_columns: None,
            outlier: OutlierConfig::default(),
            trend_epsilon: DEFAULT_EPSILON,
        }
    }
}

impl AnalysisDirective {
    pub fn statistics(mut self, enabled: bool) -> Self {
        self.statistics = enabled;
        self
    }

    pub fn outliers(mut self, enabled: bool) -> Self {
        self.outliers = enabled;
        self
    }

    pub fn correlation(mut self, enabled: bool) -> Self {
        self.correlation = enabled;
        self
    }

    pub fn trend(mut self, enabled: bool) -> Self {
        self.trend = enabled;
        self
    }

    pub fn insights(mut self, enabled: bool) -> Self {
        self.insights = enabled;
        self
    }

    /// Orders trend series by `column` instead of row position.
    pub fn time_axis(mut self, column: impl Into<String>) -> Self {
        self.time_axis = Some(column.into());
        self
    }

    pub fn trend_targets(mut self, columns: Vec<String>) -> Self {
        self.trend_targets = Some(columns);
        self
    }

    pub fn correlation_columns(mut self, columns: Vec<String>) -> Self {
        self.correlation_columns = Some(columns);
        self
    }

    pub fn outlier_config(mut self, config: OutlierConfig) -> Self {
        self.outlier = config;
        self
    }

    pub fn trend_epsilon(mut self, epsilon: f64) -> Self {
        self.trend_epsilon = epsilon;
        self
    }

    /// The trend axis as a [`TimeAxis`].
    pub fn axis(&self) -> TimeAxis {
        match &self.time_axis {
            Some(name) => TimeAxis::Column(name.clone()),
            None => TimeAxis::RowIndex,
        }
    }

    /// Checks thresholds without looking at any data.
    pub fn validate(&self) -> Result<(), InsightError> {
        self.outlier.validate()?;
        if !self.trend_epsilon.is_finite() || self.trend_epsilon < 0.0 {
            return Err(InsightError::InvalidThreshold {
                name: "trend_epsilon",
                value: self.trend_epsilon,
            });
        }
        Ok(())
    }

    /// Checks thresholds and every column the enabled categories reference.
    pub fn validate_against(&self, ds: &Dataset) -> Result<(), InsightError> {
        self.validate()?;

        if self.trend {
            if let Some(axis) = &self.time_axis {
                match ds.column_by_name(axis).map(|c| c.kind()) {
                    None => return Err(InsightError::ColumnNotFound { name: axis.clone() }),
                    Some(ColumnKind::Categorical) => {
                        return Err(InsightError::NotNumeric { name: axis.clone() })
                    }
                    Some(_) => {}
                }
            }
            if let Some(targets) = &self.trend_targets {
                require_numeric(ds, targets)?;
            }
        }
        if self.correlation {
            if let Some(columns) = &self.correlation_columns {
                require_numeric(ds, columns)?;
            }
        }
        Ok(())
    }
}

fn require_numeric(ds: &Dataset, names: &[String]) -> Result<(), InsightError> {
    for name in names {
        match ds.column_by_name(name).map(|c| c.kind()) {
            None => return Err(InsightError::ColumnNotFound { name: name.clone() }),
            Some(ColumnKind::Numeric) => {}
            Some(_) => return Err(InsightError::NotNumeric { name: name.clone() }),
        }
    }
    Ok(())
}

// ── Report ────────────────────────────────────────────────────────────

/// Everything one analysis run produced.
///
/// Disabled categories are left empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub dataset: DatasetMeta,
    pub summaries: Vec<ColumnSummary>,
    pub categorical: Vec<CategoricalSummary>,
    pub temporal: Vec<TemporalSummary>,
    pub outliers: Vec<OutlierReport>,
    pub correlations: Vec<CorrelationEntry>,
    pub trends: Vec<TrendResult>,
    pub insights: Vec<Insight>,
}

impl AnalysisReport {
    /// Summary of the numeric column `name`, if computed.
    pub fn summary(&self, name: &str) -> Option<&ColumnSummary> {
        self.summaries.iter().find(|s| s.column == name)
    }

    /// Outlier report of the numeric column `name`, if computed.
    pub fn outlier_report(&self, name: &str) -> Option<&OutlierReport> {
        self.outliers.iter().find(|o| o.column == name)
    }

    /// Trend of `name`, if one could be fitted.
    pub fn trend(&self, name: &str) -> Option<&TrendResult> {
        self.trends.iter().find(|t| t.column == name)
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────

/// Runs the categories enabled in `directive` over `ds`.
///
/// # Errors
///
/// Only configuration errors: invalid thresholds, unknown columns, or
/// non-numeric columns where numbers are required. They are raised before
/// any computation.
///
/// # Example
///
/// ```
/// use tabular_insight::dataset::{Column, Dataset, ValidityBitmap};
/// use tabular_insight::report::{analyze, AnalysisDirective};
///
/// let ds = Dataset::from_columns(vec![(
///     "value".to_string(),
///     Column::numeric(vec![1.0, 2.0, 3.0, 4.0, 100.0], ValidityBitmap::all_valid(5)),
/// )])
/// .unwrap();
///
/// let report = analyze(&ds, &AnalysisDirective::default()).unwrap();
/// assert_eq!(report.outliers[0].outliers[0].value, 100.0);
/// ```
pub fn analyze(ds: &Dataset, directive: &AnalysisDirective) -> Result<AnalysisReport, InsightError> {
    let span = tracing::info_span!(
        "analyze",
        rows = ds.row_count(),
        columns = ds.column_count()
    );
    let _guard = span.enter();

    directive.validate_against(ds)?;

    let mut report = AnalysisReport {
        dataset: ds.meta(),
        summaries: Vec::new(),
        categorical: Vec::new(),
        temporal: Vec::new(),
        outliers: Vec::new(),
        correlations: Vec::new(),
        trends: Vec::new(),
        insights: Vec::new(),
    };

    // Outlier bounds come from the summaries even when they are not reported
    let summaries = if directive.statistics || directive.outliers {
        summarize_dataset(ds)
    } else {
        Vec::new()
    };

    if directive.outliers {
        let numeric = ds.iter().filter(|(_, c)| c.kind() == ColumnKind::Numeric);
        report.outliers = numeric
            .zip(&summaries)
            .filter_map(|((name, col), summary)| {
                detect_outliers(name, col, summary, &directive.outlier)
            })
            .collect();
        tracing::debug!(
            flagged = report.outliers.iter().map(|o| o.outliers.len()).sum::<usize>(),
            "outliers detected"
        );
    }

    if directive.statistics {
        for (name, col) in ds.iter() {
            report.categorical.extend(summarize_categorical(name, col));
            report.temporal.extend(summarize_temporal(name, col));
        }
        report.summaries = summaries;
        tracing::debug!(
            numeric = report.summaries.len(),
            categorical = report.categorical.len(),
            temporal = report.temporal.len(),
            "statistics computed"
        );
    }

    if directive.correlation {
        report.correlations = correlate_columns(ds, directive.correlation_columns.as_deref())?;
        tracing::debug!(pairs = report.correlations.len(), "correlations computed");
    }

    if directive.trend {
        report.trends = analyze_trends(
            ds,
            directive.trend_targets.as_deref(),
            &directive.axis(),
            directive.trend_epsilon,
        )?;
        tracing::debug!(trends = report.trends.len(), "trends fitted");
    }

    if directive.insights {
        report.insights = generate_insights(
            &report.dataset,
            &report.summaries,
            &report.outliers,
            &report.correlations,
            &report.trends,
        );
        tracing::debug!(insights = report.insights.len(), "insights generated");
    }

    Ok(report)
}

/// Loads `table` and analyzes the result.
pub fn analyze_table(
    table: RawTable,
    loader: &LoaderConfig,
    kinds: &KindDeclaration,
    directive: &AnalysisDirective,
) -> Result<AnalysisReport, InsightError> {
    directive.validate()?;
    let ds = load(&table, kinds, loader)?;
    analyze(&ds, directive)
}

// ── Tests ─────────────────────────────────────────────────────────────
