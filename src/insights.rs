//! Human-readable statements derived from finished analysis results.
//!
//! [`generate_insights`] never computes anything new: it only phrases what
//! the statistics, outlier, correlation and trend stages already produced.
//! Output order is fixed by priority (outliers, strong correlations,
//! trends, summaries) so identical inputs always yield identical text.
//! The summary block opens with one statement about the dataset's shape.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::correlation::CorrelationEntry;
use crate::dataset::{ColumnKind, DatasetMeta};
use crate::outliers::{OutlierMethod, OutlierReport};
use crate::stats::ColumnSummary;
use crate::trend::{Direction, TrendResult};

/// What an insight talks about. Declaration order is priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    Outlier,
    Correlation,
    Trend,
    Summary,
}

/// A single statement about the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub category: InsightCategory,
    pub message: String,
    /// Columns the statement refers to.
    pub subjects: Vec<String>,
}

impl Insight {
    fn new(category: InsightCategory, message: String, subjects: Vec<String>) -> Self {
        Self {
            category,
            message,
            subjects,
        }
    }
}

impl std::fmt::Display for Insight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Phrases every result worth mentioning, in priority order.
///
/// Any input may be empty; the matching category is then skipped. A
/// dataset without columns gets no shape statement.
///
/// # Example
///
/// ```
/// use tabular_insight::dataset::{Column, Dataset, ValidityBitmap};
/// use tabular_insight::insights::{generate_insights, InsightCategory};
/// use tabular_insight::stats::summarize_values;
///
/// let prices = Column::numeric(vec![1.0, 2.0, 3.0], ValidityBitmap::all_valid(3));
/// let ds = Dataset::from_columns(vec![("price".to_string(), prices)]).unwrap();
/// let summary = summarize_values("price", &[1.0, 2.0, 3.0], 0);
/// let insights = generate_insights(&ds.meta(), &[summary], &[], &[], &[]);
/// assert_eq!(insights.len(), 2);
/// assert_eq!(insights[0].message, "Dataset contains 3 records in 1 field: 1 numeric, 0 categorical, 0 temporal");
/// assert_eq!(insights[1].category, InsightCategory::Summary);
/// ```
pub fn generate_insights(
    dataset: &DatasetMeta,
    summaries: &[ColumnSummary],
    outliers: &[OutlierReport],
    correlations: &[CorrelationEntry],
    trends: &[TrendResult],
) -> Vec<Insight> {
    let mut insights = Vec::new();
    insights.extend(outliers.iter().filter_map(outlier_insight));

    let mut strong: Vec<&CorrelationEntry> =
        correlations.iter().filter(|c| c.strength.is_strong()).collect();
    strong.sort_by(|a, b| by_magnitude(a, b));
    insights.extend(strong.into_iter().map(correlation_insight));

    insights.extend(
        trends
            .iter()
            .filter(|t| t.direction != Direction::Stable)
            .map(trend_insight),
    );
    insights.extend(dataset_insight(dataset));
    insights.extend(summaries.iter().map(summary_insight));
    insights
}

fn by_magnitude(a: &CorrelationEntry, b: &CorrelationEntry) -> Ordering {
    b.r.abs()
        .total_cmp(&a.r.abs())
        .then_with(|| a.column_a.cmp(&b.column_a))
        .then_with(|| a.column_b.cmp(&b.column_b))
}

// ── Phrasing ──────────────────────────────────────────────────────────

fn outlier_insight(report: &OutlierReport) -> Option<Insight> {
    if report.is_empty() {
        return None;
    }
    let rows = report.flagged_rows().len();
    let noun = if rows == 1 { "outlier" } else { "outliers" };
    let mut message = format!("Detected {rows} {noun} in '{}'", report.column);
    if report.valid_count > 0 {
        let pct = rows as f64 / report.valid_count as f64 * 100.0;
        message.push_str(&format!(" ({pct:.1}% of data)"));
    }
    message.push_str(&format!(
        ": {} by IQR, {} by Z-score",
        report.count(OutlierMethod::Iqr),
        report.count(OutlierMethod::ZScore)
    ));
    Some(Insight::new(
        InsightCategory::Outlier,
        message,
        vec![report.column.clone()],
    ))
}

fn correlation_insight(entry: &CorrelationEntry) -> Insight {
    Insight::new(
        InsightCategory::Correlation,
        format!(
            "Found {} {} correlation (r = {:.3}) between '{}' and '{}'",
            entry.strength, entry.sign, entry.r, entry.column_a, entry.column_b
        ),
        vec![entry.column_a.clone(), entry.column_b.clone()],
    )
}

fn trend_insight(trend: &TrendResult) -> Insight {
    let mut message = format!(
        "'{}' shows {} trend along '{}' (slope {:.4}, R² = {:.3})",
        trend.column, trend.direction, trend.time_axis, trend.slope, trend.r_squared
    );
    if let Some(change) = trend.change_pct {
        message.push_str(&format!(" with {change:.1}% change"));
    }
    Insight::new(InsightCategory::Trend, message, vec![trend.column.clone()])
}

fn dataset_insight(meta: &DatasetMeta) -> Option<Insight> {
    if meta.column_count == 0 {
        return None;
    }
    let records = if meta.row_count == 1 { "record" } else { "records" };
    let fields = if meta.column_count == 1 { "field" } else { "fields" };
    let message = format!(
        "Dataset contains {} {records} in {} {fields}: {} numeric, {} categorical, {} temporal",
        meta.row_count,
        meta.column_count,
        meta.count_of(ColumnKind::Numeric),
        meta.count_of(ColumnKind::Categorical),
        meta.count_of(ColumnKind::Temporal),
    );
    Some(Insight::new(InsightCategory::Summary, message, Vec::new()))
}

fn summary_insight(summary: &ColumnSummary) -> Insight {
    let message = match (
        summary.mean,
        summary.median,
        summary.std_dev,
        summary.min,
        summary.max,
    ) {
        (Some(mean), Some(median), Some(std), Some(min), Some(max)) => format!(
            "'{}': {} values, mean {mean:.2}, median {median:.2}, std {std:.2}, range [{min:.2}, {max:.2}]",
            summary.column, summary.count
        ),
        _ => format!(
            "'{}' has no data ({} missing values)",
            summary.column, summary.missing
        ),
    };
    Insight::new(
        InsightCategory::Summary,
        message,
        vec![summary.column.clone()],
    )
}

// ── Tests ─────────────────────────────────────────────────────────────
