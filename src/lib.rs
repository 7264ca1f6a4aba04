//! # tabular-insight
//!
//! Descriptive statistics, outlier detection, correlation, trend estimation
//! and templated insights over in-memory tabular data.
//!
//! Input is a [`loader::RawTable`] (or a prebuilt [`dataset::Dataset`]);
//! output is an [`report::AnalysisReport`] that can be exported as JSON.
//! Each analysis category can be toggled independently:
//!
//! - **Statistics**: count, mean, median, sample std, min/max, quartiles
//! - **Outliers**: Tukey IQR fences and Z-scores, reported per method
//! - **Correlation**: pairwise Pearson r with strength bands
//! - **Trend**: least-squares slope along a row, numeric or temporal axis
//! - **Insights**: short statements in fixed priority order
//!
//! ## Modules
//!
//! - [`dataset`] — Column-major data model (Dataset, Column, ColumnKind, validity bitmap)
//! - [`loader`] — Raw table validation, kind inference and coercion
//! - [`stats`] — Numeric, categorical and temporal column summaries
//! - [`outliers`] — IQR and Z-score outlier detection
//! - [`correlation`] — Pearson correlation with strength and sign labels
//! - [`trend`] — OLS trend fitting and direction labelling
//! - [`insights`] — Human-readable statements from finished results
//! - [`report`] — Analysis directive, pipeline and report
//! - [`export`] — JSON export and re-import
//! - [`error`] — Error types
//!
//! ## Quick Start
//!
//! ```
//! use tabular_insight::loader::{KindDeclaration, LoaderConfig, RawTable, RawValue};
//! use tabular_insight::report::{analyze_table, AnalysisDirective};
//! use tabular_insight::trend::Direction;
//!
//! let mut table = RawTable::new(vec!["month".into(), "sales".into()]);
//! for (month, sales) in [(1.0, 10.0), (2.0, 12.5), (3.0, 14.0), (4.0, 17.0)] {
//!     table.push_row(vec![RawValue::Number(month), RawValue::Number(sales)]);
//! }
//!
//! let directive = AnalysisDirective::default().time_axis("month");
//! let report = analyze_table(
//!     table,
//!     &LoaderConfig::default(),
//!     &KindDeclaration::inferred(),
//!     &directive,
//! )
//! .unwrap();
//!
//! assert_eq!(report.summaries.len(), 2);
//! assert_eq!(report.trend("sales").unwrap().direction, Direction::Increasing);
//! assert!(!report.insights.is_empty());
//! ```

pub mod correlation;
pub mod dataset;
pub mod error;
pub mod export;
pub mod insights;
pub mod loader;
pub mod outliers;
pub mod report;
pub mod stats;
pub mod trend;
