//! JSON export of analysis reports.
//!
//! The document mirrors [`AnalysisReport`] field for field. Undefined
//! statistics appear as `null`, and floats are written with enough digits
//! that [`from_json`] reconstructs them exactly.
//!
//! # Example
//!
//! ```
//! use tabular_insight::dataset::{Column, Dataset, ValidityBitmap};
//! use tabular_insight::export::{from_json, to_json};
//! use tabular_insight::report::{analyze, AnalysisDirective};
//!
//! let ds = Dataset::from_columns(vec![(
//!     "v".to_string(),
//!     Column::numeric(vec![0.1, 0.2, 0.7], ValidityBitmap::all_valid(3)),
//! )])
//! .unwrap();
//! let report = analyze(&ds, &AnalysisDirective::default()).unwrap();
//!
//! let json = to_json(&report).unwrap();
//! assert_eq!(from_json(&json).unwrap(), report);
//! ```

use std::io;

use crate::error::InsightError;
use crate::report::AnalysisReport;

/// Compact JSON document.
pub fn to_json(report: &AnalysisReport) -> Result<String, InsightError> {
    Ok(serde_json::to_string(report)?)
}

/// Indented JSON document.
pub fn to_json_pretty(report: &AnalysisReport) -> Result<String, InsightError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// The report as a JSON value tree, for hosts that embed it in a larger
/// document.
pub fn to_value(report: &AnalysisReport) -> Result<serde_json::Value, InsightError> {
    Ok(serde_json::to_value(report)?)
}

/// Writes the indented document to `writer`.
pub fn write_json<W: io::Write>(report: &AnalysisReport, mut writer: W) -> Result<(), InsightError> {
    serde_json::to_writer_pretty(&mut writer, report).map_err(|e| {
        if e.is_io() {
            InsightError::Io(e.to_string())
        } else {
            InsightError::Serialization(e.to_string())
        }
    })?;
    writer.flush()?;
    tracing::debug!("report written");
    Ok(())
}

/// Parses a document produced by this module.
pub fn from_json(json: &str) -> Result<AnalysisReport, InsightError> {
    Ok(serde_json::from_str(json)?)
}

// ── Tests ─────────────────────────────────────────────────────────────
