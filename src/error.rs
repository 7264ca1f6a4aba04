//! Error types for tabular-insight.
//!
//! Every failure maps onto one [`ErrorCategory`]. Schema, type and
//! configuration errors abort an analysis run before a report exists;
//! insufficient-data errors are local to one analysis category and are
//! recovered by omitting that category from the report.

use thiserror::Error;

use crate::dataset::ColumnKind;

/// Coarse classification of an [`InsightError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Structural input problems (ragged rows, duplicate names).
    Schema,
    /// A column's declared kind disagrees with its data.
    Type,
    /// A single analysis lacks enough data points.
    InsufficientData,
    /// Invalid thresholds or directive references.
    Configuration,
    /// Serializing or writing the report failed.
    Export,
}

/// All errors produced by tabular-insight operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InsightError {
    /// Two columns share the same name.
    #[error("duplicate column name '{name}'")]
    DuplicateColumn { name: String },
    /// A row has a different number of fields than the header.
    #[error("row {row} has {actual} fields, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
    /// A column's length differs from the dataset's row count.
    #[error("column '{column}' has {actual} rows, expected {expected}")]
    DimensionMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
    /// The input declares no columns at all.
    #[error("input has no columns")]
    EmptySchema,
    /// A kind declaration names a column the input does not have.
    #[error("kind declared for unknown column '{name}'")]
    UnknownColumn { name: String },
    /// A record in a record list is not a field mapping.
    #[error("record {row} is not an object")]
    NotARecord { row: usize },
    /// A column holds too many values that cannot be read as its declared kind.
    #[error("column '{column}' has {invalid} values that are not {kind}, at most {allowed} tolerated")]
    KindMismatch {
        column: String,
        kind: ColumnKind,
        invalid: usize,
        allowed: usize,
    },
    /// Insufficient data for the requested operation.
    #[error("need at least {min_required} data points, got {actual}")]
    InsufficientData { min_required: usize, actual: usize },
    /// A series is constant where variation is required.
    #[error("series has zero variance")]
    ZeroVariance,
    /// A fitted quantity does not fit in an `f64`.
    #[error("{quantity} is outside the floating-point range")]
    OutOfRange { quantity: &'static str },
    /// A threshold or tolerance is outside its valid range.
    #[error("invalid value {value} for '{name}'")]
    InvalidThreshold { name: &'static str, value: f64 },
    /// A directive references a column the dataset does not have.
    #[error("column '{name}' not found")]
    ColumnNotFound { name: String },
    /// A directive requires a numeric (or time-axis capable) column.
    #[error("column '{name}' is not numeric")]
    NotNumeric { name: String },
    /// Report serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// I/O error while writing an exported document.
    #[error("I/O error: {0}")]
    Io(String),
}

impl InsightError {
    /// Returns the taxonomy category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DuplicateColumn { .. }
            | Self::RaggedRow { .. }
            | Self::DimensionMismatch { .. }
            | Self::EmptySchema
            | Self::UnknownColumn { .. }
            | Self::NotARecord { .. } => ErrorCategory::Schema,
            Self::KindMismatch { .. } => ErrorCategory::Type,
            Self::InsufficientData { .. } | Self::ZeroVariance | Self::OutOfRange { .. } => {
                ErrorCategory::InsufficientData
            }
            Self::InvalidThreshold { .. } | Self::ColumnNotFound { .. } | Self::NotNumeric { .. } => {
                ErrorCategory::Configuration
            }
            Self::Serialization(_) | Self::Io(_) => ErrorCategory::Export,
        }
    }

    /// Returns `true` if the error only affects one analysis category.
    pub fn is_recoverable(&self) -> bool {
        self.category() == ErrorCategory::InsufficientData
    }
}

impl From<std::io::Error> for InsightError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for InsightError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
