//! Error types for housing-dashboard operations.
//!
//! Every failure of the load → train → predict pipeline maps to one variant,
//! so the web layer can turn it into a message instead of a crash.

use std::process::ExitCode;
use thiserror::Error;

/// Main error type for dashboard operations.
///
/// # Examples
///
/// ```
/// use housing_dashboard::error::DashboardError;
///
/// let err = DashboardError::PredictionInputMismatch {
///     expected: 13,
///     actual: 6,
/// };
/// assert!(err.to_string().contains("expected 13 features, got 6"));
/// ```
#[derive(Error, Debug)]
pub enum DashboardError {
    /// The data source could not be reached or returned a non-success status.
    #[error("Data unavailable from {source_name}: {message}")]
    DataUnavailable {
        /// URL or path that was requested
        source_name: String,
        /// Transport or status description
        message: String,
    },

    /// The payload was fetched but is not a numeric CSV table.
    #[error("Malformed data at line {line}: {message}")]
    MalformedData {
        /// 1-based line number (1 is the header)
        line: usize,
        /// What went wrong
        message: String,
    },

    /// A named column is absent from the table.
    #[error("Column not found: {name}")]
    MissingColumn {
        /// Column name that was looked up
        name: String,
    },

    /// The model could not be fitted.
    #[error("Training failed: {0}")]
    TrainingFailure(String),

    /// The prediction row does not match the features the model was trained on.
    #[error("Prediction input mismatch: expected {expected} features, got {actual}")]
    PredictionInputMismatch {
        /// Number of features used in training
        expected: usize,
        /// Number of values supplied
        actual: usize,
    },

    /// Matrix/vector dimensions don't match for the operation.
    #[error("Matrix dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions description
        expected: String,
        /// Actual dimensions found
        actual: String,
    },

    /// Invalid hyperparameter value provided.
    #[error("Invalid hyperparameter: {param} = {value}, expected {constraint}")]
    InvalidHyperparameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// User-supplied value that cannot be used (bad number, empty selection).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be assembled.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error (file not found, permission denied, bind failure).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DashboardError {
    /// Create a dimension mismatch error with descriptive context
    #[must_use]
    pub fn dimension_mismatch(context: &str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            expected: format!("{context}={expected}"),
            actual: format!("{actual}"),
        }
    }

    /// Create a missing column error
    #[must_use]
    pub fn missing_column(name: impl Into<String>) -> Self {
        Self::MissingColumn { name: name.into() }
    }

    /// Stable machine-readable name of the variant, used in JSON responses.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DataUnavailable { .. } => "data_unavailable",
            Self::MalformedData { .. } => "malformed_data",
            Self::MissingColumn { .. } => "missing_column",
            Self::TrainingFailure(_) => "training_failure",
            Self::PredictionInputMismatch { .. } => "prediction_input_mismatch",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::InvalidHyperparameter { .. } => "invalid_hyperparameter",
            Self::InvalidInput(_) => "invalid_input",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
        }
    }

    /// HTTP status code reported for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::PredictionInputMismatch { .. } | Self::DimensionMismatch { .. } => 422,
            Self::DataUnavailable { .. } | Self::MalformedData { .. } => 502,
            Self::MissingColumn { .. }
            | Self::TrainingFailure(_)
            | Self::InvalidHyperparameter { .. }
            | Self::Config(_)
            | Self::Io(_) => 500,
        }
    }

    /// Get exit code for this error
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::DataUnavailable { .. } => ExitCode::from(10),
            Self::MalformedData { .. } | Self::MissingColumn { .. } => ExitCode::from(4),
            Self::TrainingFailure(_) | Self::InvalidHyperparameter { .. } => ExitCode::from(6),
            Self::PredictionInputMismatch { .. } | Self::DimensionMismatch { .. } => {
                ExitCode::from(8)
            }
            Self::InvalidInput(_) | Self::Config(_) => ExitCode::from(2),
            Self::Io(_) => ExitCode::from(7),
        }
    }
}

impl From<&str> for DashboardError {
    fn from(msg: &str) -> Self {
        Self::InvalidInput(msg.to_string())
    }
}

impl From<String> for DashboardError {
    fn from(msg: String) -> Self {
        Self::InvalidInput(msg)
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, DashboardError>;
