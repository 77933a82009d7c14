//! Dashboard configuration.
//!
//! [`DashboardConfig::default`] reproduces the hard-coded behavior of the
//! housing app (published sheet URL, default preview columns, price slider
//! bounds). The CLI in [`crate::cli`] overrides individual fields.

use crate::error::{DashboardError, Result};
use crate::loader::{DataSource, FetchOptions};
use crate::trainer::TrainerOptions;

/// Columns shown in the preview table before the user picks any.
pub const DEFAULT_COLUMNS: [&str; 4] = ["RM", "PTRATIO", "LSTAT", "MEDV"];

/// Settings for the page widgets.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSettings {
    /// Preview columns before the user picks any
    pub default_columns: Vec<String>,
    /// Rows in the preview table
    pub preview_rows: usize,
    /// Upper bound of the price slider (the lower bound is the data minimum)
    pub price_ceiling: f32,
    /// Initially selected price range
    pub default_price_range: (f32, f32),
    /// Histogram bin count
    pub histogram_bins: usize,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            default_columns: DEFAULT_COLUMNS.iter().map(|s| (*s).to_string()).collect(),
            preview_rows: 10,
            price_ceiling: 150.0,
            default_price_range: (10.0, 100.0),
            histogram_bins: 100,
        }
    }
}

/// Everything the server and the CLI commands need.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    /// Where the CSV comes from
    pub source: DataSource,
    /// HTTP fetch options
    pub fetch: FetchOptions,
    /// Forest hyperparameters and feature choice
    pub trainer: TrainerOptions,
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Live browser sessions kept before the least recently used is evicted
    pub max_sessions: usize,
    /// Widget settings
    pub view: ViewSettings,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            source: DataSource::default(),
            fetch: FetchOptions::default(),
            trainer: TrainerOptions::default(),
            host: "127.0.0.1".to_string(),
            port: 8501,
            max_sessions: 64,
            view: ViewSettings::default(),
        }
    }
}

impl DashboardConfig {
    /// Get bind address
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Checks the settings before anything is loaded.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Config`] for unusable values.
    pub fn validate(&self) -> Result<()> {
        self.trainer
            .validate()
            .map_err(|e| DashboardError::Config(e.to_string()))?;

        if self.max_sessions == 0 {
            return Err(DashboardError::Config(
                "max_sessions must be at least 1".to_string(),
            ));
        }
        if self.view.histogram_bins == 0 {
            return Err(DashboardError::Config(
                "histogram_bins must be at least 1".to_string(),
            ));
        }
        if self.host.trim().is_empty() {
            return Err(DashboardError::Config("host cannot be empty".to_string()));
        }
        if let DataSource::Url(url) = &self.source {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(DashboardError::Config(format!(
                    "data URL must be http(s): {url}"
                )));
            }
        }
        Ok(())
    }
}
