//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use housing_dashboard::prelude::*;
//! ```

pub use crate::config::{DashboardConfig, ViewSettings};
pub use crate::data::DataFrame;
pub use crate::error::{DashboardError, Result};
pub use crate::loader::{get_data, parse_csv, DataSource, FetchOptions, LoadedData};
pub use crate::metrics::{mae, mse, r_squared, rmse};
pub use crate::presentation::{filter_default_columns, filter_target_range, format_prediction};
pub use crate::primitives::{Matrix, Vector};
pub use crate::stats::Histogram;
pub use crate::trainer::{train_model, FeatureSelection, TrainedModel, TrainerOptions};
pub use crate::tree::{DecisionTreeRegressor, RandomForestRegressor};
