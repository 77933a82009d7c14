//! Model training: feature/target split and random-forest fitting.
//!
//! # Example
//!
//! ```
//! use housing_dashboard::data::DataFrame;
//! use housing_dashboard::trainer::{train_model, FeatureSelection, TrainerOptions};
//!
//! let csv = "CRIM,INDUS,CHAS,NOX,RM,PTRATIO,MEDV\n\
//!            1,1,0,0.5,6,15,20\n\
//!            2,2,1,0.5,7,16,25\n\
//!            3,3,0,0.5,8,17,30\n";
//! let frame = DataFrame::from_csv_reader(csv.as_bytes()).expect("valid CSV");
//! let options = TrainerOptions {
//!     n_estimators: 10,
//!     random_state: Some(42),
//!     feature_selection: FeatureSelection::Solicited,
//!     ..TrainerOptions::default()
//! };
//! let model = train_model(&frame, &options).expect("training succeeds");
//! let price = model.predict(&[2.0, 2.0, 1.0, 0.5, 7.0, 16.0]).expect("six features");
//! assert!((20.0..=30.0).contains(&price));
//! ```

use crate::data::DataFrame;
use crate::error::{DashboardError, Result};
use crate::loader::{self, DataSource, FetchOptions};
use crate::metrics::{mae, mse, r_squared, rmse};
use crate::primitives::Matrix;
use crate::tree::RandomForestRegressor;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;

/// Target column of the housing table.
pub const TARGET_COLUMN: &str = "MEDV";

/// The six features collected by the sidebar form, in prediction order.
pub const SOLICITED_FEATURES: [&str; 6] = ["CRIM", "INDUS", "CHAS", "NOX", "RM", "PTRATIO"];

/// Which columns become model features.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeatureSelection {
    /// Every non-target column, in table order
    AllColumns,
    /// [`SOLICITED_FEATURES`], matching the sidebar form
    #[default]
    Solicited,
    /// A caller-chosen list, in the given order
    Explicit(Vec<String>),
}

impl FeatureSelection {
    /// Resolves the selection against `frame`.
    ///
    /// # Errors
    ///
    /// - [`DashboardError::MissingColumn`] if a selected column is absent
    /// - [`DashboardError::TrainingFailure`] if no feature remains or the
    ///   target is listed as a feature
    pub fn resolve(&self, frame: &DataFrame, target: &str) -> Result<Vec<String>> {
        let names: Vec<String> = match self {
            Self::AllColumns => frame
                .column_names()
                .into_iter()
                .filter(|name| *name != target)
                .map(str::to_string)
                .collect(),
            Self::Solicited => SOLICITED_FEATURES.iter().map(|s| (*s).to_string()).collect(),
            Self::Explicit(names) => names.clone(),
        };

        if names.is_empty() {
            return Err(DashboardError::TrainingFailure(
                "no feature columns to train on".to_string(),
            ));
        }
        if names.iter().any(|name| name == target) {
            return Err(DashboardError::TrainingFailure(format!(
                "target column '{target}' cannot also be a feature"
            )));
        }
        if let Some(missing) = names.iter().find(|name| !frame.has_column(name)) {
            return Err(DashboardError::missing_column(missing.as_str()));
        }
        Ok(names)
    }
}

/// Hyperparameters and column choices for [`train_model`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerOptions {
    /// Number of trees
    pub n_estimators: usize,
    /// Depth limit per tree (`None` grows until leaves are pure)
    pub max_depth: Option<usize>,
    /// Minimum samples to split a node
    pub min_samples_split: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Bootstrap seed; `None` varies run to run
    pub random_state: Option<u64>,
    /// Feature columns
    pub feature_selection: FeatureSelection,
    /// Target column
    pub target: String,
}

impl Default for TrainerOptions {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            random_state: None,
            feature_selection: FeatureSelection::default(),
            target: TARGET_COLUMN.to_string(),
        }
    }
}

impl TrainerOptions {
    /// Rejects hyperparameters the forest cannot use.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::InvalidHyperparameter`] for zero trees or a
    /// zero leaf size.
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(DashboardError::InvalidHyperparameter {
                param: "n_estimators".to_string(),
                value: "0".to_string(),
                constraint: ">= 1".to_string(),
            });
        }
        if self.min_samples_leaf == 0 {
            return Err(DashboardError::InvalidHyperparameter {
                param: "min_samples_leaf".to_string(),
                value: "0".to_string(),
                constraint: ">= 1".to_string(),
            });
        }
        if self.min_samples_split < 2 {
            return Err(DashboardError::InvalidHyperparameter {
                param: "min_samples_split".to_string(),
                value: self.min_samples_split.to_string(),
                constraint: ">= 2".to_string(),
            });
        }
        Ok(())
    }

    fn build_forest(&self) -> RandomForestRegressor {
        let mut forest = RandomForestRegressor::new(self.n_estimators)
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf);
        if let Some(depth) = self.max_depth {
            forest = forest.with_max_depth(depth);
        }
        if let Some(seed) = self.random_state {
            forest = forest.with_random_state(seed);
        }
        forest
    }
}

/// Fit diagnostics shown on the summary endpoint and by `train`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    /// R² on the training rows
    pub train_r2: f32,
    /// MSE on the training rows
    pub train_mse: f32,
    /// RMSE on the training rows, in target units
    pub train_rmse: f32,
    /// MAE on the training rows
    pub train_mae: f32,
    /// Out-of-bag R², when any row was left out of a bootstrap
    pub oob_r2: Option<f32>,
    /// Normalized importance per feature, in feature order
    pub feature_importances: Vec<(String, f32)>,
    /// Wall-clock fit time
    pub duration_ms: u64,
}

/// A fitted forest together with the column layout it expects.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    forest: RandomForestRegressor,
    feature_names: Vec<String>,
    target: String,
    n_samples: usize,
    report: TrainingReport,
}

impl TrainedModel {
    /// Feature columns in the order `predict` expects them.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Target column name.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Number of training rows.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Fit diagnostics.
    #[must_use]
    pub fn report(&self) -> &TrainingReport {
        &self.report
    }

    /// The underlying forest.
    #[must_use]
    pub fn forest(&self) -> &RandomForestRegressor {
        &self.forest
    }

    /// Predicts the target for one row given in [`feature_names`](Self::feature_names) order.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::PredictionInputMismatch`] if `row` does not
    /// have exactly one value per training feature.
    pub fn predict(&self, row: &[f32]) -> Result<f32> {
        if row.len() != self.feature_names.len() {
            return Err(DashboardError::PredictionInputMismatch {
                expected: self.feature_names.len(),
                actual: row.len(),
            });
        }
        let x = Matrix::from_vec(1, row.len(), row.to_vec())
            .map_err(|e| DashboardError::InvalidInput(e.to_string()))?;
        let predictions = self.forest.predict(&x)?;
        predictions
            .get(0)
            .ok_or_else(|| DashboardError::TrainingFailure("forest returned no prediction".into()))
    }

    /// Predicts from a name → value map, assembling the row in training order.
    ///
    /// Unknown names are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::PredictionInputMismatch`] if any training
    /// feature is missing from `values`.
    pub fn predict_named(&self, values: &HashMap<String, f32>) -> Result<f32> {
        let row: Vec<f32> = self
            .feature_names
            .iter()
            .filter_map(|name| values.get(name).copied())
            .collect();
        if row.len() != self.feature_names.len() {
            return Err(DashboardError::PredictionInputMismatch {
                expected: self.feature_names.len(),
                actual: row.len(),
            });
        }
        self.predict(&row)
    }
}

/// Splits `frame` into features and target and fits a random forest.
///
/// # Errors
///
/// - [`DashboardError::TrainingFailure`] if the target is absent or the table is empty
/// - [`DashboardError::MissingColumn`] if a selected feature is absent
/// - [`DashboardError::InvalidHyperparameter`] for unusable options
pub fn train_model(frame: &DataFrame, options: &TrainerOptions) -> Result<TrainedModel> {
    options.validate()?;

    let target = options.target.as_str();
    if !frame.has_column(target) {
        return Err(DashboardError::TrainingFailure(format!(
            "target column '{target}' not found"
        )));
    }
    if frame.n_rows() == 0 {
        return Err(DashboardError::TrainingFailure(
            "dataset has no rows".to_string(),
        ));
    }

    let feature_names = options.feature_selection.resolve(frame, target)?;
    let name_refs: Vec<&str> = feature_names.iter().map(String::as_str).collect();
    let x = frame.to_matrix_of(&name_refs)?;
    let y = frame.column(target)?.clone();

    let started = Instant::now();
    let mut forest = options.build_forest();
    forest.fit(&x, &y)?;

    let fitted = forest.predict(&x)?;
    let importances = forest.feature_importances().unwrap_or_default();
    let report = TrainingReport {
        train_r2: r_squared(&fitted, &y),
        train_mse: mse(&fitted, &y),
        train_rmse: rmse(&fitted, &y),
        train_mae: mae(&fitted, &y),
        oob_r2: forest.oob_score(),
        feature_importances: feature_names.iter().cloned().zip(importances).collect(),
        duration_ms: started.elapsed().as_millis() as u64,
    };

    tracing::info!(
        rows = frame.n_rows(),
        features = feature_names.len(),
        trees = options.n_estimators,
        seed = ?options.random_state,
        train_r2 = report.train_r2,
        train_rmse = report.train_rmse,
        oob_r2 = ?report.oob_r2,
        duration_ms = report.duration_ms,
        "random forest trained"
    );

    Ok(TrainedModel {
        forest,
        feature_names,
        target: target.to_string(),
        n_samples: frame.n_rows(),
        report,
    })
}

/// Loads the table from `source` and trains on it.
///
/// # Errors
///
/// Propagates loader and training errors.
pub fn train_model_from_source(
    source: &DataSource,
    fetch: &FetchOptions,
    options: &TrainerOptions,
) -> Result<TrainedModel> {
    let loaded = loader::get_data(source, fetch)?;
    train_model(&loaded.frame, options)
}

#[cfg(test)]
#[path = "trainer_tests.rs"]
mod tests;
