//! Housing-dashboard: a housing price data app in pure Rust.
//!
//! Loads the Boston housing CSV, fits a random forest regressor on `MEDV`
//! and serves a dashboard with a column preview, a price histogram and a
//! sidebar prediction form.
//!
//! # Quick Start
//!
//! ```
//! use housing_dashboard::prelude::*;
//!
//! let csv = "CRIM,INDUS,CHAS,NOX,RM,PTRATIO,MEDV\n\
//!            0.1,2.0,0,0.40,6.5,15.0,30.0\n\
//!            0.3,4.0,0,0.50,5.9,17.0,22.0\n\
//!            2.5,10.0,1,0.65,5.2,20.0,12.0\n";
//! let frame = parse_csv(csv.as_bytes()).expect("valid CSV");
//!
//! let options = TrainerOptions {
//!     n_estimators: 10,
//!     random_state: Some(42),
//!     ..TrainerOptions::default()
//! };
//! let model = train_model(&frame, &options).expect("training succeeds");
//! let prediction = model.predict(&[0.1, 2.0, 0.0, 0.4, 6.5, 15.0]).expect("six features");
//! assert!(format_prediction(prediction).starts_with("US $ "));
//! ```
//!
//! # Modules
//!
//! - [`primitives`]: Core Vector and Matrix types
//! - [`data`]: DataFrame for named columns
//! - [`loader`]: CSV acquisition from a URL or a file
//! - [`tree`]: Regression trees and the random forest
//! - [`metrics`]: Regression metrics (R², MSE, MAE, RMSE)
//! - [`stats`]: Equal-width histograms
//! - [`trainer`]: Feature selection and model training
//! - [`session`]: Per-browser caching of the table and model
//! - [`presentation`]: Page model, HTML rendering and the HTTP server
//! - [`config`]: Server and view settings
//! - [`cli`]: Command-line interface

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod loader;
pub mod metrics;
pub mod output;
pub mod prelude;
pub mod presentation;
pub mod primitives;
pub mod session;
pub mod stats;
pub mod trainer;
pub mod tree;

pub use error::{DashboardError, Result};
pub use primitives::{Matrix, Vector};
