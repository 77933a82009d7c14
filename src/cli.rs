//! Command-line interface.
//!
//! ```text
//! housing-dashboard serve                      # dashboard on 127.0.0.1:8501
//! housing-dashboard serve --file housing.csv   # local CSV instead of the sheet
//! housing-dashboard train --seed 42            # fit once and print the report
//! housing-dashboard predict --rm 6.5 ...       # one prediction from flags
//! ```

use crate::config::DashboardConfig;
use crate::error::{DashboardError, Result};
use crate::loader::{self, DataSource, FetchOptions, DEFAULT_DATA_URL};
use crate::output;
use crate::presentation::{self, format_prediction};
use crate::trainer::{self, FeatureSelection, TrainedModel, TrainerOptions};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// housing-dashboard - Housing price data app
///
/// Loads the Boston housing CSV, trains a random forest on MEDV and serves a
/// dashboard with a preview table, a price histogram and a prediction form.
#[derive(Parser, Debug)]
#[command(name = "housing-dashboard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the dashboard
    Serve {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        model: ModelArgs,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, env = "HOUSING_PORT", default_value = "8501")]
        port: u16,

        /// Maximum concurrent browser sessions
        #[arg(long, default_value = "64")]
        max_sessions: usize,
    },

    /// Train once and print the fit report
    Train {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Train once and predict a single house
    Predict {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        model: ModelArgs,

        #[command(flatten)]
        house: HouseArgs,
    },
}

/// Where the CSV comes from.
#[derive(Args, Debug, Clone, Default)]
pub struct DataArgs {
    /// CSV URL (defaults to the published housing sheet)
    #[arg(long, env = "HOUSING_DATA_URL")]
    pub url: Option<String>,

    /// Local CSV file; takes precedence over --url
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Fetch timeout in seconds (0 waits indefinitely)
    #[arg(long, default_value = "30")]
    pub timeout_secs: u64,
}

impl DataArgs {
    /// Data source selected by the flags.
    #[must_use]
    pub fn source(&self) -> DataSource {
        match (&self.file, &self.url) {
            (Some(path), _) => DataSource::File(path.clone()),
            (None, Some(url)) => DataSource::Url(url.clone()),
            (None, None) => DataSource::Url(DEFAULT_DATA_URL.to_string()),
        }
    }

    /// Fetch options selected by the flags.
    #[must_use]
    pub fn fetch(&self) -> FetchOptions {
        FetchOptions {
            timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
        }
    }
}

/// Forest hyperparameters.
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Number of trees
    #[arg(long, default_value = "100")]
    pub trees: usize,

    /// Depth limit per tree
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Minimum samples per leaf
    #[arg(long, default_value = "1")]
    pub min_samples_leaf: usize,

    /// Bootstrap seed for reproducible forests
    #[arg(long)]
    pub seed: Option<u64>,

    /// Train on every non-target column instead of the six form fields
    #[arg(long)]
    pub all_features: bool,
}

impl ModelArgs {
    /// Trainer options selected by the flags.
    #[must_use]
    pub fn trainer_options(&self) -> TrainerOptions {
        TrainerOptions {
            n_estimators: self.trees,
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
            random_state: self.seed,
            feature_selection: if self.all_features {
                FeatureSelection::AllColumns
            } else {
                FeatureSelection::Solicited
            },
            ..TrainerOptions::default()
        }
    }
}

/// Feature values for `predict`.
#[derive(Args, Debug, Clone, Default)]
pub struct HouseArgs {
    /// Per-capita crime rate
    #[arg(long)]
    pub crim: Option<f32>,

    /// Proportion of non-retail business acres
    #[arg(long)]
    pub indus: Option<f32>,

    /// Bounds the river: 1 or 0
    #[arg(long)]
    pub chas: Option<f32>,

    /// Nitric oxide concentration
    #[arg(long)]
    pub nox: Option<f32>,

    /// Average rooms per dwelling
    #[arg(long)]
    pub rm: Option<f32>,

    /// Pupil-teacher ratio
    #[arg(long)]
    pub ptratio: Option<f32>,

    /// Any other column, as NAME=VALUE (repeatable)
    #[arg(long = "feature", value_name = "NAME=VALUE", value_parser = parse_feature)]
    pub extra: Vec<(String, f32)>,
}

impl HouseArgs {
    /// Named values to hand to the model.
    #[must_use]
    pub fn values(&self) -> HashMap<String, f32> {
        let named = [
            ("CRIM", self.crim),
            ("INDUS", self.indus),
            ("CHAS", self.chas),
            ("NOX", self.nox),
            ("RM", self.rm),
            ("PTRATIO", self.ptratio),
        ];
        named
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name.to_string(), v)))
            .chain(self.extra.iter().cloned())
            .collect()
    }
}

fn parse_feature(raw: &str) -> std::result::Result<(String, f32), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing feature name in '{raw}'"));
    }
    let value = value
        .trim()
        .parse::<f32>()
        .map_err(|e| format!("invalid value for {name}: {e}"))?;
    Ok((name.to_string(), value))
}

impl Cli {
    /// Dashboard configuration assembled from the flags.
    #[must_use]
    pub fn config(&self) -> DashboardConfig {
        match &self.command {
            Commands::Serve {
                data,
                model,
                host,
                port,
                max_sessions,
            } => DashboardConfig {
                source: data.source(),
                fetch: data.fetch(),
                trainer: model.trainer_options(),
                host: host.clone(),
                port: *port,
                max_sessions: *max_sessions,
                ..DashboardConfig::default()
            },
            Commands::Train { data, model } | Commands::Predict { data, model, .. } => {
                DashboardConfig {
                    source: data.source(),
                    fetch: data.fetch(),
                    trainer: model.trainer_options(),
                    ..DashboardConfig::default()
                }
            }
        }
    }
}

/// Log filter for the binary.
///
/// A non-empty `RUST_LOG` is used as given. Otherwise the crate logs at
/// `info`, or `debug` with `--verbose`. An unparsable `RUST_LOG` falls back
/// to the default.
#[must_use]
pub fn log_filter(rust_log: Option<&str>, verbose: bool) -> EnvFilter {
    let default = if verbose {
        "housing_dashboard=debug"
    } else {
        "housing_dashboard=info"
    };
    match rust_log.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => EnvFilter::try_new(value).unwrap_or_else(|e| {
            eprintln!("ignoring invalid RUST_LOG '{value}': {e}");
            EnvFilter::new(default)
        }),
        None => EnvFilter::new(default),
    }
}

/// Runs the parsed command.
///
/// # Errors
///
/// Returns the first pipeline error; the binary maps it to an exit code.
pub fn execute_command(cli: &Cli) -> Result<()> {
    let config = cli.config();
    config.validate()?;

    match &cli.command {
        Commands::Serve { .. } => run_serve(config),
        Commands::Train { .. } => run_train(&config, cli.json),
        Commands::Predict { house, .. } => run_predict(&config, house, cli.json),
    }
}

fn run_serve(config: DashboardConfig) -> Result<()> {
    println!("{}", "=== Housing Dashboard ===".cyan().bold());
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(presentation::serve(config))
}

fn load_and_train(config: &DashboardConfig) -> Result<(String, TrainedModel)> {
    let loaded = loader::get_data(&config.source, &config.fetch)?;
    let model = trainer::train_model(&loaded.frame, &config.trainer)?;
    Ok((loaded.fingerprint, model))
}

fn run_train(config: &DashboardConfig, json: bool) -> Result<()> {
    let (fingerprint, model) = load_and_train(config)?;
    let report = model.report();

    if json {
        let body = serde_json::json!({
            "source": config.source.to_string(),
            "fingerprint": fingerprint,
            "target": model.target(),
            "features": model.feature_names(),
            "n_samples": model.n_samples(),
            "report": report,
        });
        println!("{}", to_pretty(&body)?);
        return Ok(());
    }

    output::section("Training Report");
    output::kv("Source", &config.source);
    output::kv("Fingerprint", &fingerprint);
    output::kv("Rows", model.n_samples());
    output::kv("Target", model.target());
    output::kv("Trees", config.trainer.n_estimators);
    output::kv("Train R²", format!("{:.4}", report.train_r2));
    output::kv("Train MSE", format!("{:.4}", report.train_mse));
    output::kv("Train RMSE", format!("{:.4}", report.train_rmse));
    output::kv("Train MAE", format!("{:.4}", report.train_mae));
    match report.oob_r2 {
        Some(oob) => output::kv("OOB R²", format!("{oob:.4}")),
        None => output::kv("OOB R²", "n/a".dimmed()),
    }
    output::kv("Duration", format!("{} ms", report.duration_ms));

    output::section("Feature Importances");
    let mut ranked = report.feature_importances.clone();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    for (name, importance) in &ranked {
        println!(
            "  {:<8} {} {:.4}",
            name.white().bold(),
            output::bar(*importance, 30),
            importance
        );
    }
    println!();
    output::success("model trained");
    Ok(())
}

fn run_predict(config: &DashboardConfig, house: &HouseArgs, json: bool) -> Result<()> {
    let model = trainer::train_model_from_source(&config.source, &config.fetch, &config.trainer)?;
    let values = house.values();
    let prediction = model.predict_named(&values)?;
    let display = format_prediction(prediction);

    if json {
        let body = serde_json::json!({ "prediction": prediction, "display": display });
        println!("{}", to_pretty(&body)?);
    } else {
        output::section("Prediction");
        for name in model.feature_names() {
            if let Some(value) = values.get(name) {
                output::kv(name, value);
            }
        }
        println!();
        println!("{} {}", "O valor previsto para o imóvel é:".bold(), display.green().bold());
    }
    Ok(())
}

fn to_pretty(value: &serde_json::Value) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| DashboardError::Config(format!("JSON output failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments parse")
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_defaults() {
        let cli = parse(&["housing-dashboard", "serve"]);
        let config = cli.config();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.max_sessions, 64);
        assert_eq!(config.trainer.n_estimators, 100);
        assert_eq!(config.trainer.feature_selection, FeatureSelection::Solicited);
        assert_eq!(config.fetch.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_serve_flags() {
        let cli = parse(&[
            "housing-dashboard",
            "serve",
            "--file",
            "housing.csv",
            "--host",
            "0.0.0.0",
            "--port",
            "9000",
            "--trees",
            "20",
            "--max-depth",
            "8",
            "--seed",
            "42",
            "--all-features",
            "--timeout-secs",
            "0",
        ]);
        let config = cli.config();
        assert_eq!(config.source, DataSource::File(PathBuf::from("housing.csv")));
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.trainer.n_estimators, 20);
        assert_eq!(config.trainer.max_depth, Some(8));
        assert_eq!(config.trainer.random_state, Some(42));
        assert_eq!(config.trainer.feature_selection, FeatureSelection::AllColumns);
        assert_eq!(config.fetch.timeout, None);
    }

    #[test]
    fn test_file_wins_over_url() {
        let args = DataArgs {
            url: Some("https://example.com/a.csv".to_string()),
            file: Some(PathBuf::from("b.csv")),
            timeout_secs: 30,
        };
        assert_eq!(args.source(), DataSource::File(PathBuf::from("b.csv")));
    }

    #[test]
    fn test_default_source_is_published_sheet() {
        assert_eq!(
            DataArgs::default().source(),
            DataSource::Url(DEFAULT_DATA_URL.to_string())
        );
    }

    #[test]
    fn test_predict_collects_named_values() {
        let cli = parse(&[
            "housing-dashboard",
            "predict",
            "--rm",
            "6.5",
            "--chas",
            "1",
            "--feature",
            "LSTAT=4.5",
        ]);
        let Commands::Predict { house, .. } = &cli.command else {
            panic!("expected predict");
        };
        let values = house.values();
        assert_eq!(values.len(), 3);
        assert_eq!(values["RM"], 6.5);
        assert_eq!(values["CHAS"], 1.0);
        assert_eq!(values["LSTAT"], 4.5);
    }

    #[test]
    fn test_bad_feature_pair_is_rejected() {
        assert!(Cli::try_parse_from(["housing-dashboard", "predict", "--feature", "LSTAT"]).is_err());
        assert!(Cli::try_parse_from(["housing-dashboard", "predict", "--feature", "=4"]).is_err());
        assert!(
            Cli::try_parse_from(["housing-dashboard", "predict", "--feature", "RM=abc"]).is_err()
        );
    }

    #[test]
    fn test_zero_trees_fails_validation() {
        let cli = parse(&["housing-dashboard", "train", "--trees", "0"]);
        assert!(matches!(
            execute_command(&cli),
            Err(DashboardError::Config(_))
        ));
    }

    #[test]
    fn test_global_flags() {
        let cli = parse(&["housing-dashboard", "train", "--json", "-v"]);
        assert!(cli.json);
        assert!(cli.verbose);
    }

    #[test]
    fn test_log_filter_keeps_rust_log() {
        let filter = log_filter(Some("housing_dashboard=warn,axum=debug"), false).to_string();
        assert!(filter.contains("housing_dashboard=warn"));
        assert!(!filter.contains("housing_dashboard=info"));

        let verbose = log_filter(Some("housing_dashboard=error"), true).to_string();
        assert!(!verbose.contains("housing_dashboard=debug"));
    }

    #[test]
    fn test_log_filter_default_without_rust_log() {
        assert_eq!(log_filter(None, false).to_string(), "housing_dashboard=info");
        assert_eq!(log_filter(Some("  "), true).to_string(), "housing_dashboard=debug");
    }
}
