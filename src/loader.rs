//! Data loading: one fetch of the housing CSV, parsed into a [`DataFrame`].
//!
//! The default source is the published spreadsheet the dashboard was built
//! around. A local file can be used instead (offline demos, tests).
//! There is no retry and no caching here; memoization lives in
//! [`crate::session`].

use crate::data::DataFrame;
use crate::error::{DashboardError, Result};
use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Published CSV export of the housing spreadsheet.
pub const DEFAULT_DATA_URL: &str = "https://docs.google.com/spreadsheets/d/e/2PACX-1vQBbdw_C4TBIOwqvRMIU3r-Yv8vwZcHiCZphxmIictpMmPG23LPyjXdutp16aHDvE-D46GTfSOVfPfD/pub?output=csv";

/// Columns the sidebar form and the price chart depend on.
pub const REQUIRED_COLUMNS: [&str; 7] = ["CRIM", "INDUS", "CHAS", "NOX", "RM", "PTRATIO", "MEDV"];

/// Where the CSV comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataSource {
    /// Remote CSV fetched with a single HTTP GET
    Url(String),
    /// Local CSV file
    File(PathBuf),
}

impl Default for DataSource {
    fn default() -> Self {
        Self::Url(DEFAULT_DATA_URL.to_string())
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Transport options for [`get_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Whole-request timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// A parsed table plus the identity of the bytes it came from.
#[derive(Debug, Clone)]
pub struct LoadedData {
    /// Parsed table
    pub frame: DataFrame,
    /// BLAKE3 hex digest of the raw CSV bytes
    pub fingerprint: String,
    /// Display form of the source
    pub source: String,
}

/// Fetches the CSV from `source` and parses it.
///
/// # Errors
///
/// - [`DashboardError::DataUnavailable`] if the host is unreachable, the
///   status is not 2xx, the body cannot be read or the file cannot be opened
/// - [`DashboardError::MalformedData`] if the body is not a numeric CSV table
pub fn get_data(source: &DataSource, options: &FetchOptions) -> Result<LoadedData> {
    let source_name = source.to_string();
    let started = Instant::now();
    tracing::info!(source = %source_name, "fetching housing data");

    let bytes = match source {
        DataSource::Url(url) => fetch_url(url, options),
        DataSource::File(path) => std::fs::read(path).map_err(|e| DashboardError::DataUnavailable {
            source_name: source_name.clone(),
            message: e.to_string(),
        }),
    }
    .inspect_err(|e| tracing::warn!(source = %source_name, error = %e, "fetch failed"))?;

    let frame = parse_csv(&bytes)
        .inspect_err(|e| tracing::warn!(source = %source_name, error = %e, "parse failed"))?;
    let fingerprint = blake3::hash(&bytes).to_hex().to_string();

    tracing::info!(
        source = %source_name,
        bytes = bytes.len(),
        rows = frame.n_rows(),
        columns = frame.n_cols(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "housing data loaded"
    );

    Ok(LoadedData {
        frame,
        fingerprint,
        source: source_name,
    })
}

fn fetch_url(url: &str, options: &FetchOptions) -> Result<Vec<u8>> {
    let mut builder = ureq::AgentBuilder::new();
    if let Some(timeout) = options.timeout {
        builder = builder.timeout(timeout);
    }
    let agent = builder.build();

    let unavailable = |message: String| DashboardError::DataUnavailable {
        source_name: url.to_string(),
        message,
    };

    let response = match agent.get(url).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(code, _)) => {
            return Err(unavailable(format!("HTTP status {code}")));
        }
        Err(e) => return Err(unavailable(e.to_string())),
    };

    let mut body = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut body)
        .map_err(|e| unavailable(format!("Failed to read body: {e}")))?;
    Ok(body)
}

/// Parses CSV bytes (header row + numeric cells) into a table.
///
/// # Errors
///
/// Returns [`DashboardError::MalformedData`] for empty input, invalid UTF-8,
/// ragged rows or non-numeric cells.
pub fn parse_csv(bytes: &[u8]) -> Result<DataFrame> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(DashboardError::MalformedData {
            line: 1,
            message: "empty body".to_string(),
        });
    }
    let text = std::str::from_utf8(bytes).map_err(|e| DashboardError::MalformedData {
        line: 1,
        message: format!("body is not UTF-8: {e}"),
    })?;
    // Spreadsheet exports may start with a byte order mark
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    DataFrame::from_csv_reader(text.as_bytes())
}

/// Checks that every name in `names` is a column of `frame`.
///
/// # Errors
///
/// Returns [`DashboardError::MissingColumn`] naming the first absent column.
pub fn require_columns(frame: &DataFrame, names: &[&str]) -> Result<()> {
    match names.iter().find(|name| !frame.has_column(name)) {
        Some(name) => Err(DashboardError::missing_column(*name)),
        None => Ok(()),
    }
}
