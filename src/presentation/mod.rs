//! Web presentation: page model, HTML rendering and the axum server.
//!
//! The page reads top to bottom: title, column picker with a ten-row
//! preview, a price range selector feeding a MEDV histogram. A sidebar form
//! predicts one house's value.
//!
//! Every request is a rerun of that page against the caller's
//! [`Session`](crate::session::Session), so the table and model come from the
//! session cache rather than being rebuilt.

mod render;
mod server;
mod view;

pub use render::Renderer;
pub use server::{
    router, serve, shutdown_signal, AppState, ErrorResponse, PredictRequest, PredictResponse,
    SummaryResponse,
};
pub use view::{
    build_page, parse_prediction_form, ChartView, FieldKind, PageRequest, PageView, PreviewView,
    SidebarField, SliderView,
};

use crate::data::DataFrame;
use crate::error::Result;

/// Keeps the default columns that exist in `available`, in default order.
///
/// Filtering an already filtered list returns it unchanged.
///
/// # Examples
///
/// ```
/// use housing_dashboard::presentation::filter_default_columns;
///
/// let defaults = ["RM", "PTRATIO", "LSTAT", "MEDV"];
/// let available = ["CRIM", "RM", "MEDV"];
/// assert_eq!(filter_default_columns(&defaults, &available), vec!["RM", "MEDV"]);
/// ```
#[must_use]
pub fn filter_default_columns<S, T>(defaults: &[S], available: &[T]) -> Vec<String>
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    defaults
        .iter()
        .map(|col| col.as_ref())
        .filter(|col| available.iter().any(|a| a.as_ref() == *col))
        .map(str::to_string)
        .collect()
}

/// Keeps the rows whose `target` value lies in `[low, high]`, both ends inclusive.
///
/// # Errors
///
/// Returns [`DashboardError::MissingColumn`](crate::error::DashboardError::MissingColumn)
/// if `target` is absent.
pub fn filter_target_range(frame: &DataFrame, target: &str, low: f32, high: f32) -> Result<DataFrame> {
    frame.filter_between(target, low, high)
}

/// Formats a model output for the sidebar.
///
/// The value is scaled by 10, rounded to two decimals and printed the way a
/// Python float prints: shortest round-trip digits with at least one
/// fractional digit.
///
/// # Examples
///
/// ```
/// use housing_dashboard::presentation::format_prediction;
///
/// assert_eq!(format_prediction(25.0), "US $ 250.0");
/// assert_eq!(format_prediction(2.1234), "US $ 21.23");
/// ```
#[must_use]
pub fn format_prediction(prediction: f32) -> String {
    let scaled = f64::from(prediction) * 10.0;
    let rounded = (scaled * 100.0).round_ties_even() / 100.0;
    format!("US $ {}", python_float_repr(rounded))
}

/// Renders a float like Python's `str(float)` for ordinary magnitudes.
fn python_float_repr(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    with_fraction(value.to_string())
}

/// Preview-table cell text for a table value.
pub(crate) fn cell_repr(value: f32) -> String {
    if !value.is_finite() {
        return python_float_repr(f64::from(value));
    }
    with_fraction(value.to_string())
}

/// Preview-table cell text for a value from an integer column.
pub(crate) fn integer_cell_repr(value: f32) -> String {
    if !value.is_finite() {
        return cell_repr(value);
    }
    format!("{value:.0}")
}

fn with_fraction(mut digits: String) -> String {
    if !digits.contains('.') {
        digits.push_str(".0");
    }
    digits
}
