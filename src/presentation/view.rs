//! Page view model.
//!
//! Everything the template shows is computed here as plain strings and
//! numbers, so rendering is a pure formatting step and the page logic can be
//! tested without HTML.

use super::{cell_repr, filter_default_columns, filter_target_range, integer_cell_repr};
use crate::config::ViewSettings;
use crate::error::{DashboardError, Result};
use crate::loader::LoadedData;
use crate::stats::Histogram;
use crate::trainer::TrainedModel;
use serde::Serialize;
use std::collections::HashMap;

/// Choices of the river-border select, first is the default.
pub const CHAS_OPTIONS: [&str; 2] = ["Sim", "Não"];

/// Prefix of sidebar input names in submitted forms.
pub(crate) const FIELD_PREFIX: &str = "f_";

/// Sidebar label for a feature column.
#[must_use]
pub fn feature_label(name: &str) -> &str {
    match name {
        "CRIM" => "Taxa de Criminalidade",
        "INDUS" => "Proporção de Hectares de Negócio",
        "CHAS" => "Faz limite com o rio?",
        "NOX" => "Concentração de Oxido Nitrico",
        "RM" => "Numero de Quartos",
        "PTRATIO" => "Índice de alunos para professores",
        other => other,
    }
}

/// One rerun's worth of user choices, decoded from query or form pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRequest {
    /// Picked preview columns; `None` means the defaults
    pub columns: Option<Vec<String>>,
    /// Lower end of the price range
    pub low: Option<f32>,
    /// Upper end of the price range
    pub high: Option<f32>,
    /// Raw sidebar values keyed by feature name
    pub inputs: HashMap<String, String>,
}

impl PageRequest {
    /// Decodes `cols`, `cols_submitted`, `lo`, `hi` and `f_<FEATURE>` pairs.
    ///
    /// Unparseable range bounds are ignored.
    #[must_use]
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut request = Self::default();
        let mut picked = Vec::new();
        let mut submitted = false;

        for (key, value) in pairs {
            match key.as_str() {
                "cols" => picked.push(value.clone()),
                "cols_submitted" => submitted = true,
                "lo" => request.low = value.trim().parse().ok().filter(|v: &f32| v.is_finite()),
                "hi" => request.high = value.trim().parse().ok().filter(|v: &f32| v.is_finite()),
                other => {
                    if let Some(feature) = other.strip_prefix(FIELD_PREFIX) {
                        request.inputs.insert(feature.to_string(), value.clone());
                    }
                }
            }
        }

        if submitted || !picked.is_empty() {
            request.columns = Some(picked);
        }
        request
    }
}

/// Multi-select entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnOption {
    /// Column name
    pub name: String,
    /// Whether it is currently picked
    pub selected: bool,
}

/// One preview table row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewRow {
    /// Row position in the table
    pub index: usize,
    /// Cell texts in header order
    pub cells: Vec<String>,
}

/// The head of the picked columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewView {
    /// Column headers
    pub headers: Vec<String>,
    /// Leading rows
    pub rows: Vec<PreviewRow>,
}

/// Price range selector state.
///
/// Bounds serialize as their shortest decimal text so form values round-trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SliderView {
    /// Smallest selectable price (target minimum)
    #[serde(serialize_with = "serialize_repr")]
    pub min: f32,
    /// Largest selectable price
    #[serde(serialize_with = "serialize_repr")]
    pub max: f32,
    /// Selected lower bound
    #[serde(serialize_with = "serialize_repr")]
    pub low: f32,
    /// Selected upper bound
    #[serde(serialize_with = "serialize_repr")]
    pub high: f32,
}

fn serialize_repr<S: serde::Serializer>(value: &f32, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&cell_repr(*value))
}

/// A histogram bar in SVG user units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarView {
    /// Left edge
    pub x: String,
    /// Top edge
    pub y: String,
    /// Width
    pub width: String,
    /// Height
    pub height: String,
    /// Hover text
    pub label: String,
}

/// An axis tick in SVG user units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickView {
    /// Position along the axis
    pub pos: String,
    /// Tick text
    pub label: String,
}

/// Histogram chart geometry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartView {
    /// Chart title
    pub title: String,
    /// X axis title
    pub x_label: String,
    /// Y axis title
    pub y_label: String,
    /// SVG width
    pub width: u32,
    /// SVG height
    pub height: u32,
    /// Plot area left edge
    pub left: u32,
    /// Plot area top edge
    pub top: u32,
    /// Plot area right edge
    pub right: u32,
    /// Plot area bottom edge
    pub bottom: u32,
    /// Bars, one per non-empty bin
    pub bars: Vec<BarView>,
    /// X axis ticks
    pub x_ticks: Vec<TickView>,
    /// Y axis ticks
    pub y_ticks: Vec<TickView>,
    /// Rows inside the selected range
    pub total: usize,
}

const CHART_WIDTH: u32 = 720;
const CHART_HEIGHT: u32 = 360;
const MARGIN_LEFT: u32 = 60;
const MARGIN_RIGHT: u32 = 20;
const MARGIN_TOP: u32 = 40;
const MARGIN_BOTTOM: u32 = 50;

impl ChartView {
    /// Lays out `hist` in a fixed-size SVG.
    #[must_use]
    pub fn from_histogram(hist: &Histogram, target: &str) -> Self {
        let left = MARGIN_LEFT;
        let top = MARGIN_TOP;
        let right = CHART_WIDTH - MARGIN_RIGHT;
        let bottom = CHART_HEIGHT - MARGIN_BOTTOM;
        let plot_w = f64::from(right - left);
        let plot_h = f64::from(bottom - top);

        let mut chart = Self {
            title: "Distribuição de Preços".to_string(),
            x_label: target.to_string(),
            y_label: "Total Imóveis".to_string(),
            width: CHART_WIDTH,
            height: CHART_HEIGHT,
            left,
            top,
            right,
            bottom,
            bars: Vec::new(),
            x_ticks: Vec::new(),
            y_ticks: Vec::new(),
            total: hist.total(),
        };

        let (Some(&first), Some(&last)) = (hist.bins.first(), hist.bins.last()) else {
            return chart;
        };
        // A constant selection has one zero-width bin; widen it around the value
        let (x0, x1) = if last > first {
            (f64::from(first), f64::from(last))
        } else {
            (f64::from(first) - 0.5, f64::from(first) + 0.5)
        };
        let span = x1 - x0;
        let max_count = hist.max_count().max(1) as f64;
        let to_x = |v: f64| f64::from(left) + (v - x0) / span * plot_w;

        for (lo, hi, count) in hist.iter_bins() {
            if count == 0 {
                continue;
            }
            let (lo, hi) = if hi > lo {
                (f64::from(lo), f64::from(hi))
            } else {
                (x0, x1)
            };
            let height = count as f64 / max_count * plot_h;
            let x = to_x(lo);
            let width = (to_x(hi) - x - 1.0).max(1.0);
            chart.bars.push(BarView {
                x: format!("{x:.2}"),
                y: format!("{:.2}", f64::from(bottom) - height),
                width: format!("{width:.2}"),
                height: format!("{height:.2}"),
                label: format!("{target} {lo:.2} - {hi:.2}: {count}"),
            });
        }

        chart.x_ticks = (0..=4)
            .map(|i| {
                let value = x0 + span * f64::from(i) / 4.0;
                TickView {
                    pos: format!("{:.2}", to_x(value)),
                    label: format!("{value:.1}"),
                }
            })
            .collect();

        let max = hist.max_count();
        let step = max.div_ceil(4).max(1);
        chart.y_ticks = (0..=max)
            .step_by(step)
            .map(|count| TickView {
                pos: format!(
                    "{:.2}",
                    f64::from(bottom) - count as f64 / max_count * plot_h
                ),
                label: count.to_string(),
            })
            .collect();

        chart
    }
}

/// How a sidebar input is drawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "widget", rename_all = "snake_case")]
pub enum FieldKind {
    /// Free numeric entry
    Number {
        /// Current text
        value: String,
    },
    /// Fixed choices
    Select {
        /// Choice labels
        options: Vec<String>,
        /// Current choice
        selected: String,
    },
}

/// One sidebar input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SidebarField {
    /// Feature column
    pub name: String,
    /// Form input name
    pub input_name: String,
    /// Human label
    pub label: String,
    /// Widget
    pub kind: FieldKind,
}

/// Everything the page template needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageView {
    /// Where the data came from
    pub source: String,
    /// Rows in the full table
    pub n_rows: usize,
    /// Multi-select entries in table order
    pub column_options: Vec<ColumnOption>,
    /// Picked columns, in pick order
    pub selected_columns: Vec<String>,
    /// Preview table
    pub preview: Option<PreviewView>,
    /// Price range selector
    pub slider: Option<SliderView>,
    /// Price histogram
    pub chart: Option<ChartView>,
    /// Sidebar inputs (empty when no model is available)
    pub fields: Vec<SidebarField>,
    /// Formatted prediction after a successful trigger
    pub result: Option<String>,
    /// Sidebar problem (training or prediction)
    pub sidebar_error: Option<String>,
    /// Page-level problem (data could not be loaded)
    pub error: Option<String>,
}

impl PageView {
    /// A page that only reports why the data could not be shown.
    #[must_use]
    pub fn unavailable(error: &DashboardError) -> Self {
        Self {
            source: String::new(),
            n_rows: 0,
            column_options: Vec::new(),
            selected_columns: Vec::new(),
            preview: None,
            slider: None,
            chart: None,
            fields: Vec::new(),
            result: None,
            sidebar_error: None,
            error: Some(error.to_string()),
        }
    }
}

/// Builds the page for one rerun.
///
/// `model` is the training outcome; a failure is shown in the sidebar while
/// the data sections still render.
///
/// # Errors
///
/// Returns an error if `target` is not a column or the bin count is zero.
pub fn build_page(
    data: &LoadedData,
    model: std::result::Result<&TrainedModel, &DashboardError>,
    request: &PageRequest,
    settings: &ViewSettings,
    target: &str,
) -> Result<PageView> {
    let frame = &data.frame;
    let names = frame.column_names();

    let selected_columns = match &request.columns {
        Some(picked) => {
            let mut kept: Vec<String> = Vec::new();
            for name in picked {
                if frame.has_column(name) && !kept.contains(name) {
                    kept.push(name.clone());
                }
            }
            kept
        }
        None => filter_default_columns(&settings.default_columns, &names),
    };

    let column_options = names
        .iter()
        .map(|name| ColumnOption {
            name: (*name).to_string(),
            selected: selected_columns.iter().any(|s| s.as_str() == *name),
        })
        .collect();

    let preview = if selected_columns.is_empty() {
        PreviewView {
            headers: Vec::new(),
            rows: Vec::new(),
        }
    } else {
        let refs: Vec<&str> = selected_columns.iter().map(String::as_str).collect();
        let head = frame.select(&refs)?.head(settings.preview_rows);
        let columns: Vec<_> = head
            .iter_columns()
            .map(|(name, col)| (col, head.is_integer_column(name)))
            .collect();
        PreviewView {
            headers: selected_columns.clone(),
            rows: (0..head.n_rows())
                .map(|index| PreviewRow {
                    index,
                    cells: columns
                        .iter()
                        .map(|(col, integer)| {
                            if *integer {
                                integer_cell_repr(col[index])
                            } else {
                                cell_repr(col[index])
                            }
                        })
                        .collect(),
                })
                .collect(),
        }
    };

    let target_values = frame.column(target)?;
    let slider = slider_for(target_values.min(), request, settings);
    let in_range = filter_target_range(frame, target, slider.low, slider.high)?;
    let hist = Histogram::equal_width(
        in_range.column(target)?.as_slice(),
        settings.histogram_bins,
    )?;
    let chart = ChartView::from_histogram(&hist, target);

    let (fields, sidebar_error) = match model {
        Ok(model) => (sidebar_fields(data, model, request), None),
        Err(e) => (Vec::new(), Some(e.to_string())),
    };

    Ok(PageView {
        source: data.source.clone(),
        n_rows: frame.n_rows(),
        column_options,
        selected_columns,
        preview: Some(preview),
        slider: Some(slider),
        chart: Some(chart),
        fields,
        result: None,
        sidebar_error,
        error: None,
    })
}

fn slider_for(data_min: Option<f32>, request: &PageRequest, settings: &ViewSettings) -> SliderView {
    let min = data_min.unwrap_or(0.0);
    let max = settings.price_ceiling.max(min);
    let clamp = |v: f32| v.clamp(min, max);

    let (default_low, default_high) = settings.default_price_range;
    let mut low = clamp(request.low.unwrap_or(default_low));
    let mut high = clamp(request.high.unwrap_or(default_high));
    if low > high {
        std::mem::swap(&mut low, &mut high);
    }
    SliderView {
        min,
        max,
        low,
        high,
    }
}

fn sidebar_fields(data: &LoadedData, model: &TrainedModel, request: &PageRequest) -> Vec<SidebarField> {
    model
        .feature_names()
        .iter()
        .map(|name| {
            let submitted = request.inputs.get(name).cloned();
            let kind = match name.as_str() {
                "CHAS" => FieldKind::Select {
                    options: CHAS_OPTIONS.iter().map(|s| (*s).to_string()).collect(),
                    selected: submitted
                        .filter(|v| CHAS_OPTIONS.contains(&v.as_str()))
                        .unwrap_or_else(|| CHAS_OPTIONS[0].to_string()),
                },
                "RM" => FieldKind::Number {
                    value: submitted.unwrap_or_else(|| "1".to_string()),
                },
                _ => FieldKind::Number {
                    value: submitted.unwrap_or_else(|| {
                        data.frame
                            .column(name)
                            .map(|col| col.mean().to_string())
                            .unwrap_or_default()
                    }),
                },
            };
            SidebarField {
                name: name.clone(),
                input_name: format!("{FIELD_PREFIX}{name}"),
                label: feature_label(name).to_string(),
                kind,
            }
        })
        .collect()
}

/// Turns submitted sidebar values into a feature map for `model`.
///
/// The river select maps "Sim" to 1 and "Não" to 0.
///
/// # Errors
///
/// Returns [`DashboardError::InvalidInput`] for a missing or non-numeric value.
pub fn parse_prediction_form(
    inputs: &HashMap<String, String>,
    model: &TrainedModel,
) -> Result<HashMap<String, f32>> {
    model
        .feature_names()
        .iter()
        .map(|name| -> Result<(String, f32)> {
            let label = feature_label(name);
            let raw = inputs
                .get(name)
                .map(|v| v.trim())
                .ok_or_else(|| DashboardError::InvalidInput(format!("{label}: value missing")))?;
            let value = match (name.as_str(), raw) {
                ("CHAS", "Sim") => 1.0,
                ("CHAS", "Não") => 0.0,
                _ => raw
                    .parse::<f32>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| {
                        DashboardError::InvalidInput(format!("{label}: '{raw}' is not a number"))
                    })?,
            };
            Ok((name.clone(), value))
        })
        .collect()
}

#[cfg(test)]
#[path = "view_tests.rs"]
mod tests;
