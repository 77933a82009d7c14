//! axum routes for the dashboard.
//!
//! - `GET /` renders the page (query: `cols`, `lo`, `hi`)
//! - `POST /predict` renders the page with a prediction (form body)
//! - `POST /refresh` drops the session caches
//! - `POST /api/predict` JSON prediction
//! - `GET /api/summary` JSON column statistics and training report
//!
//! The JSON routes reuse the caller's session when the cookie names one and
//! otherwise run against the store's shared session.
//! - `GET /health` liveness

use super::render::Renderer;
use super::view::{build_page, parse_prediction_form, PageRequest, PageView};
use super::format_prediction;
use crate::config::DashboardConfig;
use crate::data::ColumnStats;
use crate::error::{DashboardError, Result};
use crate::session::{Session, SessionStore, SESSION_COOKIE};
use crate::trainer::TrainingReport;
use axum::extract::{Form, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Shared server state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<DashboardConfig>,
    /// Browser sessions
    pub sessions: Arc<SessionStore>,
    /// Page renderer
    pub renderer: Arc<Renderer>,
}

impl AppState {
    /// Builds the state for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the templates fail to compile.
    pub fn new(config: DashboardConfig) -> Result<Self> {
        let config = Arc::new(config);
        Ok(Self {
            sessions: Arc::new(SessionStore::new(Arc::clone(&config))),
            renderer: Arc::new(Renderer::new()?),
            config,
        })
    }
}

/// JSON prediction request.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictRequest {
    /// Feature values by column name
    pub features: HashMap<String, f32>,
}

/// JSON prediction response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Raw model output
    pub prediction: f32,
    /// Sidebar display string
    pub display: String,
}

/// JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error kind
    pub kind: String,
}

/// Model part of the summary.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    /// Target column
    pub target: String,
    /// Feature columns in prediction order
    pub features: Vec<String>,
    /// Training rows
    pub n_samples: usize,
    /// Fit diagnostics
    pub report: TrainingReport,
}

/// JSON summary response.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryResponse {
    /// Data source
    pub source: String,
    /// BLAKE3 digest of the CSV bytes
    pub fingerprint: String,
    /// Table rows
    pub rows: usize,
    /// Per-column statistics
    pub columns: Vec<ColumnStats>,
    /// Trained model
    pub model: ModelSummary,
}

/// Builds the router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/predict", post(predict_page))
        .route("/refresh", post(refresh))
        .route("/api/predict", post(api_predict))
        .route("/api/summary", get(api_summary))
        .route("/health", get(health))
        .with_state(state)
}

/// Binds `config.bind_addr()` and serves until Ctrl+C.
///
/// # Errors
///
/// Returns an error for invalid configuration, a bind failure or a server
/// I/O failure.
pub async fn serve(config: DashboardConfig) -> Result<()> {
    config.validate()?;
    let bind_addr = config.bind_addr();
    let state = AppState::new(config)?;

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, source = %state.config.source, "dashboard listening");

    println!();
    println!(
        "{}",
        format!("Dashboard listening on http://{bind_addr}")
            .green()
            .bold()
    );
    println!("  {} {}", "Data:".white().bold(), state.config.source);
    println!();
    println!("{}", "Endpoints:".cyan());
    println!("  GET  /              - Dashboard page");
    println!("  POST /predict       - Dashboard page with prediction");
    println!("  POST /refresh       - Reload data and retrain");
    println!("  POST /api/predict   - JSON prediction");
    println!("  GET  /api/summary   - Column statistics and training report");
    println!("  GET  /health        - Health check");
    println!();
    println!("{}", "Press Ctrl+C to stop".dimmed());

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!();
    println!("{}", "Server stopped".yellow());
    Ok(())
}

/// Resolves on Ctrl+C.
///
/// If the handler cannot be installed the server keeps running.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

/// `GET /`
pub async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let (id, session) = state.sessions.get_or_create(session_id(&headers).as_deref()).await;
    let request = PageRequest::from_pairs(&pairs);
    let (status, page) = rerun(&state, &session, &request, false).await;
    with_session(render(&state, status, &page), &id)
}

/// `POST /predict`
pub async fn predict_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    let (id, session) = state.sessions.get_or_create(session_id(&headers).as_deref()).await;
    let request = PageRequest::from_pairs(&pairs);
    let (status, page) = rerun(&state, &session, &request, true).await;
    with_session(render(&state, status, &page), &id)
}

/// `POST /refresh`
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (id, session) = state.sessions.get_or_create(session_id(&headers).as_deref()).await;
    session.refresh().await;
    with_session(Redirect::to("/").into_response(), &id)
}

/// `POST /api/predict`
pub async fn api_predict(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PredictRequest>,
) -> Response {
    let session = api_session(&state, &headers).await;
    let outcome = match session.model().await {
        Ok((_, model)) => model.predict_named(&body.features),
        Err(e) => Err(e),
    };
    match outcome {
        Ok(prediction) => Json(PredictResponse {
            prediction,
            display: format_prediction(prediction),
        })
        .into_response(),
        Err(e) => error_json(&e),
    }
}

/// `GET /api/summary`
pub async fn api_summary(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = api_session(&state, &headers).await;
    match session.model().await {
        Ok((data, model)) => Json(SummaryResponse {
            source: data.source.clone(),
            fingerprint: data.fingerprint.clone(),
            rows: data.frame.n_rows(),
            columns: data.frame.describe(),
            model: ModelSummary {
                target: model.target().to_string(),
                features: model.feature_names().to_vec(),
                n_samples: model.n_samples(),
                report: model.report().clone(),
            },
        })
        .into_response(),
        Err(e) => error_json(&e),
    }
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// One top-to-bottom page run against the session cache.
async fn rerun(
    state: &AppState,
    session: &Session,
    request: &PageRequest,
    predict: bool,
) -> (StatusCode, PageView) {
    let data = match session.data().await {
        Ok(data) => data,
        Err(e) => return (status_of(&e), PageView::unavailable(&e)),
    };
    let model = session.model().await.map(|(_, model)| model);
    let model_ref = model.as_ref().map(|m| &**m);

    let mut page = match build_page(
        &data,
        model_ref,
        request,
        &state.config.view,
        &state.config.trainer.target,
    ) {
        Ok(page) => page,
        Err(e) => return (status_of(&e), PageView::unavailable(&e)),
    };

    if predict {
        if let Ok(model) = model_ref {
            let outcome = parse_prediction_form(&request.inputs, model)
                .and_then(|values| model.predict_named(&values));
            match outcome {
                Ok(prediction) => {
                    tracing::info!(prediction, "prediction served");
                    page.result = Some(format_prediction(prediction));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "prediction rejected");
                    page.sidebar_error = Some(e.to_string());
                }
            }
        }
    }

    (StatusCode::OK, page)
}

/// The caller's browser session if the cookie names a live one, else the
/// shared session. API calls never start or evict browser sessions.
async fn api_session(state: &AppState, headers: &HeaderMap) -> Arc<Session> {
    match state.sessions.existing(session_id(headers).as_deref()).await {
        Some(session) => session,
        None => state.sessions.shared(),
    }
}

fn render(state: &AppState, status: StatusCode, page: &PageView) -> Response {
    match state.renderer.render_page(page) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "page render failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

fn status_of(error: &DashboardError) -> StatusCode {
    StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn error_json(error: &DashboardError) -> Response {
    (
        status_of(error),
        Json(ErrorResponse {
            error: error.to_string(),
            kind: error.kind().to_string(),
        }),
    )
        .into_response()
}

/// Reads the session id from the `Cookie` header.
fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE).then(|| value.to_string())
        })
}

fn with_session(mut response: Response, id: &str) -> Response {
    let cookie = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    response
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
