//! On-demand export over HTTP.
//!
//! `GET /api/export/variomedia` runs a full export and answers with the
//! generated CSV as an attachment.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Local};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ExportSettings;
use crate::export::{ensure_directory, run_export};
use crate::variomedia::VariomediaApi;

pub const EXPORT_ROUTE: &str = "/api/export/variomedia";

#[derive(Clone)]
pub struct AppState {
    api: Arc<dyn VariomediaApi>,
    settings: Arc<ExportSettings>,
    /// Per-server request sequence, handed to each run explicitly.
    sequence: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(api: Arc<dyn VariomediaApi>, settings: ExportSettings) -> Self {
        Self {
            api,
            settings: Arc::new(settings),
            sequence: Arc::new(AtomicU64::new(1)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(EXPORT_ROUTE, get(export_variomedia))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Base filename for an on-demand run: `<stem>_<yyyyMMdd_HHmmss>_<seq>.csv`.
pub fn on_demand_filename(base_filename: &str, now: DateTime<Local>, sequence: u64) -> String {
    let stem = base_filename
        .strip_suffix(".csv")
        .unwrap_or(base_filename);
    format!("{stem}_{}_{sequence}.csv", now.format("%Y%m%d_%H%M%S"))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "variomedia-export",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn export_variomedia(State(state): State<AppState>) -> Response {
    let sequence = state.sequence.fetch_add(1, Ordering::Relaxed);
    let base_filename = on_demand_filename(&state.settings.export_filename, Local::now(), sequence);

    info!(base_filename = %base_filename, "On-demand export requested");

    if let Err(e) = ensure_directory(&state.settings.export_path) {
        error!(error = %e, "Could not prepare export directory");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let request = state.settings.request(base_filename);
    let report = match run_export(state.api.as_ref(), &request).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "On-demand export failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let Some(file) = report.files.first() else {
        error!("On-demand export produced no file");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    if report.files.len() > 1 {
        warn!(
            files = report.files.len(),
            returned = %file.path.display(),
            "Export rotated into several files, returning the first"
        );
    }

    let bytes = match tokio::fs::read(&file.path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(path = %file.path.display(), error = %e, "Could not read generated export");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=UTF-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", file.file_name()),
            ),
        ],
        bytes,
    )
        .into_response()
}
