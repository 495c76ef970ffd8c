//! HTTP surface for the cached schedule
//!
//! Two read-only views over the shared [`CacheCell`] plus static files:
//!
//! - `GET /` renders the snapshot through a [`Renderer`]
//! - `GET /api/data` returns the snapshot as JSON
//! - `GET /static/*` serves files from the configured directory
//!
//! Handlers copy the snapshot out of the cell and release the lock before
//! rendering or encoding. They never trigger a fetch.

pub mod render;
pub mod shutdown;

pub use render::{RenderError, Renderer, TemplateRenderer};
pub use shutdown::shutdown_signal;

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use thiserror::Error;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::error;

use crate::cache::CacheCell;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// Latest fetched snapshot
    pub cell: Arc<CacheCell>,
    /// Page renderer for `/`
    pub renderer: Arc<dyn Renderer>,
}

impl AppState {
    /// Wraps the shared cell and a renderer for use as router state
    pub fn new(cell: Arc<CacheCell>, renderer: impl Renderer + 'static) -> Self {
        Self {
            cell,
            renderer: Arc::new(renderer),
        }
    }
}

/// Per-request failures, each answered with a 500
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("JSON encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// The blocking render task panicked or was cancelled
    #[error("render task failed: {0}")]
    RenderTask(#[from] tokio::task::JoinError),
}

impl ServerError {
    /// Message sent to the client; details stay in the log
    fn public_message(&self) -> &'static str {
        match self {
            ServerError::Render(err) if err.is_load_error() => "Failed to load template",
            ServerError::Render(_) | ServerError::RenderTask(_) => "Failed to render template",
            ServerError::Encode(_) => "Failed to encode data to JSON",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        error!(error = %self, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.public_message()).into_response()
    }
}

/// Builds the application router
pub fn router(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/", get(rendered_view))
        .route("/api/data", get(api_data))
        .nest_service("/static", ServeDir::new(static_dir.as_ref()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Template loading reads from disk, so rendering runs on the blocking pool.
async fn rendered_view(State(state): State<AppState>) -> Result<Html<String>, ServerError> {
    let snapshot = state.cell.snapshot();
    let renderer = Arc::clone(&state.renderer);
    let html = tokio::task::spawn_blocking(move || renderer.render(&snapshot)).await??;
    Ok(Html(html))
}

async fn api_data(State(state): State<AppState>) -> Result<Response, ServerError> {
    let snapshot = state.cell.snapshot();
    let body = serde_json::to_vec(&snapshot)?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}
