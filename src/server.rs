//! HTTP front end.
//!
//! Every request carries its own `data` and `type` query parameters, so the
//! handlers are stateless: each one runs a full render cycle.

use crate::error::MappingFailure;
use crate::graph::render_chart;
use crate::query;
use crate::view::{render, QueryParams, ViewModel};
use crate::RenderOptions;
use anyhow::Context;
use axum::{
    extract::RawQuery,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Response Types
// ============================================================================

/// Error API response
#[derive(Debug, Serialize)]
struct ApiError {
    status: String,
    error: ErrorDetails,
}

#[derive(Debug, Serialize)]
struct ErrorDetails {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

// ============================================================================
// Error Handling
// ============================================================================

struct ApiErrorResponse {
    status: StatusCode,
    error: ApiError,
}

impl ApiErrorResponse {
    fn new(status: StatusCode, error_type: &str, message: impl Into<String>) -> Self {
        ApiErrorResponse {
            status,
            error: ApiError {
                status: "error".to_string(),
                error: ErrorDetails {
                    message: message.into(),
                    error_type: error_type.to_string(),
                },
            },
        }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let json = Json(self.error);
        (self.status, json).into_response()
    }
}

impl From<&MappingFailure> for ApiErrorResponse {
    fn from(failure: &MappingFailure) -> Self {
        ApiErrorResponse::new(StatusCode::UNPROCESSABLE_ENTITY, failure.kind(), failure.to_string())
    }
}

impl From<anyhow::Error> for ApiErrorResponse {
    fn from(err: anyhow::Error) -> Self {
        ApiErrorResponse::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "RenderError",
            format!("{:#}", err),
        )
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn bad_request(message: String) -> ApiErrorResponse {
    ApiErrorResponse::new(StatusCode::BAD_REQUEST, "BadRequest", message)
}

/// Image options from `width`, `height` and `format` query parameters
fn render_options(pairs: &[(String, String)]) -> Result<RenderOptions, ApiErrorResponse> {
    let mut options = RenderOptions::default();
    for (name, slot) in [("width", &mut options.width), ("height", &mut options.height)] {
        if let Some(raw) = query::last_value(pairs, name) {
            *slot = raw
                .trim()
                .parse()
                .map_err(|_| bad_request(format!("Invalid {}: '{}'", name, raw)))?;
        }
    }
    if let Some(raw) = query::last_value(pairs, "format") {
        options.format = raw.parse().map_err(|e| bad_request(format!("{}", e)))?;
    }
    options
        .validate()
        .map_err(|e| bad_request(e.to_string()))?;
    Ok(options)
}

fn no_chart_error(view: &ViewModel) -> ApiErrorResponse {
    match &view.chart_failure {
        Some(failure) => failure.into(),
        None => {
            let message = view
                .errors()
                .map(|m| m.text.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            ApiErrorResponse::new(StatusCode::UNPROCESSABLE_ENTITY, "NoChart", message)
        }
    }
}

// ============================================================================
// Request Handlers
// ============================================================================

/// GET /api/v1/view - Page model for the given parameters
async fn view_handler(RawQuery(raw): RawQuery) -> Json<ViewModel> {
    let params = QueryParams::from_query(raw.as_deref().unwrap_or(""));
    Json(render(&params))
}

/// GET /api/v1/chart - Rendered chart image
async fn chart_handler(RawQuery(raw): RawQuery) -> Result<Response, ApiErrorResponse> {
    let pairs = query::parse_query(raw.as_deref().unwrap_or(""));
    let options = render_options(&pairs)?;
    let view = render(&QueryParams::from_pairs(&pairs));

    let Some(spec) = view.chart.as_ref() else {
        return Err(no_chart_error(&view));
    };

    let bytes = render_chart(spec, &options).map_err(|e| {
        warn!(error = %e, "chart rendering failed");
        ApiErrorResponse::from(e)
    })?;

    Ok((
        [(header::CONTENT_TYPE, options.format.content_type())],
        bytes,
    )
        .into_response())
}

/// GET /api/v1/health - Health check
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: VERSION.to_string(),
    })
}

/// Root handler
async fn root_handler() -> &'static str {
    "urlchart server - See /api/v1/view?type=pie for a page model and /api/v1/chart?type=pie for an image"
}

// ============================================================================
// Server
// ============================================================================

pub fn router() -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(vec![header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(root_handler))
        .route("/api/v1/view", get(view_handler))
        .route("/api/v1/chart", get(chart_handler))
        .route("/api/v1/health", get(health_handler))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

pub async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    info!("Starting urlchart server on {}", addr);
    info!("  GET  /api/v1/view   - Page model as JSON");
    info!("  GET  /api/v1/chart  - Chart image (png or svg)");
    info!("  GET  /api/v1/health - Health check");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, router()).await?;

    Ok(())
}
