mod params;
mod tiers;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use shelftier_core::{AppConfig, ConfigError, TiersConfigStore};
use shelftier_engine::{Aggregator, EngineError};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{request_id, require_admin_token, AdminGate, RequestId, ADMIN_TOKEN_HEADER};
use crate::provider::{ProviderError, SalesProvider};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<TiersConfigStore>,
    pub aggregator: Arc<Aggregator>,
    pub provider: SalesProvider,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    source: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }

    pub fn bad_request(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(request_id, "bad_request", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" => StatusCode::BAD_REQUEST,
            "upstream_error" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_provider_error(request_id: String, error: &ProviderError) -> ApiError {
    tracing::error!(error = %error, "sales source request failed");
    ApiError::new(request_id, "upstream_error", "sales source request failed")
}

pub(super) fn map_engine_error(request_id: String, error: &EngineError) -> ApiError {
    match error {
        EngineError::DuplicateProduct(_) => {
            tracing::error!(error = %error, "sales source returned inconsistent rows");
            ApiError::new(request_id, "upstream_error", error.to_string())
        }
        _ => ApiError::bad_request(request_id, error.to_string()),
    }
}

/// Runs a tiers config file operation on the blocking pool.
pub(super) async fn with_store<T, F>(
    state: &AppState,
    request_id: &str,
    op: F,
) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&TiersConfigStore) -> Result<T, ConfigError> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "tiers config task failed");
            ApiError::new(request_id, "internal_error", "tiers config store failed")
        })?
        .map_err(|e| map_config_error(request_id.to_string(), &e))
}

fn map_config_error(request_id: String, error: &ConfigError) -> ApiError {
    match error {
        ConfigError::ThresholdOrder { .. } => ApiError::bad_request(request_id, error.to_string()),
        _ => {
            tracing::error!(error = %error, "tiers config store failed");
            ApiError::new(request_id, "internal_error", "tiers config store failed")
        }
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([
            header::CONTENT_TYPE,
            header::IF_NONE_MATCH,
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static(ADMIN_TOKEN_HEADER),
        ])
        .expose_headers([
            header::ETAG,
            HeaderName::from_static("x-window-from"),
            HeaderName::from_static("x-window-to"),
        ])
}

fn admin_router(admin: AdminGate) -> Router<AppState> {
    Router::new()
        .route("/api/tiers/config", axum::routing::put(tiers::put_config))
        .layer(axum::middleware::from_fn_with_state(admin, require_admin_token))
}

pub fn build_app(state: AppState, admin: AdminGate) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/tiers/config", get(tiers::get_config))
        .route("/api/tiers/recalculate", post(tiers::recalculate))
        .route("/api/tiers/summary", get(tiers::summary))
        .route("/api/tiers/debug-sku", get(tiers::debug_sku));

    Router::new()
        .merge(public_routes)
        .merge(admin_router(admin))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id))
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);
    let source = state.provider.name();

    match state.provider.health().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData { status: "ok", source },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: sales source unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        source,
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
