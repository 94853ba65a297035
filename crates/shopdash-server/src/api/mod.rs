mod analytics;
mod cache;
mod customers;
mod sync;

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use shopdash_engine::{AnalyticsError, Aggregator, SyncEngine, SyncError};
use shopdash_shopify::SourceError;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{request_id, require_bearer_auth, AuthState, RequestId};

pub(super) const DEFAULT_TENANT_ID: &str = "1";

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub engine: Arc<SyncEngine>,
    pub analytics: Arc<Aggregator>,
}

/// Success envelope: `{ success: true, ...data, meta }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
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
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn ok(request_id: String, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            meta: ResponseMeta::new(request_id),
        })
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "upstream_auth" => StatusCode::BAD_GATEWAY,
            "unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Blank or missing tenant ids fall back to the default tenant.
pub(super) fn tenant_or_default(tenant_id: Option<String>) -> String {
    tenant_id
        .map(|id| id.trim().to_owned())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| DEFAULT_TENANT_ID.to_owned())
}

/// A date query parameter as sent by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DateParam {
    Absent,
    Day(NaiveDate),
    /// Present but neither `YYYY-MM-DD` nor an RFC 3339 timestamp.
    Invalid,
}

/// Reads `YYYY-MM-DD` or an RFC 3339 timestamp, which counts as its UTC day.
/// Blank values are absent.
pub(super) fn parse_date_param(raw: Option<&str>) -> DateParam {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return DateParam::Absent;
    };
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return DateParam::Day(day);
    }
    match DateTime::parse_from_rfc3339(raw) {
        Ok(at) => DateParam::Day(at.with_timezone(&Utc).date_naive()),
        Err(_) => DateParam::Invalid,
    }
}

/// A numeric query parameter, or `None` when missing or unparseable so the
/// caller falls back to its default.
pub(super) fn parse_number_param<T: FromStr>(raw: Option<&str>) -> Option<T> {
    raw.and_then(|s| s.trim().parse().ok())
}

pub(super) fn map_sync_error(request_id: String, error: &SyncError) -> ApiError {
    let code = match error {
        SyncError::TenantNotFound(_) => "not_found",
        SyncError::TenantInactive(_) | SyncError::MissingCredentials(_) => "conflict",
        SyncError::Source(SourceError::Auth { .. }) => "upstream_auth",
        SyncError::Source(SourceError::RateLimited { .. }) => "rate_limited",
        SyncError::Source(e) if e.is_unavailable() => "unavailable",
        SyncError::Source(_) => "internal_error",
        SyncError::Store(e) => {
            tracing::error!(error = %e, "sync store failure");
            return ApiError::new(request_id, "internal_error", "database query failed");
        }
    };
    ApiError::new(request_id, code, error.to_string())
}

pub(super) fn map_analytics_error(request_id: String, error: &AnalyticsError) -> ApiError {
    let code = match error {
        AnalyticsError::TenantNotFound(_) => "not_found",
        AnalyticsError::TenantInactive(_) => "conflict",
    };
    ApiError::new(request_id, code, error.to_string())
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState) -> Router<AppState> {
    Router::new()
        .route("/api/sync/{target}", post(sync::trigger_sync))
        .route("/api/dashboard/{tenant_id}", get(analytics::dashboard))
        .route(
            "/api/analytics/orders-by-date",
            get(analytics::orders_by_date),
        )
        .route(
            "/api/analytics/top-customers",
            get(analytics::top_customers),
        )
        .route(
            "/api/analytics/sales-performance",
            get(analytics::sales_performance),
        )
        .route(
            "/api/analytics/customer-behavior",
            get(analytics::customer_behavior),
        )
        .route(
            "/api/analytics/cart-abandonment",
            get(analytics::cart_abandonment),
        )
        .route("/api/customers/list", get(customers::list_customers))
        .route("/api/cache/stats", get(cache::cache_stats))
        .route("/api/cache/clear", post(cache::clear_cache))
        .layer(axum::middleware::from_fn_with_state(
            auth,
            require_bearer_auth,
        ))
}

pub fn build_app(state: AppState, auth: AuthState) -> Router {
    let public_routes = Router::new().route("/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    match shopdash_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            ApiResponse::ok(
                req_id.0,
                HealthData {
                    status: "ok",
                    database: "ok",
                },
            ),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    success: false,
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta: ResponseMeta::new(req_id.0),
                }),
            )
        }
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
