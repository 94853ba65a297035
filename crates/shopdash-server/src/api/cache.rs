use axum::{extract::State, Extension, Json};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct CacheStats {
    status: &'static str,
    size: usize,
}

#[derive(Debug, Serialize)]
pub(super) struct CacheStatsData {
    cache: CacheStats,
}

#[derive(Debug, Serialize)]
pub(super) struct CacheClearedData {
    message: &'static str,
}

pub(super) async fn cache_stats(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<CacheStatsData>> {
    let size = state.analytics.cache().len();
    ApiResponse::ok(
        req_id.0,
        CacheStatsData {
            cache: CacheStats {
                status: "active",
                size,
            },
        },
    )
}

pub(super) async fn clear_cache(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<CacheClearedData>> {
    state.analytics.cache().clear();
    tracing::info!("report cache cleared");
    ApiResponse::ok(
        req_id.0,
        CacheClearedData {
            message: "Cache cleared successfully",
        },
    )
}
