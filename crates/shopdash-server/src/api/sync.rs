use axum::{
    body::Bytes,
    extract::{Path, State},
    response::{IntoResponse, Response},
    Extension,
};
use serde::{Deserialize, Serialize};
use shopdash_core::ResourceKind;
use shopdash_engine::{SyncAllReport, SyncError, SyncResult};

use crate::middleware::RequestId;

use super::{map_sync_error, tenant_or_default, ApiError, ApiResponse, AppState};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SyncRequest {
    pub tenant_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct SyncData {
    synced: usize,
    total: usize,
    failed: usize,
    message: String,
}

impl From<&SyncResult> for SyncData {
    fn from(result: &SyncResult) -> Self {
        Self {
            synced: result.synced,
            total: result.total,
            failed: result.errors.len(),
            message: result.message(),
        }
    }
}

/// One resource inside a combined sync.
#[derive(Debug, Serialize)]
pub(super) struct ResourceOutcome {
    success: bool,
    synced: usize,
    total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<&Result<SyncResult, SyncError>> for ResourceOutcome {
    fn from(outcome: &Result<SyncResult, SyncError>) -> Self {
        match outcome {
            Ok(result) => Self {
                success: true,
                synced: result.synced,
                total: result.total,
                message: Some(result.message()),
                error: None,
            },
            Err(e) => Self {
                success: false,
                synced: 0,
                total: 0,
                message: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct SyncResults {
    customers: ResourceOutcome,
    products: ResourceOutcome,
    orders: ResourceOutcome,
}

#[derive(Debug, Serialize)]
pub(super) struct SyncAllData {
    synced: usize,
    total: usize,
    message: String,
    results: SyncResults,
}

/// `POST /api/sync/{customers|products|orders|all}` with an optional
/// `{ "tenantId": "..." }` body.
pub(super) async fn trigger_sync(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(target): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request = parse_request(&body)
        .map_err(|e| ApiError::new(req_id.0.clone(), "bad_request", e.to_string()))?;
    let tenant_id = tenant_or_default(request.tenant_id);

    if target.eq_ignore_ascii_case("all") {
        let report = state.engine.sync_all(&tenant_id).await;
        return all_response(req_id, &report);
    }

    let kind: ResourceKind = target
        .parse()
        .map_err(|e: shopdash_core::CoreError| {
            ApiError::new(req_id.0.clone(), "bad_request", e.to_string())
        })?;

    let result = state
        .engine
        .sync_resource(&tenant_id, kind)
        .await
        .map_err(|e| map_sync_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::ok(req_id.0, SyncData::from(&result)).into_response())
}

fn parse_request(body: &[u8]) -> Result<SyncRequest, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(SyncRequest::default());
    }
    serde_json::from_slice(body)
}

/// A combined sync in which every resource failed is reported as the
/// customers failure; otherwise the per-resource outcomes are returned with
/// `success` reflecting whether all three ran to completion.
fn all_response(req_id: RequestId, report: &SyncAllReport) -> Result<Response, ApiError> {
    if let (Err(e), Err(_), Err(_)) = (&report.customers, &report.products, &report.orders) {
        return Err(map_sync_error(req_id.0, e));
    }

    let synced = report.synced();
    let total = report.total();
    let data = SyncAllData {
        synced,
        total,
        message: format!(
            "Synced {synced} of {total} records for tenant {}",
            report.tenant_id
        ),
        results: SyncResults {
            customers: ResourceOutcome::from(&report.customers),
            products: ResourceOutcome::from(&report.products),
            orders: ResourceOutcome::from(&report.orders),
        },
    };

    let mut response = ApiResponse::ok(req_id.0, data);
    response.0.success = report.success();
    Ok(response.into_response())
}
