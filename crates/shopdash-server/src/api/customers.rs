use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;
use shopdash_engine::{CustomerList, CustomerQuery};

use crate::middleware::RequestId;

use super::{
    map_analytics_error, parse_number_param, tenant_or_default, ApiError, ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CustomerListQuery {
    pub tenant_id: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
}

impl CustomerListQuery {
    fn into_query(self) -> CustomerQuery {
        let defaults = CustomerQuery::default();
        CustomerQuery {
            page: parse_number_param(self.page.as_deref()).unwrap_or(defaults.page),
            limit: parse_number_param(self.limit.as_deref()).unwrap_or(defaults.limit),
            search: self
                .search
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty()),
        }
    }
}

/// `GET /api/customers/list?tenantId&page&limit&search`
pub(super) async fn list_customers(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<CustomerListQuery>,
) -> Result<Json<ApiResponse<CustomerList>>, ApiError> {
    let tenant_id = tenant_or_default(query.tenant_id.clone());
    let list = state
        .analytics
        .customer_list(&tenant_id, &query.into_query())
        .await
        .map_err(|e| map_analytics_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::ok(req_id.0, list))
}
