use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shopdash_engine::{
    CartAbandonmentSummary, DailyOrders, DashboardStats, DateRange, MonthlyCohort, MonthlySales,
    TopCustomer, DEFAULT_TOP_CUSTOMERS, MAX_LIST_LIMIT,
};

use crate::middleware::RequestId;

use super::{
    map_analytics_error, parse_date_param, parse_number_param, tenant_or_default, ApiError,
    ApiResponse, AppState, DateParam,
};

type AnalyticsResponse<T> = Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TenantQuery {
    pub tenant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DateRangeQuery {
    pub tenant_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl DateRangeQuery {
    /// Unreadable bounds select nothing rather than failing the request.
    fn range(&self) -> DateRange {
        match (
            parse_date_param(self.start_date.as_deref()),
            parse_date_param(self.end_date.as_deref()),
        ) {
            (DateParam::Invalid, _) | (_, DateParam::Invalid) => DateRange::nothing(),
            (start, end) => DateRange::new(day_of(start), day_of(end)),
        }
    }
}

fn day_of(param: DateParam) -> Option<NaiveDate> {
    match param {
        DateParam::Day(day) => Some(day),
        DateParam::Absent | DateParam::Invalid => None,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TopCustomersQuery {
    pub tenant_id: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct StatsData {
    stats: DashboardStats,
}

#[derive(Debug, Serialize)]
pub(super) struct ListData<T: Serialize> {
    data: T,
}

pub(super) async fn dashboard(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(tenant_id): Path<String>,
) -> AnalyticsResponse<StatsData> {
    let tenant_id = tenant_or_default(Some(tenant_id));
    let stats = state
        .analytics
        .dashboard_stats(&tenant_id)
        .await
        .map_err(|e| map_analytics_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::ok(req_id.0, StatsData { stats }))
}

pub(super) async fn orders_by_date(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<DateRangeQuery>,
) -> AnalyticsResponse<ListData<Vec<DailyOrders>>> {
    let tenant_id = tenant_or_default(query.tenant_id.clone());
    let range = query.range();
    let data = state
        .analytics
        .orders_by_date(&tenant_id, range)
        .await
        .map_err(|e| map_analytics_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::ok(req_id.0, ListData { data }))
}

pub(super) async fn top_customers(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<TopCustomersQuery>,
) -> AnalyticsResponse<ListData<Vec<TopCustomer>>> {
    let tenant_id = tenant_or_default(query.tenant_id);
    let max = usize::try_from(MAX_LIST_LIMIT).unwrap_or(usize::MAX);
    let limit = parse_number_param(query.limit.as_deref())
        .unwrap_or(DEFAULT_TOP_CUSTOMERS)
        .clamp(1, max);
    let data = state
        .analytics
        .top_customers(&tenant_id, limit)
        .await
        .map_err(|e| map_analytics_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::ok(req_id.0, ListData { data }))
}

pub(super) async fn sales_performance(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<TenantQuery>,
) -> AnalyticsResponse<ListData<Vec<MonthlySales>>> {
    let tenant_id = tenant_or_default(query.tenant_id);
    let data = state
        .analytics
        .sales_performance(&tenant_id)
        .await
        .map_err(|e| map_analytics_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::ok(req_id.0, ListData { data }))
}

pub(super) async fn customer_behavior(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<TenantQuery>,
) -> AnalyticsResponse<ListData<Vec<MonthlyCohort>>> {
    let tenant_id = tenant_or_default(query.tenant_id);
    let data = state
        .analytics
        .customer_behavior(&tenant_id)
        .await
        .map_err(|e| map_analytics_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::ok(req_id.0, ListData { data }))
}

pub(super) async fn cart_abandonment(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<TenantQuery>,
) -> AnalyticsResponse<ListData<CartAbandonmentSummary>> {
    let tenant_id = tenant_or_default(query.tenant_id);
    let data = state
        .analytics
        .cart_abandonment(&tenant_id)
        .await
        .map_err(|e| map_analytics_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::ok(req_id.0, ListData { data }))
}
