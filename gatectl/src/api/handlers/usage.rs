//! Usage and billing queries.

use axum::Json;
use axum::extract::{Query, State};

use crate::AppState;
use crate::api::models::usage::{BillingPeriodQuery, BillingSummaryResponse, UsageEventResponse, UsageEventsQuery};
use crate::auth::AuthContext;
use crate::errors::Result;
use crate::store::{BillingRepository, UsageRepository};

#[utoipa::path(
    get,
    path = "/admin/api/v1/usage/events",
    tag = "usage",
    responses((status = 200, description = "Most recent usage events", body = [UsageEventResponse]))
)]
pub async fn list_usage_events(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(query): Query<UsageEventsQuery>,
) -> Result<Json<Vec<UsageEventResponse>>> {
    let events = state.usage.list_recent_usage_events(query.limit).await?;
    Ok(Json(events.into_iter().map(UsageEventResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/admin/api/v1/billing/summaries",
    tag = "billing",
    responses(
        (status = 200, description = "Billing summaries for the selected period", body = [BillingSummaryResponse]),
        (status = 400, description = "Invalid period")
    )
)]
pub async fn list_billing_summaries(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(query): Query<BillingPeriodQuery>,
) -> Result<Json<Vec<BillingSummaryResponse>>> {
    let (start, end) = query.to_period().bounds()?;
    let summaries = state.billing.list_billing_summaries_by_period(start, end).await?;
    Ok(Json(summaries.into_iter().map(BillingSummaryResponse::from).collect()))
}
