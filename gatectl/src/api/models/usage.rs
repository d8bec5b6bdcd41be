//! API wire models for usage events and billing summaries.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::metering::BillingPeriod;
use crate::store::models::{BillingSummary, FailureStage, UsageEvent, UsageStatus};
use crate::types::{BillingSummaryId, RequestId, UsageEventId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UsageEventResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UsageEventId,
    #[schema(value_type = String, format = "uuid")]
    pub request_id: RequestId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub model_id: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub cached_tokens: Option<u64>,
    pub reasoning_tokens: Option<u64>,
    pub status: UsageStatus,
    pub failure_stage: Option<FailureStage>,
    pub error_class: Option<String>,
    pub complete: bool,
    pub created_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[schema(value_type = Option<String>)]
    pub input_cost_cents: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub output_cost_cents: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub total_cost_cents: Option<Decimal>,
}

impl From<UsageEvent> for UsageEventResponse {
    fn from(event: UsageEvent) -> Self {
        Self {
            id: event.id,
            request_id: event.request_id,
            user_id: event.user_id,
            model_id: event.model_id,
            input_tokens: event.input_tokens,
            output_tokens: event.output_tokens,
            cached_tokens: event.cached_tokens,
            reasoning_tokens: event.reasoning_tokens,
            status: event.status,
            failure_stage: event.failure_stage,
            error_class: event.error_class,
            complete: event.complete,
            created_at: event.created_at,
            duration_ms: event.duration_ms,
            input_cost_cents: event.input_cost_cents,
            output_cost_cents: event.output_cost_cents,
            total_cost_cents: event.total_cost_cents,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BillingSummaryResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: BillingSummaryId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_requests: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    #[schema(value_type = String)]
    pub total_cost_cents: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BillingSummary> for BillingSummaryResponse {
    fn from(summary: BillingSummary) -> Self {
        Self {
            id: summary.id,
            user_id: summary.user_id,
            period_start: summary.period_start,
            period_end: summary.period_end,
            total_requests: summary.total_requests,
            total_input_tokens: summary.total_input_tokens,
            total_output_tokens: summary.total_output_tokens,
            total_cost_cents: summary.total_cost_cents,
            created_at: summary.created_at,
            updated_at: summary.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    Daily,
    Monthly,
}

/// Query parameters selecting one billing period: `?period=daily&date=2025-01-15`.
/// For monthly periods the date's day component is ignored.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BillingPeriodQuery {
    pub period: PeriodKind,
    pub date: NaiveDate,
}

impl BillingPeriodQuery {
    pub fn to_period(&self) -> BillingPeriod {
        use chrono::Datelike;
        match self.period {
            PeriodKind::Daily => BillingPeriod::Day(self.date),
            PeriodKind::Monthly => BillingPeriod::Month {
                year: self.date.year(),
                month: self.date.month(),
            },
        }
    }
}

/// Query parameters for listing recent usage events.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(default)]
pub struct UsageEventsQuery {
    pub limit: usize,
}

impl Default for UsageEventsQuery {
    fn default() -> Self {
        Self { limit: 100 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_query_mapping() {
        let daily = BillingPeriodQuery {
            period: PeriodKind::Daily,
            date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
        };
        assert_eq!(
            daily.to_period(),
            BillingPeriod::Day(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap())
        );

        let monthly = BillingPeriodQuery {
            period: PeriodKind::Monthly,
            date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
        };
        assert_eq!(monthly.to_period(), BillingPeriod::Month { year: 2025, month: 1 });
    }
}
