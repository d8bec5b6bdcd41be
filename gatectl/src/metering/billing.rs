//! Billing aggregation.
//!
//! Rolls costed usage events into per-user summaries over calendar-day or
//! calendar-month periods. Periods are half-open `[start, end)`; the stored
//! upper bound is the next period's start minus one nanosecond so that
//! range queries can treat it inclusively.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::errors::{Error, Result};
use crate::store::models::{BillingSummaryCreateRequest, BillingSummaryUpdateRequest};
use crate::store::{BillingRepository, UsageRepository};
use crate::types::UserId;

/// One billing period: exactly one calendar day or one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingPeriod {
    Day(NaiveDate),
    Month { year: i32, month: u32 },
}

impl BillingPeriod {
    /// The half-open window `[start, end)` as concrete bounds, with the end
    /// expressed as the exclusive bound minus one nanosecond.
    pub fn bounds(&self) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        match *self {
            BillingPeriod::Day(date) => {
                let start = date.and_time(NaiveTime::MIN).and_utc();
                let end = start + Duration::days(1) - Duration::nanoseconds(1);
                Ok((start, end))
            }
            BillingPeriod::Month { year, month } => {
                let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| Error::BadRequest {
                    message: format!("invalid billing month {year}-{month:02}"),
                })?;
                let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
                // Safe given `first` parsed: the first of the next month always exists
                let next_first = NaiveDate::from_ymd_opt(next_year, next_month, 1).ok_or_else(|| Error::BadRequest {
                    message: format!("invalid billing month {year}-{month:02}"),
                })?;

                let start = first.and_time(NaiveTime::MIN).and_utc();
                let end = next_first.and_time(NaiveTime::MIN).and_utc() - Duration::nanoseconds(1);
                Ok((start, end))
            }
        }
    }

    /// The calendar day containing `instant`.
    pub fn day_of(instant: DateTime<Utc>) -> Self {
        BillingPeriod::Day(instant.date_naive())
    }

    /// The calendar month preceding the one containing `instant`.
    pub fn previous_month_of(instant: DateTime<Utc>) -> Self {
        let (year, month) = if instant.month() == 1 {
            (instant.year() - 1, 12)
        } else {
            (instant.year(), instant.month() - 1)
        };
        BillingPeriod::Month { year, month }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct UserTotals {
    requests: u64,
    input_tokens: u64,
    output_tokens: u64,
    cost_cents: Decimal,
}

pub struct BillingAggregator {
    usage: Arc<dyn UsageRepository>,
    billing: Arc<dyn BillingRepository>,
}

impl BillingAggregator {
    pub fn new(usage: Arc<dyn UsageRepository>, billing: Arc<dyn BillingRepository>) -> Self {
        Self { usage, billing }
    }

    /// Create or update the per-user summaries for one period.
    ///
    /// Regeneration is idempotent: an existing (user, period) summary is
    /// updated in place, never duplicated. Returns the number of users
    /// summarized.
    #[instrument(skip(self))]
    pub async fn generate_billing_summaries(&self, period: BillingPeriod) -> Result<usize> {
        let (start, end) = period.bounds()?;
        let events = self.usage.list_costed_usage_events(start, end).await?;

        let mut per_user: HashMap<UserId, UserTotals> = HashMap::new();
        for event in &events {
            let totals = per_user.entry(event.user_id).or_default();
            totals.requests += 1;
            totals.input_tokens += event.input_tokens.unwrap_or(0);
            totals.output_tokens += event.output_tokens.unwrap_or(0);
            totals.cost_cents += event.total_cost_cents.unwrap_or(Decimal::ZERO);
        }

        let summarized = per_user.len();
        for (user_id, totals) in per_user {
            match self.billing.get_billing_summary(user_id, start, end).await? {
                Some(existing) => {
                    self.billing
                        .update_billing_summary(
                            existing.id,
                            &BillingSummaryUpdateRequest {
                                total_requests: totals.requests,
                                total_input_tokens: totals.input_tokens,
                                total_output_tokens: totals.output_tokens,
                                total_cost_cents: totals.cost_cents,
                            },
                        )
                        .await?;
                }
                None => {
                    self.billing
                        .create_billing_summary(&BillingSummaryCreateRequest {
                            user_id,
                            period_start: start,
                            period_end: end,
                            total_requests: totals.requests,
                            total_input_tokens: totals.input_tokens,
                            total_output_tokens: totals.output_tokens,
                            total_cost_cents: totals.cost_cents,
                        })
                        .await?;
                }
            }
        }

        debug!(users = summarized, events = events.len(), "billing summaries generated");
        Ok(summarized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{InMemoryBillingRepository, InMemoryUsageRepository};
    use crate::store::models::{UsageCostUpdate, UsageEventCreateRequest, UsageStatus};
    use uuid::Uuid;

    #[test]
    fn test_daily_period_bounds() {
        let period = BillingPeriod::Day(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
        let (start, end) = period.bounds().unwrap();
        assert_eq!(start.to_rfc3339(), "2025-01-15T00:00:00+00:00");
        assert_eq!(end.timestamp_subsec_nanos(), 999_999_999);
        assert_eq!(end.format("%Y-%m-%dT%H:%M:%S").to_string(), "2025-01-15T23:59:59");
    }

    #[test]
    fn test_monthly_period_bounds() {
        let period = BillingPeriod::Month { year: 2025, month: 1 };
        let (start, end) = period.bounds().unwrap();
        assert_eq!(start.to_rfc3339(), "2025-01-01T00:00:00+00:00");
        assert_eq!(end.format("%Y-%m-%dT%H:%M:%S").to_string(), "2025-01-31T23:59:59");
        assert_eq!(end.timestamp_subsec_nanos(), 999_999_999);
    }

    #[test]
    fn test_december_rolls_into_next_year() {
        let period = BillingPeriod::Month { year: 2024, month: 12 };
        let (start, end) = period.bounds().unwrap();
        assert_eq!(start.to_rfc3339(), "2024-12-01T00:00:00+00:00");
        assert_eq!(end.format("%Y-%m-%d").to_string(), "2024-12-31");
    }

    #[test]
    fn test_february_leap_year() {
        let period = BillingPeriod::Month { year: 2024, month: 2 };
        let (_, end) = period.bounds().unwrap();
        assert_eq!(end.format("%Y-%m-%d").to_string(), "2024-02-29");
    }

    #[test]
    fn test_invalid_month_is_bad_request() {
        let period = BillingPeriod::Month { year: 2025, month: 13 };
        assert!(matches!(period.bounds(), Err(Error::BadRequest { .. })));
    }

    #[test]
    fn test_previous_month_wraps_january() {
        let instant = "2025-01-10T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(
            BillingPeriod::previous_month_of(instant),
            BillingPeriod::Month { year: 2024, month: 12 }
        );
    }

    async fn seed_costed_event(usage: &InMemoryUsageRepository, user_id: UserId, input: u64, output: u64, cents: i64) {
        let event = usage
            .create_usage_event(&UsageEventCreateRequest {
                request_id: Uuid::new_v4(),
                user_id,
                model_id: "m".to_string(),
                input_tokens: Some(input),
                output_tokens: Some(output),
                cached_tokens: None,
                reasoning_tokens: None,
                status: UsageStatus::Success,
                failure_stage: None,
                error_class: None,
                complete: true,
                duration_ms: 10,
            })
            .await
            .unwrap();
        usage
            .update_usage_event_cost(
                event.id,
                &UsageCostUpdate {
                    input_cost_cents: Decimal::ZERO,
                    output_cost_cents: Decimal::from(cents),
                    total_cost_cents: Decimal::from(cents),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_summaries_group_by_user() {
        let usage = Arc::new(InMemoryUsageRepository::new());
        let billing = Arc::new(InMemoryBillingRepository::new());
        let aggregator = BillingAggregator::new(usage.clone(), billing.clone());

        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        seed_costed_event(&usage, alice, 100, 50, 10).await;
        seed_costed_event(&usage, alice, 200, 100, 20).await;
        seed_costed_event(&usage, bob, 10, 5, 1).await;

        let period = BillingPeriod::day_of(Utc::now());
        let summarized = aggregator.generate_billing_summaries(period).await.unwrap();
        assert_eq!(summarized, 2);

        let (start, end) = period.bounds().unwrap();
        let alice_summary = billing.get_billing_summary(alice, start, end).await.unwrap().unwrap();
        assert_eq!(alice_summary.total_requests, 2);
        assert_eq!(alice_summary.total_input_tokens, 300);
        assert_eq!(alice_summary.total_output_tokens, 150);
        assert_eq!(alice_summary.total_cost_cents, Decimal::from(30));
    }

    #[tokio::test]
    async fn test_regeneration_updates_instead_of_duplicating() {
        let usage = Arc::new(InMemoryUsageRepository::new());
        let billing = Arc::new(InMemoryBillingRepository::new());
        let aggregator = BillingAggregator::new(usage.clone(), billing.clone());

        let user = Uuid::new_v4();
        seed_costed_event(&usage, user, 100, 50, 10).await;

        let period = BillingPeriod::day_of(Utc::now());
        aggregator.generate_billing_summaries(period).await.unwrap();

        // More usage lands, then the same period is regenerated
        seed_costed_event(&usage, user, 100, 50, 10).await;
        aggregator.generate_billing_summaries(period).await.unwrap();

        let (start, end) = period.bounds().unwrap();
        let summaries = billing.list_billing_summaries_by_period(start, end).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].total_requests, 2);
        assert_eq!(summaries[0].total_cost_cents, Decimal::from(20));
    }

    #[tokio::test]
    async fn test_uncosted_events_are_not_aggregated() {
        let usage = Arc::new(InMemoryUsageRepository::new());
        let billing = Arc::new(InMemoryBillingRepository::new());
        let aggregator = BillingAggregator::new(usage.clone(), billing.clone());

        // Event exists but the cost calculator has not priced it yet
        usage
            .create_usage_event(&UsageEventCreateRequest {
                request_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                model_id: "m".to_string(),
                input_tokens: Some(1),
                output_tokens: Some(1),
                cached_tokens: None,
                reasoning_tokens: None,
                status: UsageStatus::Success,
                failure_stage: None,
                error_class: None,
                complete: true,
                duration_ms: 10,
            })
            .await
            .unwrap();

        let summarized = aggregator
            .generate_billing_summaries(BillingPeriod::day_of(Utc::now()))
            .await
            .unwrap();
        assert_eq!(summarized, 0);
    }
}
