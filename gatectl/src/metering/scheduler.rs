//! Background scheduler driving the metering jobs.
//!
//! Owns two independent periodic timers: cost calculation and billing
//! generation. Each billing tick regenerates the current day's summaries;
//! monthly summaries are regenerated only on the tick where the wall clock
//! reads day 1, hour 1, and they cover the previous month.
//!
//! `start` launches the driving loop and returns immediately; `stop` signals
//! it and blocks until the loop has fully drained, so no job is left
//! mid-execution when it returns. The loop also exits when the supplied
//! cancellation token fires, and `stop` will not deadlock in that case.
//!
//! Jobs run sequentially on the single loop, which is what makes a second
//! concurrent cost pass impossible by construction.

use chrono::{Datelike, Timelike, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::billing::{BillingAggregator, BillingPeriod};
use super::cost::CostCalculator;
use crate::config::MeteringConfig;

pub struct MeteringScheduler {
    cost: Arc<CostCalculator>,
    billing: Arc<BillingAggregator>,
    config: MeteringConfig,
    handle: Option<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl MeteringScheduler {
    pub fn new(cost: Arc<CostCalculator>, billing: Arc<BillingAggregator>, config: MeteringConfig) -> Self {
        Self {
            cost,
            billing,
            config,
            handle: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Launch the driving loop. Returns immediately; the loop runs until
    /// [`stop`](Self::stop) is called or `ctx` is cancelled.
    pub fn start(&mut self, ctx: CancellationToken) {
        if self.handle.is_some() {
            return;
        }
        let cost = Arc::clone(&self.cost);
        let billing = Arc::clone(&self.billing);
        let config = self.config.clone();
        let shutdown = self.shutdown.clone();

        self.handle = Some(tokio::spawn(run_loop(cost, billing, config, ctx, shutdown)));
        info!("metering scheduler started");
    }

    /// Signal the loop to exit and wait until it has. Safe to call once per
    /// instance even if the loop already exited via context cancellation;
    /// further calls are no-ops.
    pub async fn stop(&mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("metering scheduler stopped");
    }
}

/// Billing periods due at `now`: the current day every tick, plus the
/// previous month on the day=1 hour=1 tick.
fn billing_periods_due(now: chrono::DateTime<Utc>) -> Vec<BillingPeriod> {
    let mut periods = vec![BillingPeriod::day_of(now)];
    if now.day() == 1 && now.hour() == 1 {
        periods.push(BillingPeriod::previous_month_of(now));
    }
    periods
}

async fn run_loop(
    cost: Arc<CostCalculator>,
    billing: Arc<BillingAggregator>,
    config: MeteringConfig,
    ctx: CancellationToken,
    shutdown: CancellationToken,
) {
    let mut cost_timer = tokio::time::interval_at(Instant::now() + config.cost_interval, config.cost_interval);
    cost_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut billing_timer = tokio::time::interval_at(Instant::now() + config.billing_interval, config.billing_interval);
    billing_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ctx.cancelled() => break,
            _ = shutdown.cancelled() => break,
            _ = cost_timer.tick() => {
                let started = Instant::now();
                match cost.process_usage_events().await {
                    Ok(stats) => {
                        debug!(processed = stats.processed, skipped = stats.skipped,
                            elapsed_ms = started.elapsed().as_millis() as u64, "cost calculation tick finished");
                    }
                    Err(e) => {
                        error!(error = %e, elapsed_ms = started.elapsed().as_millis() as u64,
                            "cost calculation tick failed");
                    }
                }
            }
            _ = billing_timer.tick() => {
                let now = Utc::now();
                for period in billing_periods_due(now) {
                    let started = Instant::now();
                    match billing.generate_billing_summaries(period).await {
                        Ok(users) => {
                            debug!(?period, users, elapsed_ms = started.elapsed().as_millis() as u64,
                                "billing generation tick finished");
                        }
                        Err(e) => {
                            error!(?period, error = %e, elapsed_ms = started.elapsed().as_millis() as u64,
                                "billing generation tick failed");
                        }
                    }
                }
            }
        }
    }

    debug!("metering scheduler loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::CredentialKind;
    use crate::store::memory::{InMemoryBillingRepository, InMemoryModelRepository, InMemoryUsageRepository};
    use crate::store::models::{ModelCapabilities, ModelCreateRequest, UsageEventCreateRequest, UsageStatus};
    use crate::store::{ModelRepository, UsageRepository};
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::time::Duration;
    use uuid::Uuid;

    struct Fixture {
        usage: Arc<InMemoryUsageRepository>,
        scheduler: MeteringScheduler,
    }

    async fn fixture() -> Fixture {
        let usage = Arc::new(InMemoryUsageRepository::new());
        let models = Arc::new(InMemoryModelRepository::new());
        let billing = Arc::new(InMemoryBillingRepository::new());

        models
            .create_model(&ModelCreateRequest {
                id: "m".to_string(),
                name: "m".to_string(),
                provider: "openrouter".to_string(),
                credential_id: Uuid::new_v4(),
                credential_kind: CredentialKind::OpenRouter,
                input_token_price: Decimal::new(1, 3),
                output_token_price: Decimal::new(2, 3),
                capabilities: ModelCapabilities::default(),
                metadata: HashMap::new(),
            })
            .await
            .unwrap();

        let cost = Arc::new(CostCalculator::new(usage.clone(), models.clone(), 100));
        let aggregator = Arc::new(BillingAggregator::new(usage.clone(), billing.clone()));
        let config = MeteringConfig {
            cost_interval: Duration::from_secs(60),
            billing_interval: Duration::from_secs(3600),
            cost_batch_size: 100,
        };

        Fixture {
            usage,
            scheduler: MeteringScheduler::new(cost, aggregator, config),
        }
    }

    async fn seed_event(usage: &InMemoryUsageRepository) -> Uuid {
        usage
            .create_usage_event(&UsageEventCreateRequest {
                request_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                model_id: "m".to_string(),
                input_tokens: Some(1000),
                output_tokens: Some(500),
                cached_tokens: None,
                reasoning_tokens: None,
                status: UsageStatus::Success,
                failure_stage: None,
                error_class: None,
                complete: true,
                duration_ms: 10,
            })
            .await
            .unwrap()
            .id
    }

    async fn wait_until_costed(usage: &InMemoryUsageRepository, event_id: Uuid) -> bool {
        for _ in 0..50 {
            let events = usage.list_recent_usage_events(10).await.unwrap();
            if events.iter().any(|e| e.id == event_id && e.total_cost_cents.is_some()) {
                return true;
            }
            tokio::task::yield_now().await;
        }
        false
    }

    #[test]
    fn test_monthly_summaries_only_on_day_one_hour_one() {
        let plain_tick = Utc.with_ymd_and_hms(2025, 3, 15, 14, 0, 0).unwrap();
        assert_eq!(billing_periods_due(plain_tick), vec![BillingPeriod::day_of(plain_tick)]);

        let monthly_tick = Utc.with_ymd_and_hms(2025, 3, 1, 1, 0, 0).unwrap();
        assert_eq!(
            billing_periods_due(monthly_tick),
            vec![
                BillingPeriod::day_of(monthly_tick),
                BillingPeriod::Month { year: 2025, month: 2 },
            ]
        );

        // Day 1 at any other hour does not trigger the monthly pass
        let wrong_hour = Utc.with_ymd_and_hms(2025, 3, 1, 2, 0, 0).unwrap();
        assert_eq!(billing_periods_due(wrong_hour).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cost_tick_prices_pending_events() {
        let mut fx = fixture().await;
        let event_id = seed_event(&fx.usage).await;

        fx.scheduler.start(CancellationToken::new());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(wait_until_costed(&fx.usage, event_id).await, "event was not costed by the tick");

        fx.scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_returns_after_loop_exit_and_is_repeatable() {
        let mut fx = fixture().await;
        fx.scheduler.start(CancellationToken::new());

        fx.scheduler.stop().await;
        // Second stop must neither panic nor hang
        fx.scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_cancellation_exits_loop_and_stop_does_not_deadlock() {
        let mut fx = fixture().await;
        let ctx = CancellationToken::new();
        fx.scheduler.start(ctx.clone());

        ctx.cancel();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        // The loop already exited via the context; stop still returns cleanly
        fx.scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent_while_running() {
        let mut fx = fixture().await;
        fx.scheduler.start(CancellationToken::new());
        // A second start while running is a no-op rather than a second loop
        fx.scheduler.start(CancellationToken::new());
        fx.scheduler.stop().await;
    }
}
