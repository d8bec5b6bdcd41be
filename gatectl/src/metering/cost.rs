//! Cost calculation.
//!
//! Batch-processes usage events that are ready for costing: fetches up to
//! `batch_size` uncosted successful events, prices each against its model's
//! per-token rates, and writes all three cost fields back in one repository
//! call. One bad event never aborts the batch - unresolvable models and
//! failed writes are logged and skipped.
//!
//! A single pass is not re-entrant-safe against a concurrent pass over the
//! same events; the scheduler guarantees at most one pass at a time by
//! construction.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::errors::{Error, Resource, Result};
use crate::store::models::{UsageCostUpdate, UsageEvent};
use crate::store::{ModelRepository, UsageRepository};
use crate::types::abbrev_uuid;

const CENTS_PER_DOLLAR: Decimal = Decimal::ONE_HUNDRED;

/// Cost of a token count at a per-token dollar price, in whole cents
/// (floored). An unknown count prices to zero.
pub fn compute_cost_cents(tokens: Option<u64>, price_per_token: Decimal) -> Decimal {
    match tokens {
        None => Decimal::ZERO,
        Some(tokens) => (Decimal::from(tokens) * price_per_token * CENTS_PER_DOLLAR).floor(),
    }
}

/// What one `process_usage_events` pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CostRunStats {
    pub processed: usize,
    pub skipped: usize,
}

pub struct CostCalculator {
    usage: Arc<dyn UsageRepository>,
    models: Arc<dyn ModelRepository>,
    batch_size: usize,
}

impl CostCalculator {
    pub fn new(usage: Arc<dyn UsageRepository>, models: Arc<dyn ModelRepository>, batch_size: usize) -> Self {
        assert!(batch_size > 0, "cost batch size must be non-zero");
        Self {
            usage,
            models,
            batch_size,
        }
    }

    /// Price every event currently ready for costing.
    ///
    /// Fetches batches until one comes back empty or short (exhaustion,
    /// without an extra round-trip). A batch where every event was skipped
    /// also ends the pass: refetching would return the same events.
    #[instrument(skip(self))]
    pub async fn process_usage_events(&self) -> Result<CostRunStats> {
        let mut stats = CostRunStats::default();

        loop {
            let batch = self.usage.list_usage_events_for_cost_calculation(self.batch_size).await?;
            if batch.is_empty() {
                break;
            }
            let fetched = batch.len();

            let mut updated = 0;
            for event in batch {
                match self.cost_event(&event).await {
                    Ok(()) => {
                        updated += 1;
                        stats.processed += 1;
                    }
                    Err(e) => {
                        warn!(event = %abbrev_uuid(&event.id), model = %event.model_id, error = %e,
                            "skipping usage event that could not be costed");
                        stats.skipped += 1;
                    }
                }
            }

            if fetched < self.batch_size {
                break;
            }
            if updated == 0 {
                break;
            }
        }

        debug!(processed = stats.processed, skipped = stats.skipped, "cost calculation pass finished");
        Ok(stats)
    }

    async fn cost_event(&self, event: &UsageEvent) -> Result<()> {
        let model = self
            .models
            .get_model_by_id(&event.model_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: Resource::Model,
                id: event.model_id.clone(),
            })?;

        let input_cost_cents = compute_cost_cents(event.input_tokens, model.input_token_price);
        let output_cost_cents = compute_cost_cents(event.output_tokens, model.output_token_price);
        let cost = UsageCostUpdate {
            input_cost_cents,
            output_cost_cents,
            total_cost_cents: input_cost_cents + output_cost_cents,
        };

        self.usage.update_usage_event_cost(event.id, &cost).await?;
        Ok(())
    }
}
