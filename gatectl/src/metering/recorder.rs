//! Usage recording.
//!
//! Persists one durable usage event per completed or failed dispatch. Token
//! counts the provider did not report are stored as unknown, never zero.
//! Requests rejected before any provider dispatch (admission or routing
//! failures) are not recorded at all - that is the dispatch path's contract,
//! not a recorder decision.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::errors::Result;
use crate::providers::TokenUsage;
use crate::store::UsageRepository;
use crate::store::models::{FailureStage, UsageEvent, UsageEventCreateRequest, UsageStatus};
use crate::types::{RequestId, UserId, abbrev_uuid};

/// Everything the dispatch path knows about one finished request.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub request_id: RequestId,
    pub user_id: UserId,
    pub model_id: String,
    /// Token counts as reported by the provider, if any
    pub usage: Option<TokenUsage>,
    pub status: UsageStatus,
    pub failure_stage: Option<FailureStage>,
    pub error_class: Option<String>,
    pub duration: Duration,
}

impl DispatchOutcome {
    pub fn success(request_id: RequestId, user_id: UserId, model_id: String, usage: Option<TokenUsage>, duration: Duration) -> Self {
        Self {
            request_id,
            user_id,
            model_id,
            usage,
            status: UsageStatus::Success,
            failure_stage: None,
            error_class: None,
            duration,
        }
    }

    pub fn failure(
        request_id: RequestId,
        user_id: UserId,
        model_id: String,
        usage: Option<TokenUsage>,
        stage: FailureStage,
        error_class: String,
        duration: Duration,
    ) -> Self {
        Self {
            request_id,
            user_id,
            model_id,
            usage,
            status: UsageStatus::Failure,
            failure_stage: Some(stage),
            error_class: Some(error_class),
            duration,
        }
    }
}

#[derive(Clone)]
pub struct UsageRecorder {
    usage: Arc<dyn UsageRepository>,
}

impl UsageRecorder {
    pub fn new(usage: Arc<dyn UsageRepository>) -> Self {
        Self { usage }
    }

    /// Persist one usage event for a dispatched request.
    #[instrument(skip_all, fields(request = %abbrev_uuid(&outcome.request_id), model = %outcome.model_id))]
    pub async fn record(&self, outcome: DispatchOutcome) -> Result<UsageEvent> {
        let tokens = outcome.usage.unwrap_or_default();
        let complete = tokens.input_tokens.is_some() && tokens.output_tokens.is_some();

        let request = UsageEventCreateRequest {
            request_id: outcome.request_id,
            user_id: outcome.user_id,
            model_id: outcome.model_id,
            input_tokens: tokens.input_tokens,
            output_tokens: tokens.output_tokens,
            cached_tokens: tokens.cached_tokens,
            reasoning_tokens: tokens.reasoning_tokens,
            status: outcome.status,
            failure_stage: outcome.failure_stage,
            error_class: outcome.error_class,
            complete,
            duration_ms: outcome.duration.as_millis() as u64,
        };

        let event = self.usage.create_usage_event(&request).await?;
        debug!(event = %abbrev_uuid(&event.id), status = ?event.status, "recorded usage event");
        Ok(event)
    }
}
