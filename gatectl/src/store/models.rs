//! Domain records handled by the repositories.
//!
//! Record types carry the persisted state; `*CreateRequest`/`*UpdateRequest`
//! types carry exactly what a caller may set. Timestamps and generated ids
//! are assigned by the repository, never by callers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;
use utoipa::ToSchema;

use crate::providers::CredentialKind;
use crate::types::{ApiTokenId, BillingSummaryId, CredentialId, RequestId, UsageEventId, UserId};

/// Metadata key carrying the optional model reference string
/// `provider:providerModelID` used for aliasing.
pub const MODEL_REFERENCE_KEY: &str = "model_reference";

/// Capability flags exposed on a model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ModelCapabilities {
    pub vision: bool,
    pub tools: bool,
    pub reasoning: bool,
    pub streaming: bool,
    pub max_input_tokens: Option<u32>,
    pub max_output_tokens: Option<u32>,
}

/// A provider-exposed inference target. `id` is unique within the
/// tenant-visible catalog and is the string requests route on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub name: String,
    /// Owning provider identifier (e.g. "openrouter")
    pub provider: String,
    pub credential_id: CredentialId,
    pub credential_kind: CredentialKind,
    /// Price per input token, in dollars
    pub input_token_price: Decimal,
    /// Price per output token, in dollars
    pub output_token_price: Decimal,
    pub capabilities: ModelCapabilities,
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// The `model_reference` metadata entry, if the model carries one.
    pub fn model_reference(&self) -> Option<&str> {
        self.metadata.get(MODEL_REFERENCE_KEY).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct ModelCreateRequest {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub credential_id: CredentialId,
    pub credential_kind: CredentialKind,
    pub input_token_price: Decimal,
    pub output_token_price: Decimal,
    pub capabilities: ModelCapabilities,
    pub metadata: HashMap<String, String>,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ModelUpdateRequest {
    pub name: Option<String>,
    pub input_token_price: Option<Decimal>,
    pub output_token_price: Option<Decimal>,
    pub capabilities: Option<ModelCapabilities>,
    pub metadata: Option<HashMap<String, String>>,
}

/// Provider-specific secret bundle. `site_url`/`site_name` carry optional
/// provider metadata such as site attribution headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub name: String,
    pub kind: CredentialKind,
    pub api_key: String,
    /// Overrides the credential kind's default endpoint when set
    pub base_url: Option<Url>,
    pub site_url: Option<String>,
    pub site_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CredentialCreateRequest {
    pub name: String,
    pub kind: CredentialKind,
    pub api_key: String,
    pub base_url: Option<Url>,
    pub site_url: Option<String>,
    pub site_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CredentialUpdateRequest {
    pub name: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<Url>,
    pub site_url: Option<String>,
    pub site_name: Option<String>,
}

/// Outcome of a dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UsageStatus {
    Success,
    Failure,
}

/// Which stage a failed dispatch died in. Requests rejected before dispatch
/// never produce an event, so admission and routing do not appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// The synchronous provider call failed
    Dispatch,
    /// The provider stream broke after it was established
    Stream,
}

/// One record per dispatched request.
///
/// Token counts are `None` when the provider did not report them - absence
/// means "unknown", not zero. The three cost fields start unset and are
/// filled exactly once by the cost calculator; they are either all unset or
/// all set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub id: UsageEventId,
    pub request_id: RequestId,
    pub user_id: UserId,
    pub model_id: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub cached_tokens: Option<u64>,
    pub reasoning_tokens: Option<u64>,
    pub status: UsageStatus,
    pub failure_stage: Option<FailureStage>,
    pub error_class: Option<String>,
    /// Whether the provider reported both input and output token counts
    pub complete: bool,
    pub created_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Cost of input tokens, in fractional cents
    pub input_cost_cents: Option<Decimal>,
    /// Cost of output tokens, in fractional cents
    pub output_cost_cents: Option<Decimal>,
    /// Total cost, in fractional cents
    pub total_cost_cents: Option<Decimal>,
}

impl UsageEvent {
    /// An event is ready for costing iff its cost fields are unset and it
    /// completed successfully.
    pub fn ready_for_costing(&self) -> bool {
        self.total_cost_cents.is_none() && self.status == UsageStatus::Success
    }
}

#[derive(Debug, Clone)]
pub struct UsageEventCreateRequest {
    pub request_id: RequestId,
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
    pub duration_ms: u64,
}

/// All three cost fields, written back atomically.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageCostUpdate {
    pub input_cost_cents: Decimal,
    pub output_cost_cents: Decimal,
    pub total_cost_cents: Decimal,
}

/// Aggregate of costed usage events for one user over one half-open period
/// `[period_start, period_end]` (the end bound is the period's exclusive
/// upper bound minus one nanosecond).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingSummary {
    pub id: BillingSummaryId,
    pub user_id: UserId,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_requests: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cost_cents: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BillingSummaryCreateRequest {
    pub user_id: UserId,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_requests: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cost_cents: Decimal,
}

#[derive(Debug, Clone)]
pub struct BillingSummaryUpdateRequest {
    pub total_requests: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cost_cents: Decimal,
}

/// An interactive session. Minted by the external identity federation flow;
/// this crate only ever looks sessions up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A bearer API token record. Only the SHA-256 hash of the secret is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiToken {
    pub id: ApiTokenId,
    pub user_id: UserId,
    pub name: String,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

#[derive(Debug, Clone)]
pub struct ApiTokenCreateRequest {
    pub user_id: UserId,
    pub name: String,
    pub token_hash: String,
    pub expires_at: Option<DateTime<Utc>>,
}
