//! Repository interfaces for the persistence layer.
//!
//! The SQL/storage implementation lives outside this crate; everything in
//! here is consumed strictly through these traits. Each repository covers one
//! entity family and returns [`RepoError`] so callers can react to the
//! recoverable cases (not-found, conflicts) without knowing what backs the
//! store.
//!
//! [`memory`] provides the bundled in-memory implementations used by the
//! binary's development mode and by tests; [`cached`] wraps the model and
//! credential repositories with the TTL cache.

pub mod cached;
pub mod memory;
pub mod models;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{ApiTokenId, BillingSummaryId, CredentialId, UsageEventId, UserId};
use models::{
    ApiToken, ApiTokenCreateRequest, BillingSummary, BillingSummaryCreateRequest, BillingSummaryUpdateRequest,
    Credential, CredentialCreateRequest, CredentialUpdateRequest, Model, ModelCreateRequest, ModelUpdateRequest,
    Session, UsageCostUpdate, UsageEvent, UsageEventCreateRequest,
};

/// Unified error type for repository operations that application code can handle
#[derive(Error, Debug)]
pub enum RepoError {
    /// Entity not found by the given identifier
    #[error("entity not found")]
    NotFound,

    /// Uniqueness violation (duplicate id, duplicate (user, period) summary, ...)
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Type alias for repository operation results
pub type Result<T> = std::result::Result<T, RepoError>;

/// Read/write access to the tenant-visible model catalog.
#[async_trait::async_trait]
pub trait ModelRepository: Send + Sync {
    async fn get_model_by_id(&self, id: &str) -> Result<Option<Model>>;

    async fn get_all_models(&self) -> Result<Vec<Model>>;

    async fn create_model(&self, request: &ModelCreateRequest) -> Result<Model>;

    async fn update_model(&self, id: &str, request: &ModelUpdateRequest) -> Result<Model>;

    /// Returns `false` if no model with `id` existed.
    async fn delete_model(&self, id: &str) -> Result<bool>;
}

/// Access to provider credential bundles. The secret material never leaves
/// this boundary except inside the returned [`Credential`].
#[async_trait::async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn get_credential(&self, id: CredentialId) -> Result<Option<Credential>>;

    async fn list_credentials(&self) -> Result<Vec<Credential>>;

    async fn create_credential(&self, request: &CredentialCreateRequest) -> Result<Credential>;

    async fn update_credential(&self, id: CredentialId, request: &CredentialUpdateRequest) -> Result<Credential>;

    async fn delete_credential(&self, id: CredentialId) -> Result<bool>;
}

/// Durable usage events, one per dispatched request.
#[async_trait::async_trait]
pub trait UsageRepository: Send + Sync {
    async fn create_usage_event(&self, request: &UsageEventCreateRequest) -> Result<UsageEvent>;

    /// Up to `limit` events that are ready for costing (cost fields unset,
    /// completed successfully), oldest first.
    async fn list_usage_events_for_cost_calculation(&self, limit: usize) -> Result<Vec<UsageEvent>>;

    /// Write all three cost fields in one shot. Fails with
    /// [`RepoError::NotFound`] if the event does not exist.
    async fn update_usage_event_cost(&self, id: UsageEventId, cost: &UsageCostUpdate) -> Result<UsageEvent>;

    /// Costed events whose timestamp falls inside `[start, end]`.
    async fn list_costed_usage_events(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<UsageEvent>>;

    /// Most recent events first, up to `limit`.
    async fn list_recent_usage_events(&self, limit: usize) -> Result<Vec<UsageEvent>>;
}

/// Per-user, per-period billing summaries.
#[async_trait::async_trait]
pub trait BillingRepository: Send + Sync {
    async fn list_billing_summaries_by_period(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<BillingSummary>>;

    async fn get_billing_summary(
        &self,
        user_id: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<BillingSummary>>;

    async fn create_billing_summary(&self, request: &BillingSummaryCreateRequest) -> Result<BillingSummary>;

    async fn update_billing_summary(&self, id: BillingSummaryId, request: &BillingSummaryUpdateRequest) -> Result<BillingSummary>;
}

/// Interactive sessions minted by the external identity federation flow.
#[async_trait::async_trait]
pub trait SessionRepository: Send + Sync {
    async fn get_session(&self, token: &str) -> Result<Option<Session>>;

    async fn create_session(&self, session: &Session) -> Result<()>;

    async fn delete_session(&self, token: &str) -> Result<bool>;
}

/// Bearer API tokens, stored by hash only.
#[async_trait::async_trait]
pub trait TokenRepository: Send + Sync {
    async fn get_token_by_hash(&self, hash: &str) -> Result<Option<ApiToken>>;

    async fn create_token(&self, request: &ApiTokenCreateRequest) -> Result<ApiToken>;

    async fn delete_token(&self, id: ApiTokenId) -> Result<bool>;

    async fn list_tokens_for_user(&self, user_id: UserId) -> Result<Vec<ApiToken>>;
}
