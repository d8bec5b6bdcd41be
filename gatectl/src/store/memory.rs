//! In-memory repository implementations.
//!
//! These back the binary's self-contained development mode and every test in
//! the crate. State lives in `DashMap`s and dies with the process; the SQL
//! implementations that replace them in production live outside this crate.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::models::{
    ApiToken, ApiTokenCreateRequest, BillingSummary, BillingSummaryCreateRequest, BillingSummaryUpdateRequest,
    Credential, CredentialCreateRequest, CredentialUpdateRequest, Model, ModelCreateRequest, ModelUpdateRequest,
    Session, UsageCostUpdate, UsageEvent, UsageEventCreateRequest,
};
use super::{
    BillingRepository, CredentialRepository, ModelRepository, RepoError, Result, SessionRepository, TokenRepository,
    UsageRepository,
};
use crate::types::{ApiTokenId, BillingSummaryId, CredentialId, UsageEventId, UserId};

#[derive(Default)]
pub struct InMemoryModelRepository {
    models: DashMap<String, Model>,
}

impl InMemoryModelRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ModelRepository for InMemoryModelRepository {
    async fn get_model_by_id(&self, id: &str) -> Result<Option<Model>> {
        Ok(self.models.get(id).map(|entry| entry.value().clone()))
    }

    async fn get_all_models(&self) -> Result<Vec<Model>> {
        let mut models: Vec<Model> = self.models.iter().map(|entry| entry.value().clone()).collect();
        models.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(models)
    }

    async fn create_model(&self, request: &ModelCreateRequest) -> Result<Model> {
        if self.models.contains_key(&request.id) {
            return Err(RepoError::Conflict {
                message: format!("model {:?} already exists", request.id),
            });
        }
        let now = Utc::now();
        let model = Model {
            id: request.id.clone(),
            name: request.name.clone(),
            provider: request.provider.clone(),
            credential_id: request.credential_id,
            credential_kind: request.credential_kind,
            input_token_price: request.input_token_price,
            output_token_price: request.output_token_price,
            capabilities: request.capabilities.clone(),
            metadata: request.metadata.clone(),
            created_at: now,
            updated_at: now,
        };
        self.models.insert(model.id.clone(), model.clone());
        Ok(model)
    }

    async fn update_model(&self, id: &str, request: &ModelUpdateRequest) -> Result<Model> {
        let mut entry = self.models.get_mut(id).ok_or(RepoError::NotFound)?;
        if let Some(name) = &request.name {
            entry.name = name.clone();
        }
        if let Some(price) = request.input_token_price {
            entry.input_token_price = price;
        }
        if let Some(price) = request.output_token_price {
            entry.output_token_price = price;
        }
        if let Some(capabilities) = &request.capabilities {
            entry.capabilities = capabilities.clone();
        }
        if let Some(metadata) = &request.metadata {
            entry.metadata = metadata.clone();
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn delete_model(&self, id: &str) -> Result<bool> {
        Ok(self.models.remove(id).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryCredentialRepository {
    credentials: DashMap<CredentialId, Credential>,
}

impl InMemoryCredentialRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn get_credential(&self, id: CredentialId) -> Result<Option<Credential>> {
        Ok(self.credentials.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_credentials(&self) -> Result<Vec<Credential>> {
        let mut credentials: Vec<Credential> = self.credentials.iter().map(|entry| entry.value().clone()).collect();
        credentials.sort_by_key(|credential| credential.created_at);
        Ok(credentials)
    }

    async fn create_credential(&self, request: &CredentialCreateRequest) -> Result<Credential> {
        let now = Utc::now();
        let credential = Credential {
            id: Uuid::new_v4(),
            name: request.name.clone(),
            kind: request.kind,
            api_key: request.api_key.clone(),
            base_url: request.base_url.clone(),
            site_url: request.site_url.clone(),
            site_name: request.site_name.clone(),
            created_at: now,
            updated_at: now,
        };
        self.credentials.insert(credential.id, credential.clone());
        Ok(credential)
    }

    async fn update_credential(&self, id: CredentialId, request: &CredentialUpdateRequest) -> Result<Credential> {
        let mut entry = self.credentials.get_mut(&id).ok_or(RepoError::NotFound)?;
        if let Some(name) = &request.name {
            entry.name = name.clone();
        }
        if let Some(api_key) = &request.api_key {
            entry.api_key = api_key.clone();
        }
        if let Some(base_url) = &request.base_url {
            entry.base_url = Some(base_url.clone());
        }
        if let Some(site_url) = &request.site_url {
            entry.site_url = Some(site_url.clone());
        }
        if let Some(site_name) = &request.site_name {
            entry.site_name = Some(site_name.clone());
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn delete_credential(&self, id: CredentialId) -> Result<bool> {
        Ok(self.credentials.remove(&id).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryUsageRepository {
    events: DashMap<UsageEventId, UsageEvent>,
}

impl InMemoryUsageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl UsageRepository for InMemoryUsageRepository {
    async fn create_usage_event(&self, request: &UsageEventCreateRequest) -> Result<UsageEvent> {
        let event = UsageEvent {
            id: Uuid::new_v4(),
            request_id: request.request_id,
            user_id: request.user_id,
            model_id: request.model_id.clone(),
            input_tokens: request.input_tokens,
            output_tokens: request.output_tokens,
            cached_tokens: request.cached_tokens,
            reasoning_tokens: request.reasoning_tokens,
            status: request.status,
            failure_stage: request.failure_stage,
            error_class: request.error_class.clone(),
            complete: request.complete,
            created_at: Utc::now(),
            duration_ms: request.duration_ms,
            input_cost_cents: None,
            output_cost_cents: None,
            total_cost_cents: None,
        };
        self.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn list_usage_events_for_cost_calculation(&self, limit: usize) -> Result<Vec<UsageEvent>> {
        let mut ready: Vec<UsageEvent> = self
            .events
            .iter()
            .filter(|entry| entry.ready_for_costing())
            .map(|entry| entry.value().clone())
            .collect();
        ready.sort_by_key(|event| event.created_at);
        ready.truncate(limit);
        Ok(ready)
    }

    async fn update_usage_event_cost(&self, id: UsageEventId, cost: &UsageCostUpdate) -> Result<UsageEvent> {
        let mut entry = self.events.get_mut(&id).ok_or(RepoError::NotFound)?;
        entry.input_cost_cents = Some(cost.input_cost_cents);
        entry.output_cost_cents = Some(cost.output_cost_cents);
        entry.total_cost_cents = Some(cost.total_cost_cents);
        Ok(entry.clone())
    }

    async fn list_costed_usage_events(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<UsageEvent>> {
        let mut events: Vec<UsageEvent> = self
            .events
            .iter()
            .filter(|entry| entry.total_cost_cents.is_some() && entry.created_at >= start && entry.created_at <= end)
            .map(|entry| entry.value().clone())
            .collect();
        events.sort_by_key(|event| event.created_at);
        Ok(events)
    }

    async fn list_recent_usage_events(&self, limit: usize) -> Result<Vec<UsageEvent>> {
        let mut events: Vec<UsageEvent> = self.events.iter().map(|entry| entry.value().clone()).collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        events.truncate(limit);
        Ok(events)
    }
}

#[derive(Default)]
pub struct InMemoryBillingRepository {
    summaries: DashMap<BillingSummaryId, BillingSummary>,
}

impl InMemoryBillingRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl BillingRepository for InMemoryBillingRepository {
    async fn list_billing_summaries_by_period(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<BillingSummary>> {
        let mut summaries: Vec<BillingSummary> = self
            .summaries
            .iter()
            .filter(|entry| entry.period_start == start && entry.period_end == end)
            .map(|entry| entry.value().clone())
            .collect();
        summaries.sort_by_key(|summary| summary.user_id);
        Ok(summaries)
    }

    async fn get_billing_summary(
        &self,
        user_id: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<BillingSummary>> {
        Ok(self
            .summaries
            .iter()
            .find(|entry| entry.user_id == user_id && entry.period_start == start && entry.period_end == end)
            .map(|entry| entry.value().clone()))
    }

    async fn create_billing_summary(&self, request: &BillingSummaryCreateRequest) -> Result<BillingSummary> {
        let existing = self
            .get_billing_summary(request.user_id, request.period_start, request.period_end)
            .await?;
        if existing.is_some() {
            return Err(RepoError::Conflict {
                message: format!(
                    "billing summary for user {} and period starting {} already exists",
                    request.user_id, request.period_start
                ),
            });
        }
        let now = Utc::now();
        let summary = BillingSummary {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            period_start: request.period_start,
            period_end: request.period_end,
            total_requests: request.total_requests,
            total_input_tokens: request.total_input_tokens,
            total_output_tokens: request.total_output_tokens,
            total_cost_cents: request.total_cost_cents,
            created_at: now,
            updated_at: now,
        };
        self.summaries.insert(summary.id, summary.clone());
        Ok(summary)
    }

    async fn update_billing_summary(&self, id: BillingSummaryId, request: &BillingSummaryUpdateRequest) -> Result<BillingSummary> {
        let mut entry = self.summaries.get_mut(&id).ok_or(RepoError::NotFound)?;
        entry.total_requests = request.total_requests;
        entry.total_input_tokens = request.total_input_tokens;
        entry.total_output_tokens = request.total_output_tokens;
        entry.total_cost_cents = request.total_cost_cents;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }
}

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: DashMap<String, Session>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn get_session(&self, token: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(token).map(|entry| entry.value().clone()))
    }

    async fn create_session(&self, session: &Session) -> Result<()> {
        self.sessions.insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn delete_session(&self, token: &str) -> Result<bool> {
        Ok(self.sessions.remove(token).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryTokenRepository {
    tokens: DashMap<ApiTokenId, ApiToken>,
}

impl InMemoryTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TokenRepository for InMemoryTokenRepository {
    async fn get_token_by_hash(&self, hash: &str) -> Result<Option<ApiToken>> {
        Ok(self
            .tokens
            .iter()
            .find(|entry| entry.token_hash == hash)
            .map(|entry| entry.value().clone()))
    }

    async fn create_token(&self, request: &ApiTokenCreateRequest) -> Result<ApiToken> {
        let token = ApiToken {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            name: request.name.clone(),
            token_hash: request.token_hash.clone(),
            created_at: Utc::now(),
            expires_at: request.expires_at,
        };
        self.tokens.insert(token.id, token.clone());
        Ok(token)
    }

    async fn delete_token(&self, id: ApiTokenId) -> Result<bool> {
        Ok(self.tokens.remove(&id).is_some())
    }

    async fn list_tokens_for_user(&self, user_id: UserId) -> Result<Vec<ApiToken>> {
        let mut tokens: Vec<ApiToken> = self
            .tokens
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        tokens.sort_by_key(|token| token.created_at);
        Ok(tokens)
    }
}
