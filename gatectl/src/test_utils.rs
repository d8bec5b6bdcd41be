//! Shared test helpers: state construction, seeded records, and an
//! authenticated test server.

use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

use crate::auth::token::{generate_api_token, hash_api_token};
use crate::catalog::ProviderCatalog;
use crate::config::Config;
use crate::metering::UsageRecorder;
use crate::providers::CredentialKind;
use crate::routing::ModelRouter;
use crate::store::cached::{CachedCredentialRepository, CachedModelRepository};
use crate::store::memory::{
    InMemoryBillingRepository, InMemoryCredentialRepository, InMemoryModelRepository, InMemorySessionRepository,
    InMemoryTokenRepository, InMemoryUsageRepository,
};
use crate::store::models::{
    ApiTokenCreateRequest, Credential, CredentialCreateRequest, Model, ModelCapabilities, ModelCreateRequest,
    Session, MODEL_REFERENCE_KEY,
};
use crate::store::{BillingRepository, CredentialRepository, ModelRepository, SessionRepository, TokenRepository, UsageRepository};
use crate::types::UserId;
use crate::{AppState, RepoCaches, build_router};

pub fn test_config() -> Config {
    Config::default()
}

/// App state on in-memory repositories, honoring `config.cache.enabled`.
pub async fn create_test_state_with_config(config: Config) -> AppState {
    let model_store = Arc::new(InMemoryModelRepository::new());
    let credential_store = Arc::new(InMemoryCredentialRepository::new());

    let (models, credentials, caches): (Arc<dyn ModelRepository>, Arc<dyn CredentialRepository>, Option<Arc<RepoCaches>>) =
        if config.cache.enabled {
            let cached_models = Arc::new(CachedModelRepository::new(model_store, config.cache.model_ttl));
            let cached_credentials = Arc::new(CachedCredentialRepository::new(credential_store, config.cache.credential_ttl));
            let caches = Arc::new(RepoCaches {
                models: cached_models.clone(),
                credentials: cached_credentials.clone(),
            });
            (cached_models, cached_credentials, Some(caches))
        } else {
            (model_store, credential_store, None)
        };

    let usage: Arc<dyn UsageRepository> = Arc::new(InMemoryUsageRepository::new());
    let billing: Arc<dyn BillingRepository> = Arc::new(InMemoryBillingRepository::new());
    let sessions: Arc<dyn SessionRepository> = Arc::new(InMemorySessionRepository::new());
    let tokens: Arc<dyn TokenRepository> = Arc::new(InMemoryTokenRepository::new());

    let router = Arc::new(ModelRouter::new(models.clone(), credentials.clone(), reqwest::Client::new()));
    let recorder = UsageRecorder::new(usage.clone());

    AppState::builder()
        .config(config)
        .models(models)
        .credentials(credentials)
        .usage(usage)
        .billing(billing)
        .sessions(sessions)
        .tokens(tokens)
        .router(router)
        .recorder(recorder)
        .catalog(Arc::new(ProviderCatalog::builtin().clone()))
        .maybe_caches(caches)
        .build()
}

pub async fn create_test_state() -> AppState {
    create_test_state_with_config(test_config()).await
}

/// A live session for `user_id`, stored and returned.
pub async fn create_test_session(state: &AppState, user_id: UserId) -> Session {
    let session = Session {
        token: format!("sess-{}", Uuid::new_v4()),
        user_id,
        created_at: Utc::now(),
        expires_at: Utc::now() + Duration::hours(8),
    };
    state.sessions.create_session(&session).await.unwrap();
    session
}

/// A stored API token for `user_id`; returns the bearer secret.
pub async fn create_test_api_token(state: &AppState, user_id: UserId) -> String {
    let secret = generate_api_token();
    state
        .tokens
        .create_token(&ApiTokenCreateRequest {
            user_id,
            name: "test".to_string(),
            token_hash: hash_api_token(&secret),
            expires_at: None,
        })
        .await
        .unwrap();
    secret
}

pub async fn seed_credential(state: &AppState, kind: CredentialKind) -> Credential {
    state
        .credentials
        .create_credential(&CredentialCreateRequest {
            name: format!("test-{kind}"),
            kind,
            api_key: "sk-test".to_string(),
            base_url: None,
            site_url: None,
            site_name: None,
        })
        .await
        .unwrap()
}

/// An OpenRouter credential pointed at `base_url` (usually a wiremock server).
pub async fn seed_credential_with_base_url(state: &AppState, base_url: &str) -> Credential {
    state
        .credentials
        .create_credential(&CredentialCreateRequest {
            name: format!("test-{}", Uuid::new_v4()),
            kind: CredentialKind::OpenRouter,
            api_key: "sk-test".to_string(),
            base_url: Some(Url::parse(base_url).unwrap()),
            site_url: None,
            site_name: None,
        })
        .await
        .unwrap()
}

pub async fn seed_model(state: &AppState, id: &str, credential: &Credential, model_reference: Option<&str>) -> Model {
    let mut metadata = HashMap::new();
    if let Some(model_reference) = model_reference {
        metadata.insert(MODEL_REFERENCE_KEY.to_string(), model_reference.to_string());
    }
    state
        .models
        .create_model(&ModelCreateRequest {
            id: id.to_string(),
            name: id.to_string(),
            provider: "openrouter".to_string(),
            credential_id: credential.id,
            credential_kind: credential.kind,
            input_token_price: rust_decimal::Decimal::new(1, 6),
            output_token_price: rust_decimal::Decimal::new(2, 6),
            capabilities: ModelCapabilities {
                streaming: true,
                ..Default::default()
            },
            metadata,
        })
        .await
        .unwrap()
}

/// Test server plus state and a valid bearer secret for an arbitrary user.
pub async fn authed_server() -> (axum_test::TestServer, AppState, String) {
    authed_server_with_config(test_config()).await
}

pub async fn authed_server_with_config(config: Config) -> (axum_test::TestServer, AppState, String) {
    let state = create_test_state_with_config(config).await;
    let token = create_test_api_token(&state, Uuid::new_v4()).await;
    let server = axum_test::TestServer::new(build_router(state.clone())).expect("Failed to create test server");
    (server, state, token)
}
