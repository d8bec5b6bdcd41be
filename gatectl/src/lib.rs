//! # gatectl: Multi-tenant Gateway Control Core for LLM Providers
//!
//! `gatectl` sits between client applications and multiple third-party LLM
//! providers, adding enterprise authentication, per-request billing, and
//! provider abstraction. Its core is the request admission, model-routing,
//! and usage-metering pipeline: the path every inbound inference request
//! takes from credential verification through provider dispatch to cost
//! accounting, plus the background jobs that turn raw usage into billing
//! data.
//!
//! ## Request Flow
//!
//! A request to `/ai/v1/chat/completions` first passes admission ([`auth`]):
//! a session interceptor (bearer header or cookie, looked up in the session
//! store; misses fall through rather than reject) followed by a bearer API
//! token interceptor (hash lookup, expiry check). The admitted request is
//! then routed ([`routing`]): the model record and its credential are
//! resolved through the (optionally cached) repositories, a provider client
//! is constructed for the credential's type, and, when the model carries a
//! `model_reference`, a thin wrapper rewrites the caller-facing model id to
//! the provider-side one. The dispatch glue forwards the call - unary or
//! SSE-streaming - and records one usage event per dispatched request.
//!
//! Background jobs ([`metering`]) run on a scheduler alongside the server:
//! the cost calculator prices uncosted events every few minutes, and the
//! billing aggregator rolls costed events into per-user daily and monthly
//! summaries.
//!
//! ## Persistence
//!
//! All storage is consumed through the repository traits in [`store`]; the
//! SQL implementations live outside this crate. The bundled in-memory
//! repositories back the self-contained development mode and the test suite.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use gatectl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = gatectl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     gatectl::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod metering;
pub mod providers;
pub mod routing;
pub mod store;
pub mod telemetry;
mod types;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;
pub use types::{ApiTokenId, BillingSummaryId, CredentialId, RequestId, UsageEventId, UserId};

use axum::{
    Json, Router,
    routing::{delete, get, post},
};
use bon::Builder;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info, instrument};
use utoipa::OpenApi;

use crate::api::ApiDoc;
use crate::catalog::ProviderCatalog;
use crate::config::CredentialSeed;
use crate::metering::{BillingAggregator, CostCalculator, MeteringScheduler, UsageRecorder};
use crate::routing::ModelRouter;
use crate::store::cached::{CachedCredentialRepository, CachedModelRepository};
use crate::store::memory::{
    InMemoryBillingRepository, InMemoryCredentialRepository, InMemoryModelRepository, InMemorySessionRepository,
    InMemoryTokenRepository, InMemoryUsageRepository,
};
use crate::store::models::CredentialCreateRequest;
use crate::store::{
    BillingRepository, CredentialRepository, ModelRepository, SessionRepository, TokenRepository, UsageRepository,
};

/// The cached repository adapters, kept concretely typed for the stats
/// endpoint and for stopping their sweep tasks on shutdown.
pub struct RepoCaches {
    pub models: Arc<CachedModelRepository>,
    pub credentials: Arc<CachedCredentialRepository>,
}

impl RepoCaches {
    /// Stop both eviction sweep tasks.
    pub fn close(&self) {
        self.models.close();
        self.credentials.close();
    }
}

/// Application state shared across all request handlers.
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub models: Arc<dyn ModelRepository>,
    pub credentials: Arc<dyn CredentialRepository>,
    pub usage: Arc<dyn UsageRepository>,
    pub billing: Arc<dyn BillingRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub tokens: Arc<dyn TokenRepository>,
    pub router: Arc<ModelRouter>,
    pub recorder: UsageRecorder,
    pub catalog: Arc<ProviderCatalog>,
    pub caches: Option<Arc<RepoCaches>>,
}

/// Create credentials declared in configuration, skipping names that already
/// exist. Idempotent across restarts with a persistent store.
#[instrument(skip_all)]
pub async fn seed_credentials(repo: &dyn CredentialRepository, seeds: &[CredentialSeed]) -> errors::Result<()> {
    if seeds.is_empty() {
        return Ok(());
    }
    let existing = repo.list_credentials().await?;

    for seed in seeds {
        if existing.iter().any(|credential| credential.name == seed.name) {
            continue;
        }
        let created = repo
            .create_credential(&CredentialCreateRequest {
                name: seed.name.clone(),
                kind: seed.kind,
                api_key: seed.api_key.clone(),
                base_url: seed.base_url.clone(),
                site_url: seed.site_url.clone(),
                site_name: seed.site_name.clone(),
            })
            .await?;
        info!(credential = %created.id, name = %created.name, kind = %created.kind, "seeded provider credential");
    }
    Ok(())
}

/// Build the application router with all endpoints and middleware.
pub fn build_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route(
            "/models",
            get(api::handlers::models::list_models).post(api::handlers::models::create_model),
        )
        .route(
            "/models/{id}",
            get(api::handlers::models::get_model)
                .patch(api::handlers::models::update_model)
                .delete(api::handlers::models::delete_model),
        )
        .route(
            "/credentials",
            get(api::handlers::credentials::list_credentials).post(api::handlers::credentials::create_credential),
        )
        .route(
            "/credentials/{id}",
            get(api::handlers::credentials::get_credential)
                .patch(api::handlers::credentials::update_credential)
                .delete(api::handlers::credentials::delete_credential),
        )
        .route(
            "/tokens",
            get(api::handlers::tokens::list_tokens).post(api::handlers::tokens::create_token),
        )
        .route("/tokens/{id}", delete(api::handlers::tokens::delete_token))
        .route("/catalog", get(api::handlers::catalog::list_catalog))
        .route("/cache/stats", get(api::handlers::cache::cache_stats))
        .route("/usage/events", get(api::handlers::usage::list_usage_events))
        .route("/billing/summaries", get(api::handlers::usage::list_billing_summaries))
        .with_state(state.clone());

    let ai_routes = Router::new()
        .route("/chat/completions", post(api::handlers::completions::chat_completions))
        .route("/models", get(api::handlers::completions::list_routable_models))
        .with_state(state.clone());

    Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .nest("/admin/api/v1", admin_routes)
        .nest("/ai/v1", ai_routes)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Main application struct owning the router, shared state, and background
/// services.
///
/// 1. **Create**: [`Application::new`] wires the repositories (cached when
///    enabled), seeds configured credentials, and starts the metering
///    scheduler.
/// 2. **Serve**: [`Application::serve`] binds the listener and runs until the
///    shutdown future resolves.
/// 3. **Shutdown**: background services are drained before `serve` returns.
pub struct Application {
    router: Router,
    state: AppState,
    scheduler: MeteringScheduler,
    shutdown_token: CancellationToken,
}

impl Application {
    /// Create a new application instance with all resources initialized.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        config.validate().map_err(|e| anyhow::anyhow!(e.user_message()))?;

        let model_store = Arc::new(InMemoryModelRepository::new());
        let credential_store = Arc::new(InMemoryCredentialRepository::new());

        seed_credentials(credential_store.as_ref(), &config.credentials)
            .await
            .map_err(|e| anyhow::anyhow!("failed to seed credentials: {e}"))?;

        // Wrap the read-path repositories with the TTL cache when enabled
        let (models, credentials, caches): (Arc<dyn ModelRepository>, Arc<dyn CredentialRepository>, Option<Arc<RepoCaches>>) =
            if config.cache.enabled {
                let cached_models = Arc::new(CachedModelRepository::new(model_store.clone(), config.cache.model_ttl));
                let cached_credentials = Arc::new(CachedCredentialRepository::new(
                    credential_store.clone(),
                    config.cache.credential_ttl,
                ));
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

        let http = reqwest::Client::builder()
            .timeout(config.dispatch.request_timeout)
            .build()?;
        let router = Arc::new(ModelRouter::new(models.clone(), credentials.clone(), http));
        let recorder = UsageRecorder::new(usage.clone());

        let cost = Arc::new(CostCalculator::new(usage.clone(), models.clone(), config.metering.cost_batch_size));
        let aggregator = Arc::new(BillingAggregator::new(usage.clone(), billing.clone()));
        let mut scheduler = MeteringScheduler::new(cost, aggregator, config.metering.clone());

        let shutdown_token = CancellationToken::new();
        scheduler.start(shutdown_token.clone());

        let state = AppState::builder()
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
            .build();

        let router = build_router(state.clone());

        Ok(Self {
            router,
            state,
            scheduler,
            shutdown_token,
        })
    }

    /// Start serving until `shutdown` resolves, then drain background
    /// services.
    pub async fn serve<F>(mut self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.state.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("gateway control core listening on http://{bind_addr}");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("shutting down background services...");
        self.shutdown_token.cancel();
        self.scheduler.stop().await;
        if let Some(caches) = &self.state.caches {
            caches.close();
        }

        Ok(())
    }
}
