//! API layer: handlers, wire models, and the OpenAPI document.

pub mod handlers;
pub mod models;

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::models::list_models,
        handlers::models::get_model,
        handlers::models::create_model,
        handlers::models::update_model,
        handlers::models::delete_model,
        handlers::credentials::list_credentials,
        handlers::credentials::get_credential,
        handlers::credentials::create_credential,
        handlers::credentials::update_credential,
        handlers::credentials::delete_credential,
        handlers::tokens::list_tokens,
        handlers::tokens::create_token,
        handlers::tokens::delete_token,
        handlers::catalog::list_catalog,
        handlers::cache::cache_stats,
        handlers::usage::list_usage_events,
        handlers::usage::list_billing_summaries,
    ),
    components(schemas(
        models::models::ModelCreate,
        models::models::ModelUpdate,
        models::models::ModelResponse,
        models::models::ModelCapabilitiesOverride,
        models::credentials::CredentialCreate,
        models::credentials::CredentialUpdate,
        models::credentials::CredentialResponse,
        models::tokens::ApiTokenCreate,
        models::tokens::ApiTokenCreated,
        models::tokens::ApiTokenResponse,
        models::catalog::CatalogEntryResponse,
        models::usage::UsageEventResponse,
        models::usage::BillingSummaryResponse,
        crate::store::models::ModelCapabilities,
        crate::store::models::UsageStatus,
        crate::store::models::FailureStage,
        crate::providers::CredentialKind,
    )),
    tags(
        (name = "models", description = "Model catalog management"),
        (name = "credentials", description = "Provider credential management"),
        (name = "tokens", description = "API token management"),
        (name = "catalog", description = "Hardcoded provider catalog"),
        (name = "cache", description = "Cache observability"),
        (name = "usage", description = "Usage events"),
        (name = "billing", description = "Billing summaries"),
    )
)]
pub struct ApiDoc;
