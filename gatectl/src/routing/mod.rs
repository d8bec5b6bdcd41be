//! Model routing.
//!
//! [`ModelRouter`] resolves a logical model identifier to a ready-to-use
//! provider client: model record lookup, credential fetch, client
//! construction, and the alias rewrite that maps the caller-facing id to the
//! provider-side one when the model carries a `model_reference`.
//!
//! A legacy in-process alias table exists in parallel with the persisted
//! `model_reference` mechanism. The table is consulted first and maps the
//! incoming id to a stored model id; the resolved model's `model_reference`
//! then governs the provider-side rewrite, so the reference wins when both
//! apply. The table lives for the process lifetime only.

pub mod reference;

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::errors::{Error, Resource, Result};
use crate::providers::{ChunkStream, GenerateRequest, GenerateResponse, ProviderClient, build_provider_client};
use crate::store::models::Model;
use crate::store::{CredentialRepository, ModelRepository};
use reference::extract_actual_model_id;

/// A routed model: the resolved record plus the client to dispatch on.
pub struct RoutedModel {
    pub model: Model,
    pub client: Box<dyn ProviderClient>,
}

impl std::fmt::Debug for RoutedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutedModel")
            .field("model", &self.model)
            .field("client", &"<dyn ProviderClient>")
            .finish()
    }
}

pub struct ModelRouter {
    models: Arc<dyn ModelRepository>,
    credentials: Arc<dyn CredentialRepository>,
    http: reqwest::Client,
    /// Legacy alias table: user-chosen identifier -> stored model id
    aliases: RwLock<HashMap<String, String>>,
    alias_only: AtomicBool,
}

impl ModelRouter {
    pub fn new(models: Arc<dyn ModelRepository>, credentials: Arc<dyn CredentialRepository>, http: reqwest::Client) -> Self {
        Self {
            models,
            credentials,
            http,
            aliases: RwLock::new(HashMap::new()),
            alias_only: AtomicBool::new(false),
        }
    }

    /// Register a transient alias mapping `alias` to `target` (a stored model id).
    pub fn add_model_alias(&self, alias: impl Into<String>, target: impl Into<String>) {
        let mut aliases = self.aliases.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        aliases.insert(alias.into(), target.into());
    }

    /// Remove a transient alias. Returns whether it existed.
    pub fn remove_model_alias(&self, alias: &str) -> bool {
        let mut aliases = self.aliases.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        aliases.remove(alias).is_some()
    }

    /// When enabled, only identifiers registered in the alias table route,
    /// and `list_models` returns only alias targets.
    pub fn set_alias_only_mode(&self, enabled: bool) {
        self.alias_only.store(enabled, Ordering::SeqCst);
    }

    fn resolve_incoming_id(&self, model_id: &str) -> Result<String> {
        let aliases = self.aliases.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.alias_only.load(Ordering::SeqCst) && !aliases.contains_key(model_id) {
            return Err(Error::NotFound {
                resource: Resource::Model,
                id: model_id.to_string(),
            });
        }
        Ok(aliases.get(model_id).cloned().unwrap_or_else(|| model_id.to_string()))
    }

    /// Resolve `model_id` to a provider client.
    ///
    /// Lookup and resolution failures propagate unmodified; routing is never
    /// retried internally.
    #[instrument(skip(self))]
    pub async fn route_model(&self, model_id: &str) -> Result<RoutedModel> {
        let stored_id = self.resolve_incoming_id(model_id)?;

        let model = self
            .models
            .get_model_by_id(&stored_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: Resource::Model,
                id: model_id.to_string(),
            })?;

        let credential = self
            .credentials
            .get_credential(model.credential_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: Resource::Credential,
                id: model.credential_id.to_string(),
            })?;

        if credential.kind != model.credential_kind {
            return Err(Error::UnsupportedCredentialType {
                kind: format!(
                    "model {:?} expects {} but credential {} is {}",
                    model.id, model.credential_kind, credential.id, credential.kind
                ),
            });
        }

        let client = build_provider_client(&credential, &self.http)?;

        let client: Box<dyn ProviderClient> = match model.model_reference() {
            Some(model_reference) => {
                let actual = extract_actual_model_id(model_reference)?;
                debug!(model = model_id, actual = actual, "routing through model reference");
                Box::new(AliasRewritingClient::new(Box::new(client), model_id.to_string(), actual))
            }
            None => Box::new(client),
        };

        Ok(RoutedModel { model, client })
    }

    /// All routable models. In alias-only mode, only alias targets.
    pub async fn list_models(&self) -> Result<Vec<Model>> {
        let models = self.models.get_all_models().await?;
        if !self.alias_only.load(Ordering::SeqCst) {
            return Ok(models);
        }
        let aliases = self.aliases.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let targets: std::collections::HashSet<&String> = aliases.values().collect();
        Ok(models.into_iter().filter(|model| targets.contains(&model.id)).collect())
    }
}

/// Thin wrapper that rewrites the outgoing request's model identifier from
/// the user-facing alias to the actual provider identifier, only when it
/// matches the alias exactly. Everything else passes through unmodified.
pub struct AliasRewritingClient {
    inner: Box<dyn ProviderClient>,
    alias: String,
    actual: String,
}

impl AliasRewritingClient {
    pub fn new(inner: Box<dyn ProviderClient>, alias: String, actual: String) -> Self {
        Self { inner, alias, actual }
    }

    fn rewrite(&self, mut request: GenerateRequest) -> GenerateRequest {
        if request.model == self.alias {
            request.model = self.actual.clone();
        }
        request
    }
}

#[async_trait::async_trait]
impl ProviderClient for AliasRewritingClient {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        self.inner.generate(self.rewrite(request)).await
    }

    async fn generate_stream(&self, request: GenerateRequest) -> Result<ChunkStream> {
        self.inner.generate_stream(self.rewrite(request)).await
    }
}
