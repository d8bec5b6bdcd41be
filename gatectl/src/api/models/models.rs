//! API wire models for the model catalog.
//!
//! Capability flags on the wire are `Option<bool>`: an omitted (or `null`)
//! flag inherits from the referenced catalog entry, while an explicit `false`
//! always overrides an inherited `true`. That distinction is the reason these
//! are not plain booleans.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::catalog::ProviderCatalog;
use crate::errors::{Error, Result};
use crate::providers::CredentialKind;
use crate::routing::reference::extract_provider_id;
use crate::store::models::{MODEL_REFERENCE_KEY, Model, ModelCapabilities, ModelCreateRequest};
use crate::types::CredentialId;

/// Per-field capability overrides. `None` means "not mentioned": inherit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ModelCapabilitiesOverride {
    pub vision: Option<bool>,
    pub tools: Option<bool>,
    pub reasoning: Option<bool>,
    pub streaming: Option<bool>,
    pub max_input_tokens: Option<u32>,
    pub max_output_tokens: Option<u32>,
}

impl ModelCapabilitiesOverride {
    /// Resolve against a base, field by field: supplied values win, absent
    /// ones inherit.
    pub fn resolve(&self, base: &ModelCapabilities) -> ModelCapabilities {
        ModelCapabilities {
            vision: self.vision.unwrap_or(base.vision),
            tools: self.tools.unwrap_or(base.tools),
            reasoning: self.reasoning.unwrap_or(base.reasoning),
            streaming: self.streaming.unwrap_or(base.streaming),
            max_input_tokens: self.max_input_tokens.or(base.max_input_tokens),
            max_output_tokens: self.max_output_tokens.or(base.max_output_tokens),
        }
    }
}

/// Request body for creating a model.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ModelCreate {
    /// Caller-facing identifier, unique within the catalog
    pub id: String,
    /// Display name; inherited from the catalog entry when omitted
    #[serde(default)]
    pub name: Option<String>,
    #[schema(value_type = String, format = "uuid")]
    pub credential_id: CredentialId,
    /// Defaults to the referenced credential's type when omitted
    #[serde(default)]
    pub credential_kind: Option<CredentialKind>,
    /// `provider:providerModelID`; stored in metadata and used for catalog
    /// field inheritance and provider-side aliasing
    #[serde(default)]
    pub model_reference: Option<String>,
    /// Dollars per input token; inherited when omitted
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub input_token_price: Option<Decimal>,
    /// Dollars per output token; inherited when omitted
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub output_token_price: Option<Decimal>,
    #[serde(default)]
    pub capabilities: ModelCapabilitiesOverride,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ModelCreate {
    /// Resolve the request into a full create, applying catalog field
    /// inheritance when the reference names a known catalog entry.
    ///
    /// `credential_kind` is the type of the credential the request points at;
    /// a mismatching explicit kind is rejected here, before anything is
    /// written.
    pub fn resolve(self, catalog: &ProviderCatalog, credential_kind: CredentialKind) -> Result<ModelCreateRequest> {
        if self.id.is_empty() {
            return Err(Error::BadRequest {
                message: "model id must not be empty".to_string(),
            });
        }

        let kind = self.credential_kind.unwrap_or(credential_kind);
        if kind != credential_kind {
            return Err(Error::UnsupportedCredentialType {
                kind: format!("requested {kind} but credential is {credential_kind}"),
            });
        }

        let mut metadata = self.metadata;
        if let Some(model_reference) = self.model_reference {
            metadata.insert(MODEL_REFERENCE_KEY.to_string(), model_reference);
        }

        // A malformed reference fails creation outright; a well-formed one
        // that names no catalog entry simply inherits nothing.
        let provider = match metadata.get(MODEL_REFERENCE_KEY) {
            Some(model_reference) => extract_provider_id(model_reference)?,
            None => kind.as_str().to_string(),
        };
        let entry = metadata.get(MODEL_REFERENCE_KEY).and_then(|r| catalog.get(r));

        let name = self
            .name
            .filter(|name| !name.is_empty())
            .or_else(|| entry.map(|entry| entry.name.clone()))
            .unwrap_or_else(|| self.id.clone());
        let input_token_price = self
            .input_token_price
            .or_else(|| entry.map(|entry| entry.input_token_price))
            .unwrap_or(Decimal::ZERO);
        let output_token_price = self
            .output_token_price
            .or_else(|| entry.map(|entry| entry.output_token_price))
            .unwrap_or(Decimal::ZERO);
        let base_capabilities = entry.map(|entry| entry.capabilities.clone()).unwrap_or_default();
        let capabilities = self.capabilities.resolve(&base_capabilities);

        Ok(ModelCreateRequest {
            id: self.id,
            name,
            provider,
            credential_id: self.credential_id,
            credential_kind: kind,
            input_token_price,
            output_token_price,
            capabilities,
            metadata,
        })
    }
}

/// Request body for updating a model. Omitted fields stay untouched;
/// capability overrides are resolved against the model's current flags.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ModelUpdate {
    pub name: Option<String>,
    #[schema(value_type = Option<String>)]
    pub input_token_price: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub output_token_price: Option<Decimal>,
    pub capabilities: ModelCapabilitiesOverride,
    pub metadata: Option<HashMap<String, String>>,
}

/// API response for a model.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelResponse {
    pub id: String,
    pub name: String,
    pub provider: String,
    #[schema(value_type = String, format = "uuid")]
    pub credential_id: CredentialId,
    pub credential_kind: CredentialKind,
    /// Dollars per input token (string to preserve precision)
    #[schema(value_type = String)]
    pub input_token_price: Decimal,
    /// Dollars per output token (string to preserve precision)
    #[schema(value_type = String)]
    pub output_token_price: Decimal,
    pub capabilities: ModelCapabilities,
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Model> for ModelResponse {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            provider: model.provider,
            credential_id: model.credential_id,
            credential_kind: model.credential_kind,
            input_token_price: model.input_token_price,
            output_token_price: model.output_token_price,
            capabilities: model.capabilities,
            metadata: model.metadata,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
