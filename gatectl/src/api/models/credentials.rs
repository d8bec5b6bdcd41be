//! API wire models for provider credentials.
//!
//! Responses never echo the secret; only its presence is implied by the
//! record existing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;

use crate::providers::CredentialKind;
use crate::store::models::{Credential, CredentialCreateRequest, CredentialUpdateRequest};
use crate::types::CredentialId;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CredentialCreate {
    pub name: String,
    pub kind: CredentialKind,
    pub api_key: String,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "uri")]
    pub base_url: Option<Url>,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default)]
    pub site_name: Option<String>,
}

impl From<CredentialCreate> for CredentialCreateRequest {
    fn from(create: CredentialCreate) -> Self {
        Self {
            name: create.name,
            kind: create.kind,
            api_key: create.api_key,
            base_url: create.base_url,
            site_url: create.site_url,
            site_name: create.site_name,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialUpdate {
    pub name: Option<String>,
    pub api_key: Option<String>,
    #[schema(value_type = Option<String>, format = "uri")]
    pub base_url: Option<Url>,
    pub site_url: Option<String>,
    pub site_name: Option<String>,
}

impl From<CredentialUpdate> for CredentialUpdateRequest {
    fn from(update: CredentialUpdate) -> Self {
        Self {
            name: update.name,
            api_key: update.api_key,
            base_url: update.base_url,
            site_url: update.site_url,
            site_name: update.site_name,
        }
    }
}

/// API response for a credential. The API key is withheld.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CredentialResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: CredentialId,
    pub name: String,
    pub kind: CredentialKind,
    #[schema(value_type = Option<String>, format = "uri")]
    pub base_url: Option<Url>,
    pub site_url: Option<String>,
    pub site_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Credential> for CredentialResponse {
    fn from(credential: Credential) -> Self {
        Self {
            id: credential.id,
            name: credential.name,
            kind: credential.kind,
            base_url: credential.base_url,
            site_url: credential.site_url,
            site_name: credential.site_name,
            created_at: credential.created_at,
            updated_at: credential.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_response_never_contains_the_secret() {
        let now = Utc::now();
        let credential = Credential {
            id: Uuid::new_v4(),
            name: "main".to_string(),
            kind: CredentialKind::OpenRouter,
            api_key: "sk-or-very-secret".to_string(),
            base_url: None,
            site_url: None,
            site_name: None,
            created_at: now,
            updated_at: now,
        };

        let response = CredentialResponse::from(credential);
        let serialized = serde_json::to_string(&response).unwrap();
        assert!(!serialized.contains("sk-or-very-secret"));
        assert!(!serialized.contains("api_key"));
    }
}
