//! Provider client layer.
//!
//! [`ProviderClient`] is the capability-polymorphic client the model router
//! hands back: a synchronous generate call plus a streaming one, both
//! parameterized by a model identifier string. The concrete implementation is
//! the OpenAI-compatible HTTP client in [`http`]; vendor-specific wire-format
//! translation beyond endpoint and auth-header differences lives outside this
//! crate.
//!
//! Supported credential types form a closed enum ([`CredentialKind`]) with
//! one client constructor per variant, dispatched exhaustively in
//! [`build_provider_client`] - adding a provider type means adding a variant
//! and the compiler points at every match that needs updating.

pub mod http;

pub use http::HttpProviderClient;

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::errors::{Error, Result};
use crate::store::models::Credential;

/// Supported provider credential types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    OpenRouter,
    OpenAi,
    Anthropic,
}

impl CredentialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKind::OpenRouter => "open_router",
            CredentialKind::OpenAi => "open_ai",
            CredentialKind::Anthropic => "anthropic",
        }
    }

    /// Default API endpoint for this credential type, used when the
    /// credential carries no `base_url` override.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            CredentialKind::OpenRouter => "https://openrouter.ai/api/v1",
            CredentialKind::OpenAi => "https://api.openai.com/v1",
            CredentialKind::Anthropic => "https://api.anthropic.com/v1",
        }
    }
}

impl std::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "open_router" => Ok(CredentialKind::OpenRouter),
            "open_ai" => Ok(CredentialKind::OpenAi),
            "anthropic" => Ok(CredentialKind::Anthropic),
            other => Err(Error::UnsupportedCredentialType {
                kind: other.to_string(),
            }),
        }
    }
}

/// One chat message. Content is kept as raw JSON so multi-part payloads
/// (vision inputs etc.) pass through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    pub role: String,
    #[schema(value_type = Object)]
    pub content: serde_json::Value,
}

/// An OpenAI-compatible generate request. Unknown fields are preserved in
/// `extra` and forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GenerateRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub stream: bool,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GenerateChoice {
    #[serde(default)]
    pub index: u32,
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PromptTokensDetails {
    #[serde(default)]
    pub cached_tokens: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CompletionTokensDetails {
    #[serde(default)]
    pub reasoning_tokens: Option<u64>,
}

/// Token accounting block as reported by the provider. Counts the provider
/// does not report deserialize to `None`, never zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UsageBlock {
    #[serde(default)]
    pub prompt_tokens: Option<u64>,
    #[serde(default)]
    pub completion_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens_details: Option<PromptTokensDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens_details: Option<CompletionTokensDetails>,
}

impl UsageBlock {
    pub fn token_usage(&self) -> TokenUsage {
        TokenUsage {
            input_tokens: self.prompt_tokens,
            output_tokens: self.completion_tokens,
            cached_tokens: self.prompt_tokens_details.as_ref().and_then(|d| d.cached_tokens),
            reasoning_tokens: self.completion_tokens_details.as_ref().and_then(|d| d.reasoning_tokens),
        }
    }
}

/// Flattened token counts for the usage recorder. Each count is optional:
/// absence means the provider did not report it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub cached_tokens: Option<u64>,
    pub reasoning_tokens: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GenerateResponse {
    #[serde(default)]
    pub id: String,
    pub model: String,
    #[serde(default)]
    pub choices: Vec<GenerateChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageBlock>,
}

/// One server-sent event from a streaming generate call, as raw JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateChunk {
    pub data: serde_json::Value,
}

impl GenerateChunk {
    /// Token usage if this chunk carries a usage block (providers send it on
    /// the final chunk, if at all).
    pub fn usage(&self) -> Option<TokenUsage> {
        let usage = self.data.get("usage")?;
        let block: UsageBlock = serde_json::from_value(usage.clone()).ok()?;
        Some(block.token_usage())
    }
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<GenerateChunk>> + Send>>;

/// A ready-to-use provider client.
#[async_trait::async_trait]
pub trait ProviderClient: Send + Sync {
    /// Synchronous generate call.
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse>;

    /// Streaming generate call.
    async fn generate_stream(&self, request: GenerateRequest) -> Result<ChunkStream>;
}

/// Construct the provider client for a credential. One constructor per
/// supported credential type; the match is exhaustive on purpose.
pub fn build_provider_client(credential: &Credential, http: &reqwest::Client) -> Result<HttpProviderClient> {
    match credential.kind {
        CredentialKind::OpenRouter => HttpProviderClient::open_router(http.clone(), credential),
        CredentialKind::OpenAi => HttpProviderClient::open_ai(http.clone(), credential),
        CredentialKind::Anthropic => HttpProviderClient::anthropic(http.clone(), credential),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_credential_kind_round_trip() {
        for kind in [CredentialKind::OpenRouter, CredentialKind::OpenAi, CredentialKind::Anthropic] {
            assert_eq!(kind.as_str().parse::<CredentialKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_credential_kind_is_unsupported() {
        let err = "azure".parse::<CredentialKind>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedCredentialType { kind } if kind == "azure"));
    }

    #[test]
    fn test_generate_request_preserves_unknown_fields() {
        let request: GenerateRequest = serde_json::from_value(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}],
            "top_p": 0.9,
            "seed": 7
        }))
        .unwrap();

        assert_eq!(request.extra.get("top_p"), Some(&json!(0.9)));

        let serialized = serde_json::to_value(&request).unwrap();
        assert_eq!(serialized.get("seed"), Some(&json!(7)));
    }

    #[test]
    fn test_usage_block_absent_counts_stay_unknown() {
        let block: UsageBlock = serde_json::from_value(json!({"completion_tokens": 5})).unwrap();
        let usage = block.token_usage();
        assert_eq!(usage.input_tokens, None);
        assert_eq!(usage.output_tokens, Some(5));
        assert_eq!(usage.cached_tokens, None);
    }

    #[test]
    fn test_chunk_usage_extraction() {
        let chunk = GenerateChunk {
            data: json!({
                "choices": [],
                "usage": {
                    "prompt_tokens": 12,
                    "completion_tokens": 34,
                    "completion_tokens_details": {"reasoning_tokens": 8}
                }
            }),
        };
        let usage = chunk.usage().unwrap();
        assert_eq!(usage.input_tokens, Some(12));
        assert_eq!(usage.output_tokens, Some(34));
        assert_eq!(usage.reasoning_tokens, Some(8));

        let bare = GenerateChunk { data: json!({"choices": []}) };
        assert!(bare.usage().is_none());
    }
}
