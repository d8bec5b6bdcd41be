//! Hardcoded provider model catalog.
//!
//! A process-wide, immutable table of known provider models keyed by
//! `provider:providerModelID`. It is only ever used as an inheritance source
//! when a model is administratively created with a `model_reference`, and is
//! never mutated at runtime. Components receive it by reference at
//! construction instead of reaching for a global.

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::store::models::ModelCapabilities;

/// One known provider model: display name, per-token pricing and capability
/// flags that referencing models inherit field-by-field.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub name: String,
    /// Price per input token, in dollars
    pub input_token_price: Decimal,
    /// Price per output token, in dollars
    pub output_token_price: Decimal,
    pub capabilities: ModelCapabilities,
}

/// Immutable lookup table of [`CatalogEntry`] keyed by `provider:providerModelID`.
#[derive(Debug, Clone, Default)]
pub struct ProviderCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl ProviderCatalog {
    pub fn new(entries: impl IntoIterator<Item = (String, CatalogEntry)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// The built-in catalog of known provider models.
    pub fn builtin() -> &'static ProviderCatalog {
        static BUILTIN: Lazy<ProviderCatalog> = Lazy::new(builtin_catalog);
        &BUILTIN
    }

    pub fn get(&self, reference: &str) -> Option<&CatalogEntry> {
        self.entries.get(reference)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CatalogEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn chat_capabilities(vision: bool, reasoning: bool, max_input: u32, max_output: u32) -> ModelCapabilities {
    ModelCapabilities {
        vision,
        tools: true,
        reasoning,
        streaming: true,
        max_input_tokens: Some(max_input),
        max_output_tokens: Some(max_output),
    }
}

fn builtin_catalog() -> ProviderCatalog {
    // Prices are dollars per token (not per million)
    let entries = [
        (
            "openrouter:openai/gpt-4o".to_string(),
            CatalogEntry {
                name: "GPT-4o".to_string(),
                input_token_price: Decimal::new(25, 7),  // $2.50 / 1M
                output_token_price: Decimal::new(10, 6), // $10.00 / 1M
                capabilities: chat_capabilities(true, false, 128_000, 16_384),
            },
        ),
        (
            "openrouter:openai/gpt-4o-mini".to_string(),
            CatalogEntry {
                name: "GPT-4o mini".to_string(),
                input_token_price: Decimal::new(15, 8),
                output_token_price: Decimal::new(60, 8),
                capabilities: chat_capabilities(true, false, 128_000, 16_384),
            },
        ),
        (
            "openrouter:anthropic/claude-sonnet-4".to_string(),
            CatalogEntry {
                name: "Claude Sonnet 4".to_string(),
                input_token_price: Decimal::new(3, 6),
                output_token_price: Decimal::new(15, 6),
                capabilities: chat_capabilities(true, true, 200_000, 64_000),
            },
        ),
        (
            "openrouter:deepseek/deepseek-chat-v3-0324:free".to_string(),
            CatalogEntry {
                name: "DeepSeek V3 (free)".to_string(),
                input_token_price: Decimal::ZERO,
                output_token_price: Decimal::ZERO,
                capabilities: chat_capabilities(false, false, 163_840, 163_840),
            },
        ),
        (
            "openrouter:deepseek/deepseek-r1".to_string(),
            CatalogEntry {
                name: "DeepSeek R1".to_string(),
                input_token_price: Decimal::new(55, 8),
                output_token_price: Decimal::new(219, 8),
                capabilities: chat_capabilities(false, true, 163_840, 163_840),
            },
        ),
        (
            "openai:gpt-4o-mini".to_string(),
            CatalogEntry {
                name: "GPT-4o mini".to_string(),
                input_token_price: Decimal::new(15, 8),
                output_token_price: Decimal::new(60, 8),
                capabilities: chat_capabilities(true, false, 128_000, 16_384),
            },
        ),
        (
            "anthropic:claude-3-5-haiku-20241022".to_string(),
            CatalogEntry {
                name: "Claude 3.5 Haiku".to_string(),
                input_token_price: Decimal::new(8, 7),
                output_token_price: Decimal::new(4, 6),
                capabilities: chat_capabilities(false, false, 200_000, 8_192),
            },
        ),
    ];
    ProviderCatalog::new(entries)
}
