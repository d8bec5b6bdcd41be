//! Model reference parsing.
//!
//! The administrative convention for linking a model to a catalog entry is a
//! `model_reference` metadata value of the form `provider:providerModelID`.
//! The provider-side id may itself contain colons (OpenRouter variant tags
//! like `deepseek/deepseek-chat-v3-0324:free`), so splitting takes only the
//! first colon.

use crate::errors::{Error, Result};

/// Extract the provider-side model identifier from a model reference.
///
/// `"openrouter:deepseek/x:free"` yields `"deepseek/x:free"`; a reference
/// with no colon, or an empty one, is malformed.
pub fn extract_actual_model_id(reference: &str) -> Result<String> {
    match reference.split_once(':') {
        Some((_, actual)) => Ok(actual.to_string()),
        None => Err(Error::InvalidModelReference {
            reference: reference.to_string(),
        }),
    }
}

/// The provider half of a model reference.
pub fn extract_provider_id(reference: &str) -> Result<String> {
    match reference.split_once(':') {
        Some((provider, _)) => Ok(provider.to_string()),
        None => Err(Error::InvalidModelReference {
            reference: reference.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_takes_only_the_first_colon() {
        assert_eq!(
            extract_actual_model_id("openrouter:deepseek/x:free").unwrap(),
            "deepseek/x:free"
        );
        assert_eq!(extract_provider_id("openrouter:deepseek/x:free").unwrap(), "openrouter");
    }

    #[test]
    fn test_empty_provider_model_id_is_not_an_error() {
        assert_eq!(extract_actual_model_id("openrouter:").unwrap(), "");
    }

    #[test]
    fn test_missing_colon_is_malformed() {
        let err = extract_actual_model_id("no-colon-here").unwrap_err();
        assert!(matches!(err, Error::InvalidModelReference { reference } if reference == "no-colon-here"));
    }

    #[test]
    fn test_empty_reference_is_malformed() {
        assert!(extract_actual_model_id("").is_err());
    }
}
