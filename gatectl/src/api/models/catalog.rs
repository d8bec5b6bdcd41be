//! API wire model for the hardcoded provider catalog.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::catalog::CatalogEntry;
use crate::store::models::ModelCapabilities;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CatalogEntryResponse {
    /// `provider:providerModelID` key usable as a `model_reference`
    pub reference: String,
    pub name: String,
    #[schema(value_type = String)]
    pub input_token_price: Decimal,
    #[schema(value_type = String)]
    pub output_token_price: Decimal,
    pub capabilities: ModelCapabilities,
}

impl CatalogEntryResponse {
    pub fn from_entry(reference: &str, entry: &CatalogEntry) -> Self {
        Self {
            reference: reference.to_string(),
            name: entry.name.clone(),
            input_token_price: entry.input_token_price,
            output_token_price: entry.output_token_price,
            capabilities: entry.capabilities.clone(),
        }
    }
}
