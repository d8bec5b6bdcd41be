//! Hardcoded provider catalog listing.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::api::models::catalog::CatalogEntryResponse;
use crate::auth::AuthContext;
use crate::errors::Result;

#[utoipa::path(
    get,
    path = "/admin/api/v1/catalog",
    tag = "catalog",
    responses((status = 200, description = "Known provider models", body = [CatalogEntryResponse]))
)]
pub async fn list_catalog(State(state): State<AppState>, _auth: AuthContext) -> Result<Json<Vec<CatalogEntryResponse>>> {
    let mut entries: Vec<CatalogEntryResponse> = state
        .catalog
        .iter()
        .map(|(reference, entry)| CatalogEntryResponse::from_entry(reference, entry))
        .collect();
    entries.sort_by(|a, b| a.reference.cmp(&b.reference));
    Ok(Json(entries))
}
