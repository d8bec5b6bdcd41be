//! Cache observability.

use axum::Json;
use axum::extract::State;
use serde_json::json;

use crate::AppState;
use crate::auth::AuthContext;
use crate::errors::Result;

/// Cache statistics as a flat map. When caching is disabled the map contains
/// a single explanatory message instead.
#[utoipa::path(
    get,
    path = "/admin/api/v1/cache/stats",
    tag = "cache",
    responses((status = 200, description = "Cache sizes and TTLs, or a 'caching not enabled' message"))
)]
pub async fn cache_stats(State(state): State<AppState>, _auth: AuthContext) -> Result<Json<serde_json::Value>> {
    let stats = match &state.caches {
        Some(caches) => {
            let models = caches.models.stats();
            let credentials = caches.credentials.stats();
            json!({
                "model_cache_size": models.size,
                "model_cache_ttl_seconds": models.ttl.as_secs(),
                "credential_cache_size": credentials.size,
                "credential_cache_ttl_seconds": credentials.ttl.as_secs(),
            })
        }
        None => json!({"message": "caching not enabled"}),
    };
    Ok(Json(stats))
}
