//! API token management.
//!
//! Tokens belong to the authenticated caller. The secret is returned exactly
//! once, from the create call; only its hash is stored.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::AppState;
use crate::api::models::tokens::{ApiTokenCreate, ApiTokenCreated, ApiTokenResponse};
use crate::auth::AuthContext;
use crate::auth::token::{generate_api_token, hash_api_token};
use crate::errors::{Error, Resource, Result};
use crate::store::TokenRepository;
use crate::store::models::ApiTokenCreateRequest;
use crate::types::ApiTokenId;

#[utoipa::path(
    get,
    path = "/admin/api/v1/tokens",
    tag = "tokens",
    responses((status = 200, description = "The caller's API tokens", body = [ApiTokenResponse]))
)]
pub async fn list_tokens(State(state): State<AppState>, auth: AuthContext) -> Result<Json<Vec<ApiTokenResponse>>> {
    let tokens = state.tokens.list_tokens_for_user(auth.user_id).await?;
    Ok(Json(tokens.into_iter().map(ApiTokenResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/admin/api/v1/tokens",
    tag = "tokens",
    request_body = ApiTokenCreate,
    responses((status = 201, description = "Token created; the secret appears only here", body = ApiTokenCreated))
)]
pub async fn create_token(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(create): Json<ApiTokenCreate>,
) -> Result<(StatusCode, Json<ApiTokenCreated>)> {
    let secret = generate_api_token();
    let token = state
        .tokens
        .create_token(&ApiTokenCreateRequest {
            user_id: auth.user_id,
            name: create.name,
            token_hash: hash_api_token(&secret),
            expires_at: create.expires_at,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiTokenCreated {
            id: token.id,
            name: token.name,
            token: secret,
            expires_at: token.expires_at,
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/admin/api/v1/tokens/{id}",
    tag = "tokens",
    responses(
        (status = 204, description = "Token deleted"),
        (status = 404, description = "Token not found")
    )
)]
pub async fn delete_token(State(state): State<AppState>, auth: AuthContext, Path(id): Path<ApiTokenId>) -> Result<StatusCode> {
    // Callers can only delete their own tokens
    let owned = state
        .tokens
        .list_tokens_for_user(auth.user_id)
        .await?
        .iter()
        .any(|token| token.id == id);
    if !owned || !state.tokens.delete_token(id).await? {
        return Err(Error::NotFound {
            resource: Resource::ApiToken,
            id: id.to_string(),
        });
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::test_utils::authed_server;
    use serde_json::json;

    #[tokio::test]
    async fn test_minted_token_authenticates() {
        let (server, _state, token) = authed_server().await;

        let response = server
            .post("/admin/api/v1/tokens")
            .authorization_bearer(&token)
            .json(&json!({"name": "ci"}))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let created: serde_json::Value = response.json();
        let secret = created["token"].as_str().unwrap();
        assert!(secret.starts_with("gk-"));

        // The fresh secret works as a bearer credential
        server
            .get("/admin/api/v1/tokens")
            .authorization_bearer(secret)
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_listing_omits_secret_and_delete_revokes() {
        let (server, _state, token) = authed_server().await;

        let created: serde_json::Value = server
            .post("/admin/api/v1/tokens")
            .authorization_bearer(&token)
            .json(&json!({"name": "ci"}))
            .await
            .json();
        let id = created["id"].as_str().unwrap().to_string();
        let secret = created["token"].as_str().unwrap().to_string();

        let listed: serde_json::Value = server
            .get("/admin/api/v1/tokens")
            .authorization_bearer(&token)
            .await
            .json();
        assert!(listed.as_array().unwrap().iter().all(|t| t.get("token").is_none()));

        server
            .delete(&format!("/admin/api/v1/tokens/{id}"))
            .authorization_bearer(&token)
            .await
            .assert_status(axum::http::StatusCode::NO_CONTENT);

        // Revoked: the secret no longer authenticates
        server
            .get("/admin/api/v1/tokens")
            .authorization_bearer(&secret)
            .await
            .assert_status(axum::http::StatusCode::UNAUTHORIZED);
    }
}
