//! Administrative credential management.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::AppState;
use crate::api::models::credentials::{CredentialCreate, CredentialResponse, CredentialUpdate};
use crate::auth::AuthContext;
use crate::errors::{Error, Resource, Result};
use crate::store::CredentialRepository;
use crate::types::CredentialId;

#[utoipa::path(
    get,
    path = "/admin/api/v1/credentials",
    tag = "credentials",
    responses((status = 200, description = "All credentials", body = [CredentialResponse]))
)]
pub async fn list_credentials(State(state): State<AppState>, _auth: AuthContext) -> Result<Json<Vec<CredentialResponse>>> {
    let credentials = state.credentials.list_credentials().await?;
    Ok(Json(credentials.into_iter().map(CredentialResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/admin/api/v1/credentials/{id}",
    tag = "credentials",
    responses(
        (status = 200, description = "The credential", body = CredentialResponse),
        (status = 404, description = "Credential not found")
    )
)]
pub async fn get_credential(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(id): Path<CredentialId>,
) -> Result<Json<CredentialResponse>> {
    let credential = state.credentials.get_credential(id).await?.ok_or_else(|| Error::NotFound {
        resource: Resource::Credential,
        id: id.to_string(),
    })?;
    Ok(Json(credential.into()))
}

#[utoipa::path(
    post,
    path = "/admin/api/v1/credentials",
    tag = "credentials",
    request_body = CredentialCreate,
    responses((status = 201, description = "Credential created", body = CredentialResponse))
)]
pub async fn create_credential(
    State(state): State<AppState>,
    _auth: AuthContext,
    Json(create): Json<CredentialCreate>,
) -> Result<(StatusCode, Json<CredentialResponse>)> {
    let credential = state.credentials.create_credential(&create.into()).await?;
    Ok((StatusCode::CREATED, Json(credential.into())))
}

#[utoipa::path(
    patch,
    path = "/admin/api/v1/credentials/{id}",
    tag = "credentials",
    request_body = CredentialUpdate,
    responses(
        (status = 200, description = "Credential updated", body = CredentialResponse),
        (status = 404, description = "Credential not found")
    )
)]
pub async fn update_credential(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(id): Path<CredentialId>,
    Json(update): Json<CredentialUpdate>,
) -> Result<Json<CredentialResponse>> {
    let credential = state.credentials.update_credential(id, &update.into()).await?;
    Ok(Json(credential.into()))
}

#[utoipa::path(
    delete,
    path = "/admin/api/v1/credentials/{id}",
    tag = "credentials",
    responses(
        (status = 204, description = "Credential deleted"),
        (status = 404, description = "Credential not found")
    )
)]
pub async fn delete_credential(State(state): State<AppState>, _auth: AuthContext, Path(id): Path<CredentialId>) -> Result<StatusCode> {
    if !state.credentials.delete_credential(id).await? {
        return Err(Error::NotFound {
            resource: Resource::Credential,
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
    async fn test_credential_crud_without_echoing_secret() {
        let (server, _state, token) = authed_server().await;

        let response = server
            .post("/admin/api/v1/credentials")
            .authorization_bearer(&token)
            .json(&json!({
                "name": "openrouter-main",
                "kind": "open_router",
                "api_key": "sk-or-secret",
                "site_name": "Gate"
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let created: serde_json::Value = response.json();
        assert_eq!(created["name"], "openrouter-main");
        assert!(created.get("api_key").is_none());

        let id = created["id"].as_str().unwrap().to_string();

        let response = server
            .patch(&format!("/admin/api/v1/credentials/{id}"))
            .authorization_bearer(&token)
            .json(&json!({"name": "renamed"}))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<serde_json::Value>()["name"], "renamed");

        server
            .delete(&format!("/admin/api/v1/credentials/{id}"))
            .authorization_bearer(&token)
            .await
            .assert_status(axum::http::StatusCode::NO_CONTENT);
        server
            .get(&format!("/admin/api/v1/credentials/{id}"))
            .authorization_bearer(&token)
            .await
            .assert_status(axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_credential_kind_is_rejected_at_the_boundary() {
        let (server, _state, token) = authed_server().await;

        let response = server
            .post("/admin/api/v1/credentials")
            .authorization_bearer(&token)
            .json(&json!({
                "name": "nope",
                "kind": "azure",
                "api_key": "k"
            }))
            .await;
        // serde rejects the unknown enum variant before any handler runs
        assert!(response.status_code().is_client_error());
    }
}
