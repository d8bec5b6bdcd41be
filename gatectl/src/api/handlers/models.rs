//! Administrative model management.
//!
//! Creation applies catalog field inheritance when the request carries a
//! `model_reference` naming a known catalog entry. All writes go through the
//! (possibly cached) model repository, so the cache is invalidated before the
//! response is returned.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::AppState;
use crate::api::models::models::{ModelCapabilitiesOverride, ModelCreate, ModelResponse, ModelUpdate};
use crate::auth::AuthContext;
use crate::errors::{Error, Resource, Result};
use crate::store::models::ModelUpdateRequest;
use crate::store::{CredentialRepository, ModelRepository};

#[utoipa::path(
    get,
    path = "/admin/api/v1/models",
    tag = "models",
    responses((status = 200, description = "All models", body = [ModelResponse]))
)]
pub async fn list_models(State(state): State<AppState>, _auth: AuthContext) -> Result<Json<Vec<ModelResponse>>> {
    let models = state.models.get_all_models().await?;
    Ok(Json(models.into_iter().map(ModelResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/admin/api/v1/models/{id}",
    tag = "models",
    responses(
        (status = 200, description = "The model", body = ModelResponse),
        (status = 404, description = "Model not found")
    )
)]
pub async fn get_model(State(state): State<AppState>, _auth: AuthContext, Path(id): Path<String>) -> Result<Json<ModelResponse>> {
    let model = state.models.get_model_by_id(&id).await?.ok_or_else(|| Error::NotFound {
        resource: Resource::Model,
        id: id.clone(),
    })?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    post,
    path = "/admin/api/v1/models",
    tag = "models",
    request_body = ModelCreate,
    responses(
        (status = 201, description = "Model created", body = ModelResponse),
        (status = 404, description = "Referenced credential not found"),
        (status = 409, description = "Model id already exists"),
        (status = 422, description = "Malformed model reference")
    )
)]
pub async fn create_model(
    State(state): State<AppState>,
    _auth: AuthContext,
    Json(create): Json<ModelCreate>,
) -> Result<(StatusCode, Json<ModelResponse>)> {
    // The credential must exist before a model can point at it; its kind is
    // also the default for the model's discriminant
    let credential = state
        .credentials
        .get_credential(create.credential_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: Resource::Credential,
            id: create.credential_id.to_string(),
        })?;

    let request = create.resolve(&state.catalog, credential.kind)?;
    let model = state.models.create_model(&request).await?;
    Ok((StatusCode::CREATED, Json(model.into())))
}

#[utoipa::path(
    patch,
    path = "/admin/api/v1/models/{id}",
    tag = "models",
    request_body = ModelUpdate,
    responses(
        (status = 200, description = "Model updated", body = ModelResponse),
        (status = 404, description = "Model not found")
    )
)]
pub async fn update_model(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(id): Path<String>,
    Json(update): Json<ModelUpdate>,
) -> Result<Json<ModelResponse>> {
    // Capability overrides resolve against the model's current flags
    let current = state.models.get_model_by_id(&id).await?.ok_or_else(|| Error::NotFound {
        resource: Resource::Model,
        id: id.clone(),
    })?;

    let capabilities = if update.capabilities == ModelCapabilitiesOverride::default() {
        None
    } else {
        Some(update.capabilities.resolve(&current.capabilities))
    };

    let request = ModelUpdateRequest {
        name: update.name,
        input_token_price: update.input_token_price,
        output_token_price: update.output_token_price,
        capabilities,
        metadata: update.metadata,
    };

    let model = state.models.update_model(&id, &request).await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    delete,
    path = "/admin/api/v1/models/{id}",
    tag = "models",
    responses(
        (status = 204, description = "Model deleted"),
        (status = 404, description = "Model not found")
    )
)]
pub async fn delete_model(State(state): State<AppState>, _auth: AuthContext, Path(id): Path<String>) -> Result<StatusCode> {
    if !state.models.delete_model(&id).await? {
        return Err(Error::NotFound {
            resource: Resource::Model,
            id,
        });
    }
    Ok(StatusCode::NO_CONTENT)
}
