//! Dataplane dispatch glue.
//!
//! The thin path between admission and the provider: authenticate, route the
//! requested model, dispatch (unary or streaming), and record exactly one
//! usage event for every request that actually dispatched. Requests rejected
//! before dispatch (unroutable model, bad credentials) leave no usage event
//! behind.

use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::AppState;
use crate::auth::AuthContext;
use crate::errors::{Error, Result};
use crate::metering::{DispatchOutcome, UsageRecorder};
use crate::providers::{ChunkStream, GenerateRequest, ProviderClient, TokenUsage};
use crate::routing::RoutedModel;
use crate::store::models::FailureStage;
use crate::types::{RequestId, UserId};

/// OpenAI-compatible chat completions endpoint.
#[instrument(skip_all, fields(model = %request.model, user = %auth.user_id))]
pub async fn chat_completions(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<GenerateRequest>,
) -> Result<Response> {
    let request_id = Uuid::new_v4();
    let model_id = request.model.clone();

    // Routing failures reject the request before any dispatch: no event
    let routed = state.router.route_model(&model_id).await?;

    if request.stream {
        stream_completion(&state, &auth, routed, request, request_id, model_id).await
    } else {
        unary_completion(&state, &auth, routed, request, request_id, model_id).await
    }
}

async fn unary_completion(
    state: &AppState,
    auth: &AuthContext,
    routed: RoutedModel,
    request: GenerateRequest,
    request_id: RequestId,
    model_id: String,
) -> Result<Response> {
    let started = std::time::Instant::now();

    match routed.client.generate(request).await {
        Ok(response) => {
            let usage = response.usage.as_ref().map(|block| block.token_usage());
            record(
                &state.recorder,
                DispatchOutcome::success(request_id, auth.user_id, model_id, usage, started.elapsed()),
            )
            .await;
            Ok(Json(response).into_response())
        }
        Err(err) => {
            record(
                &state.recorder,
                DispatchOutcome::failure(
                    request_id,
                    auth.user_id,
                    model_id,
                    None,
                    FailureStage::Dispatch,
                    err.class().to_string(),
                    started.elapsed(),
                ),
            )
            .await;
            Err(err)
        }
    }
}

async fn stream_completion(
    state: &AppState,
    auth: &AuthContext,
    routed: RoutedModel,
    request: GenerateRequest,
    request_id: RequestId,
    model_id: String,
) -> Result<Response> {
    let started = std::time::Instant::now();

    let stream = match routed.client.generate_stream(request).await {
        Ok(stream) => stream,
        Err(err) => {
            // The stream never got established: dispatch-stage failure
            record(
                &state.recorder,
                DispatchOutcome::failure(
                    request_id,
                    auth.user_id,
                    model_id,
                    None,
                    FailureStage::Dispatch,
                    err.class().to_string(),
                    started.elapsed(),
                ),
            )
            .await;
            return Err(err);
        }
    };

    let (tx, rx) = tokio::sync::mpsc::channel::<std::result::Result<Event, Infallible>>(16);
    let recorder = state.recorder.clone();
    let user_id = auth.user_id;

    tokio::spawn(async move {
        let outcome = relay_stream(stream, tx, request_id, user_id, model_id, started).await;
        record(&recorder, outcome).await;
    });

    Ok(Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default()).into_response())
}

/// Forward provider chunks to the client, collecting the trailing usage
/// block, and produce the dispatch outcome once the stream ends.
async fn relay_stream(
    mut stream: ChunkStream,
    tx: tokio::sync::mpsc::Sender<std::result::Result<Event, Infallible>>,
    request_id: RequestId,
    user_id: UserId,
    model_id: String,
    started: std::time::Instant,
) -> DispatchOutcome {
    let mut usage: Option<TokenUsage> = None;
    let mut failure: Option<String> = None;

    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => {
                if let Some(chunk_usage) = chunk.usage() {
                    usage = Some(chunk_usage);
                }
                let event = match Event::default().json_data(&chunk.data) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "dropping unserializable stream chunk");
                        continue;
                    }
                };
                if tx.send(Ok(event)).await.is_err() {
                    // Client went away; keep what the provider reported so far
                    break;
                }
            }
            Err(err) => {
                failure = Some(err.class().to_string());
                break;
            }
        }
    }

    match failure {
        None => {
            let _ = tx.send(Ok(Event::default().data("[DONE]"))).await;
            DispatchOutcome::success(request_id, user_id, model_id, usage, started.elapsed())
        }
        Some(error_class) => DispatchOutcome::failure(
            request_id,
            user_id,
            model_id,
            usage,
            FailureStage::Stream,
            error_class,
            started.elapsed(),
        ),
    }
}

/// Usage recording must never take the response down with it.
async fn record(recorder: &UsageRecorder, outcome: DispatchOutcome) {
    if let Err(e) = recorder.record(outcome).await {
        error!(error = %e, "failed to record usage event");
    }
}

/// One entry in the OpenAI-compatible model listing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoutableModel {
    pub id: String,
    pub object: String,
    pub owned_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoutableModelList {
    pub object: String,
    pub data: Vec<RoutableModel>,
}

/// OpenAI-compatible model listing, via the router (so alias-only mode is
/// respected).
pub async fn list_routable_models(State(state): State<AppState>, _auth: AuthContext) -> Result<Json<RoutableModelList>> {
    let models = state.router.list_models().await?;
    Ok(Json(RoutableModelList {
        object: "list".to_string(),
        data: models
            .into_iter()
            .map(|model| RoutableModel {
                id: model.id,
                object: "model".to_string(),
                owned_by: model.provider,
            })
            .collect(),
    }))
}
