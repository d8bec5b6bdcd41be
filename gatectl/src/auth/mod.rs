//! Request admission: the authentication chain every request passes through
//! before reaching business logic.
//!
//! Two stackable interceptors, order-sensitive:
//!
//! 1. **Session**: extracts a session token from the `Authorization: Bearer`
//!    header or the session cookie and looks it up in the session store. A
//!    hit attaches the resolved session and short-circuits the chain. A miss
//!    does *not* reject - session tokens and API tokens share the same
//!    header, so the request falls through to the next interceptor.
//! 2. **API token**: runs only when no session matched. Hashes the bearer
//!    token and looks it up against stored token records, verifying
//!    non-expiry. Missing and invalid credentials are rejected with distinct
//!    reasons.
//!
//! Both interceptors only read request head parts, so unary JSON and
//! SSE-streaming handlers get identical extraction and context attachment.
//! The resolved identity is an explicit [`AuthContext`] value, not an opaque
//! context key.

pub mod token;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::{debug, trace};

use crate::AppState;
use crate::errors::{AuthFailure, Error, Result};
use crate::store::models::{ApiToken, Session};
use crate::store::{SessionRepository, TokenRepository};
use crate::types::UserId;
use token::hash_api_token;

/// The identity a request was admitted with.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: UserId,
    pub method: AuthMethod,
}

/// Which interceptor admitted the request, carrying what it resolved.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    Session(Session),
    ApiToken(ApiToken),
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

fn cookie_session_token(parts: &Parts, cookie_name: &str) -> Option<String> {
    let cookie_header = parts.headers.get(axum::http::header::COOKIE)?;
    let cookie_str = cookie_header.to_str().ok()?;

    for cookie in cookie_str.split(';') {
        if let Some((name, value)) = cookie.trim().split_once('=') {
            if name == cookie_name {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Try session authentication.
///
/// Returns:
/// - `None`: no candidate token present, or no candidate matched a live
///   session (fall through to the token interceptor)
/// - `Some(Ok(ctx))`: a candidate resolved to a live session
/// - `Some(Err(error))`: the session store itself failed
async fn try_session_auth(parts: &Parts, state: &AppState) -> Option<Result<AuthContext>> {
    let mut candidates: Vec<String> = Vec::new();
    if let Some(bearer) = bearer_token(parts) {
        candidates.push(bearer.to_string());
    }
    if let Some(cookie_token) = cookie_session_token(parts, &state.config.auth.session.cookie_name) {
        candidates.push(cookie_token);
    }
    if candidates.is_empty() {
        return None;
    }

    let now = chrono::Utc::now();
    for candidate in candidates {
        match state.sessions.get_session(&candidate).await {
            Ok(Some(session)) if !session.is_expired(now) => {
                return Some(Ok(AuthContext {
                    user_id: session.user_id,
                    method: AuthMethod::Session(session),
                }));
            }
            // Unknown or expired token: same header could still be an API
            // token, so this is not a rejection
            Ok(_) => continue,
            Err(e) => return Some(Err(e.into())),
        }
    }
    None
}

/// Try bearer API token authentication. Terminal: a missing or invalid token
/// rejects the request.
async fn try_token_auth(parts: &Parts, state: &AppState) -> Result<AuthContext> {
    let Some(bearer) = bearer_token(parts) else {
        trace!("no bearer credentials presented");
        return Err(Error::Unauthenticated {
            reason: AuthFailure::MissingCredentials,
        });
    };

    let token = state
        .tokens
        .get_token_by_hash(&hash_api_token(bearer))
        .await?
        .ok_or(Error::Unauthenticated {
            reason: AuthFailure::InvalidCredentials,
        })?;

    if token.is_expired(chrono::Utc::now()) {
        trace!(token = %token.id, "rejected expired API token");
        return Err(Error::Unauthenticated {
            reason: AuthFailure::InvalidCredentials,
        });
    }

    Ok(AuthContext {
        user_id: token.user_id,
        method: AuthMethod::ApiToken(token),
    })
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        if let Some(result) = try_session_auth(parts, state).await {
            if let Ok(ctx) = &result {
                debug!(user = %ctx.user_id, "admitted via session");
            }
            return result;
        }

        let ctx = try_token_auth(parts, state).await?;
        debug!(user = %ctx.user_id, "admitted via API token");
        Ok(ctx)
    }
}
