use crate::store::RepoError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

/// Why an authentication attempt was rejected.
///
/// The two reasons surface as distinct messages so that callers can tell
/// "send credentials" apart from "your credentials are wrong", but nothing
/// more detailed than that leaks out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// No credentials were presented at all
    MissingCredentials,
    /// Credentials were presented but did not authenticate
    InvalidCredentials,
}

/// Resource kinds used by [`Error::NotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Model,
    Credential,
    Provider,
    UsageEvent,
    BillingSummary,
    ApiToken,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::Model => write!(f, "model"),
            Resource::Credential => write!(f, "credential"),
            Resource::Provider => write!(f, "provider"),
            Resource::UsageEvent => write!(f, "usage event"),
            Resource::BillingSummary => write!(f, "billing summary"),
            Resource::ApiToken => write!(f, "API token"),
        }
    }
}

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided, or provided and invalid
    #[error("not authenticated")]
    Unauthenticated { reason: AuthFailure },

    /// Requested resource not found
    #[error("{resource} {id} not found")]
    NotFound { resource: Resource, id: String },

    /// A `model_reference` metadata entry that is not `provider:providerModelID`
    #[error("invalid model reference {reference:?}")]
    InvalidModelReference { reference: String },

    /// Credential-type discriminant outside the supported set, or one that
    /// disagrees with the credential record it points at
    #[error("unsupported credential type {kind:?}")]
    UnsupportedCredentialType { kind: String },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Provider dispatch failure (connection errors, non-2xx responses)
    #[error("upstream provider error: {message}")]
    Upstream { status: Option<u16>, message: String },

    /// Repository operation error
    #[error(transparent)]
    Repository(#[from] RepoError),

    /// Generic internal service error
    #[error("failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::InvalidModelReference { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::UnsupportedCredentialType { .. } => StatusCode::BAD_REQUEST,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Error::Repository(repo_err) => match repo_err {
                RepoError::NotFound => StatusCode::NOT_FOUND,
                RepoError::Conflict { .. } => StatusCode::CONFLICT,
                RepoError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { reason } => match reason {
                AuthFailure::MissingCredentials => "Authentication required".to_string(),
                AuthFailure::InvalidCredentials => "Invalid authentication credentials".to_string(),
            },
            Error::NotFound { resource, id } => format!("{resource} {id} not found"),
            Error::InvalidModelReference { reference } => {
                format!("Invalid model reference {reference:?}: expected provider:providerModelID")
            }
            Error::UnsupportedCredentialType { kind } => format!("Unsupported credential type {kind:?}"),
            Error::BadRequest { message } => message.clone(),
            Error::Upstream { status, .. } => match status {
                Some(status) => format!("Upstream provider returned status {status}"),
                None => "Upstream provider unreachable".to_string(),
            },
            Error::Repository(repo_err) => match repo_err {
                RepoError::NotFound => "Resource not found".to_string(),
                RepoError::Conflict { message } => message.clone(),
                RepoError::Other(_) => "Storage error occurred".to_string(),
            },
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Other(_) => "Internal server error".to_string(),
        }
    }

    /// Short classification label, recorded on failed usage events.
    pub fn class(&self) -> &'static str {
        match self {
            Error::Unauthenticated { .. } => "unauthenticated",
            Error::NotFound { .. } => "not_found",
            Error::InvalidModelReference { .. } => "invalid_model_reference",
            Error::UnsupportedCredentialType { .. } => "unsupported_credential_type",
            Error::BadRequest { .. } => "bad_request",
            Error::Upstream { .. } => "upstream_error",
            Error::Repository(_) => "repository_error",
            Error::Internal { .. } | Error::Other(_) => "internal_error",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Repository(RepoError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Upstream { .. } => {
                tracing::warn!("Upstream provider error: {}", self);
            }
            Error::Repository(_) => {
                tracing::warn!("Repository constraint error: {}", self);
            }
            Error::Unauthenticated { .. } => {
                tracing::info!("Authentication error: {}", self);
            }
            Error::BadRequest { .. }
            | Error::NotFound { .. }
            | Error::InvalidModelReference { .. }
            | Error::UnsupportedCredentialType { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        (self.status_code(), self.user_message()).into_response()
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Upstream {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::Unauthenticated {
                reason: AuthFailure::MissingCredentials
            }
            .status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::NotFound {
                resource: Resource::Model,
                id: "gpt-x".to_string()
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::InvalidModelReference {
                reference: "nope".to_string()
            }
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            Error::Repository(RepoError::Conflict {
                message: "duplicate".to_string()
            })
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::Upstream {
                status: Some(503),
                message: "unavailable".to_string()
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_missing_and_invalid_credentials_are_distinguishable() {
        let missing = Error::Unauthenticated {
            reason: AuthFailure::MissingCredentials,
        };
        let invalid = Error::Unauthenticated {
            reason: AuthFailure::InvalidCredentials,
        };
        assert_eq!(missing.status_code(), invalid.status_code());
        assert_ne!(missing.user_message(), invalid.user_message());
    }

    #[test]
    fn test_internal_details_do_not_leak() {
        let err = Error::Other(anyhow::anyhow!("secret connection string postgres://..."));
        assert!(!err.user_message().contains("postgres"));
    }
}
