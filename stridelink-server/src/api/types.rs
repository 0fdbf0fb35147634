//! API request/response types and HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use stridelink_core::{
    ActivityError, AuthFlowError, IdentityError, StoreError, TokenError,
};

/// Request body for `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// The identity provider's signed assertion.
    pub id_token: String,
}

/// Response body for `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// The stable subject identifier for this user.
    pub subject_id: String,
    /// Whether the account already has a delegated credential.
    pub linked: bool,
}

/// Query parameters of the provider's authorization callback.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// JSON error body returned on every failed API call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// API-boundary error carrying the HTTP mapping of the error taxonomy.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<IdentityError> for ApiError {
    fn from(e: IdentityError) -> Self {
        tracing::debug!("identity verification failed: {}", e);
        Self::unauthorized()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        tracing::error!("store failure: {}", e);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::NotLinked { .. } => {
                Self::new(StatusCode::BAD_REQUEST, "Provider not connected")
            }
            TokenError::RefreshFailed { .. } => Self::new(
                StatusCode::BAD_REQUEST,
                "Provider authorization expired, please reconnect",
            ),
            TokenError::ProviderTimeout => {
                Self::new(StatusCode::BAD_GATEWAY, "Provider timed out")
            }
            TokenError::Store(inner) => inner.into(),
        }
    }
}

impl From<ActivityError> for ApiError {
    fn from(e: ActivityError) -> Self {
        match e {
            ActivityError::Token(inner) => inner.into(),
            ActivityError::ProviderAuth => {
                Self::new(StatusCode::UNAUTHORIZED, "Provider rejected the access token")
            }
            ActivityError::Validation { message } => {
                Self::new(StatusCode::BAD_REQUEST, message)
            }
            ActivityError::ProviderTimeout => {
                Self::new(StatusCode::BAD_GATEWAY, "Provider timed out")
            }
            ActivityError::Provider { message } => {
                tracing::error!("provider failure: {}", message);
                Self::new(StatusCode::BAD_GATEWAY, "Provider error")
            }
        }
    }
}

impl From<AuthFlowError> for ApiError {
    fn from(e: AuthFlowError) -> Self {
        match e {
            AuthFlowError::MissingParameter { name } => Self::new(
                StatusCode::BAD_REQUEST,
                format!("missing required parameter: {}", name),
            ),
            AuthFlowError::AccountNotFound { .. } => {
                Self::new(StatusCode::BAD_REQUEST, "Unknown account")
            }
            AuthFlowError::ExchangeFailed { message } => {
                tracing::error!("code exchange failed: {}", message);
                Self::new(StatusCode::BAD_GATEWAY, "Authorization exchange failed")
            }
            AuthFlowError::ProviderTimeout => {
                Self::new(StatusCode::BAD_GATEWAY, "Provider timed out")
            }
            AuthFlowError::InvalidEndpoint { message } => {
                tracing::error!("provider endpoint misconfigured: {}", message);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AuthFlowError::Store(inner) => inner.into(),
        }
    }
}
