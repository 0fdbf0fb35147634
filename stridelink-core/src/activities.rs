//! Authenticated proxy for the provider's activity API.
//!
//! This module provides [`ActivityProxy`], which obtains a valid access
//! token through the [`TokenManager`] and issues read/update calls
//! against the provider's activity endpoints, translating provider
//! errors into the local taxonomy.
//!
//! # Known limitation
//!
//! A provider-side 401 at call time (token valid locally but rejected by
//! the provider, e.g. clock skew or revocation) surfaces as
//! [`ActivityError::ProviderAuth`] and is NOT retried with a forced
//! refresh. There is deliberately no second-chance refresh-and-retry
//! loop in this design.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::SubjectId;
use crate::provider::ProviderConfig;
use crate::token_manager::{TokenError, TokenManager, PROVIDER_TIMEOUT};

/// Error type for activity proxy operations.
#[derive(Debug, Error)]
pub enum ActivityError {
    /// Token lifecycle failure, propagated unchanged so the caller can
    /// map it to "please (re)connect".
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The provider rejected a locally-valid token at call time.
    #[error("provider rejected the access token")]
    ProviderAuth,

    /// The provider rejected the request payload; its message is passed
    /// through. The provider is the source of truth for field-level
    /// validation.
    #[error("provider rejected the request: {message}")]
    Validation { message: String },

    /// The provider call exceeded its bounded timeout.
    #[error("provider call timed out")]
    ProviderTimeout,

    /// Transport failure or an unexpected provider response.
    #[error("provider error: {message}")]
    Provider { message: String },
}

/// Sport type of an activity.
///
/// The closed set mirrors the provider's enumeration; values outside it
/// are carried through as-is and left to the provider to reject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SportType {
    Run,
    TrailRun,
    VirtualRun,
    Ride,
    VirtualRide,
    Swim,
    Walk,
    Hike,
    AlpineSki,
    NordicSki,
    Rowing,
    Workout,
    WeightTraining,
    Yoga,
    #[serde(untagged)]
    Other(String),
}

impl SportType {
    /// Whether this value is inside the provider's fixed set.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

/// An activity record as returned by the provider.
///
/// Only the fields this system reads or mutates are typed; everything
/// else the provider sends is preserved and echoed back untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub sport_type: Option<SportType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date_local: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Partial update for an activity. Absent fields are left untouched.
///
/// No local validation beyond type coercion is performed; the provider
/// is the source of truth and its rejection surfaces as
/// [`ActivityError::Validation`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub sport_type: Option<SportType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date_local: Option<String>,
    /// Elapsed seconds, never negative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Meters, never negative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

/// Shape of the provider's error body on rejected requests.
#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Issues bearer-authenticated calls against the provider's activity API
/// on behalf of a linked subject.
pub struct ActivityProxy {
    tokens: Arc<TokenManager>,
    provider: ProviderConfig,
    http_client: reqwest::Client,
}

impl ActivityProxy {
    /// Create a new proxy over the given token manager and provider.
    pub fn new(tokens: Arc<TokenManager>, provider: ProviderConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            tokens,
            provider,
            http_client,
        }
    }

    /// Override the outbound provider timeout.
    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        self
    }

    /// List the subject's activities.
    pub async fn list_activities(
        &self,
        subject: &SubjectId,
    ) -> Result<Vec<Activity>, ActivityError> {
        let token = self.tokens.get_valid_access_token(subject).await?;

        let response = self
            .http_client
            .get(format!("{}/athlete/activities", self.provider.api_base))
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(map_transport_error)?;

        let response = check_status(response, false).await?;

        response.json().await.map_err(|e| ActivityError::Provider {
            message: format!("malformed activity list: {}", e),
        })
    }

    /// Apply a partial update to one of the subject's activities and
    /// return the updated record.
    pub async fn update_activity(
        &self,
        subject: &SubjectId,
        activity_id: u64,
        patch: &ActivityPatch,
    ) -> Result<Activity, ActivityError> {
        let token = self.tokens.get_valid_access_token(subject).await?;

        let response = self
            .http_client
            .put(format!("{}/activities/{}", self.provider.api_base, activity_id))
            .bearer_auth(token.expose())
            .json(patch)
            .send()
            .await
            .map_err(map_transport_error)?;

        let response = check_status(response, true).await?;

        response.json().await.map_err(|e| ActivityError::Provider {
            message: format!("malformed activity: {}", e),
        })
    }
}

/// Map a reqwest transport failure into the activity taxonomy.
fn map_transport_error(e: reqwest::Error) -> ActivityError {
    if e.is_timeout() {
        ActivityError::ProviderTimeout
    } else {
        ActivityError::Provider {
            message: format!("network error: {}", e),
        }
    }
}

/// Translate a non-success provider response into the local taxonomy.
///
/// When `reject_is_validation` is set, client errors other than 401 carry
/// the provider's own message through as a validation failure.
async fn check_status(
    response: reqwest::Response,
    reject_is_validation: bool,
) -> Result<reqwest::Response, ActivityError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ActivityError::ProviderAuth);
    }

    let message = provider_message(response).await.unwrap_or_else(|| status.to_string());

    if reject_is_validation && status.is_client_error() {
        return Err(ActivityError::Validation { message });
    }

    Err(ActivityError::Provider { message })
}

/// Best-effort extraction of the provider's error message.
async fn provider_message(response: reqwest::Response) -> Option<String> {
    let body = response.text().await.ok()?;
    if let Ok(parsed) = serde_json::from_str::<ProviderErrorBody>(&body) {
        if let Some(message) = parsed.message {
            return Some(message);
        }
    }
    if body.is_empty() {
        None
    } else {
        Some(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sport_type_serializes_as_provider_string() {
        assert_eq!(
            serde_json::to_value(SportType::Run).unwrap(),
            serde_json::json!("Run")
        );
        assert_eq!(
            serde_json::to_value(SportType::WeightTraining).unwrap(),
            serde_json::json!("WeightTraining")
        );
    }

    #[test]
    fn test_unknown_sport_type_passes_through_unmodified() {
        let parsed: SportType = serde_json::from_value(serde_json::json!("Unicycling")).unwrap();
        assert_eq!(parsed, SportType::Other("Unicycling".to_string()));
        assert!(!parsed.is_known());
        assert_eq!(
            serde_json::to_value(&parsed).unwrap(),
            serde_json::json!("Unicycling")
        );
    }

    #[test]
    fn test_patch_skips_absent_fields() {
        let patch = ActivityPatch {
            name: Some("Morning Run".to_string()),
            elapsed_time: Some(1800),
            ..Default::default()
        };
        let body = serde_json::to_value(&patch).unwrap();

        assert_eq!(body["name"], "Morning Run");
        assert_eq!(body["elapsed_time"], 1800);
        assert!(body.get("type").is_none());
        assert!(body.get("distance").is_none());
    }

    #[test]
    fn test_activity_preserves_unknown_fields() {
        let json = serde_json::json!({
            "id": 101,
            "name": "Evening Ride",
            "type": "Ride",
            "distance": 24000.5,
            "average_watts": 182.3
        });
        let activity: Activity = serde_json::from_value(json).unwrap();

        assert_eq!(activity.id, 101);
        assert_eq!(activity.sport_type, Some(SportType::Ride));
        assert_eq!(
            activity.extra.get("average_watts"),
            Some(&serde_json::json!(182.3))
        );

        let back = serde_json::to_value(&activity).unwrap();
        assert_eq!(back["average_watts"], serde_json::json!(182.3));
    }
}
