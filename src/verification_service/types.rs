//! VerificationService types
//!
//! Wire types for `POST /verify-ticket` and the verifier contract shared by
//! the in-process service and the HTTP client.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ErrorKind;
use crate::registration_store::Registration;

/// Verify request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    #[serde(alias = "nationalId")]
    pub identifier: String,
}

/// Verification result (produced per request, never persisted)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub registered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    /// Only set with single-use admission
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub already_checked_in: bool,
    pub message: String,
}

impl VerificationResult {
    /// Positive match
    pub fn registered(registration: &Registration) -> Self {
        Self {
            registered: true,
            name: Some(registration.name.clone()),
            email: Some(registration.email.clone()),
            ticket_number: Some(registration.ticket_number.clone()),
            verified_at: registration.verified_at,
            already_checked_in: false,
            message: format!("Ticket is valid. Welcome, {}!", registration.name),
        }
    }

    /// Registration exists but its single admission was already used
    pub fn already_checked_in(registration: &Registration) -> Self {
        let used_at = registration
            .verified_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "an earlier check-in".to_string());

        Self {
            already_checked_in: true,
            message: format!("Ticket was already used at {}", used_at),
            ..Self::registered(registration)
        }
    }

    /// Negative result (registration absent)
    pub fn not_registered() -> Self {
        Self {
            registered: false,
            name: None,
            email: None,
            ticket_number: None,
            verified_at: None,
            already_checked_in: false,
            message: "No registration found for this identifier".to_string(),
        }
    }

    /// Admit the bearer?
    pub fn admits(&self) -> bool {
        self.registered && !self.already_checked_in
    }
}

/// Verifier failure (a negative result is not a failure)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error: {0}")]
    Server(String),
}

impl VerifyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VerifyError::InvalidIdentifier(_) => ErrorKind::InvalidIdentifier,
            VerifyError::Network(_) => ErrorKind::NetworkError,
            VerifyError::Server(_) => ErrorKind::ServerError,
        }
    }
}

impl From<crate::error::Error> for VerifyError {
    fn from(e: crate::error::Error) -> Self {
        match e {
            crate::error::Error::InvalidIdentifier(msg) => VerifyError::InvalidIdentifier(msg),
            other => VerifyError::Server(other.to_string()),
        }
    }
}

/// Anything that can answer "is this identifier registered?"
///
/// Implemented by the in-process [`super::VerificationService`] and by the
/// HTTP [`crate::verify_client::VerifyClient`].
pub trait Verifier: Send + Sync + 'static {
    fn verify(
        &self,
        identifier: &str,
    ) -> impl Future<Output = Result<VerificationResult, VerifyError>> + Send;
}
