//! Shared models and types for the check-in gate
//!
//! This module contains types shared across the client-side scanner and
//! the verification server to avoid circular dependencies.

use serde::{Deserialize, Serialize};

/// Failure taxonomy shared by capture, decoding, verification and acceptance.
///
/// Every failure path in the check-in flow resolves to one of these kinds,
/// paired with a user-facing remediation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    PermissionDenied,
    DeviceNotFound,
    DeviceBusy,
    InsecureContext,
    AcquisitionAborted,
    UnsupportedEnvironment,
    DecoderUnavailable,
    /// Valid negative verification, not a fault
    NotFound,
    InvalidIdentifier,
    NetworkError,
    ServerError,
    /// Acceptance requested from an unexpected prior state
    Conflict,
}

impl ErrorKind {
    /// Capture-acquisition failures, recoverable by re-opening the session
    pub fn is_capture_error(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied
                | Self::DeviceNotFound
                | Self::DeviceBusy
                | Self::InsecureContext
                | Self::AcquisitionAborted
                | Self::UnsupportedEnvironment
        )
    }

    /// Transport/server failures: the same candidate may be re-submitted
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError | Self::ServerError)
    }

    /// Action the UI offers next to the message
    pub fn retry_action(&self) -> RetryAction {
        match self {
            Self::PermissionDenied => RetryAction::ReopenCamera,
            Self::NetworkError | Self::ServerError => RetryAction::ResubmitCandidate,
            Self::NotFound | Self::InvalidIdentifier => RetryAction::NewAttempt,
            _ => RetryAction::None,
        }
    }

    /// User-facing remediation message
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::PermissionDenied => {
                "Camera access was denied. Allow camera access in the browser or device settings, then retry."
            }
            Self::DeviceNotFound => {
                "No camera was found. Connect a camera or use manual entry."
            }
            Self::DeviceBusy => {
                "The camera is in use by another application or scan. Close it and try again."
            }
            Self::InsecureContext => {
                "The camera can only be used over a secure (HTTPS) connection."
            }
            Self::AcquisitionAborted => {
                "Starting the camera was interrupted. Try scanning again."
            }
            Self::UnsupportedEnvironment => {
                "This device does not support camera capture. Use manual entry instead."
            }
            Self::DecoderUnavailable => {
                "The code reader is still loading. Keep the code in view or use manual entry."
            }
            Self::NotFound => "No registration was found for this ticket.",
            Self::InvalidIdentifier => "The identifier is empty or malformed.",
            Self::NetworkError => {
                "Could not reach the verification server. Check the connection and retry."
            }
            Self::ServerError => "The verification server reported an error. Retry in a moment.",
            Self::Conflict => "The record is not in a state that allows this action.",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::PermissionDenied => "permission denied",
            Self::DeviceNotFound => "device not found",
            Self::DeviceBusy => "device busy",
            Self::InsecureContext => "insecure context",
            Self::AcquisitionAborted => "acquisition aborted",
            Self::UnsupportedEnvironment => "unsupported environment",
            Self::DecoderUnavailable => "decoder unavailable",
            Self::NotFound => "not found",
            Self::InvalidIdentifier => "invalid identifier",
            Self::NetworkError => "network error",
            Self::ServerError => "server error",
            Self::Conflict => "conflict",
        };
        f.write_str(name)
    }
}

/// Recovery action offered alongside an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryAction {
    /// Nothing to offer besides manual entry
    None,
    /// Re-attempt capture acquisition
    ReopenCamera,
    /// Re-submit the already-detected candidate
    ResubmitCandidate,
    /// Start a fresh scan or manual entry
    NewAttempt,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store: String,
}
