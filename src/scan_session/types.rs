//! ScanSession types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capture::CaptureConstraints;
use crate::decoder::DecodeOptions;
use crate::models::ErrorKind;
use crate::verification_service::VerificationResult;

/// Default verification timeout (10 seconds)
pub const DEFAULT_VERIFY_TIMEOUT_MS: u64 = 10_000;

/// Scan session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    RequestingCapture,
    /// Capture granted, sampler starting
    Streaming,
    Sampling,
    /// Candidate latched
    Detected { candidate: String },
    Verifying { candidate: String },
    Result(VerificationResult),
    Closed,
    Error(ErrorKind),
}

impl ScanState {
    pub fn name(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::RequestingCapture => "requesting_capture",
            ScanState::Streaming => "streaming",
            ScanState::Sampling => "sampling",
            ScanState::Detected { .. } => "detected",
            ScanState::Verifying { .. } => "verifying",
            ScanState::Result(_) => "result",
            ScanState::Closed => "closed",
            ScanState::Error(_) => "error",
        }
    }

    /// Closed or Error
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanState::Closed | ScanState::Error(_))
    }

    /// Whether the session currently holds the camera
    pub fn holds_capture(&self) -> bool {
        matches!(self, ScanState::Streaming | ScanState::Sampling)
    }
}

/// Scan session configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanConfig {
    pub constraints: CaptureConstraints,
    pub decode: DecodeOptions,
    /// Verification request timeout in milliseconds
    pub verify_timeout_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            constraints: CaptureConstraints::default(),
            decode: DecodeOptions::default(),
            verify_timeout_ms: DEFAULT_VERIFY_TIMEOUT_MS,
        }
    }
}

impl ScanConfig {
    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }
}

/// Session operation error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Cannot {action} while session is {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },

    #[error("Capture failed: {0}")]
    Capture(ErrorKind),
}

impl SessionError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            SessionError::InvalidState { .. } => None,
            SessionError::Capture(kind) => Some(*kind),
        }
    }
}
