//! Check-in view model

use serde::Serialize;

use crate::models::{ErrorKind, RetryAction};
use crate::scan_session::ScanState;
use crate::verification_service::{VerificationResult, VerifyError};

/// How the identifier entered the flow
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntrySource {
    Scan,
    Manual,
}

/// What the check-in surface shows
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum CheckinView {
    Idle,
    /// Waiting for camera permission or the first frame
    StartingCamera,
    Scanning,
    Verifying {
        identifier: String,
        source: EntrySource,
    },
    Admitted {
        result: VerificationResult,
    },
    /// Not registered, or admission already used
    NotAdmitted {
        result: VerificationResult,
    },
    Failed {
        kind: ErrorKind,
        message: String,
        retry: RetryAction,
    },
}

impl CheckinView {
    pub fn failed(kind: ErrorKind) -> Self {
        CheckinView::Failed {
            kind,
            message: kind.remediation().to_string(),
            retry: kind.retry_action(),
        }
    }

    pub fn from_result(result: VerificationResult) -> Self {
        if result.admits() {
            CheckinView::Admitted { result }
        } else {
            CheckinView::NotAdmitted { result }
        }
    }

    /// View for a finished verification attempt
    pub fn from_outcome(outcome: Result<VerificationResult, VerifyError>) -> Self {
        match outcome {
            Ok(result) => Self::from_result(result),
            Err(e) => Self::failed(e.kind()),
        }
    }

    /// View for a scan state; `None` keeps the current view
    pub fn from_scan_state(state: &ScanState) -> Option<Self> {
        let view = match state {
            ScanState::Idle => CheckinView::Idle,
            ScanState::RequestingCapture | ScanState::Streaming => CheckinView::StartingCamera,
            ScanState::Sampling => CheckinView::Scanning,
            ScanState::Detected { candidate } | ScanState::Verifying { candidate } => {
                CheckinView::Verifying {
                    identifier: candidate.clone(),
                    source: EntrySource::Scan,
                }
            }
            ScanState::Result(result) => Self::from_result(result.clone()),
            ScanState::Error(kind) => Self::failed(*kind),
            ScanState::Closed => return None,
        };
        Some(view)
    }

    /// Result or failure shown; the flow is waiting on the operator
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            CheckinView::Admitted { .. } | CheckinView::NotAdmitted { .. } | CheckinView::Failed { .. }
        )
    }
}
