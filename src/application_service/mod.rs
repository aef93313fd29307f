//! ApplicationService - application acceptance
//!
//! ## Responsibilities
//!
//! - Validate application identifiers before lookup
//! - Idempotent `pending -> accepted` transition
//!
//! ## Design
//!
//! - Conditional update (only out of `pending`), never write-then-check
//! - Already accepted: success, nothing written
//! - Any other status: reported as conflict, nothing written

mod repository;
mod types;

pub use repository::ApplicationRepository;
pub use types::*;

use crate::error::{Error, Result};
use chrono::Utc;
use uuid::Uuid;

/// Parse an application identifier
pub fn parse_application_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| Error::InvalidIdentifier(format!("'{}' is not a valid application id", raw)))
}

/// ApplicationService instance
pub struct ApplicationService {
    repo: ApplicationRepository,
}

impl ApplicationService {
    /// Create new ApplicationService
    pub fn new(repo: ApplicationRepository) -> Self {
        Self { repo }
    }

    /// Get application by ID
    pub async fn get(&self, raw_id: &str) -> Result<ApplicationRecord> {
        let id = parse_application_id(raw_id)?;
        self.repo
            .find(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Application {} not found", id)))
    }

    /// Accept an application
    pub async fn accept(&self, raw_id: &str) -> Result<AcceptOutcome> {
        let id = parse_application_id(raw_id)?;
        let now = Utc::now();

        if self.repo.accept_if_pending(id, now).await? {
            tracing::info!(application_id = %id, "Application accepted");
            return Ok(AcceptOutcome::Accepted { updated_at: now });
        }

        match self.repo.find(id).await? {
            None => Err(Error::NotFound(format!("Application {} not found", id))),
            Some(record) if record.status == ApplicationStatus::Accepted => {
                tracing::debug!(application_id = %id, "Application already accepted");
                Ok(AcceptOutcome::AlreadyAccepted)
            }
            Some(record) => {
                tracing::warn!(
                    application_id = %id,
                    status = %record.status,
                    "Accept requested for non-pending application"
                );
                Err(Error::Conflict(format!(
                    "Application {} is {}, only pending applications can be accepted",
                    id, record.status
                )))
            }
        }
    }
}
