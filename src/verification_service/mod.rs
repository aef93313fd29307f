//! VerificationService - ticket verification
//!
//! ## Responsibilities
//!
//! - Identifier normalization (trim, non-empty)
//! - Exact-match registration lookup
//! - Match/no-match result with bearer details
//!
//! ## Design
//!
//! - Stateless read: repeated calls with the same identifier return the
//!   same result while the store is unchanged
//! - No locking; concurrent calls are independent
//! - Single-use admission (opt-in) stamps `verified_at` with a conditional
//!   update, so only the first check-in of a ticket is admitted

mod types;

pub use types::*;

use crate::error::{Error, Result};
use crate::registration_store::RegistrationRepository;
use chrono::{SubsecRound, Utc};

/// Trim an identifier and reject empty input
pub fn normalize_identifier(raw: &str) -> Result<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidIdentifier(
            "identifier must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}

/// VerificationService instance
pub struct VerificationService {
    repo: RegistrationRepository,
    single_use: bool,
}

impl VerificationService {
    /// Create new VerificationService
    pub fn new(repo: RegistrationRepository, single_use: bool) -> Self {
        Self { repo, single_use }
    }

    /// Store backend name
    pub fn backend_name(&self) -> &'static str {
        self.repo.backend_name()
    }

    /// Verify a bearer identifier
    ///
    /// `NotFound` is returned as a negative result, never as an error.
    pub async fn verify(&self, identifier: &str) -> Result<VerificationResult> {
        let identifier = normalize_identifier(identifier)?;

        let Some(registration) = self.repo.find_by_identifier(identifier).await? else {
            tracing::info!(identifier = %identifier, "No registration for identifier");
            return Ok(VerificationResult::not_registered());
        };

        if !self.single_use {
            tracing::info!(
                identifier = %identifier,
                ticket_number = %registration.ticket_number,
                "Ticket verified"
            );
            return Ok(VerificationResult::registered(&registration));
        }

        // Stored as TIMESTAMP(3); stamp at the precision read back later
        let now = Utc::now().trunc_subsecs(3);
        if self.repo.mark_verified(identifier, now).await? {
            tracing::info!(
                identifier = %identifier,
                ticket_number = %registration.ticket_number,
                "Ticket verified and marked used"
            );
            let mut registration = registration;
            registration.verified_at = Some(now);
            return Ok(VerificationResult::registered(&registration));
        }

        // Lost the race or used earlier: report the stored stamp
        let stored = self
            .repo
            .find_by_identifier(identifier)
            .await?
            .unwrap_or(registration);

        tracing::warn!(
            identifier = %identifier,
            verified_at = ?stored.verified_at,
            "Ticket already used"
        );

        Ok(VerificationResult::already_checked_in(&stored))
    }
}

impl Verifier for VerificationService {
    async fn verify(
        &self,
        identifier: &str,
    ) -> std::result::Result<VerificationResult, VerifyError> {
        VerificationService::verify(self, identifier)
            .await
            .map_err(VerifyError::from)
    }
}
