//! ApplicationService data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Application status
///
/// The only transition this crate performs is `pending -> accepted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "withdrawn" => Some(Self::Withdrawn),
            _ => None,
        }
    }
}

impl Default for ApplicationStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    pub id: Uuid,
    #[serde(default)]
    pub status: ApplicationStatus,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for applications (status stored as VARCHAR)
#[derive(Debug, FromRow)]
pub(crate) struct ApplicationRow {
    pub id: String,
    pub status: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ApplicationRow> for ApplicationRecord {
    type Error = Error;

    fn try_from(row: ApplicationRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| Error::Database(format!("bad application id {}: {}", row.id, e)))?;
        let status = ApplicationStatus::parse(&row.status).ok_or_else(|| {
            Error::Database(format!("unknown application status {}", row.status))
        })?;

        Ok(Self {
            id,
            status,
            name: row.name,
            email: row.email,
            phone: row.phone,
            message: row.message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Result of a successful accept call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// This call moved the record out of `pending`
    Accepted { updated_at: DateTime<Utc> },
    /// Record was already accepted; nothing written
    AlreadyAccepted,
}

/// Accept response (for API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptResult {
    pub success: bool,
    pub message: String,
}

impl From<AcceptOutcome> for AcceptResult {
    fn from(outcome: AcceptOutcome) -> Self {
        let message = match outcome {
            AcceptOutcome::Accepted { .. } => "Application accepted",
            AcceptOutcome::AlreadyAccepted => "Application was already accepted",
        };
        Self {
            success: true,
            message: message.to_string(),
        }
    }
}
