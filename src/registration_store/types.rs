//! RegistrationStore data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Registration entity
///
/// Created by the enrollment process; the check-in flow only reads it
/// (and, with single-use admission enabled, stamps `verified_at` once).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    /// National ID or equivalent unique key
    pub identifier: String,
    pub name: String,
    pub email: String,
    pub ticket_number: String,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
}
