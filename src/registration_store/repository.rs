//! RegistrationStore Repository
//!
//! Database access layer for registrations. The MySQL variant is used in
//! production; the in-memory variant backs development seeds and tests.

use super::types::*;
use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Registration repository
#[derive(Clone)]
pub enum RegistrationRepository {
    MySql(MySqlPool),
    Memory(Arc<RwLock<HashMap<String, Registration>>>),
}

impl RegistrationRepository {
    const COLUMNS: &'static str = "identifier, name, email, ticket_number, verified_at";

    /// Create MySQL-backed repository
    pub fn mysql(pool: MySqlPool) -> Self {
        Self::MySql(pool)
    }

    /// Create in-memory repository keyed by identifier
    pub fn in_memory(records: impl IntoIterator<Item = Registration>) -> Self {
        let map = records
            .into_iter()
            .map(|r| (r.identifier.clone(), r))
            .collect();
        Self::Memory(Arc::new(RwLock::new(map)))
    }

    /// Backend name for health reporting
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::MySql(_) => "mysql",
            Self::Memory(_) => "memory",
        }
    }

    /// Exact-match lookup by identifier
    pub async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Registration>> {
        match self {
            Self::MySql(pool) => {
                let query = format!(
                    "SELECT {} FROM registrations WHERE identifier = ?",
                    Self::COLUMNS
                );
                let registration = sqlx::query_as::<_, Registration>(&query)
                    .bind(identifier)
                    .fetch_optional(pool)
                    .await?;

                Ok(registration)
            }
            Self::Memory(map) => Ok(map.read().await.get(identifier).cloned()),
        }
    }

    /// Stamp `verified_at` only if it is still unset
    ///
    /// Returns `true` when this call performed the stamp.
    pub async fn mark_verified(&self, identifier: &str, at: DateTime<Utc>) -> Result<bool> {
        match self {
            Self::MySql(pool) => {
                let result = sqlx::query(
                    "UPDATE registrations SET verified_at = ? WHERE identifier = ? AND verified_at IS NULL",
                )
                .bind(at)
                .bind(identifier)
                .execute(pool)
                .await?;

                Ok(result.rows_affected() == 1)
            }
            Self::Memory(map) => {
                let mut map = map.write().await;
                match map.get_mut(identifier) {
                    Some(r) if r.verified_at.is_none() => {
                        r.verified_at = Some(at);
                        Ok(true)
                    }
                    _ => Ok(false),
                }
            }
        }
    }
}
