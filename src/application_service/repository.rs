//! ApplicationService Repository
//!
//! Database access layer for application records

use super::types::*;
use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Application repository
#[derive(Clone)]
pub enum ApplicationRepository {
    MySql(MySqlPool),
    Memory(Arc<RwLock<HashMap<Uuid, ApplicationRecord>>>),
}

impl ApplicationRepository {
    const COLUMNS: &'static str = "id, status, name, email, phone, message, created_at, updated_at";

    /// Create MySQL-backed repository
    pub fn mysql(pool: MySqlPool) -> Self {
        Self::MySql(pool)
    }

    /// Create in-memory repository
    pub fn in_memory(records: impl IntoIterator<Item = ApplicationRecord>) -> Self {
        let map = records.into_iter().map(|r| (r.id, r)).collect();
        Self::Memory(Arc::new(RwLock::new(map)))
    }

    /// Get application by ID
    pub async fn find(&self, id: Uuid) -> Result<Option<ApplicationRecord>> {
        match self {
            Self::MySql(pool) => {
                let query = format!("SELECT {} FROM applications WHERE id = ?", Self::COLUMNS);
                let row = sqlx::query_as::<_, ApplicationRow>(&query)
                    .bind(id.to_string())
                    .fetch_optional(pool)
                    .await?;

                row.map(ApplicationRecord::try_from).transpose()
            }
            Self::Memory(map) => Ok(map.read().await.get(&id).cloned()),
        }
    }

    /// Conditional transition `pending -> accepted`
    ///
    /// Returns `true` only for the call that performed the transition; a
    /// record in any other state is left untouched.
    pub async fn accept_if_pending(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        match self {
            Self::MySql(pool) => {
                let result = sqlx::query(
                    "UPDATE applications SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
                )
                .bind(ApplicationStatus::Accepted.as_str())
                .bind(now)
                .bind(id.to_string())
                .bind(ApplicationStatus::Pending.as_str())
                .execute(pool)
                .await?;

                Ok(result.rows_affected() == 1)
            }
            Self::Memory(map) => {
                let mut map = map.write().await;
                match map.get_mut(&id) {
                    Some(record) if record.status == ApplicationStatus::Pending => {
                        record.status = ApplicationStatus::Accepted;
                        record.updated_at = now;
                        Ok(true)
                    }
                    _ => Ok(false),
                }
            }
        }
    }
}
