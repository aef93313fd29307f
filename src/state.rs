//! Application state
//!
//! Holds configuration and the shared services

use crate::application_service::{ApplicationRecord, ApplicationRepository, ApplicationService};
use crate::error::{Error, Result};
use crate::registration_store::{Registration, RegistrationRepository};
use crate::verification_service::VerificationService;
use serde::Deserialize;
use sqlx::mysql::MySqlPoolOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// MySQL URL; in-memory store when unset
    pub database_url: Option<String>,
    /// JSON seed for the in-memory store
    pub seed_path: Option<PathBuf>,
    /// Server port
    pub port: u16,
    /// Server host
    pub host: String,
    /// Stamp `verified_at` and admit each ticket once
    pub single_use_admission: bool,
    /// CORS preflight cache
    pub cors_max_age: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            seed_path: std::env::var("SEED_PATH").map(PathBuf::from).ok(),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            single_use_admission: std::env::var("SINGLE_USE_ADMISSION")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            cors_max_age: Duration::from_secs(
                std::env::var("CORS_MAX_AGE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
        }
    }
}

/// Seed file layout for the in-memory store
#[derive(Debug, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub registrations: Vec<Registration>,
    #[serde(default)]
    pub applications: Vec<ApplicationRecord>,
}

impl SeedData {
    /// Load seed JSON from disk
    pub async fn load(path: &std::path::Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let seed: SeedData = serde_json::from_str(&raw)?;

        tracing::info!(
            path = %path.display(),
            registrations = seed.registrations.len(),
            applications = seed.applications.len(),
            "Seed data loaded"
        );

        Ok(seed)
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// VerificationService (ticket lookups)
    pub verification: Arc<VerificationService>,
    /// ApplicationService (acceptance transitions)
    pub applications: Arc<ApplicationService>,
}

impl AppState {
    /// Assemble state from already-built repositories
    pub fn new(
        config: AppConfig,
        registrations: RegistrationRepository,
        applications: ApplicationRepository,
    ) -> Self {
        let verification = Arc::new(VerificationService::new(
            registrations,
            config.single_use_admission,
        ));
        let applications = Arc::new(ApplicationService::new(applications));

        Self {
            config,
            verification,
            applications,
        }
    }

    /// Connect the configured store and assemble state
    pub async fn connect(config: AppConfig) -> Result<Self> {
        if let Some(url) = &config.database_url {
            let pool = MySqlPoolOptions::new()
                .max_connections(10)
                .acquire_timeout(Duration::from_secs(10))
                .connect(url)
                .await
                .map_err(|e| Error::Config(format!("database connection failed: {}", e)))?;

            tracing::info!("Database connected");

            return Ok(Self::new(
                config,
                RegistrationRepository::mysql(pool.clone()),
                ApplicationRepository::mysql(pool),
            ));
        }

        let seed = match &config.seed_path {
            Some(path) => SeedData::load(path).await?,
            None => {
                tracing::warn!("DATABASE_URL and SEED_PATH unset, starting with an empty in-memory store");
                SeedData::default()
            }
        };

        Ok(Self::new(
            config,
            RegistrationRepository::in_memory(seed.registrations),
            ApplicationRepository::in_memory(seed.applications),
        ))
    }
}
