//! Durable config store over SQLite. Runtime-checked queries throughout
//! (`sqlx::query`, not the `query!` macro) since no database is available
//! at build time.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::error::Result;
use crate::store::types::{
    GlobalSettings, LoadedConfig, ProfileDefinition, ServiceCollection, ServiceRecord, UserRecord,
};
use crate::store::validate::{validate_name, validate_payload_size};
use crate::store::ConfigStore;

const BUSY_TIMEOUT_MS: u64 = 5000;

pub struct SqliteConfigStore {
    pool: SqlitePool,
}

impl SqliteConfigStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS upstream_services (
                id TEXT PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                config_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                config_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS secrets (
                id TEXT PRIMARY KEY,
                config_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS credentials (
                id TEXT PRIMARY KEY,
                config_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS profile_definitions (
                name TEXT PRIMARY KEY,
                config_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS service_collections (
                name TEXT PRIMARY KEY,
                config_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS user_tokens (
                user_id TEXT NOT NULL,
                service_id TEXT NOT NULL,
                config_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, service_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS global_settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                config_json TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_versions (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS system_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                level TEXT NOT NULL,
                source TEXT NOT NULL,
                message TEXT NOT NULL,
                metadata_json TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("INSERT OR IGNORE INTO schema_versions (version, applied_at) VALUES (1, ?)")
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn query_services(&self) -> Result<Vec<ServiceRecord>> {
        let rows = sqlx::query("SELECT id, name, config_json FROM upstream_services")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                let config_json: String = row.try_get("config_json")?;
                Ok(ServiceRecord {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    config: serde_json::from_str(&config_json)?,
                })
            })
            .collect()
    }

    async fn query_users(&self) -> Result<Vec<UserRecord>> {
        let rows = sqlx::query("SELECT id, name, config_json FROM users")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                let config_json: String = row.try_get("config_json")?;
                Ok(UserRecord {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    config: serde_json::from_str(&config_json)?,
                })
            })
            .collect()
    }

    async fn query_profile_definitions(&self) -> Result<Vec<ProfileDefinition>> {
        let rows = sqlx::query("SELECT name, config_json FROM profile_definitions")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                let config_json: String = row.try_get("config_json")?;
                Ok(ProfileDefinition {
                    name: row.try_get("name")?,
                    config: serde_json::from_str(&config_json)?,
                })
            })
            .collect()
    }

    /// Best-effort: a missing table or malformed row yields an empty vec,
    /// never an error.
    async fn query_collections(&self) -> Vec<ServiceCollection> {
        let result = sqlx::query("SELECT name, config_json FROM service_collections")
            .fetch_all(&self.pool)
            .await;

        match result {
            Ok(rows) => rows
                .into_iter()
                .filter_map(|row| {
                    let name: String = row.try_get("name").ok()?;
                    let config_json: String = row.try_get("config_json").ok()?;
                    let config: Value = serde_json::from_str(&config_json).ok()?;
                    Some(ServiceCollection { name, config })
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "collections query failed, returning empty (best-effort)");
                Vec::new()
            }
        }
    }

    /// Best-effort: same policy as `query_collections`.
    async fn query_global_settings(&self) -> GlobalSettings {
        let result = sqlx::query("SELECT config_json FROM global_settings WHERE id = 1")
            .fetch_optional(&self.pool)
            .await;

        match result {
            Ok(Some(row)) => {
                let config_json: String = match row.try_get("config_json") {
                    Ok(v) => v,
                    Err(_) => return GlobalSettings::default(),
                };
                serde_json::from_str(&config_json)
                    .map(|config| GlobalSettings {
                        config,
                        profile_definitions: Vec::new(),
                    })
                    .unwrap_or_default()
            }
            Ok(None) => GlobalSettings::default(),
            Err(e) => {
                warn!(error = %e, "global_settings query failed, returning default (best-effort)");
                GlobalSettings::default()
            }
        }
    }
}

#[async_trait]
impl ConfigStore for SqliteConfigStore {
    async fn upsert_service(&self, record: ServiceRecord) -> Result<()> {
        validate_name("service name", &record.name)?;
        let config_json = serde_json::to_string(&record.config)?;
        validate_payload_size(config_json.as_bytes())?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO upstream_services (id, name, config_json, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET config_json = excluded.config_json, updated_at = excluded.updated_at",
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&config_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_service(&self, name: &str) -> Result<Option<ServiceRecord>> {
        let row = sqlx::query("SELECT id, name, config_json FROM upstream_services WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            None => Ok(None),
            Some(row) => {
                let config_json: String = row.try_get("config_json")?;
                Ok(Some(ServiceRecord {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    config: serde_json::from_str(&config_json)?,
                }))
            }
        }
    }

    async fn list_services(&self) -> Result<Vec<ServiceRecord>> {
        self.query_services().await
    }

    async fn delete_service(&self, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM upstream_services WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_user(&self, record: UserRecord) -> Result<()> {
        validate_name("user name", &record.name)?;
        let config_json = serde_json::to_string(&record.config)?;
        validate_payload_size(config_json.as_bytes())?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO users (id, name, config_json, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET config_json = excluded.config_json, updated_at = excluded.updated_at",
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&config_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_secret(&self, record: crate::store::types::SecretRecord) -> Result<()> {
        validate_name("secret id", &record.id)?;
        let config_json = serde_json::to_string(&record.config)?;
        validate_payload_size(config_json.as_bytes())?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO secrets (id, config_json, created_at, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET config_json = excluded.config_json, updated_at = excluded.updated_at",
        )
        .bind(&record.id)
        .bind(&config_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_credential(&self, record: crate::store::types::CredentialRecord) -> Result<()> {
        validate_name("credential id", &record.id)?;
        let config_json = serde_json::to_string(&record.config)?;
        validate_payload_size(config_json.as_bytes())?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO credentials (id, config_json, created_at, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET config_json = excluded.config_json, updated_at = excluded.updated_at",
        )
        .bind(&record.id)
        .bind(&config_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_profile(&self, record: ProfileDefinition) -> Result<()> {
        validate_name("profile name", &record.name)?;
        let config_json = serde_json::to_string(&record.config)?;
        validate_payload_size(config_json.as_bytes())?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO profile_definitions (name, config_json, created_at, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET config_json = excluded.config_json, updated_at = excluded.updated_at",
        )
        .bind(&record.name)
        .bind(&config_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_collection(&self, record: ServiceCollection) -> Result<()> {
        validate_name("collection name", &record.name)?;
        let config_json = serde_json::to_string(&record.config)?;
        validate_payload_size(config_json.as_bytes())?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO service_collections (name, config_json, created_at, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET config_json = excluded.config_json, updated_at = excluded.updated_at",
        )
        .bind(&record.name)
        .bind(&config_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_token(&self, record: crate::store::types::UserToken) -> Result<()> {
        validate_name("user id", &record.user_id)?;
        validate_name("service id", &record.service_id)?;
        let config_json = serde_json::to_string(&record.config)?;
        validate_payload_size(config_json.as_bytes())?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO user_tokens (user_id, service_id, config_json, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(user_id, service_id) DO UPDATE SET
                config_json = excluded.config_json, updated_at = excluded.updated_at",
        )
        .bind(&record.user_id)
        .bind(&record.service_id)
        .bind(&config_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_global_settings(&self, config: Value) -> Result<()> {
        let config_json = serde_json::to_string(&config)?;
        validate_payload_size(config_json.as_bytes())?;

        sqlx::query(
            "INSERT INTO global_settings (id, config_json) VALUES (1, ?)
             ON CONFLICT(id) DO UPDATE SET config_json = excluded.config_json",
        )
        .bind(&config_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_log(&self, entry: crate::store::types::LogEntry) -> Result<()> {
        let metadata_json = serde_json::to_string(&entry.metadata)?;
        sqlx::query(
            "INSERT INTO system_logs (timestamp, level, source, message, metadata_json)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entry.timestamp.to_rfc3339())
        .bind(&entry.level)
        .bind(&entry.source)
        .bind(&entry.message)
        .bind(&metadata_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_logs(&self, limit: usize) -> Result<Vec<crate::store::types::LogEntry>> {
        let rows = sqlx::query(
            "SELECT timestamp, level, source, message, metadata_json FROM system_logs
             ORDER BY id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let timestamp: String = row.try_get("timestamp")?;
                let metadata_json: String = row.try_get("metadata_json")?;
                Ok(crate::store::types::LogEntry {
                    timestamp: chrono::DateTime::parse_from_rfc3339(&timestamp)
                        .map_err(|e| crate::error::GatewayError::PersistenceFailure(e.to_string()))?
                        .with_timezone(&Utc),
                    level: row.try_get("level")?,
                    source: row.try_get("source")?,
                    message: row.try_get("message")?,
                    metadata: serde_json::from_str(&metadata_json)?,
                })
            })
            .collect()
    }

    /// Fans out services/users/profile_definitions concurrently; the first
    /// error among those three aborts the load. Collections and
    /// global_settings are best-effort and never fail the load.
    async fn load(&self) -> Result<LoadedConfig> {
        let (services, users, profile_definitions) = tokio::try_join!(
            self.query_services(),
            self.query_users(),
            self.query_profile_definitions(),
        )?;

        let (collections, mut global_settings) =
            tokio::join!(self.query_collections(), self.query_global_settings());
        global_settings.profile_definitions = profile_definitions;

        Ok(LoadedConfig {
            services,
            users,
            global_settings,
            collections,
        })
    }
}
