//! Config and audit store: upstream services, users, secrets, credentials,
//! profile definitions, service collections, user tokens and global
//! settings, plus an audit log. Two backends share one trait: an in-memory
//! store for tests and a durable SQLite store for production.

pub mod memory;
pub mod sqlite;
pub mod types;
pub mod validate;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
pub use memory::InMemoryConfigStore;
pub use sqlite::SqliteConfigStore;
pub use types::{
    CredentialRecord, GlobalSettings, LoadedConfig, LogEntry, ProfileDefinition,
    ServiceCollection, ServiceRecord, SecretRecord, UserRecord, UserToken,
};

/// All writes upsert by the entity's unique key: services/users/profiles/
/// collections by `name`, secrets/credentials by `id`, tokens by the
/// `(user_id, service_id)` pair. Every return value is an owned, detached
/// clone: mutating it after the call never reaches back into storage.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn upsert_service(&self, record: ServiceRecord) -> Result<()>;
    async fn get_service(&self, name: &str) -> Result<Option<ServiceRecord>>;
    async fn list_services(&self) -> Result<Vec<ServiceRecord>>;
    async fn delete_service(&self, name: &str) -> Result<()>;

    async fn upsert_user(&self, record: UserRecord) -> Result<()>;
    async fn upsert_secret(&self, record: SecretRecord) -> Result<()>;
    async fn upsert_credential(&self, record: CredentialRecord) -> Result<()>;
    async fn upsert_profile(&self, record: ProfileDefinition) -> Result<()>;
    async fn upsert_collection(&self, record: ServiceCollection) -> Result<()>;
    async fn upsert_token(&self, record: UserToken) -> Result<()>;
    async fn upsert_global_settings(&self, config: Value) -> Result<()>;

    /// Fans out services/users/profile_definitions/collections/global-settings
    /// concurrently. Collections and global settings are best-effort: a
    /// missing table or malformed row yields empty/default, never an error.
    /// The other three propagate their first error.
    async fn load(&self) -> Result<LoadedConfig>;

    async fn append_log(&self, entry: LogEntry) -> Result<()>;
    async fn recent_logs(&self, limit: usize) -> Result<Vec<LogEntry>>;
}
