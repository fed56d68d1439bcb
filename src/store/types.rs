//! Entities managed by the config store.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub id: String,
    pub name: String,
    pub config: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub config: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretRecord {
    pub id: String,
    pub config: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub id: String,
    pub config: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDefinition {
    pub name: String,
    pub config: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCollection {
    pub name: String,
    pub config: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserToken {
    pub user_id: String,
    pub service_id: String,
    pub config: Value,
}

/// Process-wide singleton row, profile definitions merged in on `Load`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GlobalSettings {
    pub config: Value,
    pub profile_definitions: Vec<ProfileDefinition>,
}

/// Aggregate snapshot returned by `Load`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoadedConfig {
    pub services: Vec<ServiceRecord>,
    pub users: Vec<UserRecord>,
    pub global_settings: GlobalSettings,
    pub collections: Vec<ServiceCollection>,
}

/// Audit-log row (`system_logs` table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: String,
    pub source: String,
    pub message: String,
    pub metadata: HashMap<String, String>,
}
