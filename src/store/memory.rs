//! Process-local `ConfigStore` backed by a handful of `Mutex<HashMap<..>>`.
//! Used by tests and by any deployment that runs config-store-dependent
//! code without a SQLite file on disk.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::store::types::{
    CredentialRecord, GlobalSettings, LoadedConfig, LogEntry, ProfileDefinition,
    ServiceCollection, ServiceRecord, SecretRecord, UserRecord, UserToken,
};
use crate::store::validate::{validate_name, validate_payload_size};
use crate::store::ConfigStore;

#[derive(Default)]
struct State {
    services: HashMap<String, ServiceRecord>,
    users: HashMap<String, UserRecord>,
    secrets: HashMap<String, SecretRecord>,
    credentials: HashMap<String, CredentialRecord>,
    profiles: HashMap<String, ProfileDefinition>,
    collections: HashMap<String, ServiceCollection>,
    tokens: HashMap<(String, String), UserToken>,
    global_settings: Value,
    logs: Vec<LogEntry>,
}

#[derive(Default)]
pub struct InMemoryConfigStore {
    state: Mutex<State>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn payload_size(value: &Value) -> Result<()> {
        let encoded = serde_json::to_vec(value)?;
        validate_payload_size(&encoded)
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn upsert_service(&self, record: ServiceRecord) -> Result<()> {
        validate_name("service name", &record.name)?;
        Self::payload_size(&record.config)?;
        self.state
            .lock()
            .unwrap()
            .services
            .insert(record.name.clone(), record);
        Ok(())
    }

    async fn get_service(&self, name: &str) -> Result<Option<ServiceRecord>> {
        Ok(self.state.lock().unwrap().services.get(name).cloned())
    }

    async fn list_services(&self) -> Result<Vec<ServiceRecord>> {
        Ok(self.state.lock().unwrap().services.values().cloned().collect())
    }

    async fn delete_service(&self, name: &str) -> Result<()> {
        self.state.lock().unwrap().services.remove(name);
        Ok(())
    }

    async fn upsert_user(&self, record: UserRecord) -> Result<()> {
        validate_name("user name", &record.name)?;
        Self::payload_size(&record.config)?;
        self.state.lock().unwrap().users.insert(record.name.clone(), record);
        Ok(())
    }

    async fn upsert_secret(&self, record: SecretRecord) -> Result<()> {
        validate_name("secret id", &record.id)?;
        Self::payload_size(&record.config)?;
        self.state.lock().unwrap().secrets.insert(record.id.clone(), record);
        Ok(())
    }

    async fn upsert_credential(&self, record: CredentialRecord) -> Result<()> {
        validate_name("credential id", &record.id)?;
        Self::payload_size(&record.config)?;
        self.state
            .lock()
            .unwrap()
            .credentials
            .insert(record.id.clone(), record);
        Ok(())
    }

    async fn upsert_profile(&self, record: ProfileDefinition) -> Result<()> {
        validate_name("profile name", &record.name)?;
        Self::payload_size(&record.config)?;
        self.state.lock().unwrap().profiles.insert(record.name.clone(), record);
        Ok(())
    }

    async fn upsert_collection(&self, record: ServiceCollection) -> Result<()> {
        validate_name("collection name", &record.name)?;
        Self::payload_size(&record.config)?;
        self.state
            .lock()
            .unwrap()
            .collections
            .insert(record.name.clone(), record);
        Ok(())
    }

    async fn upsert_token(&self, record: UserToken) -> Result<()> {
        validate_name("user id", &record.user_id)?;
        validate_name("service id", &record.service_id)?;
        Self::payload_size(&record.config)?;
        let key = (record.user_id.clone(), record.service_id.clone());
        self.state.lock().unwrap().tokens.insert(key, record);
        Ok(())
    }

    async fn upsert_global_settings(&self, config: Value) -> Result<()> {
        Self::payload_size(&config)?;
        self.state.lock().unwrap().global_settings = config;
        Ok(())
    }

    async fn load(&self) -> Result<LoadedConfig> {
        let state = self.state.lock().unwrap();
        Ok(LoadedConfig {
            services: state.services.values().cloned().collect(),
            users: state.users.values().cloned().collect(),
            global_settings: GlobalSettings {
                config: state.global_settings.clone(),
                profile_definitions: state.profiles.values().cloned().collect(),
            },
            collections: state.collections.values().cloned().collect(),
        })
    }

    async fn append_log(&self, entry: LogEntry) -> Result<()> {
        self.state.lock().unwrap().logs.push(entry);
        Ok(())
    }

    async fn recent_logs(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let state = self.state.lock().unwrap();
        let len = state.logs.len();
        let start = len.saturating_sub(limit);
        Ok(state.logs[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn svc(name: &str) -> ServiceRecord {
        ServiceRecord {
            id: format!("id-{name}"),
            name: name.to_string(),
            config: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn upsert_by_name_overwrites() {
        let store = InMemoryConfigStore::new();
        store.upsert_service(svc("svcA")).await.unwrap();
        let mut updated = svc("svcA");
        updated.config = serde_json::json!({"v": 2});
        store.upsert_service(updated).await.unwrap();

        let all = store.list_services().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].config["v"], 2);
    }

    #[tokio::test]
    async fn returned_clones_do_not_mutate_storage() {
        let store = InMemoryConfigStore::new();
        store.upsert_service(svc("svcA")).await.unwrap();

        let mut fetched = store.get_service("svcA").await.unwrap().unwrap();
        fetched.config = serde_json::json!({"mutated": true});

        let refetched = store.get_service("svcA").await.unwrap().unwrap();
        assert_ne!(refetched.config, fetched.config);
    }

    #[tokio::test]
    async fn oversized_config_rejected() {
        let store = InMemoryConfigStore::new();
        let mut record = svc("svcA");
        record.config = serde_json::Value::String("a".repeat(11 * 1024 * 1024));
        assert!(store.upsert_service(record).await.is_err());
        assert!(store.list_services().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn load_aggregates_everything() {
        let store = InMemoryConfigStore::new();
        store.upsert_service(svc("svcA")).await.unwrap();
        store
            .upsert_user(UserRecord {
                id: "u1".to_string(),
                name: "alice".to_string(),
                config: serde_json::json!({}),
            })
            .await
            .unwrap();
        store
            .upsert_profile(ProfileDefinition {
                name: "default".to_string(),
                config: serde_json::json!({}),
            })
            .await
            .unwrap();
        store
            .upsert_collection(ServiceCollection {
                name: "core".to_string(),
                config: serde_json::json!({}),
            })
            .await
            .unwrap();
        store
            .upsert_global_settings(serde_json::json!({"theme": "dark"}))
            .await
            .unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.services.len(), 1);
        assert_eq!(loaded.users.len(), 1);
        assert_eq!(loaded.global_settings.profile_definitions.len(), 1);
        assert_eq!(loaded.collections.len(), 1);
        assert_eq!(loaded.global_settings.config["theme"], "dark");
    }

    #[tokio::test]
    async fn token_upsert_keys_on_user_and_service_pair() {
        let store = InMemoryConfigStore::new();
        store
            .upsert_token(UserToken {
                user_id: "u1".to_string(),
                service_id: "svcA".to_string(),
                config: serde_json::json!({"t": 1}),
            })
            .await
            .unwrap();
        store
            .upsert_token(UserToken {
                user_id: "u1".to_string(),
                service_id: "svcA".to_string(),
                config: serde_json::json!({"t": 2}),
            })
            .await
            .unwrap();
        assert_eq!(store.state.lock().unwrap().tokens.len(), 1);
    }

    #[tokio::test]
    async fn recent_logs_returns_most_recent_n() {
        let store = InMemoryConfigStore::new();
        for i in 0..5 {
            store
                .append_log(LogEntry {
                    timestamp: chrono::Utc::now(),
                    level: "info".to_string(),
                    source: "test".to_string(),
                    message: format!("event {i}"),
                    metadata: HashMap::new(),
                })
                .await
                .unwrap();
        }
        let recent = store.recent_logs(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "event 3");
        assert_eq!(recent[1].message, "event 4");
    }
}
