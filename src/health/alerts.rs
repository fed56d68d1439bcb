//! Alert dispatcher: delivers status-change webhooks as a JSON POST.
//!
//! No retry by design — duplicate-suppression upstream (the Checker's
//! prev/curr dedup) ensures at most one call per transition; if the
//! receiver is down during that call the event is simply lost.

use std::sync::RwLock;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::error;

use crate::health::types::Status;

const WEBHOOK_CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Webhook configuration, mutated independently of dispatch so the HTTP
/// call never happens while holding the config lock.
#[derive(Debug, Clone, Default)]
pub struct WebhookConfig {
    pub enabled: bool,
    pub url: String,
}

pub struct AlertDispatcher {
    config: RwLock<WebhookConfig>,
    client: reqwest::Client,
}

impl AlertDispatcher {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            config: RwLock::new(config),
            client: reqwest::Client::builder()
                .timeout(WEBHOOK_CLIENT_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(WebhookConfig::default())
    }

    pub fn set_config(&self, config: WebhookConfig) {
        *self.config.write().unwrap() = config;
    }

    /// The webhooks currently configured for dispatch, for callers (e.g.
    /// the topology builder) that need to list them rather than invoke
    /// them. Empty unless a webhook is both enabled and has a URL.
    pub fn configured_webhooks(&self) -> Vec<WebhookConfig> {
        let config = self.config.read().unwrap().clone();
        if config.enabled && !config.url.is_empty() {
            vec![config]
        } else {
            vec![]
        }
    }

    /// Dispatch a status-change alert. Failures (disabled, empty URL,
    /// non-2xx, transport error) are logged and swallowed — never
    /// propagated to the Checker.
    pub async fn dispatch(&self, service_name: &str, new_status: Status) {
        let config = {
            // Copy config out from under the lock before the HTTP call.
            let guard = self.config.read().unwrap();
            guard.clone()
        };

        if !config.enabled || config.url.is_empty() {
            return;
        }

        let body = json!({
            "event": "health_status_changed",
            "service": service_name,
            "status": new_status.as_str(),
            "timestamp": Utc::now().to_rfc3339(),
        });

        let result = self
            .client
            .post(&config.url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                error!(
                    service = service_name,
                    status = %response.status(),
                    "alert webhook returned non-2xx response"
                );
            }
            Err(e) => {
                error!(service = service_name, error = %e, "alert webhook request failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_config_is_noop() {
        let dispatcher = AlertDispatcher::disabled();
        // Should return immediately without attempting any network call.
        dispatcher.dispatch("svc", Status::Down).await;
    }

    #[tokio::test]
    async fn empty_url_is_noop() {
        let dispatcher = AlertDispatcher::new(WebhookConfig {
            enabled: true,
            url: String::new(),
        });
        dispatcher.dispatch("svc", Status::Down).await;
    }

    #[tokio::test]
    async fn unreachable_url_does_not_panic_or_propagate() {
        let dispatcher = AlertDispatcher::new(WebhookConfig {
            enabled: true,
            url: "http://127.0.0.1:1/webhook".to_string(),
        });
        dispatcher.dispatch("svc", Status::Up).await;
    }

    #[test]
    fn set_config_replaces_existing() {
        let dispatcher = AlertDispatcher::disabled();
        dispatcher.set_config(WebhookConfig {
            enabled: true,
            url: "http://example.com/hook".to_string(),
        });
        let config = dispatcher.config.read().unwrap();
        assert!(config.enabled);
        assert_eq!(config.url, "http://example.com/hook");
    }
}
