//! Doctor endpoint: an aggregate self-check of the gateway process.
//!
//! Produces a `DoctorReport` JSON contract served over HTTP: an internet
//! reachability probe, masked API-key presence checks, and OAuth
//! client-id/secret pairing checks, rolled up into one `degraded`/`ok`
//! status.

use std::time::Duration;

use serde::Serialize;

/// API key environment variables this gateway recognizes and reports on.
const RECOGNIZED_API_KEYS: &[&str] = &[
    "ANTHROPIC_API_KEY",
    "OPENAI_API_KEY",
    "OPENROUTER_API_KEY",
    "GROQ_API_KEY",
];

/// OAuth provider name prefixes checked for `<PROVIDER>_CLIENT_ID` /
/// `<PROVIDER>_CLIENT_SECRET` pairs.
const RECOGNIZED_OAUTH_PROVIDERS: &[&str] = &["GOOGLE", "GITHUB"];

/// URL probed for the `internet` sub-check. A 204 response from a
/// well-known connectivity-check endpoint, same role as a captive-portal
/// probe.
const INTERNET_PROBE_URL: &str = "https://www.gstatic.com/generate_204";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DoctorCheck {
    pub status: String,
    pub message: String,
}

impl DoctorCheck {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
        }
    }

    fn missing(message: impl Into<String>) -> Self {
        Self {
            status: "missing".to_string(),
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            status: "warning".to_string(),
            message: message.into(),
        }
    }

    fn info(message: impl Into<String>) -> Self {
        Self {
            status: "info".to_string(),
            message: message.into(),
        }
    }

    fn down(message: impl Into<String>) -> Self {
        Self {
            status: "down".to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorReport {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub checks: std::collections::BTreeMap<String, DoctorCheck>,
}

/// Mask an env-var value per the presence-reporting rule: `Present
/// (...last-4)` if longer than 4 characters, else bare `Present`.
fn mask_present(value: &str) -> String {
    if value.len() > 4 {
        format!("Present (...{})", &value[value.len() - 4..])
    } else {
        "Present".to_string()
    }
}

fn check_api_key(name: &str) -> DoctorCheck {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => DoctorCheck::ok(mask_present(&value)),
        _ => DoctorCheck::missing("missing"),
    }
}

fn check_oauth_provider(provider: &str) -> DoctorCheck {
    let id_set = std::env::var(format!("{provider}_CLIENT_ID"))
        .map(|v| !v.is_empty())
        .unwrap_or(false);
    let secret_set = std::env::var(format!("{provider}_CLIENT_SECRET"))
        .map(|v| !v.is_empty())
        .unwrap_or(false);

    match (id_set, secret_set) {
        (true, true) => DoctorCheck::ok("Configured"),
        (true, false) | (false, true) => {
            DoctorCheck::warning("Partial configuration (missing ID or Secret)")
        }
        (false, false) => DoctorCheck::info("Not configured"),
    }
}

async fn check_internet() -> DoctorCheck {
    let client = match reqwest::Client::builder().timeout(Duration::from_secs(3)).build() {
        Ok(client) => client,
        Err(e) => return DoctorCheck::down(format!("client build failed: {e}")),
    };

    match client.get(INTERNET_PROBE_URL).send().await {
        Ok(resp) if resp.status().is_success() || resp.status().is_redirection() => {
            DoctorCheck::ok("Reachable")
        }
        Ok(resp) => DoctorCheck::down(format!("unexpected status {}", resp.status())),
        Err(e) => DoctorCheck::down(format!("unreachable: {e}")),
    }
}

/// Run every sub-check and assemble the aggregate report. Top-level status
/// is `degraded` when any sub-check is not `ok`.
pub async fn run() -> DoctorReport {
    let mut checks = std::collections::BTreeMap::new();

    checks.insert("internet".to_string(), check_internet().await);

    for key in RECOGNIZED_API_KEYS {
        checks.insert(key.to_string(), check_api_key(key));
    }

    for provider in RECOGNIZED_OAUTH_PROVIDERS {
        checks.insert(format!("oauth_{provider}"), check_oauth_provider(provider));
    }

    let degraded = checks.values().any(|c| c.status != "ok");

    DoctorReport {
        status: if degraded { "degraded".to_string() } else { "ok".to_string() },
        timestamp: chrono::Utc::now(),
        checks,
    }
}
