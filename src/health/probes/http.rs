//! HTTP health probe, guarded by the SSRF check before dial.

use std::time::{Duration, Instant};

use url::Url;

use super::ProbeContext;
use crate::health::ssrf;
use crate::health::types::{HttpParams, ProbeOutcome};

pub async fn probe(ctx: &ProbeContext, params: &HttpParams, timeout: Duration) -> ProbeOutcome {
    let start = Instant::now();

    let url = match Url::parse(&params.url) {
        Ok(u) => u,
        Err(e) => return ProbeOutcome::failure(elapsed_ms(start), format!("invalid url: {e}")),
    };
    let Some(host) = url.host_str() else {
        return ProbeOutcome::failure(elapsed_ms(start), "url has no host");
    };
    if let Err(e) = ssrf::check_host(host) {
        return ProbeOutcome::failure(elapsed_ms(start), e.to_string());
    }

    let method = reqwest::Method::from_bytes(params.method.as_bytes())
        .unwrap_or(reqwest::Method::GET);

    let request = ctx
        .http_client
        .request(method, url)
        .timeout(timeout);

    let response = match request.send().await {
        Ok(resp) => resp,
        Err(e) => return ProbeOutcome::failure(elapsed_ms(start), format!("request failed: {e}")),
    };

    let status = response.status().as_u16();
    if status != params.expected_code {
        return ProbeOutcome::failure(
            elapsed_ms(start),
            format!("unexpected status {status}, expected {}", params.expected_code),
        );
    }

    if let Some(expected) = &params.expected_body_contains {
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return ProbeOutcome::failure(elapsed_ms(start), format!("failed to read body: {e}")),
        };
        if !body.contains(expected.as_str()) {
            return ProbeOutcome::failure(
                elapsed_ms(start),
                format!("body does not contain '{expected}'"),
            );
        }
    }

    ProbeOutcome::success(elapsed_ms(start))
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn params(url: &str, expected_code: u16) -> HttpParams {
        HttpParams {
            url: url.to_string(),
            method: "GET".to_string(),
            expected_code,
            expected_body_contains: None,
        }
    }

    #[tokio::test]
    async fn blocks_loopback_without_toggle() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("ALLOW_LOOPBACK_RESOURCES");
        std::env::remove_var("DANGEROUS_ALLOW_LOCAL_IPS");
        let ctx = ProbeContext::new();
        let outcome = probe(&ctx, &params("http://127.0.0.1:1/", 200), Duration::from_secs(1)).await;
        assert!(!outcome.ok);
        assert!(outcome.error.unwrap().contains("blocked"));
    }

    #[tokio::test]
    async fn invalid_url_fails_cleanly() {
        let ctx = ProbeContext::new();
        let outcome = probe(&ctx, &params("not a url", 200), Duration::from_secs(1)).await;
        assert!(!outcome.ok);
    }
}
