//! Raw TCP connect probe: split `address` into host+port (default port 443
//! for TLS-flagged targets, else 80), dial with a 5 s deadline (enforced by
//! the caller's `dispatch` timeout wrapper).

use std::time::{Duration, Instant};

use tokio::net::TcpStream;

use crate::health::ssrf;
use crate::health::types::{ProbeOutcome, TcpParams};

pub async fn probe(params: &TcpParams, _timeout: Duration) -> ProbeOutcome {
    let start = Instant::now();

    let (host, port) = match split_host_port(&params.address, params.tls) {
        Ok(pair) => pair,
        Err(e) => return ProbeOutcome::failure(elapsed_ms(start), e),
    };

    if let Err(e) = ssrf::check_host(&host) {
        return ProbeOutcome::failure(elapsed_ms(start), e.to_string());
    }

    match TcpStream::connect((host.as_str(), port)).await {
        Ok(_) => ProbeOutcome::success(elapsed_ms(start)),
        Err(e) => ProbeOutcome::failure(elapsed_ms(start), format!("dial failed: {e}")),
    }
}

fn split_host_port(address: &str, tls: bool) -> Result<(String, u16), String> {
    let default_port = if tls { 443 } else { 80 };

    // Strip a scheme if present (e.g. "https://host").
    let without_scheme = address.split("://").last().unwrap_or(address);
    let without_path = without_scheme.split('/').next().unwrap_or(without_scheme);

    if let Some((host, port_str)) = without_path.rsplit_once(':') {
        // Guard against IPv6 literals like "::1" being mis-split.
        if !host.is_empty() {
            if let Ok(port) = port_str.parse::<u16>() {
                return Ok((host.to_string(), port));
            }
        }
    }

    if without_path.is_empty() {
        return Err("empty address".to_string());
    }
    Ok((without_path.to_string(), default_port))
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
