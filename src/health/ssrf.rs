//! SSRF guard: rejects probe targets resolving to loopback, link-local, or
//! private network ranges unless explicitly permitted by an environment
//! toggle.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};

use crate::error::{GatewayError, Result};

/// `true` when any of the loopback/private-network env toggles are set to a
/// truthy value. Mirrors `config::mod::apply_env_overrides`'s
/// `env::var(...).ok()` + parse-or-default idiom.
fn env_truthy(key: &str) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => false,
    }
}

fn loopback_allowed() -> bool {
    env_truthy("ALLOW_LOOPBACK_RESOURCES") || env_truthy("DANGEROUS_ALLOW_LOCAL_IPS")
}

fn private_allowed() -> bool {
    env_truthy("ALLOW_PRIVATE_NETWORK_RESOURCES") || env_truthy("DANGEROUS_ALLOW_LOCAL_IPS")
}

/// `true` when `ip` is loopback, link-local, or a private range, per
/// the address family's stable predicate methods (IPv6 unique-local and
/// link-local are checked manually since the stable methods are limited).
pub fn is_restricted(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_restricted_v4(v4),
        IpAddr::V6(v6) => is_restricted_v6(v6),
    }
}

fn is_restricted_v4(v4: Ipv4Addr) -> bool {
    v4.is_loopback() || v4.is_link_local() || v4.is_private() || v4.is_unspecified()
}

fn is_restricted_v6(v6: Ipv6Addr) -> bool {
    if v6.is_loopback() || v6.is_unspecified() {
        return true;
    }
    if let Some(v4) = v6.to_ipv4_mapped() {
        return is_restricted_v4(v4);
    }
    let segments = v6.segments();
    // fe80::/10 link-local
    let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
    // fc00::/7 unique local
    let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
    is_link_local || is_unique_local
}

/// Resolve `host` (bare hostname or numeric address, no port) and enforce
/// the SSRF guard, honoring the environment toggles. Returns `Ok(())` if the
/// target is permitted to be dialed.
pub fn check_host(host: &str) -> Result<()> {
    // Fast path: numeric IP, no DNS round-trip.
    if let Ok(ip) = host.parse::<IpAddr>() {
        return check_ip(ip);
    }

    // Resolve via a dummy port; `ToSocketAddrs` requires one.
    let addrs = (host, 0u16)
        .to_socket_addrs()
        .map_err(|e| GatewayError::TransportFailure(format!("dns resolution failed for {host}: {e}")))?;

    let mut resolved_any = false;
    for addr in addrs {
        resolved_any = true;
        check_ip(addr.ip())?;
    }
    if !resolved_any {
        return Err(GatewayError::TransportFailure(format!(
            "no addresses resolved for {host}"
        )));
    }
    Ok(())
}

fn check_ip(ip: IpAddr) -> Result<()> {
    if !is_restricted(ip) {
        return Ok(());
    }
    let ip_is_loopback = match ip {
        IpAddr::V4(v4) => v4.is_loopback(),
        IpAddr::V6(v6) => v6.is_loopback(),
    };
    if ip_is_loopback && loopback_allowed() {
        return Ok(());
    }
    if !ip_is_loopback && private_allowed() {
        return Ok(());
    }
    crate::audit::log_audit_event(
        crate::audit::AuditCategory::SsrfBlocked,
        crate::audit::AuditSeverity::Warning,
        "probe_target_blocked",
        &format!("target {ip} resolves to a restricted network range"),
        true,
    );
    Err(GatewayError::Blocked(format!(
        "target {ip} resolves to a restricted network range"
    )))
}

/// Enforce the guard against a full `host:port` socket address string,
/// used by the TCP-connect and command-line probes.
pub fn check_socket_addr(addr: SocketAddr) -> Result<()> {
    check_ip(addr.ip())
}
