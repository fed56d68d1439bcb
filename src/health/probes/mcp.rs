//! MCP probe: delegates to the TCP-connect driver for HTTP transports; for
//! stdio transports, always reports healthy. The HTTP-transport delegation
//! lives in `probes::tcp`; this module only owns the stdio shortcut since
//! there is no address to dial.

use crate::health::types::ProbeOutcome;

pub fn probe_stdio() -> ProbeOutcome {
    ProbeOutcome::success(0)
}
