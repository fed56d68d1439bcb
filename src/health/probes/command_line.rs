//! Command-line health probe: execs the configured binary with
//! `[method?, prompt?]` args, requiring exit code 0 and an optional
//! substring match on stdout.

use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::warn;

use crate::health::types::{CommandLineParams, IsolationMode, ProbeOutcome};

/// Grace period between SIGTERM and a forced SIGKILL when a command-line
/// probe overruns its deadline, per the cancellation contract's "killing
/// subprocesses with a 100 ms grace".
const KILL_GRACE: Duration = Duration::from_millis(100);

pub async fn probe(params: &CommandLineParams, timeout: Duration) -> ProbeOutcome {
    let start = Instant::now();

    if params.isolation == IsolationMode::Container {
        // Container-isolated command-line checks are executed by the
        // gateway's own container runtime; this core only validates the
        // declared contract, it does not supervise the sandbox itself.
        return ProbeOutcome::failure(
            elapsed_ms(start),
            "container isolation mode is not executable by this probe driver",
        );
    }

    let mut cmd = Command::new(&params.binary);
    cmd.current_dir(&params.working_dir);
    // Backstop only: if this future is itself dropped (the dispatcher's
    // own outer timeout racing ours, or a caller abandoning the probe
    // outright) before the graceful path below gets a chance to run, this
    // still keeps the child from leaking. The normal overrun path is the
    // SIGTERM-then-grace-then-SIGKILL sequence in `kill_with_grace`.
    cmd.kill_on_drop(true);
    if let Some(method) = &params.method {
        cmd.arg(method);
    }
    if let Some(prompt) = &params.prompt {
        cmd.arg(prompt);
    }
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::null());

    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => return ProbeOutcome::failure(elapsed_ms(start), format!("exec failed: {e}")),
    };

    // Leave room for the grace-period teardown below so the probe,
    // including any kill, never outlives the caller's declared timeout.
    let exec_budget = timeout.saturating_sub(KILL_GRACE);
    let status = tokio::select! {
        result = child.wait() => match result {
            Ok(status) => status,
            Err(e) => return ProbeOutcome::failure(elapsed_ms(start), format!("exec failed: {e}")),
        },
        _ = tokio::time::sleep(exec_budget) => {
            kill_with_grace(&mut child).await;
            return ProbeOutcome::failure(elapsed_ms(start), "timed out");
        }
    };

    let mut stdout_buf = Vec::new();
    if let Some(mut stdout) = child.stdout.take() {
        let _ = stdout.read_to_end(&mut stdout_buf).await;
    }

    if !status.success() {
        return ProbeOutcome::failure(elapsed_ms(start), format!("exit code {:?}", status.code()));
    }

    if let Some(expected) = &params.expected_response_contains {
        let stdout = String::from_utf8_lossy(&stdout_buf);
        if !stdout.contains(expected.as_str()) {
            return ProbeOutcome::failure(
                elapsed_ms(start),
                format!("stdout does not contain '{expected}'"),
            );
        }
    }

    ProbeOutcome::success(elapsed_ms(start))
}

/// Send SIGTERM, give the process `KILL_GRACE` to exit on its own, then
/// force a SIGKILL if it is still running.
async fn kill_with_grace(child: &mut Child) {
    if let Some(pid) = child.id() {
        send_sigterm(pid);
    }

    let exited = tokio::select! {
        _ = child.wait() => true,
        _ = tokio::time::sleep(KILL_GRACE) => false,
    };

    if !exited {
        if let Err(e) = child.start_kill() {
            warn!(error = %e, "failed to send SIGKILL after grace period");
        }
        let _ = child.wait().await;
    }
}

#[cfg(unix)]
fn send_sigterm(pid: u32) {
    // SAFETY: pid is the live child we just spawned; kill(2) on an already
    // exited pid just returns ESRCH, which we ignore since the SIGKILL
    // fallback above covers that case regardless.
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) {
    // No SIGTERM-equivalent soft-terminate signal on this platform; the
    // grace period still gives the process a chance to exit before the
    // forced kill below.
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
