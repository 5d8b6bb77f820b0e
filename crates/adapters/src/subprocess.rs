// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded subprocess execution.
//!
//! Every external command the adapters shell out to (git plumbing, CLI
//! probes, quality gates) goes through [`run_with_timeout`], so a wedged
//! child can never stall the engine.

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Timeout for git plumbing commands.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for `git worktree add`/`remove`.
pub const GIT_WORKTREE_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for probing a backend CLI with `<cmd> --version`.
pub const CLI_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for a single quality gate command. Generous, because a gate is
/// often a full test-suite run.
pub const GATE_TIMEOUT: Duration = Duration::from_secs(600);

/// Run `cmd` to completion, giving up after `timeout`.
///
/// Expiry and spawn failures are both flattened into an error string built
/// from `description`, which is what the adapter error types want. The
/// child is marked kill-on-drop, so a run abandoned at the deadline is
/// reaped rather than leaked.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Err(_elapsed) => Err(format!(
            "{description} timed out after {}s",
            timeout.as_secs()
        )),
        Ok(result) => result.map_err(|e| format!("{description} failed: {e}")),
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
