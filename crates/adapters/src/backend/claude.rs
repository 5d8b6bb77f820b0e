// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claude CLI backend with subprocess supervision.
//!
//! Three concerns run for the lifetime of the subprocess: the stdout decoder
//! (which also feeds the heartbeat timestamp), a stderr collector task, and
//! the watchdogs. The watchdogs are two independent termination axes: the
//! caller's cancellation token (polite SIGTERM, hard kill after the grace
//! period) and the inactivity heartbeat (hard kill once no line has arrived
//! for the configured timeout).

use super::protocol::{parse_line, StreamTotals};
use super::{Backend, BackendError, ExecuteOptions, SupervisorConfig};
use crate::subprocess::{run_with_timeout, CLI_PROBE_TIMEOUT};
use async_trait::async_trait;
use fm_core::BackendResult;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Configuration for the Claude backend.
#[derive(Debug, Clone)]
pub struct ClaudeBackendConfig {
    /// Binary to invoke.
    pub command: String,
    /// Extra arguments appended after the computed base arguments.
    pub extra_args: Vec<String>,
    pub supervisor: SupervisorConfig,
}

impl Default for ClaudeBackendConfig {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            extra_args: Vec::new(),
            supervisor: SupervisorConfig::default(),
        }
    }
}

/// Backend adapter for the Claude Code CLI.
pub struct ClaudeBackend {
    config: ClaudeBackendConfig,
}

impl ClaudeBackend {
    pub fn new(config: ClaudeBackendConfig) -> Self {
        Self { config }
    }

    /// Compose the argv for one invocation.
    ///
    /// Order is fixed for reproducibility: prompt flag, verbose flag,
    /// output format, permission bypass, then optional model/effort, then
    /// configured extra arguments. `--verbose` is always passed because the
    /// CLI requires it for `--output-format stream-json` in print mode;
    /// `opts.verbose` only controls local event logging.
    pub fn build_args(opts: &ExecuteOptions, extra_args: &[String]) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            opts.prompt.clone(),
            "--verbose".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--dangerously-skip-permissions".to_string(),
        ];
        if let Some(model) = &opts.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        if let Some(effort) = &opts.effort {
            args.push("--effort".to_string());
            args.push(effort.clone());
        }
        args.extend(extra_args.iter().cloned());
        args
    }
}

/// Send SIGTERM to the child, if it is still running.
fn send_sigterm(child: &Child) {
    let Some(pid) = child.id() else {
        return;
    };
    let pid = nix::unistd::Pid::from_raw(pid as i32);
    if let Err(e) = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM) {
        tracing::warn!(%pid, error = %e, "failed to send SIGTERM to backend");
    }
}

#[async_trait]
impl Backend for ClaudeBackend {
    fn name(&self) -> &str {
        "claude"
    }

    async fn is_available(&self) -> bool {
        let mut cmd = Command::new(&self.config.command);
        cmd.arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        match run_with_timeout(cmd, CLI_PROBE_TIMEOUT, "backend CLI probe").await {
            Ok(output) => output.status.success(),
            Err(e) => {
                tracing::warn!(command = %self.config.command, error = %e, "backend probe failed");
                false
            }
        }
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        opts: ExecuteOptions,
    ) -> Result<BackendResult, BackendError> {
        let mut opts = opts;
        let args = Self::build_args(&opts, &self.config.extra_args);

        tracing::debug!(
            command = %self.config.command,
            project = %opts.project_path.display(),
            model = ?opts.model,
            effort = ?opts.effort,
            "launching backend"
        );

        let mut child = Command::new(&self.config.command)
            .args(&args)
            .current_dir(&opts.project_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(BackendError::Spawn)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BackendError::Stdio("stdout pipe missing".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BackendError::Stdio("stderr pipe missing".into()))?;

        // Stderr is collected off to the side; it is only surfaced if the
        // stream protocol did not report an error itself.
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let mut reader = BufReader::new(stderr);
            if let Err(e) = reader.read_to_string(&mut buf).await {
                tracing::warn!(error = %e, "stderr read error");
            }
            buf
        });

        let sup = &self.config.supervisor;
        let mut lines = BufReader::new(stdout).lines();
        let mut totals = StreamTotals::default();
        let mut last_result: Option<(String, bool)> = None;
        let mut last_line_at = Instant::now();

        let mut heartbeat = tokio::time::interval(sup.heartbeat_check_interval);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first interval tick completes immediately; consume it.
        heartbeat.tick().await;

        let mut hang_killed = false;
        let mut cancelled = false;
        let mut grace_deadline: Option<tokio::time::Instant> = None;

        loop {
            // Placeholder deadline keeps the grace branch well-formed while
            // disarmed; the `if` guard prevents it from ever firing then.
            let armed = grace_deadline
                .unwrap_or_else(|| tokio::time::Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                read = lines.next_line() => match read {
                    Ok(Some(line)) => {
                        last_line_at = Instant::now();
                        for event in parse_line(&line) {
                            totals.observe(&event);
                            if let fm_core::EventKind::Result { result, is_error } = &event.kind {
                                last_result = Some((result.clone(), *is_error));
                            }
                            if opts.verbose {
                                tracing::debug!(kind = %event.kind, "backend event");
                            }
                            if let Some(on_event) = opts.on_event.as_mut() {
                                on_event(&event);
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        // Non-fatal while the process lives (e.g. a line of
                        // invalid UTF-8); keep reading until EOF.
                        tracing::warn!(error = %e, "stdout read error; continuing");
                    }
                },

                _ = heartbeat.tick() => {
                    let age = last_line_at.elapsed();
                    if !hang_killed && age > sup.heartbeat_timeout {
                        tracing::warn!(
                            age_secs = age.as_secs(),
                            "backend produced no output past heartbeat timeout; killing"
                        );
                        if let Some(on_heartbeat) = opts.on_heartbeat.as_mut() {
                            on_heartbeat(age);
                        }
                        hang_killed = true;
                        if let Err(e) = child.start_kill() {
                            tracing::warn!(error = %e, "hard kill failed");
                        }
                    }
                },

                _ = cancel.cancelled(), if !cancelled => {
                    tracing::debug!("cancellation requested; sending SIGTERM");
                    cancelled = true;
                    send_sigterm(&child);
                    grace_deadline = Some(tokio::time::Instant::now() + sup.grace_period);
                },

                _ = tokio::time::sleep_until(armed), if grace_deadline.is_some() => {
                    tracing::warn!("grace period elapsed; escalating to hard kill");
                    grace_deadline = None;
                    if let Err(e) = child.start_kill() {
                        tracing::warn!(error = %e, "hard kill failed");
                    }
                },
            }
        }

        // Readers are done; reap the process. A cancelled child that closed
        // stdout but ignores SIGTERM still gets the hard kill after grace.
        let status = if cancelled || hang_killed {
            match tokio::time::timeout(sup.grace_period, child.wait()).await {
                Ok(res) => res.ok(),
                Err(_) => {
                    if let Err(e) = child.start_kill() {
                        tracing::warn!(error = %e, "hard kill failed");
                    }
                    child.wait().await.ok()
                }
            }
        } else {
            child.wait().await.ok()
        };

        let stderr_text = stderr_task.await.unwrap_or_default();
        let exit_ok = status.map(|s| s.success()).unwrap_or(false);

        let mut result = BackendResult {
            success: false,
            output: String::new(),
            error: None,
            tokens_input: totals.tokens_input,
            tokens_output: totals.tokens_output,
            model: totals.model,
        };

        match last_result {
            Some((text, true)) => {
                result.error = Some(text);
            }
            Some((text, false)) => {
                result.output = text;
                result.success = exit_ok && !hang_killed && !cancelled;
            }
            None => {}
        }

        if result.error.is_none() && !result.success {
            result.error = Some(if hang_killed {
                format!(
                    "backend produced no output for {}s and was killed",
                    sup.heartbeat_timeout.as_secs()
                )
            } else if cancelled {
                "backend cancelled".to_string()
            } else if !stderr_text.trim().is_empty() {
                stderr_text.trim().to_string()
            } else {
                match status {
                    Some(s) => format!("backend exited with {}", s),
                    None => "backend exited abnormally".to_string(),
                }
            });
        }

        tracing::info!(
            success = result.success,
            tokens_input = result.tokens_input,
            tokens_output = result.tokens_output,
            "backend finished"
        );

        Ok(result)
    }
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
