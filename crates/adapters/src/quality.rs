// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Quality gate adapter

use crate::subprocess::{run_with_timeout, GATE_TIMEOUT};
use async_trait::async_trait;
use fm_core::{GateDetail, QualityOutcome};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Cap on gate output carried into retry feedback.
const MAX_GATE_OUTPUT: usize = 2000;

/// Errors from quality check operations
#[derive(Debug, Error)]
pub enum QualityError {
    #[error("quality check failed to run: {0}")]
    Command(String),
}

/// Post-implementation quality check.
#[async_trait]
pub trait QualityChecker: Send + Sync + 'static {
    /// Run all gates. `attempt` is the 1-based retry-loop attempt and is
    /// echoed back in the outcome.
    async fn check(
        &self,
        cancel: &CancellationToken,
        attempt: u32,
    ) -> Result<QualityOutcome, QualityError>;
}

/// One named shell gate.
#[derive(Debug, Clone)]
pub struct GateCommand {
    pub name: String,
    pub command: String,
    pub timeout: Duration,
}

impl GateCommand {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            timeout: GATE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`QualityChecker`] that runs configured shell gates in order.
///
/// Gate failures are retryable: the captured output becomes the retry
/// feedback injected into the follow-up prompt.
pub struct CommandChecker {
    project: PathBuf,
    gates: Vec<GateCommand>,
}

impl CommandChecker {
    pub fn new(project: impl Into<PathBuf>, gates: Vec<GateCommand>) -> Self {
        Self {
            project: project.into(),
            gates,
        }
    }
}

fn truncated(text: &str) -> String {
    if text.len() <= MAX_GATE_OUTPUT {
        return text.to_string();
    }
    let mut cut = MAX_GATE_OUTPUT;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}

#[async_trait]
impl QualityChecker for CommandChecker {
    async fn check(
        &self,
        cancel: &CancellationToken,
        attempt: u32,
    ) -> Result<QualityOutcome, QualityError> {
        let started = Instant::now();
        let mut details = Vec::with_capacity(self.gates.len());
        let mut feedback = Vec::new();
        let mut passed = true;

        for gate in &self.gates {
            if cancel.is_cancelled() {
                tracing::debug!(gate = %gate.name, "quality check cancelled before gate");
                passed = false;
                break;
            }

            let gate_start = Instant::now();
            let wrapped = format!("set -euo pipefail\n{}", gate.command);
            let mut cmd = Command::new("bash");
            cmd.arg("-c").arg(&wrapped).current_dir(&self.project);

            let description = format!("quality gate '{}'", gate.name);
            let run = tokio::select! {
                run = run_with_timeout(cmd, gate.timeout, &description) => run,
                _ = cancel.cancelled() => {
                    tracing::debug!(gate = %gate.name, "quality check cancelled mid-gate");
                    passed = false;
                    break;
                }
            };

            let (gate_passed, output) = match run {
                Ok(output) => {
                    let mut text = String::from_utf8_lossy(&output.stdout).to_string();
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    if !stderr.trim().is_empty() {
                        if !text.is_empty() {
                            text.push('\n');
                        }
                        text.push_str(stderr.trim());
                    }
                    (output.status.success(), truncated(text.trim()))
                }
                Err(e) => (false, e),
            };

            tracing::info!(
                gate = %gate.name,
                passed = gate_passed,
                elapsed_ms = gate_start.elapsed().as_millis() as u64,
                "quality gate finished"
            );

            if !gate_passed {
                passed = false;
                feedback.push(format!("gate '{}' failed:\n{}", gate.name, output));
            }
            details.push(GateDetail {
                name: gate.name.clone(),
                passed: gate_passed,
                duration: gate_start.elapsed(),
                output,
            });
        }

        let cancelled = cancel.is_cancelled();
        Ok(QualityOutcome {
            passed,
            // Gate failures are worth a retry; cancellation is not.
            should_retry: !passed && !cancelled,
            retry_feedback: feedback.join("\n\n"),
            attempt,
            gate_details: details,
            total_duration: started.elapsed(),
        })
    }
}

/// Scripted [`QualityChecker`] for tests.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeQualityChecker {
    outcomes: parking_lot::Mutex<std::collections::VecDeque<QualityOutcome>>,
    checks: std::sync::atomic::AtomicU32,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeQualityChecker {
    /// With no scripted outcomes the fake always passes.
    pub fn passing() -> Self {
        Self {
            outcomes: parking_lot::Mutex::new(std::collections::VecDeque::new()),
            checks: std::sync::atomic::AtomicU32::new(0),
        }
    }

    pub fn push_outcome(&self, outcome: QualityOutcome) {
        self.outcomes.lock().push_back(outcome);
    }

    /// A retryable failure with the given feedback.
    pub fn retryable(feedback: &str) -> QualityOutcome {
        QualityOutcome {
            passed: false,
            should_retry: true,
            retry_feedback: feedback.to_string(),
            attempt: 0,
            gate_details: Vec::new(),
            total_duration: Duration::ZERO,
        }
    }

    pub fn check_count(&self) -> u32 {
        self.checks.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl QualityChecker for FakeQualityChecker {
    async fn check(
        &self,
        _cancel: &CancellationToken,
        attempt: u32,
    ) -> Result<QualityOutcome, QualityError> {
        self.checks
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut outcome = self
            .outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| QualityOutcome::passed(attempt));
        outcome.attempt = attempt;
        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "quality_tests.rs"]
mod tests;
