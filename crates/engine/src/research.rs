// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pre-implementation research fan-out.
//!
//! Up to `max_subagents` backend invocations run in parallel, each with a
//! different research angle, bounded by one overall timeout. Individual
//! failures are logged and skipped; on timeout whatever findings arrived
//! are used and the stragglers are cancelled through a child token.

use crate::prompt;
use fm_adapters::{Backend, ExecuteOptions};
use fm_core::Task;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Research phase tunables.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    pub enabled: bool,
    /// Maximum parallel research subagents.
    pub max_subagents: usize,
    /// Overall budget for the whole phase.
    pub timeout: Duration,
    /// Per-finding size cap before findings are concatenated.
    pub max_finding_len: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_subagents: 3,
            timeout: Duration::from_secs(120),
            max_finding_len: 4000,
        }
    }
}

fn truncate_finding(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let mut cut = max_len;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}

/// Run the research fan-out. Never fails: the worst case is an empty
/// findings list.
pub async fn run_research<B: Backend>(
    backend: &Arc<B>,
    cancel: &CancellationToken,
    task: &Task,
    config: &ResearchConfig,
) -> Vec<String> {
    let child = cancel.child_token();
    let mut set: JoinSet<Option<String>> = JoinSet::new();

    for index in 0..config.max_subagents {
        let backend = Arc::clone(backend);
        let token = child.clone();
        let prompt = prompt::research_prompt(task, index);
        let project = task.project_path.clone();
        let max_len = config.max_finding_len;

        set.spawn(async move {
            let opts = ExecuteOptions::new(prompt, project);
            match backend.execute(&token, opts).await {
                Ok(result) if result.success => {
                    Some(truncate_finding(result.output.trim(), max_len))
                }
                Ok(result) => {
                    tracing::warn!(
                        subagent = index,
                        error = ?result.error,
                        "research subagent failed; skipping"
                    );
                    None
                }
                Err(e) => {
                    tracing::warn!(subagent = index, error = %e, "research subagent errored; skipping");
                    None
                }
            }
        });
    }

    let deadline = tokio::time::Instant::now() + config.timeout;
    let mut findings = Vec::new();

    loop {
        tokio::select! {
            joined = set.join_next() => match joined {
                None => break,
                Some(Ok(Some(finding))) if !finding.is_empty() => findings.push(finding),
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "research subagent panicked; skipping");
                }
            },
            _ = tokio::time::sleep_until(deadline) => {
                tracing::warn!(
                    collected = findings.len(),
                    "research phase timed out; using partial findings"
                );
                child.cancel();
                set.abort_all();
                break;
            }
        }
    }

    tracing::info!(findings = findings.len(), "research phase complete");
    findings
}

#[cfg(test)]
#[path = "research_tests.rs"]
mod tests;
