// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted fake backend for tests

use super::protocol::{parse_line, StreamTotals};
use super::{Backend, BackendError, ExecuteOptions};
use async_trait::async_trait;
use fm_core::{BackendResult, EventKind};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One scripted invocation: protocol lines to stream, the exit status to
/// simulate, and an optional delay before completion.
#[derive(Debug, Clone)]
pub struct ScriptedRun {
    pub lines: Vec<String>,
    pub exit_success: bool,
    pub delay: Duration,
}

impl ScriptedRun {
    /// A successful run that emits init + a `result` event with `text`.
    pub fn succeed(text: &str) -> Self {
        Self {
            lines: vec![
                r#"{"type":"system","subtype":"init"}"#.to_string(),
                format!(
                    r#"{{"type":"result","result":"{text}","is_error":false,"usage":{{"input_tokens":10,"output_tokens":5}}}}"#
                ),
            ],
            exit_success: true,
            delay: Duration::ZERO,
        }
    }

    /// A run whose `result` event reports an error.
    pub fn fail(message: &str) -> Self {
        Self {
            lines: vec![format!(
                r#"{{"type":"result","result":"{message}","is_error":true}}"#
            )],
            exit_success: true,
            delay: Duration::ZERO,
        }
    }

    pub fn with_lines(lines: Vec<String>) -> Self {
        Self {
            lines,
            exit_success: true,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Backend fake that plays back scripted runs and records prompts.
///
/// Runs are consumed in push order; when the queue is empty the fake
/// falls back to a plain successful run.
pub struct FakeBackend {
    runs: Mutex<VecDeque<ScriptedRun>>,
    prompts: Mutex<Vec<String>>,
    paths: Mutex<Vec<std::path::PathBuf>>,
    available: bool,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            runs: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            paths: Mutex::new(Vec::new()),
            available: true,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn push_run(&self, run: ScriptedRun) {
        self.runs.lock().push_back(run);
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Working directories received so far, in call order.
    pub fn paths(&self) -> Vec<std::path::PathBuf> {
        self.paths.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        opts: ExecuteOptions,
    ) -> Result<BackendResult, BackendError> {
        let mut opts = opts;
        self.prompts.lock().push(opts.prompt.clone());
        self.paths.lock().push(opts.project_path.clone());

        let run = self
            .runs
            .lock()
            .pop_front()
            .unwrap_or_else(|| ScriptedRun::succeed("done"));

        if !run.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(run.delay) => {}
                _ = cancel.cancelled() => {
                    return Ok(BackendResult {
                        success: false,
                        error: Some("backend cancelled".to_string()),
                        ..BackendResult::default()
                    });
                }
            }
        }

        let mut totals = StreamTotals::default();
        let mut last_result: Option<(String, bool)> = None;
        for line in &run.lines {
            for event in parse_line(line) {
                totals.observe(&event);
                if let EventKind::Result { result, is_error } = &event.kind {
                    last_result = Some((result.clone(), *is_error));
                }
                if let Some(on_event) = opts.on_event.as_mut() {
                    on_event(&event);
                }
            }
        }

        let mut result = BackendResult {
            success: false,
            output: String::new(),
            error: None,
            tokens_input: totals.tokens_input,
            tokens_output: totals.tokens_output,
            model: totals.model,
        };
        match last_result {
            Some((text, true)) => result.error = Some(text),
            Some((text, false)) => {
                result.output = text;
                result.success = run.exit_success;
            }
            None => {}
        }
        if !result.success && result.error.is_none() {
            result.error = Some("backend exited abnormally".to_string());
        }

        Ok(result)
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
