// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coding-assistant backend adapters
//!
//! A `Backend` launches the external assistant CLI as a subprocess, decodes
//! its newline-delimited JSON event stream, and supervises the process under
//! two independent cancellation axes: the caller's `CancellationToken` and an
//! inactivity heartbeat. Events are delivered to a synchronous callback in
//! exact stdout line order; the supervisor never synthesizes events.

mod claude;
pub mod protocol;

pub use claude::{ClaudeBackend, ClaudeBackendConfig};

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

use async_trait::async_trait;
use fm_core::{BackendEvent, BackendResult};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors from backend operations
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to spawn backend process: {0}")]
    Spawn(io::Error),
    #[error("backend stdio unavailable: {0}")]
    Stdio(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Synchronous per-event callback, invoked once per parsed event in stream
/// order.
pub type EventCallback = Box<dyn FnMut(&BackendEvent) + Send>;

/// Invoked when the heartbeat watchdog fires, with the age of the last
/// observed output line.
pub type HeartbeatCallback = Box<dyn FnMut(Duration) + Send>;

/// Supervision tunables, injected at construction.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Kill the subprocess if no stdout line arrives for this long.
    pub heartbeat_timeout: Duration,
    /// How often the heartbeat watchdog checks.
    pub heartbeat_check_interval: Duration,
    /// How long after a polite termination signal before the hard kill.
    pub grace_period: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(5 * 60),
            heartbeat_check_interval: Duration::from_secs(30),
            grace_period: Duration::from_secs(5),
        }
    }
}

/// Options for one backend invocation.
pub struct ExecuteOptions {
    pub prompt: String,
    /// Working directory for the subprocess.
    pub project_path: PathBuf,
    /// Log each decoded event at debug level.
    pub verbose: bool,
    pub model: Option<String>,
    pub effort: Option<String>,
    pub on_event: Option<EventCallback>,
    pub on_heartbeat: Option<HeartbeatCallback>,
}

impl ExecuteOptions {
    pub fn new(prompt: impl Into<String>, project_path: impl Into<PathBuf>) -> Self {
        Self {
            prompt: prompt.into(),
            project_path: project_path.into(),
            verbose: false,
            model: None,
            effort: None,
            on_event: None,
            on_heartbeat: None,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_effort(mut self, effort: Option<String>) -> Self {
        self.effort = effort;
        self
    }

    pub fn on_event(mut self, f: impl FnMut(&BackendEvent) + Send + 'static) -> Self {
        self.on_event = Some(Box::new(f));
        self
    }

    pub fn on_heartbeat(mut self, f: impl FnMut(Duration) + Send + 'static) -> Self {
        self.on_heartbeat = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for ExecuteOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecuteOptions")
            .field("prompt_len", &self.prompt.len())
            .field("project_path", &self.project_path)
            .field("verbose", &self.verbose)
            .field("model", &self.model)
            .field("effort", &self.effort)
            .field("on_event", &self.on_event.is_some())
            .field("on_heartbeat", &self.on_heartbeat.is_some())
            .finish()
    }
}

/// A coding-assistant backend.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Backend name, used in preflight diagnostics.
    fn name(&self) -> &str;

    /// Probe whether the backend CLI is reachable.
    async fn is_available(&self) -> bool;

    /// Run the assistant to completion (or kill), streaming events to
    /// `opts.on_event`.
    ///
    /// Returns `Err` only for failures to start; a process that started and
    /// then failed is reported through `BackendResult { success: false, .. }`.
    async fn execute(
        &self,
        cancel: &CancellationToken,
        opts: ExecuteOptions,
    ) -> Result<BackendResult, BackendError>;
}
