// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution store contract

use fm_core::{Execution, ExecutionId, ExecutionStatus, ResultUpdate, TaskId};
use std::io;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors from execution store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("execution already exists: {0}")]
    AlreadyExists(ExecutionId),
    #[error("execution not found: {0}")]
    NotFound(ExecutionId),
    #[error("execution {id} is terminal ({status}); record is immutable")]
    Terminal {
        id: ExecutionId,
        status: ExecutionStatus,
    },
    #[error("illegal status transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: ExecutionId,
        from: ExecutionStatus,
        to: ExecutionStatus,
    },
    #[error("new executions must be queued or decomposed, got {0}")]
    InvalidInitialStatus(ExecutionStatus),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Durable log of task executions.
///
/// The store is the single writer per record: after the initial `queued`
/// insert, only the project worker that claimed the execution mutates it.
/// A transition conflict from [`update_status`](ExecutionStore::update_status)
/// means another writer is active and must be surfaced, never retried.
pub trait ExecutionStore: Send + Sync + 'static {
    /// Insert a new execution. The status must be `queued` or `decomposed`.
    fn save(&self, exec: &Execution) -> Result<(), StoreError>;

    fn get(&self, id: &ExecutionId) -> Result<Execution, StoreError>;

    /// Transition an execution's status, replacing the stored message
    /// (`None` clears it).
    ///
    /// Transitions are validated against
    /// [`ExecutionStatus::can_transition`]; the only non-monotonic edge is
    /// the stale-recovery `running -> queued`.
    fn update_status(
        &self,
        id: &ExecutionId,
        status: ExecutionStatus,
        message: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Write outcome fields (PR URL, commit SHAs, token totals) onto a
    /// non-terminal execution.
    fn record_result(&self, id: &ExecutionId, update: &ResultUpdate) -> Result<(), StoreError>;

    /// Queued executions for a project, ordered by `created_at` ascending,
    /// ties broken by `id` ascending.
    fn queued_for_project(
        &self,
        project: &Path,
        limit: usize,
    ) -> Result<Vec<Execution>, StoreError>;

    /// Running executions whose `updated_at` is older than `older_than`.
    fn stale_running(&self, older_than: Duration) -> Result<Vec<Execution>, StoreError>;

    /// True if any execution for the task is `queued` or `running`.
    fn is_task_queued(&self, task_id: &TaskId) -> Result<bool, StoreError>;
}
