// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error taxonomy

use fm_core::TaskId;
use thiserror::Error;

/// Errors that can occur while orchestrating executions
#[derive(Debug, Error)]
pub enum EngineError {
    /// Fail-fast configuration or environment problem; the backend is never
    /// invoked.
    #[error("preflight check '{check}' failed: {message}")]
    Preflight { check: String, message: String },
    #[error("backend error: {0}")]
    Backend(#[from] fm_adapters::BackendError),
    #[error("storage error: {0}")]
    Store(#[from] fm_storage::StoreError),
    #[error("git error: {0}")]
    Git(#[from] fm_adapters::GitError),
    #[error("worktree error: {0}")]
    Worktree(#[from] fm_adapters::WorktreeError),
    #[error("quality check error: {0}")]
    Quality(#[from] fm_adapters::QualityError),
    /// The task already has a queued or running execution.
    #[error("task already queued: {0}")]
    DuplicateTask(TaskId),
    #[error("cancelled: {0}")]
    Cancelled(String),
}
