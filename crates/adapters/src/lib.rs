// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fm-adapters: External capability adapters for the Foreman task executor
//!
//! Narrow trait seams around everything the engine does not own: the
//! coding-assistant backend subprocess, git, worktrees, and quality gates.
//! Fakes for all of them are exported behind the `test-support` feature.

pub mod backend;
pub mod git;
pub mod quality;
pub mod subprocess;
pub mod worktree;

pub use backend::{
    Backend, BackendError, ClaudeBackend, ClaudeBackendConfig, ExecuteOptions, SupervisorConfig,
};
pub use git::{CliGit, GitError, GitOps};
pub use quality::{CommandChecker, GateCommand, QualityChecker, QualityError};
pub use worktree::{GitWorktrees, WorktreeError, WorktreeHandle, WorktreeProvider};

#[cfg(any(test, feature = "test-support"))]
pub use backend::fake::{FakeBackend, ScriptedRun};
#[cfg(any(test, feature = "test-support"))]
pub use git::FakeGit;
#[cfg(any(test, feature = "test-support"))]
pub use quality::FakeQualityChecker;
