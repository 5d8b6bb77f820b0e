// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Preflight checks.
//!
//! An ordered list of environment checks run before anything touches the
//! repository; the first failure aborts with the name of the failing check
//! and the backend is never invoked.

use crate::error::EngineError;
use fm_adapters::{Backend, GitOps};
use std::path::Path;

/// Options for the preflight pass.
#[derive(Debug, Clone, Default)]
pub struct PreflightOptions {
    /// Skip the clean-working-tree check; used when a worktree was
    /// materialized for the task.
    pub skip_git_clean: bool,
}

/// Run the preflight checks in order, aborting on the first failure.
pub async fn run_preflight<B: Backend, G: GitOps + ?Sized>(
    backend: &B,
    git: &G,
    project: &Path,
    opts: &PreflightOptions,
) -> Result<(), EngineError> {
    tracing::debug!(project = %project.display(), "running preflight checks");

    if !backend.is_available().await {
        return Err(EngineError::Preflight {
            check: "backend_cli".to_string(),
            message: format!("backend '{}' is not reachable", backend.name()),
        });
    }

    if !git.is_repository(project).await {
        return Err(EngineError::Preflight {
            check: "git_repository".to_string(),
            message: format!("{} is not a git repository", project.display()),
        });
    }

    if !opts.skip_git_clean {
        let dirty = git
            .has_uncommitted_changes(project)
            .await
            .map_err(|e| EngineError::Preflight {
                check: "git_clean".to_string(),
                message: e.to_string(),
            })?;
        if dirty {
            return Err(EngineError::Preflight {
                check: "git_clean".to_string(),
                message: "working tree has uncommitted changes".to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "preflight_tests.rs"]
mod tests;
