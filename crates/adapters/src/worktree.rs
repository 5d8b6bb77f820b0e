// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git worktree isolation with scoped release.
//!
//! A [`WorktreeHandle`] owns its directory: callers release it explicitly on
//! the normal path, and `Drop` runs a best-effort removal so the worktree is
//! reclaimed even on abnormal unwinds.

use crate::subprocess::{run_with_timeout, GIT_WORKTREE_TIMEOUT};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

/// Errors from worktree operations
#[derive(Debug, Error)]
pub enum WorktreeError {
    #[error("worktree command failed to run: {0}")]
    Command(String),
    #[error("git worktree {command} failed: {stderr}")]
    Failed { command: String, stderr: String },
}

/// Provider of isolated worktrees for a repository.
#[async_trait]
pub trait WorktreeProvider: Send + Sync + 'static {
    /// Create a detached worktree labeled for diagnostics.
    async fn create(&self, repo: &Path, label: &str) -> Result<WorktreeHandle, WorktreeError>;

    /// Create a worktree on `branch`, creating or resetting it at `base`.
    async fn create_with_branch(
        &self,
        repo: &Path,
        label: &str,
        branch: &str,
        base: &str,
    ) -> Result<WorktreeHandle, WorktreeError>;
}

/// Handle to a materialized worktree.
#[derive(Debug)]
pub struct WorktreeHandle {
    path: PathBuf,
    repo: PathBuf,
    released: bool,
}

impl WorktreeHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the worktree and its directory.
    pub async fn remove(mut self) -> Result<(), WorktreeError> {
        self.released = true;
        remove_worktree_async(&self.repo, &self.path).await
    }
}

impl Drop for WorktreeHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // Abnormal path: best effort, synchronous, never panics.
        let output = std::process::Command::new("git")
            .args(["worktree", "remove", "--force"])
            .arg(&self.path)
            .current_dir(&self.repo)
            .output();
        if let Err(e) = output {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "worktree cleanup on drop failed"
            );
        }
        if self.path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "worktree directory removal on drop failed"
                );
            }
        }
    }
}

async fn remove_worktree_async(repo: &Path, path: &Path) -> Result<(), WorktreeError> {
    let mut cmd = Command::new("git");
    cmd.args(["worktree", "remove", "--force"])
        .arg(path)
        .current_dir(repo);
    let output = run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, "git worktree remove")
        .await
        .map_err(WorktreeError::Command)?;
    if !output.status.success() {
        return Err(WorktreeError::Failed {
            command: "remove".to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    // Remove remnants in case git left the directory behind
    if path.exists() {
        if let Err(e) = tokio::fs::remove_dir_all(path).await {
            tracing::warn!(path = %path.display(), error = %e, "worktree remnant removal failed");
        }
    }
    Ok(())
}

/// [`WorktreeProvider`] backed by `git worktree`.
pub struct GitWorktrees {
    /// Directory worktrees are created under. Defaults to the system temp dir.
    root: Option<PathBuf>,
}

impl GitWorktrees {
    pub fn new() -> Self {
        Self { root: None }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn target_path(&self, label: &str) -> PathBuf {
        let sanitized: String = label
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
                _ => '-',
            })
            .collect();
        let unique = uuid_suffix();
        let root = self
            .root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("fm-worktrees"));
        root.join(format!("{sanitized}-{unique}"))
    }

    async fn add(
        &self,
        repo: &Path,
        pre_args: &[&str],
        path: &Path,
        post_args: &[&str],
    ) -> Result<WorktreeHandle, WorktreeError> {
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Err(WorktreeError::Command(format!(
                    "failed to create worktree root: {e}"
                )));
            }
        }

        let mut cmd = Command::new("git");
        cmd.args(["worktree", "add"])
            .args(pre_args)
            .arg(path)
            .args(post_args)
            .current_dir(repo);
        let output = run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, "git worktree add")
            .await
            .map_err(WorktreeError::Command)?;
        if !output.status.success() {
            return Err(WorktreeError::Failed {
                command: "add".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        tracing::info!(
            repo = %repo.display(),
            worktree = %path.display(),
            "worktree created"
        );
        Ok(WorktreeHandle {
            path: path.to_path_buf(),
            repo: repo.to_path_buf(),
            released: false,
        })
    }
}

impl Default for GitWorktrees {
    fn default() -> Self {
        Self::new()
    }
}

fn uuid_suffix() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

#[async_trait]
impl WorktreeProvider for GitWorktrees {
    async fn create(&self, repo: &Path, label: &str) -> Result<WorktreeHandle, WorktreeError> {
        let path = self.target_path(label);
        self.add(repo, &["--detach"], &path, &[]).await
    }

    async fn create_with_branch(
        &self,
        repo: &Path,
        label: &str,
        branch: &str,
        base: &str,
    ) -> Result<WorktreeHandle, WorktreeError> {
        let path = self.target_path(label);
        self.add(repo, &["-B", branch], &path, &[base]).await
    }
}

#[cfg(test)]
#[path = "worktree_tests.rs"]
mod tests;
