// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git operations adapter

use crate::subprocess::{run_with_timeout, GIT_TIMEOUT};
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

/// Errors from git operations
#[derive(Debug, Error)]
pub enum GitError {
    #[error("git command failed to run: {0}")]
    Command(String),
    #[error("git {command} failed: {stderr}")]
    Failed { command: String, stderr: String },
    #[error("could not parse git output: {0}")]
    Parse(String),
}

/// Git operations the engine consumes.
///
/// Paths are passed per call so one adapter instance serves every project.
#[async_trait]
pub trait GitOps: Send + Sync + 'static {
    async fn is_repository(&self, repo: &Path) -> bool;
    async fn current_branch(&self, repo: &Path) -> Result<String, GitError>;
    async fn create_branch(&self, repo: &Path, name: &str) -> Result<(), GitError>;
    async fn switch_branch(&self, repo: &Path, name: &str) -> Result<(), GitError>;
    /// Stage everything and commit.
    async fn commit(&self, repo: &Path, message: &str) -> Result<(), GitError>;
    async fn has_uncommitted_changes(&self, repo: &Path) -> Result<bool, GitError>;
    async fn changed_files(&self, repo: &Path) -> Result<Vec<String>, GitError>;
    /// Commits on HEAD that are not reachable from `base`.
    async fn count_new_commits(&self, repo: &Path, base: &str) -> Result<u32, GitError>;
    async fn switch_to_default_branch_and_pull(&self, repo: &Path) -> Result<(), GitError>;
    /// `git checkout -B name base`.
    async fn create_or_reset_branch(
        &self,
        repo: &Path,
        name: &str,
        base: &str,
    ) -> Result<(), GitError>;
    async fn current_commit_sha(&self, repo: &Path) -> Result<String, GitError>;
}

/// [`GitOps`] backed by the `git` binary.
#[derive(Clone, Default)]
pub struct CliGit;

impl CliGit {
    pub fn new() -> Self {
        Self
    }

    async fn git(&self, repo: &Path, args: &[&str]) -> Result<String, GitError> {
        let description = format!("git {}", args.join(" "));
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(repo);

        let output = run_with_timeout(cmd, GIT_TIMEOUT, &description)
            .await
            .map_err(GitError::Command)?;
        if !output.status.success() {
            return Err(GitError::Failed {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Default branch from `origin/HEAD`, falling back to `main`.
    async fn default_branch(&self, repo: &Path) -> String {
        match self
            .git(repo, &["symbolic-ref", "--short", "refs/remotes/origin/HEAD"])
            .await
        {
            Ok(full) => full
                .strip_prefix("origin/")
                .unwrap_or(full.as_str())
                .to_string(),
            Err(_) => "main".to_string(),
        }
    }
}

#[async_trait]
impl GitOps for CliGit {
    async fn is_repository(&self, repo: &Path) -> bool {
        self.git(repo, &["rev-parse", "--git-dir"]).await.is_ok()
    }

    async fn current_branch(&self, repo: &Path) -> Result<String, GitError> {
        self.git(repo, &["rev-parse", "--abbrev-ref", "HEAD"]).await
    }

    async fn create_branch(&self, repo: &Path, name: &str) -> Result<(), GitError> {
        self.git(repo, &["branch", name]).await.map(|_| ())
    }

    async fn switch_branch(&self, repo: &Path, name: &str) -> Result<(), GitError> {
        self.git(repo, &["checkout", name]).await.map(|_| ())
    }

    async fn commit(&self, repo: &Path, message: &str) -> Result<(), GitError> {
        self.git(repo, &["add", "-A"]).await?;
        self.git(repo, &["commit", "-m", message]).await.map(|_| ())
    }

    async fn has_uncommitted_changes(&self, repo: &Path) -> Result<bool, GitError> {
        let status = self.git(repo, &["status", "--porcelain"]).await?;
        Ok(!status.is_empty())
    }

    async fn changed_files(&self, repo: &Path) -> Result<Vec<String>, GitError> {
        let status = self.git(repo, &["status", "--porcelain"]).await?;
        Ok(status
            .lines()
            .filter_map(|line| line.get(3..))
            .map(String::from)
            .collect())
    }

    async fn count_new_commits(&self, repo: &Path, base: &str) -> Result<u32, GitError> {
        let range = format!("{base}..HEAD");
        let count = self.git(repo, &["rev-list", "--count", &range]).await?;
        count
            .parse()
            .map_err(|_| GitError::Parse(format!("rev-list count: {count:?}")))
    }

    async fn switch_to_default_branch_and_pull(&self, repo: &Path) -> Result<(), GitError> {
        let branch = self.default_branch(repo).await;
        self.git(repo, &["checkout", &branch]).await?;

        let remotes = self.git(repo, &["remote"]).await?;
        if remotes.lines().any(|r| r == "origin") {
            self.git(repo, &["pull", "--ff-only"]).await?;
        }
        Ok(())
    }

    async fn create_or_reset_branch(
        &self,
        repo: &Path,
        name: &str,
        base: &str,
    ) -> Result<(), GitError> {
        self.git(repo, &["checkout", "-B", name, base])
            .await
            .map(|_| ())
    }

    async fn current_commit_sha(&self, repo: &Path) -> Result<String, GitError> {
        self.git(repo, &["rev-parse", "HEAD"]).await
    }
}

/// Configurable in-memory [`GitOps`] for tests.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeGit {
    pub is_repo: bool,
    pub clean: bool,
    branch: parking_lot::Mutex<String>,
    sha: String,
    calls: parking_lot::Mutex<Vec<String>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeGit {
    pub fn new() -> Self {
        Self {
            is_repo: true,
            clean: true,
            branch: parking_lot::Mutex::new("main".to_string()),
            sha: "0123456789abcdef0123456789abcdef01234567".to_string(),
            calls: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn not_a_repo() -> Self {
        Self {
            is_repo: false,
            ..Self::new()
        }
    }

    pub fn dirty() -> Self {
        Self {
            clean: false,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for FakeGit {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl GitOps for FakeGit {
    async fn is_repository(&self, _repo: &Path) -> bool {
        self.record("is_repository");
        self.is_repo
    }

    async fn current_branch(&self, _repo: &Path) -> Result<String, GitError> {
        self.record("current_branch");
        Ok(self.branch.lock().clone())
    }

    async fn create_branch(&self, _repo: &Path, name: &str) -> Result<(), GitError> {
        self.record(format!("create_branch {name}"));
        Ok(())
    }

    async fn switch_branch(&self, _repo: &Path, name: &str) -> Result<(), GitError> {
        self.record(format!("switch_branch {name}"));
        *self.branch.lock() = name.to_string();
        Ok(())
    }

    async fn commit(&self, _repo: &Path, message: &str) -> Result<(), GitError> {
        self.record(format!("commit {message}"));
        Ok(())
    }

    async fn has_uncommitted_changes(&self, _repo: &Path) -> Result<bool, GitError> {
        self.record("has_uncommitted_changes");
        Ok(!self.clean)
    }

    async fn changed_files(&self, _repo: &Path) -> Result<Vec<String>, GitError> {
        self.record("changed_files");
        Ok(Vec::new())
    }

    async fn count_new_commits(&self, _repo: &Path, _base: &str) -> Result<u32, GitError> {
        self.record("count_new_commits");
        Ok(0)
    }

    async fn switch_to_default_branch_and_pull(&self, _repo: &Path) -> Result<(), GitError> {
        self.record("switch_to_default_branch_and_pull");
        Ok(())
    }

    async fn create_or_reset_branch(
        &self,
        _repo: &Path,
        name: &str,
        base: &str,
    ) -> Result<(), GitError> {
        self.record(format!("create_or_reset_branch {name} {base}"));
        *self.branch.lock() = name.to_string();
        Ok(())
    }

    async fn current_commit_sha(&self, _repo: &Path) -> Result<String, GitError> {
        self.record("current_commit_sha");
        Ok(self.sha.clone())
    }
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
