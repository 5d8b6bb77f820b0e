// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::PathBuf;
use std::process::Command as StdCommand;

fn sh(repo: &Path, args: &[&str]) {
    let status = StdCommand::new("git")
        .args(args)
        .current_dir(repo)
        .status()
        .unwrap();
    assert!(status.success(), "git {args:?} failed");
}

/// Initialize a repository with one commit.
fn init_repo() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let repo = dir.path().to_path_buf();
    sh(&repo, &["init", "-q"]);
    sh(&repo, &["config", "user.email", "test@example.com"]);
    sh(&repo, &["config", "user.name", "Test"]);
    std::fs::write(repo.join("README.md"), "hello\n").unwrap();
    sh(&repo, &["add", "-A"]);
    sh(&repo, &["commit", "-q", "-m", "init"]);
    (dir, repo)
}

#[tokio::test]
async fn is_repository_detects_repos() {
    let (_dir, repo) = init_repo();
    let git = CliGit::new();
    assert!(git.is_repository(&repo).await);

    let plain = tempfile::tempdir().unwrap();
    assert!(!git.is_repository(plain.path()).await);
}

#[tokio::test]
async fn clean_tree_has_no_uncommitted_changes() {
    let (_dir, repo) = init_repo();
    let git = CliGit::new();
    assert!(!git.has_uncommitted_changes(&repo).await.unwrap());

    std::fs::write(repo.join("new.txt"), "x\n").unwrap();
    assert!(git.has_uncommitted_changes(&repo).await.unwrap());

    let changed = git.changed_files(&repo).await.unwrap();
    assert_eq!(changed, vec!["new.txt".to_string()]);
}

#[tokio::test]
async fn branch_lifecycle() {
    let (_dir, repo) = init_repo();
    let git = CliGit::new();

    let initial = git.current_branch(&repo).await.unwrap();
    git.create_branch(&repo, "feature/x").await.unwrap();
    git.switch_branch(&repo, "feature/x").await.unwrap();
    assert_eq!(git.current_branch(&repo).await.unwrap(), "feature/x");

    git.switch_branch(&repo, &initial).await.unwrap();
    assert_eq!(git.current_branch(&repo).await.unwrap(), initial);
}

#[tokio::test]
async fn commit_and_count_new_commits() {
    let (_dir, repo) = init_repo();
    let git = CliGit::new();

    let base = git.current_commit_sha(&repo).await.unwrap();
    assert_eq!(base.len(), 40);

    std::fs::write(repo.join("a.txt"), "a\n").unwrap();
    git.commit(&repo, "add a").await.unwrap();
    std::fs::write(repo.join("b.txt"), "b\n").unwrap();
    git.commit(&repo, "add b").await.unwrap();

    assert_eq!(git.count_new_commits(&repo, &base).await.unwrap(), 2);
    assert!(!git.has_uncommitted_changes(&repo).await.unwrap());
}

#[tokio::test]
async fn create_or_reset_branch_points_at_base() {
    let (_dir, repo) = init_repo();
    let git = CliGit::new();

    let base = git.current_commit_sha(&repo).await.unwrap();
    std::fs::write(repo.join("a.txt"), "a\n").unwrap();
    git.commit(&repo, "add a").await.unwrap();

    git.create_or_reset_branch(&repo, "work", &base).await.unwrap();
    assert_eq!(git.current_branch(&repo).await.unwrap(), "work");
    assert_eq!(git.current_commit_sha(&repo).await.unwrap(), base);
}

#[tokio::test]
async fn failed_command_reports_stderr() {
    let (_dir, repo) = init_repo();
    let git = CliGit::new();

    let err = git.switch_branch(&repo, "no-such-branch").await.unwrap_err();
    match err {
        GitError::Failed { command, stderr } => {
            assert!(command.contains("checkout"));
            assert!(!stderr.is_empty());
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn fake_git_records_calls() {
    let git = FakeGit::dirty();
    let repo = Path::new("/p");

    assert!(git.is_repository(repo).await);
    assert!(git.has_uncommitted_changes(repo).await.unwrap());
    git.switch_branch(repo, "feature").await.unwrap();
    assert_eq!(git.current_branch(repo).await.unwrap(), "feature");

    let calls = git.calls();
    assert!(calls.contains(&"is_repository".to_string()));
    assert!(calls.contains(&"switch_branch feature".to_string()));
}
