// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fm_adapters::{FakeBackend, FakeGit};
use std::path::PathBuf;

fn project() -> PathBuf {
    PathBuf::from("/p")
}

#[tokio::test]
async fn all_checks_pass() {
    let backend = FakeBackend::new();
    let git = FakeGit::new();
    run_preflight(&backend, &git, &project(), &PreflightOptions::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn missing_backend_fails_first() {
    let backend = FakeBackend::unavailable();
    // Even with a broken repo, the backend check reports first
    let git = FakeGit::not_a_repo();

    let err = run_preflight(&backend, &git, &project(), &PreflightOptions::default())
        .await
        .unwrap_err();
    match err {
        EngineError::Preflight { check, message } => {
            assert_eq!(check, "backend_cli");
            assert!(message.contains("fake"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn non_repository_fails() {
    let backend = FakeBackend::new();
    let git = FakeGit::not_a_repo();

    let err = run_preflight(&backend, &git, &project(), &PreflightOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Preflight { ref check, .. } if check == "git_repository"
    ));
}

#[tokio::test]
async fn dirty_tree_fails_unless_skipped() {
    let backend = FakeBackend::new();
    let git = FakeGit::dirty();

    let err = run_preflight(&backend, &git, &project(), &PreflightOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Preflight { ref check, .. } if check == "git_clean"
    ));

    // Worktree mode skips the clean check
    run_preflight(
        &backend,
        &git,
        &project(),
        &PreflightOptions {
            skip_git_clean: true,
        },
    )
    .await
    .unwrap();
}
