// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the behavioral specs

use fm_adapters::{FakeBackend, FakeGit, FakeQualityChecker, GitWorktrees};
use fm_core::{NullProgress, SequentialIdGen};
use fm_engine::{Dispatcher, DispatcherConfig, ResearchConfig, Runner, RunnerConfig, RunnerDeps};
use fm_storage::JsonlStore;
use std::sync::Arc;

pub type SpecRunner = Runner<FakeBackend, FakeGit, GitWorktrees, FakeQualityChecker>;
pub type SpecDispatcher = Dispatcher<JsonlStore, SpecRunner, SequentialIdGen>;

pub struct Harness {
    pub store: Arc<JsonlStore>,
    pub backend: Arc<FakeBackend>,
    pub quality: Arc<FakeQualityChecker>,
    pub dispatcher: Arc<SpecDispatcher>,
    _dir: tempfile::TempDir,
}

/// A full in-process stack: scripted backend, fake git, real store,
/// dispatcher, and workers. Research and self-review are disabled so
/// backend invocations map 1:1 to scripted runs.
pub fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonlStore::open(dir.path().join("executions.jsonl")).unwrap());
    let backend = Arc::new(FakeBackend::new());
    let quality = Arc::new(FakeQualityChecker::passing());

    let deps = RunnerDeps::<FakeBackend, FakeGit, GitWorktrees, FakeQualityChecker> {
        backend: Arc::clone(&backend),
        git: Arc::new(FakeGit::new()),
        worktrees: None,
        quality: Some(Arc::clone(&quality)),
        progress: Arc::new(NullProgress),
    };
    let config = RunnerConfig {
        research: ResearchConfig {
            enabled: false,
            ..ResearchConfig::default()
        },
        self_review_enabled: false,
        ..RunnerConfig::default()
    };
    let runner = Arc::new(Runner::new(deps, config));

    let dispatcher = Arc::new(Dispatcher::with_ids(
        Arc::clone(&store),
        runner,
        SequentialIdGen::new("exec"),
        DispatcherConfig::default(),
    ));

    Harness {
        store,
        backend,
        quality,
        dispatcher,
        _dir: dir,
    }
}
