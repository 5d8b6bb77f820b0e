// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S6: stale running executions are reclaimed at startup

use fm_adapters::{FakeBackend, FakeGit, FakeQualityChecker, GitWorktrees};
use fm_core::{Execution, ExecutionId, ExecutionStatus, NullProgress, SequentialIdGen, Task};
use fm_engine::{Dispatcher, DispatcherConfig, ResearchConfig, Runner, RunnerConfig, RunnerDeps};
use fm_storage::{ExecutionStore, JsonlStore};
use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn stale_running_rows_are_requeued_and_rerun() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("executions.jsonl");

    // Two running rows older than the stale threshold, one younger
    let now = chrono::Utc::now();
    let mut file = std::fs::File::create(&path).unwrap();
    for (id, task_id, minutes) in [
        ("exec-a", "T-A", 45i64),
        ("exec-b", "T-B", 60),
        ("exec-c", "T-C", 5),
    ] {
        let task = Task::new(task_id, "recover me", "/p");
        let mut exec = Execution::from_task(id, &task, now);
        exec.status = ExecutionStatus::Running;
        exec.updated_at = now - chrono::Duration::minutes(minutes);
        writeln!(file, "{}", serde_json::to_string(&exec).unwrap()).unwrap();
    }
    drop(file);

    let store = Arc::new(JsonlStore::open(&path).unwrap());
    let backend = Arc::new(FakeBackend::new());
    let deps = RunnerDeps::<FakeBackend, FakeGit, GitWorktrees, FakeQualityChecker> {
        backend: Arc::clone(&backend),
        git: Arc::new(FakeGit::new()),
        worktrees: None,
        quality: None,
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
    let dispatcher = Dispatcher::with_ids(
        Arc::clone(&store),
        runner,
        SequentialIdGen::new("exec"),
        DispatcherConfig::default(),
    );

    // Startup recovery requeues exactly the two stale rows
    assert_eq!(dispatcher.start().unwrap(), 2);
    assert_eq!(
        store.get(&ExecutionId::new("exec-c")).unwrap().status,
        ExecutionStatus::Running
    );
    assert!(store
        .stale_running(Duration::from_secs(30 * 60))
        .unwrap()
        .is_empty());

    // Recovery is idempotent
    assert_eq!(dispatcher.start().unwrap(), 0);

    // The requeued executions run again (at-least-once semantics)
    let cancel = CancellationToken::new();
    for id in ["exec-a", "exec-b"] {
        let exec = dispatcher
            .wait_for_execution(&cancel, &ExecutionId::new(id), Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(exec.status, ExecutionStatus::Completed);
        assert!(exec.error_message.is_none());
    }

    dispatcher.stop().await;
}
