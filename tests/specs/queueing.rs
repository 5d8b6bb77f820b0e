// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S2: duplicate enqueue yields exactly one queued execution

use crate::prelude::harness;
use fm_adapters::ScriptedRun;
use fm_core::{ExecutionStatus, Task};
use fm_engine::EngineError;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn concurrent_duplicate_enqueue() {
    let h = harness();
    // Keep the first execution occupied so the duplicate check sees it
    h.backend
        .push_run(ScriptedRun::succeed("slow").with_delay(Duration::from_millis(300)));

    let mut joins = Vec::new();
    for _ in 0..2 {
        let dispatcher = Arc::clone(&h.dispatcher);
        joins.push(tokio::spawn(async move {
            dispatcher.queue_task(&Task::new("T1", "add log", "/p"))
        }));
    }

    let mut queued_ids = Vec::new();
    let mut duplicates = 0;
    for join in joins {
        match join.await.unwrap() {
            Ok(id) => queued_ids.push(id),
            Err(EngineError::DuplicateTask(_)) => duplicates += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(queued_ids.len(), 1, "exactly one enqueue succeeds");
    assert_eq!(duplicates, 1);

    let exec = h
        .dispatcher
        .wait_for_execution(
            &CancellationToken::new(),
            &queued_ids[0],
            Duration::from_millis(20),
        )
        .await
        .unwrap();
    assert_eq!(exec.status, ExecutionStatus::Completed);

    h.dispatcher.stop().await;
}

#[tokio::test]
async fn same_task_can_requeue_after_terminal() {
    let h = harness();

    let task = Task::new("T1", "add log", "/p");
    let first = h.dispatcher.queue_task(&task).unwrap();
    h.dispatcher
        .wait_for_execution(&CancellationToken::new(), &first, Duration::from_millis(20))
        .await
        .unwrap();

    // Terminal execution no longer blocks a fresh attempt
    let second = h.dispatcher.queue_task(&task).unwrap();
    assert_ne!(first, second);

    h.dispatcher.stop().await;
}
