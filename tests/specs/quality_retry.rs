// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S3: quality-gate failure triggers one retry with feedback, then passes

use crate::prelude::harness;
use fm_adapters::{FakeQualityChecker, ScriptedRun};
use fm_core::{ExecutionStatus, Task};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn retry_with_feedback_then_terminal_completed() {
    let h = harness();
    h.backend.push_run(ScriptedRun::succeed("first run"));
    h.backend.push_run(ScriptedRun::succeed("second run"));
    h.quality
        .push_outcome(FakeQualityChecker::retryable("missing test"));
    // Next check falls through to the default pass

    let task = Task::new("T3", "add endpoint", "/p");
    let id = h.dispatcher.queue_task(&task).unwrap();

    let exec = h
        .dispatcher
        .wait_for_execution(&CancellationToken::new(), &id, Duration::from_millis(20))
        .await
        .unwrap();

    assert_eq!(exec.status, ExecutionStatus::Completed);
    assert_eq!(h.backend.call_count(), 2, "backend invoked exactly twice");
    let prompts = h.backend.prompts();
    assert!(
        prompts[1].contains("missing test"),
        "retry prompt carries the gate feedback"
    );
    assert_eq!(h.quality.check_count(), 2);

    h.dispatcher.stop().await;
}

#[tokio::test]
async fn exhausted_gates_fail_the_execution() {
    let h = harness();
    for _ in 0..3 {
        h.quality
            .push_outcome(FakeQualityChecker::retryable("still broken"));
    }

    let task = Task::new("T4", "hopeless", "/p");
    let id = h.dispatcher.queue_task(&task).unwrap();

    let exec = h
        .dispatcher
        .wait_for_execution(&CancellationToken::new(), &id, Duration::from_millis(20))
        .await
        .unwrap();

    assert_eq!(exec.status, ExecutionStatus::Failed);
    assert_eq!(
        exec.error_message.as_deref(),
        Some("quality gates failed after 3 attempts")
    );

    h.dispatcher.stop().await;
}
