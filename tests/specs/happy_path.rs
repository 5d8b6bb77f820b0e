// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S1: a task flows queued -> running -> completed with aggregated output

use crate::prelude::harness;
use fm_adapters::ScriptedRun;
use fm_core::{ExecutionStatus, Task};
use fm_storage::ExecutionStore;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn task_runs_to_completion_with_token_accounting() {
    let h = harness();
    h.backend.push_run(ScriptedRun::with_lines(vec![
        r#"{"type":"system","subtype":"init"}"#.to_string(),
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"ok"}]}}"#.to_string(),
        r#"{"type":"result","result":"done","is_error":false,"usage":{"input_tokens":10,"output_tokens":5}}"#.to_string(),
    ]));

    let task = Task::new("T1", "add log", "/p").with_description("add log");
    let id = h.dispatcher.queue_task(&task).unwrap();

    // Freshly queued
    assert_eq!(
        h.dispatcher.execution_status(&id).unwrap(),
        ExecutionStatus::Queued
    );

    let exec = h
        .dispatcher
        .wait_for_execution(&CancellationToken::new(), &id, Duration::from_millis(20))
        .await
        .unwrap();

    assert_eq!(exec.status, ExecutionStatus::Completed);
    assert_eq!(exec.tokens_input, 10);
    assert_eq!(exec.tokens_output, 5);
    assert!(exec.error_message.is_none());
    assert_eq!(h.backend.call_count(), 1);
    assert_eq!(h.quality.check_count(), 1);

    // The durable record agrees with what the dispatcher reported
    let stored = h.store.get(&id).unwrap();
    assert_eq!(stored.status, ExecutionStatus::Completed);
    assert_eq!(stored.tokens_input, 10);

    h.dispatcher.stop().await;
}

#[tokio::test]
async fn failed_backend_yields_failed_execution() {
    let h = harness();
    h.backend.push_run(ScriptedRun::fail("exhausted context window"));

    let task = Task::new("T2", "too big", "/p");
    let id = h.dispatcher.queue_task(&task).unwrap();

    let exec = h
        .dispatcher
        .wait_for_execution(&CancellationToken::new(), &id, Duration::from_millis(20))
        .await
        .unwrap();

    assert_eq!(exec.status, ExecutionStatus::Failed);
    assert_eq!(
        exec.error_message.as_deref(),
        Some("exhausted context window")
    );

    h.dispatcher.stop().await;
}
