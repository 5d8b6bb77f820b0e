// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S5: stopping the dispatcher cancels in-flight work promptly

use crate::prelude::harness;
use fm_adapters::ScriptedRun;
use fm_core::ExecutionStatus;
use fm_core::Task;
use fm_storage::ExecutionStore;
use std::time::{Duration, Instant};

#[tokio::test]
async fn stop_cancels_running_execution() {
    let h = harness();
    h.backend
        .push_run(ScriptedRun::succeed("never finishes").with_delay(Duration::from_secs(30)));

    let id = h
        .dispatcher
        .queue_task(&Task::new("T5", "long haul", "/p"))
        .unwrap();

    // Let the worker claim and start the backend run
    for _ in 0..100 {
        if h.dispatcher.execution_status(&id).unwrap() == ExecutionStatus::Running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(
        h.dispatcher.execution_status(&id).unwrap(),
        ExecutionStatus::Running
    );

    let start = Instant::now();
    h.dispatcher.stop().await;
    assert!(
        start.elapsed() < Duration::from_secs(5),
        "stop must not wait out the backend delay"
    );

    let exec = h.store.get(&id).unwrap();
    assert_eq!(exec.status, ExecutionStatus::Cancelled);
    assert!(exec.error_message.is_some());
}
