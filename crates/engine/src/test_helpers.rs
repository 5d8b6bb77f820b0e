// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for engine tests

use crate::error::EngineError;
use crate::runner::TaskRunner;
use fm_core::{Execution, ExecutionId, ExecutionResult, Task, TaskId};
use fm_storage::{ExecutionStore, JsonlStore};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Scripted [`TaskRunner`] that records call order and tracks concurrency.
pub struct StubRunner {
    results: Mutex<VecDeque<Result<ExecutionResult, EngineError>>>,
    calls: Mutex<Vec<TaskId>>,
    delay: Duration,
    running: AtomicU32,
    max_running: AtomicU32,
}

impl StubRunner {
    pub fn new() -> Self {
        Self {
            results: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            running: AtomicU32::new(0),
            max_running: AtomicU32::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push(&self, result: Result<ExecutionResult, EngineError>) {
        self.results.lock().push_back(result);
    }

    pub fn calls(&self) -> Vec<TaskId> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Highest number of concurrently running executions observed.
    pub fn max_running(&self) -> u32 {
        self.max_running.load(Ordering::SeqCst)
    }
}

impl Default for StubRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TaskRunner for StubRunner {
    async fn execute(
        &self,
        _cancel: &CancellationToken,
        task: &Task,
    ) -> Result<ExecutionResult, EngineError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().push(task.id.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        self.results.lock().pop_front().unwrap_or_else(|| {
            Ok(ExecutionResult {
                task_id: task.id.clone(),
                success: true,
                output: "done".into(),
                tokens_input: 3,
                tokens_output: 2,
                ..ExecutionResult::default()
            })
        })
    }
}

pub fn temp_store(dir: &tempfile::TempDir) -> Arc<JsonlStore> {
    Arc::new(JsonlStore::open(dir.path().join("executions.jsonl")).unwrap())
}

pub fn queue_execution(store: &JsonlStore, id: &str, task_id: &str, project: &str) -> ExecutionId {
    let task = Task::new(task_id, "title", project);
    let exec = Execution::from_task(id, &task, chrono::Utc::now());
    store.save(&exec).unwrap();
    exec.id
}

pub async fn wait_terminal(store: &JsonlStore, id: &ExecutionId) -> Execution {
    for _ in 0..250 {
        let exec = store.get(id).unwrap();
        if exec.status.is_terminal() {
            return exec;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("execution {id} never reached a terminal status");
}
