// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task dispatcher: enqueue, worker registry, stale recovery, shutdown.
//!
//! Workers are kept in an append-mostly map keyed by project path and never
//! removed during the process lifetime. Enqueueing holds a dedicated mutex
//! across the duplicate check and the insert, so concurrent `queue_task`
//! calls for the same task id yield exactly one queued execution.

use crate::decompose::Decomposer;
use crate::error::EngineError;
use crate::runner::TaskRunner;
use crate::worker::ProjectWorker;
use chrono::Utc;
use fm_core::{Execution, ExecutionId, ExecutionStatus, IdGen, Task, UuidIdGen};
use fm_storage::ExecutionStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Dispatcher tunables, injected at construction.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// A `running` execution older than this is considered orphaned by a
    /// crashed process and reset to `queued` on [`Dispatcher::start`].
    pub stale_after: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(30 * 60),
        }
    }
}

/// Accepts tasks and manages the per-project workers.
pub struct Dispatcher<S, R, I = UuidIdGen> {
    store: Arc<S>,
    runner: Arc<R>,
    ids: I,
    config: DispatcherConfig,
    decomposer: Option<Arc<dyn Decomposer>>,
    workers: Mutex<HashMap<PathBuf, ProjectWorker>>,
    enqueue_lock: Mutex<()>,
    cancel: CancellationToken,
}

impl<S, R> Dispatcher<S, R, UuidIdGen>
where
    S: ExecutionStore,
    R: TaskRunner,
{
    pub fn new(store: Arc<S>, runner: Arc<R>, config: DispatcherConfig) -> Self {
        Self::with_ids(store, runner, UuidIdGen, config)
    }
}

impl<S, R, I> Dispatcher<S, R, I>
where
    S: ExecutionStore,
    R: TaskRunner,
    I: IdGen + 'static,
{
    pub fn with_ids(store: Arc<S>, runner: Arc<R>, ids: I, config: DispatcherConfig) -> Self {
        Self {
            store,
            runner,
            ids,
            config,
            decomposer: None,
            workers: Mutex::new(HashMap::new()),
            enqueue_lock: Mutex::new(()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_decomposer(mut self, decomposer: Arc<dyn Decomposer>) -> Self {
        self.decomposer = Some(decomposer);
        self
    }

    /// Root cancellation token shared by all workers.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// One-time crash recovery: reset stale `running` executions to
    /// `queued` and wake their projects. Idempotent; returns how many
    /// executions were reset.
    pub fn start(&self) -> Result<usize, EngineError> {
        let stale = self.store.stale_running(self.config.stale_after)?;
        let mut reset = 0;
        for exec in stale {
            match self.store.update_status(
                &exec.id,
                ExecutionStatus::Queued,
                Some("requeued: execution was left running by a previous process"),
            ) {
                Ok(()) => {
                    tracing::info!(
                        execution = %exec.id,
                        task = %exec.task_id,
                        "stale running execution reset to queued"
                    );
                    reset += 1;
                    self.wake_project(&exec.project_path);
                }
                Err(e) => {
                    tracing::warn!(execution = %exec.id, error = %e, "stale reset failed");
                }
            }
        }
        Ok(reset)
    }

    /// Queue a task for execution, returning the new execution id.
    ///
    /// Idempotent per task id: a task with a queued or running execution is
    /// rejected with [`EngineError::DuplicateTask`]. Must be called from
    /// within a tokio runtime (workers are spawned lazily).
    pub fn queue_task(&self, task: &Task) -> Result<ExecutionId, EngineError> {
        let execution_id = {
            let _guard = self.enqueue_lock.lock();

            if self.store.is_task_queued(&task.id)? {
                return Err(EngineError::DuplicateTask(task.id.clone()));
            }

            if let Some(subtasks) = self.decomposition(task) {
                let parent_id = ExecutionId::new(self.ids.next());
                let now = Utc::now();
                let mut parent = Execution::from_task(parent_id.clone(), task, now);
                parent.status = ExecutionStatus::Decomposed;
                self.store.save(&parent)?;

                tracing::info!(
                    task = %task.id,
                    parts = subtasks.len(),
                    "task decomposed into independent subtasks"
                );
                for (i, subtask) in subtasks.iter().enumerate() {
                    let mut exec =
                        Execution::from_task(ExecutionId::new(self.ids.next()), subtask, now);
                    // Stagger created_at so FIFO ordering matches list order
                    exec.created_at = now + chrono::Duration::milliseconds(i as i64 + 1);
                    exec.updated_at = exec.created_at;
                    self.store.save(&exec)?;
                }
                parent_id
            } else {
                let exec =
                    Execution::from_task(ExecutionId::new(self.ids.next()), task, Utc::now());
                self.store.save(&exec)?;
                tracing::info!(task = %task.id, execution = %exec.id, "task queued");
                exec.id
            }
        };

        self.wake_project(&task.project_path);
        Ok(execution_id)
    }

    fn decomposition(&self, task: &Task) -> Option<Vec<Task>> {
        let decomposer = self.decomposer.as_ref()?;
        if !decomposer.should_split(task) {
            return None;
        }
        let subtasks = decomposer.split(task);
        if subtasks.len() < 2 {
            return None;
        }
        Some(subtasks)
    }

    /// Ensure a worker exists for the project and signal it. Workers are
    /// never removed, which keeps the registry race-free.
    fn wake_project(&self, project: &Path) {
        let mut workers = self.workers.lock();
        let worker = workers.entry(project.to_path_buf()).or_insert_with(|| {
            ProjectWorker::spawn(
                project.to_path_buf(),
                Arc::clone(&self.store),
                Arc::clone(&self.runner),
                self.cancel.child_token(),
            )
        });
        worker.signal();
    }

    pub fn get_execution(&self, id: &ExecutionId) -> Result<Execution, EngineError> {
        Ok(self.store.get(id)?)
    }

    pub fn execution_status(&self, id: &ExecutionId) -> Result<ExecutionStatus, EngineError> {
        Ok(self.store.get(id)?.status)
    }

    /// Poll until the execution reaches a terminal status, the dispatcher is
    /// stopped, or `cancel` fires.
    pub async fn wait_for_execution(
        &self,
        cancel: &CancellationToken,
        id: &ExecutionId,
        poll_interval: Duration,
    ) -> Result<Execution, EngineError> {
        loop {
            let exec = self.store.get(id)?;
            if exec.status.is_terminal() {
                return Ok(exec);
            }
            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                _ = cancel.cancelled() => {
                    return Err(EngineError::Cancelled("wait_for_execution".to_string()));
                }
                _ = self.cancel.cancelled() => {
                    return Err(EngineError::Cancelled("dispatcher stopped".to_string()));
                }
            }
        }
    }

    /// Stop all workers and wait for them to exit.
    pub async fn stop(&self) {
        tracing::info!("dispatcher stopping");
        self.cancel.cancel();

        let handles: Vec<_> = {
            let workers = self.workers.lock();
            workers
                .values()
                .filter_map(|worker| {
                    worker.request_stop();
                    worker.take_handle()
                })
                .collect()
        };
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "worker join failed");
            }
        }
        tracing::info!("dispatcher stopped");
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
