// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-project serial worker.
//!
//! One worker owns one project's queue. It blocks on a capacity-1 signal
//! channel, so repeated signals coalesce, and drains the queue head-by-head:
//! claim (`queued -> running`), run, write the terminal status back. The
//! claim transition plus a compare-and-swap processing flag make accidental
//! double-entry impossible.

use crate::runner::TaskRunner;
use fm_core::ExecutionStatus;
use fm_storage::{ExecutionStore, StoreError};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Single-threaded consumer of one project's execution queue.
pub struct ProjectWorker {
    project: PathBuf,
    signal_tx: mpsc::Sender<()>,
    stop_tx: mpsc::Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ProjectWorker {
    /// Spawn the worker loop for `project`.
    pub fn spawn<S, R>(
        project: PathBuf,
        store: Arc<S>,
        runner: Arc<R>,
        cancel: CancellationToken,
    ) -> Self
    where
        S: ExecutionStore,
        R: TaskRunner,
    {
        let (signal_tx, signal_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let handle = tokio::spawn(run_loop(
            project.clone(),
            store,
            runner,
            cancel,
            signal_rx,
            stop_rx,
        ));
        Self {
            project,
            signal_tx,
            stop_tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn project(&self) -> &Path {
        &self.project
    }

    /// Wake the worker. Non-blocking; signals coalesce while one is
    /// pending, so it is safe to call on every enqueue.
    pub fn signal(&self) {
        let _ = self.signal_tx.try_send(());
    }

    /// Ask the loop to stop without waiting for it.
    pub fn request_stop(&self) {
        let _ = self.stop_tx.try_send(());
    }

    /// Take the loop handle for joining. Used by the dispatcher's shutdown.
    pub fn take_handle(&self) -> Option<JoinHandle<()>> {
        self.handle.lock().take()
    }

    /// Stop the worker and wait for its loop to exit.
    pub async fn stop(&self) {
        self.request_stop();
        let handle = self.take_handle();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(project = %self.project.display(), error = %e, "worker join failed");
            }
        }
    }
}

async fn run_loop<S, R>(
    project: PathBuf,
    store: Arc<S>,
    runner: Arc<R>,
    cancel: CancellationToken,
    mut signal_rx: mpsc::Receiver<()>,
    mut stop_rx: mpsc::Receiver<()>,
) where
    S: ExecutionStore,
    R: TaskRunner,
{
    tracing::debug!(project = %project.display(), "project worker started");
    let processing = AtomicBool::new(false);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = stop_rx.recv() => break,
            received = signal_rx.recv() => match received {
                Some(()) => drain(&project, &store, &runner, &cancel, &processing).await,
                None => break,
            },
        }
    }
    tracing::debug!(project = %project.display(), "project worker stopped");
}

/// Process the project queue until it is empty or we are stopping.
async fn drain<S, R>(
    project: &Path,
    store: &Arc<S>,
    runner: &Arc<R>,
    cancel: &CancellationToken,
    processing: &AtomicBool,
) where
    S: ExecutionStore,
    R: TaskRunner,
{
    if processing
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        // Already draining; the queued signal will be handled there.
        return;
    }

    while !cancel.is_cancelled() {
        let head = match store.queued_for_project(project, 1) {
            Ok(execs) => execs.into_iter().next(),
            Err(e) => {
                tracing::error!(project = %project.display(), error = %e, "queue query failed");
                break;
            }
        };
        let Some(exec) = head else { break };

        // Unique claim: exactly one worker moves queued -> running.
        match store.update_status(&exec.id, ExecutionStatus::Running, None) {
            Ok(()) => {}
            Err(StoreError::Io(e)) => {
                tracing::error!(execution = %exec.id, error = %e, "claim write failed");
                break;
            }
            Err(e) => {
                tracing::warn!(execution = %exec.id, error = %e, "claim conflict; skipping");
                continue;
            }
        }

        tracing::info!(
            execution = %exec.id,
            task = %exec.task_id,
            project = %project.display(),
            "execution started"
        );

        let task = exec.to_task();
        let outcome = runner.execute(cancel, &task).await;

        let (status, message) = match &outcome {
            Ok(result) if result.success => (ExecutionStatus::Completed, None),
            Ok(result) => (failed_status(cancel), result.error.clone()),
            Err(e) => (failed_status(cancel), Some(e.to_string())),
        };

        if let Ok(result) = &outcome {
            if let Err(e) = store.record_result(&exec.id, &result.result_update()) {
                tracing::error!(execution = %exec.id, error = %e, "result write failed");
            }
        }

        match store.update_status(&exec.id, status, message.as_deref()) {
            Ok(()) => {
                tracing::info!(execution = %exec.id, %status, "execution finished");
            }
            Err(e) => {
                tracing::error!(execution = %exec.id, error = %e, "terminal status write failed");
            }
        }
    }

    processing.store(false, Ordering::SeqCst);
}

fn failed_status(cancel: &CancellationToken) -> ExecutionStatus {
    if cancel.is_cancelled() {
        ExecutionStatus::Cancelled
    } else {
        ExecutionStatus::Failed
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
