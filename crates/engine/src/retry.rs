// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rate-limit retry scheduler.
//!
//! A transient, in-memory parking lot for tasks that hit an upstream rate
//! limit. This is deliberately separate from the durable execution queue:
//! the store stays a simple FIFO per project, and all wall-clock scheduling
//! lives here. Entries do not survive a restart.

use fm_core::{Clock, Task, TaskId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Rate-limit details reported by the backend.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// Wall-clock milliseconds when the limit resets.
    pub reset_at_ms: u64,
    pub reason: String,
}

/// One parked task.
#[derive(Debug, Clone)]
pub struct PendingRetry {
    pub task: Task,
    pub retry_after_ms: u64,
    /// How many times this task has been parked (>= 1).
    pub attempts: u32,
    pub reason: String,
}

/// Scheduler tunables, injected at construction.
#[derive(Debug, Clone)]
pub struct RetrySchedulerConfig {
    /// Parks beyond this count surface through the expired callback.
    pub max_retries: u32,
    /// Safety margin added on top of the reported reset time.
    pub retry_buffer: Duration,
    /// Background sweep interval.
    pub check_interval: Duration,
}

impl Default for RetrySchedulerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_buffer: Duration::from_secs(30),
            check_interval: Duration::from_secs(1),
        }
    }
}

/// Observability snapshot of the retry queue.
#[derive(Debug, Clone)]
pub struct RetryStatus {
    pub entries: Vec<PendingRetry>,
    pub running: bool,
}

/// Callback invoked with the task and its park count.
pub type RetryCallback = Arc<dyn Fn(Task, u32) + Send + Sync>;

/// Re-queues rate-limited tasks once their reset time has elapsed.
pub struct RetryScheduler<C: Clock> {
    clock: C,
    config: RetrySchedulerConfig,
    queue: Arc<Mutex<HashMap<TaskId, PendingRetry>>>,
    retry_callback: RetryCallback,
    expired_callback: RetryCallback,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Clock> RetryScheduler<C> {
    pub fn new(
        clock: C,
        config: RetrySchedulerConfig,
        retry_callback: RetryCallback,
        expired_callback: RetryCallback,
    ) -> Self {
        Self {
            clock,
            config,
            queue: Arc::new(Mutex::new(HashMap::new())),
            retry_callback,
            expired_callback,
            running: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    /// Park a task until its rate limit resets.
    ///
    /// At most one entry exists per task id; re-parking replaces the
    /// deadline and increments the attempt count. A task parked more than
    /// `max_retries` times is handed to the expired callback instead.
    pub fn queue_task(&self, task: Task, info: RateLimitInfo) {
        let attempts = {
            let queue = self.queue.lock();
            queue.get(&task.id).map(|e| e.attempts).unwrap_or(0) + 1
        };

        if attempts > self.config.max_retries {
            self.queue.lock().remove(&task.id);
            tracing::warn!(
                task = %task.id,
                attempts,
                "rate-limit retries exhausted; surfacing as expired"
            );
            (self.expired_callback)(task, attempts);
            return;
        }

        let retry_after_ms = info.reset_at_ms + self.config.retry_buffer.as_millis() as u64;
        tracing::info!(
            task = %task.id,
            attempts,
            retry_after_ms,
            reason = %info.reason,
            "task parked for rate-limit retry"
        );
        let entry = PendingRetry {
            retry_after_ms,
            attempts,
            reason: info.reason,
            task,
        };
        self.queue.lock().insert(entry.task.id.clone(), entry);
    }

    /// One sweep: re-queue everything due, expire everything over the limit.
    /// Called by the background loop; exposed for deterministic tests.
    pub fn tick(&self) {
        let now = self.clock.epoch_ms();
        let (due, expired) = sweep(&self.queue, now, self.config.max_retries);
        dispatch(due, expired, &self.retry_callback, &self.expired_callback);
    }

    /// Start the background sweep loop. Safe to call once.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let queue = Arc::clone(&self.queue);
        let clock = self.clock.clone();
        let max_retries = self.config.max_retries;
        let interval = self.config.check_interval;
        let retry_callback = Arc::clone(&self.retry_callback);
        let expired_callback = Arc::clone(&self.expired_callback);
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let (due, expired) = sweep(&queue, clock.epoch_ms(), max_retries);
                        dispatch(due, expired, &retry_callback, &expired_callback);
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        });
        *self.handle.lock() = Some(handle);
    }

    /// Stop the background loop and wait for it.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "retry scheduler join failed");
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }

    /// Earliest pending retry time, if any. Safe for concurrent callers.
    pub fn next_retry_time(&self) -> Option<u64> {
        self.queue.lock().values().map(|e| e.retry_after_ms).min()
    }

    /// Snapshot of the queue plus the running flag.
    pub fn status(&self) -> RetryStatus {
        RetryStatus {
            entries: self.queue.lock().values().cloned().collect(),
            running: self.running.load(Ordering::SeqCst),
        }
    }
}

fn dispatch(
    due: Vec<PendingRetry>,
    expired: Vec<PendingRetry>,
    retry_callback: &RetryCallback,
    expired_callback: &RetryCallback,
) {
    for entry in due {
        tracing::info!(task = %entry.task.id, attempts = entry.attempts, "retrying parked task");
        (retry_callback)(entry.task, entry.attempts);
    }
    for entry in expired {
        tracing::warn!(task = %entry.task.id, attempts = entry.attempts, "parked task expired");
        (expired_callback)(entry.task, entry.attempts);
    }
}

fn sweep(
    queue: &Mutex<HashMap<TaskId, PendingRetry>>,
    now_ms: u64,
    max_retries: u32,
) -> (Vec<PendingRetry>, Vec<PendingRetry>) {
    let mut queue = queue.lock();

    let due_ids: Vec<TaskId> = queue
        .values()
        .filter(|e| e.attempts <= max_retries && e.retry_after_ms <= now_ms)
        .map(|e| e.task.id.clone())
        .collect();
    let mut due: Vec<PendingRetry> = due_ids.into_iter().filter_map(|id| queue.remove(&id)).collect();
    due.sort_by_key(|e| e.retry_after_ms);

    let expired_ids: Vec<TaskId> = queue
        .values()
        .filter(|e| e.attempts > max_retries)
        .map(|e| e.task.id.clone())
        .collect();
    let expired: Vec<PendingRetry> = expired_ids
        .into_iter()
        .filter_map(|id| queue.remove(&id))
        .collect();

    (due, expired)
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
