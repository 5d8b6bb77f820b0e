// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL execution log with replay-on-open.
//!
//! Every mutation appends one full `Execution` snapshot as a line of JSON;
//! opening the log replays all lines and keeps the last snapshot per id.
//! Corrupt lines (e.g. a torn write from a crash) are skipped with a
//! warning so a damaged tail never blocks startup.

use crate::store::{ExecutionStore, StoreError};
use chrono::Utc;
use fm_core::{Execution, ExecutionId, ExecutionStatus, ResultUpdate, TaskId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// File-backed [`ExecutionStore`].
pub struct JsonlStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

struct Inner {
    file: File,
    index: HashMap<ExecutionId, Execution>,
}

impl JsonlStore {
    /// Open (or create) the log at `path`, replaying any existing entries.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut index = HashMap::new();
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for (line_no, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Execution>(&line) {
                    Ok(exec) => {
                        index.insert(exec.id.clone(), exec);
                    }
                    Err(e) => {
                        warn!(
                            path = %path.display(),
                            line = line_no + 1,
                            error = %e,
                            "skipping corrupt execution log entry"
                        );
                    }
                }
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            inner: Mutex::new(Inner { file, index }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of executions currently tracked.
    pub fn len(&self) -> usize {
        self.inner.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().index.is_empty()
    }
}

impl Inner {
    fn append(&mut self, exec: &Execution) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(exec)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }

    fn get_mut(&mut self, id: &ExecutionId) -> Result<&mut Execution, StoreError> {
        self.index
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}

impl ExecutionStore for JsonlStore {
    fn save(&self, exec: &Execution) -> Result<(), StoreError> {
        if !matches!(
            exec.status,
            ExecutionStatus::Queued | ExecutionStatus::Decomposed
        ) {
            return Err(StoreError::InvalidInitialStatus(exec.status));
        }

        let mut inner = self.inner.lock();
        if inner.index.contains_key(&exec.id) {
            return Err(StoreError::AlreadyExists(exec.id.clone()));
        }
        inner.append(exec)?;
        inner.index.insert(exec.id.clone(), exec.clone());
        Ok(())
    }

    fn get(&self, id: &ExecutionId) -> Result<Execution, StoreError> {
        self.inner
            .lock()
            .index
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn update_status(
        &self,
        id: &ExecutionId,
        status: ExecutionStatus,
        message: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let exec = inner.get_mut(id)?;

        let from = exec.status;
        if from.is_terminal() {
            return Err(StoreError::Terminal {
                id: id.clone(),
                status: from,
            });
        }
        if !from.can_transition(status) {
            return Err(StoreError::InvalidTransition {
                id: id.clone(),
                from,
                to: status,
            });
        }

        exec.status = status;
        exec.updated_at = Utc::now();
        exec.error_message = message.map(String::from);

        let snapshot = exec.clone();
        inner.append(&snapshot)
    }

    fn record_result(&self, id: &ExecutionId, update: &ResultUpdate) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let exec = inner.get_mut(id)?;

        if exec.status.is_terminal() {
            return Err(StoreError::Terminal {
                id: id.clone(),
                status: exec.status,
            });
        }

        exec.pr_url = update.pr_url.clone();
        exec.commit_shas = update.commit_shas.clone();
        exec.tokens_input = update.tokens_input;
        exec.tokens_output = update.tokens_output;
        exec.updated_at = Utc::now();

        let snapshot = exec.clone();
        inner.append(&snapshot)
    }

    fn queued_for_project(
        &self,
        project: &Path,
        limit: usize,
    ) -> Result<Vec<Execution>, StoreError> {
        let inner = self.inner.lock();
        let mut queued: Vec<Execution> = inner
            .index
            .values()
            .filter(|e| e.status == ExecutionStatus::Queued && e.project_path == project)
            .cloned()
            .collect();
        queued.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        queued.truncate(limit);
        Ok(queued)
    }

    fn stale_running(&self, older_than: Duration) -> Result<Vec<Execution>, StoreError> {
        let delta = match chrono::Duration::from_std(older_than) {
            Ok(d) => d,
            Err(_) => return Ok(Vec::new()),
        };
        let cutoff = match Utc::now().checked_sub_signed(delta) {
            Some(c) => c,
            None => return Ok(Vec::new()),
        };

        let inner = self.inner.lock();
        let mut stale: Vec<Execution> = inner
            .index
            .values()
            .filter(|e| e.status == ExecutionStatus::Running && e.updated_at < cutoff)
            .cloned()
            .collect();
        stale.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        Ok(stale)
    }

    fn is_task_queued(&self, task_id: &TaskId) -> Result<bool, StoreError> {
        let inner = self.inner.lock();
        Ok(inner.index.values().any(|e| {
            e.task_id == *task_id
                && matches!(
                    e.status,
                    ExecutionStatus::Queued | ExecutionStatus::Running
                )
        }))
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
