// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution record and status state machine

use crate::quality::QualityOutcome;
use crate::task::{Task, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier for one queued attempt at a task.
    pub struct ExecutionId;
}

/// Lifecycle status of an execution.
///
/// ```text
/// queued ──► running ──► completed | failed | cancelled
///              │
///              └► queued   (stale-recovery only)
/// decomposed               (terminal parent of split tasks)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    Decomposed,
}

impl ExecutionStatus {
    /// Terminal statuses are immutable; exactly one is reached per execution.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed
                | ExecutionStatus::Failed
                | ExecutionStatus::Cancelled
                | ExecutionStatus::Decomposed
        )
    }

    /// Whether `self → to` is a legal transition.
    ///
    /// Monotonic except for the crash-recovery edge `running → queued`.
    /// Nothing leaves a terminal state.
    pub fn can_transition(&self, to: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        match (self, to) {
            (Queued, Running) => true,
            (Queued, Cancelled) | (Queued, Failed) => true,
            (Running, Completed) | (Running, Failed) | (Running, Cancelled) => true,
            // Stale-task recovery resets a crashed run for another attempt.
            (Running, Queued) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Queued => write!(f, "queued"),
            ExecutionStatus::Running => write!(f, "running"),
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::Cancelled => write!(f, "cancelled"),
            ExecutionStatus::Decomposed => write!(f, "decomposed"),
        }
    }
}

/// Durable record of one attempt at a task.
///
/// Task fields are denormalized so a restarted process can rebuild the
/// [`Task`] without re-fetching it from the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub task_id: TaskId,
    pub project_path: PathBuf,
    pub status: ExecutionStatus,

    // Denormalized task fields
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptance_criteria: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_branch: Option<String>,
    #[serde(default)]
    pub create_pr: bool,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commit_shas: Vec<String>,
    #[serde(default)]
    pub tokens_input: u64,
    #[serde(default)]
    pub tokens_output: u64,
}

impl Execution {
    /// Create a `queued` execution from a task.
    pub fn from_task(id: impl Into<ExecutionId>, task: &Task, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            task_id: task.id.clone(),
            project_path: task.project_path.clone(),
            status: ExecutionStatus::Queued,
            title: task.title.clone(),
            description: task.description.clone(),
            acceptance_criteria: task.acceptance_criteria.clone(),
            branch: task.branch.clone(),
            base_branch: task.base_branch.clone(),
            create_pr: task.create_pr,
            verbose: task.verbose,
            image_path: task.image_path.clone(),
            created_at: now,
            updated_at: now,
            error_message: None,
            pr_url: None,
            commit_shas: Vec::new(),
            tokens_input: 0,
            tokens_output: 0,
        }
    }

    /// Rebuild the task from the denormalized fields (recovery path).
    pub fn to_task(&self) -> Task {
        Task {
            id: self.task_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            acceptance_criteria: self.acceptance_criteria.clone(),
            project_path: self.project_path.clone(),
            branch: self.branch.clone(),
            base_branch: self.base_branch.clone(),
            create_pr: self.create_pr,
            verbose: self.verbose,
            image_path: self.image_path.clone(),
        }
    }
}

/// Outcome fields written back to an execution before its terminal
/// transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultUpdate {
    pub pr_url: Option<String>,
    pub commit_shas: Vec<String>,
    pub tokens_input: u64,
    pub tokens_output: u64,
}

/// What the runner hands back for one task.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    pub task_id: TaskId,
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub pr_url: Option<String>,
    pub commit_shas: Vec<String>,
    pub tokens_input: u64,
    pub tokens_output: u64,
    pub quality_gates: Vec<QualityOutcome>,
}

impl ExecutionResult {
    pub fn failure(task_id: TaskId, error: impl Into<String>) -> Self {
        Self {
            task_id,
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn result_update(&self) -> ResultUpdate {
        ResultUpdate {
            pr_url: self.pr_url.clone(),
            commit_shas: self.commit_shas.clone(),
            tokens_input: self.tokens_input,
            tokens_output: self.tokens_output,
        }
    }
}

#[cfg(test)]
#[path = "execution_tests.rs"]
mod tests;
