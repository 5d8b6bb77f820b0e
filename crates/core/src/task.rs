// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task input record

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    /// External identifier of a task (e.g. "GH-123").
    ///
    /// Tasks keep their caller-assigned id; each queued attempt gets its own
    /// [`ExecutionId`](crate::execution::ExecutionId).
    #[derive(Default)]
    pub struct TaskId;
}

/// A unit of work handed to the executor.
///
/// Immutable once queued; the engine only ever reads it. Everything needed to
/// re-run the task after a restart is denormalized into the corresponding
/// [`Execution`](crate::execution::Execution) record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptance_criteria: Vec<String>,
    /// Absolute path of the target repository.
    pub project_path: PathBuf,
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
}

impl Task {
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>, project_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            acceptance_criteria: Vec::new(),
            project_path: project_path.into(),
            branch: None,
            base_branch: None,
            create_pr: false,
            verbose: false,
            image_path: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_criteria(mut self, criteria: Vec<String>) -> Self {
        self.acceptance_criteria = criteria;
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_base_branch(mut self, base: impl Into<String>) -> Self {
        self.base_branch = Some(base.into());
        self
    }

    pub fn with_create_pr(mut self, create_pr: bool) -> Self {
        self.create_pr = create_pr;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.image_path = Some(path.into());
        self
    }

    /// One-line summary used in retry and review prompts.
    pub fn summary(&self) -> String {
        if self.description.is_empty() {
            format!("{}: {}", self.id, self.title)
        } else {
            format!("{}: {} - {}", self.id, self.title, self.description)
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
