// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional task decomposition strategy.
//!
//! When a decomposer fires, the dispatcher writes a terminal `decomposed`
//! parent and queues each subtask as an ordinary independent execution.
//! The result is flat: status queries never walk a tree.

use fm_core::{Task, TaskId};
use regex::Regex;
use std::sync::LazyLock;

/// Strategy deciding whether and how to split a task.
pub trait Decomposer: Send + Sync + 'static {
    fn should_split(&self, task: &Task) -> bool;
    /// Split into ordered subtasks. Only applied when it yields at least
    /// two.
    fn split(&self, task: &Task) -> Vec<Task>;
}

// Numbered items ("1. foo", "2) bar") or markdown checkboxes ("- [ ] baz")
#[allow(clippy::expect_used)]
static CHECKLIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:\d+[.)]|-\s*\[\s*\])\s+(.+)$")
        .expect("constant regex pattern is valid")
});

const MAX_SUBTASK_TITLE: usize = 100;

/// Splits tasks whose description is a checklist of independent items.
#[derive(Debug, Clone)]
pub struct ChecklistDecomposer {
    /// Minimum checklist items before splitting kicks in.
    pub min_items: usize,
    /// Refuse to split oversized checklists; they need human structuring.
    pub max_items: usize,
}

impl Default for ChecklistDecomposer {
    fn default() -> Self {
        Self {
            min_items: 2,
            max_items: 8,
        }
    }
}

impl ChecklistDecomposer {
    fn items(&self, task: &Task) -> Vec<String> {
        CHECKLIST_ITEM
            .captures_iter(&task.description)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    }
}

impl Decomposer for ChecklistDecomposer {
    fn should_split(&self, task: &Task) -> bool {
        let count = self.items(task).len();
        count >= self.min_items && count <= self.max_items
    }

    fn split(&self, task: &Task) -> Vec<Task> {
        self.items(task)
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                let part = i + 1;
                let mut title = item.clone();
                if title.len() > MAX_SUBTASK_TITLE {
                    let mut cut = MAX_SUBTASK_TITLE;
                    while !title.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    title.truncate(cut);
                }
                Task {
                    id: TaskId::new(format!("{}.{}", task.id, part)),
                    title,
                    description: format!("Part {part} of '{}': {item}", task.title),
                    acceptance_criteria: Vec::new(),
                    project_path: task.project_path.clone(),
                    branch: task.branch.as_ref().map(|b| format!("{b}-{part}")),
                    base_branch: task.base_branch.clone(),
                    create_pr: task.create_pr,
                    verbose: task.verbose,
                    image_path: None,
                }
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "decompose_tests.rs"]
mod tests;
