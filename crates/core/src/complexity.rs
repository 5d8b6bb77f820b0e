// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coarse task complexity classification and routing
//!
//! The classifier only looks at the task's text, so routing decisions are
//! reproducible for a given task.

use crate::task::Task;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Coarse complexity classification of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Trivial,
    Simple,
    Medium,
    Complex,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Complexity::Trivial => write!(f, "trivial"),
            Complexity::Simple => write!(f, "simple"),
            Complexity::Medium => write!(f, "medium"),
            Complexity::Complex => write!(f, "complex"),
        }
    }
}

const TRIVIAL_MARKERS: &[&str] = &[
    "typo", "rename", "comment", "bump", "whitespace", "format", "spelling",
];

const COMPLEX_MARKERS: &[&str] = &[
    "refactor",
    "migrat",
    "architect",
    "redesign",
    "concurren",
    "protocol",
    "rewrite",
    "distributed",
];

impl Complexity {
    /// Classify a task from its text.
    pub fn classify(task: &Task) -> Complexity {
        let text = format!("{} {}", task.title, task.description).to_lowercase();
        let words = text.split_whitespace().count();
        let criteria = task.acceptance_criteria.len();

        if COMPLEX_MARKERS.iter().any(|m| text.contains(m)) || words > 200 || criteria > 5 {
            return Complexity::Complex;
        }
        if TRIVIAL_MARKERS.iter().any(|m| text.contains(m)) && words <= 40 && criteria == 0 {
            return Complexity::Trivial;
        }
        if words <= 12 && criteria == 0 {
            return Complexity::Trivial;
        }
        if words > 80 || criteria > 2 {
            return Complexity::Medium;
        }
        Complexity::Simple
    }

    /// Model override for the backend, if any.
    pub fn model(&self) -> Option<&'static str> {
        match self {
            Complexity::Trivial | Complexity::Simple => None,
            Complexity::Medium => Some("sonnet"),
            Complexity::Complex => Some("opus"),
        }
    }

    /// Reasoning effort override for the backend, if any.
    pub fn effort(&self) -> Option<&'static str> {
        match self {
            Complexity::Trivial | Complexity::Simple => None,
            Complexity::Medium => Some("medium"),
            Complexity::Complex => Some("high"),
        }
    }

    /// Overall timeout for the main execution phase.
    pub fn timeout(&self) -> Duration {
        match self {
            Complexity::Trivial => Duration::from_secs(10 * 60),
            Complexity::Simple => Duration::from_secs(20 * 60),
            Complexity::Medium => Duration::from_secs(40 * 60),
            Complexity::Complex => Duration::from_secs(60 * 60),
        }
    }

    /// Trivial tasks skip the pre-research phase.
    pub fn skips_research(&self) -> bool {
        matches!(self, Complexity::Trivial)
    }

    /// Trivial tasks skip the self-review phase.
    pub fn skips_self_review(&self) -> bool {
        matches!(self, Complexity::Trivial)
    }
}

#[cfg(test)]
#[path = "complexity_tests.rs"]
mod tests;
