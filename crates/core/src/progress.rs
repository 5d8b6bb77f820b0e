// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress reporting seam

use crate::task::TaskId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse phases of a task execution, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Preflight,
    Research,
    Implementation,
    QualityGates,
    SelfReview,
    Finalize,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Preflight => write!(f, "preflight"),
            Phase::Research => write!(f, "research"),
            Phase::Implementation => write!(f, "implementation"),
            Phase::QualityGates => write!(f, "quality_gates"),
            Phase::SelfReview => write!(f, "self_review"),
            Phase::Finalize => write!(f, "finalize"),
        }
    }
}

/// Sink for task progress updates.
///
/// Calls for one task arrive in order; no ordering is promised across tasks.
pub trait ProgressReporter: Send + Sync + 'static {
    fn on_progress(&self, task_id: &TaskId, phase: Phase, percent: u8, message: &str);
}

/// Reporter that drops everything.
#[derive(Clone, Default)]
pub struct NullProgress;

impl ProgressReporter for NullProgress {
    fn on_progress(&self, _task_id: &TaskId, _phase: Phase, _percent: u8, _message: &str) {}
}
