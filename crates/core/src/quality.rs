// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Quality gate outcome records

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of one named gate inside a quality check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDetail {
    pub name: String,
    pub passed: bool,
    pub duration: Duration,
    /// Captured output, kept for retry feedback and diagnostics.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
}

/// Outcome of a full quality check pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityOutcome {
    pub passed: bool,
    /// Whether a retry with feedback is worthwhile.
    pub should_retry: bool,
    /// Feedback injected into the retry prompt.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub retry_feedback: String,
    /// 1-based attempt this outcome belongs to.
    pub attempt: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gate_details: Vec<GateDetail>,
    pub total_duration: Duration,
}

impl QualityOutcome {
    /// An all-clear outcome with no gate details.
    pub fn passed(attempt: u32) -> Self {
        Self {
            passed: true,
            should_retry: false,
            retry_feedback: String::new(),
            attempt,
            gate_details: Vec::new(),
            total_duration: Duration::ZERO,
        }
    }
}
