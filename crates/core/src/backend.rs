// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backend stream events and aggregated results

use serde::{Deserialize, Serialize};
use std::fmt;

/// One decoded event from the backend's stream-json stdout protocol.
///
/// The envelope carries the usage fields that may ride on any event type;
/// the payload lives in [`EventKind`]. `raw` is the original stdout line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendEvent {
    pub kind: EventKind,
    #[serde(default)]
    pub tokens_input: u64,
    #[serde(default)]
    pub tokens_output: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw: String,
}

/// Payload of a backend event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Session initialization announcement.
    Init,
    /// Assistant prose, or a stdout line that failed to decode.
    Text { text: String },
    /// The assistant invoked a tool.
    ToolUse {
        name: String,
        input: serde_json::Value,
    },
    /// Result of a tool invocation.
    ToolResult { content: String, is_error: bool },
    /// Terminal result of the run.
    Result { result: String, is_error: bool },
}

impl EventKind {
    /// Short tag for logging.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Init => "init",
            EventKind::Text { .. } => "text",
            EventKind::ToolUse { .. } => "tool_use",
            EventKind::ToolResult { .. } => "tool_result",
            EventKind::Result { .. } => "result",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl BackendEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            tokens_input: 0,
            tokens_output: 0,
            model: None,
            raw: String::new(),
        }
    }

    /// A raw-text event for a line the decoder could not parse.
    pub fn raw_text(line: impl Into<String>) -> Self {
        let line = line.into();
        Self {
            kind: EventKind::Text { text: line.clone() },
            tokens_input: 0,
            tokens_output: 0,
            model: None,
            raw: line,
        }
    }
}

/// Aggregated outcome of one backend subprocess invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendResult {
    pub success: bool,
    /// Text of the last `result` event.
    pub output: String,
    pub error: Option<String>,
    pub tokens_input: u64,
    pub tokens_output: u64,
    /// Last model name seen on the stream.
    pub model: Option<String>,
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
