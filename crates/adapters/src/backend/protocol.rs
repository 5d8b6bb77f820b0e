// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream-json protocol decoding.
//!
//! Each stdout line is one JSON object. A line that fails to decode is
//! degraded to a `text` event carrying the raw line; decoding never aborts
//! the stream. One line can yield several events (one per assistant content
//! block); usage fields ride on the first event of the line so token sums
//! stay exact.

use fm_core::{BackendEvent, EventKind};
use serde_json::Value;

/// Decode one stdout line into zero or more events.
///
/// Blank lines yield nothing. Unknown-but-valid JSON shapes degrade to a
/// raw `text` event so their usage fields are not lost.
pub fn parse_line(line: &str) -> Vec<BackendEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(_) => return vec![BackendEvent::raw_text(line)],
    };

    let mut kinds = decode_kinds(&value);
    if kinds.is_empty() {
        kinds.push(EventKind::Text {
            text: line.to_string(),
        });
    }

    let (tokens_input, tokens_output) = extract_usage(&value);
    let model = extract_model(&value);

    kinds
        .into_iter()
        .enumerate()
        .map(|(i, kind)| {
            let mut event = BackendEvent::new(kind);
            event.raw = line.to_string();
            if i == 0 {
                event.tokens_input = tokens_input;
                event.tokens_output = tokens_output;
                event.model = model.clone();
            }
            event
        })
        .collect()
}

fn decode_kinds(value: &Value) -> Vec<EventKind> {
    match value.get("type").and_then(Value::as_str) {
        Some("system") => {
            if value.get("subtype").and_then(Value::as_str) == Some("init") {
                vec![EventKind::Init]
            } else {
                Vec::new()
            }
        }
        Some("assistant") => value
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_array)
            .map(|blocks| blocks.iter().filter_map(decode_block).collect())
            .unwrap_or_default(),
        Some("user") => value
            .get("tool_use_result")
            .map(|r| {
                vec![EventKind::ToolResult {
                    content: result_content(r),
                    is_error: r
                        .get("is_error")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                }]
            })
            .unwrap_or_default(),
        Some("result") => {
            let result = match value.get("result") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            let is_error = value
                .get("is_error")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            vec![EventKind::Result { result, is_error }]
        }
        _ => Vec::new(),
    }
}

fn decode_block(block: &Value) -> Option<EventKind> {
    match block.get("type").and_then(Value::as_str)? {
        "tool_use" => Some(EventKind::ToolUse {
            name: block
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            input: block.get("input").cloned().unwrap_or(Value::Null),
        }),
        "text" => Some(EventKind::Text {
            text: block
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        _ => None,
    }
}

/// Flatten a `tool_use_result` payload to text.
fn result_content(result: &Value) -> String {
    match result {
        Value::String(s) => s.clone(),
        Value::Object(_) => match result.get("content") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(parts)) => parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
            Some(other) => other.to_string(),
            None => result.to_string(),
        },
        other => other.to_string(),
    }
}

/// Usage may sit at the top level or under `message`.
fn extract_usage(value: &Value) -> (u64, u64) {
    let usage = value
        .get("usage")
        .or_else(|| value.get("message").and_then(|m| m.get("usage")));
    match usage {
        Some(u) => (
            u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0),
            u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0),
        ),
        None => (0, 0),
    }
}

fn extract_model(value: &Value) -> Option<String> {
    value
        .get("model")
        .or_else(|| value.get("message").and_then(|m| m.get("model")))
        .and_then(Value::as_str)
        .map(String::from)
}

/// Running totals accumulated over a stream of events.
#[derive(Debug, Clone, Default)]
pub struct StreamTotals {
    pub tokens_input: u64,
    pub tokens_output: u64,
    /// Last model name seen wins.
    pub model: Option<String>,
}

impl StreamTotals {
    pub fn observe(&mut self, event: &BackendEvent) {
        self.tokens_input += event.tokens_input;
        self.tokens_output += event.tokens_output;
        if let Some(model) = &event.model {
            self.model = Some(model.clone());
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
