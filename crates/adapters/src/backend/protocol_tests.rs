// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn init_line_decodes() {
    let events = parse_line(r#"{"type":"system","subtype":"init"}"#);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Init);
}

#[test]
fn blank_line_yields_nothing() {
    assert!(parse_line("").is_empty());
    assert!(parse_line("   ").is_empty());
}

#[test]
fn non_json_degrades_to_raw_text() {
    let events = parse_line("garbage { not json");
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0].kind,
        EventKind::Text { ref text } if text == "garbage { not json"
    ));
    assert_eq!(events[0].raw, "garbage { not json");
}

#[test]
fn assistant_blocks_yield_one_event_each() {
    let line = r#"{"type":"assistant","message":{"content":[
        {"type":"text","text":"working on it"},
        {"type":"tool_use","name":"Bash","input":{"command":"git log"}}
    ]}}"#
        .replace('\n', "");
    let events = parse_line(&line);
    assert_eq!(events.len(), 2);
    assert!(matches!(
        events[0].kind,
        EventKind::Text { ref text } if text == "working on it"
    ));
    match &events[1].kind {
        EventKind::ToolUse { name, input } => {
            assert_eq!(name, "Bash");
            assert_eq!(input["command"], "git log");
        }
        other => panic!("expected tool_use, got {other:?}"),
    }
}

#[test]
fn usage_attaches_to_first_event_only() {
    let line = r#"{"type":"assistant","usage":{"input_tokens":7,"output_tokens":3},"message":{"content":[
        {"type":"text","text":"a"},
        {"type":"text","text":"b"}
    ]}}"#
        .replace('\n', "");
    let events = parse_line(&line);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].tokens_input, 7);
    assert_eq!(events[0].tokens_output, 3);
    assert_eq!(events[1].tokens_input, 0);
    assert_eq!(events[1].tokens_output, 0);
}

#[test]
fn nested_message_usage_is_read() {
    let line = r#"{"type":"assistant","message":{"usage":{"input_tokens":4,"output_tokens":2},"model":"sonnet","content":[{"type":"text","text":"x"}]}}"#;
    let events = parse_line(line);
    assert_eq!(events[0].tokens_input, 4);
    assert_eq!(events[0].tokens_output, 2);
    assert_eq!(events[0].model.as_deref(), Some("sonnet"));
}

#[test]
fn tool_result_with_string_payload() {
    let line = r#"{"type":"user","tool_use_result":"exit code: 0"}"#;
    let events = parse_line(line);
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0].kind,
        EventKind::ToolResult { ref content, is_error: false } if content == "exit code: 0"
    ));
}

#[test]
fn tool_result_with_nested_content_and_error() {
    let line = r#"{"type":"user","tool_use_result":{"is_error":true,"content":[{"type":"text","text":"boom"}]}}"#;
    let events = parse_line(line);
    assert!(matches!(
        events[0].kind,
        EventKind::ToolResult { ref content, is_error: true } if content == "boom"
    ));
}

#[test]
fn result_line_decodes() {
    let line = r#"{"type":"result","result":"done","is_error":false,"usage":{"input_tokens":10,"output_tokens":5}}"#;
    let events = parse_line(line);
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0].kind,
        EventKind::Result { ref result, is_error: false } if result == "done"
    ));
    assert_eq!(events[0].tokens_input, 10);
    assert_eq!(events[0].tokens_output, 5);
}

#[test]
fn unknown_json_shape_keeps_usage() {
    let line = r#"{"type":"mystery","usage":{"input_tokens":2,"output_tokens":1}}"#;
    let events = parse_line(line);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0].kind, EventKind::Text { .. }));
    assert_eq!(events[0].tokens_input, 2);
}

#[test]
fn totals_sum_events_and_last_model_wins() {
    let mut totals = StreamTotals::default();
    for line in [
        r#"{"type":"system","subtype":"init","model":"haiku"}"#,
        r#"{"type":"assistant","usage":{"input_tokens":7,"output_tokens":3},"model":"sonnet","message":{"content":[{"type":"text","text":"a"}]}}"#,
        r#"{"type":"result","result":"done","is_error":false,"usage":{"input_tokens":10,"output_tokens":5}}"#,
    ] {
        for event in parse_line(line) {
            totals.observe(&event);
        }
    }
    assert_eq!(totals.tokens_input, 17);
    assert_eq!(totals.tokens_output, 8);
    assert_eq!(totals.model.as_deref(), Some("sonnet"));
}

#[test]
fn large_line_is_supported() {
    // Single-line buffer must support at least 1 MiB
    let big = "x".repeat(1024 * 1024);
    let line = format!(
        r#"{{"type":"assistant","message":{{"content":[{{"type":"text","text":"{big}"}}]}}}}"#
    );
    let events = parse_line(&line);
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0].kind,
        EventKind::Text { ref text } if text.len() == 1024 * 1024
    ));
}
