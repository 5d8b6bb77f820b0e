// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Write an executable stand-in for the backend CLI. It ignores the argv the
/// supervisor passes and just plays back the scripted stdout.
fn write_script(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.path().join("fake-backend.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn backend(script: &Path, supervisor: SupervisorConfig) -> ClaudeBackend {
    ClaudeBackend::new(ClaudeBackendConfig {
        command: script.display().to_string(),
        extra_args: Vec::new(),
        supervisor,
    })
}

fn fast_supervisor() -> SupervisorConfig {
    SupervisorConfig {
        heartbeat_timeout: Duration::from_millis(300),
        heartbeat_check_interval: Duration::from_millis(100),
        grace_period: Duration::from_secs(1),
    }
}

#[test]
fn build_args_is_deterministic_and_ordered() {
    let opts = ExecuteOptions::new("do the task", "/p")
        .with_model(Some("opus".into()))
        .with_effort(Some("high".into()));
    let extra = vec!["--add-dir".to_string(), "/tmp".to_string()];

    let args = ClaudeBackend::build_args(&opts, &extra);
    assert_eq!(
        args,
        vec![
            "-p",
            "do the task",
            "--verbose",
            "--output-format",
            "stream-json",
            "--dangerously-skip-permissions",
            "--model",
            "opus",
            "--effort",
            "high",
            "--add-dir",
            "/tmp",
        ]
    );

    // Identical opts produce an identical argv, byte for byte
    let again = ClaudeBackend::build_args(&opts, &extra);
    assert_eq!(args, again);
}

#[test]
fn build_args_omits_unset_model_and_effort() {
    let opts = ExecuteOptions::new("t", "/p");
    let args = ClaudeBackend::build_args(&opts, &[]);
    assert!(!args.contains(&"--model".to_string()));
    assert!(!args.contains(&"--effort".to_string()));
}

#[tokio::test]
async fn happy_stream_aggregates_result_and_tokens() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        &dir,
        r#"echo '{"type":"system","subtype":"init"}'
echo '{"type":"assistant","message":{"content":[{"type":"text","text":"ok"}]}}'
echo '{"type":"result","result":"done","is_error":false,"usage":{"input_tokens":10,"output_tokens":5}}'"#,
    );
    let backend = backend(&script, fast_supervisor());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let opts = ExecuteOptions::new("task", dir.path())
        .on_event(move |event| sink.lock().push(event.kind.name().to_string()));

    let cancel = CancellationToken::new();
    let result = backend.execute(&cancel, opts).await.unwrap();

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.output, "done");
    assert_eq!(result.tokens_input, 10);
    assert_eq!(result.tokens_output, 5);
    assert_eq!(*seen.lock(), vec!["init", "text", "result"]);
}

#[tokio::test]
async fn stream_error_result_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        &dir,
        r#"echo '{"type":"result","result":"rate limit hit","is_error":true}'"#,
    );
    let backend = backend(&script, fast_supervisor());

    let cancel = CancellationToken::new();
    let result = backend
        .execute(&cancel, ExecuteOptions::new("task", dir.path()))
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("rate limit hit"));
}

#[tokio::test]
async fn nonzero_exit_surfaces_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(&dir, "echo 'boom' >&2\nexit 3");
    let backend = backend(&script, fast_supervisor());

    let cancel = CancellationToken::new();
    let result = backend
        .execute(&cancel, ExecuteOptions::new("task", dir.path()))
        .await
        .unwrap();

    assert!(!result.success);
    let error = result.error.unwrap_or_default();
    assert!(error.contains("boom"), "unexpected error: {error}");
}

#[tokio::test]
async fn non_json_lines_degrade_to_text_events() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        &dir,
        r#"echo 'warning: something odd'
echo '{"type":"result","result":"done","is_error":false}'"#,
    );
    let backend = backend(&script, fast_supervisor());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let opts = ExecuteOptions::new("task", dir.path())
        .on_event(move |event| sink.lock().push(event.kind.name().to_string()));

    let cancel = CancellationToken::new();
    let result = backend.execute(&cancel, opts).await.unwrap();

    assert!(result.success);
    assert_eq!(*seen.lock(), vec!["text", "result"]);
}

#[tokio::test]
async fn heartbeat_kills_a_hung_backend() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        &dir,
        r#"echo '{"type":"system","subtype":"init"}'
exec sleep 30"#,
    );
    let backend = backend(&script, fast_supervisor());

    let beats = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&beats);
    let opts = ExecuteOptions::new("task", dir.path()).on_heartbeat(move |age| {
        sink.lock().push(age);
    });

    let cancel = CancellationToken::new();
    let start = std::time::Instant::now();
    let result = backend.execute(&cancel, opts).await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(5), "hang not killed");
    assert!(!result.success);
    let beats = beats.lock();
    assert_eq!(beats.len(), 1, "heartbeat callback fires exactly once");
    assert!(beats[0] > Duration::ZERO);
    let error = result.error.unwrap_or_default();
    assert!(
        error.contains("no output"),
        "unexpected error: {error}"
    );
}

#[tokio::test]
async fn cancellation_terminates_within_grace_period() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(&dir, "exec sleep 30");
    let backend = backend(
        &script,
        SupervisorConfig {
            heartbeat_timeout: Duration::from_secs(60),
            heartbeat_check_interval: Duration::from_secs(10),
            grace_period: Duration::from_secs(1),
        },
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let start = std::time::Instant::now();
    let result = backend
        .execute(&cancel, ExecuteOptions::new("task", dir.path()))
        .await
        .unwrap();

    // Polite SIGTERM should end the sleep well inside grace + slack
    assert!(
        start.elapsed() < Duration::from_millis(1600),
        "took {:?}",
        start.elapsed()
    );
    assert!(!result.success);
    let error = result.error.unwrap_or_default();
    assert!(error.contains("cancelled"), "unexpected error: {error}");
}
