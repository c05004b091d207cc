// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use task_dispatch_core::{CommandBuilder, Executor, Outcome, ProcessExecutor, TaskFailure};
use tempfile::TempDir;

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

async fn run(body: &str, task: &str, executor: ProcessExecutor) -> Outcome {
    let tmp = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    fs::write(tmp.path().join("input.txt"), "hello from input\nsecond\n").unwrap();
    let command = script(bin.path(), "cmd.sh", body);

    let invocation = CommandBuilder::new(command, tmp.path()).build(task).unwrap();
    executor.execute(&invocation).await
}

#[tokio::test]
async fn test_first_line_of_stdout_is_captured() {
    let outcome = run("echo \"got $1\"; echo ignored", "a.txt", ProcessExecutor::new()).await;
    assert_eq!(outcome, Outcome::Output("got a.txt".to_string()));
}

#[tokio::test]
async fn test_command_runs_inside_the_task_directory() {
    let outcome = run("cat \"$1\"", "input.txt", ProcessExecutor::new()).await;
    assert_eq!(outcome, Outcome::Output("hello from input".to_string()));
}

#[tokio::test]
async fn test_non_zero_exit_is_a_failure_even_with_output() {
    let outcome = run("echo partial; exit 3", "a.txt", ProcessExecutor::new()).await;
    match outcome {
        Outcome::Failed(TaskFailure::ExitStatus(status)) => assert!(status.contains('3')),
        other => panic!("expected exit status failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_silent_command_is_a_failure() {
    let outcome = run("true", "a.txt", ProcessExecutor::new()).await;
    assert_eq!(outcome, Outcome::Failed(TaskFailure::NoOutput));
}

#[tokio::test]
async fn test_long_output_is_truncated() {
    let outcome = run(
        "i=0; while [ $i -lt 20000 ]; do echo \"line-$i-padding-padding\"; i=$((i+1)); done",
        "a.txt",
        ProcessExecutor::new().with_max_line_len(6),
    )
    .await;
    assert_eq!(outcome, Outcome::Output("line-0".to_string()));
}

#[tokio::test]
async fn test_endless_output_ends_when_stdout_is_closed() {
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        run("exec yes \"$1\"", "a.txt", ProcessExecutor::new()),
    )
    .await
    .expect("endless writer should end once its first line is captured");
    assert_eq!(outcome, Outcome::Output("a.txt".to_string()));
}

#[tokio::test]
async fn test_background_process_holding_stdout_does_not_block() {
    let started = Instant::now();
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        run("echo \"$1\"; sleep 30 &", "a.txt", ProcessExecutor::new()),
    )
    .await
    .expect("task should complete when the command exits");

    assert_eq!(outcome, Outcome::Output("a.txt".to_string()));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_slow_command_times_out() {
    let started = Instant::now();
    let outcome = run(
        "sleep 10; echo late",
        "a.txt",
        ProcessExecutor::new().with_timeout(Some(Duration::from_millis(200))),
    )
    .await;

    assert_eq!(
        outcome,
        Outcome::Failed(TaskFailure::TimedOut(Duration::from_millis(200)))
    );
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_missing_program_is_a_spawn_failure() {
    let tmp = TempDir::new().unwrap();
    let invocation = CommandBuilder::new(tmp.path().join("does-not-exist"), tmp.path())
        .build("a.txt")
        .unwrap();

    let outcome = ProcessExecutor::new().execute(&invocation).await;
    assert!(matches!(outcome, Outcome::Failed(TaskFailure::Spawn(_))));
}
