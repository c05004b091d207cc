// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;

use crate::command::Invocation;
use crate::executor::Executor;
use crate::task_report::{Outcome, TaskFailure};

/// Longest captured output line, in bytes
pub const DEFAULT_MAX_LINE_LEN: usize = 1024;

#[cfg(unix)]
const SIGPIPE: i32 = 13;

/// Executes invocations as external processes, capturing the first stdout line
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    max_line_len: usize,
    timeout: Option<Duration>,
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self {
            max_line_len: DEFAULT_MAX_LINE_LEN,
            timeout: None,
        }
    }

    pub fn with_max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn execute(&self, invocation: &Invocation) -> Outcome {
        let mut child = match Command::new(&invocation.program)
            .arg(&invocation.argument)
            .current_dir(&invocation.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return Outcome::Failed(TaskFailure::Spawn(e.to_string())),
        };

        let Some(stdout) = child.stdout.take() else {
            return Outcome::Failed(TaskFailure::Io("stdout was not captured".to_string()));
        };

        let max_line_len = self.max_line_len;
        // stdout is closed after the first line, so waiting does not depend on
        // the child or its descendants reaching EOF.
        let run = async {
            let line = read_first_line(stdout, max_line_len).await;
            let status = child.wait().await;
            (line, status)
        };

        let (line, status) = match self.timeout {
            Some(limit) => {
                let finished = tokio::time::timeout(limit, run).await;
                match finished {
                    Ok(done) => done,
                    Err(_) => {
                        if let Err(e) = child.kill().await {
                            tracing::warn!(
                                invocation = %invocation,
                                error = %e,
                                "Failed to kill timed out task"
                            );
                        }
                        return Outcome::Failed(TaskFailure::TimedOut(limit));
                    }
                }
            }
            None => run.await,
        };

        let status = match status {
            Ok(status) => status,
            Err(e) => return Outcome::Failed(TaskFailure::Io(e.to_string())),
        };
        let captured = matches!(line, Ok(Some(_)));
        if !status.success() && !(captured && killed_by_closed_pipe(&status)) {
            return Outcome::Failed(TaskFailure::ExitStatus(status.to_string()));
        }

        match line {
            Ok(Some(line)) => Outcome::Output(line),
            Ok(None) => Outcome::Failed(TaskFailure::NoOutput),
            Err(e) => Outcome::Failed(TaskFailure::Io(e.to_string())),
        }
    }
}

/// A child still writing after its first line was captured gets SIGPIPE
/// when stdout is closed.
#[cfg(unix)]
fn killed_by_closed_pipe(status: &ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal() == Some(SIGPIPE)
}

#[cfg(not(unix))]
fn killed_by_closed_pipe(_status: &ExitStatus) -> bool {
    false
}

/// Reads up to `max_len` bytes of the first line and closes the stream.
/// Returns `None` when the stream is empty.
async fn read_first_line<R>(stream: R, max_len: usize) -> std::io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let read = BufReader::new(stream)
        .take(max_len as u64)
        .read_until(b'\n', &mut buf)
        .await?;

    if read == 0 {
        return Ok(None);
    }

    while matches!(buf.last(), Some(b'\n') | Some(b'\r')) {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}
