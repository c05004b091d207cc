// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Where a task ran, for log attribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Master,
    Worker,
}

impl Role {
    pub fn prefix(&self) -> &'static str {
        match self {
            Role::Master => "[MASTER]",
            Role::Worker => "[WORKER]",
        }
    }
}

/// Why a task produced no usable line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskFailure {
    /// The process could not be started
    Spawn(String),
    /// The process exited unsuccessfully or was killed by a signal
    ExitStatus(String),
    /// The process succeeded but wrote nothing to stdout
    NoOutput,
    TimedOut(Duration),
    /// Reading stdout or waiting on the process failed
    Io(String),
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFailure::Spawn(reason) => write!(f, "failed to start: {}", reason),
            TaskFailure::ExitStatus(status) => write!(f, "{}", status),
            TaskFailure::NoOutput => write!(f, "no output"),
            TaskFailure::TimedOut(limit) => write!(f, "timed out after {:?}", limit),
            TaskFailure::Io(reason) => write!(f, "I/O error: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// First line of the command's standard output
    Output(String),
    Failed(TaskFailure),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Output(_))
    }
}

/// Result of one task, as carried by a RESULT message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    pub role: Role,
    pub hostname: String,
    pub task: String,
    pub outcome: Outcome,
}

impl TaskReport {
    pub fn new(
        role: Role,
        hostname: impl Into<String>,
        task: impl Into<String>,
        outcome: Outcome,
    ) -> Self {
        Self {
            role,
            hostname: hostname.into(),
            task: task.into(),
            outcome,
        }
    }
}

impl fmt::Display for TaskReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Output(line) => {
                write!(f, "{} {}: {}", self.role.prefix(), self.hostname, line)
            }
            Outcome::Failed(failure) => write!(
                f,
                "{} {}: FAILED {}: {}",
                self.role.prefix(),
                self.hostname,
                self.task,
                failure
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_line_carries_prefix_and_host() {
        let report = TaskReport::new(
            Role::Worker,
            "node7",
            "a.txt",
            Outcome::Output("a.txt".to_string()),
        );
        assert_eq!(report.to_string(), "[WORKER] node7: a.txt");
    }

    #[test]
    fn test_failure_line_is_distinguishable_from_output() {
        let report = TaskReport::new(
            Role::Master,
            "head",
            "b.txt",
            Outcome::Failed(TaskFailure::NoOutput),
        );
        assert_eq!(report.to_string(), "[MASTER] head: FAILED b.txt: no output");
        assert!(!report.outcome.is_success());
    }
}
