// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::CommandError;

/// Upper bound on `program + ' ' + task`, in bytes
pub const DEFAULT_MAX_INVOCATION_LEN: usize = 4096;

/// One execution of the user command against one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub program: PathBuf,
    pub argument: String,
    pub workdir: PathBuf,
}

impl Invocation {
    /// The task this invocation was built for
    pub fn task(&self) -> &str {
        &self.argument
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.program.display(), self.argument)
    }
}

/// Combines the command template with a task identifier
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    program: PathBuf,
    workdir: PathBuf,
    max_len: usize,
}

impl CommandBuilder {
    pub fn new(program: impl Into<PathBuf>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            workdir: workdir.into(),
            max_len: DEFAULT_MAX_INVOCATION_LEN,
        }
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn build(&self, task: &str) -> Result<Invocation, CommandError> {
        if task.is_empty() {
            return Err(CommandError::EmptyTask);
        }

        let len = self
            .program
            .as_os_str()
            .len()
            .checked_add(1)
            .and_then(|n| n.checked_add(task.len()))
            .unwrap_or(usize::MAX);
        if len > self.max_len {
            return Err(CommandError::TooLong {
                task: task.to_string(),
                len,
                max: self.max_len,
            });
        }

        Ok(Invocation {
            program: self.program.clone(),
            argument: task.to_string(),
            workdir: self.workdir.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_appends_task_as_argument() {
        let builder = CommandBuilder::new("/bin/echo", "/data");
        let invocation = builder.build("a.txt").unwrap();

        assert_eq!(invocation.program, PathBuf::from("/bin/echo"));
        assert_eq!(invocation.task(), "a.txt");
        assert_eq!(invocation.workdir, PathBuf::from("/data"));
        assert_eq!(invocation.to_string(), "/bin/echo a.txt");
    }

    #[test]
    fn test_build_rejects_overlong_invocation() {
        let builder = CommandBuilder::new("/bin/echo", "/data").with_max_len(16);

        // "/bin/echo" (9) + ' ' + 6 bytes == 16 fits exactly
        assert!(builder.build("abcdef").is_ok());

        let err = builder.build("abcdefg").unwrap_err();
        assert_eq!(
            err,
            CommandError::TooLong {
                task: "abcdefg".to_string(),
                len: 17,
                max: 16,
            }
        );
    }

    #[test]
    fn test_build_rejects_empty_task() {
        let builder = CommandBuilder::new("/bin/echo", "/data");
        assert_eq!(builder.build("").unwrap_err(), CommandError::EmptyTask);
    }
}
