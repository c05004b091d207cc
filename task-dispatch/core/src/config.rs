// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Invocation surface shared by the binaries.
//!
//! Settings come from three layers: built-in defaults, an optional JSON config
//! file, and command line flags, later layers winning. Everything is validated
//! before a single worker is engaged.

use clap::Args;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::command::{CommandBuilder, DEFAULT_MAX_INVOCATION_LEN};
use crate::error::ConfigError;
use crate::process_executor::{ProcessExecutor, DEFAULT_MAX_LINE_LEN};

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Directory whose regular files are the tasks
    #[arg(short, long, value_name = "DIRECTORY")]
    pub dir: PathBuf,

    /// Executable run once per file, with the file name as its only argument
    #[arg(short, long, value_name = "COMMAND")]
    pub command: PathBuf,

    /// Number of workers besides the coordinator (0 runs everything locally)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Kill a task that runs longer than this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Longest captured output line, in bytes
    #[arg(long, value_name = "BYTES")]
    pub max_line_len: Option<usize>,

    /// JSON file with default settings
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Contents of the optional config file; every field may be omitted
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    pub workers: Option<usize>,
    pub max_line_len: usize,
    pub max_invocation_len: usize,
    pub task_timeout_secs: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: None,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            max_invocation_len: DEFAULT_MAX_INVOCATION_LEN,
            task_timeout_secs: None,
        }
    }
}

impl DispatchConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::ParseConfig {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Validated settings for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Absolute path of the task directory
    pub dir: PathBuf,
    /// Absolute path of the command
    pub command: PathBuf,
    pub workers: usize,
    pub max_line_len: usize,
    pub max_invocation_len: usize,
    pub timeout: Option<Duration>,
}

impl RunSettings {
    pub fn from_args(args: &RunArgs) -> Result<Self, ConfigError> {
        let config = match &args.config {
            Some(path) => DispatchConfig::load(path)?,
            None => DispatchConfig::default(),
        };
        Self::resolve(args, config)
    }

    /// Applies `args` over `config` and validates the result
    pub fn resolve(args: &RunArgs, config: DispatchConfig) -> Result<Self, ConfigError> {
        let dir = validate_directory(&args.dir)?;
        let command = validate_command(&args.command)?;

        let workers = args
            .workers
            .or(config.workers)
            .unwrap_or_else(default_workers);

        let limits = TaskLimits::new(
            args.max_line_len.unwrap_or(config.max_line_len),
            args.timeout.or(config.task_timeout_secs),
        )?;
        if config.max_invocation_len == 0 {
            return Err(ConfigError::Invalid(
                "max invocation length must be positive".to_string(),
            ));
        }

        Ok(Self {
            dir,
            command,
            workers,
            max_line_len: limits.max_line_len,
            max_invocation_len: config.max_invocation_len,
            timeout: limits.timeout,
        })
    }

    pub fn command_builder(&self) -> CommandBuilder {
        CommandBuilder::new(&self.command, &self.dir).with_max_len(self.max_invocation_len)
    }

    pub fn executor(&self) -> ProcessExecutor {
        TaskLimits {
            max_line_len: self.max_line_len,
            timeout: self.timeout,
        }
        .executor()
    }
}

/// Limits applied to every executed task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskLimits {
    pub max_line_len: usize,
    pub timeout: Option<Duration>,
}

impl TaskLimits {
    pub fn new(max_line_len: usize, timeout_secs: Option<u64>) -> Result<Self, ConfigError> {
        if max_line_len == 0 {
            return Err(ConfigError::Invalid("max line length must be positive".to_string()));
        }
        let timeout = match timeout_secs {
            Some(0) => {
                return Err(ConfigError::Invalid("timeout must be at least one second".to_string()))
            }
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };
        Ok(Self {
            max_line_len,
            timeout,
        })
    }

    pub fn executor(&self) -> ProcessExecutor {
        ProcessExecutor::new()
            .with_max_line_len(self.max_line_len)
            .with_timeout(self.timeout)
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn validate_directory(dir: &Path) -> Result<PathBuf, ConfigError> {
    let metadata = fs::metadata(dir).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => ConfigError::DirectoryNotFound(dir.to_path_buf()),
        _ => ConfigError::Inaccessible {
            path: dir.to_path_buf(),
            source,
        },
    })?;
    if !metadata.is_dir() {
        return Err(ConfigError::NotADirectory(dir.to_path_buf()));
    }
    fs::canonicalize(dir).map_err(|source| ConfigError::Inaccessible {
        path: dir.to_path_buf(),
        source,
    })
}

/// Resolves `command` to an absolute path of a regular, readable, executable file.
/// A bare name that does not exist in the working directory is looked up on `PATH`.
fn validate_command(command: &Path) -> Result<PathBuf, ConfigError> {
    let candidate = if command.components().count() == 1 && !command.exists() {
        search_path(command).ok_or_else(|| ConfigError::NotExecutable(command.to_path_buf()))?
    } else {
        command.to_path_buf()
    };

    let metadata = fs::metadata(&candidate)
        .map_err(|_| ConfigError::NotExecutable(command.to_path_buf()))?;
    if !is_executable_file(&metadata) {
        return Err(ConfigError::NotExecutable(command.to_path_buf()));
    }

    fs::canonicalize(&candidate).map_err(|source| ConfigError::Inaccessible {
        path: command.to_path_buf(),
        source,
    })
}

fn search_path(name: &Path) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| {
            fs::metadata(candidate)
                .map(|m| is_executable_file(&m))
                .unwrap_or(false)
        })
}

#[cfg(unix)]
fn is_executable_file(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;

    let mode = metadata.permissions().mode();
    metadata.is_file() && mode & 0o400 != 0 && mode & 0o100 != 0
}

#[cfg(not(unix))]
fn is_executable_file(metadata: &fs::Metadata) -> bool {
    metadata.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn script(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\necho \"$1\"\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    fn args(dir: &Path, command: &Path) -> RunArgs {
        RunArgs {
            dir: dir.to_path_buf(),
            command: command.to_path_buf(),
            workers: Some(2),
            timeout: None,
            max_line_len: None,
            config: None,
        }
    }

    #[test]
    fn test_valid_arguments_resolve_to_absolute_paths() {
        let tmp = TempDir::new().unwrap();
        let command = script(tmp.path(), "cmd.sh", 0o755);

        let settings = RunSettings::resolve(&args(tmp.path(), &command), DispatchConfig::default())
            .unwrap();

        assert!(settings.dir.is_absolute());
        assert!(settings.command.is_absolute());
        assert_eq!(settings.workers, 2);
        assert_eq!(settings.max_line_len, DEFAULT_MAX_LINE_LEN);
        assert_eq!(settings.timeout, None);
    }

    #[test]
    fn test_command_that_is_a_directory_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let err = RunSettings::resolve(&args(tmp.path(), tmp.path()), DispatchConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotExecutable(_)));
    }

    #[test]
    fn test_non_executable_command_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let command = script(tmp.path(), "plain.sh", 0o644);

        let err = RunSettings::resolve(&args(tmp.path(), &command), DispatchConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotExecutable(_)));
    }

    #[test]
    fn test_missing_or_non_directory_dir_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let command = script(tmp.path(), "cmd.sh", 0o755);

        let err = RunSettings::resolve(
            &args(&tmp.path().join("missing"), &command),
            DispatchConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DirectoryNotFound(_)));

        let err = RunSettings::resolve(&args(&command, &command), DispatchConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotADirectory(_)));
    }

    #[test]
    fn test_flags_override_config_file() {
        let tmp = TempDir::new().unwrap();
        let command = script(tmp.path(), "cmd.sh", 0o755);
        let config_path = tmp.path().join("config.json");
        fs::write(
            &config_path,
            r#"{ "workers": 7, "max_line_len": 80, "task_timeout_secs": 30 }"#,
        )
        .unwrap();

        let mut run_args = args(tmp.path(), &command);
        run_args.workers = None;
        run_args.timeout = Some(5);
        run_args.config = Some(config_path);

        let settings = RunSettings::from_args(&run_args).unwrap();

        assert_eq!(settings.workers, 7);
        assert_eq!(settings.max_line_len, 80);
        assert_eq!(settings.max_invocation_len, DEFAULT_MAX_INVOCATION_LEN);
        assert_eq!(settings.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_unknown_config_field_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.json");
        fs::write(&config_path, r#"{ "num_mappers": 4 }"#).unwrap();

        let err = DispatchConfig::load(&config_path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseConfig { .. }));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let command = script(tmp.path(), "cmd.sh", 0o755);
        let mut run_args = args(tmp.path(), &command);
        run_args.timeout = Some(0);

        let err = RunSettings::resolve(&run_args, DispatchConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_task_limits_reject_zero_values() {
        assert!(matches!(
            TaskLimits::new(0, None),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            TaskLimits::new(DEFAULT_MAX_LINE_LEN, Some(0)),
            Err(ConfigError::Invalid(_))
        ));

        let limits = TaskLimits::new(80, Some(3)).unwrap();
        assert_eq!(limits.max_line_len, 80);
        assert_eq!(limits.timeout, Some(Duration::from_secs(3)));
    }
}
