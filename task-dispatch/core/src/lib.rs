// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

pub mod error;
pub use error::{CatalogError, CommandError, ConfigError, DispatchError, TransportError};

mod catalog;
pub use catalog::Catalog;

mod command;
pub use command::{CommandBuilder, Invocation, DEFAULT_MAX_INVOCATION_LEN};

mod message;
pub use message::{Envelope, Message, Rank, Tag, TagFilter, COORDINATOR};

mod task_report;
pub use task_report::{Outcome, Role, TaskFailure, TaskReport};

mod mailbox;
pub use mailbox::Mailbox;

mod transport;
pub use transport::Transport;

mod executor;
pub use executor::Executor;

mod process_executor;
pub use process_executor::{ProcessExecutor, DEFAULT_MAX_LINE_LEN};

mod worker;
pub use worker::{Worker, WorkerSummary};

mod worker_pool;
pub use worker_pool::WorkerPool;

mod result_sink;
pub use result_sink::{ResultSink, StdoutSink};

mod coordinator;
pub use coordinator::{Coordinator, RunInfo, RunSummary};

pub mod config;
pub use config::{DispatchConfig, RunArgs, RunSettings, TaskLimits};

mod hostname;
pub use hostname::local_hostname;
