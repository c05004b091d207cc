// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::error::DispatchError;
use crate::executor::Executor;
use crate::message::{Message, Rank, TagFilter, COORDINATOR};
use crate::task_report::{Role, TaskReport};
use crate::transport::Transport;

/// What a worker did before it was told to stop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSummary {
    pub rank: Rank,
    pub executed: usize,
}

/// Executes invocations sent by the coordinator until it receives STOP.
///
/// A worker keeps no scheduling state of its own: every WORK message yields
/// exactly one RESULT message, whether or not the command succeeded.
pub struct Worker<T: Transport, E: Executor> {
    transport: T,
    executor: E,
    hostname: String,
}

impl<T: Transport, E: Executor> Worker<T, E> {
    pub fn new(transport: T, executor: E, hostname: impl Into<String>) -> Self {
        Self {
            transport,
            executor,
            hostname: hostname.into(),
        }
    }

    pub fn rank(&self) -> Rank {
        self.transport.rank()
    }

    pub async fn run(mut self) -> Result<WorkerSummary, DispatchError> {
        let rank = self.transport.rank();
        let mut executed = 0;

        tracing::debug!(rank, host = %self.hostname, "Worker started");

        loop {
            let envelope = self.transport.recv_any(TagFilter::Any).await?;
            if envelope.source != COORDINATOR {
                return Err(DispatchError::Protocol(format!(
                    "worker {} received a message from rank {}",
                    rank, envelope.source
                )));
            }

            let invocation = match envelope.message {
                Message::Stop => break,
                Message::Work(invocation) => invocation,
                other => {
                    return Err(DispatchError::UnexpectedMessage {
                        rank,
                        tag: other.tag(),
                    })
                }
            };

            tracing::debug!(rank, invocation = %invocation, "Executing");
            let outcome = self.executor.execute(&invocation).await;
            let report = TaskReport::new(
                Role::Worker,
                self.hostname.as_str(),
                invocation.argument,
                outcome,
            );

            self.transport
                .send(COORDINATOR, Message::Result(report))
                .await?;
            executed += 1;
        }

        tracing::debug!(rank, executed, "Worker stopped");
        Ok(WorkerSummary { rank, executed })
    }
}
