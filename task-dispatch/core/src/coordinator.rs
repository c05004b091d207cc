// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::catalog::Catalog;
use crate::command::{CommandBuilder, Invocation};
use crate::error::DispatchError;
use crate::executor::Executor;
use crate::message::{Message, Rank, Tag, TagFilter, COORDINATOR};
use crate::result_sink::ResultSink;
use crate::task_report::{Role, TaskReport};
use crate::transport::Transport;
use crate::worker_pool::WorkerPool;

/// Facts about a run, announced before scheduling starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
    pub command: String,
    pub tasks: usize,
    /// Participants, coordinator included
    pub processes: usize,
    pub hostname: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub failed: usize,
    pub workers: usize,
}

impl RunSummary {
    fn record(&mut self, report: &TaskReport) {
        self.processed += 1;
        if !report.outcome.is_success() {
            self.failed += 1;
        }
    }
}

/// Owns the catalog and keeps every worker busy until it is exhausted
pub struct Coordinator<E: Executor> {
    catalog: Catalog,
    builder: CommandBuilder,
    executor: E,
    hostname: String,
}

impl<E: Executor> Coordinator<E> {
    /// `executor` is only used when there are no workers
    pub fn new(
        catalog: Catalog,
        builder: CommandBuilder,
        executor: E,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            builder,
            executor,
            hostname: hostname.into(),
        }
    }

    /// Runs every task in the catalog and stops every worker.
    ///
    /// Results reach `sink` in completion order. Any transport failure aborts
    /// the run: a missing result cannot be skipped.
    pub async fn run<T, S>(
        &self,
        transport: &mut T,
        sink: &mut S,
    ) -> Result<RunSummary, DispatchError>
    where
        T: Transport,
        S: ResultSink,
    {
        if transport.rank() != COORDINATOR {
            return Err(DispatchError::Protocol(format!(
                "coordinator must run on rank {}, not {}",
                COORDINATOR,
                transport.rank()
            )));
        }

        // Build everything up front so a bad invocation fails before any worker is engaged
        let invocations = self
            .catalog
            .iter()
            .map(|task| self.builder.build(task))
            .collect::<Result<Vec<_>, _>>()?;

        let workers = transport.size().saturating_sub(1);
        sink.begin(&RunInfo {
            command: self.builder.program().display().to_string(),
            tasks: invocations.len(),
            processes: transport.size(),
            hostname: self.hostname.clone(),
        });

        let summary = if workers == 0 {
            self.run_local(invocations, sink).await
        } else {
            self.run_distributed(invocations, workers, transport, sink)
                .await?
        };

        sink.finish(&summary);
        Ok(summary)
    }

    /// No workers: execute each task here, in catalog order
    async fn run_local<S: ResultSink>(
        &self,
        invocations: Vec<Invocation>,
        sink: &mut S,
    ) -> RunSummary {
        tracing::info!(tasks = invocations.len(), "No workers, executing locally");

        let mut summary = RunSummary::default();
        for invocation in invocations {
            let outcome = self.executor.execute(&invocation).await;
            let report = TaskReport::new(
                Role::Master,
                self.hostname.as_str(),
                invocation.argument,
                outcome,
            );
            summary.record(&report);
            sink.record(&report);
        }
        summary
    }

    async fn run_distributed<T, S>(
        &self,
        invocations: Vec<Invocation>,
        workers: usize,
        transport: &mut T,
        sink: &mut S,
    ) -> Result<RunSummary, DispatchError>
    where
        T: Transport,
        S: ResultSink,
    {
        tracing::info!(tasks = invocations.len(), workers, "Dispatching");

        let mut pool = WorkerPool::new(1..=workers);
        let mut summary = RunSummary {
            workers,
            ..RunSummary::default()
        };

        // While idle workers remain this is the initial fan-out, in rank order.
        // After that each task waits for a RESULT and goes to the worker that sent it.
        for invocation in invocations {
            let rank = match pool.next_idle() {
                Some(rank) => rank,
                None => self.collect(transport, &mut pool, &mut summary, sink).await?,
            };
            self.dispatch(transport, &mut pool, rank, invocation).await?;
        }

        // Drain outstanding assignments
        while pool.has_busy() {
            self.collect(transport, &mut pool, &mut summary, sink).await?;
        }

        for rank in 1..=workers {
            pool.stop(rank)?;
            transport.send(rank, Message::Stop).await?;
        }
        tracing::info!(
            processed = summary.processed,
            failed = summary.failed,
            "All workers stopped"
        );

        Ok(summary)
    }

    async fn dispatch<T: Transport>(
        &self,
        transport: &mut T,
        pool: &mut WorkerPool,
        rank: Rank,
        invocation: Invocation,
    ) -> Result<(), DispatchError> {
        pool.assign(rank, invocation.task())?;
        tracing::debug!(rank, task = invocation.task(), busy = pool.busy_count(), "Assigned");
        transport.send(rank, Message::Work(invocation)).await?;
        Ok(())
    }

    /// Waits for the next RESULT from any worker and returns the worker's rank,
    /// which is idle again afterwards
    async fn collect<T, S>(
        &self,
        transport: &mut T,
        pool: &mut WorkerPool,
        summary: &mut RunSummary,
        sink: &mut S,
    ) -> Result<Rank, DispatchError>
    where
        T: Transport,
        S: ResultSink,
    {
        let envelope = transport.recv_any(TagFilter::Only(Tag::Result)).await?;
        let source = envelope.source;
        let report = match envelope.message {
            Message::Result(report) => report,
            other => {
                return Err(DispatchError::UnexpectedMessage {
                    rank: COORDINATOR,
                    tag: other.tag(),
                })
            }
        };

        pool.complete(source, &report.task)?;
        tracing::debug!(rank = source, task = %report.task, idle = pool.idle_count(), "Completed");
        summary.record(&report);
        sink.record(&report);
        Ok(source)
    }
}
