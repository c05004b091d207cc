// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use task_dispatch_core::{
    Coordinator, DispatchError, Executor, ResultSink, RunSummary, WorkerSummary,
};
use tokio::task::JoinHandle;

use crate::channel_transport::ChannelNetwork;
use crate::worker_factory::WorkerFactory;

/// What a finished in-process run reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub summary: RunSummary,
    /// One entry per worker, in rank order
    pub workers: Vec<WorkerSummary>,
}

/// Runs `coordinator` against `num_workers` workers spawned as tokio tasks.
///
/// If the coordinator fails, its endpoint is dropped first so every worker
/// sees the coordinator disconnect and exits instead of waiting forever.
pub async fn dispatch<E, F, S>(
    coordinator: &Coordinator<E>,
    num_workers: usize,
    mut factory: F,
    sink: &mut S,
) -> Result<DispatchOutcome, DispatchError>
where
    E: Executor,
    F: WorkerFactory,
    S: ResultSink,
{
    let ChannelNetwork {
        coordinator: mut endpoint,
        workers,
    } = ChannelNetwork::build(num_workers);

    let handles: Vec<(usize, JoinHandle<_>)> = workers
        .into_iter()
        .map(|worker_endpoint| {
            let worker = factory.create_worker(worker_endpoint);
            (worker.rank(), tokio::spawn(worker.run()))
        })
        .collect();

    let result = coordinator.run(&mut endpoint, sink).await;
    drop(endpoint);

    let mut worker_summaries = Vec::with_capacity(handles.len());
    let mut worker_error = None;
    for (rank, handle) in handles {
        match handle.await {
            Ok(Ok(summary)) => worker_summaries.push(summary),
            Ok(Err(e)) => {
                tracing::error!(rank, error = %e, "Worker failed");
                worker_error.get_or_insert(e);
            }
            Err(e) => {
                tracing::error!(rank, error = %e, "Worker task failed");
                worker_error.get_or_insert(DispatchError::WorkerAborted {
                    rank,
                    reason: e.to_string(),
                });
            }
        }
    }

    // The coordinator's error explains the run better than the workers' reactions to it
    let summary = result?;
    if let Some(e) = worker_error {
        return Err(e);
    }

    Ok(DispatchOutcome {
        summary,
        workers: worker_summaries,
    })
}
