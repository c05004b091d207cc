// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use anyhow::Context;
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::thread::JoinHandle;
use std::time::Instant;
use task_dispatch_core::{
    local_hostname, Catalog, ConfigError, Coordinator, ProcessExecutor, RunArgs, RunSettings,
    StdoutSink, TaskLimits, Worker, WorkerSummary, DEFAULT_MAX_LINE_LEN,
};
use task_dispatch_thread_socket::{SocketEndpoint, SocketHub};
use tracing_subscriber::EnvFilter;

/// Runs a command once per file in a directory, spread over workers connected by TCP
#[derive(Debug, Parser)]
#[command(name = "task-dispatch-thread-socket", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Coordinate a run, optionally spawning the workers as local threads
    Run(CoordinatorArgs),
    /// Join a coordinator as a worker
    Worker(WorkerArgs),
}

#[derive(Debug, Args)]
struct CoordinatorArgs {
    #[command(flatten)]
    run: RunArgs,

    /// Address workers connect to
    #[arg(long, default_value = "127.0.0.1:0")]
    listen: SocketAddr,

    /// Do not spawn local workers; wait for `worker` processes to connect
    #[arg(long)]
    external: bool,
}

#[derive(Debug, Args)]
struct WorkerArgs {
    /// Coordinator address
    #[arg(long)]
    connect: SocketAddr,

    /// Kill a task that runs longer than this many seconds. Limits are local
    /// to each worker; the coordinator's `--timeout` does not reach it.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Longest captured output line, in bytes
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_LINE_LEN)]
    max_line_len: usize,
}

impl WorkerArgs {
    fn executor(&self) -> Result<ProcessExecutor, ConfigError> {
        Ok(TaskLimits::new(self.max_line_len, self.timeout)?.executor())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run(args) => {
            let settings = match RunSettings::from_args(&args.run) {
                Ok(settings) => settings,
                Err(e) => {
                    eprintln!("[MASTER] Error: {}", e);
                    eprintln!("{}", Cli::command().render_usage());
                    return ExitCode::from(1);
                }
            };
            tokio::select! {
                result = coordinate(settings, args.listen, args.external) => result,
                _ = tokio::signal::ctrl_c() => {
                    eprintln!("\n=== Ctrl+C received, aborting run ===");
                    return ExitCode::from(130);
                }
            }
        }
        Command::Worker(args) => {
            let executor = match args.executor() {
                Ok(executor) => executor,
                Err(e) => {
                    eprintln!("[WORKER] Error: {}", e);
                    eprintln!("{}", Cli::command().render_usage());
                    return ExitCode::from(1);
                }
            };
            run_worker(args.connect, executor).await.map(|summary| {
                tracing::info!(rank = summary.rank, executed = summary.executed, "Worker done");
            })
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn coordinate(
    settings: RunSettings,
    listen: SocketAddr,
    external: bool,
) -> anyhow::Result<()> {
    let start_time = Instant::now();

    let catalog = Catalog::scan(&settings.dir)
        .with_context(|| format!("cannot build task list from {}", settings.dir.display()))?;
    let hostname = local_hostname();

    let hub = SocketHub::bind(listen)
        .await
        .with_context(|| format!("cannot listen on {}", listen))?;
    let addr = hub.local_addr()?;

    let local_workers: Vec<JoinHandle<anyhow::Result<WorkerSummary>>> = if external {
        tracing::info!(%addr, workers = settings.workers, "Waiting for workers");
        Vec::new()
    } else {
        (0..settings.workers)
            .map(|_| spawn_worker_thread(addr, settings.executor()))
            .collect::<Result<_, _>>()?
    };

    let mut endpoint = hub.accept(settings.workers).await?;
    let coordinator = Coordinator::new(
        catalog,
        settings.command_builder(),
        settings.executor(),
        hostname,
    );
    let result = coordinator.run(&mut endpoint, &mut StdoutSink).await;
    drop(endpoint);

    for handle in local_workers {
        let joined = tokio::task::spawn_blocking(move || handle.join()).await?;
        match joined {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Local worker failed"),
            Err(_) => tracing::error!("Local worker thread panicked"),
        }
    }

    let summary = result?;
    tracing::info!(
        processed = summary.processed,
        failed = summary.failed,
        elapsed_secs = start_time.elapsed().as_secs_f64(),
        "Run complete"
    );
    Ok(())
}

/// Runs one worker on its own thread with a single-threaded runtime
fn spawn_worker_thread(
    addr: SocketAddr,
    executor: ProcessExecutor,
) -> std::io::Result<JoinHandle<anyhow::Result<WorkerSummary>>> {
    std::thread::Builder::new()
        .name("dispatch-worker".to_string())
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(run_worker(addr, executor))
        })
}

async fn run_worker(addr: SocketAddr, executor: ProcessExecutor) -> anyhow::Result<WorkerSummary> {
    let hostname = local_hostname();
    let endpoint = SocketEndpoint::connect(addr, &hostname)
        .await
        .with_context(|| format!("cannot join coordinator at {}", addr))?;
    let summary = Worker::new(endpoint, executor, hostname).run().await?;
    Ok(summary)
}
