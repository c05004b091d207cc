// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use anyhow::Context;
use clap::{CommandFactory, Parser};
use std::process::ExitCode;
use std::time::Instant;
use task_dispatch_core::{
    local_hostname, Catalog, Coordinator, RunArgs, RunSettings, StdoutSink, Worker,
};
use task_dispatch_task_channels::{dispatch, ChannelEndpoint};
use tracing_subscriber::EnvFilter;

/// Runs a command once per file in a directory, spread over in-process workers
#[derive(Debug, Parser)]
#[command(name = "task-dispatch-task-channels", version)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,
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

    let settings = match RunSettings::from_args(&cli.run) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("[MASTER] Error: {}", e);
            eprintln!("{}", Cli::command().render_usage());
            return ExitCode::from(1);
        }
    };

    tokio::select! {
        result = run(settings) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("[MASTER] Error: {:#}", e);
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n=== Ctrl+C received, aborting run ===");
            ExitCode::from(130)
        }
    }
}

async fn run(settings: RunSettings) -> anyhow::Result<()> {
    let start_time = Instant::now();

    let catalog = Catalog::scan(&settings.dir)
        .with_context(|| format!("cannot build task list from {}", settings.dir.display()))?;
    let hostname = local_hostname();

    let coordinator = Coordinator::new(
        catalog,
        settings.command_builder(),
        settings.executor(),
        hostname.clone(),
    );

    let executor = settings.executor();
    let outcome = dispatch(
        &coordinator,
        settings.workers,
        |endpoint: ChannelEndpoint| Worker::new(endpoint, executor.clone(), hostname.clone()),
        &mut StdoutSink,
    )
    .await?;

    tracing::info!(
        processed = outcome.summary.processed,
        failed = outcome.summary.failed,
        elapsed_secs = start_time.elapsed().as_secs_f64(),
        "Run complete"
    );
    Ok(())
}
