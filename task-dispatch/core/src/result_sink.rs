// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::coordinator::{RunInfo, RunSummary};
use crate::task_report::TaskReport;

/// Receives task results in completion order
pub trait ResultSink: Send {
    /// Called once before the first task is handed out
    fn begin(&mut self, _info: &RunInfo) {}

    fn record(&mut self, report: &TaskReport);

    /// Called once after every worker has been stopped
    fn finish(&mut self, _summary: &RunSummary) {}
}

/// Prints one line per result on standard output
#[derive(Debug, Default)]
pub struct StdoutSink;

impl ResultSink for StdoutSink {
    fn begin(&mut self, info: &RunInfo) {
        println!("[MASTER] Running command: {}", info.command);
        println!("[MASTER] Processing {} files", info.tasks);
        println!(
            "[MASTER] Running with {} processes on {}",
            info.processes, info.hostname
        );
    }

    fn record(&mut self, report: &TaskReport) {
        println!("{}", report);
    }

    fn finish(&mut self, summary: &RunSummary) {
        println!(
            "[MASTER] Done. Processed {} tasks ({} failed).",
            summary.processed, summary.failed
        );
    }
}

impl ResultSink for Vec<TaskReport> {
    fn record(&mut self, report: &TaskReport) {
        self.push(report.clone());
    }
}
