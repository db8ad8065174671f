//! Pipeline coordinator
//!
//! Contains the Coordinator that wires the queues, drives ingestion over the
//! discovered files, shuts the pools down in order and renders the verdict.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, unbounded, Receiver};

use crate::config::LoaderConfig;
use crate::error::FileError;
use crate::files::{discover_files, dot_rename};
use crate::sink::{open_sinks, SinkSet};
use crate::stats::{RunStats, Verdict, NORMAL_ERR_RATE};

use super::ingest::ingest_file;
use super::router::{router_thread, Routes};
use super::types::{RunPhase, WorkerReport, WorkerRole};
use super::writer::writer_thread;

/// Main pipeline driver
pub struct Coordinator {
    config: LoaderConfig,
    phase: RunPhase,
}

impl Coordinator {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            phase: RunPhase::Idle,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn advance(&mut self, phase: RunPhase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "phase transition");
        self.phase = phase;
    }

    /// Discover input files, open one sink per destination and load them all.
    ///
    /// Fails only when the pattern cannot be resolved or a sink cannot be
    /// initialized; everything else is counted in the returned stats.
    pub fn run(&mut self) -> Result<RunStats> {
        let pattern = self.config.input.pattern.clone();
        let files = discover_files(&pattern, self.config.input.file_order)
            .with_context(|| format!("Could not find files for the given pattern: {}", pattern))?;
        tracing::info!(pattern = %pattern, files = files.len(), "discovered input files");

        let sinks = open_sinks(
            &self.config.destinations,
            self.config.dry_run,
            self.config.timeout,
        )
        .context("Cannot initialize destination sinks")?;

        self.run_with_sinks(&files, sinks)
    }

    /// Load `files` into the given sinks, one writer per sink.
    ///
    /// The keys of `sinks` are the routable destination classes.
    pub fn run_with_sinks(&mut self, files: &[PathBuf], sinks: SinkSet) -> Result<RunStats> {
        let started = Instant::now();
        self.advance(RunPhase::FilesDiscovered);

        let capacity = self.config.pipeline.queue_capacity.max(1);
        let num_workers = self.config.effective_workers().max(1);
        let mut stats = RunStats::new();

        let (report_sender, report_receiver) = unbounded::<WorkerReport>();
        let (line_sender, line_receiver) = bounded::<String>(capacity);

        // Start one writer per destination class
        let mut routes = HashMap::with_capacity(sinks.len());
        let mut writer_handles = Vec::with_capacity(sinks.len());
        for (class, sink) in sinks {
            let (item_sender, item_receiver) = bounded(capacity);
            routes.insert(class.clone(), item_sender);

            let report_sender = report_sender.clone();
            let name = format!("writer-{}", class);
            let handle = thread::Builder::new()
                .name(name)
                .spawn(move || writer_thread(class, sink, item_receiver, report_sender))
                .context("Cannot start writer thread")?;
            writer_handles.push(handle);
        }
        let num_writers = writer_handles.len();
        let routes: Routes = Arc::new(routes);

        // Start router workers
        let mut router_handles = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let line_receiver = line_receiver.clone();
            let routes = Arc::clone(&routes);
            let report_sender = report_sender.clone();
            let handle = thread::Builder::new()
                .name(format!("router-{}", worker_id))
                .spawn(move || router_thread(worker_id, line_receiver, routes, report_sender))
                .context("Cannot start router thread")?;
            router_handles.push(handle);
        }
        drop(line_receiver);
        drop(report_sender);
        tracing::info!(
            routers = num_workers,
            writers = num_writers,
            queue_capacity = capacity,
            dry_run = self.config.dry_run,
            "pipeline started"
        );

        for path in files {
            tracing::info!(file = %path.display(), "Processing");
            let lines = match ingest_file(path, &line_sender) {
                Ok(lines) => {
                    tracing::info!(file = %path.display(), lines, "file read");
                    lines
                }
                // A partially read file still counts as done
                Err(FileError::Read { lines, ref source, .. }) if lines > 0 => {
                    tracing::warn!(file = %path.display(), lines, error = %source, "file read partially");
                    lines
                }
                Err(e) => {
                    stats.files_skipped += 1;
                    tracing::warn!(error = %e, "skipping file");
                    continue;
                }
            };
            stats.lines_read += lines;

            match dot_rename(path) {
                Ok(target) => {
                    stats.files_processed += 1;
                    tracing::info!(file = %path.display(), renamed = %target.display(), "file marked processed");
                }
                Err(e) => {
                    stats.files_skipped += 1;
                    tracing::error!(error = %e, "file left in place");
                }
            }
        }

        // Closing the input queue is the routers' only shutdown signal
        drop(line_sender);
        self.advance(RunPhase::Draining);

        for (idx, handle) in router_handles.into_iter().enumerate() {
            handle
                .join()
                .unwrap_or_else(|e| panic!("Router thread {} panicked: {:?}", idx, e));
        }
        let router_reports = collect_reports(&report_receiver, num_workers);

        // Every router has exited, so no one can push to a writer queue anymore
        drop(routes);
        for handle in writer_handles {
            let name = handle.thread().name().unwrap_or("writer").to_string();
            handle
                .join()
                .unwrap_or_else(|e| panic!("{} thread panicked: {:?}", name, e));
        }
        let writer_reports = collect_reports(&report_receiver, num_writers);

        self.advance(RunPhase::Aggregating);
        for report in router_reports.iter().chain(writer_reports.iter()) {
            match &report.role {
                WorkerRole::Router(_) => stats.merge_router(&report.stat),
                WorkerRole::Writer(class) => stats.merge_writer(class, &report.stat),
            }
        }
        stats.processing_time = started.elapsed();

        self.advance(RunPhase::Verdicted);
        log_verdict(&stats);
        Ok(stats)
    }
}

/// Take the terminal reports of workers that have already been joined
fn collect_reports(receiver: &Receiver<WorkerReport>, expected: usize) -> Vec<WorkerReport> {
    let reports: Vec<WorkerReport> = receiver.try_iter().take(expected).collect();
    for report in &reports {
        tracing::debug!(
            worker = %report.role,
            succeeded = report.stat.succeeded,
            failed = report.stat.failed,
            "terminal report"
        );
    }
    if reports.len() != expected {
        tracing::error!(
            expected,
            received = reports.len(),
            "workers exited without a terminal report"
        );
    }
    reports
}

fn log_verdict(stats: &RunStats) {
    let err_rate = stats.error_rate();
    match stats.verdict() {
        Verdict::Acceptable => tracing::info!(
            processed = stats.processed,
            errors = stats.errors,
            "Acceptable error rate ({}). Successful load",
            err_rate
        ),
        Verdict::HighErrorRate => tracing::error!(
            processed = stats.processed,
            errors = stats.errors,
            "High error rate ({} >= {}). Failed load",
            err_rate,
            NORMAL_ERR_RATE
        ),
    }
}
