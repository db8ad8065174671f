//! Type definitions for the pipeline
//!
//! Contains worker reports, roles and the coordinator's run phases.

use std::fmt;

use crate::stats::WorkerStat;

/// Which worker produced a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerRole {
    Router(usize),
    /// Writer of the named destination class
    Writer(String),
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerRole::Router(id) => write!(f, "router-{}", id),
            WorkerRole::Writer(class) => write!(f, "writer-{}", class),
        }
    }
}

/// Terminal report a worker sends right before exiting
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerReport {
    pub role: WorkerRole,
    pub stat: WorkerStat,
}

/// Coordinator state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    /// Files are known and being ingested
    FilesDiscovered,
    /// Input queue closed, waiting for routers and writers to finish
    Draining,
    Aggregating,
    Verdicted,
}
