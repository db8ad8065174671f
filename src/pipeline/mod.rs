//! Concurrent loading pipeline
//!
//! ```text
//! files -> ingest -> [input queue] -> router x N -> [queue per class] -> writer x 1 per class -> sink
//!                                          \                                  /
//!                                           +------> [report channel] <------+
//! ```
//!
//! # Module Structure
//!
//! - `types`: Worker reports, roles and run phases
//! - `ingest`: Reads one input file into the input queue
//! - `router`: Parses, serializes and routes lines to writer queues
//! - `writer`: Drains one class queue into its sink
//! - `coordinator`: Wires the queues, drives ingestion and shutdown, aggregates stats
//!
//! Every queue is bounded, so a slow backend pushes back through its writer
//! queue to the routers and from there to the ingestor. Queues are closed by
//! dropping their last sender: the coordinator drops the input sender after
//! the last file, and drops the writer senders only after every router has
//! exited.

mod coordinator;
mod ingest;
mod router;
mod types;
mod writer;

pub use coordinator::Coordinator;
pub use ingest::ingest_file;
pub use router::{route_line, RouteError};
pub use types::{RunPhase, WorkerReport, WorkerRole};
