// Core library for memc-load

pub mod cli;
pub mod codec;
pub mod config;
pub mod config_file;
pub mod decompression;
pub mod error;
pub mod files;
pub mod pipeline;
pub mod record;
pub mod sink;
pub mod stats;

pub use codec::{encode_record, UserApps, WriteItem};
pub use config::{DestinationTable, FileOrder, LoaderConfig};
pub use pipeline::Coordinator;
pub use record::{parse_line, Record};
pub use sink::{DryRunSink, MemcacheSink, Sink, SinkSet};
pub use stats::{RunStats, Verdict, WorkerStat};
