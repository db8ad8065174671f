//! Error taxonomy for the loader
//!
//! Per-record and per-file errors are recovered where they happen (logged,
//! counted, skipped). Only discovery and setup errors abort a run.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A line that does not describe a valid installed-apps record
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("expected at least 5 tab-separated fields, found {0}")]
    TooFewFields(usize),

    #[error("device type or device id is empty")]
    MissingIdentity,

    #[error("invalid latitude: {0:?}")]
    InvalidLatitude(String),

    #[error("invalid longitude: {0:?}")]
    InvalidLongitude(String),
}

/// A record that cannot be represented as a backend item
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SerializationError {
    #[error("key is {len} bytes, the limit is {max}")]
    KeyTooLong { len: usize, max: usize },

    #[error("key contains whitespace or control characters: {0:?}")]
    InvalidKey(String),

    #[error("payload is {len} bytes, the limit is {max}")]
    PayloadTooLarge { len: usize, max: usize },
}

/// Errors raised while decoding a payload back into its fields
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("unexpected end of payload")]
    Truncated,

    #[error("varint is too long")]
    VarintOverflow,

    #[error("unsupported wire type {wire_type} for field {field}")]
    UnexpectedWireType { field: u64, wire_type: u8 },
}

/// Record whose destination class has no configured backend
#[derive(Debug, Clone, PartialEq, Error)]
#[error("unknown device type: {0}")]
pub struct RoutingError(pub String);

/// A backend write that did not succeed
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("cannot connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("i/o error talking to {addr}: {source}")]
    Io {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("{addr} rejected the write: {reply}")]
    Rejected { addr: String, reply: String },

    #[error("destination queue for {0} is closed")]
    QueueClosed(String),
}

/// Problems with a single input file
#[derive(Debug, Error)]
pub enum FileError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read {path} after {lines} lines: {source}")]
    Read {
        path: PathBuf,
        lines: usize,
        #[source]
        source: io::Error,
    },

    #[error("cannot mark {path} as processed: {source}")]
    Rename {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The input pattern could not be resolved
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid file pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// Invalid loader configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("destination class must not be empty")]
    EmptyClass,

    #[error("destination class {0:?} must not contain ':'")]
    InvalidClass(String),

    #[error("destination {0:?} has an empty address")]
    EmptyAddress(String),

    #[error("expected CLASS=ADDR, got {0:?}")]
    InvalidDestination(String),

    #[error("queue capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("at least one destination is required")]
    NoDestinations,
}
