//! Key-value backends written to by the sink writers
//!
//! - `memcache`: memcached text-protocol client over a blocking `TcpStream`
//! - `DryRunSink`: logs the decoded would-be write and always succeeds
//!
//! Each destination class owns exactly one sink, moved into its writer thread,
//! so sinks need `Send` but never `Sync`.

mod memcache;

use std::time::Duration;

use indexmap::IndexMap;

use crate::codec::UserApps;
use crate::config::DestinationTable;
use crate::error::SinkError;

pub use memcache::MemcacheSink;

/// A destination accepting `put(key, payload)` writes
pub trait Sink: Send {
    fn put(&mut self, key: &str, payload: &[u8]) -> Result<(), SinkError>;

    /// Backend address, for logs
    fn addr(&self) -> &str;
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn put(&mut self, key: &str, payload: &[u8]) -> Result<(), SinkError> {
        (**self).put(key, payload)
    }

    fn addr(&self) -> &str {
        (**self).addr()
    }
}

/// Sink used with `--dry`: never opens a connection
#[derive(Debug, Clone)]
pub struct DryRunSink {
    addr: String,
}

impl DryRunSink {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

impl Sink for DryRunSink {
    fn put(&mut self, key: &str, payload: &[u8]) -> Result<(), SinkError> {
        match UserApps::decode(payload) {
            Ok(apps) => tracing::debug!(
                addr = %self.addr,
                key,
                lat = apps.lat,
                lon = apps.lon,
                apps = ?apps.apps,
                "dry run write"
            ),
            Err(e) => tracing::debug!(
                addr = %self.addr,
                key,
                bytes = payload.len(),
                error = %e,
                "dry run write of undecodable payload"
            ),
        }
        Ok(())
    }

    fn addr(&self) -> &str {
        &self.addr
    }
}

/// One sink per destination class, in destination-table order
pub type SinkSet = IndexMap<String, Box<dyn Sink>>;

/// Open a sink for every configured destination.
///
/// In dry-run mode no connection is attempted. Otherwise every backend is
/// connected up front and the first failure is returned.
pub fn open_sinks(
    destinations: &DestinationTable,
    dry_run: bool,
    timeout: Option<Duration>,
) -> Result<SinkSet, SinkError> {
    let mut sinks = SinkSet::with_capacity(destinations.len());
    for (class, addr) in destinations.iter() {
        let sink: Box<dyn Sink> = if dry_run {
            Box::new(DryRunSink::new(addr))
        } else {
            Box::new(MemcacheSink::connect(addr, timeout)?)
        };
        sinks.insert(class.to_string(), sink);
    }
    Ok(sinks)
}
