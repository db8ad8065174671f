//! Line router workers
//!
//! Each router parses a raw line, serializes the record and forwards it to
//! the writer queue of its destination class.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

use crate::codec::{encode_record, WriteItem};
use crate::error::{RecordError, RoutingError, SerializationError, SinkError};
use crate::record::parse_line;
use crate::stats::WorkerStat;

use super::types::{WorkerReport, WorkerRole};

/// Writer queue per destination class, shared read-only by all routers
pub(crate) type Routes = Arc<HashMap<String, Sender<WriteItem>>>;

/// Why a line did not reach a writer queue
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("malformed record: {0}")]
    Malformed(#[from] RecordError),

    #[error("cannot serialize record: {0}")]
    Serialization(#[from] SerializationError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Closed(#[from] SinkError),
}

/// Parse, serialize and enqueue one line. Blocks while the destination
/// queue is full.
pub fn route_line(
    line: &str,
    routes: &HashMap<String, Sender<WriteItem>>,
) -> Result<(), RouteError> {
    let record = parse_line(line)?;
    let item = encode_record(&record)?;

    let queue = routes
        .get(&record.dev_type)
        .ok_or_else(|| RoutingError(record.dev_type.clone()))?;

    queue
        .send(item)
        .map_err(|_| SinkError::QueueClosed(record.dev_type))?;
    Ok(())
}

/// Router worker: runs until the input queue is closed and drained
pub(crate) fn router_thread(
    worker_id: usize,
    line_receiver: Receiver<String>,
    routes: Routes,
    report_sender: Sender<WorkerReport>,
) {
    let mut stat = WorkerStat::default();

    for line in line_receiver.iter() {
        match route_line(&line, &routes) {
            Ok(()) => stat.succeeded += 1,
            Err(RouteError::Routing(e)) => {
                tracing::warn!(worker = worker_id, "{}", e);
                stat.failed += 1;
            }
            Err(RouteError::Closed(e)) => {
                tracing::error!(worker = worker_id, error = %e, "dropping record");
                stat.failed += 1;
            }
            Err(e) => {
                tracing::debug!(worker = worker_id, error = %e, line = %line, "skipping line");
                stat.failed += 1;
            }
        }
    }

    // Release the writer queues before reporting so they can close
    drop(routes);

    let role = WorkerRole::Router(worker_id);
    tracing::debug!(
        worker = %role,
        succeeded = stat.succeeded,
        failed = stat.failed,
        "router finished"
    );
    let _ = report_sender.send(WorkerReport { role, stat });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, unbounded};

    fn routes_for(classes: &[&str]) -> (HashMap<String, Sender<WriteItem>>, Vec<Receiver<WriteItem>>) {
        let mut routes = HashMap::new();
        let mut receivers = Vec::new();
        for class in classes {
            let (tx, rx) = unbounded();
            routes.insert(class.to_string(), tx);
            receivers.push(rx);
        }
        (routes, receivers)
    }

    #[test]
    fn test_route_line_to_matching_queue() {
        let (routes, receivers) = routes_for(&["idfa", "gaid"]);

        route_line("gaid\t7rfw452y52g2gq4g\t55.55\t42.42\t7423,424", &routes).unwrap();

        assert!(receivers[0].try_recv().is_err());
        let item = receivers[1].try_recv().unwrap();
        assert_eq!(item.key, "gaid:7rfw452y52g2gq4g");
    }

    #[test]
    fn test_unknown_class_is_routing_error() {
        let (routes, receivers) = routes_for(&["idfa"]);

        let err = route_line("imei\tabc\t1\t2\t3", &routes).unwrap_err();
        assert!(matches!(err, RouteError::Routing(RoutingError(ref c)) if c == "imei"));
        assert!(receivers[0].try_recv().is_err());
    }

    #[test]
    fn test_malformed_line() {
        let (routes, _receivers) = routes_for(&["idfa"]);
        let err = route_line("idfa\tabc\t1", &routes).unwrap_err();
        assert!(matches!(err, RouteError::Malformed(RecordError::TooFewFields(3))));
    }

    #[test]
    fn test_serialization_failure() {
        let (routes, receivers) = routes_for(&["idfa"]);
        let err = route_line("idfa\tabc def\t1\t2\t3", &routes).unwrap_err();
        assert!(matches!(err, RouteError::Serialization(SerializationError::InvalidKey(_))));
        assert!(receivers[0].try_recv().is_err());
    }

    #[test]
    fn test_closed_queue() {
        let (routes, receivers) = routes_for(&["idfa"]);
        drop(receivers);
        let err = route_line("idfa\tabc\t1\t2\t3", &routes).unwrap_err();
        assert!(matches!(err, RouteError::Closed(SinkError::QueueClosed(_))));
    }

    #[test]
    fn test_router_thread_reports_counts() {
        let (routes, receivers) = routes_for(&["idfa"]);
        let (line_tx, line_rx) = bounded(8);
        let (report_tx, report_rx) = unbounded();

        let handle = std::thread::spawn(move || {
            router_thread(3, line_rx, Arc::new(routes), report_tx)
        });
        line_tx.send("idfa\ta\t1\t2\t3".to_string()).unwrap();
        line_tx.send("idfa\tb\t1\t2\t3".to_string()).unwrap();
        line_tx.send("gaid\tc\t1\t2\t3".to_string()).unwrap();
        line_tx.send("bogus".to_string()).unwrap();
        // Key too long, then a key with whitespace: serialization failures
        line_tx.send(format!("idfa\t{}\t1\t2\t3", "x".repeat(300))).unwrap();
        line_tx.send("idfa\tabc def\t1\t2\t3".to_string()).unwrap();
        drop(line_tx);
        handle.join().unwrap();

        let report = report_rx.recv().unwrap();
        assert_eq!(report.role, WorkerRole::Router(3));
        assert_eq!(report.stat, WorkerStat { succeeded: 2, failed: 4 });
        assert_eq!(receivers[0].try_iter().count(), 2);
    }
}
