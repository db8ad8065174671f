//! Sink writer workers, one per destination class

use crossbeam_channel::{Receiver, Sender};

use crate::codec::WriteItem;
use crate::sink::Sink;
use crate::stats::WorkerStat;

use super::types::{WorkerReport, WorkerRole};

/// Writer worker: drains the class queue into `sink` until every router has
/// dropped its sender. Failed writes are logged and dropped.
pub(crate) fn writer_thread(
    class: String,
    mut sink: Box<dyn Sink>,
    item_receiver: Receiver<WriteItem>,
    report_sender: Sender<WorkerReport>,
) {
    let mut stat = WorkerStat::default();

    for item in item_receiver.iter() {
        match sink.put(&item.key, &item.payload) {
            Ok(()) => stat.succeeded += 1,
            Err(e) => {
                tracing::warn!(class = %class, key = %item.key, error = %e, "cannot write to memc");
                stat.failed += 1;
            }
        }
    }

    let role = WorkerRole::Writer(class);
    tracing::debug!(
        worker = %role,
        addr = sink.addr(),
        succeeded = stat.succeeded,
        failed = stat.failed,
        "writer finished"
    );
    let _ = report_sender.send(WorkerReport { role, stat });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use bytes::Bytes;
    use crossbeam_channel::{bounded, unbounded};
    use std::sync::{Arc, Mutex};

    /// Records keys and fails every key listed in `fail`
    struct ScriptedSink {
        seen: Arc<Mutex<Vec<String>>>,
        fail: Vec<&'static str>,
    }

    impl Sink for ScriptedSink {
        fn put(&mut self, key: &str, _payload: &[u8]) -> Result<(), SinkError> {
            self.seen.lock().unwrap().push(key.to_string());
            if self.fail.iter().any(|f| *f == key) {
                return Err(SinkError::Rejected {
                    addr: "test".into(),
                    reply: "NOT_STORED".into(),
                });
            }
            Ok(())
        }

        fn addr(&self) -> &str {
            "test"
        }
    }

    fn item(key: &str) -> WriteItem {
        WriteItem {
            key: key.to_string(),
            payload: Bytes::from_static(b"\x11"),
        }
    }

    #[test]
    fn test_writer_counts_and_preserves_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = ScriptedSink {
            seen: Arc::clone(&seen),
            fail: vec!["idfa:b"],
        };
        let (item_tx, item_rx) = bounded(1);
        let (report_tx, report_rx) = unbounded();

        let handle = std::thread::spawn(move || {
            writer_thread("idfa".to_string(), Box::new(sink), item_rx, report_tx)
        });
        for key in ["idfa:a", "idfa:b", "idfa:c"] {
            item_tx.send(item(key)).unwrap();
        }
        drop(item_tx);
        handle.join().unwrap();

        let report = report_rx.recv().unwrap();
        assert_eq!(report.role, WorkerRole::Writer("idfa".to_string()));
        assert_eq!(report.stat, WorkerStat { succeeded: 2, failed: 1 });
        assert_eq!(*seen.lock().unwrap(), vec!["idfa:a", "idfa:b", "idfa:c"]);
    }
}
