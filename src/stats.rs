use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Error rate at or above which a run is considered failed
pub const NORMAL_ERR_RATE: f64 = 0.01;

/// Terminal report of a single worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStat {
    pub succeeded: usize,
    pub failed: usize,
}

impl WorkerStat {
    pub fn merge(&mut self, other: &WorkerStat) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }
}

/// Outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Acceptable,
    HighErrorRate,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Acceptable => f.write_str("acceptable"),
            Verdict::HighErrorRate => f.write_str("high error rate"),
        }
    }
}

/// Statistics aggregated over a whole run
///
/// `processed` counts records the writers stored. `errors` counts every
/// record lost on the way: malformed lines, unknown device types and
/// serialization failures reported by routers, plus failed writes reported
/// by writers. `routed` is what routers handed to writers, so
/// `routed == processed + write failures` once all reports are in.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub processed: usize,
    pub errors: usize,
    pub routed: usize,
    pub lines_read: usize,
    pub files_processed: usize,
    pub files_skipped: usize,
    /// Writer report per destination class
    pub per_class: BTreeMap<String, WorkerStat>,
    #[serde(rename = "processing_time_ms", serialize_with = "serialize_millis")]
    pub processing_time: Duration,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in a router's terminal report
    pub fn merge_router(&mut self, stat: &WorkerStat) {
        self.routed += stat.succeeded;
        self.errors += stat.failed;
    }

    /// Fold in a writer's terminal report
    pub fn merge_writer(&mut self, class: &str, stat: &WorkerStat) {
        self.processed += stat.succeeded;
        self.errors += stat.failed;
        self.per_class.entry(class.to_string()).or_default().merge(stat);
    }

    /// `errors / processed`, or 1.0 when nothing was processed
    pub fn error_rate(&self) -> f64 {
        if self.processed == 0 {
            1.0
        } else {
            self.errors as f64 / self.processed as f64
        }
    }

    pub fn verdict(&self) -> Verdict {
        if self.error_rate() < NORMAL_ERR_RATE {
            Verdict::Acceptable
        } else {
            Verdict::HighErrorRate
        }
    }

    pub fn format_stats(&self) -> String {
        let mut output = format!(
            "Records: {} processed, {} errors, error rate {:.4} ({})",
            self.processed,
            self.errors,
            self.error_rate(),
            self.verdict()
        );

        output.push_str(&format!(
            "\nInput: {} lines, {} files processed",
            self.lines_read, self.files_processed
        ));
        if self.files_skipped > 0 {
            output.push_str(&format!(", {} skipped", self.files_skipped));
        }

        for (class, stat) in &self.per_class {
            output.push_str(&format!(
                "\n  {}: {} stored, {} failed",
                class, stat.succeeded, stat.failed
            ));
        }

        output.push_str(&format!(
            "\nProcessing time: {}ms",
            self.processing_time.as_millis()
        ));
        output
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        #[derive(Serialize)]
        struct Summary<'a> {
            #[serde(flatten)]
            stats: &'a RunStats,
            error_rate: f64,
            verdict: Verdict,
        }

        serde_json::to_string_pretty(&Summary {
            stats: self,
            error_rate: self.error_rate(),
            verdict: self.verdict(),
        })
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}
