// tests/common/mod.rs
// Shared test utilities for integration tests
#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;

use memc_load::error::SinkError;
use memc_load::{DryRunSink, Sink, SinkSet};

pub const IDFA_LINE: &str = "idfa\t1rfw452y52g2gq4g\t55.55\t42.42\t1423,43,567,3,7,23";
pub const GAID_LINE: &str = "gaid\t7rfw452y52g2gq4g\t55.55\t42.42\t7423,424";

/// Run the built binary with the given arguments, ignoring any user config
pub fn run_memc_load(args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_memc-load"))
        .arg("--ignore-config")
        .args(args)
        .env_remove("RUST_LOG")
        .stdin(Stdio::null())
        .output()
        .expect("Failed to execute memc-load");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Write `lines` gzip-compressed, one per line, to `dir/name`
pub fn write_gz(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).expect("Failed to create fixture");
    let mut encoder = GzEncoder::new(file, Compression::default());
    for line in lines {
        writeln!(encoder, "{}", line).expect("Failed to write fixture");
    }
    encoder.finish().expect("Failed to finish gzip");
    path
}

/// `count` well-formed lines for `class` with distinct device ids
pub fn class_lines(class: &str, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("{}\tdev{:05}\t{}.5\t{}.25\t{},{},{}", class, i, i % 90, i % 180, i, i + 1, i + 2))
        .collect()
}

/// Keys written to a sink, shared with the test body
pub type Seen = Arc<Mutex<Vec<String>>>;

/// Records every key; optionally sleeps per write and fails selected keys
pub struct ScriptedSink {
    pub seen: Seen,
    pub delay: Option<Duration>,
    pub fail_every: Option<usize>,
}

impl ScriptedSink {
    pub fn recording() -> (Self, Seen) {
        let seen = Seen::default();
        (
            Self {
                seen: Arc::clone(&seen),
                delay: None,
                fail_every: None,
            },
            seen,
        )
    }
}

impl Sink for ScriptedSink {
    fn put(&mut self, key: &str, _payload: &[u8]) -> Result<(), SinkError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let mut seen = self.seen.lock().unwrap();
        seen.push(key.to_string());
        match self.fail_every {
            Some(n) if seen.len() % n == 0 => Err(SinkError::Rejected {
                addr: "scripted".into(),
                reply: "SERVER_ERROR out of memory".into(),
            }),
            _ => Ok(()),
        }
    }

    fn addr(&self) -> &str {
        "scripted"
    }
}

/// Dry-run sinks for the reference classes
pub fn dry_sinks() -> SinkSet {
    let mut sinks = SinkSet::new();
    for class in ["idfa", "gaid", "adid", "dvid"] {
        sinks.insert(class.to_string(), Box::new(DryRunSink::new(class)));
    }
    sinks
}
