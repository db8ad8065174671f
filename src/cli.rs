// CLI-specific types and structures
// This module contains the command-line interface definitions

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{DEFAULT_PATTERN, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};

#[derive(clap::ValueEnum, Clone, Debug)]
pub enum FileOrder {
    None,
    Name,
    NameDesc,
    Mtime,
}

#[derive(clap::ValueEnum, Clone, Debug, Default, PartialEq)]
pub enum StatsFormat {
    #[default]
    Table,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "memc-load")]
#[command(about = "Load installed-apps logs into per-device memcached backends")]
#[command(
    long_about = "Load installed-apps logs into per-device memcached backends\n\nInput files are gzip (or zstd, or plain) TSV with one device per line:\n  dev_type<TAB>dev_id<TAB>lat<TAB>lon<TAB>app,app,...\n\nRecords are routed by dev_type to the matching backend. Each processed file is\nrenamed to a dot-file so a re-run skips it. The run succeeds when the error\nrate stays below 1%.\n\nCOMMON EXAMPLES:\n  memc-load --pattern '/data/appsinstalled/*.tsv.gz'\n  memc-load --dry --pattern 'sample/*.tsv.gz' --workers 8\n  memc-load --dest imei=10.0.0.5:11211"
)]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Log writes instead of sending them to the backends
    #[arg(long = "dry", help_heading = "Processing Options")]
    pub dry: bool,

    /// Encode and decode the built-in sample records, then exit
    #[arg(short = 't', long = "test", help_heading = "Processing Options")]
    pub test: bool,

    /// Glob pattern selecting input files
    #[arg(long = "pattern", default_value = DEFAULT_PATTERN, help_heading = "Input Options")]
    pub pattern: String,

    /// File processing order
    #[arg(
        long = "file-order",
        value_enum,
        default_value = "name",
        help_heading = "Input Options"
    )]
    pub file_order: FileOrder,

    /// Number of line router workers (0 = one per CPU)
    #[arg(
        short = 'w',
        long = "workers",
        default_value_t = DEFAULT_WORKERS,
        help_heading = "Performance Options"
    )]
    pub workers: usize,

    /// Capacity of every hand-off queue
    #[arg(
        long = "queue-capacity",
        default_value_t = DEFAULT_QUEUE_CAPACITY,
        help_heading = "Performance Options"
    )]
    pub queue_capacity: usize,

    /// Backend timeout for connect, read and write (e.g. 3s, 500ms). Blocks forever when unset
    #[arg(long = "timeout", value_parser = humantime::parse_duration, help_heading = "Backend Options")]
    pub timeout: Option<Duration>,

    /// memcached address for idfa records
    #[arg(long = "idfa", default_value = "127.0.0.1:33013", help_heading = "Backend Options")]
    pub idfa: String,

    /// memcached address for gaid records
    #[arg(long = "gaid", default_value = "127.0.0.1:33014", help_heading = "Backend Options")]
    pub gaid: String,

    /// memcached address for adid records
    #[arg(long = "adid", default_value = "127.0.0.1:33015", help_heading = "Backend Options")]
    pub adid: String,

    /// memcached address for dvid records
    #[arg(long = "dvid", default_value = "127.0.0.1:33016", help_heading = "Backend Options")]
    pub dvid: String,

    /// Additional or overriding destination as CLASS=ADDR (repeatable)
    #[arg(long = "dest", value_name = "CLASS=ADDR", help_heading = "Backend Options")]
    pub destinations: Vec<String>,

    /// Append log output to this file instead of stderr
    #[arg(long = "log", help_heading = "Logging Options")]
    pub log: Option<PathBuf>,

    /// Log level when RUST_LOG is not set (default: info, or debug with --dry)
    #[arg(long = "log-level", help_heading = "Logging Options")]
    pub log_level: Option<String>,

    /// Format of the run summary printed to stdout
    #[arg(
        long = "stats-format",
        value_enum,
        default_value = "table",
        help_heading = "Display Options"
    )]
    pub stats_format: StatsFormat,

    /// Do not print the run summary
    #[arg(short = 'q', long = "quiet", help_heading = "Display Options")]
    pub quiet: bool,

    /// Use this config file instead of the search locations
    #[arg(long = "config-file", help_heading = "Configuration Options")]
    pub config_file: Option<String>,

    /// Ignore all config files
    #[arg(long = "ignore-config", help_heading = "Configuration Options")]
    pub ignore_config: bool,

    /// Show the effective configuration file and exit
    #[arg(long = "show-config", help_heading = "Configuration Options")]
    pub show_config: bool,
}

impl Cli {
    /// Log level used when RUST_LOG is not set
    pub fn effective_log_level(&self) -> &str {
        match &self.log_level {
            Some(level) => level,
            None if self.dry => "debug",
            None => "info",
        }
    }
}
