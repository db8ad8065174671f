use std::time::Duration;

use indexmap::IndexMap;

use crate::error::ConfigError;

pub const DEFAULT_PATTERN: &str = "/data/appsinstalled/*.tsv.gz";
pub const DEFAULT_WORKERS: usize = 5;
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Reference destination classes and their default backends
pub const DEFAULT_DESTINATIONS: [(&str, &str); 4] = [
    ("idfa", "127.0.0.1:33013"),
    ("gaid", "127.0.0.1:33014"),
    ("adid", "127.0.0.1:33015"),
    ("dvid", "127.0.0.1:33016"),
];

/// Main configuration struct, built once and shared read-only by every stage
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub input: InputConfig,
    pub pipeline: PipelineConfig,
    pub destinations: DestinationTable,
    /// Replace backend writes with logged no-ops
    pub dry_run: bool,
    /// Connect/read/write timeout for backends; `None` blocks indefinitely
    pub timeout: Option<Duration>,
}

/// Input configuration
#[derive(Debug, Clone)]
pub struct InputConfig {
    pub pattern: String,
    pub file_order: FileOrder,
}

/// Worker pool configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of line router workers
    pub workers: usize,
    /// Bound applied to every hand-off queue
    pub queue_capacity: usize,
}

/// File processing order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOrder {
    None,
    Name,
    NameDesc,
    Mtime,
}

/// Destination class -> backend address, in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DestinationTable {
    entries: IndexMap<String, String>,
}

impl DestinationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four reference classes with their default addresses
    pub fn reference() -> Self {
        let mut table = Self::new();
        for (class, addr) in DEFAULT_DESTINATIONS {
            table.entries.insert(class.to_string(), addr.to_string());
        }
        table
    }

    /// Add or replace a destination
    pub fn insert(&mut self, class: &str, addr: &str) -> Result<(), ConfigError> {
        let class = class.trim();
        let addr = addr.trim();
        if class.is_empty() {
            return Err(ConfigError::EmptyClass);
        }
        if class.contains(':') {
            return Err(ConfigError::InvalidClass(class.to_string()));
        }
        if addr.is_empty() {
            return Err(ConfigError::EmptyAddress(class.to_string()));
        }
        self.entries.insert(class.to_string(), addr.to_string());
        Ok(())
    }

    /// Parse and insert a `CLASS=ADDR` specification
    pub fn insert_spec(&mut self, spec: &str) -> Result<(), ConfigError> {
        let (class, addr) = spec
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidDestination(spec.to_string()))?;
        self.insert(class, addr)
    }

    pub fn get(&self, class: &str) -> Option<&str> {
        self.entries.get(class).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(c, a)| (c.as_str(), a.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LoaderConfig {
    /// Create configuration from CLI arguments
    pub fn from_cli(cli: &crate::cli::Cli) -> Result<Self, ConfigError> {
        let mut destinations = DestinationTable::new();
        destinations.insert("idfa", &cli.idfa)?;
        destinations.insert("gaid", &cli.gaid)?;
        destinations.insert("adid", &cli.adid)?;
        destinations.insert("dvid", &cli.dvid)?;
        for spec in &cli.destinations {
            destinations.insert_spec(spec)?;
        }

        let config = Self {
            input: InputConfig {
                pattern: cli.pattern.clone(),
                file_order: cli.file_order.clone().into(),
            },
            pipeline: PipelineConfig {
                workers: cli.workers,
                queue_capacity: cli.queue_capacity,
            },
            destinations,
            dry_run: cli.dry,
            timeout: cli.timeout,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.destinations.is_empty() {
            return Err(ConfigError::NoDestinations);
        }
        Ok(())
    }

    /// Get effective worker count, 0 meaning one per CPU
    pub fn effective_workers(&self) -> usize {
        if self.pipeline.workers == 0 {
            num_cpus::get()
        } else {
            self.pipeline.workers
        }
    }

    /// Dry-run configuration for the given pattern, used by tests and benches
    pub fn dry_run(pattern: impl Into<String>) -> Self {
        Self {
            input: InputConfig {
                pattern: pattern.into(),
                ..Default::default()
            },
            dry_run: true,
            ..Default::default()
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.pipeline.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.pipeline.queue_capacity = capacity;
        self
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            pipeline: PipelineConfig {
                workers: DEFAULT_WORKERS,
                queue_capacity: DEFAULT_QUEUE_CAPACITY,
            },
            destinations: DestinationTable::reference(),
            dry_run: false,
            timeout: None,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.to_string(),
            file_order: FileOrder::Name,
        }
    }
}

impl From<crate::cli::FileOrder> for FileOrder {
    fn from(order: crate::cli::FileOrder) -> Self {
        match order {
            crate::cli::FileOrder::None => FileOrder::None,
            crate::cli::FileOrder::Name => FileOrder::Name,
            crate::cli::FileOrder::NameDesc => FileOrder::NameDesc,
            crate::cli::FileOrder::Mtime => FileOrder::Mtime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_defaults_from_cli() {
        let cli = Cli::parse_from(["memc-load"]);
        let config = LoaderConfig::from_cli(&cli).unwrap();

        assert_eq!(config.input.pattern, DEFAULT_PATTERN);
        assert_eq!(config.pipeline.workers, 5);
        assert_eq!(config.pipeline.queue_capacity, 10);
        assert!(!config.dry_run);
        assert_eq!(config.timeout, None);
        assert_eq!(config.destinations, DestinationTable::reference());
    }

    #[test]
    fn test_dest_overrides_and_extends() {
        let cli = Cli::parse_from([
            "memc-load",
            "--dest",
            "idfa=10.0.0.1:11211",
            "--dest",
            "imei=10.0.0.2:11211",
            "--timeout",
            "3s",
        ]);
        let config = LoaderConfig::from_cli(&cli).unwrap();

        assert_eq!(config.destinations.get("idfa"), Some("10.0.0.1:11211"));
        assert_eq!(config.destinations.get("imei"), Some("10.0.0.2:11211"));
        assert_eq!(config.destinations.len(), 5);
        assert_eq!(config.timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_invalid_destinations() {
        let mut table = DestinationTable::new();
        assert_eq!(table.insert("", "a:1"), Err(ConfigError::EmptyClass));
        assert_eq!(
            table.insert("id:fa", "a:1"),
            Err(ConfigError::InvalidClass("id:fa".into()))
        );
        assert_eq!(
            table.insert("idfa", " "),
            Err(ConfigError::EmptyAddress("idfa".into()))
        );
        assert_eq!(
            table.insert_spec("idfa"),
            Err(ConfigError::InvalidDestination("idfa".into()))
        );
    }

    #[test]
    fn test_zero_queue_capacity_rejected() {
        let cli = Cli::parse_from(["memc-load", "--queue-capacity", "0"]);
        assert_eq!(
            LoaderConfig::from_cli(&cli).unwrap_err(),
            ConfigError::ZeroQueueCapacity
        );
    }

    #[test]
    fn test_effective_workers() {
        let config = LoaderConfig::default().with_workers(0);
        assert!(config.effective_workers() >= 1);
        assert_eq!(LoaderConfig::default().with_workers(3).effective_workers(), 3);
    }
}
