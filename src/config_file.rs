use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::env;
use std::path::{Path, PathBuf};

const PROJECT_FILE_NAME: &str = ".memcloadrc";

/// Configuration file handler for memc-load
#[derive(Debug, Default)]
pub struct ConfigFile {
    pub defaults: Option<String>,
    /// `[destinations]` section, class -> address
    pub destinations: IndexMap<String, String>,
}

impl ConfigFile {
    /// Find project-level .memcloadrc by walking up directory tree
    pub fn find_project_config() -> Option<PathBuf> {
        let mut current = env::current_dir().ok()?;
        loop {
            let config_path = current.join(PROJECT_FILE_NAME);
            if config_path.exists() {
                return Some(config_path);
            }
            if !current.pop() {
                break;
            }
        }
        None
    }

    /// User config file locations in order of preference
    pub fn get_user_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. $XDG_CONFIG_HOME/memc-load/config.ini
        // 2. ~/.config/memc-load/config.ini
        // 3. ~/.memcloadrc
        let xdg_config = env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                env::var("HOME")
                    .map(|h| PathBuf::from(h).join(".config"))
                    .unwrap_or_else(|_| PathBuf::from(".config"))
            });
        paths.push(xdg_config.join("memc-load").join("config.ini"));

        if let Ok(home) = env::var("HOME") {
            paths.push(PathBuf::from(home).join(PROJECT_FILE_NAME));
        }

        paths
    }

    /// Load configuration: the user file first, then the project file on top
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::get_user_config_paths()
            .into_iter()
            .find(|p| p.exists())
        {
            config = Self::merge_configs(config, Self::load_from_path(&path)?);
        }

        if let Some(project_path) = Self::find_project_config() {
            config = Self::merge_configs(config, Self::load_from_path(&project_path)?);
        }

        Ok(config)
    }

    /// Load configuration with optional custom config file path
    pub fn load_with_custom_path(custom_path: Option<&str>) -> Result<Self> {
        match custom_path {
            Some(path) => Self::load_from_path(Path::new(path)),
            None => Self::load(),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Ok(Self::parse_ini_content(&content))
    }

    fn parse_ini_content(content: &str) -> Self {
        let mut config = Self::default();
        let mut current_section = String::new();

        for line in content.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                current_section = line[1..line.len() - 1].trim().to_string();
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            // Unknown keys and sections are ignored
            match current_section.as_str() {
                "" if key == "defaults" => config.defaults = Some(value.to_string()),
                "destinations" => {
                    config
                        .destinations
                        .insert(key.to_string(), value.to_string());
                }
                _ => {}
            }
        }

        config
    }

    /// Merge two configurations, the second taking precedence
    fn merge_configs(base: Self, overlay: Self) -> Self {
        let mut destinations = base.destinations;
        destinations.extend(overlay.destinations);
        Self {
            defaults: overlay.defaults.or(base.defaults),
            destinations,
        }
    }

    /// Print where configuration comes from and what is active
    pub fn show_config() {
        println!("Configuration precedence: CLI > project .memcloadrc > user config > built-in\n");

        let project_config_path = Self::find_project_config();
        let user_config_paths = Self::get_user_config_paths();
        let user_config_path = user_config_paths.iter().find(|p| p.exists());

        match Self::load() {
            Ok(merged) => {
                let mut loaded_from = Vec::new();
                if let Some(path) = &project_config_path {
                    loaded_from.push(format!("Project: {}", path.display()));
                }
                if let Some(path) = user_config_path {
                    loaded_from.push(format!("User: {}", path.display()));
                }

                if loaded_from.is_empty() {
                    println!("No configuration files found. Using built-in defaults.");
                } else {
                    println!("Configuration loaded from:");
                    for source in loaded_from {
                        println!("  {}", source);
                    }
                }

                if let Some(defaults) = &merged.defaults {
                    println!("\nActive defaults:");
                    println!("  defaults = {}", defaults);
                }
                if !merged.destinations.is_empty() {
                    println!("\nActive destinations:");
                    for (class, addr) in &merged.destinations {
                        println!("  {} = {}", class, addr);
                    }
                }
            }
            Err(e) => eprintln!("Error loading configuration: {}", e),
        }

        println!("\nConfiguration search locations (in precedence order):");
        match &project_config_path {
            Some(path) => println!("  1. Project: {} (found)", path.display()),
            None => println!("  1. Project: .memcloadrc (searched up directory tree, not found)"),
        }
        for (i, path) in user_config_paths.iter().enumerate() {
            let status = if path.exists() { "(found)" } else { "(not found)" };
            println!("  {}. User: {} {}", i + 2, path.display(), status);
        }

        if project_config_path.is_none() && user_config_path.is_none() {
            println!("\nExample configuration file (.memcloadrc):");
            println!();
            println!("# Arguments applied to every memc-load run");
            println!("defaults = --workers 8 --timeout 3s --pattern '/data/appsinstalled/*.tsv.gz'");
            println!();
            println!("[destinations]");
            println!("idfa = 10.0.0.1:11211");
            println!("imei = 10.0.0.9:11211");
        }
    }

    /// Apply defaults and destinations in front of the user arguments
    ///
    /// The program name stays first; everything from the file goes before the
    /// user's own arguments so that the latter win.
    pub fn process_args(&self, args: Vec<String>) -> Result<Vec<String>> {
        if self.defaults.is_none() && self.destinations.is_empty() {
            return Ok(args);
        }

        let mut args = args.into_iter();
        let mut result: Vec<String> = args.next().into_iter().collect();

        if let Some(defaults) = &self.defaults {
            let default_args = shell_words::split(defaults)
                .context("Invalid defaults: failed to parse arguments")?;
            result.extend(default_args);
        }

        for (class, addr) in &self.destinations {
            result.push("--dest".to_string());
            result.push(format!("{}={}", class, addr));
        }

        result.extend(args);
        Ok(result)
    }
}
