//! Configuration Loading
//!
//! Discovers a TOML configuration file, flattens it into
//! `section -> key -> string` form and extracts typed engine settings.
//!
//! Discovery order: `$EVENTWIRE_CONFIG`, `<config dir>/eventwire/config.toml`,
//! `~/.eventwire.toml`, `./.eventwire.toml`. The first existing file wins.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info, LevelFilter};
use toml::Value;

use crate::event::config::{ExecutorConfig, NotifierConfig};
use crate::logging::{parse_log_level, LogConfig, LogDestination, LogFormat};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "EVENTWIRE_CONFIG";

/// Configuration storage - section_name -> key -> value
pub type Configuration = HashMap<String, HashMap<String, String>>;

/// Settings for one engine instance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub notifier: NotifierConfig,
    pub log_level: Option<LevelFilter>,
    pub log_format: Option<LogFormat>,
    pub log_file: Option<PathBuf>,
}

impl EngineConfig {
    /// Logging configuration, console plus an optional file at the same level
    pub fn log_config(&self) -> LogConfig {
        let level = self.log_level.unwrap_or(LevelFilter::Info);
        let destination = match &self.log_file {
            Some(path) => LogDestination::Both(path.clone()),
            None => LogDestination::Console,
        };
        LogConfig {
            console_level: level,
            file_level: self.log_file.as_ref().map(|_| level),
            format: self.log_format.clone().unwrap_or(LogFormat::Text),
            destination,
        }
    }
}

/// Configuration manager
pub struct ConfigManager {
    config: Configuration,
    config_file_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create a manager over an in-memory configuration
    pub fn from_config(config: Configuration) -> Self {
        Self {
            config,
            config_file_path: None,
        }
    }

    /// Load configuration using the discovery hierarchy
    pub fn load() -> Result<Self> {
        debug!("Starting configuration discovery");

        for path in discover_config_files() {
            debug!("Attempting to load config from: {}", path.display());
            if path.exists() {
                return Self::load_from_file(path);
            }
        }

        info!("No configuration file found, using defaults");
        Ok(Self::from_config(Configuration::new()))
    }

    /// Load configuration from an explicit file path
    pub fn load_from_file(path: PathBuf) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = parse_toml_config(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!("Loaded configuration from: {}", path.display());
        Ok(Self {
            config,
            config_file_path: Some(path),
        })
    }

    pub fn config_file_path(&self) -> Option<&Path> {
        self.config_file_path.as_deref()
    }

    pub fn get_value(&self, section: &str, key: &str) -> Option<&String> {
        self.config.get(section).and_then(|s| s.get(key))
    }

    pub fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>> {
        match self.get_value(section, key) {
            Some(value) => match value.to_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(anyhow::anyhow!("Invalid boolean value for {}.{}: {}", section, key, value)),
            },
            None => Ok(None),
        }
    }

    pub fn get_usize(&self, section: &str, key: &str) -> Result<Option<usize>> {
        match self.get_value(section, key) {
            Some(value) => value
                .trim()
                .parse::<usize>()
                .map(Some)
                .with_context(|| format!("Invalid integer value for {}.{}: {}", section, key, value)),
            None => Ok(None),
        }
    }

    /// Comma separated list; empty entries are dropped
    pub fn get_list(&self, section: &str, key: &str) -> Vec<String> {
        self.get_value(section, key)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_log_level(&self, section: &str, key: &str) -> Result<Option<LevelFilter>> {
        match self.get_value(section, key) {
            Some(value) => Ok(Some(
                parse_log_level(value).with_context(|| format!("Invalid value for {}.{}", section, key))?,
            )),
            None => Ok(None),
        }
    }

    pub fn get_path(&self, section: &str, key: &str) -> Option<PathBuf> {
        self.get_value(section, key).map(PathBuf::from)
    }

    /// Notifier settings from the `[notifier]` and `[executor]` sections
    pub fn get_notifier_config(&self) -> Result<NotifierConfig> {
        let defaults = NotifierConfig::default();
        let config = NotifierConfig {
            strict: self.get_bool("notifier", "strict")?.unwrap_or(defaults.strict),
            reserved_event_types: self.get_list("notifier", "reserved-event-types"),
            executor: ExecutorConfig {
                threads: self.get_usize("executor", "threads")?,
                thread_name: self
                    .get_value("executor", "thread-name")
                    .cloned()
                    .unwrap_or(defaults.executor.thread_name),
            },
        };

        config
            .validate()
            .context("Notifier configuration validation failed")?;
        Ok(config)
    }

    /// All engine settings
    pub fn get_engine_config(&self) -> Result<EngineConfig> {
        let log_format = match self.get_value("logging", "format") {
            Some(value) => Some(
                value
                    .parse::<LogFormat>()
                    .map_err(anyhow::Error::msg)
                    .context("Invalid value for logging.format")?,
            ),
            None => None,
        };

        Ok(EngineConfig {
            notifier: self.get_notifier_config()?,
            log_level: self.get_log_level("logging", "level")?,
            log_format,
            log_file: self.get_path("logging", "file"),
        })
    }
}

/// Candidate configuration files in order of precedence
fn discover_config_files() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        paths.push(PathBuf::from(env_path));
    }
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("eventwire").join("config.toml"));
    }
    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".eventwire.toml"));
    }
    paths.push(PathBuf::from("./.eventwire.toml"));

    debug!("Config discovery paths: {:?}", paths);
    paths
}

/// Parse TOML content into string-based configuration
fn parse_toml_config(content: &str) -> Result<Configuration> {
    let toml_value: Value = content.parse().context("Failed to parse TOML content")?;

    let mut config = Configuration::new();
    if let Value::Table(table) = toml_value {
        flatten_toml_table(&table, "", &mut config);
    }
    Ok(config)
}

/// Flatten nested tables into `section.subsection` names; top-level scalars
/// land in the `base` section
fn flatten_toml_table(table: &toml::Table, prefix: &str, config: &mut Configuration) {
    for (key, value) in table {
        match value {
            Value::Table(subtable) => {
                let section_name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                let section = config.entry(section_name.clone()).or_default();
                for (subkey, subvalue) in subtable {
                    if !matches!(subvalue, Value::Table(_)) {
                        section.insert(subkey.clone(), toml_value_to_string(subvalue));
                    }
                }
                let nested: toml::Table = subtable
                    .iter()
                    .filter(|(_, v)| matches!(v, Value::Table(_)))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                flatten_toml_table(&nested, &section_name, config);
            }
            _ => {
                let section = if prefix.is_empty() { "base".to_string() } else { prefix.to_string() };
                config
                    .entry(section)
                    .or_default()
                    .insert(key.clone(), toml_value_to_string(value));
            }
        }
    }
}

fn toml_value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        // Arrays of strings read as comma separated lists
        Value::Array(items) => items
            .iter()
            .map(toml_value_to_string)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
