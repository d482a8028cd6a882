//! Application configuration loading, validation, and management.
//!
//! The top-level `Config` aggregates logging, scheduling, IoT Agent and
//! broker settings. It is read from a TOML file, then selected settings are
//! overridden from the environment, then the result is validated as a whole.
//!
//! The configuration is loaded early in the application lifecycle and is
//! intended to remain immutable thereafter.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use validator::Validate;

use self::{crawler::CrawlerConfig, iota::IotaConfig, logger::LoggerConfig};

pub mod crawler;
pub mod iota;
pub mod logger;

/// Simple macros for printing timestamped messages before the tracing subscriber
/// is initialized. These are used during early configuration loading.
#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style($crate::config::early_timestamp()).dim(),
            console::style("INFO").green(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style($crate::config::early_timestamp()).dim(),
            console::style("WARN").yellow(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        eprintln!("{}  {} {}",
            console::style($crate::config::early_timestamp()).dim(),
            console::style("ERROR").red(),
            format_args!($($arg)*)
        );
    };
}

const EARLY_TIMESTAMP: &[time::format_description::FormatItem<'static>] = time::macros::format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
);

#[doc(hidden)]
pub fn early_timestamp() -> String {
    time::OffsetDateTime::now_utc()
        .format(EARLY_TIMESTAMP)
        .unwrap_or_default()
}

const CONFIG_ENV: &str = "ULCRAWLER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "/etc/ulcrawler/config.toml";

/// Errors that can occur during configuration loading, parsing, or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error while reading configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// Failure to parse the TOML file or an environment value.
    #[error("Parse error while reading configuration: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Broker settings, owned by the MQTT crate.
pub type TransportConfig = ulcrawler_mqtt::Config;

/// Top-level application configuration.
#[derive(Serialize, Deserialize, Debug, Validate, Clone, Default)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub logger: LoggerConfig,

    #[validate(nested)]
    pub crawler: CrawlerConfig,

    #[validate(nested)]
    pub iota: IotaConfig,

    #[validate(nested)]
    pub transport: TransportConfig,
}

impl Config {
    /// Builds the runtime configuration from file and environment.
    ///
    /// A missing default file is not an error: everything can come from the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or parsed, an
    /// environment value cannot be parsed, or the result fails validation.
    pub fn new() -> Result<Self, ConfigError> {
        let mut config = match Self::get_config_path() {
            Some(path) => Self::read(&path)?,
            None => {
                print_warn!("No configuration file found, using defaults and environment");
                Config::default()
            }
        };

        config.apply_env(std::env::vars())?;
        config.check()?;
        Ok(config)
    }

    /// Determines the configuration file path.
    ///
    /// Priority:
    /// 1. `ULCRAWLER_CONFIG` environment variable
    /// 2. `/etc/ulcrawler/config.toml`, if it exists
    fn get_config_path() -> Option<PathBuf> {
        if let Ok(config_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(config_path);
            print_info!("Using config from {}: {}", CONFIG_ENV, path.display());
            return Some(path);
        }

        let fallback = Path::new(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            print_info!("Using default config path: {}", fallback.display());
            return Some(fallback.to_path_buf());
        }

        None
    }

    /// Loads and validates configuration from the specified path, without
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Propagates IO, parsing, and validation errors as `ConfigError`.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let config = Self::read(path)?;
        config.check()?;
        print_info!("Successfully loaded config from: {}", path.display());
        Ok(config)
    }

    fn read(path: &Path) -> Result<Config, ConfigError> {
        print_info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let config_str = fs::read_to_string(path)?;
        toml::from_str(&config_str).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn check(&self) -> Result<(), ConfigError> {
        self.validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Overrides settings from environment variables.
    ///
    /// Recognized names: `CRONTAB`, `IOTA_HOST`, `IOTA_PORT`, `SERVICE`,
    /// `SERVICE_PATH`, `API_KEY`, `RESOURCE`, `DEVICE_ID`, `ENTITY_TYPE`,
    /// `LOG_LEVEL`, `MQTT_BROKER`, `MQTT_PORT`, `CLIENT_ID`, `USERNAME` and
    /// `PASSWORD`. Empty values are ignored.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` if a port is not a valid number.
    pub fn apply_env<I, K, V>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let value: String = value.into();
            if value.is_empty() {
                continue;
            }

            match key.as_ref() {
                "CRONTAB" => self.crawler.schedule = value,
                "IOTA_HOST" => self.iota.host = value,
                "IOTA_PORT" => self.iota.port = parse_port("IOTA_PORT", &value)?,
                "SERVICE" => self.iota.service = value,
                "SERVICE_PATH" => self.iota.service_path = value,
                "API_KEY" => self.iota.api_key = value,
                "RESOURCE" => self.iota.resource = value,
                "DEVICE_ID" => self.iota.device_id = Some(value),
                "ENTITY_TYPE" => self.iota.entity_type = value,
                "LOG_LEVEL" => self.logger.level = value,
                "MQTT_BROKER" => self.transport.host = value,
                "MQTT_PORT" => self.transport.port = parse_port("MQTT_PORT", &value)?,
                "CLIENT_ID" => self.transport.client_id = value,
                "USERNAME" => self.transport.username = Some(value),
                "PASSWORD" => self.transport.password = Some(value),
                _ => {}
            }
        }
        Ok(())
    }
}

fn parse_port(name: &str, value: &str) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::ParseError(format!("{name}='{value}': {e}")))
}
