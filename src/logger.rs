//! Centralized logging configuration and initialization manager.
//!
//! The `LoggerManager` validates logging configuration and installs the
//! global `tracing` subscriber with console and/or systemd journald layers.
//! `RUST_LOG` takes precedence over the configured level when set.

use std::{fmt as std_fmt, io};

use thiserror::Error;
use time::{format_description::OwnedFormatItem, OffsetDateTime};
use tracing::instrument;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, format::Writer, time::FormatTime},
    prelude::*,
    EnvFilter, Layer,
};
use validator::{Validate, ValidationErrors};

use crate::{
    config::logger::{ConsoleConfig, JournaldConfig, LogFormat, LoggerConfig, TimestampFormat},
    print_info, print_warn,
};

type BoxedLayer = Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>;

#[derive(Error, Debug)]
pub enum LoggerError {
    /// A layer or the global subscriber could not be installed.
    #[error("Logger initialization error: {0}")]
    InitializationError(String),

    /// The logger configuration failed validation.
    #[error("Logger configuration validation error: {0}")]
    ValidationError(#[from] ValidationErrors),

    /// IO error, typically while connecting to the journald socket.
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// Neither console nor journald output ended up enabled.
    #[error("No logging layers were configured or successfully initialized")]
    NoLayersConfigured,

    /// Journald could not be reached while console output is also on.
    #[error(
        "Failed to initialize journald logger, and console logger is enabled. Please check your configuration."
    )]
    JournaldFailedWithConsoleEnabled,
}

/// Renders event timestamps in the configured [`TimestampFormat`].
#[derive(Clone)]
struct LogTimer {
    custom: Option<OwnedFormatItem>,
    unix: bool,
}

impl LogTimer {
    fn new(format: &TimestampFormat) -> Result<Self, LoggerError> {
        match format {
            TimestampFormat::Rfc3339 => Ok(Self {
                custom: None,
                unix: false,
            }),
            TimestampFormat::Unix => Ok(Self {
                custom: None,
                unix: true,
            }),
            TimestampFormat::Custom(description) => {
                let item = time::format_description::parse_owned::<2>(description)
                    .map_err(|e| LoggerError::InitializationError(e.to_string()))?;
                Ok(Self {
                    custom: Some(item),
                    unix: false,
                })
            }
        }
    }
}

impl FormatTime for LogTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std_fmt::Result {
        let now = OffsetDateTime::now_utc();
        if self.unix {
            return write!(w, "{}", now.unix_timestamp());
        }

        let rendered = match &self.custom {
            Some(item) => now.format(item),
            None => now.format(&time::format_description::well_known::Rfc3339),
        }
        .map_err(|_| std_fmt::Error)?;
        write!(w, "{rendered}")
    }
}

/// Manages logging configuration and global subscriber initialization.
pub struct LoggerManager {
    config: LoggerConfig,
}

impl LoggerManager {
    /// Creates a new `LoggerManager` and validates the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns `LoggerError::ValidationError` if configuration validation fails.
    pub fn new(config: LoggerConfig) -> Result<Self, LoggerError> {
        config.validate()?;

        Ok(LoggerManager { config })
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.config.directive()))
    }

    /// Builds the configured layers without installing them.
    fn layers(&self) -> Result<Vec<BoxedLayer>, LoggerError> {
        let mut layers = Vec::new();

        if let Some(console_config) = self.config.console.as_ref().filter(|c| c.enabled) {
            let timer = LogTimer::new(&self.config.timestamp_format)?;
            layers.push(self.init_console_logger(console_config, timer, self.filter()));
        }

        if let Some(journald_config) = self.config.journald.as_ref().filter(|j| j.enabled) {
            match self.init_journald_logger(journald_config, self.filter()) {
                Ok(journald_layer) => {
                    layers.push(journald_layer);
                    print_info!(
                        "Systemd journald logger initialized with identifier: {}",
                        journald_config.identifier
                    );
                }
                Err(e) => {
                    print_warn!("Failed to initialize systemd journald logger: {}", e);
                    if self.config.console.as_ref().is_some_and(|c| c.enabled) {
                        return Err(LoggerError::JournaldFailedWithConsoleEnabled);
                    }
                }
            }
        }

        if layers.is_empty() {
            print_warn!("No logging layers were initialized. Please check your configuration.");
            return Err(LoggerError::NoLayersConfigured);
        }

        Ok(layers)
    }

    /// Installs the global `tracing` subscriber.
    ///
    /// Must be called once at application startup before any tracing macros
    /// are used.
    ///
    /// # Errors
    ///
    /// Returns an error if no layer can be created, if journald fails while
    /// console output is also enabled, or if a global subscriber is already set.
    #[instrument(skip(self))]
    pub fn init(&mut self) -> Result<(), LoggerError> {
        let layers = self.layers()?;
        tracing_subscriber::registry()
            .with(layers)
            .try_init()
            .map_err(|e| LoggerError::InitializationError(e.to_string()))
    }

    fn init_console_logger(
        &self,
        config: &ConsoleConfig,
        timer: LogTimer,
        filter: EnvFilter,
    ) -> BoxedLayer {
        let spans = if config.show_spans {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let base = fmt::layer()
            .with_timer(timer)
            .with_target(config.show_target)
            .with_thread_ids(config.show_thread_ids)
            .with_span_events(spans)
            .with_ansi(config.ansi_colors)
            .with_writer(io::stdout);

        match config.format {
            LogFormat::Json => base.json().with_filter(filter).boxed(),
            LogFormat::Pretty => base.pretty().with_filter(filter).boxed(),
            LogFormat::Compact => base.compact().with_filter(filter).boxed(),
        }
    }

    fn init_journald_logger(
        &self,
        config: &JournaldConfig,
        filter: EnvFilter,
    ) -> Result<BoxedLayer, LoggerError> {
        let journald_layer =
            tracing_journald::layer()?.with_syslog_identifier(config.identifier.clone());
        Ok(journald_layer.with_filter(filter).boxed())
    }
}
