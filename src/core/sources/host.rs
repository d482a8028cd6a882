//! Host load and uptime read from procfs.
//!
//! Produces these attributes:
//!
//! | name            | origin                        |
//! |-----------------|-------------------------------|
//! | `load_1m`       | `/proc/loadavg` field 1       |
//! | `load_5m`       | `/proc/loadavg` field 2       |
//! | `load_15m`      | `/proc/loadavg` field 3       |
//! | `procs_running` | `/proc/loadavg` field 4, left |
//! | `procs_total`   | `/proc/loadavg` field 4, right|
//! | `uptime`        | `/proc/uptime` field 1 (s)    |
//! | `idle`          | `/proc/uptime` field 2 (s)    |

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;

use super::{AttributeSource, SourceError};
use crate::core::encoder::AttributeSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadAverage {
    /// Run queue average over the last minute.
    #[serde(rename = "load_1m")]
    pub one_minute: f64,
    /// Run queue average over the last five minutes.
    #[serde(rename = "load_5m")]
    pub five_minutes: f64,
    /// Run queue average over the last fifteen minutes.
    #[serde(rename = "load_15m")]
    pub fifteen_minutes: f64,
    /// Runnable scheduling entities right now.
    #[serde(rename = "procs_running")]
    pub running_processes: u32,
    /// Scheduling entities that currently exist.
    #[serde(rename = "procs_total")]
    pub total_processes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Uptime {
    /// Seconds since boot.
    #[serde(rename = "uptime")]
    pub uptime_seconds: f64,
    /// Summed across all cores. 0 when the kernel omits it.
    #[serde(rename = "idle")]
    pub idle_seconds: f64,
}

/// Reads load average and uptime on every tick.
#[derive(Debug, Clone)]
pub struct HostSource {
    proc_root: PathBuf,
}

impl Default for HostSource {
    fn default() -> Self {
        Self::with_proc_root("/proc")
    }
}

impl HostSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads from an alternative procfs mount, e.g. a host's `/proc`
    /// bind-mounted into a container.
    pub fn with_proc_root(root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: root.into(),
        }
    }

    async fn read(&self, name: &str) -> Result<(String, String), SourceError> {
        let path = self.proc_root.join(name);
        let location = path.display().to_string();
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| SourceError::FileRead {
                path: location.clone(),
                source,
            })?;
        Ok((content, location))
    }
}

#[async_trait]
impl AttributeSource for HostSource {
    async fn collect(&self) -> Result<AttributeSet, SourceError> {
        let (loadavg, location) = self.read("loadavg").await?;
        let mut attributes = AttributeSet::from_serialize(&parse_loadavg(&loadavg, &location)?)?;

        let (uptime, location) = self.read("uptime").await?;
        attributes.extend(AttributeSet::from_serialize(&parse_uptime(&uptime, &location)?)?);

        Ok(attributes)
    }
}

fn parse_field<T: std::str::FromStr>(
    raw: &str,
    attribute: &str,
    location: &str,
) -> Result<T, SourceError> {
    raw.parse::<T>().map_err(|_| SourceError::ParseError {
        attribute: attribute.to_string(),
        location: location.to_string(),
        reason: format!("invalid value: {raw}"),
    })
}

/// Parses `/proc/loadavg`, e.g. `0.52 0.58 0.59 2/1234 56789`.
pub fn parse_loadavg(content: &str, location: &str) -> Result<LoadAverage, SourceError> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 4 {
        return Err(SourceError::InvalidFormat {
            location: location.to_string(),
            reason: "Expected at least 4 fields".to_string(),
        });
    }

    let (running, total) = parts[3]
        .split_once('/')
        .ok_or_else(|| SourceError::InvalidFormat {
            location: location.to_string(),
            reason: "process field must be in format 'running/total'".to_string(),
        })?;

    Ok(LoadAverage {
        one_minute: parse_field(parts[0], "load_1m", location)?,
        five_minutes: parse_field(parts[1], "load_5m", location)?,
        fifteen_minutes: parse_field(parts[2], "load_15m", location)?,
        running_processes: parse_field(running, "procs_running", location)?,
        total_processes: parse_field(total, "procs_total", location)?,
    })
}

/// Parses `/proc/uptime`, e.g. `350735.47 234388.90`.
pub fn parse_uptime(content: &str, location: &str) -> Result<Uptime, SourceError> {
    let mut parts = content.split_whitespace();
    let uptime = parts.next().ok_or_else(|| SourceError::InvalidFormat {
        location: location.to_string(),
        reason: "file is empty".to_string(),
    })?;

    Ok(Uptime {
        uptime_seconds: parse_field(uptime, "uptime", location)?,
        idle_seconds: match parts.next() {
            Some(idle) => parse_field(idle, "idle", location)?,
            None => 0.0,
        },
    })
}
