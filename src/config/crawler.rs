//! Scheduling settings for the crawl loop.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Six-field cron expression with seconds: `sec min hour dom month dow`.
    #[validate(custom(function = "validate_schedule"))]
    pub schedule: String,

    /// Stop after this many runs. Unlimited when unset.
    #[validate(range(min = 1, message = "Tick limit must be at least 1"))]
    pub tick_limit: Option<u64>,
}

fn validate_schedule(expression: &str) -> Result<(), ValidationError> {
    if expression.trim().is_empty() {
        return Err(ValidationError::new("missing_schedule")
            .with_message("A cron schedule is required (CRONTAB)".into()));
    }

    cron::Schedule::from_str(expression).map(|_| ()).map_err(|e| {
        ValidationError::new("invalid_schedule")
            .with_message(format!("Invalid cron expression '{expression}': {e}").into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_required() {
        assert!(CrawlerConfig::default().validate().is_err());
    }

    #[test]
    fn test_six_field_schedule_accepted() {
        let config = CrawlerConfig {
            schedule: "*/2 * * * * *".into(),
            tick_limit: Some(3),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_garbage_schedule_rejected() {
        let config = CrawlerConfig {
            schedule: "every now and then".into(),
            tick_limit: None,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_tick_limit_rejected() {
        let config = CrawlerConfig {
            schedule: "* * * * * *".into(),
            tick_limit: Some(0),
        };
        assert!(config.validate().is_err());
    }
}
