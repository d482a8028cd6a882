//! IoT Agent endpoint and the desired provisioning state.
//!
//! Besides the endpoint, this section declares what the crawler registers on
//! startup: one config group for `(resource, api_key)` and, when a default
//! device id is configured, one device.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ulcrawler_iota::{ConfigGroup, Device, Scope};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct IotaConfig {
    #[validate(length(
        min = 1,
        max = 255,
        message = "IoT Agent host must be between 1 and 255 characters"
    ))]
    pub host: String,

    #[validate(range(min = 1, max = 65535, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    /// Per-request timeout in seconds.
    #[validate(range(min = 1, max = 300, message = "Timeout must be between 1 and 300 seconds"))]
    pub timeout: u64,

    #[validate(length(min = 1, message = "Service is required"))]
    pub service: String,

    #[validate(custom(function = "validate_service_path"))]
    pub service_path: String,

    #[validate(length(min = 1, message = "API key is required"))]
    pub api_key: String,

    #[validate(custom(function = "validate_resource"))]
    pub resource: String,

    /// Device registered on startup and used as the default publish target.
    #[validate(length(min = 1, message = "Device id cannot be empty"))]
    pub device_id: Option<String>,

    #[validate(length(min = 1, message = "Entity type is required"))]
    pub entity_type: String,

    pub entity_name_conjunction: Option<String>,

    /// Southbound transport declared for the device at creation.
    #[validate(length(min = 1))]
    pub transport: String,
}

fn validate_service_path(path: &str) -> Result<(), ValidationError> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_service_path")
            .with_message(format!("Service path must start with '/': '{path}'").into()))
    }
}

fn validate_resource(resource: &str) -> Result<(), ValidationError> {
    if resource.starts_with('/') {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_resource")
            .with_message(format!("Resource must start with '/': '{resource}'").into()))
    }
}

impl IotaConfig {
    pub fn scope(&self) -> Scope {
        Scope::new(self.service.clone(), self.service_path.clone())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Desired config group for this crawler.
    pub fn config_group(&self) -> ConfigGroup {
        ConfigGroup {
            default_entity_name_conjunction: self.entity_name_conjunction.clone(),
            ..ConfigGroup::new(
                self.resource.clone(),
                self.api_key.clone(),
                self.entity_type.clone(),
            )
        }
    }

    /// Desired default device, if one is configured.
    ///
    /// Attributes are declared implicitly: every measure published is mapped.
    pub fn device(&self) -> Option<Device> {
        let id = self.device_id.as_deref().filter(|id| !id.is_empty())?;
        Some(Device {
            explicit_attrs: Some(Value::Bool(false)),
            ..Device::new(id)
                .with_entity_type(self.entity_type.clone())
                .with_transport(self.transport.clone())
        })
    }
}

impl Default for IotaConfig {
    fn default() -> Self {
        IotaConfig {
            host: String::new(),
            port: 4041,
            timeout: 30,
            service: String::new(),
            service_path: String::new(),
            api_key: String::new(),
            resource: "/iot/d".to_string(),
            device_id: None,
            entity_type: String::new(),
            entity_name_conjunction: None,
            transport: "MQTT".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> IotaConfig {
        IotaConfig {
            host: "iot-agent".into(),
            service: "smart".into(),
            service_path: "/rooms".into(),
            api_key: "123456".into(),
            entity_type: "Thing".into(),
            device_id: Some("testDevice".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_need_required_fields() {
        assert!(IotaConfig::default().validate().is_err());
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_service_path_must_be_absolute() {
        let config = IotaConfig {
            service_path: "rooms".into(),
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_device_id_rejected() {
        let config = IotaConfig {
            device_id: Some(String::new()),
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_desired_records() {
        let config = IotaConfig {
            entity_name_conjunction: Some(":".into()),
            ..valid()
        };

        let group = config.config_group();
        assert_eq!(group.resource, "/iot/d");
        assert_eq!(group.apikey, "123456");
        assert_eq!(group.entity_type, "Thing");
        assert_eq!(group.default_entity_name_conjunction.as_deref(), Some(":"));

        let device = config.device().expect("device configured");
        assert_eq!(device.id, "testDevice");
        assert_eq!(device.transport.as_deref(), Some("MQTT"));
        assert_eq!(device.entity_type.as_deref(), Some("Thing"));
        assert!(device.entity_name.is_none());
    }

    #[test]
    fn test_no_device_without_id() {
        let config = IotaConfig {
            device_id: None,
            ..valid()
        };
        assert!(config.device().is_none());
    }

    #[test]
    fn test_scope() {
        assert_eq!(valid().scope(), Scope::new("smart", "/rooms"));
    }
}
