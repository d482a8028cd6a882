//! IoT Agent provisioning records.
//!
//! Field names follow the IoT Agent northbound API, so these types can be
//! sent and received as-is. Optional fields are omitted from request bodies
//! when unset.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tenant and sub-tenant every provisioning request is scoped to.
///
/// Sent as the `fiware-service` and `fiware-servicepath` headers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    pub service: String,
    pub service_path: String,
}

impl Scope {
    pub fn new(service: impl Into<String>, service_path: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            service_path: service_path.into(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.service, self.service_path)
    }
}

/// Identity of a config group within a scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub resource: String,
    pub apikey: String,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource={} apikey={}", self.resource, self.apikey)
    }
}

/// Active attribute mapping from a device measure to an entity attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub attr_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticAttribute {
    pub name: String,
    #[serde(rename = "type")]
    pub attr_type: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    #[serde(rename = "type")]
    pub attr_type: String,
}

/// Provisioning template shared by every device that authenticates with
/// the same `apikey` on the same `resource`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigGroup {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub apikey: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entity_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust: Option<String>,
    #[serde(rename = "cbHost", skip_serializing_if = "Option::is_none")]
    pub cb_host: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lazy: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<Command>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_attributes: Vec<StaticAttribute>,
    #[serde(rename = "explicitAttrs", skip_serializing_if = "Option::is_none")]
    pub explicit_attrs: Option<Value>,
    #[serde(rename = "entityNameExp", skip_serializing_if = "Option::is_none")]
    pub entity_name_exp: Option<String>,
    /// Joins entity type and device id when the platform derives an entity name.
    #[serde(
        rename = "defaultEntityNameConjunction",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_entity_name_conjunction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoprovision: Option<bool>,
}

impl ConfigGroup {
    pub fn new(
        resource: impl Into<String>,
        apikey: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> Self {
        Self {
            resource: resource.into(),
            apikey: apikey.into(),
            entity_type: entity_type.into(),
            ..Default::default()
        }
    }

    pub fn group_key(&self) -> GroupKey {
        GroupKey {
            resource: self.resource.clone(),
            apikey: self.apikey.clone(),
        }
    }
}

/// Device registration.
///
/// `entity_name` is assigned by the platform when left unset on creation
/// and cannot change afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(
        rename = "device_id",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apikey: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Southbound transport. Accepted on creation only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lazy: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<Command>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_attributes: Vec<StaticAttribute>,
    #[serde(rename = "explicitAttrs", skip_serializing_if = "Option::is_none")]
    pub explicit_attrs: Option<Value>,
    #[serde(rename = "ngsiVersion", skip_serializing_if = "Option::is_none")]
    pub ngsi_version: Option<String>,
}

impl Device {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_transport(mut self, transport: impl Into<String>) -> Self {
        self.transport = Some(transport.into());
        self
    }

    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_config_group_wire_names() {
        let group = ConfigGroup {
            default_entity_name_conjunction: Some(":".into()),
            explicit_attrs: Some(json!(false)),
            ..ConfigGroup::new("/iot/d", "key", "Thing")
        };

        assert_eq!(
            serde_json::to_value(&group).unwrap(),
            json!({
                "resource": "/iot/d",
                "apikey": "key",
                "entity_type": "Thing",
                "explicitAttrs": false,
                "defaultEntityNameConjunction": ":"
            })
        );
    }

    #[test]
    fn test_device_omits_unset_fields() {
        let device = Device::new("dev1").with_transport("MQTT");
        assert_eq!(
            serde_json::to_value(&device).unwrap(),
            json!({ "device_id": "dev1", "transport": "MQTT" })
        );
    }

    #[test]
    fn test_device_reads_platform_response() {
        let device: Device = serde_json::from_value(json!({
            "device_id": "dev1",
            "service": "smart",
            "service_path": "/rooms",
            "entity_name": "Thing:dev1",
            "entity_type": "Thing",
            "transport": "MQTT",
            "attributes": [{ "object_id": "t", "name": "temperature", "type": "Number" }],
            "lazy": [],
            "commands": [],
            "static_attributes": [],
            "explicitAttrs": false
        }))
        .unwrap();

        assert_eq!(device.id, "dev1");
        assert_eq!(device.entity_name.as_deref(), Some("Thing:dev1"));
        assert_eq!(device.attributes[0].object_id.as_deref(), Some("t"));
    }

    #[test]
    fn test_group_key_display() {
        let key = ConfigGroup::new("/iot/d", "key", "Thing").group_key();
        assert_eq!(key.to_string(), "resource=/iot/d apikey=key");
    }
}
