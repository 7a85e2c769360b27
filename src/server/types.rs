//! Request and response bodies of the HTTP API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adb::{ConnectionType, DeviceInfo};

/// Body of `POST /execute` and `POST /chat`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskRequest {
    pub task: Option<String>,
    pub device_id: Option<String>,
    /// Only checked for presence by `/chat`.
    pub message: Option<String>,
}

impl TaskRequest {
    /// Parse a request body; anything that is not a JSON object yields `None`.
    pub fn from_body(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }
}

/// Device entry of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthDevice {
    pub id: String,
    pub status: String,
    #[serde(rename = "type")]
    pub connection_type: ConnectionType,
    pub model: Option<String>,
}

impl From<DeviceInfo> for HealthDevice {
    fn from(device: DeviceInfo) -> Self {
        Self {
            id: device.device_id,
            status: device.status,
            connection_type: device.connection_type,
            model: device.model,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub agent_initialized: bool,
    pub devices: Vec<HealthDevice>,
}

/// Device entry of `GET /devices`.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceEntry {
    pub id: String,
    pub status: String,
    pub connection_type: ConnectionType,
    pub model: Option<String>,
}

impl From<DeviceInfo> for DeviceEntry {
    fn from(device: DeviceInfo) -> Self {
        Self {
            id: device.device_id,
            status: device.status,
            connection_type: device.connection_type,
            model: device.model,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DevicesResponse {
    pub devices: Vec<DeviceEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteResponse {
    pub status: &'static str,
    pub task: String,
    pub task_id: Uuid,
    pub message: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopResponse {
    pub status: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_request_from_body() {
        let request = TaskRequest::from_body(br#"{"task":"open app","device_id":"abc"}"#).unwrap();
        assert_eq!(request.task.as_deref(), Some("open app"));
        assert_eq!(request.device_id.as_deref(), Some("abc"));
        assert_eq!(request.message, None);

        assert!(TaskRequest::from_body(b"").is_none());
        assert!(TaskRequest::from_body(b"not json").is_none());
        assert!(TaskRequest::from_body(br#"{}"#).unwrap().task.is_none());
    }

    #[test]
    fn test_device_shapes() {
        let device = DeviceInfo {
            device_id: "192.168.1.5:5555".to_string(),
            status: "device".to_string(),
            connection_type: ConnectionType::Remote,
            model: Some("Pixel_7".to_string()),
        };

        let health = serde_json::to_value(HealthDevice::from(device.clone())).unwrap();
        assert_eq!(
            health,
            json!({"id": "192.168.1.5:5555", "status": "device", "type": "remote", "model": "Pixel_7"})
        );

        let entry = serde_json::to_value(DeviceEntry::from(device)).unwrap();
        assert_eq!(entry["connection_type"], "remote");
        assert!(entry.get("type").is_none());
    }
}
