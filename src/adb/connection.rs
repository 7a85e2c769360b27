//! Device enumeration over `adb devices -l`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;

/// Type of ADB connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Usb,
    Wifi,
    Remote,
}

impl ConnectionType {
    /// Classify a device serial as reported by `adb devices`.
    pub fn from_serial(serial: &str) -> Self {
        if serial.starts_with("adb-") && serial.contains("._adb-tls-connect.") {
            // Android 11+ wireless debugging advertises itself over mDNS.
            ConnectionType::Wifi
        } else if serial.contains(':') {
            ConnectionType::Remote
        } else {
            ConnectionType::Usb
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Usb => "usb",
            ConnectionType::Wifi => "wifi",
            ConnectionType::Remote => "remote",
        }
    }
}

/// Information about a connected device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_id: String,
    pub status: String,
    pub connection_type: ConnectionType,
    pub model: Option<String>,
}

/// ADB errors.
#[derive(Error, Debug)]
pub enum AdbError {
    #[error("Failed to run adb: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Command execution failed: {0}")]
    CommandFailed(String),
}

/// Source of the live device list.
///
/// The HTTP layer only depends on this trait so it can be exercised without a
/// real `adb` binary on the path.
#[async_trait]
pub trait DeviceLister: Send + Sync {
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, AdbError>;
}

/// Entry point for host-side ADB commands that are not tied to one device.
///
/// # Example
/// ```rust,no_run
/// use phone_agent_api::adb::AdbConnection;
///
/// # async fn demo() -> Result<(), phone_agent_api::adb::AdbError> {
/// let conn = AdbConnection::new();
/// for device in conn.list_devices().await? {
///     println!("{} ({})", device.device_id, device.status);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AdbConnection {
    adb_path: String,
}

impl Default for AdbConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl AdbConnection {
    /// Create a connection manager that uses `adb` from `PATH`.
    pub fn new() -> Self {
        Self::with_path("adb")
    }

    /// Create a connection manager with a custom ADB binary.
    pub fn with_path(adb_path: impl Into<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
        }
    }

    pub fn adb_path(&self) -> &str {
        &self.adb_path
    }

    /// List all devices known to the ADB server, whatever their state.
    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>, AdbError> {
        let output = Command::new(&self.adb_path)
            .args(["devices", "-l"])
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AdbError::CommandFailed(stderr.trim().to_string()));
        }

        Ok(parse_devices_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[async_trait]
impl DeviceLister for AdbConnection {
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, AdbError> {
        AdbConnection::list_devices(self).await
    }
}

/// Parse the output of `adb devices -l`.
pub(crate) fn parse_devices_output(stdout: &str) -> Vec<DeviceInfo> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        // Header line and daemon start-up chatter.
        .filter(|line| !line.starts_with("List of devices") && !line.starts_with('*'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let device_id = parts.next()?.to_string();
            let status = parts.next()?.to_string();
            let model = parts
                .find_map(|p| p.strip_prefix("model:"))
                .map(str::to_string);

            Some(DeviceInfo {
                connection_type: ConnectionType::from_serial(&device_id),
                device_id,
                status,
                model,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_devices_output() {
        let stdout = "List of devices attached\n\
            emulator-5554          device product:sdk_gphone64 model:sdk_gphone64_x86_64 device:emu64x transport_id:1\n\
            192.168.1.100:5555     device product:panther model:Pixel_7 device:panther transport_id:2\n\
            R58M123ABC             unauthorized usb:1-1 transport_id:3\n\n";

        let devices = parse_devices_output(stdout);
        assert_eq!(devices.len(), 3);

        assert_eq!(devices[0].device_id, "emulator-5554");
        assert_eq!(devices[0].connection_type, ConnectionType::Usb);
        assert_eq!(devices[0].model.as_deref(), Some("sdk_gphone64_x86_64"));

        assert_eq!(devices[1].connection_type, ConnectionType::Remote);
        assert_eq!(devices[1].model.as_deref(), Some("Pixel_7"));

        assert_eq!(devices[2].status, "unauthorized");
        assert_eq!(devices[2].model, None);
    }

    #[test]
    fn test_parse_devices_output_empty() {
        assert!(parse_devices_output("List of devices attached\n\n").is_empty());
        assert!(parse_devices_output(
            "* daemon not running; starting now at tcp:5037\n* daemon started successfully\nList of devices attached\n"
        )
        .is_empty());
    }

    #[test]
    fn test_connection_type_from_serial() {
        assert_eq!(
            ConnectionType::from_serial("adb-R58M123ABC-xyz._adb-tls-connect._tcp"),
            ConnectionType::Wifi
        );
        assert_eq!(ConnectionType::from_serial("10.0.0.2:5555"), ConnectionType::Remote);
        assert_eq!(ConnectionType::from_serial("R58M123ABC"), ConnectionType::Usb);
        assert_eq!(serde_json::to_string(&ConnectionType::Wifi).unwrap(), "\"wifi\"");
    }

    #[test]
    fn test_adb_connection_new() {
        let conn = AdbConnection::new();
        assert_eq!(conn.adb_path(), "adb");
    }
}
