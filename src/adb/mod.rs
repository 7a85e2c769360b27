//! ADB (Android Debug Bridge) module for device interaction.
//!
//! Every command is spawned through `tokio::process` with `kill_on_drop`, so
//! dropping an in-flight future (for example when a task is stopped) also
//! terminates the underlying `adb` process.

mod connection;
mod device;
mod input;
mod screenshot;

pub use connection::{AdbConnection, AdbError, ConnectionType, DeviceInfo, DeviceLister};
pub use device::{AdbDevice, UNKNOWN_APP};
pub use screenshot::Screenshot;
