//! Device control utilities for Android automation.

use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tokio::time::sleep;

use crate::config::get_package;

use super::connection::AdbError;

/// Name reported when the foreground package is not a known app.
pub const UNKNOWN_APP: &str = "System Home";

/// Time given to the UI to settle after an input event.
const SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Gap between the two taps of a double tap.
const DOUBLE_TAP_INTERVAL: Duration = Duration::from_millis(100);

const LONG_PRESS_MS: u64 = 3000;

/// Handle to a single device, or to the only attached one when `serial` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdbDevice {
    adb_path: String,
    serial: Option<String>,
}

impl AdbDevice {
    pub fn new(adb_path: impl Into<String>, serial: Option<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
            serial,
        }
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Build an `adb [-s serial]` command.
    pub(crate) fn command(&self) -> Command {
        let mut cmd = Command::new(&self.adb_path);
        if let Some(serial) = &self.serial {
            cmd.args(["-s", serial]);
        }
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    /// Run an adb command to completion and fail on a non-zero exit status.
    pub(crate) async fn run(&self, args: &[&str]) -> Result<Output, AdbError> {
        let output = self.command().args(args).output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AdbError::CommandFailed(format!(
                "adb {}: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(output)
    }

    /// Run `adb shell <args>` and return stdout.
    pub(crate) async fn shell(&self, args: &[&str]) -> Result<String, AdbError> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push("shell");
        full.extend_from_slice(args);
        let output = self.run(&full).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Get the display name of the focused app, or [`UNKNOWN_APP`].
    pub async fn current_app(&self) -> String {
        match self.shell(&["dumpsys", "window"]).await {
            Ok(stdout) => app_from_window_dump(&stdout),
            Err(e) => {
                tracing::debug!("Failed to read focused window: {}", e);
                UNKNOWN_APP.to_string()
            }
        }
    }

    /// Tap at the specified pixel coordinates.
    pub async fn tap(&self, x: i32, y: i32) -> Result<(), AdbError> {
        self.shell(&["input", "tap", &x.to_string(), &y.to_string()])
            .await?;
        sleep(SETTLE_DELAY).await;
        Ok(())
    }

    /// Double tap at the specified pixel coordinates.
    pub async fn double_tap(&self, x: i32, y: i32) -> Result<(), AdbError> {
        let (x, y) = (x.to_string(), y.to_string());
        self.shell(&["input", "tap", &x, &y]).await?;
        sleep(DOUBLE_TAP_INTERVAL).await;
        self.shell(&["input", "tap", &x, &y]).await?;
        sleep(SETTLE_DELAY).await;
        Ok(())
    }

    /// Long press at the specified pixel coordinates.
    pub async fn long_press(&self, x: i32, y: i32) -> Result<(), AdbError> {
        let (x, y) = (x.to_string(), y.to_string());
        self.shell(&["input", "swipe", &x, &y, &x, &y, &LONG_PRESS_MS.to_string()])
            .await?;
        sleep(SETTLE_DELAY).await;
        Ok(())
    }

    /// Swipe between two points; the duration grows with the distance.
    pub async fn swipe(&self, start: (i32, i32), end: (i32, i32)) -> Result<(), AdbError> {
        let duration = swipe_duration_ms(start, end);
        self.shell(&[
            "input",
            "swipe",
            &start.0.to_string(),
            &start.1.to_string(),
            &end.0.to_string(),
            &end.1.to_string(),
            &duration.to_string(),
        ])
        .await?;
        sleep(SETTLE_DELAY).await;
        Ok(())
    }

    /// Press the back button.
    pub async fn back(&self) -> Result<(), AdbError> {
        self.shell(&["input", "keyevent", "4"]).await?;
        sleep(SETTLE_DELAY).await;
        Ok(())
    }

    /// Press the home button.
    pub async fn home(&self) -> Result<(), AdbError> {
        self.shell(&["input", "keyevent", "KEYCODE_HOME"]).await?;
        sleep(SETTLE_DELAY).await;
        Ok(())
    }

    /// Launch an app by display name.
    ///
    /// Returns `Ok(false)` when the name has no known package.
    pub async fn launch_app(&self, app_name: &str) -> Result<bool, AdbError> {
        let Some(package) = get_package(app_name) else {
            return Ok(false);
        };

        self.shell(&[
            "monkey",
            "-p",
            package,
            "-c",
            "android.intent.category.LAUNCHER",
            "1",
        ])
        .await?;
        sleep(SETTLE_DELAY).await;
        Ok(true)
    }
}

/// Find the focused package in `dumpsys window` output and map it to an app name.
fn app_from_window_dump(dump: &str) -> String {
    dump.lines()
        .filter(|line| line.contains("mCurrentFocus") || line.contains("mFocusedApp"))
        .find_map(crate::config::app_for_window_line)
        .unwrap_or(UNKNOWN_APP)
        .to_string()
}

fn swipe_duration_ms(start: (i32, i32), end: (i32, i32)) -> u64 {
    let dx = (start.0 - end.0) as i64;
    let dy = (start.1 - end.1) as i64;
    ((dx * dx + dy * dy) as u64 / 1000).clamp(1000, 2000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_from_window_dump() {
        let dump = "  mCurrentFocus=Window{1a2b u0 com.tencent.mm/com.tencent.mm.ui.LauncherUI}\n";
        assert_eq!(app_from_window_dump(dump), "微信");

        let home = "  mCurrentFocus=Window{9f u0 com.google.android.apps.nexuslauncher/.NexusLauncherActivity}\n";
        assert_eq!(app_from_window_dump(home), UNKNOWN_APP);
        assert_eq!(app_from_window_dump(""), UNKNOWN_APP);
    }

    #[test]
    fn test_swipe_duration_is_clamped() {
        assert_eq!(swipe_duration_ms((0, 0), (10, 10)), 1000);
        assert_eq!(swipe_duration_ms((0, 0), (0, 1200)), 1440);
        assert_eq!(swipe_duration_ms((0, 0), (0, 3000)), 2000);
    }

    #[tokio::test]
    async fn test_launch_app_unknown() {
        let device = AdbDevice::new("adb", None);
        assert!(!device.launch_app("UnknownApp123").await.unwrap());
    }

    #[test]
    fn test_command_includes_serial() {
        let device = AdbDevice::new("adb", Some("device123".to_string()));
        let cmd = device.command();
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["-s", "device123"]);
    }
}
