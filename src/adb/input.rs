//! Text entry through the ADB Keyboard IME.
//!
//! Requires ADB Keyboard to be installed on the device.
//! See: https://github.com/senzhk/ADBKeyBoard

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use tokio::time::sleep;

use super::connection::AdbError;
use super::device::AdbDevice;

const ADB_KEYBOARD_IME: &str = "com.android.adbkeyboard/.AdbIME";

const IME_SWITCH_DELAY: Duration = Duration::from_secs(1);

impl AdbDevice {
    /// Type text into the focused field via an `ADB_INPUT_B64` broadcast.
    pub async fn type_text(&self, text: &str) -> Result<(), AdbError> {
        let encoded = STANDARD.encode(text.as_bytes());
        self.shell(&["am", "broadcast", "-a", "ADB_INPUT_B64", "--es", "msg", &encoded])
            .await?;
        Ok(())
    }

    /// Clear the focused input field.
    pub async fn clear_text(&self) -> Result<(), AdbError> {
        self.shell(&["am", "broadcast", "-a", "ADB_CLEAR_TEXT"])
            .await?;
        Ok(())
    }

    /// Switch to ADB Keyboard and return the previous IME for later restoration.
    pub async fn enable_adb_keyboard(&self) -> Result<String, AdbError> {
        let current = self
            .shell(&["settings", "get", "secure", "default_input_method"])
            .await?
            .trim()
            .to_string();

        if !current.contains(ADB_KEYBOARD_IME) {
            self.shell(&["ime", "set", ADB_KEYBOARD_IME]).await?;
        }

        // An empty broadcast wakes the IME up before the real text arrives.
        self.type_text("").await?;
        Ok(current)
    }

    /// Restore an IME previously returned by [`AdbDevice::enable_adb_keyboard`].
    pub async fn restore_keyboard(&self, ime: &str) -> Result<(), AdbError> {
        if ime.is_empty() || ime.contains(ADB_KEYBOARD_IME) {
            return Ok(());
        }
        self.shell(&["ime", "set", ime]).await?;
        Ok(())
    }

    /// Replace the content of the focused field: switch IME, clear, type, restore.
    pub async fn replace_text(&self, text: &str) -> Result<(), AdbError> {
        let original_ime = self.enable_adb_keyboard().await?;
        sleep(IME_SWITCH_DELAY).await;

        self.clear_text().await?;
        sleep(IME_SWITCH_DELAY).await;

        self.type_text(text).await?;
        sleep(IME_SWITCH_DELAY).await;

        self.restore_keyboard(&original_ime).await?;
        sleep(IME_SWITCH_DELAY).await;
        Ok(())
    }
}
