// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Human-readable outcome messages for a presentation layer.

use crate::bluetooth::{Device, RobotCommand};
use crate::error::BluetoothError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    /// Failures and warnings the operator should not miss.
    Destructive,
}

/// A titled message describing the outcome of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub title: String,
    pub description: String,
}

impl Notice {
    fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            title: title.into(),
            description: description.into(),
        }
    }

    fn destructive(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity: Severity::Destructive,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn scan_failed() -> Self {
        Self::destructive(
            "Scanning Failed",
            "Could not scan for Bluetooth devices. Please check your permissions.",
        )
    }

    pub fn untrusted_device() -> Self {
        Self::destructive(
            "Untrusted Device",
            "Warning: You are connecting to an untrusted device.",
        )
    }

    /// Connection refused because only trusted devices are allowed.
    pub fn untrusted_blocked(device_id: &str) -> Self {
        Self::destructive(
            "Untrusted Device Blocked",
            format!(
                "{} is not trusted. Disable trusted-only mode to connect to it.",
                device_id
            ),
        )
    }

    pub fn connected(device: &Device) -> Self {
        Self::info(
            "Connected",
            format!("Successfully connected to {}", device.name),
        )
    }

    pub fn connection_failed() -> Self {
        Self::destructive(
            "Connection Failed",
            "Failed to connect to the device. Please try again.",
        )
    }

    pub fn connection_error() -> Self {
        Self::destructive(
            "Connection Error",
            "An error occurred while connecting to the device.",
        )
    }

    pub fn disconnected() -> Self {
        Self::info("Disconnected", "The robot has been disconnected.")
    }

    pub fn not_connected() -> Self {
        Self::destructive(
            "Not Connected",
            "Please connect to an AgriBot device first.",
        )
    }

    pub fn command_sent(command: RobotCommand) -> Self {
        match command {
            RobotCommand::StopAll => Self::info(
                "Stopped All Operations",
                "All robot operations have been stopped.",
            ),
            other => {
                let label = other.label();
                Self::info(
                    format!("Started {}", label),
                    format!(
                        "The robot has started the {} operation.",
                        label.to_lowercase()
                    ),
                )
            }
        }
    }

    pub fn command_failed() -> Self {
        Self::destructive(
            "Command Failed",
            "Failed to send command to the robot. Please try again.",
        )
    }

    pub fn command_error() -> Self {
        Self::destructive(
            "Command Error",
            "An error occurred while sending the command.",
        )
    }

    pub fn data_cleared() -> Self {
        Self::info("Data Cleared", "All historical data has been cleared.")
    }

    /// Notice for a failed `connect`.
    pub fn for_connect_error(error: &BluetoothError) -> Self {
        match error {
            BluetoothError::UntrustedDevice(id) => Self::untrusted_blocked(id),
            BluetoothError::DeviceNotFound(_)
            | BluetoothError::ConnectionTimeout(_)
            | BluetoothError::ConnectionRefused(_)
            | BluetoothError::ConnectionFailed(_) => Self::connection_failed(),
            BluetoothError::ScanFailed(_) => Self::scan_failed(),
            _ => Self::connection_error(),
        }
    }

    /// Notice for a failed command.
    pub fn for_command_error(error: &BluetoothError) -> Self {
        match error {
            BluetoothError::NotConnected => Self::not_connected(),
            BluetoothError::CommandFailed(_) | BluetoothError::CommandTimeout(_) => {
                Self::command_failed()
            }
            _ => Self::command_error(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_notices() {
        let started = Notice::command_sent(RobotCommand::Irrigate);
        assert_eq!(started.title, "Started Irrigation");
        assert_eq!(
            started.description,
            "The robot has started the irrigation operation."
        );
        assert_eq!(started.severity, Severity::Info);

        let stopped = Notice::command_sent(RobotCommand::StopAll);
        assert_eq!(stopped.title, "Stopped All Operations");
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            Notice::for_command_error(&BluetoothError::NotConnected),
            Notice::not_connected()
        );
        assert_eq!(
            Notice::for_command_error(&BluetoothError::CommandFailed("gone".into())),
            Notice::command_failed()
        );
        assert_eq!(
            Notice::for_connect_error(&BluetoothError::ConnectionRefused("x".into())),
            Notice::connection_failed()
        );
        assert_eq!(
            Notice::for_connect_error(&BluetoothError::AlreadyConnected("x".into())),
            Notice::connection_error()
        );
        assert_eq!(
            Notice::for_connect_error(&BluetoothError::UntrustedDevice("HC-05".into())).title,
            "Untrusted Device Blocked"
        );
    }

    #[test]
    fn test_outcomes_are_distinct() {
        let device = Device::new("00:11:22:33:44:55", "AgriBot-001", true);
        let mut notices = vec![
            Notice::scan_failed(),
            Notice::untrusted_device(),
            Notice::untrusted_blocked("HC-05"),
            Notice::connected(&device),
            Notice::connection_failed(),
            Notice::connection_error(),
            Notice::disconnected(),
            Notice::not_connected(),
            Notice::command_failed(),
            Notice::command_error(),
            Notice::data_cleared(),
        ];
        notices.extend(RobotCommand::ALL.iter().map(|c| Notice::command_sent(*c)));

        for (i, a) in notices.iter().enumerate() {
            for b in &notices[i + 1..] {
                assert_ne!(a.title, b.title);
            }
        }
    }
}
