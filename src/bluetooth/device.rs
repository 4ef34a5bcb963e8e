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

//! Discovered devices and the active session.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A device reported by a discovery scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Bluetooth address, the device's identity.
    pub id: String,
    pub name: String,
    pub is_connected: bool,
    /// Previously known / approved by the operator.
    pub is_trusted: bool,
}

impl Device {
    pub fn new(id: impl Into<String>, name: impl Into<String>, is_trusted: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_connected: false,
            is_trusted,
        }
    }
}

/// Fixed result returned by the simulated scanner.
pub fn simulated_devices() -> Vec<Device> {
    vec![
        Device::new("00:11:22:33:44:55", "AgriBot-001", true),
        Device::new("11:22:33:44:55:66", "HC-05", false),
        Device::new("22:33:44:55:66:77", "Unknown Device", false),
        Device::new("33:44:55:66:77:88", "AgriBot-002", true),
        Device::new("44:55:66:77:88:99", "BT Device", false),
    ]
}

/// The single active connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: Uuid,
    pub device: Device,
    pub connected_at: DateTime<Utc>,
}

impl Session {
    pub fn new(device: Device, connected_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            device,
            connected_at,
        }
    }
}
