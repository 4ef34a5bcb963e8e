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

//! Bluetooth communication module.
//!
//! Discovers robots, holds the single active connection, sends operator
//! commands and publishes telemetry.

mod device;
mod manager;
pub mod protocol;
#[cfg(feature = "bluez")]
mod rfcomm;
mod telemetry;
mod transport;

pub use device::{simulated_devices, Device, Session};
pub use manager::ConnectionManager;
pub use protocol::RobotCommand;
#[cfg(feature = "bluez")]
pub use rfcomm::RfcommTransport;
pub use telemetry::{BatteryBand, MoistureBand, TelemetrySample, TelemetrySimulator};
pub use transport::{create_transport, RobotTransport, SimulatedTransport};
