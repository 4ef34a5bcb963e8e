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

//! Application state management.
//!
//! Wires the connection manager to the log store and keeps the values a
//! front end needs to render: connection status and the latest sample.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

use crate::bluetooth::{ConnectionManager, Device, RobotCommand, TelemetrySample};
use crate::error::BluetoothError;
use crate::events::Subscription;
use crate::storage::{LogEntry, LogStore};

/// Connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Connecting => "Connecting...",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Error => "Error",
        }
    }
}

/// Shared application state.
pub struct AppState {
    manager: Arc<ConnectionManager>,
    logs: Arc<LogStore>,

    /// Current connection status.
    status: Arc<RwLock<ConnectionStatus>>,

    /// Most recent telemetry of the active session.
    latest_sample: Arc<RwLock<Option<TelemetrySample>>>,

    connection_subscription: Subscription,
    telemetry_subscription: Subscription,
}

impl AppState {
    /// Subscribe to the manager's channels. With `record_telemetry` every
    /// sample is appended to the log.
    pub fn new(
        manager: Arc<ConnectionManager>,
        logs: Arc<LogStore>,
        record_telemetry: bool,
    ) -> Arc<Self> {
        let status = Arc::new(RwLock::new(ConnectionStatus::Disconnected));
        let latest_sample = Arc::new(RwLock::new(None));

        let connection_subscription = {
            let status = status.clone();
            let latest_sample = latest_sample.clone();
            manager.subscribe_connection(move |connected: &bool| {
                if *connected {
                    *status.write() = ConnectionStatus::Connected;
                } else {
                    *status.write() = ConnectionStatus::Disconnected;
                    *latest_sample.write() = None;
                }
            })
        };

        let telemetry_subscription = {
            let latest_sample = latest_sample.clone();
            let logs = logs.clone();
            manager.subscribe_telemetry(move |sample: &TelemetrySample| {
                *latest_sample.write() = Some(*sample);
                if record_telemetry {
                    logs.record_telemetry(sample);
                }
            })
        };

        Arc::new(Self {
            manager,
            logs,
            status,
            latest_sample,
            connection_subscription,
            telemetry_subscription,
        })
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub fn logs(&self) -> &Arc<LogStore> {
        &self.logs
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.read()
    }

    pub fn latest_sample(&self) -> Option<TelemetrySample> {
        *self.latest_sample.read()
    }

    /// Connect and track the status around the attempt.
    pub async fn connect(&self, device_id: &str) -> Result<Device, BluetoothError> {
        *self.status.write() = ConnectionStatus::Connecting;
        let result = self.manager.connect(device_id).await;
        self.settle_status(result.is_err());
        result
    }

    pub async fn disconnect(&self) -> Result<(), BluetoothError> {
        let result = self.manager.disconnect().await;
        self.settle_status(false);
        result
    }

    /// Read the outcome back from the manager; a concurrent connect or
    /// disconnect may have finished in the meantime.
    fn settle_status(&self, failed: bool) {
        // The manager updates its session before notifying listeners, so
        // holding the status lock here cannot lose a later notification.
        let mut status = self.status.write();
        *status = if self.manager.is_connected() {
            ConnectionStatus::Connected
        } else if failed {
            ConnectionStatus::Error
        } else {
            ConnectionStatus::Disconnected
        };
    }

    /// Send `command` and log it with the latest telemetry snapshot.
    ///
    /// Returns the logged entry, or `None` when no telemetry has arrived yet.
    pub async fn issue_command(
        &self,
        command: RobotCommand,
    ) -> Result<Option<LogEntry>, BluetoothError> {
        self.manager.send_command(command).await?;

        match self.latest_sample() {
            Some(sample) => Ok(Some(self.logs.record_command(command, &sample))),
            None => {
                warn!("No telemetry yet; {} not logged", command.label());
                Ok(None)
            }
        }
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        self.manager
            .unsubscribe_connection(&self.connection_subscription);
        self.manager
            .unsubscribe_telemetry(&self.telemetry_subscription);
        info!("Application state released");
    }
}
