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

//! Link-layer transports the connection manager drives.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::device::{simulated_devices, Device};
use crate::config::{BluetoothConfig, TransportKind};
use crate::error::BluetoothError;

/// Radio access used by the connection manager.
#[async_trait]
pub trait RobotTransport: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// List nearby devices.
    async fn discover(&self) -> Result<Vec<Device>, BluetoothError>;

    /// Open a link to `device`.
    async fn open(&self, device: &Device) -> Result<(), BluetoothError>;

    /// Close the link to `device`.
    async fn close(&self, device: &Device) -> Result<(), BluetoothError>;

    /// Write one command frame and wait for the link to accept it.
    async fn write(&self, device: &Device, frame: &[u8]) -> Result<(), BluetoothError>;
}

/// Transport that never touches a radio.
///
/// Discovery returns a fixed device list and open/close just wait. Written
/// frames are kept so callers can inspect what would have gone on the air.
pub struct SimulatedTransport {
    connect_delay: Duration,
    disconnect_delay: Duration,
    written: Mutex<Vec<(String, Vec<u8>)>>,
    write_failures: Mutex<VecDeque<BluetoothError>>,
    scan_failure: Mutex<Option<String>>,
    close_failure: Mutex<Option<String>>,
    refuse_connections: Mutex<bool>,
    write_delay: Mutex<Duration>,
}

impl SimulatedTransport {
    pub fn new(connect_delay: Duration, disconnect_delay: Duration) -> Self {
        Self {
            connect_delay,
            disconnect_delay,
            written: Mutex::new(Vec::new()),
            write_failures: Mutex::new(VecDeque::new()),
            scan_failure: Mutex::new(None),
            close_failure: Mutex::new(None),
            refuse_connections: Mutex::new(false),
            write_delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn from_config(config: &BluetoothConfig) -> Self {
        Self::new(config.connect_delay(), config.disconnect_delay())
    }

    /// Frames written so far, with the target device id.
    pub fn written_frames(&self) -> Vec<(String, Vec<u8>)> {
        self.written.lock().clone()
    }

    /// Make the next writes fail with the given errors, in order.
    pub fn fail_next_writes(&self, errors: impl IntoIterator<Item = BluetoothError>) {
        self.write_failures.lock().extend(errors);
    }

    /// Make every scan fail with `reason`, or succeed again with `None`.
    pub fn set_scan_failure(&self, reason: Option<String>) {
        *self.scan_failure.lock() = reason;
    }

    /// Refuse every subsequent connection attempt.
    pub fn set_refuse_connections(&self, refuse: bool) {
        *self.refuse_connections.lock() = refuse;
    }

    /// Make every close fail with an I/O error after the teardown delay.
    pub fn set_close_failure(&self, reason: Option<String>) {
        *self.close_failure.lock() = reason;
    }

    /// Hold every write for `delay` before it is accepted.
    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock() = delay;
    }
}

#[async_trait]
impl RobotTransport for SimulatedTransport {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn discover(&self) -> Result<Vec<Device>, BluetoothError> {
        if let Some(reason) = self.scan_failure.lock().clone() {
            return Err(BluetoothError::ScanFailed(reason));
        }
        Ok(simulated_devices())
    }

    async fn open(&self, device: &Device) -> Result<(), BluetoothError> {
        tokio::time::sleep(self.connect_delay).await;
        if *self.refuse_connections.lock() {
            return Err(BluetoothError::ConnectionRefused(device.id.clone()));
        }
        debug!(device = %device.id, "Simulated link opened");
        Ok(())
    }

    async fn close(&self, device: &Device) -> Result<(), BluetoothError> {
        tokio::time::sleep(self.disconnect_delay).await;
        if let Some(reason) = self.close_failure.lock().clone() {
            return Err(BluetoothError::Io(reason));
        }
        debug!(device = %device.id, "Simulated link closed");
        Ok(())
    }

    async fn write(&self, device: &Device, frame: &[u8]) -> Result<(), BluetoothError> {
        let delay = *self.write_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.write_failures.lock().pop_front() {
            return Err(error);
        }
        self.written.lock().push((device.id.clone(), frame.to_vec()));
        debug!(device = %device.name, frame = ?frame, "Simulated frame written");
        Ok(())
    }
}

/// Create the transport selected in the configuration.
pub async fn create_transport(config: &BluetoothConfig) -> Result<Arc<dyn RobotTransport>> {
    match config.transport {
        TransportKind::Simulated => {
            info!("Using simulated Bluetooth transport");
            Ok(Arc::new(SimulatedTransport::from_config(config)))
        }
        #[cfg(feature = "bluez")]
        TransportKind::Rfcomm => {
            let transport = super::rfcomm::RfcommTransport::new(config.rfcomm_channel).await?;
            Ok(Arc::new(transport))
        }
        #[cfg(not(feature = "bluez"))]
        TransportKind::Rfcomm => {
            anyhow::bail!("RFCOMM transport requires building with the `bluez` feature")
        }
    }
}
