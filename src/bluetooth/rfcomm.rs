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

//! Serial-port-profile transport over BlueZ RFCOMM.
//!
//! The robot's HC-05 style module exposes a plain serial channel; commands go
//! out as single bytes.

use anyhow::Result;
use async_trait::async_trait;
use bluer::rfcomm::{SocketAddr, Stream};
use bluer::Address;
use std::io;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::device::Device;
use super::transport::RobotTransport;
use crate::error::BluetoothError;

/// RFCOMM link to a robot.
pub struct RfcommTransport {
    adapter: bluer::Adapter,
    channel: u8,
    stream: Mutex<Option<Stream>>,
}

impl RfcommTransport {
    /// Open the default adapter, powering it on if needed.
    pub async fn new(channel: u8) -> Result<Self> {
        let session = bluer::Session::new().await?;
        let adapter = session.default_adapter().await?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        if !adapter.is_powered().await? {
            info!("Powering on Bluetooth adapter...");
            adapter.set_powered(true).await?;
        }

        Ok(Self {
            adapter,
            channel,
            stream: Mutex::new(None),
        })
    }
}

fn connect_error(device: &Device, err: io::Error) -> BluetoothError {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => BluetoothError::ConnectionRefused(device.id.clone()),
        io::ErrorKind::TimedOut => BluetoothError::ConnectionTimeout(device.id.clone()),
        _ => BluetoothError::ConnectionFailed(format!("{}: {}", device.id, err)),
    }
}

#[async_trait]
impl RobotTransport for RfcommTransport {
    fn name(&self) -> &'static str {
        "rfcomm"
    }

    /// Lists devices BlueZ already knows about. Paired devices count as trusted.
    async fn discover(&self) -> Result<Vec<Device>, BluetoothError> {
        let addresses = self
            .adapter
            .device_addresses()
            .await
            .map_err(|e| BluetoothError::ScanFailed(e.to_string()))?;

        let mut devices = Vec::with_capacity(addresses.len());
        for addr in addresses {
            let device = self
                .adapter
                .device(addr)
                .map_err(|e| BluetoothError::ScanFailed(e.to_string()))?;
            let name = device.alias().await.unwrap_or_else(|_| addr.to_string());
            let paired = device.is_paired().await.unwrap_or(false);
            devices.push(Device::new(addr.to_string(), name, paired));
        }

        debug!("BlueZ reported {} devices", devices.len());
        Ok(devices)
    }

    async fn open(&self, device: &Device) -> Result<(), BluetoothError> {
        let addr: Address = device.id.parse().map_err(|_| {
            BluetoothError::ConnectionFailed(format!("invalid address {}", device.id))
        })?;

        let stream = Stream::connect(SocketAddr::new(addr, self.channel))
            .await
            .map_err(|e| connect_error(device, e))?;

        info!(device = %device.id, channel = self.channel, "RFCOMM link established");
        *self.stream.lock().await = Some(stream);
        Ok(())
    }

    async fn close(&self, device: &Device) -> Result<(), BluetoothError> {
        if let Some(mut stream) = self.stream.lock().await.take() {
            if let Err(e) = stream.shutdown().await {
                warn!(device = %device.id, "RFCOMM shutdown failed: {}", e);
            }
        }
        Ok(())
    }

    async fn write(&self, _device: &Device, frame: &[u8]) -> Result<(), BluetoothError> {
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(BluetoothError::NotConnected)?;

        stream
            .write_all(frame)
            .await
            .map_err(|e| BluetoothError::Io(e.to_string()))?;
        stream
            .flush()
            .await
            .map_err(|e| BluetoothError::Io(e.to_string()))?;
        Ok(())
    }
}
