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

//! Connection manager: discovery, the single session, commands and telemetry.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use super::device::{Device, Session};
use super::protocol::RobotCommand;
use super::telemetry::{TelemetrySample, TelemetrySimulator};
use super::transport::{RobotTransport, SimulatedTransport};
use crate::clock::{Clock, SystemClock};
use crate::config::BluetoothConfig;
use crate::error::BluetoothError;
use crate::events::{Broadcaster, Subscription};

struct TelemetryTask {
    session_id: Uuid,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Inner {
    /// Result of the last scan.
    devices: Vec<Device>,
    session: Option<Session>,
    telemetry: Option<TelemetryTask>,
}

fn set_connected_flag(devices: &mut [Device], device_id: &str, connected: bool) {
    for device in devices.iter_mut().filter(|d| d.id == device_id) {
        device.is_connected = connected;
    }
}

/// Owns the device list, the active session and the telemetry feed.
///
/// All state changes go through the async operations below; listeners learn
/// about them through the connection and telemetry channels.
pub struct ConnectionManager {
    transport: Arc<dyn RobotTransport>,
    clock: Arc<dyn Clock>,
    config: BluetoothConfig,
    inner: Mutex<Inner>,
    /// Serialises connect and disconnect.
    lifecycle: tokio::sync::Mutex<()>,
    connection_events: Broadcaster<bool>,
    telemetry_events: Broadcaster<TelemetrySample>,
}

impl ConnectionManager {
    pub fn new(
        transport: Arc<dyn RobotTransport>,
        clock: Arc<dyn Clock>,
        config: BluetoothConfig,
    ) -> Self {
        info!(transport = transport.name(), "Connection manager created");
        Self {
            transport,
            clock,
            config,
            inner: Mutex::new(Inner::default()),
            lifecycle: tokio::sync::Mutex::new(()),
            connection_events: Broadcaster::new("connection"),
            telemetry_events: Broadcaster::new("telemetry"),
        }
    }

    /// Manager over the simulated transport and the system clock.
    pub fn simulated(config: BluetoothConfig) -> Self {
        let transport = Arc::new(SimulatedTransport::from_config(&config));
        Self::new(transport, Arc::new(SystemClock), config)
    }

    /// Replace the known devices with a fresh discovery result.
    pub async fn scan(&self) -> Result<Vec<Device>, BluetoothError> {
        info!("Scanning for Bluetooth devices...");

        let mut devices = self.transport.discover().await.map_err(|e| {
            error!("Scan failed: {}", e);
            match e {
                BluetoothError::ScanFailed(_) => e,
                other => BluetoothError::ScanFailed(other.to_string()),
            }
        })?;

        let mut inner = self.inner.lock();
        if let Some(active_id) = inner.session.as_ref().map(|s| s.device.id.clone()) {
            set_connected_flag(&mut devices, &active_id, true);
        }
        inner.devices = devices.clone();

        info!("Scan found {} devices", devices.len());
        Ok(devices)
    }

    /// Connect to a device from the last scan.
    ///
    /// Connecting to the device that is already connected is a no-op.
    /// Connecting to a different one while a session is active fails with
    /// [`BluetoothError::AlreadyConnected`].
    pub async fn connect(&self, device_id: &str) -> Result<Device, BluetoothError> {
        let _lifecycle = self.lifecycle.lock().await;

        let device = {
            let inner = self.inner.lock();
            let device = inner
                .devices
                .iter()
                .find(|d| d.id == device_id)
                .cloned()
                .ok_or_else(|| {
                    error!("Device not found: {}", device_id);
                    BluetoothError::DeviceNotFound(device_id.to_string())
                })?;

            if let Some(session) = &inner.session {
                if session.device.id == device_id {
                    info!("Device {} already connected", device_id);
                    return Ok(session.device.clone());
                }
                warn!(
                    active = %session.device.id,
                    requested = device_id,
                    "Refusing second connection"
                );
                return Err(BluetoothError::AlreadyConnected(session.device.id.clone()));
            }
            device
        };

        if !device.is_trusted {
            if self.config.trusted_only {
                warn!("Refusing untrusted device {} ({})", device.name, device.id);
                return Err(BluetoothError::UntrustedDevice(device.id));
            }
            warn!("Connecting to untrusted device {} ({})", device.name, device.id);
        }

        info!("Connecting to device: {} ({})", device.name, device.id);
        let opened = match self.config.connect_timeout() {
            Some(limit) => tokio::time::timeout(limit, self.transport.open(&device))
                .await
                .unwrap_or_else(|_| Err(BluetoothError::ConnectionTimeout(device.id.clone()))),
            None => self.transport.open(&device).await,
        };
        if let Err(e) = opened {
            error!("Connection to {} failed: {}", device.id, e);
            return Err(e);
        }

        let mut connected = device;
        connected.is_connected = true;
        let session = Session::new(connected.clone(), self.clock.now());
        let session_id = session.id;

        let replaced = {
            let mut inner = self.inner.lock();
            set_connected_flag(&mut inner.devices, &connected.id, true);
            inner.session = Some(session);
            inner.telemetry.replace(TelemetryTask {
                session_id,
                handle: self.spawn_telemetry(session_id),
            })
        };
        if let Some(stale) = replaced {
            stale.handle.abort();
        }

        info!(session = %session_id, "Connected to {}", connected.name);
        self.connection_events.emit(&true);
        Ok(connected)
    }

    /// End the active session.
    ///
    /// Once this returns no further telemetry is emitted.
    pub async fn disconnect(&self) -> Result<(), BluetoothError> {
        let _lifecycle = self.lifecycle.lock().await;

        let session = self.inner.lock().session.clone().ok_or_else(|| {
            info!("No device connected");
            BluetoothError::NotConnected
        })?;

        info!("Disconnecting from device: {}", session.device.id);
        if let Err(e) = self.transport.close(&session.device).await {
            warn!("Transport close failed for {}: {}", session.device.id, e);
        }

        self.stop_telemetry().await;

        {
            let mut inner = self.inner.lock();
            inner.session = None;
            set_connected_flag(&mut inner.devices, &session.device.id, false);
        }

        info!(session = %session.id, "Disconnected");
        self.connection_events.emit(&false);
        Ok(())
    }

    /// Send a command to the connected robot.
    ///
    /// Transient failures are retried `command_retries` times.
    pub async fn send_command(&self, command: RobotCommand) -> Result<(), BluetoothError> {
        let device = self
            .inner
            .lock()
            .session
            .as_ref()
            .map(|s| s.device.clone())
            .ok_or_else(|| {
                error!("No device connected");
                BluetoothError::NotConnected
            })?;

        info!(
            "Sending command: {} to device: {}",
            command.code(),
            device.name
        );

        let frame = command.to_frame();
        let attempts = self.config.command_retries.saturating_add(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match self.config.command_timeout() {
                Some(limit) => tokio::time::timeout(limit, self.transport.write(&device, &frame))
                    .await
                    .unwrap_or(Err(BluetoothError::CommandTimeout(command.code()))),
                None => self.transport.write(&device, &frame).await,
            };

            match result {
                Ok(()) => {
                    debug!(attempt, "Command {} acknowledged", command.code());
                    return Ok(());
                }
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(
                        attempt,
                        "Command {} failed: {}, retrying in {:?}",
                        command.code(),
                        e,
                        self.config.command_retry_delay()
                    );
                    tokio::time::sleep(self.config.command_retry_delay()).await;
                }
                Err(e) if e.is_transient() => {
                    error!("Command {} failed after {} attempts: {}", command.code(), attempts, e);
                    return Err(BluetoothError::CommandFailed(format!(
                        "'{}' after {} attempts: {}",
                        command.code(),
                        attempts,
                        e
                    )));
                }
                Err(e) => {
                    error!("Command {} failed: {}", command.code(), e);
                    return Err(e);
                }
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner
            .lock()
            .session
            .as_ref()
            .map(|s| s.device.is_connected)
            .unwrap_or(false)
    }

    pub fn connected_device(&self) -> Option<Device> {
        self.inner.lock().session.as_ref().map(|s| s.device.clone())
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.lock().session.clone()
    }

    /// Devices from the last scan.
    pub fn devices(&self) -> Vec<Device> {
        self.inner.lock().devices.clone()
    }

    pub fn subscribe_connection<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&bool) + Send + Sync + 'static,
    {
        self.connection_events.subscribe(listener)
    }

    pub fn unsubscribe_connection(&self, subscription: &Subscription) -> bool {
        self.connection_events.unsubscribe(subscription)
    }

    pub fn subscribe_telemetry<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&TelemetrySample) + Send + Sync + 'static,
    {
        self.telemetry_events.subscribe(listener)
    }

    pub fn unsubscribe_telemetry(&self, subscription: &Subscription) -> bool {
        self.telemetry_events.unsubscribe(subscription)
    }

    fn spawn_telemetry(&self, session_id: Uuid) -> JoinHandle<()> {
        let events = self.telemetry_events.clone();
        let clock = self.clock.clone();
        let period = self.config.telemetry_interval();

        tokio::spawn(async move {
            debug!(session = %session_id, ?period, "Telemetry generator started");
            let mut simulator = TelemetrySimulator::new();
            events.emit(&simulator.current(clock.now()));

            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let sample = simulator.step(clock.now());
                trace!(
                    session = %session_id,
                    moisture = sample.soil_moisture,
                    battery = sample.battery_level,
                    "Telemetry tick"
                );
                events.emit(&sample);
            }
        })
    }

    /// Abort the generator and wait until it has actually stopped.
    async fn stop_telemetry(&self) {
        let task = self.inner.lock().telemetry.take();
        if let Some(TelemetryTask { session_id, handle }) = task {
            handle.abort();
            match handle.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => warn!("Telemetry generator ended abnormally: {}", e),
            }
            debug!(session = %session_id, "Telemetry generator stopped");
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(task) = self.inner.get_mut().telemetry.take() {
            task.handle.abort();
        }
    }
}
