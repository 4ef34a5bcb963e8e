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

//! AgriBot Controller
//!
//! Headless runner: connects to a robot and records its telemetry until
//! interrupted.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agribot_controller::bluetooth::{self, ConnectionManager, Device};
use agribot_controller::clock::SystemClock;
use agribot_controller::config::Config;
use agribot_controller::notice::{Notice, Severity};
use agribot_controller::state::AppState;
use agribot_controller::storage::{FileStore, LogStore};

fn report(notice: &Notice) {
    match notice.severity {
        Severity::Info => info!("{}: {}", notice.title, notice.description),
        Severity::Destructive => warn!("{}: {}", notice.title, notice.description),
    }
}

/// The configured auto-connect device, else the first trusted one.
fn pick_device<'a>(config: &Config, devices: &'a [Device]) -> Option<&'a Device> {
    match &config.bluetooth.auto_connect {
        Some(id) => devices.iter().find(|d| &d.id == id),
        None => devices.iter().find(|d| d.is_trusted),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("agribot_controller=info".parse()?),
        )
        .init();

    info!("Starting AgriBot Controller v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load()?;
    info!("Configuration loaded");

    // Initialize storage
    let store = Arc::new(FileStore::new(&config.data_dir).context("Failed to open data directory")?);
    let logs = Arc::new(LogStore::open_with_key(
        store,
        Arc::new(SystemClock),
        config.storage.log_key.clone(),
    ));
    info!("Log storage initialized ({} entries)", logs.len());

    // Initialize Bluetooth
    let transport = bluetooth::create_transport(&config.bluetooth).await?;
    let manager = Arc::new(ConnectionManager::new(
        transport,
        Arc::new(SystemClock),
        config.bluetooth.clone(),
    ));

    let state = AppState::new(manager.clone(), logs.clone(), config.storage.record_telemetry);

    let devices = match manager.scan().await {
        Ok(devices) => devices,
        Err(e) => {
            error!("{}", e);
            report(&Notice::scan_failed());
            return Ok(());
        }
    };

    let Some(device) = pick_device(&config, &devices).cloned() else {
        warn!("No suitable device found");
        return Ok(());
    };

    if !device.is_trusted {
        report(&Notice::untrusted_device());
    }
    match state.connect(&device.id).await {
        Ok(device) => report(&Notice::connected(&device)),
        Err(e) => {
            error!("{}", e);
            report(&Notice::for_connect_error(&e));
            return Ok(());
        }
    }

    info!("Ready. Recording telemetry, press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    match state.disconnect().await {
        Ok(()) => report(&Notice::disconnected()),
        Err(e) => error!("Disconnect failed: {}", e),
    }

    info!("AgriBot Controller stopped ({} log entries)", logs.len());
    Ok(())
}
