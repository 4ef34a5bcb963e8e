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

//! Error types for the connection manager and the log store.

use thiserror::Error;

/// Failures reported by the connection manager and its transports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BluetoothError {
    /// The id was not part of the last scan result.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// The operation needs an active session.
    #[error("no device connected")]
    NotConnected,

    /// A session with another device is already active.
    #[error("already connected to {0}")]
    AlreadyConnected(String),

    /// Connection to an untrusted device while trusted-only mode is on.
    #[error("device {0} is not trusted")]
    UntrustedDevice(String),

    #[error("scan failed: {0}")]
    ScanFailed(String),

    #[error("connection to {0} timed out")]
    ConnectionTimeout(String),

    #[error("connection refused by {0}")]
    ConnectionRefused(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// No acknowledgement from the transport within the response timeout.
    #[error("command '{0}' timed out")]
    CommandTimeout(char),

    /// Transient transport I/O failure.
    #[error("transport i/o error: {0}")]
    Io(String),

    #[error("command failed: {0}")]
    CommandFailed(String),
}

impl BluetoothError {
    /// Whether retrying the same write may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::CommandTimeout(_))
    }
}

/// Persistence failures of the key-value layer and the log codec.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed log data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unsupported log format version {0}")]
    UnsupportedVersion(u32),

    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BluetoothError::Io("reset".into()).is_transient());
        assert!(BluetoothError::CommandTimeout('P').is_transient());
        assert!(!BluetoothError::NotConnected.is_transient());
        assert!(!BluetoothError::CommandFailed("gone".into()).is_transient());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            BluetoothError::DeviceNotFound("AA:BB".into()).to_string(),
            "device not found: AA:BB"
        );
        assert_eq!(
            StorageError::UnsupportedVersion(7).to_string(),
            "unsupported log format version 7"
        );
    }
}
