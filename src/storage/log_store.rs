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

//! Telemetry and command history.
//!
//! The whole log is written to one storage key after every change and read
//! back once on open. Storage failures are logged and otherwise ignored: the
//! in-memory log is what the running application trusts.

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::kv::KeyValueStore;
use crate::bluetooth::{RobotCommand, TelemetrySample};
use crate::clock::Clock;
use crate::config::DEFAULT_LOG_KEY;
use crate::error::StorageError;

/// Current layout of the persisted blob.
pub const LOG_FORMAT_VERSION: u32 = 1;

/// A single history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub soil_moisture: f64,
    pub battery_level: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<RobotCommand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}

impl LogEntry {
    /// Plain telemetry entry stamped at `at`.
    pub fn telemetry(sample: &TelemetrySample, at: DateTime<Utc>) -> Self {
        Self {
            soil_moisture: sample.soil_moisture,
            battery_level: sample.battery_level,
            timestamp: at,
            operation: None,
            operation_name: None,
        }
    }

    /// Telemetry entry tagged with the command that was issued.
    pub fn command(command: RobotCommand, sample: &TelemetrySample, at: DateTime<Utc>) -> Self {
        Self {
            operation: Some(command),
            operation_name: Some(command.label().to_string()),
            ..Self::telemetry(sample, at)
        }
    }
}

#[derive(Serialize)]
struct LogFileRef<'a> {
    version: u32,
    entries: &'a [LogEntry],
}

#[derive(Deserialize)]
struct LogFile {
    entries: Vec<LogEntry>,
}

fn encode(entries: &[LogEntry]) -> Result<String, StorageError> {
    Ok(serde_json::to_string(&LogFileRef {
        version: LOG_FORMAT_VERSION,
        entries,
    })?)
}

/// Accepts the current envelope and the older bare-array layout.
fn decode(blob: &str) -> Result<Vec<LogEntry>, StorageError> {
    let value: Value = serde_json::from_str(blob)?;
    if value.is_array() {
        debug!("Migrating unversioned log layout");
        return Ok(serde_json::from_value(value)?);
    }

    let version = value
        .get("version")
        .and_then(Value::as_u64)
        .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
        .unwrap_or(0);
    if version != LOG_FORMAT_VERSION {
        return Err(StorageError::UnsupportedVersion(version));
    }

    let file: LogFile = serde_json::from_value(value)?;
    Ok(file.entries)
}

/// Newest first; equal timestamps keep the later insertion first.
fn newest_first<'a>(entries: impl DoubleEndedIterator<Item = &'a LogEntry>) -> Vec<LogEntry> {
    let mut sorted: Vec<LogEntry> = entries.rev().cloned().collect();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    sorted
}

/// Append-only history of telemetry and commands.
pub struct LogStore {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    key: String,
    entries: Mutex<Vec<LogEntry>>,
}

impl LogStore {
    /// Open the log stored under the default key.
    pub fn open(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self::open_with_key(storage, clock, DEFAULT_LOG_KEY)
    }

    /// Open the log stored under `key`. A missing or unreadable blob gives an
    /// empty log.
    pub fn open_with_key(
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        key: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let entries = match Self::load(storage.as_ref(), &key) {
            Ok(entries) => {
                info!("Loaded {} log entries from {}", entries.len(), key);
                entries
            }
            Err(e) => {
                error!("Failed to load logs from storage: {}", e);
                Vec::new()
            }
        };

        Self {
            storage,
            clock,
            key,
            entries: Mutex::new(entries),
        }
    }

    fn load(storage: &dyn KeyValueStore, key: &str) -> Result<Vec<LogEntry>, StorageError> {
        match storage.get(key)? {
            Some(blob) => decode(&blob),
            None => Ok(Vec::new()),
        }
    }

    /// Called with the entries lock held so writes land in mutation order.
    fn persist(&self, entries: &[LogEntry]) {
        let result = encode(entries).and_then(|blob| self.storage.set(&self.key, &blob));
        match result {
            Ok(()) => debug!("Persisted {} log entries", entries.len()),
            Err(e) => error!("Failed to save logs to storage: {}", e),
        }
    }

    fn append(&self, entry: LogEntry) -> LogEntry {
        let mut entries = self.entries.lock();
        entries.push(entry.clone());
        self.persist(&entries);
        entry
    }

    /// Append a copy of `sample` with a fresh timestamp.
    pub fn record_telemetry(&self, sample: &TelemetrySample) -> LogEntry {
        self.append(LogEntry::telemetry(sample, self.clock.now()))
    }

    /// Append a copy of `sample` tagged with `command`, with a fresh timestamp.
    pub fn record_command(&self, command: RobotCommand, sample: &TelemetrySample) -> LogEntry {
        info!("Logging operation: {}", command.label());
        self.append(LogEntry::command(command, sample, self.clock.now()))
    }

    /// Every entry, newest first.
    pub fn list_all(&self) -> Vec<LogEntry> {
        newest_first(self.entries.lock().iter())
    }

    /// Entries with `start <= timestamp <= end`, newest first.
    pub fn query_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<LogEntry> {
        let entries = self.entries.lock();
        newest_first(
            entries
                .iter()
                .filter(|e| e.timestamp >= start && e.timestamp <= end),
        )
    }

    /// Entries of one local calendar day.
    pub fn query_day(&self, day: NaiveDate) -> Vec<LogEntry> {
        self.query_day_in(day, &Local)
    }

    /// Entries from midnight to 23:59:59.999 of `day` in `tz`.
    pub fn query_day_in<Tz: TimeZone>(&self, day: NaiveDate, tz: &Tz) -> Vec<LogEntry> {
        let start = day
            .and_hms_opt(0, 0, 0)
            .and_then(|t| tz.from_local_datetime(&t).earliest());
        let end = day
            .and_hms_milli_opt(23, 59, 59, 999)
            .and_then(|t| tz.from_local_datetime(&t).latest());

        match (start, end) {
            (Some(start), Some(end)) => {
                self.query_range(start.with_timezone(&Utc), end.with_timezone(&Utc))
            }
            _ => {
                warn!("Day {} has no representable bounds in this time zone", day);
                Vec::new()
            }
        }
    }

    /// Mean soil moisture over [`LogStore::query_range`]; 0 for an empty range.
    pub fn average_soil_moisture(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
        let entries = self.query_range(start, end);
        if entries.is_empty() {
            return 0.0;
        }
        let sum: f64 = entries.iter().map(|e| e.soil_moisture).sum();
        sum / entries.len() as f64
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.clear();
        self.persist(&entries);
        info!("Log cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Storage key this log lives under.
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use chrono::{Duration, FixedOffset};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 10, 9, 0, 0).unwrap()
    }

    fn sample(moisture: f64) -> TelemetrySample {
        TelemetrySample::new(moisture, 80.0, start())
    }

    fn open() -> (Arc<MemoryStore>, Arc<ManualClock>, LogStore) {
        let storage = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(start()));
        let store = LogStore::open(storage.clone(), clock.clone());
        (storage, clock, store)
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into())
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "quota exceeded").into())
        }
        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[test]
    fn test_entries_get_fresh_timestamps() {
        let (_, clock, store) = open();
        clock.advance(Duration::minutes(5));

        let entry = store.record_telemetry(&sample(42.0));
        assert_eq!(entry.timestamp, start() + Duration::minutes(5));
        assert_eq!(entry.soil_moisture, 42.0);
        assert_eq!(entry.operation, None);

        let entry = store.record_command(RobotCommand::Irrigate, &sample(43.0));
        assert_eq!(entry.operation, Some(RobotCommand::Irrigate));
        assert_eq!(entry.operation_name.as_deref(), Some("Irrigation"));
    }

    #[test]
    fn test_list_all_newest_first() {
        let (_, clock, store) = open();
        for moisture in [10.0, 20.0, 30.0] {
            store.record_telemetry(&sample(moisture));
            clock.advance(Duration::seconds(1));
        }
        // Same instant as the previous one once the clock is pinned.
        clock.advance(Duration::seconds(-1));
        store.record_telemetry(&sample(31.0));

        let moistures: Vec<f64> = store.list_all().iter().map(|e| e.soil_moisture).collect();
        assert_eq!(moistures, vec![31.0, 30.0, 20.0, 10.0]);
    }

    #[test]
    fn test_query_range_is_inclusive_and_ordered() {
        let (_, clock, store) = open();
        for minute in 0..10 {
            clock.set(start() + Duration::minutes(minute));
            store.record_telemetry(&sample(minute as f64));
        }

        let from = start() + Duration::minutes(3);
        let to = start() + Duration::minutes(6);
        let hits = store.query_range(from, to);

        let moistures: Vec<f64> = hits.iter().map(|e| e.soil_moisture).collect();
        assert_eq!(moistures, vec![6.0, 5.0, 4.0, 3.0]);

        let all = store.list_all();
        assert!(hits.iter().all(|h| all.contains(h)));
        assert_eq!(store.len(), 10);
        assert!(store.query_range(to, from).is_empty());
    }

    #[test]
    fn test_average_soil_moisture() {
        let (_, clock, store) = open();
        let window = (start(), start() + Duration::hours(1));
        assert_eq!(store.average_soil_moisture(window.0, window.1), 0.0);

        for moisture in [40.0, 50.0, 60.0] {
            store.record_telemetry(&sample(moisture));
            clock.advance(Duration::minutes(1));
        }
        assert_eq!(store.average_soil_moisture(window.0, window.1), 50.0);

        let later = start() + Duration::days(1);
        assert_eq!(store.average_soil_moisture(later, later), 0.0);
    }

    #[test]
    fn test_clear_persists_empty_log() {
        let (storage, _, store) = open();
        store.record_telemetry(&sample(55.0));
        store.clear();
        assert!(store.list_all().is_empty());
        assert!(store.is_empty());

        let reopened = LogStore::open(storage, Arc::new(ManualClock::new(start())));
        assert!(reopened.list_all().is_empty());
    }

    #[test]
    fn test_command_survives_reload() {
        let (storage, _, store) = open();
        store.record_command(RobotCommand::Seed, &TelemetrySample::new(47.0, 91.5, start()));

        let reopened = LogStore::open(storage, Arc::new(ManualClock::new(start())));
        let entries = reopened.list_all();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, Some(RobotCommand::Seed));
        assert_eq!(entries[0].operation_name.as_deref(), Some("Seeding"));
        assert_eq!(entries[0].soil_moisture, 47.0);
        assert_eq!(entries[0].battery_level, 91.5);
        assert_eq!(entries[0].timestamp, start());
    }

    #[test]
    fn test_blob_layout() {
        let (storage, _, store) = open();
        store.record_command(RobotCommand::Plough, &sample(40.0));
        store.record_telemetry(&sample(41.0));

        let blob = storage.get(DEFAULT_LOG_KEY).unwrap().unwrap();
        let value: Value = serde_json::from_str(&blob).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["entries"][0]["operation"], "P");
        assert_eq!(value["entries"][0]["operationName"], "Ploughing");
        assert_eq!(value["entries"][0]["soilMoisture"], 40.0);
        assert!(value["entries"][1].get("operation").is_none());
    }

    #[test]
    fn test_legacy_array_is_migrated() {
        let storage = Arc::new(MemoryStore::new());
        storage
            .set(
                DEFAULT_LOG_KEY,
                r#"[{"soilMoisture":52,"batteryLevel":88.4,"timestamp":"2024-06-01T10:15:00.000Z","operation":"X","operationName":"Stop All"},
                    {"soilMoisture":50,"batteryLevel":88.6,"timestamp":"2024-06-01T10:10:00.000Z"}]"#,
            )
            .unwrap();

        let clock = Arc::new(ManualClock::new(start()));
        let store = LogStore::open(storage.clone(), clock);
        let entries = store.list_all();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].operation, Some(RobotCommand::StopAll));
        assert_eq!(
            entries[1].timestamp,
            Utc.with_ymd_and_hms(2024, 6, 1, 10, 10, 0).unwrap()
        );

        store.record_telemetry(&sample(49.0));
        let blob = storage.get(DEFAULT_LOG_KEY).unwrap().unwrap();
        assert!(blob.starts_with("{\"version\":1"));
    }

    #[test]
    fn test_unreadable_blob_fails_open() {
        for blob in ["not json", r#"{"version":9,"entries":[]}"#, r#"{"entries":[]}"#] {
            let storage = Arc::new(MemoryStore::new());
            storage.set(DEFAULT_LOG_KEY, blob).unwrap();

            let store = LogStore::open(storage.clone(), Arc::new(ManualClock::new(start())));
            assert!(store.is_empty());
            assert_eq!(storage.get(DEFAULT_LOG_KEY).unwrap().as_deref(), Some(blob));
        }
    }

    #[test]
    fn test_unsupported_version_error() {
        assert!(matches!(
            decode(r#"{"version":2,"entries":[]}"#),
            Err(StorageError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn test_storage_failures_are_absorbed() {
        let store = LogStore::open(Arc::new(BrokenStore), Arc::new(ManualClock::new(start())));
        store.record_telemetry(&sample(30.0));
        store.record_command(RobotCommand::Plough, &sample(31.0));
        assert_eq!(store.len(), 2);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_custom_key() {
        let storage = Arc::new(MemoryStore::new());
        let store =
            LogStore::open_with_key(storage.clone(), Arc::new(ManualClock::new(start())), "field_b");
        store.record_telemetry(&sample(30.0));

        assert_eq!(store.key(), "field_b");
        assert!(storage.get("field_b").unwrap().is_some());
        assert!(storage.get(DEFAULT_LOG_KEY).unwrap().is_none());
    }

    #[test]
    fn test_query_day_in_zone() {
        let (_, clock, store) = open();
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();

        // 2025-04-10 23:30 at UTC+2 is 21:30 UTC; 2025-04-11 00:30 at UTC+2 is 22:30 UTC.
        clock.set(Utc.with_ymd_and_hms(2025, 4, 10, 21, 30, 0).unwrap());
        store.record_telemetry(&sample(1.0));
        clock.set(Utc.with_ymd_and_hms(2025, 4, 10, 22, 30, 0).unwrap());
        store.record_telemetry(&sample(2.0));

        let day = NaiveDate::from_ymd_opt(2025, 4, 10).unwrap();
        let hits = store.query_day_in(day, &tz);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].soil_moisture, 1.0);

        let next = NaiveDate::from_ymd_opt(2025, 4, 11).unwrap();
        assert_eq!(store.query_day_in(next, &tz)[0].soil_moisture, 2.0);
        assert_eq!(store.query_day_in(day, &Utc).len(), 2);
    }
}
