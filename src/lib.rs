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

//! AgriBot controller core.
//!
//! A [`bluetooth::ConnectionManager`] discovers robots, holds the single
//! active connection, forwards operator commands and publishes telemetry.
//! A [`storage::LogStore`] keeps a persistent, date-queryable history of that
//! telemetry and of every command issued. [`state::AppState`] wires the two
//! together.

pub mod bluetooth;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod notice;
pub mod state;
pub mod storage;
