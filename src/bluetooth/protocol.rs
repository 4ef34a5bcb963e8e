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

//! Robot command vocabulary and its wire encoding.
//!
//! Each command travels as a single ASCII byte. The codes are the contract
//! with the robot firmware and must not change.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operator commands understood by the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RobotCommand {
    #[serde(rename = "P")]
    Plough,
    #[serde(rename = "S")]
    Seed,
    #[serde(rename = "I")]
    Irrigate,
    #[serde(rename = "X")]
    StopAll,
}

impl RobotCommand {
    pub const ALL: [RobotCommand; 4] = [Self::Plough, Self::Seed, Self::Irrigate, Self::StopAll];

    /// Wire code.
    pub fn code(&self) -> char {
        match self {
            Self::Plough => 'P',
            Self::Seed => 'S',
            Self::Irrigate => 'I',
            Self::StopAll => 'X',
        }
    }

    /// Parse a wire code. Case-sensitive.
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'P' => Some(Self::Plough),
            'S' => Some(Self::Seed),
            'I' => Some(Self::Irrigate),
            'X' => Some(Self::StopAll),
            _ => None,
        }
    }

    /// Operation label stored with logged commands.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Plough => "Ploughing",
            Self::Seed => "Seeding",
            Self::Irrigate => "Irrigation",
            Self::StopAll => "Stop All",
        }
    }

    /// Frame written to the transport.
    pub fn to_frame(&self) -> [u8; 1] {
        [self.code() as u8]
    }

    /// Decode a frame produced by [`RobotCommand::to_frame`].
    pub fn from_frame(frame: &[u8]) -> Option<Self> {
        match frame {
            [byte] => Self::from_code(*byte as char),
            _ => None,
        }
    }
}

impl fmt::Display for RobotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes() {
        let codes: String = RobotCommand::ALL.iter().map(|c| c.code()).collect();
        assert_eq!(codes, "PSIX");
        assert_eq!(RobotCommand::Seed.to_frame(), [b'S']);
        assert_eq!(RobotCommand::StopAll.to_frame(), [0x58]);
    }

    #[test]
    fn test_parse_codes() {
        assert_eq!(RobotCommand::from_code('I'), Some(RobotCommand::Irrigate));
        assert_eq!(RobotCommand::from_code('p'), None);
        assert_eq!(RobotCommand::from_code('Z'), None);
        assert_eq!(RobotCommand::from_frame(b"P"), Some(RobotCommand::Plough));
        assert_eq!(RobotCommand::from_frame(b"PS"), None);
        assert_eq!(RobotCommand::from_frame(b""), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(RobotCommand::Plough.label(), "Ploughing");
        assert_eq!(RobotCommand::Seed.label(), "Seeding");
        assert_eq!(RobotCommand::Irrigate.label(), "Irrigation");
        assert_eq!(RobotCommand::StopAll.to_string(), "Stop All");
    }

    #[test]
    fn test_serde_uses_codes() {
        let json = serde_json::to_string(&RobotCommand::Irrigate).unwrap();
        assert_eq!(json, "\"I\"");
        let parsed: RobotCommand = serde_json::from_str("\"X\"").unwrap();
        assert_eq!(parsed, RobotCommand::StopAll);
    }
}
