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

//! Telemetry samples and the simulated sensor feed.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Upper bound for both percentages.
pub const PERCENT_MAX: f64 = 100.0;

fn clamp_percent(value: f64) -> f64 {
    value.clamp(0.0, PERCENT_MAX)
}

/// One soil-moisture / battery reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    pub soil_moisture: f64,
    pub battery_level: f64,
    pub timestamp: DateTime<Utc>,
}

impl TelemetrySample {
    /// Build a sample, clamping both percentages into [0, 100].
    pub fn new(soil_moisture: f64, battery_level: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            soil_moisture: clamp_percent(soil_moisture),
            battery_level: clamp_percent(battery_level),
            timestamp,
        }
    }

    pub fn battery_band(&self) -> BatteryBand {
        BatteryBand::classify(self.battery_level)
    }

    pub fn moisture_band(&self) -> MoistureBand {
        MoistureBand::classify(self.soil_moisture)
    }
}

/// Battery charge bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryBand {
    Critical,
    Low,
    Good,
}

impl BatteryBand {
    pub fn classify(level: f64) -> Self {
        if level <= 20.0 {
            Self::Critical
        } else if level <= 50.0 {
            Self::Low
        } else {
            Self::Good
        }
    }
}

/// Soil moisture bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoistureBand {
    Dry,
    Optimal,
    Saturated,
}

impl MoistureBand {
    pub fn classify(level: f64) -> Self {
        if level <= 30.0 {
            Self::Dry
        } else if level >= 70.0 {
            Self::Saturated
        } else {
            Self::Optimal
        }
    }
}

/// Random-walk sensor model used while no real robot is attached.
///
/// Moisture wanders by up to two points per step in either direction; the
/// battery drains by less than 0.2 points per step.
pub struct TelemetrySimulator<R: Rng = StdRng> {
    soil_moisture: f64,
    battery_level: f64,
    rng: R,
}

impl TelemetrySimulator<StdRng> {
    /// Start from a random baseline using an entropy-seeded generator.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Reproducible simulator.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for TelemetrySimulator<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> TelemetrySimulator<R> {
    /// Moisture starts in 40..70, battery in 70..100.
    pub fn with_rng(mut rng: R) -> Self {
        let soil_moisture = f64::from(rng.gen_range(40u32..70));
        let battery_level = f64::from(rng.gen_range(70u32..100));
        Self {
            soil_moisture,
            battery_level,
            rng,
        }
    }

    /// Start from explicit levels.
    pub fn with_levels(rng: R, soil_moisture: f64, battery_level: f64) -> Self {
        Self {
            soil_moisture: clamp_percent(soil_moisture),
            battery_level: clamp_percent(battery_level),
            rng,
        }
    }

    /// Current reading without advancing the model.
    pub fn current(&self, at: DateTime<Utc>) -> TelemetrySample {
        TelemetrySample::new(self.soil_moisture, self.battery_level, at)
    }

    /// Advance the model by one tick and return the new reading.
    pub fn step(&mut self, at: DateTime<Utc>) -> TelemetrySample {
        let direction = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        let delta = f64::from(self.rng.gen_range(0u32..=2));
        self.soil_moisture = clamp_percent(self.soil_moisture + direction * delta);

        let drain = self.rng.gen_range(0.0..0.2);
        self.battery_level = clamp_percent(self.battery_level - drain);

        self.current(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_is_clamped() {
        let now = Utc::now();
        let sample = TelemetrySample::new(140.0, -3.0, now);
        assert_eq!(sample.soil_moisture, 100.0);
        assert_eq!(sample.battery_level, 0.0);
    }

    #[test]
    fn test_baseline_ranges() {
        for seed in 0..50 {
            let sim = TelemetrySimulator::seeded(seed);
            let sample = sim.current(Utc::now());
            assert!((40.0..70.0).contains(&sample.soil_moisture));
            assert!((70.0..100.0).contains(&sample.battery_level));
        }
    }

    #[test]
    fn test_steps_stay_in_bounds() {
        let now = Utc::now();
        for (soil, battery) in [(0.0, 0.1), (100.0, 100.0), (1.0, 50.0)] {
            let mut sim = TelemetrySimulator::with_levels(StdRng::seed_from_u64(7), soil, battery);
            let mut previous = sim.current(now);
            for _ in 0..2_000 {
                let sample = sim.step(now);
                assert!((0.0..=PERCENT_MAX).contains(&sample.soil_moisture));
                assert!((0.0..=PERCENT_MAX).contains(&sample.battery_level));
                assert!((sample.soil_moisture - previous.soil_moisture).abs() <= 2.0);
                assert!(sample.battery_level <= previous.battery_level);
                previous = sample;
            }
        }
    }

    #[test]
    fn test_bands() {
        assert_eq!(BatteryBand::classify(20.0), BatteryBand::Critical);
        assert_eq!(BatteryBand::classify(20.5), BatteryBand::Low);
        assert_eq!(BatteryBand::classify(50.0), BatteryBand::Low);
        assert_eq!(BatteryBand::classify(80.0), BatteryBand::Good);

        assert_eq!(MoistureBand::classify(30.0), MoistureBand::Dry);
        assert_eq!(MoistureBand::classify(45.0), MoistureBand::Optimal);
        assert_eq!(MoistureBand::classify(70.0), MoistureBand::Saturated);

        let sample = TelemetrySample::new(75.0, 15.0, Utc::now());
        assert_eq!(sample.moisture_band(), MoistureBand::Saturated);
        assert_eq!(sample.battery_band(), BatteryBand::Critical);
    }
}
