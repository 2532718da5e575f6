//! Stateful simulator for one potted plant's sensor set.
//!
//! Models:
//! - Soil moisture drying out as a random walk with evaporation drift
//! - A watering jump once the soil gets dry enough (someone notices)
//! - Diurnal temperature, humidity and light curves
//! - Conductivity falling right after watering and creeping back up
//! - Occasional "unavailable" reports (flaky radio)

use std::fmt;

use serde::Serialize;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Gaussian approximation (no extra dependency)
// ---------------------------------------------------------------------------

/// Approximate a sample from N(0,1) using the Irwin-Hall method:
/// sum of 12 uniform [0,1) values minus 6.
fn approx_std_normal() -> f64 {
    let mut sum: f64 = 0.0;
    for _ in 0..12 {
        sum += fastrand::f64();
    }
    sum - 6.0
}

fn gaussian(mean: f64, sigma: f64) -> f64 {
    mean + sigma * approx_std_normal()
}

// ---------------------------------------------------------------------------
// Scenario presets
// ---------------------------------------------------------------------------

/// Pre-configured simulation profiles selectable via `SIM_SCENARIO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Starts mid-range and dries steadily until watered. Exercises the
    /// low-moisture alert and the due alert.
    Drying,
    /// Hovers in the comfortable band with little noise. No alerts expected.
    Stable,
    /// Noisy readings and ~10% unavailable reports.
    Flaky,
    /// Starts soaked and dries very slowly.
    Wet,
}

impl Scenario {
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "stable" => Self::Stable,
            "flaky" => Self::Flaky,
            "wet" => Self::Wet,
            _ => Self::Drying,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drying => write!(f, "drying"),
            Self::Stable => write!(f, "stable"),
            Self::Flaky => write!(f, "flaky"),
            Self::Wet => write!(f, "wet"),
        }
    }
}

// ---------------------------------------------------------------------------
// Samples
// ---------------------------------------------------------------------------

/// One simulated sensor report, shaped like the hub's `sensor/<id>/state`
/// payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSample {
    #[serde(skip)]
    pub suffix: &'static str,
    pub state: Value,
    pub unit: &'static str,
}

impl SensorSample {
    fn value(suffix: &'static str, v: f64, unit: &'static str) -> Self {
        // One decimal is plenty and keeps the hub's change detection useful.
        let rounded = (v * 10.0).round() / 10.0;
        Self {
            suffix,
            state: serde_json::json!(rounded),
            unit,
        }
    }

    fn unavailable(suffix: &'static str, unit: &'static str) -> Self {
        Self {
            suffix,
            state: Value::String("unavailable".to_string()),
            unit,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.state.as_f64()
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Moisture (%) at which the simulated owner waters the pot.
const REFILL_BELOW: f64 = 12.0;
/// Moisture (%) right after watering.
const REFILL_TO: f64 = 70.0;
/// Lux at solar noon on a clear day, indoors by a window.
const PEAK_LUX: f64 = 12_000.0;

pub struct PlantSim {
    moisture: f64,
    conductivity: f64,

    drift_per_sample: f64,
    walk_sigma: f64,
    noise_sigma: f64,
    unavailable_prob: f32,
    auto_water: bool,
    stable_center: Option<f64>,

    waterings: u32,
}

impl PlantSim {
    pub fn new(scenario: Scenario) -> Self {
        // (start %, drift %/sample, walk sigma, noise sigma, unavailable prob)
        let (start, drift, walk_sigma, noise_sigma, unavailable_prob) = match scenario {
            Scenario::Drying => (45.0, 0.4, 0.3, 0.5, 0.0_f32),
            Scenario::Stable => (40.0, 0.05, 0.1, 0.2, 0.0),
            Scenario::Flaky => (40.0, 0.3, 0.8, 2.5, 0.10),
            Scenario::Wet => (85.0, 0.05, 0.2, 0.4, 0.0),
        };

        Self {
            moisture: start + gaussian(0.0, 1.0),
            conductivity: 900.0,
            drift_per_sample: drift,
            walk_sigma,
            noise_sigma,
            unavailable_prob,
            auto_water: scenario != Scenario::Wet,
            stable_center: (scenario == Scenario::Stable).then_some(start),
            waterings: 0,
        }
    }

    pub fn waterings(&self) -> u32 {
        self.waterings
    }

    /// Produce the next report for every sensor.
    ///
    /// `day_fraction` is the time of day in [0, 1), 0 being midnight. The
    /// light and temperature curves peak at 0.5.
    pub fn sample(&mut self, day_fraction: f64) -> Vec<SensorSample> {
        self.step_soil();

        let sun = (std::f64::consts::PI * (2.0 * day_fraction - 0.5)).sin().max(0.0);
        let daily = (2.0 * std::f64::consts::PI * (day_fraction - 0.25)).sin();

        let temperature = 21.0 + 3.5 * daily + gaussian(0.0, 0.2);
        let humidity = (55.0 - 10.0 * daily + gaussian(0.0, 1.0)).clamp(5.0, 100.0);
        let lux = (PEAK_LUX * sun + gaussian(0.0, 50.0) * sun).max(0.0);
        let moisture = (self.moisture + gaussian(0.0, self.noise_sigma)).clamp(0.0, 100.0);
        let conductivity = (self.conductivity + gaussian(0.0, 15.0)).max(0.0);

        vec![
            self.maybe_drop(SensorSample::value("moisture", moisture, "%")),
            self.maybe_drop(SensorSample::value("temperature", temperature, "°C")),
            self.maybe_drop(SensorSample::value("humidity", humidity, "%")),
            self.maybe_drop(SensorSample::value("conductivity", conductivity, "µS/cm")),
            self.maybe_drop(SensorSample::value("illuminance", lux, "lx")),
        ]
    }

    fn step_soil(&mut self) {
        let pull = match self.stable_center {
            Some(center) => 0.1 * (center - self.moisture),
            None => 0.0,
        };
        let walk = gaussian(0.0, self.walk_sigma);
        self.moisture = (self.moisture - self.drift_per_sample + pull + walk).clamp(0.0, 100.0);

        if self.auto_water && self.moisture < REFILL_BELOW {
            self.moisture = REFILL_TO;
            self.conductivity = 450.0;
            self.waterings += 1;
        } else {
            // Salts concentrate again as the pot dries.
            self.conductivity = (self.conductivity + 2.0).min(1800.0);
        }
    }

    fn maybe_drop(&self, sample: SensorSample) -> SensorSample {
        if self.unavailable_prob > 0.0 && fastrand::f32() < self.unavailable_prob {
            SensorSample::unavailable(sample.suffix, sample.unit)
        } else {
            sample
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
