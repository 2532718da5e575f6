//! Threshold evaluation: per-dimension status and the aggregate health state.
//!
//! ```text
//! reading ──▶ evaluate(dimension, thresholds, trigger) ──▶ Status
//!                                                        └─▶ HealthAggregator ──▶ HealthState
//! ```
//!
//! Illuminance and the light dose never report `low`: dark nights would
//! otherwise flag every plant.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Moisture,
    Temperature,
    Conductivity,
    Illuminance,
    Humidity,
    Dli,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Moisture,
        Dimension::Temperature,
        Dimension::Conductivity,
        Dimension::Illuminance,
        Dimension::Humidity,
        Dimension::Dli,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Moisture => "moisture",
            Dimension::Temperature => "temperature",
            Dimension::Conductivity => "conductivity",
            Dimension::Illuminance => "illuminance",
            Dimension::Humidity => "humidity",
            Dimension::Dli => "dli",
        }
    }

    /// Whether readings below the minimum are alarmed at all.
    pub fn alarms_low(self) -> bool {
        !matches!(self, Dimension::Illuminance | Dimension::Dli)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Low,
    High,
    Unknown,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Low => "low",
            Status::High => "high",
            Status::Unknown => "unknown",
        }
    }

    pub fn is_known(self) -> bool {
        self != Status::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Ok,
    Problem,
    Unknown,
}

impl HealthState {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthState::Ok => "ok",
            HealthState::Problem => "problem",
            HealthState::Unknown => "unknown",
        }
    }
}

/// Bounds for one dimension. Either side may be absent; a pair with neither
/// bound is treated as not configured. Inverted pairs are compared literally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPair {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl ThresholdPair {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn max_only(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    pub fn is_inverted(&self) -> bool {
        matches!((self.min, self.max), (Some(lo), Some(hi)) if lo > hi)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub status: Status,
    pub contributes_to_problem: bool,
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Compare one reading against its thresholds.
///
/// For [`Dimension::Dli`] the value must be the previous period's total; zero
/// or negative totals mean nothing has accumulated yet and yield `Unknown`.
pub fn evaluate(
    dimension: Dimension,
    value: Option<f64>,
    thresholds: &ThresholdPair,
    trigger_enabled: bool,
) -> Evaluation {
    let value = match value {
        Some(v) if dimension == Dimension::Dli && v <= 0.0 => None,
        other => other,
    };

    let Some(v) = value else {
        return Evaluation {
            status: Status::Unknown,
            contributes_to_problem: false,
        };
    };

    let status = match (thresholds.min, thresholds.max) {
        (Some(min), _) if dimension.alarms_low() && v < min => Status::Low,
        (_, Some(max)) if v > max => Status::High,
        _ => Status::Ok,
    };

    Evaluation {
        status,
        contributes_to_problem: status != Status::Ok && trigger_enabled,
    }
}

/// Folds per-dimension evaluations into one health state: `unknown` until a
/// known status arrives, then `ok`, and `problem` as soon as any enabled
/// dimension is out of range. `problem` sticks for the rest of the pass.
#[derive(Debug, Clone, Copy)]
pub struct HealthAggregator {
    state: HealthState,
}

impl Default for HealthAggregator {
    fn default() -> Self {
        Self {
            state: HealthState::Unknown,
        }
    }
}

impl HealthAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, eval: &Evaluation) {
        if eval.contributes_to_problem {
            self.state = HealthState::Problem;
        } else if eval.status.is_known() && self.state == HealthState::Unknown {
            self.state = HealthState::Ok;
        }
    }

    pub fn state(&self) -> HealthState {
        self.state
    }
}

// ---------------------------------------------------------------------------
// Whole-plant assessment
// ---------------------------------------------------------------------------

/// Everything the evaluator needs about one dimension in one pass.
#[derive(Debug, Clone, Copy)]
pub struct DimensionInput {
    pub value: Option<f64>,
    pub thresholds: Option<ThresholdPair>,
    pub trigger_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub statuses: BTreeMap<Dimension, Status>,
    pub health: HealthState,
}

impl HealthReport {
    pub fn status(&self, dimension: Dimension) -> Status {
        self.statuses
            .get(&dimension)
            .copied()
            .unwrap_or(Status::Unknown)
    }
}

/// Evaluate every configured dimension. Dimensions without usable thresholds
/// are skipped entirely rather than failing the pass.
pub fn assess(inputs: impl IntoIterator<Item = (Dimension, DimensionInput)>) -> HealthReport {
    let mut agg = HealthAggregator::new();
    let mut statuses = BTreeMap::new();

    for (dimension, input) in inputs {
        let Some(thresholds) = input.thresholds.filter(ThresholdPair::is_configured) else {
            tracing::debug!(%dimension, "no thresholds configured, skipping dimension");
            continue;
        };
        let eval = evaluate(dimension, input.value, &thresholds, input.trigger_enabled);
        agg.record(&eval);
        statuses.insert(dimension, eval.status);
    }

    HealthReport {
        statuses,
        health: agg.state(),
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> ThresholdPair {
        ThresholdPair::new(20.0, 60.0)
    }

    fn input(value: Option<f64>, thresholds: ThresholdPair, trigger: bool) -> DimensionInput {
        DimensionInput {
            value,
            thresholds: Some(thresholds),
            trigger_enabled: trigger,
        }
    }

    // -- evaluate -----------------------------------------------------------

    #[test]
    fn low_high_ok() {
        let t = pair();
        assert_eq!(evaluate(Dimension::Moisture, Some(15.0), &t, true).status, Status::Low);
        assert_eq!(evaluate(Dimension::Moisture, Some(61.0), &t, true).status, Status::High);
        assert_eq!(evaluate(Dimension::Moisture, Some(20.0), &t, true).status, Status::Ok);
        assert_eq!(evaluate(Dimension::Moisture, Some(60.0), &t, true).status, Status::Ok);
    }

    #[test]
    fn missing_value_is_unknown_and_harmless() {
        let e = evaluate(Dimension::Moisture, None, &pair(), true);
        assert_eq!(e.status, Status::Unknown);
        assert!(!e.contributes_to_problem);
    }

    #[test]
    fn trigger_gates_contribution() {
        let on = evaluate(Dimension::Temperature, Some(5.0), &pair(), true);
        let off = evaluate(Dimension::Temperature, Some(5.0), &pair(), false);
        assert!(on.contributes_to_problem);
        assert!(!off.contributes_to_problem);
        assert_eq!(off.status, Status::Low);
    }

    #[test]
    fn illuminance_never_low() {
        let t = ThresholdPair::new(1000.0, 50_000.0);
        assert_eq!(evaluate(Dimension::Illuminance, Some(0.0), &t, true).status, Status::Ok);
        assert_eq!(
            evaluate(Dimension::Illuminance, Some(60_000.0), &t, true).status,
            Status::High
        );
    }

    #[test]
    fn dli_without_accumulation_is_unknown() {
        let t = ThresholdPair::new(2.0, 12.0);
        assert_eq!(evaluate(Dimension::Dli, Some(0.0), &t, true).status, Status::Unknown);
        assert_eq!(evaluate(Dimension::Dli, Some(-1.0), &t, true).status, Status::Unknown);
        assert_eq!(evaluate(Dimension::Dli, Some(1.0), &t, true).status, Status::Ok);
        assert_eq!(evaluate(Dimension::Dli, Some(13.0), &t, true).status, Status::High);
    }

    #[test]
    fn inverted_pair_compared_literally() {
        let t = ThresholdPair::new(60.0, 20.0);
        assert!(t.is_inverted());
        // below min wins first
        assert_eq!(evaluate(Dimension::Moisture, Some(40.0), &t, true).status, Status::Low);
        assert_eq!(evaluate(Dimension::Moisture, Some(70.0), &t, true).status, Status::High);
    }

    #[test]
    fn single_bound_pairs() {
        let t = ThresholdPair::max_only(30.0);
        assert_eq!(evaluate(Dimension::Temperature, Some(-10.0), &t, true).status, Status::Ok);
        assert_eq!(evaluate(Dimension::Temperature, Some(31.0), &t, true).status, Status::High);
    }

    // -- aggregation --------------------------------------------------------

    #[test]
    fn aggregate_starts_unknown() {
        let report = assess([(Dimension::Moisture, input(None, pair(), true))]);
        assert_eq!(report.health, HealthState::Unknown);
        assert_eq!(report.status(Dimension::Moisture), Status::Unknown);
    }

    #[test]
    fn problem_is_sticky() {
        let report = assess([
            (Dimension::Moisture, input(Some(10.0), pair(), true)),
            (Dimension::Temperature, input(Some(22.0), pair(), true)),
        ]);
        assert_eq!(report.health, HealthState::Problem);
    }

    #[test]
    fn disabled_trigger_keeps_ok() {
        let report = assess([
            (Dimension::Moisture, input(Some(10.0), pair(), false)),
            (Dimension::Temperature, input(Some(22.0), pair(), true)),
        ]);
        assert_eq!(report.health, HealthState::Ok);
        assert_eq!(report.status(Dimension::Moisture), Status::Low);
    }

    #[test]
    fn unconfigured_dimension_skipped() {
        let report = assess([
            (
                Dimension::Conductivity,
                DimensionInput {
                    value: Some(5000.0),
                    thresholds: None,
                    trigger_enabled: true,
                },
            ),
            (
                Dimension::Humidity,
                DimensionInput {
                    value: Some(50.0),
                    thresholds: Some(ThresholdPair::default()),
                    trigger_enabled: true,
                },
            ),
        ]);
        assert!(report.statuses.is_empty());
        assert_eq!(report.health, HealthState::Unknown);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Status::High).unwrap(), r#""high""#);
        assert_eq!(
            serde_json::to_string(&HealthState::Problem).unwrap(),
            r#""problem""#
        );
    }
}
