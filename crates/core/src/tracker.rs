//! Watering state: the timestamps that survive restarts and the re-evaluation
//! that turns them into a due/not-due decision.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use crate::health::ThresholdPair;
use crate::interval::{
    shift_days, shift_seconds, IntervalContext, IntervalStrategy, StrategyKind,
    DEFAULT_BASE_INTERVAL_DAYS,
};
use crate::modifiers::MAX_INTERVAL_DAYS;
use crate::weather::WeatherAttributes;

/// Interval assumed for a postponement when none has been estimated yet.
const FALLBACK_INTERVAL_DAYS: f64 = 1.0;

/// Restorable snapshot of one plant's watering state. Timestamps are RFC 3339
/// and absent when never set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WateringState {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_watered: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub snooze_until: Option<OffsetDateTime>,
    /// Last low-moisture notification.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_notified: Option<OffsetDateTime>,
    /// Last watering-due notification.
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_due_notified: Option<OffsetDateTime>,
}

impl WateringState {
    pub fn is_snoozed(&self, now: OffsetDateTime) -> bool {
        self.snooze_until.is_some_and(|until| until > now)
    }
}

/// Environmental inputs of one re-evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Conditions<'a> {
    pub moisture: Option<f64>,
    pub moisture_thresholds: Option<ThresholdPair>,
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub dli: Option<f64>,
    pub is_outside: bool,
    pub weather: Option<&'a WeatherAttributes>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WateringStatus {
    pub strategy: StrategyKind,
    #[serde(with = "time::serde::rfc3339::option")]
    pub next_watering: Option<OffsetDateTime>,
    pub interval_days: f64,
    pub days_remaining: Option<f64>,
    pub hours_until: Option<f64>,
    pub due: bool,
    pub explanation: String,
}

/// Owns a plant's [`WateringState`] and its interval strategy.
pub struct WateringTracker {
    state: WateringState,
    base_interval_days: f64,
    strategy: Box<dyn IntervalStrategy>,
    last_interval_days: Option<f64>,
}

impl WateringTracker {
    pub fn new(base_interval_days: Option<f64>, strategy: StrategyKind) -> Self {
        Self {
            state: WateringState::default(),
            base_interval_days: base_interval_days.unwrap_or(DEFAULT_BASE_INTERVAL_DAYS),
            strategy: strategy.build(),
            last_interval_days: None,
        }
    }

    pub fn state(&self) -> &WateringState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut WateringState {
        &mut self.state
    }

    pub fn base_interval_days(&self) -> f64 {
        self.base_interval_days
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn snapshot(&self) -> WateringState {
        self.state.clone()
    }

    pub fn restore(&mut self, snapshot: WateringState) {
        self.state = snapshot;
    }

    pub fn mark_watered(&mut self, now: OffsetDateTime) {
        self.state.last_watered = Some(now);
        self.state.snooze_until = None;
        info!(at = %now, "marked as watered");
    }

    /// Silence notifications for `hours` without touching the schedule.
    pub fn snooze(&mut self, now: OffsetDateTime, hours: f64) {
        let until = shift_seconds(now, hours * 3600.0);
        self.state.snooze_until = Some(until);
        info!(%until, "snoozed");
    }

    /// Shift the schedule so the next watering falls `hours` from now. The
    /// last watering is rewound by the most recent interval estimate.
    pub fn postpone(&mut self, now: OffsetDateTime, hours: f64) {
        let interval_days = self
            .last_interval_days
            .map_or(FALLBACK_INTERVAL_DAYS, |d| d.min(MAX_INTERVAL_DAYS));
        let next = shift_seconds(now, hours * 3600.0);
        self.state.last_watered = Some(shift_days(next, -interval_days));
        self.state.snooze_until = Some(next);
        info!(next_watering = %next, "watering postponed");
    }

    /// Recompute the next watering and whether it is due. Without a recorded
    /// watering nothing is ever due.
    pub fn reevaluate(
        &mut self,
        now: OffsetDateTime,
        conditions: &Conditions<'_>,
    ) -> WateringStatus {
        let ctx = IntervalContext {
            now,
            last_watered: self.state.last_watered,
            base_interval_days: Some(self.base_interval_days),
            moisture: conditions.moisture,
            moisture_thresholds: conditions.moisture_thresholds,
            temperature_c: conditions.temperature_c,
            humidity_pct: conditions.humidity_pct,
            dli: conditions.dli,
            is_outside: conditions.is_outside,
            weather: conditions.weather,
        };
        let estimate = self.strategy.estimate(&ctx);
        self.last_interval_days = Some(estimate.interval_days);

        let due = self.state.last_watered.is_some()
            && estimate.next_watering.is_some_and(|next| next <= now);

        WateringStatus {
            strategy: self.strategy.kind(),
            next_watering: estimate.next_watering,
            interval_days: estimate.interval_days,
            days_remaining: estimate.days_remaining,
            hours_until: estimate.days_remaining.map(|d| (d * 24.0).max(0.0)),
            due,
            explanation: estimate.explanation,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
