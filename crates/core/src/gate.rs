//! Notification gate: fires at most once per cooldown window per trigger
//! source, and never while snoozed.
//!
//! ```text
//! Idle ──(condition active & enabled)──▶ PendingCheck ──▶ Suppressed ──▶ Idle
//!                                                    └──▶ Fired ──────▶ Idle
//! ```

use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::tracker::WateringState;

/// The two independent alert paths, each with its own cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    /// Moisture reading below its minimum.
    LowMoisture,
    /// Interval estimate says the plant is due.
    WateringDue,
}

impl TriggerSource {
    pub fn cooldown(self) -> Duration {
        match self {
            TriggerSource::LowMoisture => Duration::hours(4),
            TriggerSource::WateringDue => Duration::hours(24),
        }
    }

    fn tag_prefix(self) -> &'static str {
        match self {
            TriggerSource::LowMoisture => "plant_watering_",
            TriggerSource::WateringDue => "plant_due_",
        }
    }

    pub fn tag(self, plant_id: &str) -> String {
        format!("{}{plant_id}", self.tag_prefix())
    }

    /// Which source a notification tag belongs to.
    pub fn from_tag(tag: &str) -> Option<Self> {
        [TriggerSource::LowMoisture, TriggerSource::WateringDue]
            .into_iter()
            .find(|s| tag.starts_with(s.tag_prefix()))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TriggerSource::LowMoisture => "low_moisture",
            TriggerSource::WateringDue => "watering_due",
        }
    }

    fn last_notified(self, state: &WateringState) -> Option<OffsetDateTime> {
        match self {
            TriggerSource::LowMoisture => state.last_notified,
            TriggerSource::WateringDue => state.last_due_notified,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Idle,
    PendingCheck,
    Suppressed,
    Fired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    Snoozed { until: OffsetDateTime },
    Cooldown { until: OffsetDateTime },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Idle,
    Suppressed(SuppressReason),
    Fire,
}

#[derive(Debug, Clone, Copy)]
pub struct NotificationGate {
    source: TriggerSource,
    state: GateState,
}

impl NotificationGate {
    pub fn new(source: TriggerSource) -> Self {
        Self {
            source,
            state: GateState::Idle,
        }
    }

    pub fn source(&self) -> TriggerSource {
        self.source
    }

    /// Where the last pass ended.
    pub fn state(&self) -> GateState {
        self.state
    }

    /// One pass of the state machine. Nothing is recorded here; call
    /// [`record`](Self::record) once the notification has been handed off.
    pub fn decide(
        &mut self,
        now: OffsetDateTime,
        active: bool,
        enabled: bool,
        watering: &WateringState,
    ) -> GateDecision {
        if !active || !enabled {
            self.state = GateState::Idle;
            return GateDecision::Idle;
        }
        self.state = GateState::PendingCheck;

        if let Some(until) = watering.snooze_until.filter(|until| *until > now) {
            self.state = GateState::Suppressed;
            return GateDecision::Suppressed(SuppressReason::Snoozed { until });
        }

        if let Some(last) = self.source.last_notified(watering) {
            let until = last.checked_add(self.source.cooldown()).unwrap_or(last);
            if now < until {
                self.state = GateState::Suppressed;
                return GateDecision::Suppressed(SuppressReason::Cooldown { until });
            }
        }

        self.state = GateState::Fired;
        GateDecision::Fire
    }

    /// Stamp the firing time, whether or not delivery succeeded.
    pub fn record(&self, watering: &mut WateringState, now: OffsetDateTime) {
        match self.source {
            TriggerSource::LowMoisture => watering.last_notified = Some(now),
            TriggerSource::WateringDue => watering.last_due_notified = Some(now),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
