//! A single monitored plant: its configuration, its watering tracker and the
//! per-pass evaluation that ties readings, thresholds, interval and
//! notifications together.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::gate::{GateDecision, GateState, NotificationGate, SuppressReason, TriggerSource};
use crate::health::{assess, Dimension, DimensionInput, HealthState, Status, ThresholdPair};
use crate::interval::StrategyKind;
use crate::light::{DliAccumulator, DliSnapshot};
use crate::notify::{ActionKind, DeliveryReport, Notification, NotificationAction, Notifier};
use crate::reading::{Reading, ReadingSource, SourceRef};
use crate::tracker::{Conditions, WateringState, WateringStatus, WateringTracker};

pub const DEFAULT_SNOOZE_HOURS: f64 = 1.0;
/// Longest snooze or postponement a user may ask for (30 days).
pub const MAX_SNOOZE_HOURS: f64 = 720.0;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Sensor identifiers per dimension. Any entry may name several sensors,
/// which are averaged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SensorIds {
    pub moisture: Option<SourceRef>,
    pub temperature: Option<SourceRef>,
    pub conductivity: Option<SourceRef>,
    pub illuminance: Option<SourceRef>,
    pub humidity: Option<SourceRef>,
    /// Used when the plant's own temperature sensor has nothing.
    pub room_temperature: Option<SourceRef>,
    pub room_humidity: Option<SourceRef>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WateringConfig {
    pub base_interval_days: Option<f64>,
    pub outside: bool,
    pub weather: Option<String>,
    pub strategy: StrategyKind,
    pub notify_low_moisture: bool,
    pub notify_when_due: bool,
    pub snooze_hours: f64,
}

impl Default for WateringConfig {
    fn default() -> Self {
        Self {
            base_interval_days: None,
            outside: false,
            weather: None,
            strategy: StrategyKind::default(),
            notify_low_moisture: true,
            notify_when_due: true,
            snooze_hours: DEFAULT_SNOOZE_HOURS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlantConfig {
    pub plant_id: String,
    pub name: String,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub sensors: SensorIds,
    #[serde(default)]
    pub thresholds: BTreeMap<Dimension, ThresholdPair>,
    /// Dimensions missing here are enabled.
    #[serde(default)]
    pub triggers: BTreeMap<Dimension, bool>,
    #[serde(default)]
    pub watering: WateringConfig,
    /// Preferred notification channel; all channels when absent.
    #[serde(default)]
    pub notify_channel: Option<String>,
}

impl PlantConfig {
    pub fn new(plant_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            plant_id: plant_id.into(),
            name: name.into(),
            species: None,
            sensors: SensorIds::default(),
            thresholds: BTreeMap::new(),
            triggers: BTreeMap::new(),
            watering: WateringConfig::default(),
            notify_channel: None,
        }
    }

    pub fn trigger_enabled(&self, dimension: Dimension) -> bool {
        self.triggers.get(&dimension).copied().unwrap_or(true)
    }

    fn sensor(&self, dimension: Dimension) -> Option<&SourceRef> {
        match dimension {
            Dimension::Moisture => self.sensors.moisture.as_ref(),
            Dimension::Temperature => self.sensors.temperature.as_ref(),
            Dimension::Conductivity => self.sensors.conductivity.as_ref(),
            Dimension::Illuminance => self.sensors.illuminance.as_ref(),
            Dimension::Humidity => self.sensors.humidity.as_ref(),
            Dimension::Dli => None,
        }
    }

    fn room_sensor(&self, dimension: Dimension) -> Option<&SourceRef> {
        match dimension {
            Dimension::Temperature => self.sensors.room_temperature.as_ref(),
            Dimension::Humidity => self.sensors.room_humidity.as_ref(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Query projection
// ---------------------------------------------------------------------------

/// Read-only view of one plant after an evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlantStatus {
    pub plant_id: String,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub evaluated_at: OffsetDateTime,
    pub health: HealthState,
    pub statuses: BTreeMap<Dimension, Status>,
    pub readings: BTreeMap<Dimension, Option<f64>>,
    pub dli_today: f64,
    pub watering: WateringStatus,
    pub state: WateringState,
}

/// What one gate did during a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub source: TriggerSource,
    pub decision: GateDecision,
    pub delivery: Option<DeliveryReport>,
}

#[derive(Debug, Clone)]
pub struct PassOutcome {
    pub status: PlantStatus,
    pub alerts: Vec<Alert>,
}

impl PassOutcome {
    pub fn fired(&self) -> impl Iterator<Item = &Alert> {
        self.alerts
            .iter()
            .filter(|a| a.decision == GateDecision::Fire)
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// Owns everything mutable about one plant. The caller serialises access.
pub struct PlantMonitor {
    config: PlantConfig,
    tracker: WateringTracker,
    dli: DliAccumulator,
    low_gate: NotificationGate,
    due_gate: NotificationGate,
    last: Option<PlantStatus>,
}

impl PlantMonitor {
    pub fn new(config: PlantConfig) -> Self {
        let tracker = WateringTracker::new(
            config.watering.base_interval_days,
            config.watering.strategy,
        );
        Self {
            config,
            tracker,
            dli: DliAccumulator::new(),
            low_gate: NotificationGate::new(TriggerSource::LowMoisture),
            due_gate: NotificationGate::new(TriggerSource::WateringDue),
            last: None,
        }
    }

    pub fn config(&self) -> &PlantConfig {
        &self.config
    }

    pub fn id(&self) -> &str {
        &self.config.plant_id
    }

    /// Projection of the most recent pass.
    pub fn status(&self) -> Option<&PlantStatus> {
        self.last.as_ref()
    }

    pub fn gate_states(&self) -> (GateState, GateState) {
        (self.low_gate.state(), self.due_gate.state())
    }

    pub fn snapshot(&self) -> WateringState {
        self.tracker.snapshot()
    }

    pub fn restore(&mut self, snapshot: WateringState) {
        self.tracker.restore(snapshot);
    }

    pub fn dli_snapshot(&self) -> Option<DliSnapshot> {
        self.dli.snapshot()
    }

    pub fn restore_dli(&mut self, snapshot: DliSnapshot) {
        self.dli.restore(snapshot);
    }

    pub fn mark_watered(&mut self, now: OffsetDateTime) {
        info!(plant = %self.config.plant_id, "watered");
        self.tracker.mark_watered(now);
    }

    pub fn snooze(&mut self, now: OffsetDateTime, hours: Option<f64>) {
        let hours = hours.unwrap_or(self.config.watering.snooze_hours);
        info!(plant = %self.config.plant_id, hours, "snooze");
        self.tracker.snooze(now, hours);
    }

    /// A user answering a notification. Snoozing a due reminder postpones the
    /// schedule; snoozing anything else just silences notifications.
    pub fn handle_action(
        &mut self,
        now: OffsetDateTime,
        action: ActionKind,
        tag: Option<&str>,
        hours: Option<f64>,
    ) {
        match action {
            ActionKind::Watered => self.mark_watered(now),
            ActionKind::Snooze => match tag.and_then(TriggerSource::from_tag) {
                Some(TriggerSource::WateringDue) => {
                    let hours = hours.unwrap_or(self.config.watering.snooze_hours);
                    info!(plant = %self.config.plant_id, hours, "postponing watering");
                    self.tracker.postpone(now, hours);
                }
                _ => self.snooze(now, hours),
            },
        }
    }

    fn read(&self, source: &dyn ReadingSource, dimension: Dimension) -> Option<Reading> {
        let primary = self.config.sensor(dimension).map(|s| source.resolve(s));
        match primary {
            Some(r) if r.is_known() => Some(r),
            other => match self.config.room_sensor(dimension) {
                Some(room) => {
                    let r = source.resolve(room);
                    if r.is_known() {
                        debug!(plant = %self.config.plant_id, %dimension, "using room sensor");
                    }
                    Some(r)
                }
                None => other,
            },
        }
    }

    /// Run one evaluation pass. Never fails: missing data degrades to
    /// `unknown`, delivery failures are logged and reported.
    pub fn evaluate(
        &mut self,
        now: OffsetDateTime,
        source: &dyn ReadingSource,
        notifier: &Notifier,
    ) -> PassOutcome {
        let mut readings = BTreeMap::new();
        for dimension in Dimension::ALL {
            if dimension == Dimension::Dli {
                continue;
            }
            let value = self.read(source, dimension).and_then(|r| r.value());
            readings.insert(dimension, value);
        }
        let value = |d: Dimension| readings.get(&d).copied().flatten();

        if self.config.sensors.illuminance.is_some() {
            self.dli.record(now, value(Dimension::Illuminance));
        }
        let last_dli = self.dli.last_period();
        let dli = (last_dli > 0.0).then_some(last_dli);

        let report = assess(Dimension::ALL.into_iter().map(|d| {
            let input = DimensionInput {
                value: if d == Dimension::Dli { Some(last_dli) } else { value(d) },
                thresholds: self.config.thresholds.get(&d).copied(),
                trigger_enabled: self.config.trigger_enabled(d),
            };
            (d, input)
        }));

        let weather = self
            .config
            .watering
            .weather
            .as_deref()
            .and_then(|id| source.weather(id));
        let conditions = Conditions {
            moisture: value(Dimension::Moisture),
            moisture_thresholds: self.config.thresholds.get(&Dimension::Moisture).copied(),
            temperature_c: value(Dimension::Temperature),
            humidity_pct: value(Dimension::Humidity),
            dli,
            is_outside: self.config.watering.outside,
            weather: weather.as_ref(),
        };
        let watering = self.tracker.reevaluate(now, &conditions);

        let moisture = value(Dimension::Moisture);
        let low_active = report.status(Dimension::Moisture) == Status::Low;
        let low_enabled = self.config.watering.notify_low_moisture
            && self.config.trigger_enabled(Dimension::Moisture);
        let due_enabled = self.config.watering.notify_when_due;
        let low = self.run_gate(
            TriggerSource::LowMoisture,
            now,
            low_active,
            low_enabled,
            notifier,
            moisture,
        );
        let due = self.run_gate(
            TriggerSource::WateringDue,
            now,
            watering.due,
            due_enabled,
            notifier,
            moisture,
        );
        let alerts = vec![low, due];

        let status = PlantStatus {
            plant_id: self.config.plant_id.clone(),
            name: self.config.name.clone(),
            evaluated_at: now,
            health: report.health,
            statuses: report.statuses,
            readings,
            dli_today: self.dli.today(),
            watering,
            state: self.tracker.snapshot(),
        };
        self.last = Some(status.clone());

        PassOutcome { status, alerts }
    }

    fn run_gate(
        &mut self,
        source: TriggerSource,
        now: OffsetDateTime,
        active: bool,
        enabled: bool,
        notifier: &Notifier,
        moisture: Option<f64>,
    ) -> Alert {
        let gate = match source {
            TriggerSource::LowMoisture => &mut self.low_gate,
            TriggerSource::WateringDue => &mut self.due_gate,
        };
        let decision = gate.decide(now, active, enabled, self.tracker.state());
        let gate = *gate;
        let plant = self.config.plant_id.as_str();

        let delivery = match decision {
            GateDecision::Fire => {
                let notification = self.notification(source, moisture);
                info!(plant, source = source.as_str(), "sending notification");
                let report = notifier.deliver(self.config.notify_channel.as_deref(), &notification);
                if !report.any_delivered() {
                    warn!(plant, source = source.as_str(), "notification not delivered");
                }
                gate.record(self.tracker.state_mut(), now);
                Some(report)
            }
            GateDecision::Suppressed(reason) => {
                let until = match reason {
                    SuppressReason::Snoozed { until } | SuppressReason::Cooldown { until } => until,
                };
                debug!(plant, source = source.as_str(), ?reason, %until, "notification suppressed");
                None
            }
            GateDecision::Idle => None,
        };

        Alert {
            source,
            decision,
            delivery,
        }
    }

    fn notification(&self, source: TriggerSource, moisture: Option<f64>) -> Notification {
        let name = &self.config.name;
        let message = match source {
            TriggerSource::LowMoisture => {
                let what = self.config.species.as_deref().unwrap_or(name);
                let level = moisture.map_or_else(|| "???".to_string(), |m| format!("{m:.0}"));
                format!("Your {what} is thirsty! (Moisture: {level}%)")
            }
            TriggerSource::WateringDue => format!("{name} needs watering now."),
        };

        Notification {
            title: format!("Watering needed: {name}"),
            message,
            actions: vec![
                NotificationAction {
                    id: ActionKind::Watered.id().to_string(),
                    label: "Watered".to_string(),
                },
                NotificationAction {
                    id: ActionKind::Snooze.id().to_string(),
                    label: format!("Snooze {}h", self.config.watering.snooze_hours),
                },
            ],
            tag: source.tag(&self.config.plant_id),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
