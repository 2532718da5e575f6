//! End-to-end passes through `PlantMonitor` with an in-memory reading store
//! and a recording channel.

use plant_core::interval::{compute_next_watering, AdaptiveInputs};
use plant_core::modifiers::seasonal_modifier;
use plant_core::{
    Dimension, HealthState, Notification, NotificationChannel, Notifier, PlantConfig, PlantMonitor,
    ReadingStore, Status, ThresholdPair, WateringState,
};
use std::sync::{Arc, Mutex};
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

#[derive(Default)]
struct Inbox {
    sent: Mutex<Vec<Notification>>,
}

impl NotificationChannel for Inbox {
    fn name(&self) -> &str {
        "inbox"
    }

    fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

impl Inbox {
    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

fn monstera() -> PlantConfig {
    let mut cfg = PlantConfig::new("monstera", "Monstera");
    cfg.sensors.moisture = Some("sensor.monstera_moisture".into());
    cfg.sensors.conductivity = Some("sensor.monstera_fertility".into());
    cfg.thresholds
        .insert(Dimension::Moisture, ThresholdPair::new(20.0, 60.0));
    cfg.thresholds
        .insert(Dimension::Conductivity, ThresholdPair::new(350.0, 2000.0));
    cfg
}

fn harness() -> (PlantMonitor, ReadingStore, Notifier, Arc<Inbox>) {
    let inbox = Arc::new(Inbox::default());
    let notifier = Notifier::default().with_channel(inbox.clone());
    (PlantMonitor::new(monstera()), ReadingStore::new(), notifier, inbox)
}

#[test]
fn new_year_interval_is_seasonal_only() {
    let last_watered = datetime!(2024-01-01 00:00 UTC);
    let inputs = AdaptiveInputs {
        now: last_watered,
        base_interval_days: Some(7.0),
        temperature_c: Some(20.0),
        humidity_pct: Some(50.0),
        is_outside: false,
        weather_dryness: None,
        dli: Some(5.0),
    };
    let out = compute_next_watering(last_watered, &inputs);
    let seasonal = seasonal_modifier(1);
    let expected = last_watered + Duration::seconds_f64(7.0 * seasonal * 86_400.0);

    assert!((out.next_watering - expected).abs() < Duration::milliseconds(1));
    assert!((seasonal - 1.0).abs() > 0.05);
    assert_eq!(out.explanation, "Adjusted for winter dormancy");
}

#[test]
fn unavailable_moisture_without_history_stays_quiet() {
    let (mut plant, mut store, notifier, inbox) = harness();
    store.update("sensor.monstera_moisture", "unavailable", None);
    let t0 = datetime!(2024-03-01 09:00 UTC);

    for minutes in 0..120 {
        let out = plant.evaluate(t0 + Duration::minutes(minutes), &store, &notifier);
        assert_eq!(out.status.health, HealthState::Unknown);
        assert_eq!(out.status.statuses[&Dimension::Moisture], Status::Unknown);
    }
    assert_eq!(inbox.count(), 0);
}

#[test]
fn low_moisture_then_snooze() {
    let (mut plant, mut store, notifier, inbox) = harness();
    store.update("sensor.monstera_moisture", "15", Some("%".into()));
    let t0 = datetime!(2024-03-01 09:00 UTC);

    plant.snooze(t0, Some(1.0));
    for seconds in (0..3600).step_by(10) {
        let out = plant.evaluate(t0 + Duration::seconds(seconds), &store, &notifier);
        assert_eq!(out.status.statuses[&Dimension::Moisture], Status::Low);
        assert_eq!(out.status.health, HealthState::Problem);
    }
    assert_eq!(inbox.count(), 0);

    plant.evaluate(t0 + Duration::hours(1), &store, &notifier);
    assert_eq!(inbox.count(), 1);
}

#[test]
fn restart_restores_cooldown() {
    let (mut plant, mut store, notifier, inbox) = harness();
    store.update("sensor.monstera_moisture", "10", None);
    let t0 = datetime!(2024-03-01 09:00 UTC);
    plant.evaluate(t0, &store, &notifier);
    assert_eq!(inbox.count(), 1);

    let saved = serde_json::to_string(&plant.snapshot()).unwrap();
    let restored: WateringState = serde_json::from_str(&saved).unwrap();
    assert_eq!(restored, plant.snapshot());

    let (mut revived, _, _, _) = harness();
    revived.restore(restored);
    revived.evaluate(t0 + Duration::hours(2), &store, &notifier);
    assert_eq!(inbox.count(), 1);
    revived.evaluate(t0 + Duration::hours(4), &store, &notifier);
    assert_eq!(inbox.count(), 2);
}

#[test]
fn watering_restarts_the_interval() {
    let (mut plant, store, notifier, _) = harness();
    let now: OffsetDateTime = datetime!(2023-09-20 12:00 UTC);
    plant.mark_watered(now);
    let out = plant.evaluate(now, &store, &notifier);
    let remaining = out.status.watering.days_remaining.unwrap();
    assert!((remaining - 7.0 * seasonal_modifier(now.ordinal())).abs() < 1e-6);
}
