//! Periodic re-evaluation of every plant.
//!
//! Ticks, changed readings and user actions all pull the same coalescing
//! trigger: any number of pulls while a pass is pending or running schedule
//! exactly one follow-up pass.
//!
//! ```text
//! tick ─────────┐
//! reading ──────┼──▶ Trigger ──▶ evaluate_all ──▶ SharedState / Db / notify
//! user action ──┘
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::{debug, error, info};

use plant_core::{
    ActionKind, DliSnapshot, Notifier, PlantConfig, PlantMonitor, ReadingStore, WateringState,
    WeatherAttributes,
};

use crate::db::Db;
use crate::state::SharedState;

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// At most one pending pass, however often it is pulled.
#[derive(Default)]
pub struct Trigger {
    notify: Notify,
}

impl Trigger {
    pub fn pull(&self) {
        self.notify.notify_one();
    }

    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

pub struct Hub {
    plants: BTreeMap<String, Arc<Mutex<PlantMonitor>>>,
    readings: RwLock<ReadingStore>,
    notifier: Notifier,
    db: Db,
    shared: SharedState,
    trigger: Trigger,
}

impl Hub {
    pub fn new(plants: Vec<PlantConfig>, notifier: Notifier, db: Db, shared: SharedState) -> Self {
        let plants = plants
            .into_iter()
            .map(|cfg| (cfg.plant_id.clone(), Arc::new(Mutex::new(PlantMonitor::new(cfg)))))
            .collect();
        Self {
            plants,
            readings: RwLock::new(ReadingStore::new()),
            notifier,
            db,
            shared,
            trigger: Trigger::default(),
        }
    }

    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    pub fn trigger(&self) {
        self.trigger.pull();
    }

    pub fn plant_ids(&self) -> impl Iterator<Item = &str> {
        self.plants.keys().map(String::as_str)
    }

    /// Restore every plant's watering state from the database.
    pub async fn restore(&self) -> anyhow::Result<usize> {
        let mut snapshots = self.db.load_snapshots().await?;
        let mut restored = 0;
        for (plant_id, plant) in &self.plants {
            if let Some(snapshot) = snapshots.remove(plant_id) {
                plant.lock().await.restore(snapshot);
                restored += 1;
            }
        }
        let mut light = self.db.load_dli_snapshots().await?;
        for (plant_id, plant) in &self.plants {
            if let Some(dli) = light.remove(plant_id) {
                debug!(plant = %plant_id, day = %dli.day, today = dli.today, "dli restored");
                plant.lock().await.restore_dli(dli);
            }
        }
        for orphan in snapshots.keys() {
            debug!(plant = %orphan, "stored state for unconfigured plant ignored");
        }
        Ok(restored)
    }

    // -- inputs -------------------------------------------------------------

    /// Store a sensor state; pulls the trigger when the value changed.
    pub async fn update_reading(&self, sensor_id: &str, raw: &str, unit: Option<String>) {
        let changed = self.readings.write().await.update(sensor_id, raw, unit);
        if changed {
            debug!(sensor = %sensor_id, state = %raw, "reading changed");
            self.trigger.pull();
        }
    }

    pub async fn update_weather(&self, weather_id: &str, attrs: WeatherAttributes) {
        if self.readings.write().await.update_weather(weather_id, attrs) {
            self.trigger.pull();
        }
    }

    /// Apply a user action. `None` when the plant is unknown.
    pub async fn apply_action(
        &self,
        plant_id: &str,
        kind: ActionKind,
        tag: Option<&str>,
        hours: Option<f64>,
    ) -> Option<WateringState> {
        let plant = self.plants.get(plant_id)?;
        let snapshot = {
            let mut plant = plant.lock().await;
            plant.handle_action(OffsetDateTime::now_utc(), kind, tag, hours);
            plant.snapshot()
        };

        self.persist(plant_id, &snapshot).await;
        {
            let detail = match hours {
                Some(h) => format!("{kind} ({h}h)"),
                None => kind.to_string(),
            };
            self.shared.write().await.record_action(plant_id, &detail);
        }
        self.trigger.pull();
        Some(snapshot)
    }

    async fn persist(&self, plant_id: &str, snapshot: &WateringState) {
        if let Err(e) = self.db.save_snapshot(plant_id, snapshot).await {
            error!(plant = %plant_id, "db: save_snapshot failed: {e:#}");
            self.shared
                .write()
                .await
                .record_error(format!("save_snapshot failed for {plant_id}: {e:#}"));
        }
    }

    async fn persist_dli(&self, plant_id: &str, dli: &DliSnapshot) {
        if let Err(e) = self.db.save_dli(plant_id, dli).await {
            error!(plant = %plant_id, "db: save_dli failed: {e:#}");
            self.shared
                .write()
                .await
                .record_error(format!("save_dli failed for {plant_id}: {e:#}"));
        }
    }

    // -- evaluation ---------------------------------------------------------

    /// One pass over every plant.
    pub async fn evaluate_all(&self, now: OffsetDateTime) {
        for (plant_id, plant) in &self.plants {
            let mut plant = plant.lock().await;
            let before = plant.snapshot();
            let dli_before = plant.dli_snapshot();
            let outcome = {
                let readings = self.readings.read().await;
                plant.evaluate(now, &*readings, &self.notifier)
            };
            let after = plant.snapshot();
            let dli_after = plant.dli_snapshot();
            drop(plant);

            if after != before {
                self.persist(plant_id, &after).await;
            }
            if let Some(dli) = dli_after.filter(|d| Some(*d) != dli_before) {
                self.persist_dli(plant_id, &dli).await;
            }

            let mut st = self.shared.write().await;
            for alert in outcome.fired() {
                if let Some(report) = &alert.delivery {
                    st.record_notification(plant_id, alert.source, report);
                }
            }
            st.record_status(outcome.status);
        }
    }

    /// Run passes until the process exits: one per tick, plus one whenever
    /// the trigger is pulled.
    pub async fn run(self: Arc<Self>, tick: Duration) {
        let mut ticker = tokio::time::interval(tick);
        info!(plants = self.plants.len(), tick_sec = tick.as_secs(), "monitor started");
        {
            let mut st = self.shared.write().await;
            st.record_system(format!("monitor started ({} plants)", self.plants.len()));
        }

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.trigger.wait() => {}
            }
            self.evaluate_all(OffsetDateTime::now_utc()).await;
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
