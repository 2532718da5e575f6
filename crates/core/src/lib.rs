//! Plant monitoring engine: threshold health checks, watering interval
//! estimates and throttled notifications.
//!
//! The crate holds no I/O of its own. Readings come in through a
//! [`ReadingSource`], notifications go out through [`NotificationChannel`]s,
//! and persistence is a matter of storing each plant's [`WateringState`].

pub mod gate;
pub mod health;
pub mod interval;
pub mod light;
pub mod modifiers;
pub mod notify;
pub mod plant;
pub mod reading;
pub mod tracker;
pub mod weather;

pub use gate::{GateDecision, NotificationGate, TriggerSource};
pub use health::{Dimension, HealthState, Status, ThresholdPair};
pub use interval::{IntervalStrategy, StrategyKind};
pub use light::DliSnapshot;
pub use notify::{ActionKind, DeliveryReport, Notification, NotificationChannel, Notifier};
pub use plant::{PassOutcome, PlantConfig, PlantMonitor, PlantStatus};
pub use reading::{Reading, ReadingSource, ReadingStore, ReadingValue, SourceRef};
pub use tracker::{WateringState, WateringStatus, WateringTracker};
pub use weather::WeatherAttributes;
