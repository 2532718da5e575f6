//! Notification payloads and best-effort delivery to the available channels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub actions: Vec<NotificationAction>,
    pub tag: String,
}

/// What the user can answer to a watering notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Watered,
    Snooze,
}

impl ActionKind {
    pub fn id(self) -> &'static str {
        match self {
            ActionKind::Watered => "watered",
            ActionKind::Snooze => "snooze",
        }
    }

    pub fn parse(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "watered" => Some(ActionKind::Watered),
            "snooze" => Some(ActionKind::Snooze),
            _ => None,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// One way of reaching the user. Sending must not block.
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    fn send(&self, notification: &Notification) -> anyhow::Result<()>;
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<String>,
    /// Channel name and error text.
    pub failed: Vec<(String, String)>,
}

impl DeliveryReport {
    pub fn any_delivered(&self) -> bool {
        !self.delivered.is_empty()
    }
}

/// The injected collection of channels a notification can go out on.
#[derive(Clone, Default)]
pub struct Notifier {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl Notifier {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Send to the preferred channel if it exists, otherwise to every channel.
    /// Failures are collected and logged; nothing is retried.
    pub fn deliver(&self, preferred: Option<&str>, notification: &Notification) -> DeliveryReport {
        let chosen = preferred.and_then(|p| self.channels.iter().find(|c| c.name() == p));
        let targets: Vec<&Arc<dyn NotificationChannel>> = match chosen {
            Some(c) => vec![c],
            None => {
                if let Some(p) = preferred {
                    warn!(channel = p, "preferred channel unavailable, broadcasting");
                }
                self.channels.iter().collect()
            }
        };

        if targets.is_empty() {
            warn!(tag = %notification.tag, "no notification channels available");
        }

        let mut report = DeliveryReport::default();
        for channel in targets {
            match channel.send(notification) {
                Ok(()) => {
                    debug!(channel = channel.name(), tag = %notification.tag, "notification sent");
                    report.delivered.push(channel.name().to_string());
                }
                Err(e) => {
                    let tag = notification.tag.as_str();
                    warn!(channel = channel.name(), tag, "notification failed: {e:#}");
                    report.failed.push((channel.name().to_string(), format!("{e:#}")));
                }
            }
        }
        report
    }
}


// ===========================================================================
// Tests
// ===========================================================================
