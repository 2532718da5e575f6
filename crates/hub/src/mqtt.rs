use anyhow::Context;
use rumqttc::{AsyncClient, QoS};
use serde::Deserialize;
use serde_json::Value;

use plant_core::plant::MAX_SNOOZE_HOURS;
use plant_core::{ActionKind, Notification, NotificationChannel, WeatherAttributes};

// ---------------------------------------------------------------------------
// MQTT message types
// ---------------------------------------------------------------------------

/// Payload of `sensor/<id>/state`.
#[derive(Debug, Deserialize)]
pub(crate) struct SensorStateMsg {
    pub(crate) state: Value,
    #[serde(default)]
    pub(crate) unit: Option<String>,
}

impl SensorStateMsg {
    /// The state as text for the reading parser. Anything other than a number
    /// or a string reads as unknown.
    pub(crate) fn raw_state(&self) -> String {
        match &self.state {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            _ => "unknown".to_string(),
        }
    }
}

/// Payload of `plant/<plant_id>/action`.
#[derive(Debug, Deserialize)]
pub(crate) struct ActionMsg {
    pub(crate) action: String,
    #[serde(default)]
    pub(crate) tag: Option<String>,
    #[serde(default)]
    pub(crate) hours: Option<f64>,
}

#[derive(Debug, PartialEq)]
pub(crate) struct UserAction {
    pub(crate) kind: ActionKind,
    pub(crate) tag: Option<String>,
    pub(crate) hours: Option<f64>,
}

// ---------------------------------------------------------------------------
// Topic / payload helpers
// ---------------------------------------------------------------------------

/// Middle segment of "<prefix>/<id>/<suffix>".
fn extract_middle<'a>(topic: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    let parts: Vec<&str> = topic.split('/').collect();
    if parts.len() == 3 && parts[0] == prefix && parts[2] == suffix && !parts[1].is_empty() {
        Some(parts[1])
    } else {
        None
    }
}

/// Extract the sensor id from "sensor/<id>/state".
pub(crate) fn extract_sensor_id(topic: &str) -> Option<&str> {
    extract_middle(topic, "sensor", "state")
}

/// Extract the weather id from "weather/<id>/state".
pub(crate) fn extract_weather_id(topic: &str) -> Option<&str> {
    extract_middle(topic, "weather", "state")
}

/// Extract the plant id from "plant/<plant_id>/action".
pub(crate) fn extract_plant_id(topic: &str) -> Option<&str> {
    extract_middle(topic, "plant", "action")
}

pub(crate) fn parse_weather(payload: &[u8]) -> Result<WeatherAttributes, String> {
    match serde_json::from_slice::<Value>(payload) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("weather payload is not a JSON object".to_string()),
        Err(e) => Err(format!("bad weather json: {e}")),
    }
}

pub(crate) fn parse_action(payload: &[u8]) -> Result<UserAction, String> {
    let msg: ActionMsg =
        serde_json::from_slice(payload).map_err(|e| format!("bad action json: {e}"))?;
    let kind = ActionKind::parse(&msg.action)
        .ok_or_else(|| format!("unknown action '{}'", msg.action))?;
    if let Some(h) = msg.hours {
        if !h.is_finite() || h <= 0.0 {
            return Err(format!("snooze hours must be positive, got {h}"));
        }
        if h > MAX_SNOOZE_HOURS {
            return Err(format!("snooze hours must be at most {MAX_SNOOZE_HOURS}, got {h}"));
        }
    }
    Ok(UserAction {
        kind,
        tag: msg.tag,
        hours: msg.hours,
    })
}

// ---------------------------------------------------------------------------
// Notification channel
// ---------------------------------------------------------------------------

/// Publishes notifications to `notify/<name>` without waiting on the broker.
pub struct MqttChannel {
    name: String,
    topic: String,
    client: AsyncClient,
}

impl MqttChannel {
    pub fn new(name: &str, client: AsyncClient) -> Self {
        Self {
            name: name.to_string(),
            topic: format!("notify/{name}"),
            client,
        }
    }
}

impl NotificationChannel for MqttChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(notification).context("failed to encode notification")?;
        self.client
            .try_publish(self.topic.as_str(), QoS::AtLeastOnce, false, payload)
            .with_context(|| format!("publish to {} failed", self.topic))?;
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
