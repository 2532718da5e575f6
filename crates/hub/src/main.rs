mod config;
mod db;
mod monitor;
mod mqtt;
mod state;
mod web;

use anyhow::Result;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::{env, sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use plant_core::{NotificationChannel, Notifier};

use db::Db;
use monitor::Hub;
use mqtt::{
    extract_plant_id, extract_sensor_id, extract_weather_id, parse_action, parse_weather,
    MqttChannel, SensorStateMsg,
};
use state::SystemState;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // ── Env config ──────────────────────────────────────────────────
    let broker = env::var("MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = env::var("MQTT_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1883);
    let db_url = env::var("DB_URL").unwrap_or_else(|_| "sqlite:plants.db?mode=rwc".to_string());
    let tick_sec: u64 = env::var("TICK_SEC")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|s| *s > 0)
        .unwrap_or(60);

    // ── Config file ─────────────────────────────────────────────────
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "plants.toml".to_string());
    let cfg = config::load(&config_path)?;
    if cfg.plants.is_empty() {
        warn!("no plants configured");
    }

    // ── Database ────────────────────────────────────────────────────
    let db = Db::connect(&db_url).await?;
    db.migrate().await?;

    // ── MQTT ────────────────────────────────────────────────────────
    let mut mqttoptions = MqttOptions::new("plant-hub", broker, port);
    mqttoptions.set_keep_alive(Duration::from_secs(30));
    let (client, mut eventloop) = AsyncClient::new(mqttoptions, 64);

    let mut notifier = Notifier::default();
    for name in &cfg.notify_channels {
        let channel: Arc<dyn NotificationChannel> =
            Arc::new(MqttChannel::new(name, client.clone()));
        notifier = notifier.with_channel(channel);
    }

    // ── Monitor ─────────────────────────────────────────────────────
    let shared = SystemState::shared();
    let hub = Arc::new(Hub::new(cfg.plants, notifier, db, Arc::clone(&shared)));
    let restored = hub.restore().await?;
    info!(plants = hub.plant_ids().count(), restored, "watering state restored");
    shared.write().await.record_system("hub started".to_string());

    tokio::spawn(Arc::clone(&hub).run(Duration::from_secs(tick_sec)));

    // ── Web server ──────────────────────────────────────────────────
    let web_hub = Arc::clone(&hub);
    tokio::spawn(async move {
        if let Err(e) = web::serve(web_hub).await {
            error!("{e:#}");
        }
    });

    // ── MQTT event loop ─────────────────────────────────────────────
    client.subscribe("sensor/+/state", QoS::AtLeastOnce).await?;
    client.subscribe("weather/+/state", QoS::AtLeastOnce).await?;
    client.subscribe("plant/+/action", QoS::AtLeastOnce).await?;
    info!("hub subscribed to sensor/+/state, weather/+/state and plant/+/action");

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(p))) => {
                let topic = p.topic.clone();
                let payload = p.payload.to_vec();

                if let Some(sensor_id) = extract_sensor_id(&topic) {
                    match serde_json::from_slice::<SensorStateMsg>(&payload) {
                        Ok(msg) => {
                            hub.update_reading(sensor_id, &msg.raw_state(), msg.unit).await;
                        }
                        Err(e) => {
                            // Garbage counts as "no data", not as a fault.
                            warn!(%topic, "bad sensor json: {e}");
                            hub.update_reading(sensor_id, "unknown", None).await;
                        }
                    }
                } else if let Some(weather_id) = extract_weather_id(&topic) {
                    match parse_weather(&payload) {
                        Ok(attrs) => hub.update_weather(weather_id, attrs).await,
                        Err(msg) => {
                            warn!(%topic, "{msg}");
                            shared.write().await.record_error(msg);
                        }
                    }
                } else if let Some(plant_id) = extract_plant_id(&topic) {
                    match parse_action(&payload) {
                        Ok(action) => {
                            let tag = action.tag.as_deref();
                            let applied = hub
                                .apply_action(plant_id, action.kind, tag, action.hours)
                                .await;
                            if applied.is_none() {
                                warn!(plant = %plant_id, "action for unknown plant ignored");
                            }
                        }
                        Err(msg) => {
                            warn!(%topic, "{msg}");
                            shared.write().await.record_error(msg);
                        }
                    }
                } else {
                    debug!(%topic, "unhandled topic");
                }
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("mqtt connected");
                let mut st = shared.write().await;
                st.mqtt_connected = true;
                st.record_system("mqtt connected".to_string());
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("mqtt disconnected");
                let mut st = shared.write().await;
                st.mqtt_connected = false;
                st.record_system("mqtt disconnected".to_string());
            }
            Ok(_) => {}
            Err(e) => {
                error!("mqtt error: {e}. reconnecting...");
                let mut st = shared.write().await;
                st.mqtt_connected = false;
                st.record_error(format!("mqtt error: {e}"));
                drop(st);

                sleep(Duration::from_secs(2)).await;
            }
        }
    }
}
