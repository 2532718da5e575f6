mod sim;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::{env, time::Duration};
use time::OffsetDateTime;
use tokio::time::sleep;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use sim::{PlantSim, Scenario, SensorSample};

/// Topic for one simulated sensor: `sensor/<prefix>_<suffix>/state`.
fn sensor_topic(prefix: &str, sample: &SensorSample) -> String {
    format!("sensor/{prefix}_{}/state", sample.suffix)
}

/// Fraction of the simulated day at `now`. With a period of 86400 this is
/// wall-clock time of day (UTC).
fn day_fraction(now: OffsetDateTime, day_period_s: f64) -> f64 {
    let secs = now.unix_timestamp() as f64;
    (secs / day_period_s).fract()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Env config
    let broker = env::var("MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = env::var("MQTT_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1883);
    let prefix = env::var("SIM_PLANT").unwrap_or_else(|_| "fern".to_string());
    let scenario = Scenario::from_str_lossy(&env::var("SIM_SCENARIO").unwrap_or_default());
    let sample_every_s: u64 = env::var("SAMPLE_EVERY_S")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|s| *s > 0)
        .unwrap_or(30);
    // 600 gives a ten-minute "day" for quick iteration.
    let day_period_s: f64 = env::var("SIM_DAY_S")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|s: &f64| *s > 0.0)
        .unwrap_or(86_400.0);

    let mut mqttoptions = MqttOptions::new(format!("plant-sim-{prefix}"), broker, port);
    mqttoptions.set_keep_alive(Duration::from_secs(30));
    let (client, mut eventloop) = AsyncClient::new(mqttoptions, 16);

    // Only publishes, but the event loop still has to run to keep the
    // connection alive.
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => info!("sim connected to mqtt"),
                Ok(_) => {}
                Err(e) => {
                    warn!("mqtt error: {e}. retrying...");
                    sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });

    info!(%scenario, plant = %prefix, sample_every_s, "simulating");
    let mut sim = PlantSim::new(scenario);

    loop {
        let frac = day_fraction(OffsetDateTime::now_utc(), day_period_s);
        for sample in sim.sample(frac) {
            let topic = sensor_topic(&prefix, &sample);
            let payload = serde_json::to_vec(&sample)?;
            if let Err(e) = client.publish(&topic, QoS::AtLeastOnce, false, payload).await {
                error!(%topic, "publish error: {e}");
            }
        }
        info!(waterings = sim.waterings(), "published sample");

        sleep(Duration::from_secs(sample_every_s)).await;
    }
}

// ===========================================================================
// Tests
// ===========================================================================
