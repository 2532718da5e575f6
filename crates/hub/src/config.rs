//! TOML config file loading and validation for plants and notification
//! channels.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;

use plant_core::modifiers::MAX_INTERVAL_DAYS;
use plant_core::plant::MAX_SNOOZE_HOURS;
use plant_core::PlantConfig;

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Channels notifications can be published on (`notify/<name>`).
    #[serde(default)]
    pub notify_channels: Vec<String>,
    #[serde(default)]
    pub plants: Vec<PlantConfig>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate all config entries. Returns `Ok(())` or an error describing
    /// every violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        self.validate_channels(&mut errors);
        self.validate_plants(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    fn validate_channels(&self, errors: &mut Vec<String>) {
        let mut seen: HashSet<&str> = HashSet::new();
        for (i, name) in self.notify_channels.iter().enumerate() {
            if name.trim().is_empty() {
                errors.push(format!("notify_channels[{i}]: name is empty"));
            } else if !seen.insert(name) {
                errors.push(format!("notify channel '{name}': duplicate name"));
            }
        }
    }

    fn validate_plants(&self, errors: &mut Vec<String>) {
        let channels: HashSet<&str> = self.notify_channels.iter().map(String::as_str).collect();
        let mut seen_ids: HashSet<&str> = HashSet::new();

        for (i, p) in self.plants.iter().enumerate() {
            let ctx = || {
                if p.plant_id.is_empty() {
                    format!("plants[{i}]")
                } else {
                    format!("plant '{}'", p.plant_id)
                }
            };

            // ── Identity ────────────────────────────────────────
            if p.plant_id.trim().is_empty() {
                errors.push(format!("{}: plant_id is empty", ctx()));
            } else if !seen_ids.insert(&p.plant_id) {
                errors.push(format!("{}: duplicate plant_id", ctx()));
            }

            if p.name.trim().is_empty() {
                errors.push(format!("{}: name is empty", ctx()));
            }

            // ── Thresholds ──────────────────────────────────────
            for (dimension, pair) in &p.thresholds {
                for (side, v) in [("min", pair.min), ("max", pair.max)] {
                    if let Some(v) = v.filter(|v| !v.is_finite()) {
                        errors.push(format!(
                            "{}: {dimension} threshold {side} {v} is not a finite number",
                            ctx()
                        ));
                    }
                }
            }

            // ── Watering ────────────────────────────────────────
            if let Some(base) = p.watering.base_interval_days {
                if !base.is_finite() || base <= 0.0 {
                    errors.push(format!(
                        "{}: base_interval_days must be positive, got {base}",
                        ctx()
                    ));
                } else if base > MAX_INTERVAL_DAYS {
                    errors.push(format!(
                        "{}: base_interval_days must be at most {MAX_INTERVAL_DAYS}, got {base}",
                        ctx()
                    ));
                }
            }
            let snooze = p.watering.snooze_hours;
            if !snooze.is_finite() || snooze <= 0.0 {
                errors.push(format!("{}: snooze_hours must be positive, got {snooze}", ctx()));
            } else if snooze > MAX_SNOOZE_HOURS {
                errors.push(format!(
                    "{}: snooze_hours must be at most {MAX_SNOOZE_HOURS}, got {snooze}",
                    ctx()
                ));
            }

            // ── Notification channel ────────────────────────────
            if let Some(channel) = &p.notify_channel {
                if !channels.contains(channel.as_str()) {
                    errors.push(format!(
                        "{}: notify_channel '{channel}' is not listed in notify_channels",
                        ctx()
                    ));
                }
            }
        }
    }

    /// Threshold pairs with `min > max`. Accepted as written, but worth a
    /// warning.
    pub fn inverted_thresholds(&self) -> Vec<String> {
        self.plants
            .iter()
            .flat_map(|p| {
                p.thresholds
                    .iter()
                    .filter(|(_, pair)| pair.is_inverted())
                    .map(move |(dimension, _)| format!("{}/{dimension}", p.plant_id))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read, parse, and validate a TOML config file.
pub fn load(path: &str) -> Result<Config> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config: {path}"))?;
    parse(&contents).with_context(|| format!("invalid config: {path}"))
}

pub fn parse(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents).context("failed to parse config")?;
    config.validate()?;

    for pair in config.inverted_thresholds() {
        tracing::warn!(threshold = %pair, "min is greater than max, comparing literally");
    }
    tracing::info!(
        plants = config.plants.len(),
        channels = config.notify_channels.len(),
        "config loaded"
    );
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use plant_core::{Dimension, StrategyKind, ThresholdPair};

    // -- Helper: build a valid baseline config that passes validation ------

    fn valid_plant() -> PlantConfig {
        let mut p = PlantConfig::new("fern", "Fern");
        p.sensors.moisture = Some("fern_moisture".into());
        p.thresholds
            .insert(Dimension::Moisture, ThresholdPair::new(20.0, 60.0));
        p
    }

    fn valid_config() -> Config {
        Config {
            notify_channels: vec!["phone".into()],
            plants: vec![valid_plant()],
        }
    }

    /// Assert validation fails and the error message contains `needle`.
    fn assert_validation_err(cfg: &Config, needle: &str) {
        let err = cfg.validate().unwrap_err();
        let msg = format!("{err:#}");
        assert!(
            msg.contains(needle),
            "expected error containing {needle:?}, got: {msg}"
        );
    }

    // -- Parsing ----------------------------------------------------------

    #[test]
    fn parse_full_plant() {
        let toml_str = r#"
notify_channels = ["phone", "tablet"]

[[plants]]
plant_id = "monstera"
name = "Monstera"
species = "Monstera deliciosa"
notify_channel = "tablet"

[plants.sensors]
moisture = ["monstera_moisture_a", "monstera_moisture_b"]
temperature = "monstera_temp"
illuminance = "monstera_lux"
room_humidity = "living_room_humidity"

[plants.thresholds]
moisture = { min = 20, max = 60 }
temperature = { min = 10, max = 32 }
illuminance = { max = 60000 }
dli = { min = 2, max = 12 }

[plants.triggers]
conductivity = false

[plants.watering]
base_interval_days = 9
outside = true
weather = "home"
strategy = "moisture_slope"
notify_when_due = false
snooze_hours = 3
"#;
        let config = parse(toml_str).unwrap();
        let p = &config.plants[0];
        assert_eq!(p.species.as_deref(), Some("Monstera deliciosa"));
        assert_eq!(p.sensors.moisture.as_ref().unwrap().ids().len(), 2);
        assert_eq!(
            p.thresholds[&Dimension::Illuminance],
            ThresholdPair::max_only(60_000.0)
        );
        assert!(!p.trigger_enabled(Dimension::Conductivity));
        assert!(p.trigger_enabled(Dimension::Moisture));
        assert_eq!(p.watering.strategy, StrategyKind::MoistureSlope);
        assert_eq!(p.watering.base_interval_days, Some(9.0));
        assert!(p.watering.notify_low_moisture);
        assert!(!p.watering.notify_when_due);
        assert_eq!(p.watering.snooze_hours, 3.0);
    }

    #[test]
    fn parse_empty_config() {
        let config = parse("").unwrap();
        assert!(config.plants.is_empty());
        assert!(config.notify_channels.is_empty());
    }

    #[test]
    fn unknown_strategy_rejected() {
        let toml_str = r#"
[[plants]]
plant_id = "p"
name = "P"
[plants.watering]
strategy = "guesswork"
"#;
        assert!(parse(toml_str).is_err());
    }

    // -- Validation: valid configs pass -----------------------------------

    #[test]
    fn valid_config_passes() {
        valid_config().validate().unwrap();
    }

    #[test]
    fn inverted_pair_is_accepted() {
        let mut cfg = valid_config();
        cfg.plants[0]
            .thresholds
            .insert(Dimension::Temperature, ThresholdPair::new(30.0, 10.0));
        cfg.validate().unwrap();
        assert_eq!(cfg.inverted_thresholds(), vec!["fern/temperature".to_string()]);
    }

    // -- Plant: identity --------------------------------------------------

    #[test]
    fn plant_empty_id_rejected() {
        let mut cfg = valid_config();
        cfg.plants[0].plant_id = "".into();
        assert_validation_err(&cfg, "plant_id is empty");
    }

    #[test]
    fn plant_duplicate_id_rejected() {
        let mut cfg = valid_config();
        cfg.plants.push(valid_plant());
        assert_validation_err(&cfg, "duplicate plant_id");
    }

    #[test]
    fn plant_empty_name_rejected() {
        let mut cfg = valid_config();
        cfg.plants[0].name = "  ".into();
        assert_validation_err(&cfg, "name is empty");
    }

    // -- Plant: values ----------------------------------------------------

    #[test]
    fn non_finite_threshold_rejected() {
        let mut cfg = valid_config();
        cfg.plants[0]
            .thresholds
            .insert(Dimension::Humidity, ThresholdPair::new(f64::NAN, 80.0));
        assert_validation_err(&cfg, "humidity threshold min NaN is not a finite number");
    }

    #[test]
    fn base_interval_must_be_positive() {
        let mut cfg = valid_config();
        cfg.plants[0].watering.base_interval_days = Some(0.0);
        assert_validation_err(&cfg, "base_interval_days must be positive, got 0");
    }

    #[test]
    fn snooze_hours_must_be_positive() {
        let mut cfg = valid_config();
        cfg.plants[0].watering.snooze_hours = -1.0;
        assert_validation_err(&cfg, "snooze_hours must be positive, got -1");
    }

    #[test]
    fn base_interval_capped_at_a_year() {
        let mut cfg = valid_config();
        cfg.plants[0].watering.base_interval_days = Some(1e9);
        assert_validation_err(&cfg, "base_interval_days must be at most 365");
    }

    #[test]
    fn snooze_hours_capped() {
        let mut cfg = valid_config();
        cfg.plants[0].watering.snooze_hours = 1e9;
        assert_validation_err(&cfg, "snooze_hours must be at most 720");
    }

    // -- Channels ---------------------------------------------------------

    #[test]
    fn unknown_preferred_channel_rejected() {
        let mut cfg = valid_config();
        cfg.plants[0].notify_channel = Some("pager".into());
        assert_validation_err(&cfg, "notify_channel 'pager' is not listed");
    }

    #[test]
    fn duplicate_channel_rejected() {
        let mut cfg = valid_config();
        cfg.notify_channels.push("phone".into());
        assert_validation_err(&cfg, "notify channel 'phone': duplicate name");
    }

    // -- Multiple errors reported at once ---------------------------------

    #[test]
    fn multiple_errors_collected() {
        let mut plant = PlantConfig::new("", "");
        plant.watering.snooze_hours = 0.0;
        let cfg = Config {
            notify_channels: vec!["".into()],
            plants: vec![plant],
        };
        let err = cfg.validate().unwrap_err();
        let msg = format!("{err:#}");
        // Should report many errors, not bail after the first
        assert!(msg.contains("plant_id is empty"), "missing id error in: {msg}");
        assert!(msg.contains("name is empty"), "missing name error in: {msg}");
        assert!(msg.contains("snooze_hours"), "missing snooze error in: {msg}");
        assert!(msg.contains("notify_channels[0]"), "missing channel error in: {msg}");
    }

    // -- Sample config ----------------------------------------------------

    #[test]
    fn sample_config_is_valid() {
        let config = parse(include_str!("../../../plants.toml")).unwrap();
        assert_eq!(config.plants[0].plant_id, "fern");
        assert_eq!(config.plants[0].watering.base_interval_days, Some(5.0));
    }
}
