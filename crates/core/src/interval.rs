//! Watering interval strategies.
//!
//! Two independent models live behind [`IntervalStrategy`]:
//!
//! - [`AdaptiveInterval`] multiplies a base interval by five environmental
//!   modifiers and counts from the last watering.
//! - [`MoistureSlopeInterval`] projects the current soil moisture down to the
//!   minimum threshold using a daily loss rate.
//!
//! They are configured per plant and never blended.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime, PrimitiveDateTime};

use crate::health::ThresholdPair;
use crate::modifiers::{
    clamp_interval, dli_modifier, humidity_modifier, outdoor_modifier, seasonal_modifier_at,
    temperature_modifier, MAX_INTERVAL_DAYS,
};
use crate::weather::{rain_expected, weather_dryness, WeatherAttributes};

pub const DEFAULT_BASE_INTERVAL_DAYS: f64 = 7.0;

/// A modifier must move this far from 1.0 before the explanation mentions it.
const EXPLAIN_THRESHOLD: f64 = 0.05;

const SECONDS_PER_DAY: f64 = 86_400.0;
/// Wider than the whole representable date range.
const MAX_SHIFT_DAYS: f64 = 7_500_000.0;

// ---------------------------------------------------------------------------
// Shared types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Adaptive,
    MoistureSlope,
}

impl StrategyKind {
    pub fn build(self) -> Box<dyn IntervalStrategy> {
        match self {
            StrategyKind::Adaptive => Box::new(AdaptiveInterval),
            StrategyKind::MoistureSlope => Box::new(MoistureSlopeInterval),
        }
    }
}

/// Everything either strategy may look at in one evaluation pass.
#[derive(Debug, Clone, Copy)]
pub struct IntervalContext<'a> {
    pub now: OffsetDateTime,
    pub last_watered: Option<OffsetDateTime>,
    pub base_interval_days: Option<f64>,
    pub moisture: Option<f64>,
    pub moisture_thresholds: Option<ThresholdPair>,
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub dli: Option<f64>,
    pub is_outside: bool,
    pub weather: Option<&'a WeatherAttributes>,
}

impl IntervalContext<'_> {
    fn base_days(&self) -> f64 {
        self.base_interval_days.unwrap_or(DEFAULT_BASE_INTERVAL_DAYS)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalEstimate {
    /// `None` when nothing anchors the schedule yet.
    #[serde(with = "time::serde::rfc3339::option")]
    pub next_watering: Option<OffsetDateTime>,
    pub interval_days: f64,
    pub days_remaining: Option<f64>,
    pub explanation: String,
}

pub trait IntervalStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn estimate(&self, ctx: &IntervalContext<'_>) -> IntervalEstimate;
}

/// `at` moved by `secs` seconds, saturating at the ends of the date range. A
/// non-finite shift leaves `at` unchanged.
pub(crate) fn shift_seconds(at: OffsetDateTime, secs: f64) -> OffsetDateTime {
    if !secs.is_finite() {
        return at;
    }
    let limit = MAX_SHIFT_DAYS * SECONDS_PER_DAY;
    let span = Duration::seconds_f64(secs.clamp(-limit, limit));
    at.checked_add(span).unwrap_or_else(|| {
        if secs > 0.0 {
            PrimitiveDateTime::MAX.assume_utc()
        } else {
            PrimitiveDateTime::MIN.assume_utc()
        }
    })
}

pub(crate) fn shift_days(at: OffsetDateTime, d: f64) -> OffsetDateTime {
    shift_seconds(at, d * SECONDS_PER_DAY)
}

fn days_between(from: OffsetDateTime, to: OffsetDateTime) -> f64 {
    (to - from).as_seconds_f64() / SECONDS_PER_DAY
}

// ---------------------------------------------------------------------------
// Adaptive model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Modifiers {
    pub temperature: f64,
    pub humidity: f64,
    pub dli: f64,
    pub outdoor: f64,
    pub seasonal: f64,
}

impl Modifiers {
    pub fn combined(&self) -> f64 {
        self.temperature * self.humidity * self.dli * self.outdoor * self.seasonal
    }

    /// "Ideal conditions", or "Adjusted for ..." listing each deviating factor.
    pub fn explain(&self, is_outside: bool) -> String {
        let mut parts = Vec::new();
        note(&mut parts, self.temperature, "cool temperature", "warm temperature");
        note(&mut parts, self.humidity, "high humidity", "dry air");
        note(&mut parts, self.seasonal, "winter dormancy", "summer growth");
        if is_outside {
            note(&mut parts, self.outdoor, "wet weather", "dry weather");
        }
        note(&mut parts, self.dli, "low light", "lots of light");

        if parts.is_empty() {
            "Ideal conditions".to_string()
        } else {
            format!("Adjusted for {}", parts.join(", "))
        }
    }
}

fn note(
    parts: &mut Vec<&'static str>,
    modifier: f64,
    longer: &'static str,
    shorter: &'static str,
) {
    if modifier > 1.0 + EXPLAIN_THRESHOLD {
        parts.push(longer);
    } else if modifier < 1.0 - EXPLAIN_THRESHOLD {
        parts.push(shorter);
    }
}

/// Inputs of the adaptive calculation. `now` drives the seasonal factor.
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveInputs {
    pub now: OffsetDateTime,
    pub base_interval_days: Option<f64>,
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub is_outside: bool,
    pub weather_dryness: Option<f64>,
    pub dli: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveOutcome {
    pub next_watering: OffsetDateTime,
    pub interval_days: f64,
    pub modifiers: Modifiers,
    pub explanation: String,
}

pub fn modifiers_for(inputs: &AdaptiveInputs) -> Modifiers {
    Modifiers {
        temperature: temperature_modifier(inputs.temperature_c),
        humidity: humidity_modifier(inputs.humidity_pct),
        dli: dli_modifier(inputs.dli),
        outdoor: outdoor_modifier(inputs.is_outside, inputs.weather_dryness),
        seasonal: seasonal_modifier_at(inputs.now),
    }
}

/// Next watering time: `last_watered` plus the base interval scaled by every
/// modifier, clamped to [0.5, 365] days.
pub fn compute_next_watering(
    last_watered: OffsetDateTime,
    inputs: &AdaptiveInputs,
) -> AdaptiveOutcome {
    let base = inputs.base_interval_days.unwrap_or(DEFAULT_BASE_INTERVAL_DAYS);
    let modifiers = modifiers_for(inputs);
    let interval_days = clamp_interval(base * modifiers.combined());

    AdaptiveOutcome {
        next_watering: shift_days(last_watered, interval_days),
        interval_days,
        modifiers,
        explanation: modifiers.explain(inputs.is_outside),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveInterval;

impl IntervalStrategy for AdaptiveInterval {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Adaptive
    }

    fn estimate(&self, ctx: &IntervalContext<'_>) -> IntervalEstimate {
        let inputs = AdaptiveInputs {
            now: ctx.now,
            base_interval_days: ctx.base_interval_days,
            temperature_c: ctx.temperature_c,
            humidity_pct: ctx.humidity_pct,
            is_outside: ctx.is_outside,
            weather_dryness: ctx.weather.and_then(weather_dryness),
            dli: ctx.dli,
        };

        let Some(last_watered) = ctx.last_watered else {
            let modifiers = modifiers_for(&inputs);
            return IntervalEstimate {
                next_watering: None,
                interval_days: clamp_interval(ctx.base_days() * modifiers.combined()),
                days_remaining: None,
                explanation: modifiers.explain(ctx.is_outside),
            };
        };

        let outcome = compute_next_watering(last_watered, &inputs);
        IntervalEstimate {
            next_watering: Some(outcome.next_watering),
            interval_days: outcome.interval_days,
            days_remaining: Some(days_between(ctx.now, outcome.next_watering).max(0.0)),
            explanation: outcome.explanation,
        }
    }
}

// ---------------------------------------------------------------------------
// Moisture-slope model
// ---------------------------------------------------------------------------

const SLOPE_NEUTRAL_TEMP_C: f64 = 22.0;
const SLOPE_NEUTRAL_HUMIDITY_PCT: f64 = 50.0;
/// Loss rate used when the threshold span gives none.
const FALLBACK_DAILY_LOSS: f64 = 5.0;
const MIN_ADJUSTMENT: f64 = 0.1;
/// Sensors may lag behind a watering this long.
const JUST_WATERED_WINDOW: Duration = Duration::hours(12);

#[derive(Debug, Clone, Copy, Default)]
pub struct MoistureSlopeInterval;

impl MoistureSlopeInterval {
    /// Days until moisture reaches the minimum, with the explanation trail.
    fn days_from_moisture(
        &self,
        ctx: &IntervalContext<'_>,
        base_days: f64,
        lines: &mut Vec<String>,
    ) -> Option<f64> {
        let current = ctx.moisture?;
        let thresholds = ctx.moisture_thresholds?;
        let (min, max) = (thresholds.min?, thresholds.max?);

        let mut daily_loss = (max - min) / base_days;
        if daily_loss <= 0.0 || !daily_loss.is_finite() {
            daily_loss = FALLBACK_DAILY_LOSS;
        }

        let mut adj = 1.0;
        if let Some(t) = ctx.temperature_c.filter(|t| *t != SLOPE_NEUTRAL_TEMP_C) {
            let temp_adj = (t - SLOPE_NEUTRAL_TEMP_C) * 0.05;
            adj *= 1.0 + temp_adj;
            lines.push(format!(
                "Temperature ({t}°C): {:+.0}% evaporation",
                temp_adj * 100.0
            ));
        }
        if let Some(h) = ctx.humidity_pct.filter(|h| *h != SLOPE_NEUTRAL_HUMIDITY_PCT) {
            let hum_adj = (h - SLOPE_NEUTRAL_HUMIDITY_PCT) * 0.004;
            adj *= 1.0 - hum_adj;
            lines.push(format!(
                "Humidity ({h}%): {:+.0}% evaporation",
                -hum_adj * 100.0
            ));
        }
        if ctx.weather.is_some_and(rain_expected) {
            adj *= 0.5;
            lines.push("Rain forecast: -50% evaporation".to_string());
        }

        let actual_loss = daily_loss * adj.max(MIN_ADJUSTMENT);
        lines.push(format!("Current loss rate: {actual_loss:.1}% / day"));
        Some(((current - min) / actual_loss).max(0.0))
    }
}

impl IntervalStrategy for MoistureSlopeInterval {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MoistureSlope
    }

    fn estimate(&self, ctx: &IntervalContext<'_>) -> IntervalEstimate {
        let base_days = ctx.base_days();
        let mut lines = vec![format!("Base interval: {base_days} days")];

        let from_moisture = self.days_from_moisture(ctx, base_days, &mut lines);
        let mut remaining = from_moisture.unwrap_or(0.0);

        if let Some(last_watered) = ctx.last_watered {
            let since = ctx.now - last_watered;
            if since < JUST_WATERED_WINDOW {
                if remaining < base_days {
                    remaining = base_days;
                    lines.push("Recent watering detected: interval reset".to_string());
                }
            } else if from_moisture.is_none() {
                let elapsed = since.whole_days();
                remaining = (base_days - elapsed as f64).max(0.0);
                lines.push(format!("Time-based estimate ({elapsed} days elapsed)"));
            }
        }

        // Never more than a year out, whatever the reading.
        let remaining = remaining.min(MAX_INTERVAL_DAYS);
        IntervalEstimate {
            next_watering: Some(shift_days(ctx.now, remaining)),
            interval_days: base_days,
            days_remaining: Some(remaining),
            explanation: lines.join("\n"),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
