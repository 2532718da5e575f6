//! Weather attribute heuristics: a dryness index for the adaptive interval and
//! a rain check for the moisture-slope model.

use serde_json::{Map, Value};

/// Opaque attribute mapping published by a weather provider.
pub type WeatherAttributes = Map<String, Value>;

const PROBABILITY_KEYS: &[&str] = &[
    "precipitation_probability",
    "precip_prob",
    "precipitationProbability",
];
const AMOUNT_KEYS: &[&str] = &["precipitation", "precipitation_amount"];

/// Precipitation amount treated as fully wet.
const SATURATING_AMOUNT: f64 = 50.0;

/// Forecast entries looked at by both heuristics.
const FORECAST_HORIZON: usize = 2;

/// Estimate how dry the weather is, from 0.0 (wet) to 1.0 (very dry).
///
/// Preference order: the next forecast periods (each scored recursively and
/// averaged), precipitation probability, precipitation amount, and finally the
/// condition keyword. Returns `None` when nothing usable is present.
pub fn weather_dryness(attrs: &WeatherAttributes) -> Option<f64> {
    if attrs.is_empty() {
        return None;
    }

    if let Some(Value::Array(forecast)) = attrs.get("forecast") {
        let scores: Vec<f64> = forecast
            .iter()
            .take(FORECAST_HORIZON)
            .filter_map(Value::as_object)
            .filter_map(weather_dryness)
            .collect();
        if !scores.is_empty() {
            return Some(scores.iter().sum::<f64>() / scores.len() as f64);
        }
    }

    for key in PROBABILITY_KEYS {
        if let Some(prob) = attrs.get(*key).and_then(number) {
            let prob = prob.clamp(0.0, 100.0);
            return Some((1.0 - prob / 100.0).clamp(0.0, 1.0));
        }
    }

    for key in AMOUNT_KEYS {
        if let Some(amount) = attrs.get(*key).and_then(number) {
            let amount = amount.min(SATURATING_AMOUNT);
            return Some((1.0 - amount / SATURATING_AMOUNT).clamp(0.0, 1.0));
        }
    }

    let condition = attrs.get("condition").and_then(Value::as_str)?;
    match condition.to_lowercase().as_str() {
        "clear" | "sunny" | "partlycloudy" | "mostly_sunny" => Some(0.9),
        "cloudy" | "partly_cloudy" | "mostly_cloudy" => Some(0.6),
        "rain" | "rainy" | "snow" | "sleet" | "thunderstorm" => Some(0.1),
        _ => None,
    }
}

/// True when either of the next two forecast periods brings rain or snow.
pub fn rain_expected(attrs: &WeatherAttributes) -> bool {
    let Some(Value::Array(forecast)) = attrs.get("forecast") else {
        return false;
    };
    forecast
        .iter()
        .take(FORECAST_HORIZON)
        .filter_map(Value::as_object)
        .any(|entry| {
            let wet_condition = entry
                .get("condition")
                .and_then(Value::as_str)
                .is_some_and(|c| matches!(c, "rainy" | "pouring" | "hail" | "snowy"));
            let heavy = entry
                .get("precipitation")
                .and_then(number)
                .is_some_and(|p| p > 2.0);
            wet_condition || heavy
        })
}

/// Numbers may arrive as JSON numbers or numeric strings.
fn number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

// ===========================================================================
// Tests
// ===========================================================================
