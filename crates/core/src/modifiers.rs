//! Interval modifiers: each maps one environmental factor to a multiplier on
//! the base watering interval. Values above 1.0 stretch the interval, values
//! below shorten it. A missing input is neutral.

use std::f64::consts::PI;
use time::OffsetDateTime;

/// Shortest interval the calculator will ever return, in days.
pub const MIN_INTERVAL_DAYS: f64 = 0.5;
/// Longest interval the calculator will ever return, in days.
pub const MAX_INTERVAL_DAYS: f64 = 365.0;

const NEUTRAL_TEMP_C: f64 = 20.0;
const NEUTRAL_HUMIDITY_PCT: f64 = 50.0;
const NEUTRAL_DLI: f64 = 5.0;

/// Day of year with the driest (shortest-interval) seasonal factor.
const SUMMER_PEAK_DAY: f64 = 172.0;
const SEASONAL_AMPLITUDE: f64 = 0.2;

/// Outdoor multiplier when the plant is outside but no weather data exists.
const OUTDOOR_NO_DATA: f64 = 0.8;

/// Warmer air dries soil faster: -2% per °C above 20 °C, +2% per °C below.
pub fn temperature_modifier(temp_c: Option<f64>) -> f64 {
    let Some(t) = temp_c else {
        return 1.0;
    };
    (1.0 - (t - NEUTRAL_TEMP_C) * 0.02).clamp(0.5, 2.0)
}

/// Humid air slows drying: +5% per 10 points above 50 %.
pub fn humidity_modifier(humidity_pct: Option<f64>) -> f64 {
    let Some(h) = humidity_pct else {
        return 1.0;
    };
    (1.0 + (h - NEUTRAL_HUMIDITY_PCT) / 10.0 * 0.05).clamp(0.5, 2.0)
}

/// More light means more transpiration. 1.5x at 0 mol/d·m², 1.0x at 5,
/// bottoming out at 0.25x from 20 upwards.
pub fn dli_modifier(dli: Option<f64>) -> f64 {
    let Some(d) = dli else {
        return 1.0;
    };
    let m = if d < NEUTRAL_DLI {
        1.0 + (NEUTRAL_DLI - d) * 0.1
    } else {
        1.0 - (d - NEUTRAL_DLI) * 0.05
    };
    m.clamp(0.25, 1.5)
}

/// Cosine over the year: 0.8x around day 172, 1.2x around day 355.
pub fn seasonal_modifier(day_of_year: u16) -> f64 {
    let phase = 2.0 * PI * (f64::from(day_of_year) - SUMMER_PEAK_DAY) / 365.25;
    1.0 - phase.cos() * SEASONAL_AMPLITUDE
}

pub fn seasonal_modifier_at(at: OffsetDateTime) -> f64 {
    seasonal_modifier(at.ordinal())
}

/// Only applies outside. `dryness` runs from 0.0 (wet) to 1.0 (dry).
pub fn outdoor_modifier(is_outside: bool, dryness: Option<f64>) -> f64 {
    if !is_outside {
        return 1.0;
    }
    match dryness {
        None => OUTDOOR_NO_DATA,
        Some(d) => (1.2 - (d - 0.5)).clamp(0.4, 1.5),
    }
}

pub fn clamp_interval(days: f64) -> f64 {
    days.clamp(MIN_INTERVAL_DAYS, MAX_INTERVAL_DAYS)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // -- temperature --------------------------------------------------------

    #[test]
    fn temperature_neutral_and_missing() {
        assert_eq!(temperature_modifier(Some(20.0)), 1.0);
        assert_eq!(temperature_modifier(None), 1.0);
    }

    #[test]
    fn temperature_slope() {
        assert!(approx(temperature_modifier(Some(25.0)), 0.9));
        assert!(approx(temperature_modifier(Some(15.0)), 1.1));
    }

    #[test]
    fn temperature_clamped() {
        assert_eq!(temperature_modifier(Some(60.0)), 0.5);
        assert_eq!(temperature_modifier(Some(-60.0)), 2.0);
    }

    // -- humidity -----------------------------------------------------------

    #[test]
    fn humidity_slope() {
        assert_eq!(humidity_modifier(Some(50.0)), 1.0);
        assert!(approx(humidity_modifier(Some(70.0)), 1.1));
        assert!(approx(humidity_modifier(Some(30.0)), 0.9));
        assert_eq!(humidity_modifier(None), 1.0);
    }

    // -- dli ----------------------------------------------------------------

    #[test]
    fn dli_shape() {
        assert!(approx(dli_modifier(Some(0.0)), 1.5));
        assert_eq!(dli_modifier(Some(5.0)), 1.0);
        assert!(approx(dli_modifier(Some(10.0)), 0.75));
        assert!(approx(dli_modifier(Some(20.0)), 0.25));
        assert_eq!(dli_modifier(Some(80.0)), 0.25);
        assert_eq!(dli_modifier(Some(-3.0)), 1.5);
        assert_eq!(dli_modifier(None), 1.0);
    }

    // -- seasonal -----------------------------------------------------------

    #[test]
    fn seasonal_peaks() {
        assert!(approx(seasonal_modifier(172), 0.8));
        // winter trough sits half a year later
        let winter = seasonal_modifier(355);
        assert!(winter > 1.19 && winter <= 1.2, "got {winter}");
    }

    #[test]
    fn seasonal_at_uses_day_of_year() {
        assert_eq!(
            seasonal_modifier_at(datetime!(2024-01-01 00:00 UTC)),
            seasonal_modifier(1)
        );
        assert!(seasonal_modifier(1) > 1.15);
    }

    // -- outdoor ------------------------------------------------------------

    #[test]
    fn outdoor_only_when_outside() {
        assert_eq!(outdoor_modifier(false, Some(1.0)), 1.0);
        assert_eq!(outdoor_modifier(true, None), 0.8);
    }

    #[test]
    fn outdoor_blend() {
        assert!(approx(outdoor_modifier(true, Some(0.5)), 1.2));
        assert!(approx(outdoor_modifier(true, Some(1.0)), 0.7));
        assert_eq!(outdoor_modifier(true, Some(0.0)), 1.5);
        assert_eq!(outdoor_modifier(true, Some(5.0)), 0.4);
    }

    // -- clamp --------------------------------------------------------------

    #[test]
    fn interval_clamp() {
        assert_eq!(clamp_interval(0.1), 0.5);
        assert_eq!(clamp_interval(1000.0), 365.0);
        assert_eq!(clamp_interval(7.0), 7.0);
    }
}
