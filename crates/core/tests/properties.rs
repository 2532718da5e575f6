//! Property tests for the modifier library, the adaptive interval and the
//! notification gate.

use plant_core::gate::{GateDecision, NotificationGate, TriggerSource};
use plant_core::interval::{compute_next_watering, AdaptiveInputs};
use plant_core::modifiers::{
    dli_modifier, humidity_modifier, outdoor_modifier, seasonal_modifier, temperature_modifier,
};
use plant_core::WateringState;
use proptest::prelude::*;
use time::{Duration, OffsetDateTime};

fn timestamp() -> impl Strategy<Value = OffsetDateTime> {
    // 2000-01-01 .. 2040-01-01
    (946_684_800i64..2_208_988_800i64)
        .prop_map(|s| OffsetDateTime::from_unix_timestamp(s).unwrap())
}

fn adaptive_inputs() -> impl Strategy<Value = AdaptiveInputs> {
    (
        timestamp(),
        proptest::option::of(0.01f64..1000.0),
        proptest::option::of(-40.0f64..60.0),
        proptest::option::of(0.0f64..100.0),
        any::<bool>(),
        proptest::option::of(0.0f64..1.0),
        proptest::option::of(0.0f64..60.0),
    )
        .prop_map(|(now, base, temp, hum, outside, dryness, dli)| AdaptiveInputs {
            now,
            base_interval_days: base,
            temperature_c: temp,
            humidity_pct: hum,
            is_outside: outside,
            weather_dryness: dryness,
            dli,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // -- modifiers ----------------------------------------------------------

    #[test]
    fn temperature_non_increasing_and_bounded(a in -100.0f64..100.0, b in -100.0f64..100.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let m_lo = temperature_modifier(Some(lo));
        let m_hi = temperature_modifier(Some(hi));
        prop_assert!(m_hi <= m_lo);
        prop_assert!((0.5..=2.0).contains(&m_lo));
        prop_assert!((0.5..=2.0).contains(&m_hi));
    }

    #[test]
    fn humidity_non_decreasing_and_bounded(a in -50.0f64..300.0, b in -50.0f64..300.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let m_lo = humidity_modifier(Some(lo));
        let m_hi = humidity_modifier(Some(hi));
        prop_assert!(m_lo <= m_hi);
        prop_assert!((0.5..=2.0).contains(&m_lo));
        prop_assert!((0.5..=2.0).contains(&m_hi));
    }

    #[test]
    fn dli_and_outdoor_bounded(dli in -10.0f64..100.0, dryness in -1.0f64..2.0) {
        prop_assert!((0.25..=1.5).contains(&dli_modifier(Some(dli))));
        prop_assert!((0.4..=1.5).contains(&outdoor_modifier(true, Some(dryness))));
        prop_assert_eq!(outdoor_modifier(false, Some(dryness)), 1.0);
    }

    #[test]
    fn seasonal_within_amplitude(day in 1u16..=366) {
        let m = seasonal_modifier(day);
        prop_assert!((0.8 - 1e-9..=1.2 + 1e-9).contains(&m));
    }

    // -- adaptive interval --------------------------------------------------

    #[test]
    fn interval_always_clamped(last in timestamp(), inputs in adaptive_inputs()) {
        let out = compute_next_watering(last, &inputs);
        prop_assert!(out.interval_days >= 0.5);
        prop_assert!(out.interval_days <= 365.0);
        prop_assert!(out.next_watering > last);
    }

    #[test]
    fn compute_is_idempotent(last in timestamp(), inputs in adaptive_inputs()) {
        let a = compute_next_watering(last, &inputs);
        let b = compute_next_watering(last, &inputs);
        prop_assert_eq!(a.next_watering, b.next_watering);
        prop_assert_eq!(a.explanation, b.explanation);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    // -- notification gate --------------------------------------------------

    #[test]
    fn gate_never_fires_twice_within_cooldown(
        start in timestamp(),
        steps in 1usize..(6 * 3600),
        low in any::<bool>(),
    ) {
        let source = if low { TriggerSource::LowMoisture } else { TriggerSource::WateringDue };
        let mut gate = NotificationGate::new(source);
        let mut state = WateringState::default();
        let mut fired_at: Vec<OffsetDateTime> = Vec::new();

        for s in 0..steps {
            let now = start + Duration::seconds(s as i64);
            if gate.decide(now, true, true, &state) == GateDecision::Fire {
                gate.record(&mut state, now);
                fired_at.push(now);
            }
        }

        prop_assert!(!fired_at.is_empty());
        for pair in fired_at.windows(2) {
            prop_assert!(pair[1] - pair[0] >= source.cooldown());
        }
    }
}
