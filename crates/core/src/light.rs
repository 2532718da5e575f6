//! Light dose: illuminance to PPFD conversion and a daily light integral
//! accumulator.

use time::{Date, Duration, OffsetDateTime};

/// µmol·m⁻²·s⁻¹ of photosynthetic photon flux per lux (daylight spectrum).
pub const LUX_TO_PPFD: f64 = 0.0185;

/// Samples further apart than this are not integrated.
const MAX_SAMPLE_GAP: Duration = Duration::hours(6);

/// PPFD in mol·m⁻²·s⁻¹ for an illuminance in lux.
pub fn ppfd_from_lux(lux: f64) -> f64 {
    lux.max(0.0) * LUX_TO_PPFD / 1_000_000.0
}

/// The part of a [`DliAccumulator`] that survives a restart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DliSnapshot {
    pub day: Date,
    pub today: f64,
    pub last_period: f64,
}

/// Trapezoidal integral of PPFD over the current UTC day, plus the total of
/// the day before.
#[derive(Debug, Clone, Default)]
pub struct DliAccumulator {
    day: Option<Date>,
    today: f64,
    last_period: f64,
    last_sample: Option<(OffsetDateTime, f64)>,
}

impl DliAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one illuminance sample. Unknown samples break the integration so
    /// the gap is not bridged.
    pub fn record(&mut self, at: OffsetDateTime, lux: Option<f64>) {
        if let Some((prev_at, _)) = self.last_sample {
            if at <= prev_at {
                return;
            }
        }

        let ppfd = lux.map(ppfd_from_lux);

        if let (Some((prev_at, prev_ppfd)), Some(ppfd)) = (self.last_sample, ppfd) {
            let span = at - prev_at;
            if span <= MAX_SAMPLE_GAP {
                self.today += (prev_ppfd + ppfd) / 2.0 * span.as_seconds_f64();
            }
        }

        self.roll_over(at.date());
        self.last_sample = ppfd.map(|p| (at, p));
    }

    fn roll_over(&mut self, date: Date) {
        match self.day {
            Some(day) if date > day => {
                self.last_period = if day.next_day() == Some(date) {
                    self.today
                } else {
                    0.0
                };
                self.today = 0.0;
                self.day = Some(date);
            }
            Some(_) => {}
            None => self.day = Some(date),
        }
    }

    /// Accumulated mol·m⁻² so far today.
    pub fn today(&self) -> f64 {
        self.today
    }

    /// Total of the previous day.
    pub fn last_period(&self) -> f64 {
        self.last_period
    }

    /// `None` until the first sample has been recorded.
    pub fn snapshot(&self) -> Option<DliSnapshot> {
        self.day.map(|day| DliSnapshot {
            day,
            today: self.today,
            last_period: self.last_period,
        })
    }

    /// Resume from a stored snapshot. The time spent down is not integrated.
    pub fn restore(&mut self, snapshot: DliSnapshot) {
        self.day = Some(snapshot.day);
        self.today = snapshot.today;
        self.last_period = snapshot.last_period;
        self.last_sample = None;
    }
}

// ===========================================================================
// Tests
// ===========================================================================
