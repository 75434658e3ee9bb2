use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn elapsed(&self) -> Duration {
        self.end - self.start
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed().num_milliseconds() as f64 / 1000.0
    }

    pub fn elapsed_hours(&self) -> f64 {
        self.elapsed_secs() / 3600.0
    }

    /// Half-open containment: `start <= date < end`.
    pub fn contains(&self, date: DateTime<Utc>) -> bool {
        self.start <= date && date < self.end
    }

    /// From this start to the other's start.
    pub fn start_to_start(&self, other: &TimeRange) -> TimeRange {
        TimeRange::new(self.start, other.start)
    }

    /// From this start to the other's end.
    pub fn start_to_end(&self, other: &TimeRange) -> TimeRange {
        TimeRange::new(self.start, other.end)
    }

    /// From this end to the other's end.
    pub fn end_to_end(&self, other: &TimeRange) -> TimeRange {
        TimeRange::new(self.end, other.end)
    }

    /// Regular grid of dates every `interval_secs` seconds covering the range.
    ///
    /// The first date is `start` rounded down to a multiple of the interval
    /// (since the unix epoch); the last is the first multiple at or after `end`.
    /// Returns an empty grid for a non-positive interval.
    pub fn schedule(&self, interval_secs: i64) -> Vec<DateTime<Utc>> {
        if interval_secs <= 0 {
            return Vec::new();
        }
        let start = self.start.timestamp();
        let first = start.div_euclid(interval_secs) * interval_secs;
        let span = self.end.timestamp() - first;
        let steps = span.div_euclid(interval_secs)
            + if span.rem_euclid(interval_secs) > 0 || self.end.timestamp_subsec_nanos() > 0 {
                1
            } else {
                0
            };
        let last = first + steps.max(0) * interval_secs;

        let mut dates = Vec::with_capacity(steps.max(0) as usize + 1);
        let mut t = first;
        while t < last {
            if let Some(date) = Utc.timestamp_opt(t, 0).single() {
                dates.push(date);
            }
            t += interval_secs;
        }
        if let Some(date) = Utc.timestamp_opt(last, 0).single() {
            dates.push(date);
        }
        dates
    }
}
