//! Route segmentation.
//!
//! A flight is cut into contiguous legs at change points: where the active
//! waypoint changes, where the flight phase changes, or on a fixed time grid.
//! Leg `i` spans `[cp_i, cp_{i+1})` and the last leg runs to the final sample
//! inclusive, so the legs cover the data without overlapping.

use std::collections::{BTreeMap, HashMap};

use crate::config::AnalysisConfig;
use crate::field::Field;
use crate::flight_data::FlightData;
use crate::models::Waypoint;
use crate::series::{Date, TimeSeries};
use crate::stats::{CategoricalMetric, CategoricalStats, Metric, ValueStats};
use crate::time_range::TimeRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segmentation {
    /// A new leg each time the active waypoint changes.
    Waypoint,
    /// A new leg each time the flight phase changes.
    Phase,
    /// Fixed buckets of the given number of seconds.
    Interval(i64),
}

impl Segmentation {
    /// Interval buckets of the configured length.
    pub fn interval(config: &AnalysisConfig) -> Self {
        Segmentation::Interval(config.leg_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlightLeg {
    waypoint_to: Waypoint,
    waypoint_from: Option<Waypoint>,
    time_range: TimeRange,
    data: BTreeMap<Field, ValueStats>,
    categoricals: HashMap<Field, CategoricalStats<String>>,
}

impl FlightLeg {
    pub fn waypoint_to(&self) -> &Waypoint {
        &self.waypoint_to
    }

    pub fn waypoint_from(&self) -> Option<&Waypoint> {
        self.waypoint_from.as_ref()
    }

    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    pub fn data(&self) -> &BTreeMap<Field, ValueStats> {
        &self.data
    }

    pub fn categoricals(&self) -> &HashMap<Field, CategoricalStats<String>> {
        &self.categoricals
    }

    /// Fields with at least one finite sample in the leg.
    pub fn fields(&self) -> Vec<Field> {
        self.data.keys().copied().collect()
    }

    pub fn value(&self, field: Field, metric: Metric) -> Option<f64> {
        self.data.get(&field).map(|stats| stats.value(metric))
    }

    pub fn categorical(&self, field: Field, metric: CategoricalMetric) -> Option<&str> {
        self.categoricals
            .get(&field)
            .map(|stats| stats.value(metric).as_str())
    }

    /// Cut `data` into legs. With `start`, rows before that date are ignored.
    ///
    /// No rows gives no legs. Rows without any change point give a single
    /// unnamed leg.
    pub fn legs(data: &FlightData, segmentation: Segmentation, start: Option<Date>) -> Vec<FlightLeg> {
        let doubles = data.doubles().sliced(start, None);
        let strings = data.categoricals().sliced(start, None);
        let (Some(first), Some(last)) = (doubles.first_date(), doubles.last_date()) else {
            return Vec::new();
        };

        let mut points = match segmentation {
            Segmentation::Waypoint => change_points(&strings, Field::AtvWpt),
            Segmentation::Phase => change_points(&strings, Field::FltPhase),
            Segmentation::Interval(secs) => interval_points(&strings, TimeRange::new(first, last), secs),
        };
        match points.first_mut() {
            Some(point) => point.0 = first,
            None => points.push((first, None)),
        }

        let mut legs: Vec<FlightLeg> = Vec::with_capacity(points.len());
        for (idx, (from, name)) in points.iter().enumerate() {
            let to = points.get(idx + 1).map_or(last, |(date, _)| *date);
            let inclusive = idx + 1 == points.len();
            let waypoint_from = legs.last().map(|leg| leg.waypoint_to.clone());
            let waypoint_to = name
                .clone()
                .or_else(|| waypoint_from.clone())
                .unwrap_or_else(Waypoint::unnamed);

            let stats = doubles
                .value_stats(*from, to, inclusive)
                .into_iter()
                .filter(|(_, stats)| stats.is_valid())
                .collect();

            legs.push(FlightLeg {
                waypoint_to,
                waypoint_from,
                time_range: TimeRange::new(*from, to),
                data: stats,
                categoricals: strings.categorical_stats(*from, to, inclusive),
            });
        }
        tracing::debug!(count = legs.len(), ?segmentation, "segmented legs");
        legs
    }
}

/// Dates where the non-empty value of `field` changes, with the new value.
fn change_points(strings: &TimeSeries<Field, String>, field: Field) -> Vec<(Date, Option<Waypoint>)> {
    let Some(column) = strings.column(field) else {
        return Vec::new();
    };
    let mut points: Vec<(Date, Option<Waypoint>)> = Vec::new();
    let mut current: Option<Waypoint> = None;
    for (date, value) in strings.dates().iter().zip(column) {
        let Some(waypoint) = Waypoint::new(value) else {
            continue;
        };
        if current.as_ref() != Some(&waypoint) {
            points.push((*date, Some(waypoint.clone())));
            current = Some(waypoint);
        }
    }
    points
}

/// Bucket starts on the interval grid, each named after the last active
/// waypoint inside the bucket.
fn interval_points(
    strings: &TimeSeries<Field, String>,
    range: TimeRange,
    interval_secs: i64,
) -> Vec<(Date, Option<Waypoint>)> {
    let mut starts = vec![range.start];
    starts.extend(
        range
            .schedule(interval_secs)
            .into_iter()
            .filter(|date| range.start < *date && *date < range.end),
    );

    let waypoints = strings.column(Field::AtvWpt).unwrap_or_default();
    starts
        .iter()
        .enumerate()
        .map(|(idx, from)| {
            let next = starts.get(idx + 1).copied();
            let rows = strings.stats_range(*from, next.unwrap_or(range.end), next.is_none());
            let name = waypoints
                .get(rows)
                .unwrap_or_default()
                .iter()
                .rev()
                .find_map(|value| Waypoint::new(value));
            (*from, name)
        })
        .collect()
}
