//! Running statistics over numeric and categorical samples.
//!
//! [`ValueStats`] folds a stream of `f64` samples (missing samples are
//! `NaN` and are skipped) and [`CategoricalStats`] tracks start, end and the
//! most frequent value of a categorical channel. Both are plain values: owners
//! fold samples into them with `update` and copy them freely.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// Scalar extracted from a [`ValueStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Start,
    End,
    Min,
    Max,
    Average,
    Total,
}

impl Metric {
    pub const ALL: &'static [Metric] = &[
        Metric::Start,
        Metric::End,
        Metric::Min,
        Metric::Max,
        Metric::Average,
        Metric::Total,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Metric::Start => "start",
            Metric::End => "end",
            Metric::Min => "min",
            Metric::Max => "max",
            Metric::Average => "average",
            Metric::Total => "total",
        }
    }

    pub fn from_key(key: &str) -> Option<Metric> {
        Metric::ALL.iter().copied().find(|m| m.key() == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueStats {
    pub start: f64,
    pub end: f64,
    pub sum: f64,
    pub weighted_sum: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
    pub weight: f64,
}

impl ValueStats {
    /// An accumulator that has seen no finite value.
    pub const INVALID: ValueStats = ValueStats {
        start: f64::NAN,
        end: f64::NAN,
        sum: f64::NAN,
        weighted_sum: 0.0,
        min: f64::NAN,
        max: f64::NAN,
        count: 0,
        weight: 0.0,
    };

    pub fn new(value: f64) -> Self {
        Self::with_weight(value, 1.0)
    }

    pub fn with_weight(value: f64, weight: f64) -> Self {
        if !value.is_finite() {
            return Self::INVALID;
        }
        Self {
            start: value,
            end: value,
            sum: value,
            weighted_sum: value * weight,
            min: value,
            max: value,
            count: 1,
            weight,
        }
    }

    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let mut stats = Self::INVALID;
        for value in values {
            stats.update(value, 1.0);
        }
        stats
    }

    pub fn is_valid(&self) -> bool {
        self.count != 0
    }

    pub fn update(&mut self, value: f64, weight: f64) {
        if !self.start.is_finite() {
            *self = Self::with_weight(value, weight);
            return;
        }
        if !value.is_finite() {
            return;
        }
        self.end = value;
        self.sum += value;
        self.weighted_sum += value * weight;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.count += 1;
        self.weight += weight;
    }

    pub fn average(&self) -> f64 {
        self.sum / self.count as f64
    }

    pub fn weighted_average(&self) -> f64 {
        self.weighted_sum / self.weight
    }

    pub fn total(&self) -> f64 {
        self.end - self.start
    }

    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Start => self.start,
            Metric::End => self.end,
            Metric::Min => self.min,
            Metric::Max => self.max,
            Metric::Average => self.average(),
            Metric::Total => self.total(),
        }
    }
}

impl Default for ValueStats {
    fn default() -> Self {
        Self::INVALID
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalMetric {
    Start,
    End,
    MostFrequent,
}

impl CategoricalMetric {
    pub const ALL: &'static [CategoricalMetric] = &[
        CategoricalMetric::Start,
        CategoricalMetric::End,
        CategoricalMetric::MostFrequent,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            CategoricalMetric::Start => "start",
            CategoricalMetric::End => "end",
            CategoricalMetric::MostFrequent => "most_frequent",
        }
    }

    pub fn from_key(key: &str) -> Option<CategoricalMetric> {
        CategoricalMetric::ALL.iter().copied().find(|m| m.key() == key)
    }
}

/// Start, end and most frequent value of a categorical run.
///
/// Ties on frequency keep the value that reached the count first.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalStats<T: Eq + Hash + Clone> {
    start: T,
    end: T,
    most_frequent: T,
    counts: HashMap<T, usize>,
}

impl<T: Eq + Hash + Clone> CategoricalStats<T> {
    pub fn new(value: T) -> Self {
        let mut counts = HashMap::new();
        counts.insert(value.clone(), 1);
        Self {
            start: value.clone(),
            end: value.clone(),
            most_frequent: value,
            counts,
        }
    }

    pub fn update(&mut self, value: T) {
        let count = {
            let entry = self.counts.entry(value.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        let best = self.counts.get(&self.most_frequent).copied().unwrap_or(0);
        if best < count {
            self.most_frequent = value.clone();
        }
        self.end = value;
    }

    pub fn start(&self) -> &T {
        &self.start
    }

    pub fn end(&self) -> &T {
        &self.end
    }

    pub fn most_frequent(&self) -> &T {
        &self.most_frequent
    }

    pub fn count(&self, value: &T) -> usize {
        self.counts.get(value).copied().unwrap_or(0)
    }

    pub fn value(&self, metric: CategoricalMetric) -> &T {
        match metric {
            CategoricalMetric::Start => &self.start,
            CategoricalMetric::End => &self.end,
            CategoricalMetric::MostFrequent => &self.most_frequent,
        }
    }
}
