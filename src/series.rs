//! Columnar time series store.
//!
//! A [`TimeSeries`] is a shared, strictly increasing date index with one value
//! column per field key, every column aligned 1:1 with the index. Appends are
//! validated before anything is mutated so a rejected append leaves the store
//! untouched. Transformations (`drop_first`, `sliced`, `drop_na`, ...) return
//! new stores and never modify the receiver.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::ops::Range;

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::stats::{CategoricalStats, ValueStats};

pub type Date = DateTime<Utc>;

/// One value with the date it was recorded at.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedValue<T> {
    pub date: Date,
    pub value: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries<K: Ord + Copy, T> {
    dates: Vec<Date>,
    columns: BTreeMap<K, Vec<T>>,
}

impl<K: Ord + Copy, T> Default for TimeSeries<K, T> {
    fn default() -> Self {
        Self {
            dates: Vec::new(),
            columns: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Copy + std::fmt::Debug, T: Clone> TimeSeries<K, T> {
    /// Empty store with every field declared and no rows.
    pub fn new(fields: &[K]) -> Self {
        Self {
            dates: Vec::new(),
            columns: fields.iter().map(|f| (*f, Vec::new())).collect(),
        }
    }

    /// Build from complete columns, validating order and sizes.
    pub fn from_columns(dates: Vec<Date>, columns: BTreeMap<K, Vec<T>>) -> Result<Self, StoreError> {
        if let Some(w) = dates.windows(2).find(|w| w[1] <= w[0]) {
            return Err(StoreError::InconsistentDateOrder {
                date: w[1].to_rfc3339(),
                last: w[0].to_rfc3339(),
            });
        }
        for (field, values) in &columns {
            if values.len() != dates.len() {
                return Err(StoreError::InconsistentDataSize {
                    field: format!("{field:?}"),
                    expected: dates.len(),
                    got: values.len(),
                });
            }
        }
        Ok(Self { dates, columns })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    pub fn first_date(&self) -> Option<Date> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<Date> {
        self.dates.last().copied()
    }

    /// Declared fields in key order.
    pub fn fields(&self) -> Vec<K> {
        self.columns.keys().copied().collect()
    }

    pub fn has_field(&self, field: K) -> bool {
        self.columns.contains_key(&field)
    }

    pub fn column(&self, field: K) -> Option<&[T]> {
        self.columns.get(&field).map(|v| v.as_slice())
    }

    /// Like [`Self::column`], but an undeclared field is an error.
    pub fn try_column(&self, field: K) -> Result<&[T], StoreError> {
        self.column(field)
            .ok_or_else(|| StoreError::UnknownField(format!("{field:?}")))
    }

    pub fn value(&self, field: K, idx: usize) -> Option<&T> {
        if idx >= self.dates.len() {
            return None;
        }
        self.columns.get(&field).and_then(|v| v.get(idx))
    }

    pub fn indexed_value(&self, field: K, idx: usize) -> Option<IndexedValue<T>> {
        let value = self.value(field, idx)?.clone();
        Some(IndexedValue {
            date: self.dates[idx],
            value,
        })
    }

    /// Whether `date` opens a new row; errors when it goes backwards.
    fn check_date(&self, date: Date) -> Result<bool, StoreError> {
        match self.dates.last() {
            Some(last) if date < *last => Err(StoreError::InconsistentDateOrder {
                date: date.to_rfc3339(),
                last: last.to_rfc3339(),
            }),
            Some(last) => Ok(date > *last),
            None => Ok(true),
        }
    }

    fn check_size(&self, field: K, row_count: usize) -> Result<(), StoreError> {
        let got = self.columns.get(&field).map(|v| v.len()).unwrap_or(0);
        if got + 1 != row_count {
            return Err(StoreError::InconsistentDataSize {
                field: format!("{field:?}"),
                expected: row_count - 1,
                got,
            });
        }
        Ok(())
    }

    /// Append one value. A date equal to the last one adds to the current row.
    pub fn append(&mut self, field: K, value: T, date: Date) -> Result<(), StoreError> {
        let new_row = self.check_date(date)?;
        let row_count = self.dates.len() + usize::from(new_row);
        self.check_size(field, row_count)?;

        if new_row {
            self.dates.push(date);
        }
        self.columns.entry(field).or_default().push(value);
        Ok(())
    }

    /// Append several fields at one date; all or nothing.
    pub fn append_row(&mut self, date: Date, values: &[(K, T)]) -> Result<(), StoreError> {
        let new_row = self.check_date(date)?;
        let row_count = self.dates.len() + usize::from(new_row);
        for (field, _) in values {
            self.check_size(*field, row_count)?;
        }
        let mut seen = values.iter().map(|(k, _)| *k).collect::<Vec<_>>();
        seen.sort();
        if let Some(w) = seen.windows(2).find(|w| w[0] == w[1]) {
            return Err(StoreError::InconsistentDataSize {
                field: format!("{:?}", w[0]),
                expected: row_count,
                got: row_count + 1,
            });
        }

        if new_row {
            self.dates.push(date);
        }
        for (field, value) in values {
            self.columns.entry(*field).or_default().push(value.clone());
        }
        Ok(())
    }

    pub fn first(&self, field: K) -> Option<IndexedValue<T>> {
        self.indexed_value(field, 0)
    }

    pub fn last(&self, field: K) -> Option<IndexedValue<T>> {
        self.indexed_value(field, self.len().checked_sub(1)?)
    }

    /// First sample of `field` satisfying `matching`.
    pub fn first_where<P: Fn(&T) -> bool>(&self, field: K, matching: P) -> Option<IndexedValue<T>> {
        let idx = self.columns.get(&field)?.iter().position(matching)?;
        self.indexed_value(field, idx)
    }

    /// Last sample of `field` satisfying `matching`.
    pub fn last_where<P: Fn(&T) -> bool>(&self, field: K, matching: P) -> Option<IndexedValue<T>> {
        let idx = self.columns.get(&field)?.iter().rposition(matching)?;
        self.indexed_value(field, idx)
    }

    /// Index of the first sample of the first run of `min_match` consecutive
    /// matching samples.
    pub fn position_first<P: Fn(&T) -> bool>(&self, field: K, min_match: usize, matching: P) -> Option<usize> {
        let values = self.columns.get(&field)?;
        let needed = min_match.max(1);
        let mut run = 0;
        for (idx, value) in values.iter().enumerate() {
            if matching(value) {
                run += 1;
                if run >= needed {
                    return Some(idx + 1 - run);
                }
            } else {
                run = 0;
            }
        }
        None
    }

    pub fn position_last<P: Fn(&T) -> bool>(&self, field: K, matching: P) -> Option<usize> {
        self.columns.get(&field)?.iter().rposition(matching)
    }

    /// Store starting at the first qualifying run. Nothing is dropped when no
    /// run qualifies; `None` only when the field is absent.
    pub fn drop_first<P: Fn(&T) -> bool>(&self, field: K, min_match: usize, matching: P) -> Option<Self> {
        if !self.columns.contains_key(&field) {
            return None;
        }
        let start = self.position_first(field, min_match, matching).unwrap_or(0);
        Some(self.slice_rows(start..self.len()))
    }

    /// Store ending at the last matching sample (inclusive). Nothing is dropped
    /// when no sample matches; `None` only when the field is absent.
    pub fn drop_last<P: Fn(&T) -> bool>(&self, field: K, matching: P) -> Option<Self> {
        if !self.columns.contains_key(&field) {
            return None;
        }
        let end = self
            .position_last(field, matching)
            .map(|idx| idx + 1)
            .unwrap_or(self.len());
        Some(self.slice_rows(0..end))
    }

    pub fn slice_rows(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        Self {
            dates: self.dates[start..end].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|(k, v)| (*k, v[start..end].to_vec()))
                .collect(),
        }
    }

    /// Row range with `start <= date < end`; either bound may be open.
    pub fn range_of(&self, start: Option<Date>, end: Option<Date>) -> Range<usize> {
        let from = start.map_or(0, |s| self.dates.partition_point(|d| *d < s));
        let to = end.map_or(self.len(), |e| self.dates.partition_point(|d| *d < e));
        from..to.max(from)
    }

    /// Half-open date slice `[start, end)`.
    pub fn sliced(&self, start: Option<Date>, end: Option<Date>) -> Self {
        self.slice_rows(self.range_of(start, end))
    }

    /// Rows for a leg: `[from, to)`, or `[from, to]` when `inclusive`.
    pub fn stats_range(&self, from: Date, to: Date, inclusive: bool) -> Range<usize> {
        let range = self.range_of(Some(from), Some(to));
        if inclusive {
            let end = self.dates.partition_point(|d| *d <= to);
            range.start..end.max(range.start)
        } else {
            range
        }
    }

    /// Store restricted to the given fields (absent ones are skipped).
    pub fn subset(&self, fields: &[K]) -> Self {
        Self {
            dates: self.dates.clone(),
            columns: fields
                .iter()
                .filter_map(|f| self.columns.get(f).map(|v| (*f, v.clone())))
                .collect(),
        }
    }
}

impl<K: Ord + Copy + std::fmt::Debug> TimeSeries<K, f64> {
    /// Rows where every one of `fields` is finite, restricted to those fields.
    pub fn drop_na(&self, fields: &[K]) -> Self {
        let present: Vec<K> = fields
            .iter()
            .copied()
            .filter(|f| self.columns.contains_key(f))
            .collect();
        if present.is_empty() {
            return self.clone();
        }
        let keep: Vec<usize> = (0..self.len())
            .filter(|&idx| present.iter().all(|f| self.columns[f][idx].is_finite()))
            .collect();

        Self {
            dates: keep.iter().map(|&i| self.dates[i]).collect(),
            columns: present
                .iter()
                .map(|f| (*f, keep.iter().map(|&i| self.columns[f][i]).collect()))
                .collect(),
        }
    }

    /// Per-field statistics over [`Self::stats_range`]. Fields with no finite
    /// sample in range get an invalid accumulator.
    pub fn value_stats(&self, from: Date, to: Date, inclusive: bool) -> BTreeMap<K, ValueStats> {
        let range = self.stats_range(from, to, inclusive);
        self.columns
            .iter()
            .map(|(k, v)| (*k, ValueStats::from_values(v[range.clone()].iter().copied())))
            .collect()
    }

    pub fn max(&self, field: K) -> Option<f64> {
        self.columns
            .get(&field)?
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .reduce(f64::max)
    }

    pub fn min(&self, field: K) -> Option<f64> {
        self.columns
            .get(&field)?
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .reduce(f64::min)
    }

    pub fn last_finite(&self, field: K) -> Option<IndexedValue<f64>> {
        self.last_where(field, |v| v.is_finite())
    }

    pub fn first_finite(&self, field: K) -> Option<IndexedValue<f64>> {
        self.first_where(field, |v| v.is_finite())
    }
}

impl<K: Ord + Copy + std::fmt::Debug, T: Clone + PartialEq> TimeSeries<K, T> {
    /// Rows where any of `fields` differs from the previous row; the first
    /// row is always kept. Empty when a field is absent.
    pub fn value_changes(&self, fields: &[K]) -> Self {
        if fields.iter().any(|f| !self.columns.contains_key(f)) {
            return Self::new(fields);
        }
        let keep: Vec<usize> = (0..self.len())
            .filter(|&idx| idx == 0 || fields.iter().any(|f| self.columns[f][idx] != self.columns[f][idx - 1]))
            .collect();

        Self {
            dates: keep.iter().map(|&i| self.dates[i]).collect(),
            columns: fields
                .iter()
                .map(|f| (*f, keep.iter().map(|&i| self.columns[f][i].clone()).collect()))
                .collect(),
        }
    }
}

impl<K: Ord + Copy + std::fmt::Debug, T: Clone + Eq + Hash> TimeSeries<K, T> {
    /// Per-field categorical statistics over [`Self::stats_range`].
    pub fn categorical_stats(&self, from: Date, to: Date, inclusive: bool) -> HashMap<K, CategoricalStats<T>>
    where
        K: Hash,
    {
        let range = self.stats_range(from, to, inclusive);
        let mut out = HashMap::new();
        for (k, v) in &self.columns {
            let mut iter = v[range.clone()].iter();
            if let Some(first) = iter.next() {
                let mut stats = CategoricalStats::new(first.clone());
                for value in iter {
                    stats.update(value.clone());
                }
                out.insert(*k, stats);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    enum F {
        Speed,
        Alt,
    }

    fn t(secs: i64) -> Date {
        Utc.with_ymd_and_hms(2022, 5, 7, 10, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn create_test_series() -> TimeSeries<F, f64> {
        let speeds = [0.0, 0.0, 5.0, 7.0, 0.0, 6.0, 8.0, 9.0, 3.0, 0.0];
        let alts = [100.0, f64::NAN, 100.0, 110.0, 120.0, 130.0, f64::NAN, 150.0, 120.0, 100.0];
        let mut ts = TimeSeries::new(&[F::Speed, F::Alt]);
        for (i, (s, a)) in speeds.iter().zip(alts.iter()).enumerate() {
            ts.append_row(t(i as i64), &[(F::Speed, *s), (F::Alt, *a)]).unwrap();
        }
        ts
    }

    #[test]
    fn test_new_declares_fields() {
        let ts: TimeSeries<F, f64> = TimeSeries::new(&[F::Speed, F::Alt]);
        assert_eq!(ts.fields(), vec![F::Speed, F::Alt]);
        assert_eq!(ts.column(F::Alt), Some(&[][..]));
        assert!(ts.is_empty());

        let ts: TimeSeries<F, f64> = TimeSeries::new(&[F::Speed]);
        assert_eq!(ts.try_column(F::Alt), Err(StoreError::UnknownField("Alt".to_string())));
    }

    #[test]
    fn test_append_rejects_older_date() {
        let mut ts = TimeSeries::new(&[F::Speed]);
        ts.append(F::Speed, 1.0, t(10)).unwrap();
        let err = ts.append(F::Speed, 2.0, t(5)).unwrap_err();
        assert!(matches!(err, StoreError::InconsistentDateOrder { .. }));
        assert_eq!(ts.len(), 1);
        assert_eq!(ts.column(F::Speed).unwrap(), &[1.0]);
    }

    #[test]
    fn test_append_rejects_size_mismatch() {
        let mut ts = TimeSeries::new(&[F::Speed, F::Alt]);
        ts.append(F::Speed, 1.0, t(0)).unwrap();
        ts.append(F::Alt, 100.0, t(0)).unwrap();
        ts.append(F::Speed, 2.0, t(1)).unwrap();
        // Speed already has a value for t(1)
        let err = ts.append(F::Speed, 3.0, t(1)).unwrap_err();
        assert!(matches!(err, StoreError::InconsistentDataSize { got: 2, .. }));
        // Alt is one behind, skipping ahead to t(2) is rejected
        let err = ts.append(F::Alt, 110.0, t(2)).unwrap_err();
        assert!(matches!(err, StoreError::InconsistentDataSize { .. }));
        assert_eq!(ts.len(), 2);
        ts.append(F::Alt, 110.0, t(1)).unwrap();
        assert_eq!(ts.column(F::Alt).unwrap(), &[100.0, 110.0]);
    }

    #[test]
    fn test_append_row_is_all_or_nothing() {
        let mut ts = create_test_series();
        let before = ts.clone();
        let err = ts.append_row(t(20), &[(F::Speed, 1.0), (F::Speed, 2.0)]);
        assert!(err.is_err());
        assert_eq!(ts, before);
    }

    #[test]
    fn test_from_columns_validates() {
        let mut cols = BTreeMap::new();
        cols.insert(F::Speed, vec![1.0, 2.0]);
        assert!(TimeSeries::from_columns(vec![t(0), t(1)], cols.clone()).is_ok());
        assert!(TimeSeries::from_columns(vec![t(1), t(0)], cols.clone()).is_err());
        assert!(TimeSeries::from_columns(vec![t(0)], cols).is_err());
    }

    #[test]
    fn test_first_last() {
        let ts = create_test_series();
        let first = ts.first_where(F::Speed, |v| *v > 0.0).unwrap();
        assert_eq!(first.date, t(2));
        assert_eq!(first.value, 5.0);
        let last = ts.last_where(F::Speed, |v| *v > 0.0).unwrap();
        assert_eq!(last.date, t(8));
        assert_eq!(ts.last(F::Speed).unwrap().value, 0.0);
        assert!(ts.first_where(F::Speed, |v| *v > 100.0).is_none());

        let empty: TimeSeries<F, f64> = TimeSeries::new(&[F::Speed]);
        assert!(empty.first(F::Speed).is_none());
        assert!(empty.last(F::Speed).is_none());
    }

    #[test]
    fn test_drop_first_with_min_run() {
        let ts = create_test_series();
        // runs of > 0: [2,3] then [5,6,7,8]
        let trimmed = ts.drop_first(F::Speed, 3, |v| *v > 0.0).unwrap();
        assert_eq!(trimmed.first_date(), Some(t(5)));
        assert_eq!(trimmed.len(), 5);

        let trimmed = ts.drop_first(F::Speed, 1, |v| *v > 0.0).unwrap();
        assert_eq!(trimmed.first_date(), Some(t(2)));
    }

    #[test]
    fn test_drop_without_match_keeps_everything() {
        let ts = create_test_series();
        let trimmed = ts.drop_first(F::Speed, 1, |v| *v > 100.0).unwrap();
        assert_eq!(trimmed, ts);
        let trimmed = ts.drop_last(F::Speed, |v| *v > 100.0).unwrap();
        assert_eq!(trimmed, ts);
        assert!(ts.position_first(F::Speed, 1, |v| *v > 100.0).is_none());

        let ts: TimeSeries<F, f64> = TimeSeries::new(&[F::Speed]);
        assert!(ts.drop_first(F::Alt, 1, |_| true).is_none());
    }

    #[test]
    fn test_drop_last() {
        let ts = create_test_series();
        let trimmed = ts.drop_last(F::Speed, |v| *v > 0.0).unwrap();
        assert_eq!(trimmed.last_date(), Some(t(8)));
        assert_eq!(trimmed.column(F::Alt).unwrap().len(), 9);
    }

    #[test]
    fn test_sliced_is_half_open() {
        let ts = create_test_series();
        let slice = ts.sliced(Some(t(2)), Some(t(5)));
        assert_eq!(slice.dates(), &[t(2), t(3), t(4)]);
        let slice = ts.sliced(Some(t(8)), None);
        assert_eq!(slice.len(), 2);
        assert!(ts.sliced(Some(t(5)), Some(t(2))).is_empty());
    }

    #[test]
    fn test_value_stats_end_bound() {
        let ts = create_test_series();
        let stats = ts.value_stats(t(7), t(9), true);
        assert_eq!(stats[&F::Speed].count, 3);
        let stats = ts.value_stats(t(7), t(9), false);
        assert_eq!(stats[&F::Speed].count, 2);
        let stats = ts.value_stats(t(9), t(9), true);
        assert_eq!(stats[&F::Speed].count, 1);
        let stats = ts.value_stats(t(0), t(3), false);
        assert_eq!(stats[&F::Speed].count, 3);
        assert_eq!(stats[&F::Alt].count, 2);
    }

    #[test]
    fn test_drop_na_and_extremes() {
        let ts = create_test_series();
        let clean = ts.drop_na(&[F::Alt]);
        assert_eq!(clean.len(), 8);
        assert_eq!(clean.fields(), vec![F::Alt]);
        assert_eq!(ts.max(F::Alt), Some(150.0));
        assert_eq!(ts.min(F::Alt), Some(100.0));
        assert_eq!(ts.last_finite(F::Alt).unwrap().date, t(9));
    }

    #[test]
    fn test_value_changes() {
        let mut ts = TimeSeries::new(&[F::Speed]);
        for (i, w) in ["A", "A", "B", "B", "A"].iter().enumerate() {
            ts.append(F::Speed, w.to_string(), t(i as i64)).unwrap();
        }
        let changes = ts.value_changes(&[F::Speed]);
        assert_eq!(changes.dates(), &[t(0), t(2), t(4)]);
        assert!(ts.value_changes(&[F::Alt]).is_empty());
    }

    #[test]
    fn test_categorical_stats_range() {
        let mut ts = TimeSeries::new(&[F::Speed]);
        for (i, w) in ["A", "B", "B", "C"].iter().enumerate() {
            ts.append(F::Speed, w.to_string(), t(i as i64)).unwrap();
        }
        let stats = ts.categorical_stats(t(1), t(3), true);
        let speed = &stats[&F::Speed];
        assert_eq!(speed.start(), "B");
        assert_eq!(speed.end(), "C");
        assert_eq!(speed.most_frequent(), "B");
    }

    proptest! {
        #[test]
        fn test_append_order_invariant(offsets in prop::collection::vec(-5i64..20, 1..50)) {
            let mut ts = TimeSeries::new(&[F::Speed]);
            let mut last: Option<i64> = None;
            for (i, off) in offsets.iter().enumerate() {
                let before = ts.clone();
                let result = ts.append(F::Speed, i as f64, t(*off));
                match last {
                    Some(l) if *off < l => {
                        let rejected = matches!(result, Err(StoreError::InconsistentDateOrder { .. }));
                        prop_assert!(rejected);
                        prop_assert_eq!(&ts, &before);
                    }
                    Some(l) if *off == l => {
                        prop_assert!(result.is_err());
                        prop_assert_eq!(&ts, &before);
                    }
                    _ => {
                        prop_assert!(result.is_ok());
                        last = Some(*off);
                    }
                }
                prop_assert_eq!(ts.column(F::Speed).unwrap().len(), ts.len());
            }
        }
    }
}
