//! Legs flattened into one row per leg for CSV or SQL export.
//!
//! Unlike [`FlightLeg`], which keeps full statistics, an [`AggregatedData`]
//! keeps only the chosen metric of each chosen field, in columns keyed
//! `"<field>.<metric>"` (e.g. `"GndSpd.max"`), indexed by leg start.

use std::collections::BTreeMap;
use std::fmt::Debug;

use chrono::SecondsFormat;

use crate::error::StoreError;
use crate::field::{Field, FieldCatalog, ValueType};
use crate::leg::FlightLeg;
use crate::series::{Date, TimeSeries};
use crate::stats::{CategoricalMetric, Metric};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueColumn {
    pub field: Field,
    pub metric: Metric,
}

impl ValueColumn {
    pub fn new(field: Field, metric: Metric) -> Self {
        Self { field, metric }
    }

    pub fn key(&self) -> String {
        format!("{}.{}", self.field.name(), self.metric.key())
    }

    /// Parse a column key. Only numeric fields qualify.
    pub fn from_key(key: &str, catalog: &FieldCatalog) -> Option<Self> {
        let (field, metric) = key.split_once('.')?;
        let field = Field::from_name(field)?;
        if catalog.value_type(field) != ValueType::Value {
            return None;
        }
        Some(Self::new(field, Metric::from_key(metric)?))
    }
}

/// A categorical statistic, or with no metric a per-row constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoricalColumn {
    pub field: Field,
    pub metric: Option<CategoricalMetric>,
}

impl CategoricalColumn {
    pub fn new(field: Field, metric: Option<CategoricalMetric>) -> Self {
        Self { field, metric }
    }

    pub fn key(&self) -> String {
        match self.metric {
            Some(metric) => format!("{}.{}", self.field.name(), metric.key()),
            None => self.field.name().to_string(),
        }
    }

    pub fn from_key(key: &str, catalog: &FieldCatalog) -> Option<Self> {
        let column = match key.split_once('.') {
            Some((field, metric)) => {
                Self::new(Field::from_name(field)?, Some(CategoricalMetric::from_key(metric)?))
            }
            None => Self::new(Field::from_name(key)?, None),
        };
        (catalog.value_type(column.field) == ValueType::Categorical).then_some(column)
    }
}

/// Which metrics to export for which fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub values: BTreeMap<Field, Vec<Metric>>,
    pub categoricals: BTreeMap<Field, Vec<CategoricalMetric>>,
}

impl Schema {
    pub fn with_values(mut self, field: Field, metrics: &[Metric]) -> Self {
        self.values.entry(field).or_default().extend_from_slice(metrics);
        self
    }

    pub fn with_categoricals(mut self, field: Field, metrics: &[CategoricalMetric]) -> Self {
        self.categoricals.entry(field).or_default().extend_from_slice(metrics);
        self
    }

    fn value_columns(&self) -> Vec<ValueColumn> {
        self.values
            .iter()
            .flat_map(|(field, metrics)| metrics.iter().map(|m| ValueColumn::new(*field, *m)))
            .collect()
    }

    fn categorical_columns(&self) -> Vec<CategoricalColumn> {
        self.categoricals
            .iter()
            .flat_map(|(field, metrics)| {
                metrics.iter().map(|m| CategoricalColumn::new(*field, Some(*m)))
            })
            .collect()
    }
}

/// Header and rows, every cell already formatted.
#[derive(Debug, Clone, PartialEq)]
pub struct ByRows {
    pub fields: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedData {
    values: TimeSeries<ValueColumn, f64>,
    categoricals: TimeSeries<CategoricalColumn, String>,
}

impl AggregatedData {
    /// One row per leg. Missing statistics export as `NaN` or an empty string;
    /// every `constants` entry becomes a column with the same value on every
    /// row.
    pub fn from_legs(
        legs: &[FlightLeg],
        schema: &Schema,
        constants: &BTreeMap<Field, String>,
    ) -> Result<Self, StoreError> {
        let value_columns = schema.value_columns();
        let mut categorical_columns = schema.categorical_columns();
        categorical_columns.extend(constants.keys().map(|f| CategoricalColumn::new(*f, None)));

        let mut values = TimeSeries::new(&value_columns);
        let mut categoricals = TimeSeries::new(&categorical_columns);
        for leg in legs {
            let start = leg.time_range().start;
            let row: Vec<(ValueColumn, f64)> = value_columns
                .iter()
                .map(|c| (*c, leg.value(c.field, c.metric).unwrap_or(f64::NAN)))
                .collect();
            values.append_row(start, &row)?;

            let row: Vec<(CategoricalColumn, String)> = categorical_columns
                .iter()
                .map(|c| {
                    let value = match c.metric {
                        Some(metric) => leg.categorical(c.field, metric).unwrap_or_default(),
                        None => constants.get(&c.field).map(String::as_str).unwrap_or_default(),
                    };
                    (*c, value.to_string())
                })
                .collect();
            categoricals.append_row(start, &row)?;
        }
        Ok(Self { values, categoricals })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn dates(&self) -> &[Date] {
        self.values.dates()
    }

    pub fn values(&self) -> &TimeSeries<ValueColumn, f64> {
        &self.values
    }

    pub fn categoricals(&self) -> &TimeSeries<CategoricalColumn, String> {
        &self.categoricals
    }

    /// Distinct `LogFileName` values, in first-seen order.
    pub fn log_file_names(&self) -> Vec<String> {
        let column = CategoricalColumn::new(Field::LogFileName, None);
        let mut names: Vec<String> = Vec::new();
        for name in self.categoricals.column(column).unwrap_or_default() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    /// Merge `other` in. Rows of `other` replace rows at the same date.
    pub fn insert_or_replace(&mut self, other: &AggregatedData) -> Result<(), StoreError> {
        self.values = merged(&other.values, &self.values, f64::NAN)?;
        self.categoricals = merged(&other.categoricals, &self.categoricals, String::new())?;
        Ok(())
    }

    /// Index column, then categoricals, then values. `NaN` is an empty cell.
    pub fn by_rows(&self, index_name: Option<&str>) -> ByRows {
        let categorical_fields = self.categoricals.fields();
        let value_fields = self.values.fields();

        let mut fields = vec![index_name.unwrap_or("Date").to_string()];
        fields.extend(categorical_fields.iter().map(CategoricalColumn::key));
        fields.extend(value_fields.iter().map(ValueColumn::key));

        let rows = self
            .dates()
            .iter()
            .enumerate()
            .map(|(idx, date)| {
                let mut row = Vec::with_capacity(fields.len());
                row.push(date.to_rfc3339_opts(SecondsFormat::Secs, true));
                for field in &categorical_fields {
                    row.push(self.categoricals.value(*field, idx).cloned().unwrap_or_default());
                }
                for field in &value_fields {
                    row.push(match self.values.value(*field, idx) {
                        Some(value) if value.is_finite() => value.to_string(),
                        _ => String::new(),
                    });
                }
                row
            })
            .collect();

        ByRows { fields, rows }
    }
}

/// Union of both stores; `preferred` wins on dates present in both.
fn merged<K, T>(
    preferred: &TimeSeries<K, T>,
    other: &TimeSeries<K, T>,
    missing: T,
) -> Result<TimeSeries<K, T>, StoreError>
where
    K: Ord + Copy + Debug,
    T: Clone,
{
    let mut fields = preferred.fields();
    for field in other.fields() {
        if !fields.contains(&field) {
            fields.push(field);
        }
    }

    let mut rows: BTreeMap<Date, (&TimeSeries<K, T>, usize)> = BTreeMap::new();
    for series in [other, preferred] {
        for (idx, date) in series.dates().iter().enumerate() {
            rows.insert(*date, (series, idx));
        }
    }

    let mut out = TimeSeries::new(&fields);
    for (date, (series, idx)) in rows {
        let row: Vec<(K, T)> = fields
            .iter()
            .map(|f| (*f, series.value(*f, idx).cloned().unwrap_or_else(|| missing.clone())))
            .collect();
        out.append_row(date, &row)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight_data::test_support::create_test_data;
    use crate::leg::Segmentation;

    fn create_test_schema() -> Schema {
        Schema::default()
            .with_values(Field::GndSpd, &[Metric::Max, Metric::Average])
            .with_values(Field::AltMsl, &[Metric::Max])
            .with_values(Field::E1Cht1, &[Metric::Max])
            .with_categoricals(Field::AtvWpt, &[CategoricalMetric::Start, CategoricalMetric::End])
    }

    fn create_test_aggregate(name: &str, segmentation: Segmentation) -> AggregatedData {
        let legs = FlightLeg::legs(&create_test_data(), segmentation, None);
        let constants = BTreeMap::from([(Field::LogFileName, name.to_string())]);
        AggregatedData::from_legs(&legs, &create_test_schema(), &constants).unwrap()
    }

    #[test]
    fn test_column_keys() {
        let catalog = FieldCatalog::builtin();
        let column = ValueColumn::new(Field::E1PctPwr, Metric::Average);
        assert_eq!(column.key(), "E1 %Pwr.average");
        assert_eq!(ValueColumn::from_key("E1 %Pwr.average", &catalog), Some(column));
        assert_eq!(ValueColumn::from_key("AtvWpt.max", &catalog), None);
        assert_eq!(ValueColumn::from_key("GndSpd", &catalog), None);
        assert_eq!(ValueColumn::from_key("GndSpd.median", &catalog), None);

        let column = CategoricalColumn::new(Field::AtvWpt, Some(CategoricalMetric::MostFrequent));
        assert_eq!(column.key(), "AtvWpt.most_frequent");
        assert_eq!(CategoricalColumn::from_key("AtvWpt.most_frequent", &catalog), Some(column));
        assert_eq!(
            CategoricalColumn::from_key("LogFileName", &catalog),
            Some(CategoricalColumn::new(Field::LogFileName, None))
        );
        assert_eq!(CategoricalColumn::from_key("GndSpd", &catalog), None);
    }

    #[test]
    fn test_by_rows() {
        let data = create_test_aggregate("log_1.csv", Segmentation::Waypoint);
        assert_eq!(data.len(), 2);

        let by_rows = data.by_rows(None);
        assert_eq!(
            by_rows.fields,
            vec![
                "Date",
                "AtvWpt.start",
                "AtvWpt.end",
                "LogFileName",
                "AltMSL.max",
                "GndSpd.max",
                "GndSpd.average",
                "E1 CHT1.max",
            ]
        );
        let row = &by_rows.rows[0];
        assert_eq!(row[0], "2022-05-07T17:00:00Z");
        assert_eq!(row[1], "");
        assert_eq!(row[2], "KSFO");
        assert_eq!(row[3], "log_1.csv");
        assert_eq!(row[4], "985");
        assert_eq!(row[5], "95");
        // field absent from the log
        assert_eq!(row[7], "");
        assert_eq!(by_rows.rows[1][1], "KOAK");
        assert_eq!(data.by_rows(Some("Start")).fields[0], "Start");
    }

    #[test]
    fn test_no_legs() {
        let data = AggregatedData::from_legs(&[], &create_test_schema(), &BTreeMap::new()).unwrap();
        assert!(data.is_empty());
        assert_eq!(data.by_rows(None).rows.len(), 0);
        assert!(data.log_file_names().is_empty());
    }

    #[test]
    fn test_insert_or_replace() {
        let mut data = create_test_aggregate("old.csv", Segmentation::Waypoint);
        let other = create_test_aggregate("new.csv", Segmentation::Interval(60));
        data.insert_or_replace(&other).unwrap();

        // waypoint legs start at 0s and 75s, interval legs at 0s, 60s and 120s
        assert_eq!(data.len(), 4);
        assert_eq!(data.log_file_names(), vec!["new.csv", "old.csv"]);
        let names = data
            .categoricals()
            .column(CategoricalColumn::new(Field::LogFileName, None))
            .unwrap();
        assert_eq!(names, &["new.csv", "new.csv", "old.csv", "new.csv"]);
    }
}
