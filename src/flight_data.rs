use std::collections::{BTreeMap, HashMap};

use crate::error::StoreError;
use crate::field::{Field, MetaField};
use crate::models::{Coordinate, Waypoint};
use crate::parser::SampleTable;
use crate::series::{Date, TimeSeries};
use crate::time_range::TimeRange;

/// Columnar view of one parsed log.
///
/// Numeric and categorical channels live in two stores sharing the same date
/// index. Columns whose header was not recognised are not carried over.
#[derive(Debug, Clone, Default)]
pub struct FlightData {
    meta: BTreeMap<MetaField, String>,
    units: HashMap<Field, String>,
    doubles: TimeSeries<Field, f64>,
    categoricals: TimeSeries<Field, String>,
    coordinates: Vec<Coordinate>,
}

impl FlightData {
    pub fn from_table(table: SampleTable) -> Result<Self, StoreError> {
        let SampleTable {
            meta,
            units,
            numeric_fields,
            categorical_fields,
            dates,
            numeric_rows,
            categorical_rows,
            coordinates,
            ..
        } = table;

        let doubles = TimeSeries::from_columns(dates.clone(), transpose(&numeric_fields, &numeric_rows))?;
        let categoricals =
            TimeSeries::from_columns(dates, transpose(&categorical_fields, &categorical_rows))?;

        Ok(Self {
            meta,
            units,
            doubles,
            categoricals,
            coordinates,
        })
    }

    pub fn from_series(
        doubles: TimeSeries<Field, f64>,
        categoricals: TimeSeries<Field, String>,
        coordinates: Vec<Coordinate>,
    ) -> Self {
        Self {
            doubles,
            categoricals,
            coordinates,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.doubles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doubles.is_empty()
    }

    pub fn dates(&self) -> &[Date] {
        self.doubles.dates()
    }

    pub fn doubles(&self) -> &TimeSeries<Field, f64> {
        &self.doubles
    }

    pub fn categoricals(&self) -> &TimeSeries<Field, String> {
        &self.categoricals
    }

    pub fn meta(&self, field: MetaField) -> Option<&str> {
        self.meta.get(&field).map(String::as_str)
    }

    pub fn unit(&self, field: Field) -> Option<&str> {
        self.units.get(&field).map(String::as_str)
    }

    pub fn coordinates(&self) -> &[Coordinate] {
        &self.coordinates
    }

    pub fn first_coordinate(&self) -> Option<Coordinate> {
        self.coordinates.iter().copied().find(Coordinate::is_valid)
    }

    pub fn last_coordinate(&self) -> Option<Coordinate> {
        self.coordinates.iter().rev().copied().find(Coordinate::is_valid)
    }

    /// First to last sample date.
    pub fn hobbs(&self) -> Option<TimeRange> {
        Some(TimeRange::new(self.doubles.first_date()?, self.doubles.last_date()?))
    }

    /// Non-empty `AtvWpt` values with consecutive repeats collapsed.
    pub fn route(&self) -> Vec<Waypoint> {
        let mut route: Vec<Waypoint> = Vec::new();
        for name in self.categoricals.column(Field::AtvWpt).unwrap_or_default() {
            if let Some(waypoint) = Waypoint::new(name) {
                if route.last() != Some(&waypoint) {
                    route.push(waypoint);
                }
            }
        }
        route
    }
}

fn transpose<T: Clone>(fields: &[Field], rows: &[Vec<T>]) -> BTreeMap<Field, Vec<T>> {
    let mut columns = BTreeMap::new();
    for (idx, field) in fields.iter().enumerate() {
        if *field == Field::Unknown || columns.contains_key(field) {
            continue;
        }
        let column: Vec<T> = rows.iter().filter_map(|row| row.get(idx).cloned()).collect();
        columns.insert(*field, column);
    }
    columns
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::FlightData;
    use crate::config::AnalysisConfig;
    use crate::field::FieldCatalog;
    use crate::parser::{test_support::create_test_log, LogParser};

    pub fn create_test_data() -> FlightData {
        let catalog = FieldCatalog::builtin();
        let parsed = LogParser::new(&catalog, &AnalysisConfig::default())
            .parse_str(&create_test_log(), None)
            .unwrap();
        FlightData::from_table(parsed.table).unwrap()
    }
}
