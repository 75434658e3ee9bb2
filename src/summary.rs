//! Whole-flight summary.
//!
//! A [`FlightSummary`] is built once from parsed data, or rebuilt from its
//! persisted scalar form [`FlightSummaryRecord`]. Both paths classify the
//! flight with [`SummaryType::classify`].

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::airports::AirportLocator;
use crate::config::AnalysisConfig;
use crate::field::Field;
use crate::flight_data::FlightData;
use crate::models::{Airport, Coordinate, FuelQuantity, Waypoint};
use crate::series::Date;
use crate::time_range::TimeRange;
use crate::window::FlightWindows;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, uniffi::Enum)]
#[serde(rename_all = "snake_case")]
pub enum SummaryType {
    /// No samples at all.
    Empty,
    /// Samples, but the engine never ran or the aircraft never moved.
    Preflight,
    /// Moved on the ground without flying.
    Ground,
    Flight,
}

impl SummaryType {
    pub fn classify(
        hobbs: Option<TimeRange>,
        engine_on: Option<TimeRange>,
        moving: Option<TimeRange>,
        flying: Option<TimeRange>,
    ) -> Self {
        if hobbs.is_none() {
            SummaryType::Empty
        } else if engine_on.is_none() || moving.is_none() {
            SummaryType::Preflight
        } else if flying.is_none() {
            SummaryType::Ground
        } else {
            SummaryType::Flight
        }
    }
}

/// Scalar extracted from a [`FlightSummary`]. Fuel in gallons, distance in
/// nm, altitude in ft, speed in kt, durations in hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SummaryField {
    FuelStart,
    FuelEnd,
    FuelUsed,
    FuelTotalizer,
    GpH,
    NmpG,
    Distance,
    Altitude,
    GroundSpeed,
    Hobbs,
    Flying,
    Moving,
}

impl SummaryField {
    pub const ALL: &'static [SummaryField] = &[
        SummaryField::FuelStart,
        SummaryField::FuelEnd,
        SummaryField::FuelUsed,
        SummaryField::FuelTotalizer,
        SummaryField::GpH,
        SummaryField::NmpG,
        SummaryField::Distance,
        SummaryField::Altitude,
        SummaryField::GroundSpeed,
        SummaryField::Hobbs,
        SummaryField::Flying,
        SummaryField::Moving,
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlightSummary {
    pub summary_type: SummaryType,
    pub hobbs: Option<TimeRange>,
    pub engine_on: Option<TimeRange>,
    pub moving: Option<TimeRange>,
    pub flying: Option<TimeRange>,
    pub fuel_start: FuelQuantity,
    pub fuel_end: FuelQuantity,
    pub fuel_totalizer: FuelQuantity,
    pub route: Vec<Waypoint>,
    pub distance_nm: f64,
    pub altitude_ft: f64,
    pub start_airport: Option<Airport>,
    pub end_airport: Option<Airport>,
}

impl FlightSummary {
    pub fn empty() -> Self {
        Self {
            summary_type: SummaryType::Empty,
            hobbs: None,
            engine_on: None,
            moving: None,
            flying: None,
            fuel_start: FuelQuantity::ZERO,
            fuel_end: FuelQuantity::ZERO,
            fuel_totalizer: FuelQuantity::ZERO,
            route: Vec::new(),
            distance_nm: 0.0,
            altitude_ft: 0.0,
            start_airport: None,
            end_airport: None,
        }
    }

    pub fn from_data(
        data: &FlightData,
        config: &AnalysisConfig,
        locator: Option<&dyn AirportLocator>,
    ) -> Self {
        let Some(hobbs) = data.hobbs() else {
            return Self::empty();
        };
        let doubles = data.doubles();
        let windows = FlightWindows::detect(doubles, config);

        let first = |field| doubles.first_finite(field).map_or(0.0, |v| v.value);
        let last = |field| doubles.last_finite(field).map_or(0.0, |v| v.value);
        let nearest = |coordinate: Option<Coordinate>| {
            let locator = locator?;
            locator.nearest(&coordinate?)
        };

        let summary = Self {
            summary_type: SummaryType::classify(
                Some(hobbs),
                windows.engine_on,
                windows.moving,
                windows.flying,
            ),
            hobbs: Some(hobbs),
            engine_on: windows.engine_on,
            moving: windows.moving,
            flying: windows.flying,
            fuel_start: FuelQuantity::new(first(Field::FQtyL), first(Field::FQtyR)),
            fuel_end: FuelQuantity::new(last(Field::FQtyL), last(Field::FQtyR)),
            fuel_totalizer: FuelQuantity::from_total(last(Field::FTotalizerT)),
            route: data.route(),
            distance_nm: last(Field::Distance),
            altitude_ft: doubles.max(Field::AltInd).unwrap_or(0.0),
            start_airport: nearest(data.first_coordinate()),
            end_airport: nearest(data.last_coordinate()),
        };
        tracing::debug!(
            summary_type = ?summary.summary_type,
            distance_nm = summary.distance_nm,
            "built flight summary"
        );
        summary
    }

    pub fn fuel_used(&self) -> FuelQuantity {
        self.fuel_start - self.fuel_end
    }

    /// Totalizer when it recorded anything, gauge difference otherwise.
    fn fuel_burnt(&self) -> f64 {
        if self.fuel_totalizer.total() > 0.0 {
            self.fuel_totalizer.total()
        } else {
            self.fuel_used().total()
        }
    }

    /// Departure and destination, e.g. `KSFO-KOAK`.
    pub fn route_summary(&self) -> String {
        let ident = |airport: &Option<Airport>| airport.as_ref().map(|a| a.ident.clone());
        match (ident(&self.start_airport), ident(&self.end_airport)) {
            (Some(start), Some(end)) => format!("{start}-{end}"),
            (Some(start), None) => start,
            (None, Some(end)) => end,
            (None, None) => String::new(),
        }
    }

    /// Flight that departs and lands at the same airport.
    pub fn is_local(&self) -> bool {
        match (&self.start_airport, &self.end_airport) {
            (Some(start), Some(end)) => start == end,
            _ => false,
        }
    }

    pub fn value(&self, field: SummaryField) -> Option<f64> {
        let value = match field {
            SummaryField::FuelStart => self.fuel_start.total(),
            SummaryField::FuelEnd => self.fuel_end.total(),
            SummaryField::FuelUsed => self.fuel_used().total(),
            SummaryField::FuelTotalizer => self.fuel_totalizer.total(),
            SummaryField::GpH => match self.moving {
                Some(moving) => self.fuel_burnt() / moving.elapsed_hours(),
                None => 0.0,
            },
            SummaryField::NmpG => {
                if self.distance_nm > 0.0 {
                    self.distance_nm / self.fuel_burnt()
                } else {
                    0.0
                }
            }
            SummaryField::Distance => self.distance_nm,
            SummaryField::Altitude => self.altitude_ft,
            SummaryField::GroundSpeed => match (self.flying, self.moving) {
                (Some(flying), Some(moving)) => {
                    let flying_secs = flying.elapsed_secs();
                    let ground_secs = moving.elapsed_secs() - flying_secs;
                    let elapsed = if ground_secs > flying_secs {
                        moving.elapsed_secs()
                    } else {
                        flying_secs
                    };
                    self.distance_nm / (elapsed / 3600.0)
                }
                _ => 0.0,
            },
            SummaryField::Hobbs => self.hobbs?.elapsed_hours(),
            SummaryField::Flying => self.flying?.elapsed_hours(),
            SummaryField::Moving => self.moving?.elapsed_hours(),
        };
        value.is_finite().then_some(value)
    }

    pub fn to_record(&self) -> FlightSummaryRecord {
        let start = |range: Option<TimeRange>| range.map(|r| r.start.timestamp());
        let end = |range: Option<TimeRange>| range.map(|r| r.end.timestamp());
        FlightSummaryRecord {
            summary_type: self.summary_type,
            hobbs_start: start(self.hobbs),
            hobbs_end: end(self.hobbs),
            engine_on_start: start(self.engine_on),
            engine_on_end: end(self.engine_on),
            moving_start: start(self.moving),
            moving_end: end(self.moving),
            flying_start: start(self.flying),
            flying_end: end(self.flying),
            fuel_start_left: self.fuel_start.left,
            fuel_start_right: self.fuel_start.right,
            fuel_end_left: self.fuel_end.left,
            fuel_end_right: self.fuel_end.right,
            fuel_totalizer_total: self.fuel_totalizer.total(),
            distance_nm: self.distance_nm,
            max_altitude_ft: self.altitude_ft,
            route: self
                .route
                .iter()
                .map(Waypoint::name)
                .collect::<Vec<_>>()
                .join(","),
            start_airport_icao: self.start_airport.as_ref().map(|a| a.ident.clone()),
            end_airport_icao: self.end_airport.as_ref().map(|a| a.ident.clone()),
        }
    }

    /// Rebuild from the persisted form. Airports the locator does not know
    /// keep their identifier with no position.
    pub fn from_record(record: &FlightSummaryRecord, locator: Option<&dyn AirportLocator>) -> Self {
        let hobbs = time_range(record.hobbs_start, record.hobbs_end);
        let engine_on = time_range(record.engine_on_start, record.engine_on_end);
        let moving = time_range(record.moving_start, record.moving_end);
        let flying = time_range(record.flying_start, record.flying_end);
        let airport = |ident: &Option<String>| {
            let ident = ident.as_deref()?;
            locator
                .and_then(|l| l.airport(ident))
                .or_else(|| {
                    Some(Airport {
                        ident: ident.to_string(),
                        name: ident.to_string(),
                        coordinate: Coordinate::INVALID,
                    })
                })
        };

        Self {
            summary_type: SummaryType::classify(hobbs, engine_on, moving, flying),
            hobbs,
            engine_on,
            moving,
            flying,
            fuel_start: FuelQuantity::new(record.fuel_start_left, record.fuel_start_right),
            fuel_end: FuelQuantity::new(record.fuel_end_left, record.fuel_end_right),
            fuel_totalizer: FuelQuantity::from_total(record.fuel_totalizer_total),
            route: record.route.split(',').filter_map(Waypoint::new).collect(),
            distance_nm: record.distance_nm,
            altitude_ft: record.max_altitude_ft,
            start_airport: airport(&record.start_airport_icao),
            end_airport: airport(&record.end_airport_icao),
        }
    }
}

fn time_range(start: Option<i64>, end: Option<i64>) -> Option<TimeRange> {
    let date = |secs: i64| -> Option<Date> { Utc.timestamp_opt(secs, 0).single() };
    Some(TimeRange::new(date(start?)?, date(end?)?))
}

/// Persisted scalar form of a [`FlightSummary`]. Dates are unix seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, uniffi::Record)]
pub struct FlightSummaryRecord {
    pub summary_type: SummaryType,
    pub hobbs_start: Option<i64>,
    pub hobbs_end: Option<i64>,
    pub engine_on_start: Option<i64>,
    pub engine_on_end: Option<i64>,
    pub moving_start: Option<i64>,
    pub moving_end: Option<i64>,
    pub flying_start: Option<i64>,
    pub flying_end: Option<i64>,
    pub fuel_start_left: f64,
    pub fuel_start_right: f64,
    pub fuel_end_left: f64,
    pub fuel_end_right: f64,
    pub fuel_totalizer_total: f64,
    pub distance_nm: f64,
    pub max_altitude_ft: f64,
    /// Waypoint names joined with commas.
    pub route: String,
    pub start_airport_icao: Option<String>,
    pub end_airport_icao: Option<String>,
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::airports::test_support::airport;
    use crate::airports::KnownAirports;
    use crate::flight_data::test_support::create_test_data;
    use approx::assert_relative_eq;
    use chrono::Duration;

    fn t(secs: i64) -> Date {
        Utc.with_ymd_and_hms(2022, 5, 7, 17, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn create_bay_airports() -> KnownAirports {
        KnownAirports::new(vec![
            airport("KSFO", 37.6188, -122.3756),
            airport("KOAK", 37.7210, -122.3740),
        ])
    }

    fn create_test_summary() -> FlightSummary {
        let airports = create_bay_airports();
        FlightSummary::from_data(&create_test_data(), &AnalysisConfig::default(), Some(&airports))
    }

    #[test]
    fn test_classify() {
        let r = Some(TimeRange::new(t(0), t(10)));
        assert_eq!(SummaryType::classify(None, r, r, r), SummaryType::Empty);
        assert_eq!(SummaryType::classify(r, None, r, r), SummaryType::Preflight);
        assert_eq!(SummaryType::classify(r, r, None, None), SummaryType::Preflight);
        assert_eq!(SummaryType::classify(r, r, r, None), SummaryType::Ground);
        assert_eq!(SummaryType::classify(r, r, r, r), SummaryType::Flight);
    }

    #[test]
    fn test_summary_from_data() {
        let summary = create_test_summary();
        assert_eq!(summary.summary_type, SummaryType::Flight);
        assert_eq!(summary.hobbs, Some(TimeRange::new(t(0), t(129))));
        assert_eq!(summary.flying, Some(TimeRange::new(t(35), t(114))));
        assert_relative_eq!(summary.fuel_start.total(), 80.0);
        assert_relative_eq!(summary.fuel_end.total(), 79.2, epsilon = 1e-9);
        assert_relative_eq!(summary.fuel_used().total(), 0.8, epsilon = 1e-9);
        assert_relative_eq!(summary.fuel_totalizer.total(), 1580.0 / 3600.0, epsilon = 1e-9);
        assert_relative_eq!(summary.altitude_ft, 1000.0);
        assert!(summary.distance_nm > 6.0 && summary.distance_nm < 6.5);
        assert_eq!(summary.route_summary(), "KSFO-KOAK");
        assert!(!summary.is_local());
        let route: Vec<&str> = summary.route.iter().map(Waypoint::name).collect();
        assert_eq!(route, vec!["KSFO", "KOAK"]);
    }

    #[test]
    fn test_summary_without_locator() {
        let summary = FlightSummary::from_data(&create_test_data(), &AnalysisConfig::default(), None);
        assert!(summary.start_airport.is_none());
        assert_eq!(summary.route_summary(), "");
    }

    #[test]
    fn test_empty_data_gives_empty_summary() {
        let summary = FlightSummary::from_data(&FlightData::default(), &AnalysisConfig::default(), None);
        assert_eq!(summary, FlightSummary::empty());
        assert_eq!(summary.value(SummaryField::Distance), Some(0.0));
        assert_eq!(summary.value(SummaryField::Hobbs), None);
    }

    #[test]
    fn test_summary_values() {
        let summary = create_test_summary();
        let moving_hours = 109.0 / 3600.0;
        let burnt = 1580.0 / 3600.0;
        assert_relative_eq!(summary.value(SummaryField::Moving).unwrap(), moving_hours);
        assert_relative_eq!(
            summary.value(SummaryField::GpH).unwrap(),
            burnt / moving_hours,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            summary.value(SummaryField::NmpG).unwrap(),
            summary.distance_nm / burnt,
            epsilon = 1e-9
        );
        // flying 79s, taxi 30s: speed over the flying time
        assert_relative_eq!(
            summary.value(SummaryField::GroundSpeed).unwrap(),
            summary.distance_nm / (79.0 / 3600.0),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_ground_speed_uses_moving_when_mostly_ground() {
        let mut summary = create_test_summary();
        summary.flying = Some(TimeRange::new(t(100), t(110)));
        assert_relative_eq!(
            summary.value(SummaryField::GroundSpeed).unwrap(),
            summary.distance_nm / (109.0 / 3600.0),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_gph_falls_back_to_gauges() {
        let mut summary = create_test_summary();
        summary.fuel_totalizer = FuelQuantity::ZERO;
        assert_relative_eq!(
            summary.value(SummaryField::GpH).unwrap(),
            0.8 / (109.0 / 3600.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_non_finite_value_is_none() {
        let mut summary = create_test_summary();
        summary.moving = Some(TimeRange::new(t(5), t(5)));
        assert_eq!(summary.value(SummaryField::GpH), None);
    }

    #[test]
    fn test_record_round_trip() {
        let airports = create_bay_airports();
        let summary = create_test_summary();
        let record = summary.to_record();
        assert_eq!(record.route, "KSFO,KOAK");
        assert_eq!(record.start_airport_icao.as_deref(), Some("KSFO"));

        let rebuilt = FlightSummary::from_record(&record, Some(&airports));
        assert_eq!(rebuilt, summary);

        let json = serde_json::to_string(&record).unwrap();
        let decoded: FlightSummaryRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_from_record_reclassifies() {
        let mut record = create_test_summary().to_record();
        record.summary_type = SummaryType::Flight;
        record.flying_start = None;
        let rebuilt = FlightSummary::from_record(&record, None);
        assert_eq!(rebuilt.summary_type, SummaryType::Ground);
        assert_eq!(rebuilt.start_airport.unwrap().ident, "KSFO");

        record.hobbs_start = None;
        let rebuilt = FlightSummary::from_record(&record, None);
        assert_eq!(rebuilt.summary_type, SummaryType::Empty);
    }
}
