//! Multi-flight aggregation.
//!
//! [`Trips`] infers the home base from how many nights the aircraft spent at
//! each airport, then groups flights into trips away from that base, or into
//! calendar months.

use std::collections::BTreeMap;
use std::mem;

use chrono::Datelike;

use crate::models::Airport;
use crate::series::Date;
use crate::stats::ValueStats;
use crate::summary::{FlightSummary, SummaryField};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Flights between two departures from the base.
    Trips,
    /// Flights by calendar month of their hobbs start (UTC).
    Months,
}

/// A stay at an airport between an arriving and the next departing flight.
#[derive(Debug, Clone, PartialEq)]
pub struct Visit {
    pub airport: Airport,
    pub arrival: Date,
    pub departure: Date,
    /// Calendar days between arrival and departure.
    pub nights: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripCheck {
    SameTrip,
    EndsTrip,
    StartsTrip,
    Ignore,
}

#[derive(Debug, Clone)]
pub struct Trip {
    aggregation: Aggregation,
    base: Option<Airport>,
    month: Option<(i32, u32)>,
    flights: Vec<FlightSummary>,
    stats: BTreeMap<SummaryField, ValueStats>,
}

fn month_of(date: Date) -> (i32, u32) {
    (date.year(), date.month())
}

impl Trip {
    fn new(aggregation: Aggregation, base: Option<Airport>) -> Self {
        Self {
            aggregation,
            base,
            month: None,
            flights: Vec::new(),
            stats: BTreeMap::new(),
        }
    }

    /// Flights, newest first.
    pub fn flights(&self) -> &[FlightSummary] {
        &self.flights
    }

    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }

    pub fn label(&self) -> String {
        match self.month {
            Some((year, month)) if self.aggregation == Aggregation::Months => {
                format!("{year}-{month:02}")
            }
            _ => "Trip".to_string(),
        }
    }

    pub fn check(&self, flight: &FlightSummary) -> TripCheck {
        match self.aggregation {
            Aggregation::Trips => {
                let (Some(start), Some(end), Some(_)) =
                    (&flight.start_airport, &flight.end_airport, flight.hobbs)
                else {
                    return TripCheck::Ignore;
                };
                let Some(base) = &self.base else {
                    return TripCheck::Ignore;
                };
                if start == base && !self.is_empty() {
                    TripCheck::StartsTrip
                } else if end == base {
                    TripCheck::EndsTrip
                } else {
                    TripCheck::SameTrip
                }
            }
            Aggregation::Months => {
                let Some(hobbs) = flight.hobbs else {
                    return TripCheck::Ignore;
                };
                match self.month {
                    Some(month) if month != month_of(hobbs.start) => TripCheck::StartsTrip,
                    _ => TripCheck::SameTrip,
                }
            }
        }
    }

    /// Add a flight; returns whether it concludes the trip.
    pub fn add(&mut self, flight: FlightSummary) -> bool {
        for field in SummaryField::ALL {
            if let Some(value) = flight.value(*field) {
                self.stats
                    .entry(*field)
                    .and_modify(|stats| stats.update(value, 1.0))
                    .or_insert_with(|| ValueStats::new(value));
            }
        }
        if self.month.is_none() {
            self.month = flight.hobbs.map(|h| month_of(h.start));
        }
        let concludes = match (self.aggregation, &self.base) {
            (Aggregation::Trips, Some(base)) => flight.end_airport.as_ref() == Some(base),
            _ => false,
        };
        self.flights.push(flight);
        concludes
    }

    /// Trip total for `field`. Fuel start and end have no trip meaning.
    pub fn value(&self, field: SummaryField) -> Option<f64> {
        let sum = |field: SummaryField| self.stats.get(&field).map(|s| s.sum);
        let value = match field {
            SummaryField::FuelStart | SummaryField::FuelEnd => return None,
            SummaryField::FuelUsed
            | SummaryField::FuelTotalizer
            | SummaryField::Distance
            | SummaryField::Hobbs
            | SummaryField::Flying
            | SummaryField::Moving => sum(field)?,
            SummaryField::Altitude => self.stats.get(&field)?.max,
            SummaryField::GroundSpeed => {
                let distance = sum(SummaryField::Distance)?;
                let flying = sum(SummaryField::Flying)?;
                let moving = sum(SummaryField::Moving)?;
                let hours = if moving - flying > flying { moving } else { flying };
                distance / hours
            }
            SummaryField::GpH => sum(SummaryField::FuelTotalizer)? / sum(SummaryField::Moving)?,
            SummaryField::NmpG => sum(SummaryField::Distance)? / sum(SummaryField::FuelTotalizer)?,
        };
        value.is_finite().then_some(value)
    }

    fn closed(mut self) -> Self {
        self.flights.reverse();
        self
    }
}

#[derive(Debug, Clone)]
pub struct Trips {
    aggregation: Aggregation,
    flights: Vec<FlightSummary>,
    base: Option<Airport>,
    visits: Vec<Visit>,
    trips: Vec<Trip>,
}

impl Trips {
    pub fn new(mut flights: Vec<FlightSummary>, aggregation: Aggregation) -> Self {
        flights.sort_by_key(|f| f.hobbs.map(|h| h.start));
        Self {
            aggregation,
            flights,
            base: None,
            visits: Vec::new(),
            trips: Vec::new(),
        }
    }

    pub fn base(&self) -> Option<&Airport> {
        self.base.as_ref()
    }

    pub fn visits(&self) -> &[Visit] {
        &self.visits
    }

    /// Trips, newest first.
    pub fn trips(&self) -> &[Trip] {
        &self.trips
    }

    pub fn compute(&mut self) {
        self.compute_visits();
        self.compute_trips();
        tracing::debug!(
            flights = self.flights.len(),
            visits = self.visits.len(),
            trips = self.trips.len(),
            base = ?self.base.as_ref().map(|a| a.ident.as_str()),
            "computed trips"
        );
    }

    fn compute_visits(&mut self) {
        self.visits.clear();
        let mut previous: Option<&FlightSummary> = None;
        for flight in &self.flights {
            let (Some(start), Some(_), Some(hobbs)) =
                (&flight.start_airport, &flight.end_airport, flight.hobbs)
            else {
                continue;
            };
            if flight.is_local() {
                continue;
            }
            if let Some(prev) = previous {
                if let (Some(arrived), Some(prev_hobbs)) = (&prev.end_airport, prev.hobbs) {
                    if arrived == start {
                        let nights = (hobbs.start.date_naive() - prev_hobbs.end.date_naive()).num_days();
                        self.visits.push(Visit {
                            airport: start.clone(),
                            arrival: prev_hobbs.end,
                            departure: hobbs.start,
                            nights,
                        });
                    }
                }
            }
            previous = Some(flight);
        }

        let mut nights: BTreeMap<&str, (i64, &Airport)> = BTreeMap::new();
        for visit in &self.visits {
            nights
                .entry(visit.airport.ident.as_str())
                .or_insert((0, &visit.airport))
                .0 += visit.nights;
        }
        let mut base: Option<(i64, &Airport)> = None;
        for (total, airport) in nights.values() {
            if *total > 0 && base.map_or(true, |(best, _)| *total > best) {
                base = Some((*total, *airport));
            }
        }
        self.base = base.map(|(_, airport)| airport.clone());
    }

    fn compute_trips(&mut self) {
        self.trips.clear();
        if self.aggregation == Aggregation::Trips && self.base.is_none() {
            return;
        }

        let mut trips = Vec::new();
        let mut current = Trip::new(self.aggregation, self.base.clone());
        for flight in &self.flights {
            match current.check(flight) {
                TripCheck::Ignore => continue,
                TripCheck::StartsTrip => {
                    let next = Trip::new(self.aggregation, self.base.clone());
                    trips.push(mem::replace(&mut current, next).closed());
                }
                TripCheck::SameTrip | TripCheck::EndsTrip => {}
            }
            if current.add(flight.clone()) {
                let next = Trip::new(self.aggregation, self.base.clone());
                trips.push(mem::replace(&mut current, next).closed());
            }
        }
        if !current.is_empty() {
            trips.push(current.closed());
        }
        trips.reverse();
        self.trips = trips;
    }
}
