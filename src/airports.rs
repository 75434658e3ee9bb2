use std::collections::HashMap;

use crate::models::{Airport, Coordinate};

/// Resolves coordinates and identifiers to airports.
///
/// The host usually backs this with its airport database; [`KnownAirports`]
/// is an in-memory implementation for small tables and tests.
pub trait AirportLocator {
    fn nearest(&self, coordinate: &Coordinate) -> Option<Airport>;
    fn airport(&self, ident: &str) -> Option<Airport>;
}

#[derive(Debug, Clone, Default)]
pub struct KnownAirports {
    airports: Vec<Airport>,
    by_ident: HashMap<String, usize>,
}

impl KnownAirports {
    pub fn new(airports: Vec<Airport>) -> Self {
        let by_ident = airports
            .iter()
            .enumerate()
            .map(|(i, a)| (a.ident.clone(), i))
            .collect();
        Self { airports, by_ident }
    }

    pub fn len(&self) -> usize {
        self.airports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.airports.is_empty()
    }
}

impl AirportLocator for KnownAirports {
    fn nearest(&self, coordinate: &Coordinate) -> Option<Airport> {
        if !coordinate.is_valid() {
            return None;
        }
        self.airports
            .iter()
            .map(|a| (a.coordinate.distance_nm(coordinate), a))
            .filter(|(d, _)| d.is_finite())
            .min_by(|(a, _), (b, _)| a.total_cmp(b))
            .map(|(_, a)| a.clone())
    }

    fn airport(&self, ident: &str) -> Option<Airport> {
        self.by_ident.get(ident).map(|&i| self.airports[i].clone())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_nearest_airport() {
        let airports = create_test_airports();
        let near_fairoaks = Coordinate::new(51.35, -0.56);
        assert_eq!(airports.nearest(&near_fairoaks).unwrap().ident, "EGTF");

        let near_le_touquet = Coordinate::new(50.5, 1.6);
        assert_eq!(airports.nearest(&near_le_touquet).unwrap().ident, "LFAT");
    }

    #[test]
    fn test_nearest_requires_valid_coordinate() {
        let airports = create_test_airports();
        assert!(airports.nearest(&Coordinate::INVALID).is_none());
        assert!(KnownAirports::default()
            .nearest(&Coordinate::new(51.0, 0.0))
            .is_none());
    }

    #[test]
    fn test_lookup_by_ident() {
        let airports = create_test_airports();
        assert_eq!(airports.len(), 4);
        assert_eq!(airports.airport("EGKA").unwrap().name, "EGKA airport");
        assert!(airports.airport("KSFO").is_none());
    }
}
