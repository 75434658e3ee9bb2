use std::fmt;
use std::ops::Sub;

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_M: f64 = 6_371_000.0;
const METERS_PER_NM: f64 = 1852.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const INVALID: Coordinate = Coordinate {
        latitude: f64::NAN,
        longitude: f64::NAN,
    };

    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Finite and within the lat/lon ranges. A 0,0 fix is what recorders
    /// emit before the GPS locks, so it counts as invalid.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && !(self.latitude == 0.0 && self.longitude == 0.0)
    }

    /// Great-circle distance in nautical miles (haversine).
    pub fn distance_nm(&self, other: &Coordinate) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_M * c / METERS_PER_NM
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Airport {
    pub ident: String,
    pub name: String,
    pub coordinate: Coordinate,
}

impl PartialEq for Airport {
    fn eq(&self, other: &Self) -> bool {
        self.ident == other.ident
    }
}

impl Eq for Airport {}

/// A named route point from the `AtvWpt` channel.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Waypoint(String);

impl Waypoint {
    /// `None` for blank identifiers.
    pub fn new(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Placeholder for legs with no active waypoint.
    pub fn unnamed() -> Self {
        Self("-".to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Waypoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fuel on board in gallons.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FuelQuantity {
    pub left: f64,
    pub right: f64,
}

impl FuelQuantity {
    pub const ZERO: FuelQuantity = FuelQuantity {
        left: 0.0,
        right: 0.0,
    };

    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    /// Split a total evenly across both tanks.
    pub fn from_total(total: f64) -> Self {
        Self {
            left: total / 2.0,
            right: total / 2.0,
        }
    }

    pub fn total(&self) -> f64 {
        self.left + self.right
    }
}

impl Sub for FuelQuantity {
    type Output = FuelQuantity;

    fn sub(self, rhs: FuelQuantity) -> FuelQuantity {
        FuelQuantity {
            left: self.left - rhs.left,
            right: self.right - rhs.right,
        }
    }
}
