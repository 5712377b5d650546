use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coordinates::Coordinates;

/// Where the passenger is going. `resolved` is filled in once the address has been geocoded.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Destination {
    pub address: String,
    pub city: String,
    pub resolved: Option<Coordinates>,
}

impl Destination {
    pub fn new(address: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            city: city.into(),
            resolved: None,
        }
    }

    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.resolved = Some(coordinates);
        self
    }

    /// Same address and city, ignoring resolution state.
    pub fn same_place(&self, other: &Destination) -> bool {
        self.address == other.address && self.city == other.city
    }
}

/// The ride as handed over by the booking screens.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RideRecord {
    pub ride_id: Option<String>,
    pub passenger_name: String,
    pub destination: Destination,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Kilometers. Authoritative once `end_time` is set.
    pub distance: f64,
    pub fare: f64,
    pub driver_id: String,
    pub start_location: Option<Coordinates>,
}

impl RideRecord {
    pub fn new(passenger_name: String, destination: Destination, driver_id: String, fare: f64, start_time: DateTime<Utc>, start_location: Option<Coordinates>) -> Self {
        Self {
            ride_id: None,
            passenger_name,
            destination,
            start_time,
            end_time: None,
            distance: 0.,
            fare,
            driver_id,
            start_location,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    /// Freezes the ride. Later calls keep the first end time and distance.
    pub fn finish(&mut self, end_time: DateTime<Utc>, distance: f64) {
        if self.is_finished() {
            return;
        }
        self.end_time = Some(end_time);
        self.distance = distance;
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.end_time.map(|end| end.signed_duration_since(self.start_time))
    }
}

#[test]
fn finish_is_only_recorded_once() {
    let start = DateTime::from_timestamp(0, 0).unwrap();
    let mut ride = RideRecord::new("Ana".into(), Destination::new("Rua A", "Guaxupé"), "d1".into(), 25., start, None);
    assert!(!ride.is_finished());

    ride.finish(DateTime::from_timestamp(600, 0).unwrap(), 3.2);
    ride.finish(DateTime::from_timestamp(900, 0).unwrap(), 9.9);

    assert_eq!(ride.distance, 3.2);
    assert_eq!(ride.duration(), Some(chrono::Duration::seconds(600)));
}

#[test]
fn same_place_ignores_resolution() {
    let a = Destination::new("Rua A", "Guaxupé");
    let b = Destination::new("Rua A", "Guaxupé").with_coordinates(Coordinates::new(1., 2.));
    assert!(a.same_place(&b));
    assert!(!a.same_place(&Destination::new("Rua B", "Guaxupé")));
}
