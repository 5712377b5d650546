use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coordinates::Coordinates;

/// One fix from the device position stream. Never mutated after creation.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

impl PositionSample {
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
        }
    }

    pub fn at(coordinates: Coordinates, timestamp: DateTime<Utc>) -> Self {
        Self::new(coordinates.latitude, coordinates.longitude, timestamp)
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Parses the `latitude,longitude,unix_millis` line format used by host integrations.
impl FromStr for PositionSample {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split(',').map(str::trim);

        let (Some(lat), Some(lon), Some(millis), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
            return Err("Expected latitude,longitude,unix_millis");
        };

        let latitude = lat.parse::<f64>().map_err(|_| "Latitude is not a number")?;
        let longitude = lon.parse::<f64>().map_err(|_| "Longitude is not a number")?;
        let millis = millis.parse::<i64>().map_err(|_| "Timestamp is not an integer")?;
        let timestamp = DateTime::from_timestamp_millis(millis).ok_or("Timestamp out of range")?;

        Ok(Self::new(latitude, longitude, timestamp))
    }
}

#[test]
fn parse_sample_line() {
    let sample: PositionSample = "-21.0, -47.0, 1700000000000".parse().unwrap();
    assert_eq!(sample.latitude, -21.0);
    assert_eq!(sample.longitude, -47.0);
    assert_eq!(sample.timestamp.timestamp(), 1_700_000_000);
}

#[test]
fn parse_rejects_malformed_lines() {
    assert!("-21.0,-47.0".parse::<PositionSample>().is_err());
    assert!("a,b,c".parse::<PositionSample>().is_err());
    assert!("1,2,3,4".parse::<PositionSample>().is_err());
}

#[test]
fn samples_serialize_with_flat_fields() {
    let sample = PositionSample::new(1.5, 2.5, DateTime::from_timestamp(10, 0).unwrap());
    let json = serde_json::to_value(sample).unwrap();
    assert_eq!(json["latitude"], 1.5);
    assert_eq!(json["longitude"], 2.5);
}
