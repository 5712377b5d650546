mod provider;
mod resolver;

use ride_tracker_lib::coordinates::Coordinates;
use serde::{Deserialize, Serialize};

pub use provider::{parse_osrm_response, FallbackRouter, OsrmRouteProvider, RouteProvider};
pub use resolver::{ResolverState, RouteOutcome, RouteRequest, RouteResolver, Skip};

/// Parameters of one fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteQuery {
    pub origin_lat: f64,
    pub origin_lon: f64,
    pub dest_lat: f64,
    pub dest_lon: f64,
}

impl RouteQuery {
    pub fn new(origin: Coordinates, destination: Coordinates) -> Self {
        Self {
            origin_lat: origin.latitude,
            origin_lon: origin.longitude,
            dest_lat: destination.latitude,
            dest_lon: destination.longitude,
        }
    }

    pub fn origin(&self) -> Coordinates {
        Coordinates::new(self.origin_lat, self.origin_lon)
    }

    pub fn destination(&self) -> Coordinates {
        Coordinates::new(self.dest_lat, self.dest_lon)
    }
}

/// A routed polyline together with the origin and destination it was fetched for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    pub geometry: Vec<Coordinates>,
    pub fetched_at_origin: Coordinates,
    pub destination: Coordinates,
}
