use serde::Serialize;
use thiserror::Error;

/// Why a position fix could not be obtained. Never ends the subscription.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LocationError {
    #[error("Permission to access the location was denied")]
    PermissionDenied,

    #[error("Location information is unavailable")]
    PositionUnavailable,

    #[error("Timed out waiting for a location fix")]
    Timeout,
}

/// A single routing provider failed. Absorbed by the resolver.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouteFetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Invalid content type (not JSON): {0:?}")]
    NotJson(Option<String>),

    #[error("Malformed response: {0}")]
    Parse(String),

    #[error("Response contained no routes")]
    NoRoutes,
}

/// Geocoding failed or matched nothing. Callers only ever see an empty result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeocodeError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Malformed response: {0}")]
    Parse(String),

    #[error("No match")]
    NoMatch,
}

/// Errors from setting the engine up. Runtime failures never surface as these.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to read config {path}: {reason}")]
    Config { path: String, reason: String },

    #[error("Failed to load GPX track {path}: {reason}")]
    Gpx { path: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("Ride tracker is no longer running")]
    TrackerStopped,
}
