use std::{path::Path, time::Duration};

use const_format::concatcp;
use serde::{Deserialize, Serialize};

use crate::EngineError;

pub const PRIMARY_ROUTING_URL: &str = "https://routing.openstreetmap.de/routed-car";
pub const FALLBACK_ROUTING_URL: &str = "https://router.project-osrm.org";
pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

pub const ROUTE_STABILIZATION_METERS: f64 = 30.;
pub const POSITION_TIMEOUT_MS: u64 = 10_000;

pub const VIEWPORT_PADDING_PX: u32 = 80;
pub const VIEWPORT_MAX_ZOOM: u8 = 17;
pub const ROUTE_SAMPLE_STRIDE: usize = 10;

pub const USER_AGENT: &str = concatcp!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub routing: RoutingConfig,
    pub geocoding: GeocodingConfig,
    pub position: PositionConfig,
    pub viewport: ViewportConfig,
}

impl EngineConfig {
    /// Reads a JSON config. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| EngineError::Config { path: path.display().to_string(), reason: err.to_string() })?;

        serde_json::from_str(&text)
            .map_err(|err| EngineError::Config { path: path.display().to_string(), reason: err.to_string() })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub primary_url: String,
    pub fallback_url: String,
    /// Minimum origin displacement before a route is fetched again.
    pub stabilization_meters: f64,
    pub request_timeout_ms: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            primary_url: PRIMARY_ROUTING_URL.into(),
            fallback_url: FALLBACK_ROUTING_URL.into(),
            stabilization_meters: ROUTE_STABILIZATION_METERS,
            request_timeout_ms: 15_000,
        }
    }
}

impl RoutingConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub base_url: String,
    /// Appended to every free-text query.
    pub country: String,
    pub country_code: String,
    pub user_agent: String,
    pub suggestion_limit: u8,
    pub request_timeout_ms: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: NOMINATIM_URL.into(),
            country: "Brazil".into(),
            country_code: "br".into(),
            user_agent: USER_AGENT.into(),
            suggestion_limit: 5,
            request_timeout_ms: 10_000,
        }
    }
}

impl GeocodingConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionConfig {
    pub high_accuracy: bool,
    /// Oldest cached fix the platform may return. 0 forces a fresh fix.
    pub maximum_age_ms: u64,
    pub timeout_ms: u64,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            maximum_age_ms: 0,
            timeout_ms: POSITION_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub padding_px: u32,
    pub max_zoom: u8,
    pub route_sample_stride: usize,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            padding_px: VIEWPORT_PADDING_PX,
            max_zoom: VIEWPORT_MAX_ZOOM,
            route_sample_stride: ROUTE_SAMPLE_STRIDE,
        }
    }
}

#[test]
fn partial_config_keeps_defaults() {
    let config: EngineConfig = serde_json::from_str(r#"{ "routing": { "stabilization_meters": 50.0 }, "viewport": { "max_zoom": 15 } }"#).unwrap();

    assert_eq!(config.routing.stabilization_meters, 50.);
    assert_eq!(config.routing.primary_url, PRIMARY_ROUTING_URL);
    assert_eq!(config.viewport.max_zoom, 15);
    assert_eq!(config.viewport.padding_px, VIEWPORT_PADDING_PX);
    assert_eq!(config.position, PositionConfig::default());
}

#[test]
fn missing_config_file_is_reported() {
    let err = EngineConfig::load("does/not/exist.json").unwrap_err();
    assert!(matches!(err, EngineError::Config { .. }));
}
