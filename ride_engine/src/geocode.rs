use ride_tracker_lib::coordinates::Coordinates;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{config::GeocodingConfig, EngineError, GeocodeError};

const MIN_QUERY_LENGTH: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressSuggestion {
    pub description: String,
}

/// Street and city for a coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceAddress {
    pub address: String,
    pub city: String,
}

/// Forward and reverse address resolution. Failures come back as empty results.
#[async_trait::async_trait]
pub trait GeocodeGateway: Send + Sync {
    /// Street name candidates for a partially typed address.
    async fn suggest(&self, query: &str, city: &str) -> Vec<AddressSuggestion>;

    async fn locate(&self, address: &str, city: &str) -> Option<Coordinates>;

    async fn reverse(&self, coordinates: Coordinates) -> Option<PlaceAddress>;
}

/// Nominatim (OpenStreetMap) backed gateway.
pub struct NominatimGateway {
    config: GeocodingConfig,
    client: reqwest::Client,
}

impl NominatimGateway {
    pub fn new(config: GeocodingConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| EngineError::HttpClient(err.to_string()))?;

        Ok(Self {
            config,
            client,
        })
    }

    fn full_query(&self, text: &str, city: &str) -> String {
        format!("{}, {}, {}", text, city, self.config.country)
    }

    async fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<Value, GeocodeError> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        let response = self.client.get(&url).query(params).send().await
            .map_err(|err| GeocodeError::Network(err.to_string()))?;

        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status().as_u16()));
        }

        response.json::<Value>().await.map_err(|err| GeocodeError::Parse(err.to_string()))
    }

    async fn try_suggest(&self, query: &str, city: &str) -> Result<Vec<AddressSuggestion>, GeocodeError> {
        let data = self.get_json("search", &[
            ("format", "jsonv2".into()),
            ("q", self.full_query(query, city)),
            ("addressdetails", "1".into()),
            ("limit", self.config.suggestion_limit.to_string()),
            ("countrycodes", self.config.country_code.clone()),
        ]).await?;

        parse_suggestions(&data)
    }

    async fn try_locate(&self, address: &str, city: &str) -> Result<Coordinates, GeocodeError> {
        let data = self.get_json("search", &[
            ("format", "jsonv2".into()),
            ("q", self.full_query(address, city)),
            ("limit", "1".into()),
            ("countrycodes", self.config.country_code.clone()),
        ]).await?;

        parse_first_coordinates(&data)
    }

    async fn try_reverse(&self, coordinates: Coordinates) -> Result<PlaceAddress, GeocodeError> {
        let data = self.get_json("reverse", &[
            ("format", "jsonv2".into()),
            ("lat", coordinates.latitude.to_string()),
            ("lon", coordinates.longitude.to_string()),
        ]).await?;

        parse_reverse(&data)
    }
}

#[async_trait::async_trait]
impl GeocodeGateway for NominatimGateway {
    async fn suggest(&self, query: &str, city: &str) -> Vec<AddressSuggestion> {
        if query.chars().count() < MIN_QUERY_LENGTH {
            return Vec::new();
        }

        self.try_suggest(query, city).await.unwrap_or_else(|err| {
            tracing::warn!("Address suggestions for '{}' failed: {}", query, err);
            Vec::new()
        })
    }

    async fn locate(&self, address: &str, city: &str) -> Option<Coordinates> {
        match self.try_locate(address, city).await {
            Ok(coordinates) => Some(coordinates),
            Err(err) => {
                tracing::warn!("Could not locate '{}, {}': {}", address, city, err);
                None
            }
        }
    }

    async fn reverse(&self, coordinates: Coordinates) -> Option<PlaceAddress> {
        self.try_reverse(coordinates).await
            .inspect_err(|err| tracing::warn!("Reverse geocoding {:?} failed: {}", coordinates, err))
            .ok()
    }
}

fn field<'a>(object: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| object.get(*key).and_then(Value::as_str))
        .find(|value| !value.is_empty())
}

fn first_display_part(item: &Value) -> Option<&str> {
    item.get("display_name")
        .and_then(Value::as_str)
        .and_then(|name| name.split(',').next())
        .map(str::trim)
}

/// Street names only, so the driver can type the house number themselves.
pub fn parse_suggestions(data: &Value) -> Result<Vec<AddressSuggestion>, GeocodeError> {
    let items = data.as_array().ok_or_else(|| GeocodeError::Parse("Expected a list of places".into()))?;

    Ok(items.iter()
        .filter_map(|item| {
            item.get("address")
                .and_then(|address| field(address, &["road", "pedestrian", "highway", "square"]))
                .or_else(|| field(item, &["name"]))
                .or_else(|| first_display_part(item))
        })
        .map(|street| AddressSuggestion { description: street.to_string() })
        .collect())
}

pub fn parse_first_coordinates(data: &Value) -> Result<Coordinates, GeocodeError> {
    let first = data.as_array()
        .and_then(|items| items.first())
        .ok_or(GeocodeError::NoMatch)?;

    // Nominatim sends coordinates as strings
    let number = |key: &str| -> Result<f64, GeocodeError> {
        first.get(key)
            .and_then(Value::as_str)
            .and_then(|value| value.parse::<f64>().ok())
            .ok_or_else(|| GeocodeError::Parse(format!("Missing or invalid '{}'", key)))
    };

    Ok(Coordinates::new(number("lat")?, number("lon")?))
}

pub fn parse_reverse(data: &Value) -> Result<PlaceAddress, GeocodeError> {
    let Some(address) = data.get("address") else {
        return Err(GeocodeError::NoMatch);
    };

    let street = field(address, &["road", "pedestrian", "highway", "square", "suburb"])
        .or_else(|| first_display_part(data))
        .unwrap_or_default();
    let city = field(address, &["city", "town", "village", "municipality", "administrative"])
        .unwrap_or_default();

    Ok(PlaceAddress {
        address: street.to_string(),
        city: city.to_string(),
    })
}
