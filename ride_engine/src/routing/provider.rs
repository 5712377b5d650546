use std::{sync::Arc, time::Duration};

use reqwest::header::CONTENT_TYPE;
use ride_tracker_lib::coordinates::Coordinates;
use serde::Deserialize;

use crate::{config::RoutingConfig, EngineError, RouteFetchError};

use super::RouteQuery;

/// A turn-by-turn routing service.
#[async_trait::async_trait]
pub trait RouteProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Full route geometry from the query's origin to its destination, as (lat, lon).
    async fn fetch(&self, query: &RouteQuery) -> Result<Vec<Coordinates>, RouteFetchError>;
}

/// OSRM compatible HTTP routing service.
pub struct OsrmRouteProvider {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl OsrmRouteProvider {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| EngineError::HttpClient(err.to_string()))?;

        Ok(Self::with_client(name, base_url, client))
    }

    pub fn with_client(name: impl Into<String>, base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn route_url(&self, query: &RouteQuery) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url, query.origin_lon, query.origin_lat, query.dest_lon, query.dest_lat
        )
    }
}

#[async_trait::async_trait]
impl RouteProvider for OsrmRouteProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, query: &RouteQuery) -> Result<Vec<Coordinates>, RouteFetchError> {
        let url = self.route_url(query);
        tracing::debug!("Requesting route from {}: {}", self.name, url);

        let response = self.client.get(&url).send().await
            .map_err(|err| RouteFetchError::Network(err.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response.headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let body = response.bytes().await
            .map_err(|err| RouteFetchError::Network(err.to_string()))?;

        parse_osrm_response(status, content_type.as_deref(), &body)
    }
}

#[derive(Deserialize)]
struct OsrmResponse {
    routes: Option<Vec<OsrmRoute>>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
}

#[derive(Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

/// Validates an OSRM reply and turns its `[lon, lat]` pairs into coordinates.
pub fn parse_osrm_response(status: u16, content_type: Option<&str>, body: &[u8]) -> Result<Vec<Coordinates>, RouteFetchError> {
    if !(200..300).contains(&status) {
        return Err(RouteFetchError::Status(status));
    }

    if !content_type.is_some_and(|ct| ct.contains("application/json")) {
        return Err(RouteFetchError::NotJson(content_type.map(str::to_owned)));
    }

    let response: OsrmResponse = serde_json::from_slice(body)
        .map_err(|err| RouteFetchError::Parse(err.to_string()))?;

    let Some(route) = response.routes.and_then(|routes| routes.into_iter().next()) else {
        return Err(RouteFetchError::NoRoutes);
    };

    if route.geometry.coordinates.is_empty() {
        return Err(RouteFetchError::NoRoutes);
    }

    Ok(route.geometry.coordinates.into_iter()
        .map(|[lon, lat]| Coordinates::new(lat, lon))
        .collect())
}

/// Primary provider with a fallback that is only asked when the primary fails.
#[derive(Clone)]
pub struct FallbackRouter {
    primary: Arc<dyn RouteProvider>,
    fallback: Arc<dyn RouteProvider>,
}

impl FallbackRouter {
    pub fn new(primary: Arc<dyn RouteProvider>, fallback: Arc<dyn RouteProvider>) -> Self {
        Self {
            primary,
            fallback,
        }
    }

    pub fn from_config(config: &RoutingConfig) -> Result<Self, EngineError> {
        let primary = OsrmRouteProvider::new("primary", &config.primary_url, config.request_timeout())?;
        let fallback = OsrmRouteProvider::new("fallback", &config.fallback_url, config.request_timeout())?;
        Ok(Self::new(Arc::new(primary), Arc::new(fallback)))
    }

    pub async fn fetch(&self, query: &RouteQuery) -> Result<Vec<Coordinates>, RouteFetchError> {
        match self.primary.fetch(query).await {
            Ok(geometry) => Ok(geometry),
            Err(err) => {
                tracing::warn!("Routing provider {} failed: {}. Trying {}", self.primary.name(), err, self.fallback.name());
                self.fallback.fetch(query).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    const OSRM_BODY: &str = r#"{"code":"Ok","routes":[{"geometry":{"coordinates":[[-47.0,-21.0],[-47.002,-21.001],[-47.005,-21.005]],"type":"LineString"},"distance":812.3,"duration":95.1}],"waypoints":[]}"#;

    #[test]
    fn swaps_lon_lat_pairs() {
        let geometry = parse_osrm_response(200, Some("application/json; charset=utf-8"), OSRM_BODY.as_bytes()).unwrap();
        assert_eq!(geometry, vec![
            Coordinates::new(-21.0, -47.0),
            Coordinates::new(-21.001, -47.002),
            Coordinates::new(-21.005, -47.005),
        ]);
    }

    #[test]
    fn rejects_failed_status() {
        assert_eq!(parse_osrm_response(502, Some("application/json"), OSRM_BODY.as_bytes()), Err(RouteFetchError::Status(502)));
    }

    #[test]
    fn rejects_html_error_pages() {
        let result = parse_osrm_response(200, Some("text/html"), b"<html>busy</html>");
        assert_eq!(result, Err(RouteFetchError::NotJson(Some("text/html".into()))));
        assert_eq!(parse_osrm_response(200, None, OSRM_BODY.as_bytes()), Err(RouteFetchError::NotJson(None)));
    }

    #[test]
    fn missing_routes_is_a_failure() {
        let no_route = r#"{"code":"NoRoute","message":"Impossible route"}"#;
        assert_eq!(parse_osrm_response(200, Some("application/json"), no_route.as_bytes()), Err(RouteFetchError::NoRoutes));
        assert_eq!(parse_osrm_response(200, Some("application/json"), br#"{"routes":[]}"#), Err(RouteFetchError::NoRoutes));
        assert!(matches!(parse_osrm_response(200, Some("application/json"), b"{"), Err(RouteFetchError::Parse(_))));
    }

    #[test]
    fn url_is_lon_lat_ordered() {
        let provider = OsrmRouteProvider::with_client("test", "https://router.example/", reqwest::Client::new());
        let query = RouteQuery::new(Coordinates::new(-21., -47.), Coordinates::new(-21.005, -47.005));
        assert_eq!(
            provider.route_url(&query),
            "https://router.example/route/v1/driving/-47,-21;-47.005,-21.005?overview=full&geometries=geojson"
        );
    }

    struct Scripted {
        name: &'static str,
        result: Result<Vec<Coordinates>, RouteFetchError>,
        calls: Mutex<Vec<RouteQuery>>,
    }

    #[async_trait::async_trait]
    impl RouteProvider for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, query: &RouteQuery) -> Result<Vec<Coordinates>, RouteFetchError> {
            self.calls.lock().unwrap().push(*query);
            self.result.clone()
        }
    }

    fn scripted(name: &'static str, result: Result<Vec<Coordinates>, RouteFetchError>) -> Arc<Scripted> {
        Arc::new(Scripted { name, result, calls: Mutex::new(Vec::new()) })
    }

    #[tokio::test]
    async fn fallback_gets_same_query_when_primary_fails() {
        let primary = scripted("primary", Err(RouteFetchError::Status(503)));
        let fallback = scripted("fallback", Ok(vec![Coordinates::new(1., 2.)]));
        let router = FallbackRouter::new(primary.clone(), fallback.clone());
        let query = RouteQuery::new(Coordinates::new(-21., -47.), Coordinates::new(-21.005, -47.005));

        assert_eq!(router.fetch(&query).await, Ok(vec![Coordinates::new(1., 2.)]));
        assert_eq!(*primary.calls.lock().unwrap(), vec![query]);
        assert_eq!(*fallback.calls.lock().unwrap(), vec![query]);
    }

    #[tokio::test]
    async fn fallback_untouched_when_primary_succeeds() {
        let primary = scripted("primary", Ok(vec![Coordinates::new(1., 2.)]));
        let fallback = scripted("fallback", Ok(vec![]));
        let router = FallbackRouter::new(primary.clone(), fallback.clone());
        let query = RouteQuery::new(Coordinates::new(0., 0.), Coordinates::new(1., 1.));

        router.fetch(&query).await.unwrap();
        assert!(fallback.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn both_failing_reports_fallback_error() {
        let router = FallbackRouter::new(
            scripted("primary", Err(RouteFetchError::Network("refused".into()))),
            scripted("fallback", Err(RouteFetchError::NoRoutes)),
        );
        let query = RouteQuery::new(Coordinates::new(0., 0.), Coordinates::new(1., 1.));
        assert_eq!(router.fetch(&query).await, Err(RouteFetchError::NoRoutes));
    }
}
