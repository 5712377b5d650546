use ride_tracker_lib::coordinates::Coordinates;

use crate::{config::ROUTE_STABILIZATION_METERS, geo_math::haversine_m, RouteFetchError};

use super::{FallbackRouter, RouteQuery, RouteResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    Idle,
    Fetching { generation: u64 },
}

/// A fetch the caller should perform and hand back to [`RouteResolver::complete`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteRequest {
    pub generation: u64,
    pub query: RouteQuery,
}

/// Why [`RouteResolver::plan`] decided not to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    InvalidCoordinates,
    /// Origin is within the stabilization radius of the last successful fetch.
    WithinStabilization,
    /// A fetch for practically the same query is already in flight.
    AlreadyFetching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Succeeded,
    Failed,
    /// The response belonged to a superseded request and was ignored.
    Discarded,
}

/// Owns the cached route and decides when it is worth fetching a new one.
///
/// Every issued request carries a generation number. Only a completion for the
/// latest generation may touch the cache, so a slow response for an old origin
/// or an old destination can never overwrite a newer result.
#[derive(Debug, Clone)]
pub struct RouteResolver {
    stabilization_meters: f64,
    state: ResolverState,
    generation: u64,
    cached: Option<RouteResult>,
    /// Origin of the last successful fetch for `destination`.
    reference: Option<Coordinates>,
    destination: Option<Coordinates>,
    pending: Option<RouteQuery>,
}

impl Default for RouteResolver {
    fn default() -> Self {
        Self::new(ROUTE_STABILIZATION_METERS)
    }
}

impl RouteResolver {
    pub fn new(stabilization_meters: f64) -> Self {
        Self {
            stabilization_meters,
            state: ResolverState::Idle,
            generation: 0,
            cached: None,
            reference: None,
            destination: None,
            pending: None,
        }
    }

    /// Decides whether a fetch is needed. Moves to `Fetching` when it is, superseding
    /// any request still in flight.
    pub fn plan(&mut self, origin: Coordinates, destination: Coordinates) -> Result<RouteRequest, Skip> {
        if !origin.is_finite() || !destination.is_finite() {
            return Err(Skip::InvalidCoordinates);
        }

        if self.destination != Some(destination) {
            if self.destination.is_some() {
                tracing::debug!("Route destination changed, dropping suppression reference");
            }
            self.destination = Some(destination);
            self.reference = None;
        }

        if let Some(reference) = self.reference {
            let moved = haversine_m(origin, reference);
            if moved < self.stabilization_meters {
                tracing::trace!("Moved {:.1} m since last route, keeping it", moved);
                return Err(Skip::WithinStabilization);
            }
        }

        if let Some(pending) = &self.pending {
            if pending.destination() == destination && haversine_m(pending.origin(), origin) < self.stabilization_meters {
                return Err(Skip::AlreadyFetching);
            }
        }

        self.generation += 1;
        let query = RouteQuery::new(origin, destination);
        self.pending = Some(query);
        self.state = ResolverState::Fetching { generation: self.generation };

        tracing::debug!("Route request {} issued", self.generation);
        Ok(RouteRequest {
            generation: self.generation,
            query,
        })
    }

    /// Settles a request. Always leaves the resolver `Idle` when the generation is current.
    pub fn complete(&mut self, generation: u64, outcome: Result<Vec<Coordinates>, RouteFetchError>) -> RouteOutcome {
        if self.state != (ResolverState::Fetching { generation }) {
            tracing::debug!("Discarding response for superseded route request {}", generation);
            return RouteOutcome::Discarded;
        }

        self.state = ResolverState::Idle;
        let Some(query) = self.pending.take() else {
            return RouteOutcome::Discarded;
        };

        match outcome {
            Ok(geometry) => {
                tracing::info!("Route updated with {} points", geometry.len());
                self.cached = Some(RouteResult {
                    geometry,
                    fetched_at_origin: query.origin(),
                    destination: query.destination(),
                });
                self.reference = Some(query.origin());
                RouteOutcome::Succeeded
            }
            Err(err) => {
                tracing::error!("Route unavailable from every provider: {}. Keeping previous route", err);
                RouteOutcome::Failed
            }
        }
    }

    /// Plans, fetches and completes in one go. Only ever returns a route to `destination`.
    pub async fn resolve(&mut self, router: &FallbackRouter, origin: Coordinates, destination: Coordinates) -> Option<&RouteResult> {
        if let Ok(request) = self.plan(origin, destination) {
            let outcome = router.fetch(&request.query).await;
            self.complete(request.generation, outcome);
        }
        self.route_to(destination)
    }

    /// Forgets the destination and the suppression reference, and orphans any in-flight request.
    /// The cached route is kept but no longer matches the new destination.
    pub fn invalidate_destination(&mut self) {
        self.destination = None;
        self.reference = None;
        self.cancel();
    }

    /// Orphans any in-flight request so its response will be discarded.
    pub fn cancel(&mut self) {
        self.generation += 1;
        self.pending = None;
        self.state = ResolverState::Idle;
    }

    pub fn current(&self) -> Option<&RouteResult> {
        self.cached.as_ref()
    }

    /// The cached route, but only if it was fetched for `destination`.
    pub fn route_to(&self, destination: Coordinates) -> Option<&RouteResult> {
        self.cached.as_ref().filter(|route| route.destination == destination)
    }

    pub fn reference_origin(&self) -> Option<Coordinates> {
        self.reference
    }

    pub fn state(&self) -> ResolverState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
