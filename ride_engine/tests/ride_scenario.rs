use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use approx::assert_relative_eq;
use chrono::{DateTime, Utc};
use geo::Rect;
use ride_engine::{
    config::EngineConfig,
    geocode::{AddressSuggestion, GeocodeGateway, PlaceAddress},
    position::{ChannelPositionProvider, PositionEvent, WatchOptions},
    routing::{FallbackRouter, RouteProvider, RouteQuery, RouteResolver},
    viewport::{FitOptions, MapCanvas, OverlayFrame},
    DistanceAccumulator, RideTracker, RideTrackerHandle, RouteFetchError, TrackerSnapshot,
};
use ride_tracker_lib::{
    coordinates::Coordinates,
    position_sample::PositionSample,
    ride::{Destination, RideRecord},
};

const START: Coordinates = Coordinates { latitude: -21., longitude: -47. };
const DESTINATION: Coordinates = Coordinates { latitude: -21.005, longitude: -47.005 };

/// Answers with a two point route from the query origin, counting calls.
#[derive(Default)]
struct CountingProvider {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait::async_trait]
impl RouteProvider for CountingProvider {
    fn name(&self) -> &str {
        "counting"
    }

    async fn fetch(&self, query: &RouteQuery) -> Result<Vec<Coordinates>, RouteFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RouteFetchError::Status(503));
        }
        Ok(vec![query.origin(), query.destination()])
    }
}

struct NoGeocoder;

#[async_trait::async_trait]
impl GeocodeGateway for NoGeocoder {
    async fn suggest(&self, _query: &str, _city: &str) -> Vec<AddressSuggestion> {
        Vec::new()
    }

    async fn locate(&self, _address: &str, _city: &str) -> Option<Coordinates> {
        None
    }

    async fn reverse(&self, _coordinates: Coordinates) -> Option<PlaceAddress> {
        None
    }
}

struct NullCanvas;

impl MapCanvas for NullCanvas {
    fn fit_bounds(&mut self, _bounds: Rect<f64>, _options: FitOptions) {}

    fn render(&mut self, _frame: &OverlayFrame) {}
}

fn north_of(origin: Coordinates, meters: f64) -> Coordinates {
    Coordinates::new(origin.latitude + meters / 111_195., origin.longitude)
}

fn sample(coordinates: Coordinates, second: i64) -> PositionSample {
    PositionSample::at(coordinates, DateTime::from_timestamp(second, 0).unwrap())
}

fn fix(coordinates: Coordinates, second: i64) -> PositionEvent {
    Ok(sample(coordinates, second))
}

fn start_ride(primary: Arc<CountingProvider>, fallback: Arc<CountingProvider>, destination: Destination, start: Option<Coordinates>) -> (tokio::sync::mpsc::Sender<PositionEvent>, RideTrackerHandle, tokio::task::JoinHandle<RideRecord>) {
    let ride = RideRecord::new("Ana".into(), destination, "driver-1".into(), 25., Utc::now(), start);
    let router = FallbackRouter::new(primary, fallback);
    let tracker = RideTracker::new(ride, None, router, Arc::new(NoGeocoder), NullCanvas, &EngineConfig::default());

    let (fixes, provider) = ChannelPositionProvider::new(16);
    let (handle, task) = tracker.spawn(provider, WatchOptions::default());
    (fixes, handle, task)
}

async fn wait_until(handle: &RideTrackerHandle, condition: impl FnMut(&TrackerSnapshot) -> bool) -> TrackerSnapshot {
    let mut snapshots = handle.snapshots();
    let snapshot = tokio::time::timeout(Duration::from_secs(5), snapshots.wait_for(condition))
        .await
        .expect("tracker did not reach the expected state")
        .expect("tracker stopped");
    snapshot.clone()
}

#[test]
fn three_fixes_fifty_meters_apart() {
    let path = [sample(START, 0), sample(north_of(START, 50.), 1), sample(north_of(START, 100.), 2)];

    let mut one_by_one = DistanceAccumulator::new();
    for sample in path {
        one_by_one.add_sample(sample);
    }

    let mut batch = DistanceAccumulator::new();
    batch.replay(path.iter());

    assert_relative_eq!(one_by_one.total_km(), 0.1, max_relative = 0.01);
    assert_eq!(one_by_one.total_km(), batch.total_km());
}

#[tokio::test]
async fn route_is_refreshed_only_after_real_movement() {
    let provider = Arc::new(CountingProvider::default());
    let router = FallbackRouter::new(provider.clone(), provider.clone());
    let mut resolver = RouteResolver::default();

    assert!(resolver.resolve(&router, START, DESTINATION).await.is_some());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    resolver.resolve(&router, north_of(START, 10.), DESTINATION).await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert_eq!(resolver.reference_origin(), Some(START));

    resolver.resolve(&router, north_of(START, 40.), DESTINATION).await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    assert_eq!(resolver.reference_origin(), Some(north_of(START, 40.)));
}

#[tokio::test]
async fn live_ride_end_to_end() {
    let primary = Arc::new(CountingProvider::default());
    let fallback = Arc::new(CountingProvider::default());
    let destination = Destination::new("Rua Dois", "Guaxupé").with_coordinates(DESTINATION);
    let (fixes, handle, task) = start_ride(primary.clone(), fallback.clone(), destination, None);

    fixes.send(fix(START, 1)).await.unwrap();
    let snapshot = wait_until(&handle, |s| s.route.is_some()).await;
    assert_eq!(snapshot.route, Some(vec![START, DESTINATION]));
    assert_eq!(primary.calls.load(Ordering::SeqCst), 1);

    fixes.send(fix(north_of(START, 10.), 2)).await.unwrap();
    wait_until(&handle, |s| s.samples == 2).await;
    assert_eq!(primary.calls.load(Ordering::SeqCst), 1);

    fixes.send(fix(north_of(START, 40.), 3)).await.unwrap();
    let snapshot = wait_until(&handle, |s| s.route.as_ref().is_some_and(|route| route[0] == north_of(START, 40.))).await;
    assert_eq!(primary.calls.load(Ordering::SeqCst), 2);
    assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    assert_relative_eq!(snapshot.distance_km, 0.04, max_relative = 0.01);
    assert_relative_eq!(snapshot.heading, 0., epsilon = 1e-6);

    // Out of order fixes never reach the tracker
    fixes.send(fix(north_of(START, 500.), 2)).await.unwrap();
    fixes.send(fix(north_of(START, 50.), 4)).await.unwrap();
    let snapshot = wait_until(&handle, |s| s.samples == 4).await;
    assert_eq!(snapshot.position, Some(north_of(START, 50.)));

    handle.end_ride().await.unwrap();
    let record = task.await.unwrap();
    assert_relative_eq!(record.distance, 0.05, max_relative = 0.01);
    assert!(record.is_finished());
    assert_eq!(record.destination, Destination::new("Rua Dois", "Guaxupé").with_coordinates(DESTINATION));
}

#[tokio::test]
async fn changing_destination_fetches_a_new_route() {
    let primary = Arc::new(CountingProvider::default());
    let fallback = Arc::new(CountingProvider::default());
    let destination = Destination::new("Rua Dois", "Guaxupé").with_coordinates(DESTINATION);
    let (fixes, handle, _task) = start_ride(primary.clone(), fallback, destination, Some(START));

    wait_until(&handle, |s| s.route.is_some()).await;
    fixes.send(fix(START, 1)).await.unwrap();
    wait_until(&handle, |s| s.samples == 1).await;
    assert_eq!(primary.calls.load(Ordering::SeqCst), 1);

    let elsewhere = Coordinates::new(-21.02, -47.01);
    handle.update_destination(Destination::new("Rua Três", "Guaxupé").with_coordinates(elsewhere)).await.unwrap();
    let snapshot = wait_until(&handle, |s| s.route.as_ref().is_some_and(|route| route.last() == Some(&elsewhere))).await;

    assert_eq!(snapshot.route, Some(vec![START, elsewhere]));
    assert_eq!(primary.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn fallback_serves_when_primary_is_down() {
    let primary = Arc::new(CountingProvider { fail: true, ..Default::default() });
    let fallback = Arc::new(CountingProvider::default());
    let destination = Destination::new("Rua Dois", "Guaxupé").with_coordinates(DESTINATION);
    let (_fixes, handle, _task) = start_ride(primary.clone(), fallback.clone(), destination, Some(START));

    let snapshot = wait_until(&handle, |s| s.route.is_some()).await;
    assert_eq!(snapshot.route, Some(vec![START, DESTINATION]));
    assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
}
