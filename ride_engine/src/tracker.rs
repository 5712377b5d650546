use std::sync::Arc;

use chrono::Utc;
use ride_tracker_lib::{coordinates::Coordinates, driver::Driver, position_sample::PositionSample, ride::{Destination, RideRecord}};
use serde::Serialize;
use tokio::{sync::{mpsc, watch}, task::{AbortHandle, JoinHandle, JoinSet}};

use crate::{
    config::EngineConfig,
    geocode::GeocodeGateway,
    position::{PositionProvider, PositionSource, Subscription, WatchOptions},
    routing::{FallbackRouter, RouteOutcome, RouteResolver},
    session::TrackingSession,
    viewport::{Interaction, MapCanvas, Marker, OverlayFrame, RouteLine, VehicleMarker, ViewportController, ViewportMode},
    EngineError, LocationError, RouteFetchError,
};

const COMMAND_CAPACITY: usize = 32;

/// Requests from the ride screen.
#[derive(Debug, Clone)]
pub enum TrackerCommand {
    UpdateDestination(Destination),
    UserInteraction(Interaction),
    Recenter,
    EndRide,
}

/// What the ride screen displays. Published after every processed event.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TrackerSnapshot {
    pub distance_km: f64,
    pub heading: f64,
    pub position: Option<Coordinates>,
    pub samples: usize,
    pub destination: Option<Destination>,
    /// Routed geometry towards the current destination, if one has been fetched.
    pub route: Option<Vec<Coordinates>>,
    pub location_error: Option<LocationError>,
    pub viewport_mode: ViewportMode,
    pub position_stream_open: bool,
    pub finished: bool,
    pub final_distance_km: Option<f64>,
}

enum Completion {
    Route { generation: u64, outcome: Result<Vec<Coordinates>, RouteFetchError> },
    Destination { revision: u64, coordinates: Option<Coordinates> },
}

/// Cloneable remote control for a running [`RideTracker`].
#[derive(Clone)]
pub struct RideTrackerHandle {
    commands: mpsc::Sender<TrackerCommand>,
    snapshots: watch::Receiver<TrackerSnapshot>,
}

impl RideTrackerHandle {
    pub async fn send(&self, command: TrackerCommand) -> Result<(), EngineError> {
        self.commands.send(command).await.map_err(|_| EngineError::TrackerStopped)
    }

    pub async fn update_destination(&self, destination: Destination) -> Result<(), EngineError> {
        self.send(TrackerCommand::UpdateDestination(destination)).await
    }

    pub async fn user_interaction(&self, interaction: Interaction) -> Result<(), EngineError> {
        self.send(TrackerCommand::UserInteraction(interaction)).await
    }

    pub async fn recenter(&self) -> Result<(), EngineError> {
        self.send(TrackerCommand::Recenter).await
    }

    pub async fn end_ride(&self) -> Result<(), EngineError> {
        self.send(TrackerCommand::EndRide).await
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn snapshots(&self) -> watch::Receiver<TrackerSnapshot> {
        self.snapshots.clone()
    }
}

/// The live ride: one reactor that owns the tracking session, the route resolver
/// and the viewport, and reacts to fixes, operator commands and network results
/// strictly one at a time.
pub struct RideTracker<C: MapCanvas> {
    ride: RideRecord,
    driver_label: Option<String>,
    session: TrackingSession,
    resolver: RouteResolver,
    router: FallbackRouter,
    geocoder: Arc<dyn GeocodeGateway>,
    viewport: ViewportController<C>,
    destination: Destination,
    destination_revision: u64,
    route_task: Option<AbortHandle>,
    location_error: Option<LocationError>,
    position_stream_open: bool,
    snapshot_tx: watch::Sender<TrackerSnapshot>,
}

impl<C: MapCanvas + 'static> RideTracker<C> {
    pub fn new(ride: RideRecord, driver: Option<&Driver>, router: FallbackRouter, geocoder: Arc<dyn GeocodeGateway>, canvas: C, config: &EngineConfig) -> Self {
        let (snapshot_tx, _) = watch::channel(TrackerSnapshot::default());

        let tracker = Self {
            destination: ride.destination.clone(),
            ride,
            driver_label: driver.map(|driver| driver.name.clone()),
            session: TrackingSession::start(),
            resolver: RouteResolver::new(config.routing.stabilization_meters),
            router,
            geocoder,
            viewport: ViewportController::new(canvas, &config.viewport),
            destination_revision: 0,
            route_task: None,
            location_error: None,
            position_stream_open: true,
            snapshot_tx,
        };
        tracker.publish();
        tracker
    }

    /// Starts the position watch and runs the tracker on its own task.
    /// The task ends with the finished ride record.
    pub fn spawn<P: PositionProvider>(self, provider: P, options: WatchOptions) -> (RideTrackerHandle, JoinHandle<RideRecord>) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let handle = RideTrackerHandle {
            commands: commands_tx,
            snapshots: self.snapshot_tx.subscribe(),
        };

        let source = PositionSource::start(provider, options);
        let subscription = source.subscribe();
        let task = tokio::spawn(self.run(source, subscription, commands_rx));

        (handle, task)
    }

    /// Processes events until the ride is ended or every handle is dropped.
    pub async fn run(mut self, mut source: PositionSource, mut subscription: Subscription, mut commands: mpsc::Receiver<TrackerCommand>) -> RideRecord {
        let mut tasks: JoinSet<Completion> = JoinSet::new();

        tracing::info!("Ride started for {} to {}, {}", self.ride.passenger_name, self.destination.address, self.destination.city);
        self.viewport.set_start(self.ride.start_location);
        let destination = self.destination.clone();
        self.change_destination(destination, &mut tasks);
        self.publish();

        loop {
            tokio::select! {
                event = subscription.recv(), if self.position_stream_open => match event {
                    Some(Ok(sample)) => self.on_sample(sample, &mut tasks),
                    Some(Err(err)) => self.on_location_error(err),
                    None => {
                        tracing::info!("Position stream closed");
                        self.position_stream_open = false;
                        self.publish();
                    }
                },
                command = commands.recv() => match command {
                    Some(TrackerCommand::EndRide) | None => break,
                    Some(command) => self.on_command(command, &mut tasks),
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => match joined {
                    Ok(completion) => self.on_completion(completion, &mut tasks),
                    Err(err) if err.is_cancelled() => {}
                    Err(err) => tracing::error!("Background task failed: {}", err),
                },
            }
        }

        // Stop first so no fix can slip in after the distance is frozen
        subscription.stop();
        source.stop();
        self.resolver.cancel();
        tasks.abort_all();

        let final_distance = self.session.finish();
        self.ride.finish(Utc::now(), final_distance);
        tracing::info!("Ride finished after {} fixes, {:.3} km", self.session.path().len(), final_distance);

        self.position_stream_open = false;
        self.publish();
        self.ride
    }

    fn on_sample(&mut self, sample: PositionSample, tasks: &mut JoinSet<Completion>) {
        if !self.session.add_sample(sample) {
            return;
        }
        self.location_error = None;

        self.viewport.set_live_position(Some(sample.coordinates()));
        self.refresh_route(tasks);
        self.render();
        self.publish();
    }

    fn on_location_error(&mut self, err: LocationError) {
        self.location_error = Some(err);
        self.publish();
    }

    fn on_command(&mut self, command: TrackerCommand, tasks: &mut JoinSet<Completion>) {
        match command {
            TrackerCommand::UpdateDestination(destination) => {
                let unchanged = destination.same_place(&self.destination)
                    && destination.resolved.is_none_or(|resolved| Some(resolved) == self.destination.resolved);
                if unchanged {
                    tracing::debug!("Destination unchanged, keeping current route");
                } else {
                    self.change_destination(destination, tasks);
                }
            }
            TrackerCommand::UserInteraction(interaction) => self.viewport.on_user_interaction(interaction),
            TrackerCommand::Recenter => self.viewport.recenter(),
            TrackerCommand::EndRide => {}
        }
        self.publish();
    }

    fn on_completion(&mut self, completion: Completion, tasks: &mut JoinSet<Completion>) {
        match completion {
            Completion::Route { generation, outcome } => {
                match self.resolver.complete(generation, outcome) {
                    RouteOutcome::Succeeded => {
                        self.route_task = None;
                        let geometry = self.current_route().map(|route| route.to_vec()).unwrap_or_default();
                        self.viewport.set_route(&geometry);
                    }
                    RouteOutcome::Failed => self.route_task = None,
                    RouteOutcome::Discarded => return,
                }
            }
            Completion::Destination { revision, coordinates } => {
                if revision != self.destination_revision {
                    tracing::debug!("Ignoring geocode result for an outdated destination");
                    return;
                }
                let Some(coordinates) = coordinates else {
                    tracing::warn!("Destination '{}, {}' could not be located", self.destination.address, self.destination.city);
                    return;
                };

                self.destination.resolved = Some(coordinates);
                self.ride.destination.resolved = Some(coordinates);
                self.viewport.set_destination(Some(coordinates));
                self.refresh_route(tasks);
            }
        }

        self.render();
        self.publish();
    }

    fn change_destination(&mut self, destination: Destination, tasks: &mut JoinSet<Completion>) {
        tracing::info!("Destination set to {}, {}", destination.address, destination.city);

        self.destination_revision += 1;
        self.resolver.invalidate_destination();
        if let Some(task) = self.route_task.take() {
            task.abort();
        }

        self.ride.destination = destination.clone();
        self.destination = destination;
        self.viewport.set_route(&[]);
        self.viewport.set_destination(self.destination.resolved);

        if self.destination.resolved.is_some() {
            self.refresh_route(tasks);
        } else {
            let geocoder = self.geocoder.clone();
            let revision = self.destination_revision;
            let (address, city) = (self.destination.address.clone(), self.destination.city.clone());
            tasks.spawn(async move {
                let coordinates = geocoder.locate(&address, &city).await;
                Completion::Destination { revision, coordinates }
            });
        }

        self.render();
    }

    /// Asks the resolver whether the route needs refreshing and starts the fetch if so.
    fn refresh_route(&mut self, tasks: &mut JoinSet<Completion>) {
        let (Some(origin), Some(destination)) = (self.origin(), self.destination.resolved) else {
            return;
        };

        match self.resolver.plan(origin, destination) {
            Ok(request) => {
                if let Some(previous) = self.route_task.take() {
                    previous.abort();
                }

                let router = self.router.clone();
                self.route_task = Some(tasks.spawn(async move {
                    let outcome = router.fetch(&request.query).await;
                    Completion::Route { generation: request.generation, outcome }
                }));
            }
            Err(skip) => tracing::trace!("Route refresh skipped: {:?}", skip),
        }
    }

    /// Live position, or where the ride started before the first fix.
    fn origin(&self) -> Option<Coordinates> {
        self.session.last_sample()
            .map(PositionSample::coordinates)
            .or(self.ride.start_location)
    }

    fn current_route(&self) -> Option<&[Coordinates]> {
        let destination = self.destination.resolved?;
        self.resolver.route_to(destination).map(|route| route.geometry.as_slice())
    }

    fn render(&mut self) {
        let frame = OverlayFrame {
            start: self.ride.start_location.map(|position| Marker { position, label: None }),
            destination: self.destination.resolved.map(|position| Marker {
                position,
                label: Some(self.destination.address.clone()),
            }),
            vehicle: self.session.last_sample().map(|sample| VehicleMarker {
                position: sample.coordinates(),
                heading: self.session.heading(),
                label: self.driver_label.clone(),
            }),
            trail: self.session.path().iter().map(PositionSample::coordinates).collect(),
            route: RouteLine::choose(self.current_route(), self.origin(), self.destination.resolved),
        };

        self.viewport.render(&frame);
    }

    fn publish(&self) {
        let finished = !self.session.is_active();
        self.snapshot_tx.send_replace(TrackerSnapshot {
            distance_km: self.session.cumulative_distance_km(),
            heading: self.session.heading(),
            position: self.session.last_sample().map(PositionSample::coordinates),
            samples: self.session.path().len(),
            destination: Some(self.destination.clone()),
            route: self.current_route().map(<[Coordinates]>::to_vec),
            location_error: self.location_error,
            viewport_mode: self.viewport.mode(),
            position_stream_open: self.position_stream_open,
            finished,
            final_distance_km: finished.then(|| self.session.cumulative_distance_km()),
        });
    }
}
