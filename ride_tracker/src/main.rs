mod log_canvas;
mod stdin_source;

use std::{fs::OpenOptions, path::PathBuf, sync::Arc};

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use log_canvas::LogCanvas;
use ride_engine::{
    config::EngineConfig,
    geocode::{GeocodeGateway, NominatimGateway},
    position::{GpxReplayProvider, PositionProvider, WatchOptions},
    routing::{FallbackRouter, RouteQuery},
    RideTracker,
};
use ride_tracker_lib::{
    coordinates::Coordinates,
    driver::Driver,
    fare_rule::{available_cities, fare_for_city, FareRule},
    ride::{Destination, RideRecord},
};
use stdin_source::StdinPositionProvider;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ride_tracker")]
#[command(about = "Track a ride live: distance, heading and a route to the destination", long_about = None)]
struct Cli {
    /// JSON engine configuration. Defaults are used for anything missing
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write the log to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track a ride from a GPX replay, or from `lat,lon,unix_millis` lines on stdin
    Ride(RideArgs),
    /// Street name suggestions for a partially typed address
    Suggest { query: String, city: String },
    /// Coordinates of an address
    Locate { address: String, city: String },
    /// Street and city at a coordinate
    Reverse {
        #[arg(allow_hyphen_values = true)]
        lat: f64,
        #[arg(allow_hyphen_values = true)]
        lon: f64,
    },
    /// Fetch a single route through the primary and fallback providers
    Route {
        #[arg(allow_hyphen_values = true)]
        origin_lat: f64,
        #[arg(allow_hyphen_values = true)]
        origin_lon: f64,
        #[arg(allow_hyphen_values = true)]
        dest_lat: f64,
        #[arg(allow_hyphen_values = true)]
        dest_lon: f64,
    },
    /// List the destination cities of a fare table
    Cities { fares: PathBuf },
}

#[derive(Args)]
struct RideArgs {
    #[arg(long)]
    passenger: String,
    #[arg(long)]
    address: String,
    #[arg(long)]
    city: String,
    /// Skip geocoding and use these destination coordinates
    #[arg(long, requires = "dest_lon", allow_hyphen_values = true)]
    dest_lat: Option<f64>,
    #[arg(long, requires = "dest_lat", allow_hyphen_values = true)]
    dest_lon: Option<f64>,
    /// Where the ride starts, before the first fix arrives
    #[arg(long, requires = "start_lon", allow_hyphen_values = true)]
    start_lat: Option<f64>,
    #[arg(long, requires = "start_lat", allow_hyphen_values = true)]
    start_lon: Option<f64>,
    /// Replay this GPX track instead of reading stdin
    #[arg(long)]
    gpx: Option<PathBuf>,
    /// Replay speed factor for --gpx
    #[arg(long, default_value_t = 1.)]
    speedup: f64,
    /// JSON driver record, used for the vehicle label
    #[arg(long)]
    driver: Option<PathBuf>,
    /// JSON fare table. The fare is taken from the destination city
    #[arg(long)]
    fares: Option<PathBuf>,
    /// Override the route stabilization distance
    #[arg(long)]
    stabilization_meters: Option<f64>,
    /// Override the primary routing service
    #[arg(long)]
    primary_url: Option<String>,
    /// Override the fallback routing service
    #[arg(long)]
    fallback_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref())?;

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Ride(args) => ride(args, config).await?,
        Commands::Suggest { query, city } => {
            let gateway = NominatimGateway::new(config.geocoding)?;
            for suggestion in gateway.suggest(&query, &city).await {
                println!("{}", suggestion.description);
            }
        },
        Commands::Locate { address, city } => {
            let gateway = NominatimGateway::new(config.geocoding)?;
            match gateway.locate(&address, &city).await {
                Some(coordinates) => println!("{}, {}", coordinates.latitude, coordinates.longitude),
                None => bail!("No match for '{}, {}'", address, city),
            }
        },
        Commands::Reverse { lat, lon } => {
            let gateway = NominatimGateway::new(config.geocoding)?;
            match gateway.reverse(Coordinates::new(lat, lon)).await {
                Some(place) => println!("{}\t{}", place.address, place.city),
                None => bail!("No address at {}, {}", lat, lon),
            }
        },
        Commands::Route { origin_lat, origin_lon, dest_lat, dest_lon } => {
            let router = FallbackRouter::from_config(&config.routing)?;
            let query = RouteQuery::new(Coordinates::new(origin_lat, origin_lon), Coordinates::new(dest_lat, dest_lon));
            let geometry = router.fetch(&query).await.context("No route from either provider")?;
            println!("{}", serde_json::to_string(&geometry)?);
        },
        Commands::Cities { fares } => {
            for city in available_cities(&read_fares(&fares)?) {
                println!("{}", city);
            }
        },
    }

    Ok(())
}

fn init_logging(log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file))
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| format!("{}=trace,ride_engine=debug", env!("CARGO_CRATE_NAME")).into())
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

fn read_fares(path: &PathBuf) -> anyhow::Result<Vec<FareRule>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read fares {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid fare table {}", path.display()))
}

async fn ride(args: RideArgs, mut config: EngineConfig) -> anyhow::Result<()> {
    if let Some(meters) = args.stabilization_meters {
        config.routing.stabilization_meters = meters;
    }
    if let Some(url) = args.primary_url {
        config.routing.primary_url = url;
    }
    if let Some(url) = args.fallback_url {
        config.routing.fallback_url = url;
    }

    let driver: Option<Driver> = match &args.driver {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read driver {}", path.display()))?;
            Some(serde_json::from_str(&text).with_context(|| format!("Invalid driver record {}", path.display()))?)
        },
        None => None,
    };

    let fare = match &args.fares {
        Some(path) => fare_for_city(&read_fares(path)?, &args.city)
            .with_context(|| format!("No fare for {}", args.city))?,
        None => 0.,
    };

    let mut destination = Destination::new(args.address, args.city);
    if let (Some(lat), Some(lon)) = (args.dest_lat, args.dest_lon) {
        destination = destination.with_coordinates(Coordinates::new(lat, lon));
    }
    let start_location = args.start_lat.zip(args.start_lon).map(|(lat, lon)| Coordinates::new(lat, lon));

    let ride = RideRecord::new(
        args.passenger,
        destination,
        driver.as_ref().map(|driver| driver.driver_id.clone()).unwrap_or_default(),
        fare,
        Utc::now(),
        start_location,
    );

    let router = FallbackRouter::from_config(&config.routing)?;
    let geocoder: Arc<dyn GeocodeGateway> = Arc::new(NominatimGateway::new(config.geocoding.clone())?);
    let options = WatchOptions::from(&config.position);
    let tracker = RideTracker::new(ride, driver.as_ref(), router, geocoder, LogCanvas::default(), &config);

    let record = match &args.gpx {
        Some(path) => drive(tracker, GpxReplayProvider::load(path, args.speedup)?, options).await?,
        None => drive(tracker, StdinPositionProvider::new(), options).await?,
    };

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Runs the ride until the position feed runs dry or ctrl-c is pressed.
async fn drive<P: PositionProvider>(tracker: RideTracker<LogCanvas>, provider: P, options: WatchOptions) -> anyhow::Result<RideRecord> {
    let (handle, task) = tracker.spawn(provider, options);
    let mut snapshots = handle.snapshots();
    let mut reported = 0;

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }

                let snapshot = snapshots.borrow_and_update().clone();
                if snapshot.samples != reported {
                    reported = snapshot.samples;
                    tracing::info!("{:.3} km, heading {:.0}°", snapshot.distance_km, snapshot.heading);
                }
                if let Some(err) = snapshot.location_error {
                    tracing::warn!("No position: {}", err);
                }
                if !snapshot.position_stream_open {
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            },
        }
    }

    // The tracker may already have stopped on its own
    let _ = handle.end_ride().await;
    let record = task.await.context("Ride tracker task failed")?;
    tracing::info!("Final distance {:.3} km", record.distance);
    Ok(record)
}
