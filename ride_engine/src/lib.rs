pub mod config;
mod error;
pub mod geo_math;
pub mod distance;
pub mod heading;
pub mod session;
pub mod position;
pub mod routing;
pub mod geocode;
pub mod viewport;
mod tracker;

pub use error::*;
pub use tracker::*;

pub use distance::DistanceAccumulator;
pub use session::TrackingSession;
