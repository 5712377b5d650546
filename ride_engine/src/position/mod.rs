mod channel;
mod gpx_replay;
mod source;

use std::time::Duration;

use ride_tracker_lib::position_sample::PositionSample;

use crate::{config::PositionConfig, LocationError};

pub use channel::ChannelPositionProvider;
pub use gpx_replay::GpxReplayProvider;
pub use source::{PositionSource, Subscription};

/// One delivery from the position stream: a fix or a non-fatal error.
pub type PositionEvent = Result<PositionSample, LocationError>;

/// How fixes are requested from the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchOptions {
    pub high_accuracy: bool,
    /// Zero means cached fixes are never acceptable.
    pub maximum_age: Duration,
    /// Longest wait for a single fix before a `Timeout` error is reported.
    pub timeout: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        (&PositionConfig::default()).into()
    }
}

impl From<&PositionConfig> for WatchOptions {
    fn from(config: &PositionConfig) -> Self {
        Self {
            high_accuracy: config.high_accuracy,
            maximum_age: Duration::from_millis(config.maximum_age_ms),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

/// The platform's continuous location feed.
#[async_trait::async_trait]
pub trait PositionProvider: Send + 'static {
    /// Waits for the next fix or error. `None` once the platform stream has ended.
    ///
    /// Must be cancel safe: the source drops the future when the per-fix timeout fires.
    async fn next_fix(&mut self, options: &WatchOptions) -> Option<PositionEvent>;
}
