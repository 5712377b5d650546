use ride_engine::{
    position::{PositionEvent, PositionProvider, WatchOptions},
    LocationError,
};
use ride_tracker_lib::position_sample::PositionSample;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Reads one `lat,lon,unix_millis` fix per line from standard input.
pub struct StdinPositionProvider {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinPositionProvider {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

#[async_trait::async_trait]
impl PositionProvider for StdinPositionProvider {
    async fn next_fix(&mut self, _options: &WatchOptions) -> Option<PositionEvent> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(err) => {
                    tracing::error!("Failed to read stdin: {}", err);
                    return None;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            return Some(line.parse::<PositionSample>().map_err(|err| {
                tracing::warn!("Ignoring fix '{}': {}", line, err);
                LocationError::PositionUnavailable
            }));
        }
    }
}
