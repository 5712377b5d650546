use std::{collections::VecDeque, io::BufRead, path::Path};

use chrono::{DateTime, TimeDelta, Utc};
use ride_tracker_lib::position_sample::PositionSample;
use tokio::time::Instant;

use crate::EngineError;

use super::{PositionEvent, PositionProvider, WatchOptions};

/// Replays the track points of a GPX file as if they were live fixes.
///
/// Gaps between points are waited out, divided by `speedup`. A speedup of 0
/// delivers everything immediately.
pub struct GpxReplayProvider {
    samples: VecDeque<PositionSample>,
    speedup: f64,
    previous: Option<DateTime<Utc>>,
    deadline: Option<Instant>,
}

impl GpxReplayProvider {
    pub fn load(path: impl AsRef<Path>, speedup: f64) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|err| EngineError::Gpx { path: path.display().to_string(), reason: err.to_string() })?;

        Self::from_reader(std::io::BufReader::new(file), speedup)
            .map_err(|reason| EngineError::Gpx { path: path.display().to_string(), reason })
    }

    pub fn from_reader(reader: impl BufRead, speedup: f64) -> Result<Self, String> {
        let gpx = gpx::read(reader).map_err(|err| err.to_string())?;

        // Points without a timestamp are spaced one second after their predecessor
        let mut time = Utc::now();
        let mut samples = VecDeque::new();
        for track in gpx.tracks {
            for segment in track.segments {
                for point in segment.points {
                    time = match point.time.and_then(|t| t.format().ok()) {
                        Some(t) => DateTime::parse_from_rfc3339(&t)
                            .map_err(|err| err.to_string())?
                            .with_timezone(&Utc),
                        None => time + TimeDelta::seconds(1),
                    };
                    let position = point.point();
                    samples.push_back(PositionSample::new(position.y(), position.x(), time));
                }
            }
        }

        tracing::info!("Loaded GPX track with {} points", samples.len());

        Ok(Self {
            samples,
            speedup,
            previous: None,
            deadline: None,
        })
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }

    fn delay_before(&self, sample: &PositionSample) -> std::time::Duration {
        let Some(previous) = self.previous else {
            return std::time::Duration::ZERO;
        };
        if self.speedup <= 0. {
            return std::time::Duration::ZERO;
        }

        let gap = sample.timestamp.signed_duration_since(previous).to_std().unwrap_or_default();
        gap.div_f64(self.speedup)
    }
}

#[async_trait::async_trait]
impl PositionProvider for GpxReplayProvider {
    async fn next_fix(&mut self, _options: &WatchOptions) -> Option<PositionEvent> {
        let next = *self.samples.front()?;

        // The deadline survives cancellation so a timed-out wait resumes instead of restarting
        let deadline = match self.deadline {
            Some(deadline) => deadline,
            None => {
                let deadline = Instant::now() + self.delay_before(&next);
                self.deadline = Some(deadline);
                deadline
            }
        };
        tokio::time::sleep_until(deadline).await;

        self.deadline = None;
        self.previous = Some(next.timestamp);
        self.samples.pop_front();

        Some(Ok(next))
    }
}
