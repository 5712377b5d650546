use ride_tracker_lib::position_sample::PositionSample;

use crate::{distance::DistanceAccumulator, heading};

/// Everything recorded for the trip in progress. The path is append-only and only
/// this session writes to it.
#[derive(Debug, Clone)]
pub struct TrackingSession {
    path: Vec<PositionSample>,
    accumulator: DistanceAccumulator,
    active: bool,
}

impl TrackingSession {
    pub fn start() -> Self {
        Self {
            path: Vec::new(),
            accumulator: DistanceAccumulator::new(),
            active: true,
        }
    }

    /// Records a fix. Returns false once the session has ended.
    pub fn add_sample(&mut self, sample: PositionSample) -> bool {
        if !self.active {
            return false;
        }

        self.path.push(sample);
        self.accumulator.add_sample(sample);
        true
    }

    /// Ends the session and returns the final distance. Repeated calls return the same value.
    pub fn finish(&mut self) -> f64 {
        self.active = false;
        self.accumulator.finish()
    }

    pub fn cumulative_distance_km(&self) -> f64 {
        self.accumulator.total_km()
    }

    pub fn heading(&self) -> f64 {
        heading::estimate(&self.path)
    }

    pub fn path(&self) -> &[PositionSample] {
        &self.path
    }

    pub fn last_sample(&self) -> Option<&PositionSample> {
        self.path.last()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;

    fn sample(lat: f64, lon: f64, secs: i64) -> PositionSample {
        PositionSample::new(lat, lon, DateTime::from_timestamp(secs, 0).unwrap())
    }

    #[test]
    fn distance_never_decreases() {
        let mut session = TrackingSession::start();
        let mut previous = 0.;
        for i in 0..20 {
            // zig-zag to make sure direction changes do not subtract
            let lon = if i % 2 == 0 { -47. } else { -47.0003 };
            session.add_sample(sample(-21. + i as f64 * 0.0001, lon, i));
            assert!(session.cumulative_distance_km() >= previous);
            previous = session.cumulative_distance_km();
        }
        assert_eq!(session.path().len(), 20);
    }

    #[test]
    fn finished_session_ignores_samples() {
        let mut session = TrackingSession::start();
        session.add_sample(sample(-21., -47., 0));
        session.add_sample(sample(-21.001, -47., 1));
        let final_distance = session.finish();

        assert!(!session.add_sample(sample(-21.01, -47., 2)));
        assert_eq!(session.cumulative_distance_km(), final_distance);
        assert_eq!(session.finish(), final_distance);
        assert_eq!(session.path().len(), 2);
        assert!(!session.is_active());
    }
}
