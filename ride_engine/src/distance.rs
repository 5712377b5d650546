use ride_tracker_lib::position_sample::PositionSample;

use crate::geo_math::haversine_km;

/// Running trip distance in kilometers.
///
/// Every fix counts, GPS jitter included: there is no smoothing and no
/// minimum-movement gate, so a parked vehicle slowly gains distance.
#[derive(Debug, Clone, Default)]
pub struct DistanceAccumulator {
    total_km: f64,
    last: Option<PositionSample>,
    finished: bool,
}

impl DistanceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Adds the segment from the previous sample. No-op after `finish`.
    pub fn add_sample(&mut self, sample: PositionSample) -> f64 {
        if self.finished {
            return self.total_km;
        }

        if let Some(last) = &self.last {
            self.total_km += haversine_km(last.coordinates(), sample.coordinates());
        }
        self.last = Some(sample);

        self.total_km
    }

    /// Feeds samples in order, equivalent to calling `add_sample` for each.
    pub fn replay<'a>(&mut self, samples: impl IntoIterator<Item = &'a PositionSample>) -> f64 {
        for sample in samples {
            self.add_sample(*sample);
        }
        self.total_km
    }

    /// Freezes the total. Returns the final distance.
    pub fn finish(&mut self) -> f64 {
        self.finished = true;
        self.total_km
    }

    pub fn total_km(&self) -> f64 {
        self.total_km
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn last_sample(&self) -> Option<&PositionSample> {
        self.last.as_ref()
    }
}
