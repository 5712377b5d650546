use ride_tracker_lib::position_sample::PositionSample;

use crate::geo_math::initial_bearing;

/// Heading from the second-to-last to the last sample, or 0 with fewer than two.
pub fn estimate(path: &[PositionSample]) -> f64 {
    match path {
        [.., previous, last] => initial_bearing(previous.coordinates(), last.coordinates()),
        _ => 0.,
    }
}
