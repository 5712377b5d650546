use geo::Rect;
use ride_engine::viewport::{FitOptions, MapCanvas, OverlayFrame, RouteLine};

/// Map stand-in for headless runs: camera and overlay instructions go to the log.
#[derive(Default)]
pub struct LogCanvas {
    frames: usize,
}

impl MapCanvas for LogCanvas {
    fn fit_bounds(&mut self, bounds: Rect<f64>, options: FitOptions) {
        let (min, max) = (bounds.min(), bounds.max());
        tracing::debug!(
            "Fit view to lat {:.5}..{:.5}, lon {:.5}..{:.5} (padding {} px, max zoom {})",
            min.y, max.y, min.x, max.x, options.padding_px, options.max_zoom
        );
    }

    fn render(&mut self, frame: &OverlayFrame) {
        self.frames += 1;

        let route = match &frame.route {
            RouteLine::None => "none".to_string(),
            RouteLine::Routed(points) => format!("{} points", points.len()),
            RouteLine::Straight { .. } => "straight line".to_string(),
        };

        match &frame.vehicle {
            Some(vehicle) => tracing::trace!(
                "Frame {}: vehicle at {:.5}, {:.5} heading {:.0}°, trail {} points, route {}",
                self.frames, vehicle.position.latitude, vehicle.position.longitude, vehicle.heading, frame.trail.len(), route
            ),
            None => tracing::trace!("Frame {}: waiting for first fix, route {}", self.frames, route),
        }
    }
}
