use geo::{BoundingRect, MultiPoint, Point, Rect};
use ride_tracker_lib::coordinates::Coordinates;
use serde::{Deserialize, Serialize};

use crate::config::ViewportConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ViewportMode {
    #[default]
    AutoCenter,
    Manual,
}

/// Camera changes started by the operator, as opposed to programmatic fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Drag,
    Pan,
    Zoom,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    pub padding_px: u32,
    pub max_zoom: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub position: Coordinates,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleMarker {
    pub position: Coordinates,
    /// Degrees clockwise from north.
    pub heading: f64,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RouteLine {
    None,
    Routed(Vec<Coordinates>),
    /// Drawn dashed while no routed geometry is available.
    Straight { from: Coordinates, to: Coordinates },
}

impl RouteLine {
    pub fn choose(route: Option<&[Coordinates]>, origin: Option<Coordinates>, destination: Option<Coordinates>) -> Self {
        match (route, origin, destination) {
            (Some(route), _, _) if !route.is_empty() => RouteLine::Routed(route.to_vec()),
            (_, Some(from), Some(to)) => RouteLine::Straight { from, to },
            _ => RouteLine::None,
        }
    }
}

/// Every overlay layer of the ride map. Each frame replaces the previous one entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayFrame {
    pub start: Option<Marker>,
    pub destination: Option<Marker>,
    pub vehicle: Option<VehicleMarker>,
    pub trail: Vec<Coordinates>,
    pub route: RouteLine,
}

/// The map widget. Only the [`ViewportController`] holds one.
pub trait MapCanvas: Send {
    /// Bounds are in geo-types order: x = longitude, y = latitude.
    fn fit_bounds(&mut self, bounds: Rect<f64>, options: FitOptions);

    fn render(&mut self, frame: &OverlayFrame);
}

#[derive(Debug, Clone, Default)]
struct KnownGeometry {
    start: Option<Coordinates>,
    destination: Option<Coordinates>,
    live: Option<Coordinates>,
    route: Vec<Coordinates>,
}

/// Keeps everything relevant in view until the operator takes over the camera.
pub struct ViewportController<C: MapCanvas> {
    canvas: C,
    mode: ViewportMode,
    known: KnownGeometry,
    options: FitOptions,
    route_sample_stride: usize,
}

impl<C: MapCanvas> ViewportController<C> {
    pub fn new(canvas: C, config: &ViewportConfig) -> Self {
        Self {
            canvas,
            mode: ViewportMode::AutoCenter,
            known: KnownGeometry::default(),
            options: FitOptions {
                padding_px: config.padding_px,
                max_zoom: config.max_zoom,
            },
            route_sample_stride: config.route_sample_stride.max(1),
        }
    }

    pub fn set_start(&mut self, start: Option<Coordinates>) {
        self.known.start = start;
        self.refit();
    }

    pub fn set_destination(&mut self, destination: Option<Coordinates>) {
        self.known.destination = destination;
        self.refit();
    }

    pub fn set_live_position(&mut self, position: Option<Coordinates>) {
        self.known.live = position;
        self.refit();
    }

    pub fn set_route(&mut self, route: &[Coordinates]) {
        self.known.route.clear();
        self.known.route.extend_from_slice(route);
        self.refit();
    }

    pub fn on_user_interaction(&mut self, interaction: Interaction) {
        if self.mode == ViewportMode::AutoCenter {
            tracing::debug!("{:?} by operator, auto-centering paused", interaction);
            self.mode = ViewportMode::Manual;
        }
    }

    /// Returns to auto-centering and fits immediately.
    pub fn recenter(&mut self) {
        self.mode = ViewportMode::AutoCenter;
        self.refit();
    }

    pub fn render(&mut self, frame: &OverlayFrame) {
        self.canvas.render(frame);
    }

    /// Bounding box of all known points. Long routes only contribute every n-th vertex and the last one.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        let known = &self.known;
        let route_samples = known.route.iter()
            .step_by(self.route_sample_stride)
            .chain(known.route.last());

        let points: MultiPoint<f64> = [known.start, known.destination, known.live].iter()
            .flatten()
            .chain(route_samples)
            .filter(|c| c.is_finite())
            .map(|c| Point::from(*c))
            .collect::<Vec<_>>()
            .into();

        points.bounding_rect()
    }

    fn refit(&mut self) {
        if self.mode == ViewportMode::Manual {
            return;
        }

        if let Some(bounds) = self.bounds() {
            tracing::trace!("Fitting viewport to {:?}", bounds);
            self.canvas.fit_bounds(bounds, self.options);
        }
    }

    pub fn mode(&self) -> ViewportMode {
        self.mode
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingCanvas {
        fits: Vec<(Rect<f64>, FitOptions)>,
        frames: Vec<OverlayFrame>,
    }

    impl MapCanvas for RecordingCanvas {
        fn fit_bounds(&mut self, bounds: Rect<f64>, options: FitOptions) {
            self.fits.push((bounds, options));
        }

        fn render(&mut self, frame: &OverlayFrame) {
            self.frames.push(frame.clone());
        }
    }

    fn controller() -> ViewportController<RecordingCanvas> {
        ViewportController::new(RecordingCanvas::default(), &ViewportConfig::default())
    }

    #[test]
    fn starts_auto_and_fits_every_update() {
        let mut viewport = controller();
        assert_eq!(viewport.mode(), ViewportMode::AutoCenter);

        viewport.set_start(Some(Coordinates::new(-21., -47.)));
        viewport.set_destination(Some(Coordinates::new(-21.005, -47.005)));
        viewport.set_live_position(Some(Coordinates::new(-21.001, -47.001)));

        let fits = &viewport.canvas().fits;
        assert_eq!(fits.len(), 3);
        let (bounds, options) = fits[2];
        assert_eq!(bounds.min().y, -21.005);
        assert_eq!(bounds.max().y, -21.);
        assert_eq!(bounds.min().x, -47.005);
        assert_eq!(bounds.max().x, -47.);
        assert_eq!(options, FitOptions { padding_px: 80, max_zoom: 17 });
    }

    #[test]
    fn drag_suppresses_fits_until_recenter() {
        let mut viewport = controller();
        viewport.set_start(Some(Coordinates::new(-21., -47.)));
        viewport.on_user_interaction(Interaction::Drag);
        assert_eq!(viewport.mode(), ViewportMode::Manual);

        viewport.set_live_position(Some(Coordinates::new(-21.01, -47.)));
        viewport.set_route(&[Coordinates::new(-21.01, -47.), Coordinates::new(-21.02, -47.)]);
        assert_eq!(viewport.canvas().fits.len(), 1);

        viewport.recenter();
        assert_eq!(viewport.mode(), ViewportMode::AutoCenter);
        assert_eq!(viewport.canvas().fits.len(), 2);
        assert_eq!(viewport.canvas().fits[1].0.min().y, -21.02);
    }

    #[test]
    fn zoom_also_counts_as_manual() {
        let mut viewport = controller();
        viewport.on_user_interaction(Interaction::Zoom);
        viewport.on_user_interaction(Interaction::Pan);
        assert_eq!(viewport.mode(), ViewportMode::Manual);
    }

    #[test]
    fn long_routes_are_sampled_sparsely() {
        let mut viewport = controller();
        let mut route: Vec<Coordinates> = (0..25).map(|i| Coordinates::new(-21. - i as f64 * 0.001, -47.)).collect();
        // Vertex 5 is skipped by the stride of 10
        route[5] = Coordinates::new(-21.005, -46.);
        viewport.set_route(&route);

        let bounds = viewport.bounds().unwrap();
        assert_eq!(bounds.max().x, -47.);
        assert_eq!(bounds.min().y, route[24].latitude);
    }

    #[test]
    fn nothing_known_means_no_fit() {
        let mut viewport = controller();
        viewport.set_live_position(Some(Coordinates::new(f64::NAN, 1.)));
        viewport.recenter();
        assert!(viewport.canvas().fits.is_empty());
    }

    #[test]
    fn frames_reach_the_canvas_whole() {
        let mut viewport = controller();
        let frame = OverlayFrame {
            start: None,
            destination: None,
            vehicle: None,
            trail: vec![Coordinates::new(1., 1.)],
            route: RouteLine::choose(None, Some(Coordinates::new(1., 1.)), Some(Coordinates::new(2., 2.))),
        };
        viewport.render(&frame);
        assert_eq!(viewport.canvas().frames, vec![frame]);
    }

    #[test]
    fn route_line_prefers_routed_geometry() {
        let a = Coordinates::new(1., 1.);
        let b = Coordinates::new(2., 2.);
        assert_eq!(RouteLine::choose(Some(&[a, b][..]), Some(a), Some(b)), RouteLine::Routed(vec![a, b]));
        assert_eq!(RouteLine::choose(Some(&[][..]), Some(a), Some(b)), RouteLine::Straight { from: a, to: b });
        assert_eq!(RouteLine::choose(None, None, Some(b)), RouteLine::None);
    }
}
