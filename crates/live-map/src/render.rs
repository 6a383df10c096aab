//! Projection of a [`RouteView`] into something drawable.
//!
//! The renderer owns no route data. It only remembers the viewport it last
//! fitted and the snapshot revision that viewport belongs to.

use backend_api::RouteStep;
use geo_core::{Bounds, Coordinate, fit_zoom};
use serde::Serialize;

use crate::{RouteView, TileLayer, TileRef};

#[derive(Clone, Debug)]
pub struct MapStyle {
    pub tiles: TileLayer,
    pub width: u32,
    pub height: u32,
    /// Pixels kept clear on every side when fitting the route.
    pub padding: u32,
    /// Zoom used when the route has no extent.
    pub default_zoom: u8,
    pub max_zoom: u8,
    pub route_color: String,
    pub route_weight: f32,
    pub route_opacity: f32,
}

impl Default for MapStyle {
    fn default() -> Self {
        Self {
            tiles: TileLayer::default(),
            width: 800,
            height: 600,
            padding: 50,
            default_zoom: 14,
            max_zoom: 18,
            route_color: "#4285F4".into(),
            route_weight: 5.0,
            route_opacity: 0.8,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Viewport {
    pub center: Coordinate,
    pub zoom: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerRole {
    /// Client home or task destination.
    Counterparty,
    /// Worker, rotated to the bearing.
    Mover,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Marker {
    pub role: MarkerRole,
    pub position: Coordinate,
    /// Degrees clockwise from north.
    pub rotation: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Polyline {
    pub points: Vec<Coordinate>,
    pub color: String,
    pub weight: f32,
    pub opacity: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MapFrame {
    pub viewport: Viewport,
    pub attribution: String,
    pub tiles: Vec<TileRef>,
    pub markers: Vec<Marker>,
    pub route: Polyline,
    pub distance: String,
    pub duration: String,
    /// Next turn-by-turn instruction, when the route carries steps.
    pub current_step: Option<RouteStep>,
    /// Snapshot revision this frame was built from.
    pub revision: u64,
}

impl MapFrame {
    pub fn marker(&self, role: MarkerRole) -> Option<&Marker> {
        self.markers.iter().find(|marker| marker.role == role)
    }
}

pub struct MapRenderer {
    style: MapStyle,
    viewport: Option<Viewport>,
    fitted_revision: Option<u64>,
}

impl MapRenderer {
    pub fn new(style: MapStyle) -> Self {
        Self {
            style,
            viewport: None,
            fitted_revision: None,
        }
    }

    /// Build a frame, or `None` while either party's position is unknown.
    ///
    /// The viewport is refitted to the route only when `view` carries a
    /// snapshot revision not seen before.
    pub fn render(&mut self, view: &RouteView) -> Option<MapFrame> {
        let snapshot = view.snapshot.as_ref()?;
        let mover = view.mover?;

        if self.fitted_revision != Some(view.revision) {
            self.viewport = Some(self.fit(&snapshot.geometry, mover));
            self.fitted_revision = Some(view.revision);
        }
        let viewport = self.viewport?;

        let tiles = self.style.tiles.covering(
            viewport.center,
            viewport.zoom,
            self.style.width,
            self.style.height,
        );

        Some(MapFrame {
            viewport,
            attribution: self.style.tiles.attribution.clone(),
            tiles,
            markers: vec![
                Marker {
                    role: MarkerRole::Counterparty,
                    position: snapshot.counterparty_location,
                    rotation: 0.0,
                },
                Marker {
                    role: MarkerRole::Mover,
                    position: mover,
                    rotation: view.bearing,
                },
            ],
            route: Polyline {
                points: snapshot.geometry.clone(),
                color: self.style.route_color.clone(),
                weight: self.style.route_weight,
                opacity: self.style.route_opacity,
            },
            distance: snapshot.distance.clone(),
            duration: snapshot.duration.clone(),
            current_step: snapshot.steps.first().cloned(),
            revision: view.revision,
        })
    }

    fn fit(&self, geometry: &[Coordinate], mover: Coordinate) -> Viewport {
        match Bounds::from_points(geometry.iter().copied()) {
            Some(bounds) if bounds.north > bounds.south || bounds.east > bounds.west => Viewport {
                center: bounds.center(),
                zoom: fit_zoom(
                    &bounds,
                    self.style.width,
                    self.style.height,
                    self.style.padding,
                    self.style.max_zoom,
                ),
            },
            Some(bounds) => Viewport {
                center: bounds.center(),
                zoom: self.style.default_zoom,
            },
            None => Viewport {
                center: mover,
                zoom: self.style.default_zoom,
            },
        }
    }
}
