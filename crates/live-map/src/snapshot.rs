use std::sync::Arc;

use backend_api::{ActiveRoute, RequestedRoute, RouteStep};
use geo_core::{Coordinate, bearing};

/// One fetched route. Replaced wholesale by the next successful fetch.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteSnapshot {
    pub geometry: Vec<Coordinate>,
    pub distance: String,
    pub duration: String,
    /// Stationary party: the client, or the destination of a requested task.
    pub counterparty_location: Coordinate,
    /// Moving party as reported alongside the route, if any.
    pub mover_location: Option<Coordinate>,
    pub steps: Vec<RouteStep>,
}

impl RouteSnapshot {
    pub fn from_active(route: ActiveRoute) -> Self {
        Self {
            geometry: route.path,
            distance: route.distance,
            duration: route.duration,
            counterparty_location: route.client_location,
            mover_location: route.worker_location,
            steps: route.steps,
        }
    }

    pub fn from_requested(route: RequestedRoute, destination: Coordinate, worker: Coordinate) -> Self {
        Self {
            geometry: route.path,
            distance: route.distance,
            duration: route.duration,
            counterparty_location: destination,
            mover_location: Some(worker),
            steps: Vec::new(),
        }
    }
}

/// Which points orient the moving marker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Heading {
    /// From the mover towards the second route point (worker screens).
    #[default]
    FromMover,
    /// Along the first route segment (client screens).
    AlongRoute,
}

impl Heading {
    /// `None` when fewer than two route points are known.
    pub fn bearing(self, mover: Option<Coordinate>, geometry: &[Coordinate]) -> Option<f64> {
        let [first, second, ..] = geometry else {
            return None;
        };
        match self {
            Heading::FromMover => mover.map(|from| bearing(from, *second)),
            Heading::AlongRoute => Some(bearing(*first, *second)),
        }
    }
}

/// State a view displays, published by a [`RouteTask`](crate::RouteTask).
#[derive(Clone, Debug, Default)]
pub struct RouteView {
    pub snapshot: Option<Arc<RouteSnapshot>>,
    /// Bumped once per new snapshot; marker-only updates keep it.
    pub revision: u64,
    pub mover: Option<Coordinate>,
    pub bearing: f64,
    /// Set when the view must close (requested route without tracking).
    pub closed: bool,
}

impl RouteView {
    pub(crate) fn apply_snapshot(&mut self, snapshot: RouteSnapshot, heading: Heading) {
        let mover = snapshot.mover_location.or(self.mover);
        if let Some(bearing) = heading.bearing(mover, &snapshot.geometry) {
            self.bearing = bearing;
        }
        self.mover = mover;
        self.snapshot = Some(Arc::new(snapshot));
        self.revision += 1;
    }

    pub(crate) fn move_marker(&mut self, mover: Coordinate, heading: Heading) {
        self.mover = Some(mover);
        if let Some(snapshot) = &self.snapshot {
            if let Some(bearing) = heading.bearing(Some(mover), &snapshot.geometry) {
                self.bearing = bearing;
            }
        }
    }
}
