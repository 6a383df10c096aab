use geo_core::Coordinate;

/// Snapshot of the tracking store. Always replaced as a whole.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TrackingState {
    pub coordinate: Option<Coordinate>,
    pub enabled: bool,
}

impl TrackingState {
    pub const fn disabled() -> Self {
        Self {
            coordinate: None,
            enabled: false,
        }
    }

    /// Coordinate usable for backend calls: tracking on and a fix known.
    pub fn live_position(&self) -> Option<Coordinate> {
        if self.enabled { self.coordinate } else { None }
    }
}
