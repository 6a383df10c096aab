use serde::{Deserialize, Serialize};

/// A WGS84 position in decimal degrees.
///
/// Both members are always present; an unknown position is `Option<Coordinate>`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Build from a GeoJSON-ordered `[lng, lat]` pair.
    pub fn from_lng_lat([lng, lat]: [f64; 2]) -> Self {
        Self::new(lat, lng)
    }

    /// GeoJSON-ordered `[lng, lat]` pair.
    pub fn to_lng_lat(self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }

    /// Collapse nullable members into a coordinate, refusing partial input.
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => Some(Self::new(lat, lng)),
            _ => None,
        }
    }
}

/// Axis-aligned latitude/longitude box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub fn around(point: Coordinate) -> Self {
        Self {
            south: point.latitude,
            west: point.longitude,
            north: point.latitude,
            east: point.longitude,
        }
    }

    /// Smallest box containing every point, `None` for an empty input.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Coordinate>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut bounds = Self::around(first);
        for point in points {
            bounds.extend(point);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, point: Coordinate) {
        self.south = self.south.min(point.latitude);
        self.north = self.north.max(point.latitude);
        self.west = self.west.min(point.longitude);
        self.east = self.east.max(point.longitude);
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    pub fn contains(&self, point: Coordinate) -> bool {
        (self.south..=self.north).contains(&point.latitude)
            && (self.west..=self.east).contains(&point.longitude)
    }
}
