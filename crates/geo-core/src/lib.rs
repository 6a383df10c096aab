//! Geographic primitives shared by the tracking and live-map crates.
//!
//! Everything here is pure: coordinates, the forward-azimuth bearing used to
//! orient the moving marker, bounding boxes, and the Web-Mercator maths the
//! renderer needs to pick tiles and fit a viewport.

mod bearing;
mod coordinate;
mod mercator;

pub use bearing::bearing;
pub use coordinate::{Bounds, Coordinate};
pub use mercator::{
    MAX_LATITUDE, MAX_TILE_ZOOM, TILE_SIZE, fit_zoom, tile_index, world_pixel, wrap_column,
};
