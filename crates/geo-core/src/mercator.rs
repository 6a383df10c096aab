//! Web-Mercator helpers in the slippy-map tiling scheme.

use std::f64::consts::PI;

use crate::{Bounds, Coordinate};

/// Edge length of a map tile in pixels.
pub const TILE_SIZE: f64 = 256.0;

/// Latitude limit of the square Mercator world.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Absolute pixel position of `point` at `zoom` (origin top-left of the world).
pub fn world_pixel(point: Coordinate, zoom: f64) -> (f64, f64) {
    let scale = TILE_SIZE * 2f64.powf(zoom);
    let lat_rad = point
        .latitude
        .clamp(-MAX_LATITUDE, MAX_LATITUDE)
        .to_radians();
    let x = (point.longitude + 180.0) / 360.0 * scale;
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * scale;
    (x, y)
}

/// Deepest zoom the tile helpers accept.
pub const MAX_TILE_ZOOM: u8 = 22;

/// Tile column/row containing `point` at integer `zoom`, wrapped horizontally.
pub fn tile_index(point: Coordinate, zoom: u8) -> (u32, u32) {
    let zoom = zoom.min(MAX_TILE_ZOOM);
    let n = 1_i64 << zoom;
    let (x, y) = world_pixel(point, zoom as f64);
    let x_raw = (x / TILE_SIZE).floor() as i64;
    let y_raw = (y / TILE_SIZE).floor() as i64;

    (wrap_column(x_raw, zoom), y_raw.clamp(0, n - 1) as u32)
}

/// Fold an unbounded tile column back into `0..2^zoom`.
pub fn wrap_column(column: i64, zoom: u8) -> u32 {
    let n = 1_i64 << zoom.min(MAX_TILE_ZOOM);
    column.rem_euclid(n) as u32
}

/// Largest integer zoom at which `bounds` fits in a `width`×`height` viewport
/// after reserving `padding` pixels on every side.
///
/// A degenerate box (single point) returns `max_zoom`.
pub fn fit_zoom(bounds: &Bounds, width: u32, height: u32, padding: u32, max_zoom: u8) -> u8 {
    let avail_w = (width as f64 - 2.0 * padding as f64).max(1.0);
    let avail_h = (height as f64 - 2.0 * padding as f64).max(1.0);

    let (west, north) = world_pixel(Coordinate::new(bounds.north, bounds.west), 0.0);
    let (east, south) = world_pixel(Coordinate::new(bounds.south, bounds.east), 0.0);
    let span_x = (east - west).abs();
    let span_y = (south - north).abs();

    if span_x <= f64::EPSILON && span_y <= f64::EPSILON {
        return max_zoom;
    }

    let scale_x = if span_x > f64::EPSILON { avail_w / span_x } else { f64::INFINITY };
    let scale_y = if span_y > f64::EPSILON { avail_h / span_y } else { f64::INFINITY };
    let zoom = scale_x.min(scale_y).log2().floor();

    zoom.clamp(0.0, max_zoom as f64) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_maps_to_world_center() {
        let (x, y) = world_pixel(Coordinate::new(0.0, 0.0), 0.0);
        assert!((x - 128.0).abs() < 1e-9);
        assert!((y - 128.0).abs() < 1e-9);
    }

    #[test]
    fn tile_index_matches_osm_scheme() {
        // Zagreb at zoom 17.
        let (x, y) = tile_index(Coordinate::new(45.812_986_5, 15.977_990_7), 17);
        assert_eq!((x, y), (71353, 46728));
        assert_eq!(tile_index(Coordinate::new(0.0, 0.0), 0), (0, 0));
    }

    #[test]
    fn columns_wrap_around_the_antimeridian() {
        assert_eq!(wrap_column(-1, 2), 3);
        assert_eq!(wrap_column(4, 2), 0);
        assert_eq!(wrap_column(9, 2), 1);
        assert_eq!(tile_index(Coordinate::new(0.0, 180.0), 2), (0, 2));
    }

    #[test]
    fn polar_latitudes_are_clamped() {
        let (_, y) = tile_index(Coordinate::new(89.9, 0.0), 3);
        assert_eq!(y, 0);
        let (_, y) = tile_index(Coordinate::new(-89.9, 0.0), 3);
        assert_eq!(y, 7);
    }

    #[test]
    fn single_point_uses_max_zoom() {
        let bounds = Bounds::around(Coordinate::new(12.9, 77.6));
        assert_eq!(fit_zoom(&bounds, 800, 600, 50, 18), 18);
    }

    #[test]
    fn wider_boxes_need_lower_zoom() {
        let city = Bounds::from_points([
            Coordinate::new(12.90, 77.55),
            Coordinate::new(13.00, 77.65),
        ])
        .unwrap();
        let state = Bounds::from_points([
            Coordinate::new(12.0, 76.0),
            Coordinate::new(14.0, 79.0),
        ])
        .unwrap();
        let city_zoom = fit_zoom(&city, 800, 600, 50, 18);
        let state_zoom = fit_zoom(&state, 800, 600, 50, 18);
        assert!(city_zoom > state_zoom);

        // The chosen zoom must actually fit inside the padded viewport.
        let (x0, y0) = world_pixel(Coordinate::new(city.north, city.west), city_zoom as f64);
        let (x1, y1) = world_pixel(Coordinate::new(city.south, city.east), city_zoom as f64);
        assert!((x1 - x0).abs() <= 700.0);
        assert!((y1 - y0).abs() <= 500.0);
    }
}
