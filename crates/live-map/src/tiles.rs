//! Base map tiles in the slippy-map scheme.

use std::collections::HashMap;

use geo_core::{Coordinate, MAX_TILE_ZOOM, TILE_SIZE, world_pixel, wrap_column};
use serde::Serialize;

pub const OSM_TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const OSM_ATTRIBUTION: &str = "© OpenStreetMap contributors";

/// Raster tile source described by a URL template.
///
/// Recognised placeholders: `{s}` subdomain, `{z}` / `{zoom}`, `{x}`, `{y}`
/// and `{r}` (`@2x` on high-density displays).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TileLayer {
    pub url_template: String,
    pub attribution: String,
    pub subdomains: Vec<String>,
}

impl Default for TileLayer {
    fn default() -> Self {
        Self::new(OSM_TILE_URL, OSM_ATTRIBUTION)
    }
}

/// One tile to draw and where its top-left corner lands in the viewport.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TileRef {
    pub z: u8,
    pub x: u32,
    pub y: u32,
    pub url: String,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl TileLayer {
    pub fn new(url_template: impl Into<String>, attribution: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            attribution: attribution.into(),
            subdomains: vec!["a".into(), "b".into(), "c".into()],
        }
    }

    pub fn tile_url(&self, z: u8, x: u32, y: u32, retina: bool) -> String {
        let mut values: HashMap<&str, String> = HashMap::new();
        values.insert("z", z.to_string());
        values.insert("zoom", z.to_string());
        values.insert("x", x.to_string());
        values.insert("y", y.to_string());
        values.insert("r", if retina { "@2x" } else { "" }.to_string());
        if self.url_template.contains("{s}") && !self.subdomains.is_empty() {
            // Spread requests over subdomains the way browser map widgets do.
            let idx = (x as usize + y as usize) % self.subdomains.len();
            values.insert("s", self.subdomains[idx].clone());
        }

        let mut url = self.url_template.clone();
        for (key, value) in &values {
            url = url.replace(&format!("{{{key}}}"), value);
        }
        url
    }

    /// Tiles covering a `width`×`height` viewport centred on `center` at `zoom`.
    ///
    /// Tiles come row by row; the one under `center` matches
    /// [`geo_core::tile_index`].
    pub fn covering(&self, center: Coordinate, zoom: u8, width: u32, height: u32) -> Vec<TileRef> {
        let zoom = zoom.min(MAX_TILE_ZOOM);
        let last_row_index = (1_i64 << zoom) - 1;
        let (cx, cy) = world_pixel(center, zoom as f64);
        let left = cx - width as f64 / 2.0;
        let top = cy - height as f64 / 2.0;

        let first_col = (left / TILE_SIZE).floor() as i64;
        let last_col = ((left + width as f64) / TILE_SIZE).floor() as i64;
        let first_row = ((top / TILE_SIZE).floor() as i64).max(0);
        let last_row = (((top + height as f64) / TILE_SIZE).floor() as i64).min(last_row_index);

        let mut tiles = Vec::new();
        for row in first_row..=last_row {
            for col in first_col..=last_col {
                let x = wrap_column(col, zoom);
                let y = row as u32;
                tiles.push(TileRef {
                    z: zoom,
                    x,
                    y,
                    url: self.tile_url(zoom, x, y, false),
                    offset_x: col as f64 * TILE_SIZE - left,
                    offset_y: row as f64 * TILE_SIZE - top,
                });
            }
        }
        tiles
    }
}
