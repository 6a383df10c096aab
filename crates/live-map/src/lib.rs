//! Live route display for a single task.
//!
//! A [`RouteTask`] polls the backend for the route between the moving worker
//! and the stationary client and publishes a [`RouteView`]. A [`MapRenderer`]
//! turns that view into a [`MapFrame`]: base tiles, two markers, the route
//! polyline and a viewport that is refitted only when a new route arrives.

mod geojson;
mod render;
mod snapshot;
mod task;
mod tiles;

pub use render::{MapFrame, MapRenderer, MapStyle, Marker, MarkerRole, Polyline, Viewport};
pub use snapshot::{Heading, RouteSnapshot, RouteView};
pub use task::{ROUTE_REFRESH_INTERVAL, RouteError, RouteTask, RouteTaskConfig, accept_requested_task};
pub use tiles::{OSM_ATTRIBUTION, OSM_TILE_URL, TileLayer, TileRef};
