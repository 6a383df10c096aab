//! JSON payloads exchanged with the backend.
//!
//! Field names follow the backend's camelCase. Response members are optional
//! where the backend has been seen to omit them; validation into domain types
//! happens in the `into_*` conversions.

use geo_core::Coordinate;
use serde::{Deserialize, Serialize};

use crate::{ActiveRoute, ApiError, MISSING_TEXT, RequestedRoute, RouteStep};

pub const UPDATE_LOCATION_PATH: &str = "/task/updatelocation";
pub const ACTIVE_ROUTE_PATH: &str = "/location/get-route-active";
pub const REQUESTED_ROUTE_PATH: &str = "/location/get-route-requested";
pub const ACCEPT_TASK_PATH: &str = "/task/accept";

#[derive(Debug, Serialize)]
pub struct UpdateLocationRequest {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRouteRequest<'a> {
    pub task_id: &'a str,
}

/// Worker position is sent as fixed six-decimal strings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedRouteRequest<'a> {
    pub worker_latitude: String,
    pub worker_longitude: String,
    pub task_id: &'a str,
}

impl<'a> RequestedRouteRequest<'a> {
    pub fn new(task_id: &'a str, worker: Coordinate) -> Self {
        Self {
            worker_latitude: format!("{:.6}", worker.latitude),
            worker_longitude: format!("{:.6}", worker.longitude),
            task_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptTaskRequest<'a> {
    pub requested_task_id: &'a str,
    pub worker_location: Coordinate,
}

/// Common `{success, message?}` envelope.
#[derive(Debug, Default, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.success {
            Ok(())
        } else {
            Err(rejected(self.message, self.error))
        }
    }
}

/// Distance and duration arrive as either text or a bare number.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum Text {
    Str(String),
    Num(f64),
}

impl Text {
    fn into_display(text: Option<Text>) -> String {
        match text {
            Some(Text::Str(s)) if !s.trim().is_empty() => s,
            Some(Text::Num(n)) => n.to_string(),
            _ => MISSING_TEXT.to_string(),
        }
    }
}

/// Location object whose members may be null.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct WireLocation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl WireLocation {
    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::from_parts(self.latitude, self.longitude)
    }
}

/// GeoJSON-style line with `[lng, lat]` pairs.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Geometry {
    #[serde(default)]
    pub coordinates: Vec<[f64; 2]>,
}

impl Geometry {
    pub fn path(&self) -> Vec<Coordinate> {
        self.coordinates
            .iter()
            .copied()
            .map(Coordinate::from_lng_lat)
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskLocations {
    pub client_location: Option<WireLocation>,
    pub worker_location: Option<WireLocation>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StepLocation {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct WireStep {
    #[serde(default)]
    pub instruction: String,
    pub distance: Option<Text>,
    pub duration: Option<Text>,
    pub location: Option<StepLocation>,
}

impl From<WireStep> for RouteStep {
    fn from(step: WireStep) -> Self {
        Self {
            instruction: step.instruction,
            distance: Text::into_display(step.distance),
            duration: Text::into_display(step.duration),
            location: step
                .location
                .and_then(|loc| Coordinate::from_parts(loc.lat, loc.lng)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ActiveRouteResponse {
    #[serde(default)]
    pub success: bool,
    pub task: Option<TaskLocations>,
    pub geometry: Option<Geometry>,
    pub distance: Option<Text>,
    pub duration: Option<Text>,
    #[serde(default)]
    pub steps: Vec<WireStep>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl ActiveRouteResponse {
    pub fn into_route(self) -> Result<ActiveRoute, ApiError> {
        if !self.success {
            return Err(rejected(self.message, self.error));
        }

        let task = self
            .task
            .ok_or_else(|| ApiError::Malformed("missing task".into()))?;
        let client_location = task
            .client_location
            .and_then(|loc| loc.coordinate())
            .ok_or_else(|| ApiError::Malformed("missing client location".into()))?;
        let worker_location = task.worker_location.and_then(|loc| loc.coordinate());
        let path = self.geometry.map(|g| g.path()).unwrap_or_default();

        Ok(ActiveRoute {
            client_location,
            worker_location,
            path,
            distance: Text::into_display(self.distance),
            duration: Text::into_display(self.duration),
            steps: self.steps.into_iter().map(RouteStep::from).collect(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RouteBody {
    #[serde(default)]
    pub coordinates: Vec<[f64; 2]>,
    pub distance: Option<Text>,
    pub duration: Option<Text>,
}

#[derive(Debug, Deserialize)]
pub struct RequestedRouteResponse {
    #[serde(default)]
    pub success: bool,
    pub geometry: Option<Geometry>,
    pub route: Option<RouteBody>,
    pub distance: Option<Text>,
    pub duration: Option<Text>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl RequestedRouteResponse {
    /// Accepts either a top-level `geometry` or a nested `route` object.
    pub fn into_route(self) -> Result<RequestedRoute, ApiError> {
        if !self.success {
            return Err(rejected(self.message, self.error));
        }

        let (path, distance, duration) = match (self.geometry, self.route) {
            (Some(geometry), route) => {
                let route = route.unwrap_or_default();
                (
                    geometry.path(),
                    self.distance.or(route.distance),
                    self.duration.or(route.duration),
                )
            }
            (None, Some(route)) => (
                route
                    .coordinates
                    .into_iter()
                    .map(Coordinate::from_lng_lat)
                    .collect(),
                route.distance.or(self.distance),
                route.duration.or(self.duration),
            ),
            (None, None) => return Err(ApiError::Malformed("missing route geometry".into())),
        };

        Ok(RequestedRoute {
            path,
            distance: Text::into_display(distance),
            duration: Text::into_display(duration),
        })
    }
}

fn rejected(message: Option<String>, error: Option<String>) -> ApiError {
    ApiError::Rejected {
        message: message
            .or(error)
            .unwrap_or_else(|| "request unsuccessful".to_string()),
    }
}
