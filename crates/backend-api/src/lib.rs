//! Client side of the marketplace REST backend used by live tracking.
//!
//! The [`BackendApi`] trait is the seam the tracking and live-map crates talk
//! to; [`HttpBackend`] is the reqwest implementation. Wire structs stay in
//! [`wire`] and are converted into validated domain values before leaving this
//! crate.

mod client;
mod error;
mod notice;
pub mod wire;

use async_trait::async_trait;
use geo_core::Coordinate;
use serde::Serialize;

pub use client::{BackendConfig, HttpBackend};
pub use error::ApiError;
pub use notice::{LogNotifier, MemoryNotifier, Notice, Notifier, Severity};

/// Placeholder shown for a missing distance or duration.
pub const MISSING_TEXT: &str = "--";

/// One turn-by-turn instruction of an active route.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteStep {
    pub instruction: String,
    pub distance: String,
    pub duration: String,
    pub location: Option<Coordinate>,
}

/// Route between a worker and the client of a task already in progress.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveRoute {
    pub client_location: Coordinate,
    pub worker_location: Option<Coordinate>,
    pub path: Vec<Coordinate>,
    pub distance: String,
    pub duration: String,
    pub steps: Vec<RouteStep>,
}

/// Route from the worker's live position to a task they have not accepted yet.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestedRoute {
    pub path: Vec<Coordinate>,
    pub distance: String,
    pub duration: String,
}

#[async_trait]
pub trait BackendApi: Send + Sync {
    /// `PUT /task/updatelocation`
    async fn update_location(&self, location: Coordinate) -> Result<(), ApiError>;

    /// `POST /location/get-route-active`
    async fn active_route(&self, task_id: &str) -> Result<ActiveRoute, ApiError>;

    /// `POST /location/get-route-requested`
    async fn requested_route(
        &self,
        task_id: &str,
        worker: Coordinate,
    ) -> Result<RequestedRoute, ApiError>;

    /// `PUT /task/accept`
    async fn accept_task(&self, task_id: &str, worker: Coordinate) -> Result<(), ApiError>;
}
