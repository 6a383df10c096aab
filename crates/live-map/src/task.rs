//! Periodic route polling for one task.
//!
//! Each [`RouteTask`] owns a tokio task that fetches immediately and then on
//! every tick of [`ROUTE_REFRESH_INTERVAL`]. Fetches inside one task never
//! overlap, so a response can only ever replace the snapshot of the request
//! issued before it. Dropping the handle aborts the task; a response still in
//! flight at that point is discarded with the future that awaited it.

use std::{sync::Arc, time::Duration};

use backend_api::{ApiError, BackendApi, Notice, Notifier};
use geo_core::Coordinate;
use metrics::counter;
use thiserror::Error;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};
use tracking::{TrackingState, TrackingStore};

use crate::{Heading, RouteSnapshot, RouteView};

pub const ROUTE_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug)]
pub struct RouteTaskConfig {
    pub interval: Duration,
    pub heading: Heading,
}

impl Default for RouteTaskConfig {
    fn default() -> Self {
        Self {
            interval: ROUTE_REFRESH_INTERVAL,
            heading: Heading::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Please enable location tracking to view route")]
    TrackingDisabled,
    #[error("No location fix yet")]
    NoPosition,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Handle to a running route poller. Dropping it stops the poller.
pub struct RouteTask {
    view: watch::Receiver<RouteView>,
    handle: JoinHandle<()>,
}

impl RouteTask {
    /// Poll the route of a task already in progress.
    pub fn spawn_active(
        api: Arc<dyn BackendApi>,
        notifier: Arc<dyn Notifier>,
        task_id: impl Into<String>,
        config: RouteTaskConfig,
    ) -> Self {
        let task_id = task_id.into();
        let (publisher, view) = watch::channel(RouteView::default());

        let handle = tokio::spawn(async move {
            info!("Following active route for task {task_id}");
            let mut ticker = ticker(config.interval);
            loop {
                ticker.tick().await;
                counter!("choresup_route_fetches_total").increment(1);
                match api.active_route(&task_id).await {
                    Ok(route) => {
                        let snapshot = RouteSnapshot::from_active(route);
                        debug!(
                            "Route for task {task_id}: {} points, {}",
                            snapshot.geometry.len(),
                            snapshot.distance
                        );
                        publisher.send_modify(|view| view.apply_snapshot(snapshot, config.heading));
                    }
                    Err(err) => report_failure(notifier.as_ref(), &task_id, &err),
                }
            }
        });

        Self { view, handle }
    }

    /// Poll the route from the tracked position to a task not yet accepted.
    ///
    /// Refused while tracking is off. Closes the view if tracking is switched
    /// off later; ticks without a known position are skipped.
    pub fn spawn_requested(
        api: Arc<dyn BackendApi>,
        notifier: Arc<dyn Notifier>,
        store: &TrackingStore,
        task_id: impl Into<String>,
        destination: Coordinate,
        config: RouteTaskConfig,
    ) -> Result<Self, RouteError> {
        if !store.state().enabled {
            notifier.notify(Notice::error(RouteError::TrackingDisabled.to_string()));
            return Err(RouteError::TrackingDisabled);
        }

        let task_id = task_id.into();
        let mut tracking = store.subscribe();
        let (publisher, view) = watch::channel(RouteView::default());

        let handle = tokio::spawn(async move {
            info!("Following requested route for task {task_id}");
            let mut ticker = ticker(config.interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let state = *tracking.borrow();
                        if !state.enabled {
                            close_view(&publisher, notifier.as_ref());
                            return;
                        }
                        let Some(worker) = state.coordinate else {
                            debug!("No position yet, skipping route fetch for task {task_id}");
                            continue;
                        };
                        counter!("choresup_route_fetches_total").increment(1);
                        match api.requested_route(&task_id, worker).await {
                            Ok(route) => {
                                let snapshot = RouteSnapshot::from_requested(route, destination, worker);
                                publisher.send_modify(|view| view.apply_snapshot(snapshot, config.heading));
                            }
                            Err(err) => report_failure(notifier.as_ref(), &task_id, &err),
                        }
                    }
                    changed = tracking.changed() => {
                        if changed.is_err() {
                            debug!("Tracking store dropped, route task for {task_id} exiting");
                            return;
                        }
                        let state: TrackingState = *tracking.borrow_and_update();
                        if !state.enabled {
                            close_view(&publisher, notifier.as_ref());
                            return;
                        }
                        if let Some(worker) = state.coordinate {
                            publisher.send_if_modified(|view| {
                                if view.mover == Some(worker) {
                                    return false;
                                }
                                view.move_marker(worker, config.heading);
                                true
                            });
                        }
                    }
                }
            }
        });

        Ok(Self { view, handle })
    }

    /// Independent receiver of the published view.
    pub fn view(&self) -> watch::Receiver<RouteView> {
        self.view.clone()
    }

    pub fn current(&self) -> RouteView {
        self.view.borrow().clone()
    }

    /// Wait for the next published view. `None` once the poller has exited
    /// and its last view was already seen.
    pub async fn changed(&mut self) -> Option<RouteView> {
        self.view.changed().await.ok()?;
        Some(self.view.borrow_and_update().clone())
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RouteTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Accept a requested task at the tracked position.
pub async fn accept_requested_task(
    api: &dyn BackendApi,
    notifier: &dyn Notifier,
    store: &TrackingStore,
    task_id: &str,
) -> Result<(), RouteError> {
    let state = store.state();
    if !state.enabled {
        notifier.notify(Notice::error(RouteError::TrackingDisabled.to_string()));
        return Err(RouteError::TrackingDisabled);
    }
    let Some(worker) = state.coordinate else {
        notifier.notify(Notice::error(RouteError::NoPosition.to_string()));
        return Err(RouteError::NoPosition);
    };

    match api.accept_task(task_id, worker).await {
        Ok(()) => {
            info!("Accepted task {task_id}");
            notifier.notify(Notice::info("Task accepted"));
            Ok(())
        }
        Err(err) => {
            warn!("Accepting task {task_id} failed: {err}");
            notifier.notify(Notice::error(format!("Failed to accept task: {err}")));
            Err(err.into())
        }
    }
}

fn ticker(period: Duration) -> time::Interval {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn report_failure(notifier: &dyn Notifier, task_id: &str, err: &ApiError) {
    counter!("choresup_route_fetch_failures_total").increment(1);
    warn!("Route fetch for task {task_id} failed: {err}");
    notifier.notify(Notice::error(format!("Failed to fetch route: {err}")));
}

fn close_view(publisher: &watch::Sender<RouteView>, notifier: &dyn Notifier) {
    warn!("Location tracking switched off, closing route view");
    notifier.notify(Notice::error(RouteError::TrackingDisabled.to_string()));
    publisher.send_modify(|view| view.closed = true);
}
