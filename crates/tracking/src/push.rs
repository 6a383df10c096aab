//! Debounced location push.
//!
//! Every [`TrackingState`] change is offered to a [`LocationPusher`]. At most
//! one `PUT /task/updatelocation` goes out per [`PUSH_INTERVAL`], counted from
//! the previous attempt whether or not it succeeded. Failures surface as a
//! notice; the next eligible change simply tries again.

use std::{sync::Arc, time::Duration};

use backend_api::{BackendApi, Notice, Notifier};
use metrics::counter;
use tokio::{task::JoinHandle, time::Instant};
use tracing::{debug, warn};

use crate::{TrackingState, TrackingStore};

pub const PUSH_INTERVAL: Duration = Duration::from_secs(10);

/// Admits one action per window, measured from the last admitted one.
#[derive(Clone, Debug)]
pub struct Debounce {
    window: Duration,
    last: Option<Instant>,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Returns `true` and restarts the window if `now` is outside it.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.window => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Tracking off or no fix yet.
    Skipped,
    /// Inside the debounce window.
    Debounced,
    Sent,
    Failed,
}

pub struct LocationPusher {
    api: Arc<dyn BackendApi>,
    notifier: Arc<dyn Notifier>,
    debounce: Debounce,
}

impl LocationPusher {
    pub fn new(api: Arc<dyn BackendApi>, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_interval(api, notifier, PUSH_INTERVAL)
    }

    pub fn with_interval(
        api: Arc<dyn BackendApi>,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
    ) -> Self {
        Self {
            api,
            notifier,
            debounce: Debounce::new(interval),
        }
    }

    pub async fn on_change(&mut self, state: TrackingState) -> PushOutcome {
        let Some(position) = state.live_position() else {
            return PushOutcome::Skipped;
        };
        if !self.debounce.try_acquire(Instant::now()) {
            return PushOutcome::Debounced;
        }

        counter!("choresup_location_pushes_total").increment(1);
        match self.api.update_location(position).await {
            Ok(()) => {
                debug!(
                    "Pushed location {:.6},{:.6}",
                    position.latitude, position.longitude
                );
                PushOutcome::Sent
            }
            Err(err) => {
                counter!("choresup_location_push_failures_total").increment(1);
                warn!("Location push failed: {err}");
                self.notifier
                    .notify(Notice::error(format!("Failed to update location: {err}")));
                PushOutcome::Failed
            }
        }
    }
}

/// Running push loop. Dropping the handle stops it.
pub struct PushTask {
    handle: JoinHandle<()>,
}

impl PushTask {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PushTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Feed every state change of `store` to `pusher` until the handle is dropped.
pub fn spawn_push_task(store: &TrackingStore, mut pusher: LocationPusher) -> PushTask {
    let mut changes = store.subscribe();
    let handle = tokio::spawn(async move {
        loop {
            let state = *changes.borrow_and_update();
            pusher.on_change(state).await;
            if changes.changed().await.is_err() {
                debug!("Tracking store dropped, push loop exiting");
                break;
            }
        }
    });
    PushTask { handle }
}
