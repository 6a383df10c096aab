//! Worker location tracking.
//!
//! A [`TrackingStore`] owns the process-wide "is this worker being tracked"
//! flag and the last known coordinate. It subscribes to a
//! [`GeolocationSource`], persists every change through a [`LocationStorage`]
//! and publishes [`TrackingState`] snapshots on a watch channel. The
//! [`push`] module consumes that feed and forwards positions to the backend at
//! a bounded rate.

mod error;
pub mod push;
mod source;
mod state;
mod storage;
mod store;

pub use error::TrackingError;
pub use push::{Debounce, LocationPusher, PUSH_INTERVAL, PushOutcome, PushTask, spawn_push_task};
pub use source::{FixedSource, GeolocationError, GeolocationSource, PositionFeed, ReplaySource};
pub use state::TrackingState;
pub use storage::{
    JsonFileStorage, LocationStorage, MemoryStorage, PersistedTracking, StorageError,
    StoredLocation,
};
pub use store::TrackingStore;
