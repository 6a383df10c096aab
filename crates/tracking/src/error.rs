use thiserror::Error;

use crate::{GeolocationError, StorageError};

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("location tracking unavailable: {0}")]
    Geolocation(#[from] GeolocationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
