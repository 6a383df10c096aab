//! Durable tracking state.
//!
//! The on-disk document mirrors the two browser storage keys the dashboard
//! has always used:
//!
//! ```json
//! { "location": { "lat": 12.9, "lng": 77.6 }, "isTracking": true }
//! ```
//!
//! `location` is omitted once tracking stops.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use geo_core::Coordinate;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::TrackingState;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to access tracking state at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode tracking state: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredLocation {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedTracking {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<StoredLocation>,
    #[serde(rename = "isTracking", default, deserialize_with = "null_as_false")]
    pub is_tracking: bool,
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

impl From<TrackingState> for PersistedTracking {
    fn from(state: TrackingState) -> Self {
        Self {
            location: state.coordinate.map(|c| StoredLocation {
                lat: Some(c.latitude),
                lng: Some(c.longitude),
            }),
            is_tracking: state.enabled,
        }
    }
}

impl From<PersistedTracking> for TrackingState {
    fn from(persisted: PersistedTracking) -> Self {
        Self {
            coordinate: persisted
                .location
                .and_then(|loc| Coordinate::from_parts(loc.lat, loc.lng)),
            enabled: persisted.is_tracking,
        }
    }
}

pub trait LocationStorage: Send + Sync {
    fn load(&self) -> Result<PersistedTracking, StorageError>;

    fn save(&self, state: &PersistedTracking) -> Result<(), StorageError>;
}

/// JSON document on the local filesystem, replaced atomically on save.
#[derive(Clone, Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl LocationStorage for JsonFileStorage {
    fn load(&self) -> Result<PersistedTracking, StorageError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(PersistedTracking::default());
            }
            Err(err) => return Err(self.io_error(err)),
        };

        Ok(decode_or_default(&text, &self.path.display().to_string()))
    }

    fn save(&self, state: &PersistedTracking) -> Result<(), StorageError> {
        let text = serde_json::to_string_pretty(state)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, text).map_err(|err| self.io_error(err))?;
        fs::rename(&tmp, &self.path).map_err(|err| self.io_error(err))
    }
}

/// Process-local storage holding the encoded document.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    document: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the storage with a raw document, as if written by an earlier run.
    pub fn with_document(text: impl Into<String>) -> Self {
        Self {
            document: Mutex::new(Some(text.into())),
        }
    }

    pub fn document(&self) -> Option<String> {
        self.document.lock().ok().and_then(|guard| guard.clone())
    }
}

impl LocationStorage for MemoryStorage {
    fn load(&self) -> Result<PersistedTracking, StorageError> {
        Ok(self
            .document()
            .map(|text| decode_or_default(&text, "memory"))
            .unwrap_or_default())
    }

    fn save(&self, state: &PersistedTracking) -> Result<(), StorageError> {
        let text = serde_json::to_string(state)?;
        if let Ok(mut guard) = self.document.lock() {
            *guard = Some(text);
        }
        Ok(())
    }
}

fn decode_or_default(text: &str, origin: &str) -> PersistedTracking {
    serde_json::from_str(text).unwrap_or_else(|err| {
        warn!("Ignoring unreadable tracking state in {origin}: {err}");
        PersistedTracking::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_round_trip_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("nested").join("tracking.json"));

        let state = TrackingState {
            coordinate: Some(Coordinate::new(12.9, 77.6)),
            enabled: true,
        };
        storage.save(&state.into()).unwrap();

        let restored: TrackingState = storage.load().unwrap().into();
        assert_eq!(restored, state);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("absent.json"));
        assert_eq!(storage.load().unwrap(), PersistedTracking::default());
    }

    #[test]
    fn corrupt_document_loads_defaults() {
        let storage = MemoryStorage::with_document("{not json");
        assert_eq!(storage.load().unwrap(), PersistedTracking::default());
    }

    #[test]
    fn document_uses_browser_keys() {
        let storage = MemoryStorage::new();
        let state = TrackingState {
            coordinate: Some(Coordinate::new(1.0, 2.0)),
            enabled: true,
        };
        storage.save(&state.into()).unwrap();

        let json: serde_json::Value = serde_json::from_str(&storage.document().unwrap()).unwrap();
        assert_eq!(json["isTracking"], true);
        assert_eq!(json["location"]["lat"], 1.0);
        assert_eq!(json["location"]["lng"], 2.0);

        storage.save(&TrackingState::disabled().into()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&storage.document().unwrap()).unwrap();
        assert_eq!(json["isTracking"], false);
        assert!(json.get("location").is_none());
    }

    #[test]
    fn null_members_restore_as_no_coordinate() {
        let storage =
            MemoryStorage::with_document(r#"{"location":{"lat":null,"lng":null},"isTracking":true}"#);
        let state: TrackingState = storage.load().unwrap().into();
        assert_eq!(state.coordinate, None);
        assert!(state.enabled);
    }

    #[test]
    fn null_tracking_flag_keeps_location() {
        let storage =
            MemoryStorage::with_document(r#"{"location":{"lat":12.9,"lng":77.6},"isTracking":null}"#);
        let state: TrackingState = storage.load().unwrap().into();
        assert_eq!(state.coordinate, Some(Coordinate::new(12.9, 77.6)));
        assert!(!state.enabled);
    }
}
