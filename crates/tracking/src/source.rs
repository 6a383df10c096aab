//! Device position providers.

use std::{fs, path::Path, time::Duration};

use geo_core::Coordinate;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GeolocationError {
    #[error("geolocation is not supported on this device")]
    Unsupported,

    #[error("permission to read the device location was denied")]
    PermissionDenied,

    #[error("position unavailable: {0}")]
    Unavailable(String),

    #[error("invalid replay input at line {line}: {reason}")]
    Replay { line: usize, reason: String },
}

/// Stream of position fixes. Dropping the receiver ends the subscription.
pub type PositionFeed = mpsc::Receiver<Result<Coordinate, GeolocationError>>;

/// Continuous position provider.
pub trait GeolocationSource: Send + Sync {
    /// Begin delivering position updates. Errors here mean tracking cannot start.
    fn watch_position(&self) -> Result<PositionFeed, GeolocationError>;
}

/// Replays a recorded track at a fixed cadence.
#[derive(Clone, Debug)]
pub struct ReplaySource {
    points: Vec<Coordinate>,
    every: Duration,
    repeat: bool,
}

impl ReplaySource {
    pub fn new(points: Vec<Coordinate>, every: Duration) -> Self {
        Self {
            points,
            every,
            repeat: false,
        }
    }

    /// Loop back to the first point after the last one.
    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    /// Parse `lat,lng` lines. Blank lines and `#` comments are skipped.
    pub fn parse(text: &str, every: Duration) -> Result<Self, GeolocationError> {
        let mut points = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let replay_error = |reason: &str| GeolocationError::Replay {
                line: idx + 1,
                reason: reason.to_string(),
            };
            let (lat, lng) = line
                .split_once(',')
                .ok_or_else(|| replay_error("expected `lat,lng`"))?;
            let lat = lat
                .trim()
                .parse::<f64>()
                .map_err(|_| replay_error("latitude is not a number"))?;
            let lng = lng
                .trim()
                .parse::<f64>()
                .map_err(|_| replay_error("longitude is not a number"))?;
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
                return Err(replay_error("coordinate out of range"));
            }
            points.push(Coordinate::new(lat, lng));
        }
        Ok(Self::new(points, every))
    }

    pub fn from_file(path: &Path, every: Duration) -> Result<Self, GeolocationError> {
        let text = fs::read_to_string(path)
            .map_err(|err| GeolocationError::Unavailable(format!("{}: {err}", path.display())))?;
        Self::parse(&text, every)
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }
}

impl GeolocationSource for ReplaySource {
    fn watch_position(&self) -> Result<PositionFeed, GeolocationError> {
        if self.points.is_empty() {
            return Err(GeolocationError::Unavailable("replay track is empty".into()));
        }

        let (tx, rx) = mpsc::channel(8);
        let points = self.points.clone();
        let every = self.every;
        let repeat = self.repeat;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                for point in &points {
                    interval.tick().await;
                    if tx.send(Ok(*point)).await.is_err() {
                        debug!("Replay subscriber went away");
                        return;
                    }
                }
                if !repeat {
                    break;
                }
            }
            // Keep the feed open like a device that stopped moving.
            tx.closed().await;
        });

        Ok(rx)
    }
}

/// Reports a single unchanging position.
#[derive(Clone, Copy, Debug)]
pub struct FixedSource {
    position: Coordinate,
}

impl FixedSource {
    pub fn new(position: Coordinate) -> Self {
        Self { position }
    }
}

impl GeolocationSource for FixedSource {
    fn watch_position(&self) -> Result<PositionFeed, GeolocationError> {
        let (tx, rx) = mpsc::channel(1);
        let position = self.position;
        tokio::spawn(async move {
            if tx.send(Ok(position)).await.is_ok() {
                tx.closed().await;
            }
        });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_track_file() {
        let text = "# morning route\n12.90,77.60\n\n 12.91 , 77.61 \n";
        let source = ReplaySource::parse(text, Duration::from_secs(1)).unwrap();
        assert_eq!(
            source.points(),
            &[Coordinate::new(12.90, 77.60), Coordinate::new(12.91, 77.61)]
        );
    }

    #[test]
    fn reports_bad_line_number() {
        let err = ReplaySource::parse("12.9,77.6\n12.9;77.6\n", Duration::from_secs(1)).unwrap_err();
        assert_eq!(
            err,
            GeolocationError::Replay {
                line: 2,
                reason: "expected `lat,lng`".into()
            }
        );
        assert!(ReplaySource::parse("95.0,10.0", Duration::from_secs(1)).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn replay_emits_every_point_in_order() {
        let source = ReplaySource::new(
            vec![Coordinate::new(1.0, 1.0), Coordinate::new(2.0, 2.0)],
            Duration::from_secs(5),
        );
        let mut feed = source.watch_position().unwrap();
        assert_eq!(feed.recv().await, Some(Ok(Coordinate::new(1.0, 1.0))));
        assert_eq!(feed.recv().await, Some(Ok(Coordinate::new(2.0, 2.0))));
    }

    #[test]
    fn empty_replay_cannot_start() {
        let source = ReplaySource::new(Vec::new(), Duration::from_secs(1));
        assert!(matches!(
            source.watch_position(),
            Err(GeolocationError::Unavailable(_))
        ));
    }
}
