//! Translation of CLI arguments into an [`AppConfig`] the commands run from
//! without re-reading flags or the environment.

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{Result, anyhow, bail};
use backend_api::BackendConfig;
use geo_core::Coordinate;
use live_map::{Heading, MapStyle, OSM_ATTRIBUTION, TileLayer};

use crate::cli::{CliArgs, CommandArgs};

const DEFAULT_STATE_PATH: &str = ".choresup/tracking.json";

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Present for every command that talks to the backend.
    pub backend: Option<BackendConfig>,
    pub state_path: PathBuf,
    pub telemetry: TelemetryOptions,
    pub command: Command,
}

#[derive(Clone, Debug, Default)]
pub struct TelemetryOptions {
    pub metrics_addr: Option<SocketAddr>,
}

#[derive(Clone, Debug)]
pub enum Command {
    Track {
        replay: PathBuf,
        every: Duration,
        repeat: bool,
    },
    Stop,
    Status,
    Follow(FollowConfig),
    Accept {
        task_id: String,
    },
}

#[derive(Clone, Debug)]
pub struct FollowConfig {
    pub task_id: String,
    /// Destination of a requested task; `None` follows an active task.
    pub requested: Option<Coordinate>,
    pub replay: Option<PathBuf>,
    pub geojson: Option<PathBuf>,
    pub heading: Heading,
    pub style: MapStyle,
}

impl Command {
    fn needs_backend(&self) -> bool {
        matches!(
            self,
            Command::Track { .. } | Command::Follow(_) | Command::Accept { .. }
        )
    }
}

impl TryFrom<CliArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self> {
        let command = match args.command {
            CommandArgs::Track(track) => {
                if track.every_ms == 0 {
                    bail!("--every-ms must be at least 1");
                }
                Command::Track {
                    replay: track.replay,
                    every: Duration::from_millis(track.every_ms),
                    repeat: track.repeat,
                }
            }
            CommandArgs::Stop => Command::Stop,
            CommandArgs::Status => Command::Status,
            CommandArgs::Follow(follow) => {
                if follow.width == 0 || follow.height == 0 {
                    bail!("Viewport width and height must be positive integers");
                }
                let requested = if follow.requested {
                    let destination = Coordinate::from_parts(follow.client_lat, follow.client_lng)
                        .ok_or_else(|| {
                            anyhow!("--requested needs both --client-lat and --client-lng")
                        })?;
                    if destination.latitude.abs() > 90.0 || destination.longitude.abs() > 180.0 {
                        bail!("Client position out of range");
                    }
                    Some(destination)
                } else {
                    None
                };

                let mut style = MapStyle {
                    width: follow.width,
                    height: follow.height,
                    ..MapStyle::default()
                };
                if let Some(template) = args.tile_url.as_deref() {
                    if !template.contains("{x}") || !template.contains("{y}") {
                        bail!("--tile-url must contain {{x}} and {{y}} placeholders");
                    }
                    style.tiles = TileLayer::new(template, OSM_ATTRIBUTION);
                }

                Command::Follow(FollowConfig {
                    task_id: follow.task_id,
                    requested,
                    replay: follow.replay,
                    geojson: follow.geojson,
                    heading: if follow.client_view {
                        Heading::AlongRoute
                    } else {
                        Heading::FromMover
                    },
                    style,
                })
            }
            CommandArgs::Accept(accept) => Command::Accept {
                task_id: accept.task_id,
            },
        };

        let backend = if command.needs_backend() {
            let url = args
                .api_url
                .ok_or_else(|| anyhow!("Missing backend URL. Provide --api-url or CHORESUP_API_URL."))?;
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                bail!("Backend URL must start with http:// or https://");
            }
            let token = args
                .token
                .filter(|token| !token.trim().is_empty())
                .ok_or_else(|| anyhow!("Missing token. Provide --token or CHORESUP_TOKEN."))?;
            Some(BackendConfig::new(url).with_token(token))
        } else {
            None
        };

        Ok(Self {
            backend,
            state_path: args
                .state_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH)),
            telemetry: TelemetryOptions {
                metrics_addr: args.metrics_addr,
            },
            command,
        })
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn parse(argv: &[&str]) -> Result<AppConfig> {
        let mut full = vec!["choresup"];
        full.extend_from_slice(argv);
        AppConfig::try_from(CliArgs::try_parse_from(full)?)
    }

    #[test]
    fn status_needs_no_backend() {
        let config = parse(&["status", "--state-path", "/tmp/state.json"]).unwrap();
        assert!(config.backend.is_none());
        assert_eq!(config.state_path, PathBuf::from("/tmp/state.json"));
        assert!(matches!(config.command, Command::Status));
    }

    #[test]
    fn track_requires_token() {
        let err = parse(&[
            "--api-url",
            "https://api.example.com",
            "--token",
            " ",
            "track",
            "--replay",
            "route.txt",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("token"));
    }

    #[test]
    fn track_builds_backend_and_replay() {
        let config = parse(&[
            "track",
            "--replay",
            "route.txt",
            "--every-ms",
            "250",
            "--api-url",
            "https://api.example.com/",
            "--token",
            "secret",
        ])
        .unwrap();

        let backend = config.backend.unwrap();
        assert_eq!(backend.base_url, "https://api.example.com/");
        assert_eq!(backend.token.as_deref(), Some("secret"));
        match config.command {
            Command::Track { replay, every, repeat } => {
                assert_eq!(replay, PathBuf::from("route.txt"));
                assert_eq!(every, Duration::from_millis(250));
                assert!(!repeat);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_non_http_url() {
        let err = parse(&[
            "--api-url",
            "ftp://api.example.com",
            "--token",
            "secret",
            "accept",
            "req-1",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("http"));
    }

    #[test]
    fn requested_follow_reads_destination() {
        let config = parse(&[
            "--api-url",
            "http://localhost:5000",
            "--token",
            "secret",
            "follow",
            "req-9",
            "--requested",
            "--client-lat",
            "12.95",
            "--client-lng",
            "77.64",
            "--client-view",
        ])
        .unwrap();

        let Command::Follow(follow) = config.command else {
            panic!("expected follow");
        };
        assert_eq!(follow.requested, Some(Coordinate::new(12.95, 77.64)));
        assert_eq!(follow.heading, Heading::AlongRoute);
        assert_eq!(follow.style.padding, 50);
        assert_eq!(follow.style.default_zoom, 14);
    }

    #[test]
    fn requested_follow_without_destination_is_rejected() {
        assert!(
            parse(&[
                "--api-url",
                "http://localhost:5000",
                "--token",
                "secret",
                "follow",
                "req-9",
                "--requested",
            ])
            .is_err()
        );
    }

    #[test]
    fn zero_sized_viewport_is_rejected() {
        let err = parse(&[
            "--api-url",
            "http://localhost:5000",
            "--token",
            "secret",
            "follow",
            "task-1",
            "--width",
            "0",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn custom_tile_template_is_validated() {
        let base = [
            "--api-url",
            "http://localhost:5000",
            "--token",
            "secret",
            "follow",
            "task-1",
            "--tile-url",
        ];

        let mut bad = base.to_vec();
        bad.push("https://tiles.example.com/{z}.png");
        assert!(parse(&bad).is_err());

        let mut good = base.to_vec();
        good.push("https://tiles.example.com/{z}/{x}/{y}.png");
        let Command::Follow(follow) = parse(&good).unwrap().command else {
            panic!("expected follow");
        };
        assert_eq!(
            follow.style.tiles.url_template,
            "https://tiles.example.com/{z}/{x}/{y}.png"
        );
    }
}
