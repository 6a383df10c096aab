use std::{net::SocketAddr, path::PathBuf};

use clap::{Args, Parser, Subcommand};

/// Worker-side location tracking and live route display.
#[derive(Debug, Parser)]
#[command(name = "choresup", version)]
pub struct CliArgs {
    /// Backend base URL.
    #[arg(long = "api-url", env = "CHORESUP_API_URL", global = true, value_name = "URL")]
    pub api_url: Option<String>,
    /// Bearer token of the signed-in user.
    #[arg(long, env = "CHORESUP_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,
    /// File holding the persisted tracking state.
    #[arg(long = "state-path", env = "CHORESUP_STATE_PATH", global = true, value_name = "PATH")]
    pub state_path: Option<PathBuf>,
    /// Tile URL template for rendered frames.
    #[arg(long = "tile-url", env = "CHORESUP_TILE_URL", global = true, value_name = "TEMPLATE")]
    pub tile_url: Option<String>,
    /// Expose Prometheus metrics on this address.
    #[arg(long = "metrics-addr", global = true, value_name = "ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    #[command(subcommand)]
    pub command: CommandArgs,
}

#[derive(Debug, Subcommand)]
pub enum CommandArgs {
    /// Start tracking and push positions until interrupted.
    Track(TrackArgs),
    /// Stop tracking and clear the stored position.
    Stop,
    /// Print the persisted tracking state.
    Status,
    /// Follow the live route of a task.
    Follow(FollowArgs),
    /// Accept a requested task at the tracked position.
    Accept(AcceptArgs),
}

#[derive(Debug, Args)]
pub struct TrackArgs {
    /// File of `lat,lng` lines replayed as position updates.
    #[arg(long, value_name = "FILE")]
    pub replay: PathBuf,
    /// Delay between replayed positions.
    #[arg(long = "every-ms", value_name = "MS", default_value_t = 1000)]
    pub every_ms: u64,
    /// Start over from the first position after the last one.
    #[arg(long = "loop", action = clap::ArgAction::SetTrue)]
    pub repeat: bool,
}

#[derive(Debug, Args)]
pub struct FollowArgs {
    #[arg(value_name = "TASK_ID")]
    pub task_id: String,
    /// Route from the tracked position to a task not yet accepted.
    #[arg(long, action = clap::ArgAction::SetTrue, requires_all = ["client_lat", "client_lng"])]
    pub requested: bool,
    /// Latitude of the requested task.
    #[arg(long = "client-lat", value_name = "DEG", allow_negative_numbers = true)]
    pub client_lat: Option<f64>,
    /// Longitude of the requested task.
    #[arg(long = "client-lng", value_name = "DEG", allow_negative_numbers = true)]
    pub client_lng: Option<f64>,
    /// Position source for a requested route; defaults to the last stored position.
    #[arg(long, value_name = "FILE")]
    pub replay: Option<PathBuf>,
    /// Write the latest frame as GeoJSON to this path.
    #[arg(long, value_name = "PATH")]
    pub geojson: Option<PathBuf>,
    /// Orient the worker marker along the route instead of from the worker.
    #[arg(long = "client-view", action = clap::ArgAction::SetTrue)]
    pub client_view: bool,
    /// Viewport width in pixels.
    #[arg(long, value_name = "PX", default_value_t = 800)]
    pub width: u32,
    /// Viewport height in pixels.
    #[arg(long, value_name = "PX", default_value_t = 600)]
    pub height: u32,
}

#[derive(Debug, Args)]
pub struct AcceptArgs {
    #[arg(value_name = "TASK_ID")]
    pub task_id: String,
}
