use std::{path::Path, sync::Arc, time::Duration};

use anyhow::{Context, Result, anyhow, bail};
use backend_api::{BackendApi, BackendConfig, HttpBackend, LogNotifier, Notifier};
use live_map::{MapFrame, MapRenderer, RouteTask, RouteTaskConfig, accept_requested_task};
use tracing::{info, warn};
use tracking::{
    FixedSource, GeolocationSource, JsonFileStorage, LocationPusher, LocationStorage,
    PersistedTracking, ReplaySource, TrackingState, TrackingStore, spawn_push_task,
};

use crate::{
    config::{AppConfig, Command, FollowConfig},
    telemetry::shutdown_signal,
};

/// How long `accept` waits for the first position after resuming tracking.
const FIRST_FIX_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn run(config: AppConfig) -> Result<()> {
    let storage = Arc::new(JsonFileStorage::new(&config.state_path));
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    match config.command {
        Command::Status => status(storage.as_ref()),
        Command::Stop => stop(storage.as_ref()),
        Command::Track {
            replay,
            every,
            repeat,
        } => {
            let api = connect(config.backend)?;
            let mut source = ReplaySource::from_file(&replay, every)
                .with_context(|| format!("Failed to load replay track {}", replay.display()))?;
            if repeat {
                source = source.repeating();
            }
            track(api, notifier, storage, Arc::new(source)).await
        }
        Command::Follow(follow) => {
            let api = connect(config.backend)?;
            self::follow(api, notifier, storage, follow).await
        }
        Command::Accept { task_id } => {
            let api = connect(config.backend)?;
            accept(api, notifier, storage, &task_id).await
        }
    }
}

fn connect(backend: Option<BackendConfig>) -> Result<Arc<dyn BackendApi>> {
    let backend = backend.ok_or_else(|| anyhow!("backend settings missing"))?;
    let api = HttpBackend::new(backend).context("Failed to create backend client")?;
    Ok(Arc::new(api))
}

fn status(storage: &JsonFileStorage) -> Result<()> {
    let persisted = storage.load()?;
    println!("{}", serde_json::to_string_pretty(&persisted)?);
    Ok(())
}

/// Persist the stopped state. No subscription lives outside a running
/// `track`, so writing `{None, false}` is all a stop amounts to here.
fn stop(storage: &JsonFileStorage) -> Result<()> {
    storage.save(&PersistedTracking::from(TrackingState::disabled()))?;
    info!("Location tracking disabled");
    Ok(())
}

async fn track(
    api: Arc<dyn BackendApi>,
    notifier: Arc<dyn Notifier>,
    storage: Arc<JsonFileStorage>,
    source: Arc<ReplaySource>,
) -> Result<()> {
    let store = TrackingStore::open(source, storage, notifier.clone())?;
    let _push = spawn_push_task(&store, LocationPusher::new(api, notifier));
    store.start().context("Failed to start location tracking")?;

    let mut changes = store.subscribe();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *changes.borrow_and_update();
                if !state.enabled {
                    warn!("Location tracking stopped");
                    return Ok(());
                }
                if let Some(position) = state.coordinate {
                    info!("Tracked position {:.6},{:.6}", position.latitude, position.longitude);
                }
            }
        }
    }

    store.close();
    Ok(())
}

async fn follow(
    api: Arc<dyn BackendApi>,
    notifier: Arc<dyn Notifier>,
    storage: Arc<JsonFileStorage>,
    follow: FollowConfig,
) -> Result<()> {
    let config = RouteTaskConfig {
        heading: follow.heading,
        ..RouteTaskConfig::default()
    };

    // The store has to outlive the route task that watches it.
    let mut store = None;
    let mut task = match follow.requested {
        None => RouteTask::spawn_active(api, notifier, follow.task_id.as_str(), config),
        Some(destination) => {
            let source = position_source(storage.as_ref(), follow.replay.as_deref())?;
            let opened = TrackingStore::open(source, storage, notifier.clone())?;
            let task = RouteTask::spawn_requested(
                api,
                notifier,
                &opened,
                follow.task_id.as_str(),
                destination,
                config,
            )?;
            store = Some(opened);
            task
        }
    };

    let mut renderer = MapRenderer::new(follow.style);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            view = task.changed() => {
                let Some(view) = view else { break };
                if view.closed {
                    warn!("Route view closed");
                    break;
                }
                if let Some(frame) = renderer.render(&view) {
                    log_frame(&frame);
                    if let Some(path) = follow.geojson.as_deref() {
                        write_geojson(path, &frame).await?;
                    }
                }
            }
        }
    }

    drop(task);
    if let Some(store) = store {
        store.close();
    }
    Ok(())
}

async fn accept(
    api: Arc<dyn BackendApi>,
    notifier: Arc<dyn Notifier>,
    storage: Arc<JsonFileStorage>,
    task_id: &str,
) -> Result<()> {
    let source = position_source(storage.as_ref(), None)?;
    let store = TrackingStore::open(source, storage, notifier.clone())?;

    if store.state().enabled {
        let mut changes = store.subscribe();
        tokio::time::timeout(
            FIRST_FIX_TIMEOUT,
            changes.wait_for(|state| state.coordinate.is_some()),
        )
        .await
        .context("Timed out waiting for a position")?
        .context("Tracking store closed")?;
    }

    let result = accept_requested_task(api.as_ref(), notifier.as_ref(), &store, task_id).await;
    store.close();
    result?;
    println!("Accepted task {task_id}");
    Ok(())
}

/// Replay file if given, otherwise the last stored position.
fn position_source(
    storage: &JsonFileStorage,
    replay: Option<&Path>,
) -> Result<Arc<dyn GeolocationSource>> {
    if let Some(path) = replay {
        let source = ReplaySource::from_file(path, Duration::from_secs(1))
            .with_context(|| format!("Failed to load replay track {}", path.display()))?;
        return Ok(Arc::new(source));
    }

    let state = TrackingState::from(storage.load()?);
    match state.coordinate {
        Some(position) => Ok(Arc::new(FixedSource::new(position))),
        None if state.enabled => bail!("No stored position yet; pass --replay <file>"),
        None => bail!("Please enable location tracking first (run `choresup track`)"),
    }
}

fn log_frame(frame: &MapFrame) {
    info!(
        "Route r{}: {} / {}, {} points, zoom {} at {:.5},{:.5}, {} tiles",
        frame.revision,
        frame.distance,
        frame.duration,
        frame.route.points.len(),
        frame.viewport.zoom,
        frame.viewport.center.latitude,
        frame.viewport.center.longitude,
        frame.tiles.len()
    );
    if let Some(step) = &frame.current_step {
        info!(
            "Next: {} ({}, {})",
            step.instruction, step.distance, step.duration
        );
    }
}

async fn write_geojson(path: &Path, frame: &MapFrame) -> Result<()> {
    let body = serde_json::to_vec_pretty(&frame.to_geojson())?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
