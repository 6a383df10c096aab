use std::sync::{Arc, Mutex, MutexGuard, Weak};

use backend_api::{Notice, Notifier};
use geo_core::Coordinate;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    GeolocationError, GeolocationSource, LocationStorage, PositionFeed, TrackingError,
    TrackingState,
};

/// Aborts the forwarding task when dropped.
struct WatchGuard {
    session: u64,
    handle: JoinHandle<()>,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Inner {
    state: TrackingState,
    watch: Option<WatchGuard>,
    next_session: u64,
}

/// Process-wide source of truth for the worker's tracked position.
///
/// Construct one with [`TrackingStore::open`] and share the `Arc` with every
/// view. The geolocation subscription survives views coming and going; only
/// [`stop`](Self::stop) and [`close`](Self::close) end it.
pub struct TrackingStore {
    source: Arc<dyn GeolocationSource>,
    storage: Arc<dyn LocationStorage>,
    notifier: Arc<dyn Notifier>,
    inner: Mutex<Inner>,
    publisher: watch::Sender<TrackingState>,
}

impl TrackingStore {
    /// Restore persisted state and resume tracking if it was left on.
    ///
    /// Must be called inside a Tokio runtime. A failure to resume is reported
    /// through the notifier and leaves tracking disabled.
    pub fn open(
        source: Arc<dyn GeolocationSource>,
        storage: Arc<dyn LocationStorage>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Arc<Self>, TrackingError> {
        let restored: TrackingState = storage.load()?.into();
        let (publisher, _) = watch::channel(restored);

        let store = Arc::new(Self {
            source,
            storage,
            notifier,
            inner: Mutex::new(Inner {
                state: restored,
                watch: None,
                next_session: 0,
            }),
            publisher,
        });

        if restored.enabled {
            info!("Resuming location tracking from persisted state");
            if let Err(err) = store.start() {
                warn!("Could not resume location tracking: {err}");
                store.notifier.notify(Notice::error(err.to_string()));
                store.stop()?;
            }
        }

        Ok(store)
    }

    pub fn state(&self) -> TrackingState {
        self.lock().state
    }

    pub fn is_tracking(&self) -> bool {
        self.lock().watch.is_some()
    }

    /// Change feed. The receiver starts marked as seen at the current state.
    pub fn subscribe(&self) -> watch::Receiver<TrackingState> {
        self.publisher.subscribe()
    }

    /// Subscribe to the geolocation source and mark tracking enabled.
    ///
    /// A second call while tracking is already running does nothing. If the
    /// enabled state cannot be persisted the subscription is dropped and the
    /// store is left as it was.
    pub fn start(self: &Arc<Self>) -> Result<(), TrackingError> {
        let mut inner = self.lock();
        if inner.watch.is_some() {
            return Ok(());
        }

        let feed = self.source.watch_position()?;
        let next = TrackingState {
            coordinate: inner.state.coordinate,
            enabled: true,
        };
        self.storage.save(&next.into())?;

        let session = inner.next_session;
        inner.next_session += 1;
        let handle = tokio::spawn(forward_positions(Arc::downgrade(self), session, feed));
        inner.watch = Some(WatchGuard { session, handle });
        self.publish(&mut inner, next);
        info!("Location tracking started");
        Ok(())
    }

    /// Cancel the subscription, forget the coordinate and persist `{None, false}`.
    ///
    /// Safe to call repeatedly.
    pub fn stop(&self) -> Result<(), TrackingError> {
        let mut inner = self.lock();
        self.stop_locked(&mut inner)
    }

    /// Cancel the subscription without touching persisted state.
    ///
    /// Used on shutdown so the next [`open`](Self::open) resumes tracking.
    pub fn close(&self) {
        if self.lock().watch.take().is_some() {
            debug!("Location subscription closed for shutdown");
        }
    }

    fn stop_locked(&self, inner: &mut Inner) -> Result<(), TrackingError> {
        let was_running = inner.watch.take().is_some();
        self.commit(inner, TrackingState::disabled())?;
        if was_running {
            info!("Location tracking stopped");
        }
        Ok(())
    }

    fn record(&self, session: u64, coordinate: Coordinate) {
        let mut inner = self.lock();
        if !inner.watch.as_ref().is_some_and(|w| w.session == session) {
            return;
        }
        debug!(
            "Position update {:.6},{:.6}",
            coordinate.latitude, coordinate.longitude
        );
        let next = TrackingState {
            coordinate: Some(coordinate),
            enabled: inner.state.enabled,
        };
        if let Err(err) = self.commit(&mut inner, next) {
            warn!("Failed to persist position update: {err}");
        }
    }

    fn fail(&self, session: u64, err: GeolocationError) {
        {
            let mut inner = self.lock();
            if !inner.watch.as_ref().is_some_and(|w| w.session == session) {
                return;
            }
            if let Err(err) = self.stop_locked(&mut inner) {
                warn!("Failed to persist stopped tracking state: {err}");
            }
        }
        warn!("Geolocation error, stopping tracking: {err}");
        self.notifier
            .notify(Notice::error(format!("Location tracking stopped: {err}")));
    }

    /// Replace the whole state, publish it and write it to storage.
    fn commit(&self, inner: &mut Inner, next: TrackingState) -> Result<(), TrackingError> {
        self.publish(inner, next);
        self.storage.save(&next.into())?;
        Ok(())
    }

    fn publish(&self, inner: &mut Inner, next: TrackingState) {
        inner.state = next;
        self.publisher.send_replace(next);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // State is replaced whole, so a poisoned lock still holds a consistent value.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn forward_positions(store: Weak<TrackingStore>, session: u64, mut feed: PositionFeed) {
    while let Some(update) = feed.recv().await {
        let Some(store) = store.upgrade() else {
            return;
        };
        match update {
            Ok(coordinate) => store.record(session, coordinate),
            Err(err) => {
                store.fail(session, err);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use std::{
        io,
        sync::atomic::{AtomicBool, Ordering},
    };

    use backend_api::MemoryNotifier;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{MemoryStorage, PersistedTracking, StorageError};

    /// Source whose feed is driven by the test through a sender.
    #[derive(Default)]
    struct ManualSource {
        senders: Mutex<Vec<mpsc::Sender<Result<Coordinate, GeolocationError>>>>,
        refuse: Option<GeolocationError>,
    }

    impl ManualSource {
        fn refusing(err: GeolocationError) -> Self {
            Self {
                senders: Mutex::new(Vec::new()),
                refuse: Some(err),
            }
        }

        fn subscriptions(&self) -> usize {
            self.senders.lock().unwrap().len()
        }

        async fn emit(&self, update: Result<Coordinate, GeolocationError>) {
            let tx = self.senders.lock().unwrap().last().cloned().unwrap();
            tx.send(update).await.unwrap();
        }
    }

    impl GeolocationSource for ManualSource {
        fn watch_position(&self) -> Result<PositionFeed, GeolocationError> {
            if let Some(err) = &self.refuse {
                return Err(err.clone());
            }
            let (tx, rx) = mpsc::channel(4);
            self.senders.lock().unwrap().push(tx);
            Ok(rx)
        }
    }

    struct Harness {
        source: Arc<ManualSource>,
        storage: Arc<MemoryStorage>,
        notifier: Arc<MemoryNotifier>,
    }

    impl Harness {
        fn new(source: ManualSource, storage: MemoryStorage) -> Self {
            Self {
                source: Arc::new(source),
                storage: Arc::new(storage),
                notifier: Arc::new(MemoryNotifier::new()),
            }
        }

        fn open(&self) -> Arc<TrackingStore> {
            TrackingStore::open(
                self.source.clone(),
                self.storage.clone(),
                self.notifier.clone(),
            )
            .unwrap()
        }

        fn persisted(&self) -> TrackingState {
            self.storage.load().unwrap().into()
        }
    }

    async fn settle(rx: &mut watch::Receiver<TrackingState>, want: TrackingState) {
        tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|s| *s == want))
            .await
            .expect("state never settled")
            .unwrap();
    }

    #[tokio::test]
    async fn start_then_position_update_is_stored_and_persisted() {
        let harness = Harness::new(ManualSource::default(), MemoryStorage::new());
        let store = harness.open();
        assert_eq!(store.state(), TrackingState::disabled());

        store.start().unwrap();
        let mut rx = store.subscribe();
        harness.source.emit(Ok(Coordinate::new(12.9, 77.6))).await;

        let want = TrackingState {
            coordinate: Some(Coordinate::new(12.9, 77.6)),
            enabled: true,
        };
        settle(&mut rx, want).await;
        assert_eq!(store.state(), want);
        assert_eq!(harness.persisted(), want);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let harness = Harness::new(ManualSource::default(), MemoryStorage::new());
        let store = harness.open();
        store.start().unwrap();

        store.stop().unwrap();
        assert_eq!(store.state(), TrackingState::disabled());
        assert_eq!(harness.persisted(), TrackingState::disabled());

        store.stop().unwrap();
        assert_eq!(store.state(), TrackingState::disabled());
        assert_eq!(harness.persisted(), TrackingState::disabled());
        assert!(!store.is_tracking());
    }

    #[tokio::test]
    async fn reopening_resumes_tracking_with_placeholder_coordinate() {
        let storage = MemoryStorage::with_document(
            r#"{"location":{"lat":12.9,"lng":77.6},"isTracking":true}"#,
        );
        let harness = Harness::new(ManualSource::default(), storage);
        let store = harness.open();

        assert!(store.is_tracking());
        assert_eq!(harness.source.subscriptions(), 1);
        assert_eq!(
            store.state(),
            TrackingState {
                coordinate: Some(Coordinate::new(12.9, 77.6)),
                enabled: true,
            }
        );

        let mut rx = store.subscribe();
        harness.source.emit(Ok(Coordinate::new(13.0, 77.7))).await;
        settle(
            &mut rx,
            TrackingState {
                coordinate: Some(Coordinate::new(13.0, 77.7)),
                enabled: true,
            },
        )
        .await;
    }

    #[tokio::test]
    async fn refused_permission_never_starts() {
        let harness = Harness::new(
            ManualSource::refusing(GeolocationError::PermissionDenied),
            MemoryStorage::new(),
        );
        let store = harness.open();

        let err = store.start().unwrap_err();
        assert!(matches!(
            err,
            TrackingError::Geolocation(GeolocationError::PermissionDenied)
        ));
        assert_eq!(store.state(), TrackingState::disabled());
        assert!(!store.is_tracking());
    }

    #[tokio::test]
    async fn failed_resume_disables_tracking_and_notifies() {
        let storage = MemoryStorage::with_document(r#"{"isTracking":true}"#);
        let harness = Harness::new(ManualSource::refusing(GeolocationError::Unsupported), storage);
        let store = harness.open();

        assert_eq!(store.state(), TrackingState::disabled());
        assert_eq!(harness.persisted(), TrackingState::disabled());
        assert_eq!(harness.notifier.errors(), 1);
    }

    #[tokio::test]
    async fn source_error_stops_tracking_once() {
        let harness = Harness::new(ManualSource::default(), MemoryStorage::new());
        let store = harness.open();
        store.start().unwrap();
        let mut rx = store.subscribe();

        harness
            .source
            .emit(Err(GeolocationError::Unavailable("no fix".into())))
            .await;

        settle(&mut rx, TrackingState::disabled()).await;
        assert!(!store.is_tracking());
        assert_eq!(harness.notifier.errors(), 1);
    }

    #[tokio::test]
    async fn second_start_keeps_single_subscription() {
        let harness = Harness::new(ManualSource::default(), MemoryStorage::new());
        let store = harness.open();
        store.start().unwrap();
        store.start().unwrap();
        assert_eq!(harness.source.subscriptions(), 1);
    }

    #[tokio::test]
    async fn close_keeps_persisted_flag_for_next_run() {
        let harness = Harness::new(ManualSource::default(), MemoryStorage::new());
        let store = harness.open();
        store.start().unwrap();
        store.close();

        assert!(!store.is_tracking());
        assert!(harness.persisted().enabled);
    }

    /// Memory storage whose writes can be made to fail.
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        failing: AtomicBool,
    }

    impl LocationStorage for FlakyStorage {
        fn load(&self) -> Result<PersistedTracking, StorageError> {
            self.inner.load()
        }

        fn save(&self, state: &PersistedTracking) -> Result<(), StorageError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StorageError::Io {
                    path: "tracking.json".into(),
                    source: io::Error::other("disk full"),
                });
            }
            self.inner.save(state)
        }
    }

    #[tokio::test]
    async fn unpersisted_start_leaves_tracking_off() {
        let source = Arc::new(ManualSource::default());
        let storage = Arc::new(FlakyStorage::default());
        let store = TrackingStore::open(
            source.clone(),
            storage.clone(),
            Arc::new(MemoryNotifier::new()),
        )
        .unwrap();
        let rx = store.subscribe();

        storage.failing.store(true, Ordering::SeqCst);
        let err = store.start().unwrap_err();
        assert!(matches!(err, TrackingError::Storage(_)));
        assert!(!store.is_tracking());
        assert_eq!(store.state(), TrackingState::disabled());
        assert!(!rx.has_changed().unwrap());

        storage.failing.store(false, Ordering::SeqCst);
        store.start().unwrap();
        assert!(store.is_tracking());
        let persisted: TrackingState = storage.load().unwrap().into();
        assert!(persisted.enabled);
    }

    #[tokio::test]
    async fn error_from_replaced_session_is_ignored() {
        let harness = Harness::new(ManualSource::default(), MemoryStorage::new());
        let store = harness.open();
        store.start().unwrap();
        store.stop().unwrap();
        store.start().unwrap();

        store.fail(0, GeolocationError::Unavailable("stale".into()));

        assert!(store.is_tracking());
        assert!(store.state().enabled);
        assert!(harness.persisted().enabled);
        assert!(harness.notifier.notices().is_empty());
    }
}
