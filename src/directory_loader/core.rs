use crate::error::{Error, ScanError};
use crate::path_utils::normalize_path;
use crate::types::{LoadEvent, Snapshot};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread;
use tracing::{debug, error, info, warn};

use super::scanner::DirectoryScanner;
use super::watcher::{ChangeWatcher, WatchHandle};

/// Receives the results of a load session.
///
/// Events arrive one at a time in the order the loader produced them. `deliver` runs
/// without any loader lock held, so it may call back into the [`DirectoryLoader`]; events
/// produced by such a call are delivered after it returns.
pub trait LoadSubscriber: Send + Sync + 'static {
    fn deliver(&self, event: LoadEvent);
}

impl<F> LoadSubscriber for F
where
    F: Fn(LoadEvent) + Send + Sync + 'static,
{
    fn deliver(&self, event: LoadEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Delivered,
    /// Paused: no subscriber, cache and watch retained.
    Stopped,
    /// Reset or shut down. Watch, cache and subscriber are gone; the next `start` opens a
    /// fresh session.
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// Keep the cached snapshot and the watch; remember changes seen meanwhile.
    Pause,
    /// Release the session completely.
    Reset,
}

#[derive(Debug, Clone, Copy)]
struct InFlightScan {
    id: u64,
    cancelled: bool,
}

struct Delivery {
    session_id: u64,
    subscriber: Arc<dyn LoadSubscriber>,
    event: LoadEvent,
}

/// Events waiting to be handed to subscribers, drained by one thread at a time.
#[derive(Default)]
struct Outbox {
    queue: VecDeque<Delivery>,
    draining: bool,
}

struct LoadSession {
    id: u64,
    target: PathBuf,
    state: LoadState,
    snapshot: Option<Arc<Snapshot>>,
    watch: Option<Box<dyn WatchHandle>>,
    in_flight: Option<InFlightScan>,
    rescan_pending: bool,
    /// Set when a change was seen (or a scan thrown away) while paused.
    content_changed: bool,
    subscriber: Option<Arc<dyn LoadSubscriber>>,
    next_scan_id: u64,
    generation: u64,
}

impl LoadSession {
    fn new(id: u64, target: PathBuf) -> Self {
        Self {
            id,
            target,
            state: LoadState::Idle,
            snapshot: None,
            watch: None,
            in_flight: None,
            rescan_pending: false,
            content_changed: false,
            subscriber: None,
            next_scan_id: 0,
            generation: 0,
        }
    }

    /// What stays observable of a session after it was released.
    fn released(&self) -> Self {
        Self {
            state: LoadState::Released,
            ..Self::new(self.id, self.target.clone())
        }
    }

    fn is_paused(&self) -> bool {
        self.state == LoadState::Stopped
    }

    fn is_released(&self) -> bool {
        self.state == LoadState::Released
    }

    fn release(mut self, reason: &str) {
        if self.is_released() {
            return;
        }
        if let Some(mut watch) = self.watch.take() {
            watch.stop();
        }
        if self.in_flight.is_some() {
            debug!(
                "LOAD_RELEASE: abandoning in-flight scan of {}",
                self.target.display()
            );
        }
        self.snapshot = None;
        self.subscriber = None;
        self.state = LoadState::Released;
        info!(
            "LOAD_RELEASE: session {} for {} released ({})",
            self.id,
            self.target.display(),
            reason
        );
    }
}

struct LoaderShared {
    scanner: Arc<dyn DirectoryScanner>,
    watcher: Arc<dyn ChangeWatcher>,
    session: Mutex<Option<LoadSession>>,
    outbox: Mutex<Outbox>,
    next_session_id: AtomicU64,
}

/// Clears the draining flag if a subscriber panics so later events still go out.
struct DrainGuard<'a>(&'a LoaderShared);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.lock_outbox().draining = false;
        }
    }
}

impl LoaderShared {
    fn lock_session(&self) -> MutexGuard<'_, Option<LoadSession>> {
        match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("Session mutex poisoned, recovering: {:?}", poisoned);
                poisoned.into_inner()
            }
        }
    }

    fn lock_outbox(&self) -> MutexGuard<'_, Outbox> {
        match self.outbox.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("Outbox mutex poisoned, recovering: {:?}", poisoned);
                poisoned.into_inner()
            }
        }
    }

    /// Queues `event` for the session's subscriber. Called with the session lock held, so
    /// the queue order is the order in which the session changed.
    fn enqueue(&self, session: &LoadSession, event: LoadEvent) {
        let Some(subscriber) = &session.subscriber else {
            return;
        };
        self.lock_outbox().queue.push_back(Delivery {
            session_id: session.id,
            subscriber: Arc::clone(subscriber),
            event,
        });
    }

    /// Drops queued events of a session whose subscriber was detached.
    fn discard_queued(&self, session_id: u64) {
        self.lock_outbox()
            .queue
            .retain(|delivery| delivery.session_id != session_id);
    }

    /// Hands queued events to subscribers. Must be called without the session lock.
    ///
    /// A call made while another thread (or an outer frame of this one) is draining returns
    /// at once; the active drainer picks up whatever was queued.
    fn flush(&self) {
        {
            let mut outbox = self.lock_outbox();
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }

        let _guard = DrainGuard(self);
        loop {
            let delivery = {
                let mut outbox = self.lock_outbox();
                match outbox.queue.pop_front() {
                    Some(delivery) => delivery,
                    None => {
                        outbox.draining = false;
                        return;
                    }
                }
            };
            delivery.subscriber.deliver(delivery.event);
        }
    }

    fn ensure_watch(self: &Arc<Self>, session: &mut LoadSession) {
        if session.watch.is_some() {
            return;
        }

        let weak = Arc::downgrade(self);
        let session_id = session.id;
        let on_changed = Arc::new(move || {
            if let Some(shared) = Weak::upgrade(&weak) {
                shared.on_content_changed(session_id);
            }
        });

        match self.watcher.watch(&session.target, on_changed) {
            Ok(handle) => session.watch = Some(handle),
            Err(e) => {
                warn!("WATCH_DEGRADED: {}; listing will only refresh on demand", e);
            }
        }
    }

    fn issue_scan(self: &Arc<Self>, session: &mut LoadSession) {
        session.next_scan_id += 1;
        let scan_id = session.next_scan_id;
        session.in_flight = Some(InFlightScan {
            id: scan_id,
            cancelled: false,
        });
        session.rescan_pending = false;
        session.state = LoadState::Loading;

        let scanner = Arc::clone(&self.scanner);
        let weak = Arc::downgrade(self);
        let session_id = session.id;
        let target = session.target.clone();
        debug!(
            "LOAD_SCAN: session {} scan {} for {}",
            session_id,
            scan_id,
            target.display()
        );

        thread::spawn(move || {
            let result = scanner.scan(&target);
            match Weak::upgrade(&weak) {
                Some(shared) => shared.complete_scan(session_id, scan_id, result),
                None => debug!("LOAD_SCAN: loader dropped before scan of {} finished", target.display()),
            }
        });
    }

    /// Something may have changed after any scan currently running read the directory.
    fn request_rescan(self: &Arc<Self>, session: &mut LoadSession) {
        if session.in_flight.is_some() {
            session.rescan_pending = true;
            session.state = LoadState::Loading;
        } else {
            self.issue_scan(session);
        }
    }

    /// Make sure some scan will produce a listing for the current subscriber.
    fn ensure_loaded(self: &Arc<Self>, session: &mut LoadSession) {
        match session.in_flight {
            Some(scan) if !scan.cancelled => session.state = LoadState::Loading,
            Some(_) => {
                session.rescan_pending = true;
                session.state = LoadState::Loading;
            }
            None => self.issue_scan(session),
        }
    }

    fn on_content_changed(self: &Arc<Self>, session_id: u64) {
        let mut guard = self.lock_session();
        let Some(session) = guard.as_mut() else {
            return;
        };
        if session.id != session_id || session.is_released() {
            return;
        }

        if session.is_paused() {
            debug!("LOAD_CHANGE: {} changed while paused", session.target.display());
            session.content_changed = true;
        } else {
            debug!("LOAD_CHANGE: {} changed", session.target.display());
            self.request_rescan(session);
        }
    }

    fn complete_scan(
        self: &Arc<Self>,
        session_id: u64,
        scan_id: u64,
        result: Result<Snapshot, ScanError>,
    ) {
        self.record_scan(session_id, scan_id, result);
        self.flush();
    }

    fn record_scan(
        self: &Arc<Self>,
        session_id: u64,
        scan_id: u64,
        result: Result<Snapshot, ScanError>,
    ) {
        let mut guard = self.lock_session();
        let Some(session) = guard.as_mut() else {
            debug!("LOAD_STALE: no active session, dropping scan result");
            return;
        };
        if session.id != session_id {
            debug!(
                "LOAD_STALE: result of session {} superseded by session {}",
                session_id, session.id
            );
            return;
        }

        let in_flight = match session.in_flight {
            Some(scan) if scan.id == scan_id => scan,
            _ => {
                debug!("LOAD_STALE: unexpected scan {} completed", scan_id);
                return;
            }
        };
        session.in_flight = None;

        if in_flight.cancelled {
            debug!(
                "LOAD_STALE: scan {} of {} was cancelled, discarding",
                scan_id,
                session.target.display()
            );
            if !session.is_paused() && session.snapshot.is_some() {
                session.state = LoadState::Delivered;
            }
        } else {
            match result {
                Ok(mut snapshot) => {
                    session.generation += 1;
                    snapshot.generation = session.generation;
                    let snapshot = Arc::new(snapshot);
                    session.snapshot = Some(Arc::clone(&snapshot));
                    session.state = LoadState::Delivered;
                    info!(
                        "LOAD_DELIVER: {} entries for {} (generation {})",
                        snapshot.len(),
                        session.target.display(),
                        snapshot.generation
                    );
                    self.enqueue(session, LoadEvent::Snapshot(snapshot));
                }
                Err(error) => {
                    warn!("LOAD_ERROR: {}", error);
                    session.snapshot = None;
                    session.state = LoadState::Delivered;
                    let event = LoadEvent::DirectoryGone {
                        path: session.target.clone(),
                        error,
                    };
                    self.enqueue(session, event);
                }
            }
        }

        if session.rescan_pending {
            if session.is_paused() {
                session.rescan_pending = false;
                session.content_changed = true;
            } else {
                self.issue_scan(session);
            }
        }
    }
}

/// Loads one directory at a time off the calling thread and keeps its listing live.
///
/// Every public method only takes the session lock briefly; scanning happens on worker
/// threads and results reach the registered [`LoadSubscriber`].
pub struct DirectoryLoader {
    shared: Arc<LoaderShared>,
}

impl std::fmt::Debug for DirectoryLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryLoader")
            .field("target", &self.target())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl DirectoryLoader {
    pub fn new(scanner: Arc<dyn DirectoryScanner>, watcher: Arc<dyn ChangeWatcher>) -> Self {
        Self {
            shared: Arc::new(LoaderShared {
                scanner,
                watcher,
                session: Mutex::new(None),
                outbox: Mutex::new(Outbox::default()),
                next_session_id: AtomicU64::new(1),
            }),
        }
    }

    /// Targets `path` and registers `subscriber` for its results.
    ///
    /// A session for another path is released first. Restarting the current path hands the
    /// cached snapshot over right away and only rescans when a change was missed.
    pub fn start(
        &self,
        path: impl AsRef<Path>,
        subscriber: Arc<dyn LoadSubscriber>,
    ) -> Result<(), Error> {
        let target = normalize_path(path.as_ref())?;
        let shared = &self.shared;

        let mut released = None;
        {
            let mut guard = shared.lock_session();
            let same_target = guard
                .as_ref()
                .is_some_and(|s| s.target == target && !s.is_released());
            if !same_target {
                released = guard.take();
                if let Some(previous) = &released {
                    shared.discard_queued(previous.id);
                }
                let id = shared.next_session_id.fetch_add(1, Ordering::Relaxed);
                info!("LOAD_START: session {} for {}", id, target.display());
                *guard = Some(LoadSession::new(id, target));
            }

            let Some(session) = guard.as_mut() else {
                return Ok(());
            };

            session.subscriber = Some(subscriber);
            if session.is_paused() || session.state == LoadState::Idle {
                session.state = if session.snapshot.is_some() {
                    LoadState::Delivered
                } else {
                    LoadState::Idle
                };
            }

            if let Some(snapshot) = &session.snapshot {
                debug!(
                    "LOAD_CACHED: redelivering generation {} of {}",
                    snapshot.generation,
                    session.target.display()
                );
                shared.enqueue(session, LoadEvent::Snapshot(Arc::clone(snapshot)));
            }

            shared.ensure_watch(session);

            if session.content_changed {
                session.content_changed = false;
                shared.request_rescan(session);
            } else if session.snapshot.is_none() {
                shared.ensure_loaded(session);
            }
        }

        if let Some(previous) = released {
            previous.release("retarget");
        }
        shared.flush();
        Ok(())
    }

    pub fn stop(&self, mode: StopMode) {
        match mode {
            StopMode::Pause => {
                let mut guard = self.shared.lock_session();
                let Some(session) = guard.as_mut().filter(|s| !s.is_released()) else {
                    return;
                };

                session.subscriber = None;
                self.shared.discard_queued(session.id);
                if let Some(scan) = session.in_flight.as_mut() {
                    if !scan.cancelled {
                        scan.cancelled = true;
                        session.content_changed = true;
                    }
                }
                if session.rescan_pending {
                    session.rescan_pending = false;
                    session.content_changed = true;
                }
                session.state = LoadState::Stopped;
                debug!("LOAD_PAUSE: {}", session.target.display());
            }
            StopMode::Reset => {
                let released = {
                    let mut guard = self.shared.lock_session();
                    let tombstone = guard
                        .as_ref()
                        .filter(|s| !s.is_released())
                        .map(LoadSession::released);
                    let released = tombstone.and_then(|t| guard.replace(t));
                    if let Some(session) = &released {
                        self.shared.discard_queued(session.id);
                    }
                    released
                };
                if let Some(session) = released {
                    session.release("reset");
                }
            }
        }
    }

    /// Forces a rescan of the active session. Returns false when nothing is being observed.
    pub fn refresh(&self) -> bool {
        let mut guard = self.shared.lock_session();
        match guard.as_mut() {
            Some(session) if !session.is_paused() && !session.is_released() => {
                self.shared.request_rescan(session);
                true
            }
            _ => false,
        }
    }

    /// Releases the active session and its watch unconditionally.
    pub fn shutdown(&self) {
        self.stop(StopMode::Reset);
    }

    pub fn state(&self) -> Option<LoadState> {
        self.shared.lock_session().as_ref().map(|s| s.state)
    }

    pub fn target(&self) -> Option<PathBuf> {
        self.shared.lock_session().as_ref().map(|s| s.target.clone())
    }

    pub fn cached_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.shared
            .lock_session()
            .as_ref()
            .and_then(|s| s.snapshot.clone())
    }

    /// Whether the active session receives change notifications.
    pub fn is_live(&self) -> bool {
        self.shared
            .lock_session()
            .as_ref()
            .is_some_and(|s| s.watch.is_some())
    }

    pub fn is_loading(&self) -> bool {
        self.shared
            .lock_session()
            .as_ref()
            .is_some_and(|s| s.in_flight.is_some())
    }
}

impl Drop for DirectoryLoader {
    fn drop(&mut self) {
        self.shutdown();
    }
}
