//! Deterministic stand-ins for the scanner and watcher used by unit tests.

use crate::directory_loader::{ChangeCallback, ChangeWatcher, DirectoryScanner, LoadSubscriber, WatchHandle};
use crate::error::{ScanError, WatchError};
use crate::types::{Entry, LoadEvent, Snapshot};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

pub fn channel_subscriber() -> (Arc<dyn LoadSubscriber>, mpsc::Receiver<LoadEvent>) {
    let (tx, rx) = mpsc::channel();
    let subscriber: Arc<dyn LoadSubscriber> = Arc::new(move |event: LoadEvent| {
        let _ = tx.send(event);
    });
    (subscriber, rx)
}

#[derive(Default)]
struct GateState {
    started: usize,
    permits: usize,
}

/// Serves listings from memory. When gated, every scan blocks until `release_one`.
#[derive(Default)]
pub struct FakeScanner {
    listings: Mutex<HashMap<PathBuf, Result<Vec<Entry>, ScanError>>>,
    gated: bool,
    gate: Mutex<GateState>,
    gate_changed: Condvar,
}

impl FakeScanner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            gated: true,
            ..Self::default()
        })
    }

    pub fn set_listing(&self, path: &str, entries: Vec<Entry>) {
        self.listings
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), Ok(entries));
    }

    pub fn set_error(&self, path: &str, error: ScanError) {
        self.listings
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), Err(error));
    }

    pub fn remove_listing(&self, path: &str) {
        self.listings.lock().unwrap().remove(Path::new(path));
    }

    pub fn scan_count(&self) -> usize {
        self.gate.lock().unwrap().started
    }

    pub fn wait_for_scans(&self, count: usize) {
        let gate = self.gate.lock().unwrap();
        let (gate, timeout) = self
            .gate_changed
            .wait_timeout_while(gate, EVENT_TIMEOUT, |g| g.started < count)
            .unwrap();
        assert!(
            !timeout.timed_out(),
            "expected {count} scans, saw {}",
            gate.started
        );
    }

    pub fn release_one(&self) {
        self.gate.lock().unwrap().permits += 1;
        self.gate_changed.notify_all();
    }
}

impl DirectoryScanner for FakeScanner {
    fn scan(&self, path: &Path) -> Result<Snapshot, ScanError> {
        {
            let mut gate = self.gate.lock().unwrap();
            gate.started += 1;
            self.gate_changed.notify_all();

            if self.gated {
                let mut gate = self
                    .gate_changed
                    .wait_while(gate, |g| g.permits == 0)
                    .unwrap();
                gate.permits -= 1;
            }
        }

        let listing = self.listings.lock().unwrap().get(path).cloned();
        match listing {
            Some(Ok(entries)) => Ok(Snapshot::new(path.to_path_buf(), entries)),
            Some(Err(error)) => Err(error),
            None => Err(ScanError::NotFound(path.to_path_buf())),
        }
    }
}

struct Registration {
    path: PathBuf,
    callback: ChangeCallback,
    stopped: Arc<AtomicBool>,
}

/// Records registrations so tests can fire change signals by hand.
#[derive(Default)]
pub struct FakeWatcher {
    registrations: Mutex<Vec<Registration>>,
    active: Arc<AtomicUsize>,
    failing: bool,
}

impl FakeWatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            failing: true,
            ..Self::default()
        })
    }

    pub fn active_watches(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn watch_count(&self) -> usize {
        self.registrations.lock().unwrap().len()
    }

    /// Latest registration for `path`, stopped or not.
    pub fn callback_for(&self, path: &str) -> Option<ChangeCallback> {
        self.registrations
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.path == Path::new(path))
            .map(|r| Arc::clone(&r.callback))
    }

    /// Fires every live registration for `path`.
    pub fn fire(&self, path: &str) {
        let callbacks: Vec<ChangeCallback> = self
            .registrations
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == Path::new(path) && !r.stopped.load(Ordering::SeqCst))
            .map(|r| Arc::clone(&r.callback))
            .collect();

        for callback in callbacks {
            callback();
        }
    }
}

impl ChangeWatcher for FakeWatcher {
    fn watch(
        &self,
        path: &Path,
        on_changed: ChangeCallback,
    ) -> Result<Box<dyn WatchHandle>, WatchError> {
        if self.failing {
            return Err(WatchError::Unavailable {
                path: path.to_path_buf(),
                reason: "watch limit reached".to_string(),
            });
        }

        let stopped = Arc::new(AtomicBool::new(false));
        self.registrations.lock().unwrap().push(Registration {
            path: path.to_path_buf(),
            callback: on_changed,
            stopped: Arc::clone(&stopped),
        });
        self.active.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(FakeHandle {
            stopped,
            active: Arc::clone(&self.active),
        }))
    }
}

struct FakeHandle {
    stopped: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
}

impl WatchHandle for FakeHandle {
    fn stop(&mut self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
