use crate::config::PickerConfig;
use crate::error::WatchError;
use notify::event::{MetadataKind, ModifyKind};
use notify::{EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{
    new_debouncer, DebounceEventResult, DebouncedEvent, Debouncer, RecommendedCache,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Invoked from the watcher's own thread whenever the watched directory may have changed.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Starts change notifications for a single directory.
pub trait ChangeWatcher: Send + Sync + 'static {
    fn watch(&self, path: &Path, on_changed: ChangeCallback)
        -> Result<Box<dyn WatchHandle>, WatchError>;
}

/// A live registration. `stop` must be idempotent.
pub trait WatchHandle: Send {
    fn stop(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyWatcher {
    pub debounce: Duration,
}

impl NotifyWatcher {
    pub fn new(debounce: Duration) -> Self {
        Self { debounce }
    }

    pub fn from_config(config: &PickerConfig) -> Self {
        Self::new(config.watch_debounce)
    }
}

/// Whether `event` can change what a scan of the watched directory returns.
///
/// Scanning opens and reads the directory itself, so access events must never count or
/// every scan would schedule the next one.
fn is_content_change(event: &DebouncedEvent) -> bool {
    match event.event.kind {
        EventKind::Access(_) => false,
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)) => false,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => true,
        EventKind::Any | EventKind::Other => true,
    }
}

impl ChangeWatcher for NotifyWatcher {
    fn watch(
        &self,
        path: &Path,
        on_changed: ChangeCallback,
    ) -> Result<Box<dyn WatchHandle>, WatchError> {
        let watched = path.to_path_buf();
        let unavailable = |e: notify::Error| WatchError::Unavailable {
            path: watched.clone(),
            reason: e.to_string(),
        };

        let mut debouncer = new_debouncer(self.debounce, None, {
            let watched = watched.clone();
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    let changes = events.iter().filter(|e| is_content_change(e)).count();
                    if changes == 0 {
                        return;
                    }
                    debug!(
                        "WATCH_EVENT: {} change(s) under {}",
                        changes,
                        watched.display()
                    );
                    on_changed();
                }
                Err(errors) => {
                    // The watched directory vanishing surfaces here on some platforms; the
                    // next scan reports it, so the watch just goes quiet.
                    debug!("WATCH_ERROR: {} ({:?})", watched.display(), errors);
                }
            }
        })
        .map_err(unavailable)?;

        debouncer
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(unavailable)?;

        info!("WATCH_START: Watching {}", path.display());

        Ok(Box::new(ChangeWatch {
            path: path.to_path_buf(),
            debouncer: Some(debouncer),
        }))
    }
}

/// Registration returned by [`NotifyWatcher`]. Dropping it stops the watch.
pub struct ChangeWatch {
    path: PathBuf,
    debouncer: Option<Debouncer<RecommendedWatcher, RecommendedCache>>,
}

impl std::fmt::Debug for ChangeWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeWatch")
            .field("path", &self.path)
            .field("active", &self.debouncer.is_some())
            .finish()
    }
}

impl WatchHandle for ChangeWatch {
    fn stop(&mut self) {
        let Some(mut debouncer) = self.debouncer.take() else {
            return;
        };

        // Fails when the directory is already gone, which is fine: dropping the debouncer
        // releases the OS watch either way.
        if let Err(e) = debouncer.unwatch(&self.path) {
            debug!("WATCH_STOP: unwatch {} failed: {}", self.path.display(), e);
        }
        drop(debouncer);
        info!("WATCH_STOP: Stopped watching {}", self.path.display());
    }
}

impl Drop for ChangeWatch {
    fn drop(&mut self) {
        self.stop();
    }
}
