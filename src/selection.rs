use crate::config::PickerConfig;
use crate::directory_loader::{
    ChangeWatcher, DirectoryLoader, DirectoryScanner, FsScanner, LoadSubscriber, NotifyWatcher,
    StopMode,
};
use crate::error::Error;
use crate::navigation::NavigationStack;
use crate::types::{Entry, SavedState, SelectionOutcome, Step};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Entry and exit point of a picking session: turns user input into navigation and,
/// eventually, a [`SelectionOutcome`].
pub struct SelectionController {
    config: PickerConfig,
    stack: NavigationStack,
    loader: DirectoryLoader,
    subscriber: Arc<dyn LoadSubscriber>,
    outcome: Option<SelectionOutcome>,
}

impl std::fmt::Debug for SelectionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionController")
            .field("config", &self.config)
            .field("stack", &self.stack)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

impl SelectionController {
    /// Opens a picker on the local file system, starting at the configured root.
    pub fn new(config: PickerConfig, subscriber: Arc<dyn LoadSubscriber>) -> Result<Self, Error> {
        Self::restore(config, subscriber, None)
    }

    /// Opens a picker whose current directory comes from a previous session.
    pub fn restore(
        config: PickerConfig,
        subscriber: Arc<dyn LoadSubscriber>,
        saved: Option<&SavedState>,
    ) -> Result<Self, Error> {
        let scanner = Arc::new(FsScanner::from_config(&config));
        let watcher = Arc::new(NotifyWatcher::from_config(&config));
        Self::with_components(config, scanner, watcher, subscriber, saved)
    }

    pub fn with_components(
        config: PickerConfig,
        scanner: Arc<dyn DirectoryScanner>,
        watcher: Arc<dyn ChangeWatcher>,
        subscriber: Arc<dyn LoadSubscriber>,
        saved: Option<&SavedState>,
    ) -> Result<Self, Error> {
        let stack = match saved {
            Some(saved) => match NavigationStack::restore(&config.root, &saved.current) {
                Ok(stack) => stack,
                Err(e) => {
                    warn!("Ignoring saved picker state {:?}: {}", saved.current, e);
                    NavigationStack::new(&config.root)?
                }
            },
            None => NavigationStack::new(&config.root)?,
        };

        info!(
            "Initializing SelectionController at {} ({:?})",
            stack.current().display(),
            config.select_mode
        );

        let loader = DirectoryLoader::new(scanner, watcher);
        loader.start(stack.current(), Arc::clone(&subscriber))?;

        Ok(Self {
            config,
            stack,
            loader,
            subscriber,
            outcome: None,
        })
    }

    pub fn on_entry_selected(&mut self, entry: &Entry) -> Step {
        if self.is_finished() {
            return Step::Ignored;
        }

        if entry.is_directory {
            if let Err(e) = self.stack.push(entry) {
                error!("Cannot enter {}: {}", entry.path.display(), e);
                return Step::Ignored;
            }
            return self.retarget();
        }

        if self.config.select_mode.accepts_files() {
            return self.finish(SelectionOutcome::Success(entry.path.clone()));
        }

        debug!(
            "Ignoring {} in {:?} mode",
            entry.path.display(),
            self.config.select_mode
        );
        Step::Ignored
    }

    pub fn on_up(&mut self) -> Step {
        if self.is_finished() {
            return Step::Ignored;
        }

        match self.stack.pop() {
            Some(_) => self.retarget(),
            None => self.finish(SelectionOutcome::Cancelled),
        }
    }

    pub fn on_confirm_current_directory(&mut self) -> Step {
        if self.is_finished() || !self.config.select_mode.accepts_directories() {
            return Step::Ignored;
        }

        let current = self.stack.current().to_path_buf();
        self.finish(SelectionOutcome::Success(current))
    }

    /// The storage holding the tree went away: nothing left to browse.
    pub fn on_storage_removed(&mut self) -> Step {
        if self.is_finished() {
            return Step::Ignored;
        }
        warn!("Storage removed while picking, cancelling");
        self.finish(SelectionOutcome::Cancelled)
    }

    /// Rolls navigation back when the current directory cannot be opened.
    pub fn on_directory_unavailable(&mut self, path: &Path) -> Step {
        if self.is_finished() || path != self.stack.current() {
            return Step::Ignored;
        }

        warn!("Cannot open {}, navigating back", path.display());
        match self.stack.pop() {
            Some(_) => self.retarget(),
            None => self.finish(SelectionOutcome::Cancelled),
        }
    }

    /// The consumer stops observing; the listing and its watch are kept.
    pub fn pause(&self) {
        if !self.is_finished() {
            self.loader.stop(StopMode::Pause);
        }
    }

    /// Re-attaches a consumer after [`pause`](Self::pause).
    pub fn resume(&mut self, subscriber: Arc<dyn LoadSubscriber>) {
        if self.is_finished() {
            return;
        }
        self.subscriber = subscriber;
        if let Err(e) = self
            .loader
            .start(self.stack.current(), Arc::clone(&self.subscriber))
        {
            error!("Failed to resume loading {}: {}", self.stack.current().display(), e);
        }
    }

    pub fn refresh(&self) -> bool {
        !self.is_finished() && self.loader.refresh()
    }

    pub fn saved_state(&self) -> SavedState {
        SavedState {
            current: self.stack.current().to_string_lossy().into_owned(),
        }
    }

    pub fn current_dir(&self) -> &Path {
        self.stack.current()
    }

    pub fn stack(&self) -> &NavigationStack {
        &self.stack
    }

    pub fn loader(&self) -> &DirectoryLoader {
        &self.loader
    }

    pub fn config(&self) -> &PickerConfig {
        &self.config
    }

    pub fn outcome(&self) -> Option<&SelectionOutcome> {
        self.outcome.as_ref()
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    fn retarget(&mut self) -> Step {
        let current = self.stack.current().to_path_buf();
        self.loader.stop(StopMode::Reset);
        if let Err(e) = self.loader.start(&current, Arc::clone(&self.subscriber)) {
            error!("Failed to start loading {}: {}", current.display(), e);
        }
        Step::Navigated(current)
    }

    fn finish(&mut self, outcome: SelectionOutcome) -> Step {
        info!("Selection finished: {:?}", outcome);
        self.loader.shutdown();
        self.outcome = Some(outcome.clone());
        Step::Finished(outcome)
    }
}
