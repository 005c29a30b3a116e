//! Background directory loading and navigation state for a file/directory picker.
//!
//! A [`SelectionController`] owns the [`NavigationStack`] and a [`DirectoryLoader`]. The
//! loader lists the current directory on a worker thread, keeps the listing live through a
//! file watch and hands [`LoadEvent`]s to a [`LoadSubscriber`].

pub mod config;
pub mod directory_loader;
pub mod error;
pub mod log;
pub mod navigation;
pub mod path_utils;
pub mod selection;
pub mod state_store;
pub mod types;

#[cfg(test)]
mod test_support;

pub use config::PickerConfig;
pub use directory_loader::{
    ChangeWatcher, DirectoryLoader, DirectoryScanner, FsScanner, LoadState, LoadSubscriber,
    NotifyWatcher, StopMode,
};
pub use error::{Error, ScanError, WatchError};
pub use navigation::NavigationStack;
pub use selection::SelectionController;
pub use state_store::StateStore;
pub use types::{Entry, LoadEvent, SavedState, SelectMode, SelectionOutcome, Snapshot, Step};
