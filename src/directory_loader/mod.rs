// Directory loading: one background scan per active directory, kept live by a file watch.

pub mod core;
pub mod scanner;
pub mod watcher;

pub use self::core::{DirectoryLoader, LoadState, LoadSubscriber, StopMode};
pub use scanner::{compare_entries, DirectoryScanner, FsScanner};
pub use watcher::{ChangeCallback, ChangeWatch, ChangeWatcher, NotifyWatcher, WatchHandle};
