use std::path::PathBuf;
use std::time::Duration;

use crate::types::SelectMode;

pub const ROOT_PATH: &str = "/";
pub const DEFAULT_WATCH_DEBOUNCE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerConfig {
    pub root: PathBuf,
    pub select_mode: SelectMode,
    pub show_hidden: bool,
    pub directories_first: bool,
    /// Window in which bursts of file-system events collapse into one change signal.
    pub watch_debounce: Duration,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(ROOT_PATH),
            select_mode: SelectMode::default(),
            show_hidden: false,
            directories_first: true,
            watch_debounce: DEFAULT_WATCH_DEBOUNCE,
        }
    }
}

impl PickerConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn with_select_mode(mut self, select_mode: SelectMode) -> Self {
        self.select_mode = select_mode;
        self
    }

    pub fn with_show_hidden(mut self, show_hidden: bool) -> Self {
        self.show_hidden = show_hidden;
        self
    }

    pub fn with_directories_first(mut self, directories_first: bool) -> Self {
        self.directories_first = directories_first;
        self
    }

    pub fn with_watch_debounce(mut self, watch_debounce: Duration) -> Self {
        self.watch_debounce = watch_debounce;
        self
    }
}
