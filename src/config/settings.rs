use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Entries whose name starts with this prefix are skipped entirely.
    /// Empty disables the filter.
    pub hidden_prefix: String,
    /// Emit a progress summary every this many discovered entries.
    pub progress_interval: usize,
    /// Directory levels to descend below the root. `None` is unlimited.
    pub max_depth: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hidden_prefix: ".".to_string(),
            progress_interval: 100,
            max_depth: None,
        }
    }
}
