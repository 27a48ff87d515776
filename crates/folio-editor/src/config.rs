//! Editor configuration, stored as RON.
//!
//! ```ron
//! (
//!     autosave_interval_secs: 30,
//!     default_gap: 16,
//!     max_grid_columns: 6,
//!     hover_settle_ms: 50,
//!     hover_leave_ms: 100,
//!     document_dir: Some("~/Documents/folio"),
//! )
//! ```
//!
//! Every field is optional; missing ones take their defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use folio_layout::{DEFAULT_GAP, DragTiming, GRID_COLUMN_LIMIT, MAX_COLUMNS};

/// Errors loading editor configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Seconds between autosave attempts.
    pub autosave_interval_secs: u64,
    /// Gap for newly created grid rows.
    pub default_gap: u32,
    /// Largest column count grid conversion accepts.
    pub max_grid_columns: usize,
    /// Drag hover settle delay.
    pub hover_settle_ms: u64,
    /// Drag hover leave delay.
    pub hover_leave_ms: u64,
    /// Where documents live by default. `~` is expanded.
    pub document_dir: Option<String>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            autosave_interval_secs: 30,
            default_gap: DEFAULT_GAP,
            max_grid_columns: MAX_COLUMNS,
            hover_settle_ms: 50,
            hover_leave_ms: 100,
            document_dir: None,
        }
    }
}

impl EditorConfig {
    /// Parse RON text.
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: EditorConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a RON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_ron(&text)?;
        debug!(path = %path.display(), "loaded editor config");
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "no editor config, using defaults");
            Ok(Self::default())
        }
    }

    /// `<config dir>/folio/editor.ron`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("folio").join("editor.ron"))
    }

    /// Load the per-user config, falling back to defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_or_default(&path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.autosave_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "autosave_interval_secs must be at least 1".into(),
            ));
        }
        if !(2..=GRID_COLUMN_LIMIT).contains(&self.max_grid_columns) {
            return Err(ConfigError::Invalid(format!(
                "max_grid_columns must be between 2 and {GRID_COLUMN_LIMIT}, got {}",
                self.max_grid_columns
            )));
        }
        Ok(())
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }

    /// Hover debounce for drag engines created by a session.
    pub fn drag_timing(&self) -> DragTiming {
        DragTiming {
            settle: Duration::from_millis(self.hover_settle_ms),
            leave: Duration::from_millis(self.hover_leave_ms),
        }
    }

    /// `document_dir` with `~` expanded.
    pub fn document_dir(&self) -> Option<PathBuf> {
        self.document_dir
            .as_deref()
            .map(|dir| PathBuf::from(shellexpand::tilde(dir).as_ref()))
    }
}
