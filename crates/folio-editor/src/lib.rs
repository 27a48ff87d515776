//! Editing sessions for folio documents.
//!
//! Wraps a [`folio_layout::BlockStore`] in a shared handle, connects it to a
//! [`DocumentBackend`], and keeps the backend up to date:
//!
//! - [`EditorSession::save_now`] for explicit saves, serialized with any save
//!   already running
//! - [`spawn_autosave`] for a periodic background save
//! - [`EditorConfig`] for per-user settings (RON)
//!
//! Saving never changes the in-memory document except to apply permanent
//! ids handed out by the backend. A failed save leaves every edit in place.

mod autosave;
mod config;
mod error;
mod persistence;
mod session;

pub use autosave::{AutosaveHandle, spawn_autosave};
pub use config::{ConfigError, EditorConfig};
pub use error::{EditorError, PersistenceError, PersistenceResult, Result};
pub use persistence::{DocumentBackend, JsonFileBackend, MemoryBackend, SaveReceipt};
pub use session::{
    EditorSession, SaveCoordinator, SaveStatus, SharedBlockStore, SkipReason, shared_block_store,
};
