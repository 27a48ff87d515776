//! Editing session: one document's store, its backend, and save coordination.
//!
//! Edits are applied to the in-memory store immediately. Saving snapshots the
//! blocks under a read lock, drops the lock, and awaits the backend, so edits
//! keep flowing while a save is in flight. Saves never overlap: manual saves
//! queue behind the one in flight, autosave ticks skip instead.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use folio_layout::{
    BlockStore, DragEngine, GridConversion, LayoutMemo, LayoutRow, convert_to_grid_within,
    export_json, import_json,
};
use folio_types::{BlockId, DocumentId};

use crate::persistence::DocumentBackend;
use crate::{EditorConfig, EditorError, Result};

/// A block store shared between the editing surface and the save path.
pub type SharedBlockStore = Arc<RwLock<BlockStore>>;

/// Create a new empty shared store.
pub fn shared_block_store(document_id: DocumentId) -> SharedBlockStore {
    Arc::new(RwLock::new(BlockStore::new(document_id)))
}

/// Why a save did not run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Nothing changed since the last successful save.
    Clean,
    /// Another save is still running.
    InFlight,
}

/// Result of a save attempt that did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveStatus {
    Saved {
        /// Store version that was written.
        version: u64,
        /// Temporary ids replaced by permanent ones.
        assigned: usize,
    },
    Skipped(SkipReason),
}

/// Serializes saves and remembers what was last written.
#[derive(Debug, Default)]
pub struct SaveCoordinator {
    in_flight: Mutex<()>,
    saved_version: AtomicU64,
}

impl SaveCoordinator {
    fn new(saved_version: u64) -> Self {
        Self {
            in_flight: Mutex::new(()),
            saved_version: AtomicU64::new(saved_version),
        }
    }

    pub fn saved_version(&self) -> u64 {
        self.saved_version.load(Ordering::SeqCst)
    }

    pub fn is_saving(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }
}

/// One open document.
pub struct EditorSession {
    store: SharedBlockStore,
    backend: Arc<dyn DocumentBackend>,
    config: EditorConfig,
    saves: SaveCoordinator,
    memo: parking_lot::Mutex<LayoutMemo>,
}

impl EditorSession {
    /// Load the document from `backend` and start a clean session.
    pub async fn open(
        backend: Arc<dyn DocumentBackend>,
        document_id: DocumentId,
        config: EditorConfig,
    ) -> Result<Self> {
        let blocks = backend.load().await?;
        let count = blocks.len();

        let mut store = BlockStore::new(document_id.clone());
        store.replace_all(blocks)?;
        let version = store.version();

        info!(document = %document_id, count, "opened document");
        Ok(Self {
            store: Arc::new(RwLock::new(store)),
            backend,
            config,
            saves: SaveCoordinator::new(version),
            memo: parking_lot::Mutex::new(LayoutMemo::new()),
        })
    }

    pub fn store(&self) -> &SharedBlockStore {
        &self.store
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn saves(&self) -> &SaveCoordinator {
        &self.saves
    }

    pub fn document_id(&self) -> DocumentId {
        self.store.read().document_id().clone()
    }

    /// Run `f` with exclusive access to the store.
    pub fn edit<R>(&self, f: impl FnOnce(&mut BlockStore) -> R) -> R {
        let mut store = self.store.write();
        f(&mut store)
    }

    /// Current display rows, recomputed only when the store changed.
    pub fn rows(&self) -> Vec<LayoutRow> {
        let store = self.store.read();
        self.memo.lock().rows(&store).to_vec()
    }

    /// A drag engine using the configured hover delays.
    pub fn drag_engine(&self) -> DragEngine {
        DragEngine::new(self.config.drag_timing())
    }

    /// Grid conversion with the configured gap and column limit.
    pub fn convert_to_grid(&self, id: &BlockId, columns: usize) -> Result<GridConversion> {
        let conversion = self.edit(|store| {
            convert_to_grid_within(
                store,
                id,
                columns,
                self.config.default_gap,
                self.config.max_grid_columns,
            )
        })?;
        Ok(conversion)
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.store.read().version() != self.saves.saved_version()
    }

    /// Save now, waiting for any save already in flight to finish first.
    pub async fn save_now(&self) -> Result<SaveStatus> {
        let _guard = self.saves.in_flight.lock().await;
        self.save_locked().await
    }

    /// Periodic save: skipped when clean or when a save is in flight.
    pub async fn autosave_tick(&self) -> Result<SaveStatus> {
        if !self.has_unsaved_changes() {
            return Ok(SaveStatus::Skipped(SkipReason::Clean));
        }
        let Ok(_guard) = self.saves.in_flight.try_lock() else {
            debug!("save in flight, skipping autosave");
            return Ok(SaveStatus::Skipped(SkipReason::InFlight));
        };
        self.save_locked().await
    }

    async fn save_locked(&self) -> Result<SaveStatus> {
        let (snapshot, version) = {
            let store = self.store.read();
            (store.blocks().to_vec(), store.version())
        };

        let receipt = match self.backend.save(&snapshot).await {
            Ok(receipt) => receipt,
            Err(e) => {
                error!(version, error = %e, "save failed, edits kept in memory");
                return Err(e.into());
            }
        };

        let assigned = {
            let mut store = self.store.write();
            let untouched = store.version() == version;
            let assigned = store.assign_ids(&receipt.assigned);
            // Id assignment mirrors what was written, so it does not dirty
            // the document. Edits made during the save still do.
            let saved = if untouched { store.version() } else { version };
            self.saves.saved_version.store(saved, Ordering::SeqCst);
            assigned
        };

        info!(version, blocks = snapshot.len(), assigned, "document saved");
        Ok(SaveStatus::Saved { version, assigned })
    }

    /// Replace the document with an exchange file.
    ///
    /// Validation happens first; a rejected import leaves the document as it
    /// was. Imported blocks are rebound to this session's document.
    pub fn import(&self, text: &str) -> Result<usize> {
        let mut blocks = import_json(text).inspect_err(|e| {
            warn!(error = %e, "import rejected");
        })?;

        let mut store = self.store.write();
        let document_id = store.document_id().clone();
        for block in &mut blocks {
            block.document_id = document_id.clone();
        }
        let count = blocks.len();
        store.replace_all(blocks)?;
        info!(document = %document_id, count, "imported document");
        Ok(count)
    }

    /// The document as an exchange file.
    pub fn export(&self) -> Result<String> {
        let store = self.store.read();
        export_json(store.blocks()).map_err(EditorError::Export)
    }
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("store", &*self.store.read())
            .field("saved_version", &self.saves.saved_version())
            .finish()
    }
}
