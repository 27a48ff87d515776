//! Persistence boundary: where a document's blocks are loaded from and saved to.
//!
//! The session only sees [`DocumentBackend`]. Backends hand out permanent ids
//! for blocks still carrying temporary ones and report them in the
//! [`SaveReceipt`], which the session applies back to its store.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, info};

use folio_layout::{export_json, import_json};
use folio_types::{Block, BlockId};

use crate::{PersistenceError, PersistenceResult};

/// Outcome of a successful save.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SaveReceipt {
    /// `(temporary, permanent)` pairs for blocks that got a permanent id.
    pub assigned: Vec<(BlockId, BlockId)>,
}

/// Async load/save of one document.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Initial blocks. A document that does not exist yet is empty.
    async fn load(&self) -> PersistenceResult<Vec<Block>>;

    /// Persist the full block list.
    async fn save(&self, blocks: &[Block]) -> PersistenceResult<SaveReceipt>;
}

/// Replace temporary ids with numbers above every permanent numeric id.
fn assign_permanent_ids(blocks: &[Block]) -> (Vec<Block>, SaveReceipt) {
    let mut next = blocks
        .iter()
        .filter_map(|b| match b.id {
            BlockId::Num(n) if n > 0 => Some(n),
            _ => None,
        })
        .max()
        .unwrap_or(0)
        + 1;

    let mut receipt = SaveReceipt::default();
    let stored = blocks
        .iter()
        .map(|block| {
            let mut block = block.clone();
            if block.id.is_temporary() {
                let permanent = BlockId::Num(next);
                next += 1;
                receipt.assigned.push((block.id.clone(), permanent.clone()));
                block.id = permanent;
            }
            block
        })
        .collect();
    (stored, receipt)
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Keeps the last saved document in memory.
///
/// Can be switched into a failing mode, and can hold saves open on a gate,
/// for exercising error and overlap handling.
#[derive(Default)]
pub struct MemoryBackend {
    stored: Mutex<Vec<Block>>,
    failing: AtomicBool,
    saves: AtomicUsize,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose `load` returns `blocks`.
    pub fn with_blocks(blocks: Vec<Block>) -> Self {
        Self {
            stored: Mutex::new(blocks),
            ..Self::default()
        }
    }

    /// Make every following save fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Hold each following save until `gate` is notified.
    pub fn set_gate(&self, gate: Option<Arc<Notify>>) {
        *self.gate.lock() = gate;
    }

    /// Number of save calls received, including failed ones.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Blocks from the last successful save.
    pub fn stored(&self) -> Vec<Block> {
        self.stored.lock().clone()
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    async fn load(&self) -> PersistenceResult<Vec<Block>> {
        Ok(self.stored.lock().clone())
    }

    async fn save(&self, blocks: &[Block]) -> PersistenceResult<SaveReceipt> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::Rejected("memory backend is failing".into()));
        }
        let (stored, receipt) = assign_permanent_ids(blocks);
        *self.stored.lock() = stored;
        debug!(count = blocks.len(), assigned = receipt.assigned.len(), "saved to memory");
        Ok(receipt)
    }
}

// ============================================================================
// JSON file backend
// ============================================================================

/// Stores a document as an exchange-format JSON file.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so a crash never leaves a half-written document.
#[derive(Clone, Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl DocumentBackend for JsonFileBackend {
    async fn load(&self) -> PersistenceResult<Vec<Block>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "document file missing, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let blocks = import_json(&text)?;
        debug!(path = %self.path.display(), count = blocks.len(), "loaded document");
        Ok(blocks)
    }

    async fn save(&self, blocks: &[Block]) -> PersistenceResult<SaveReceipt> {
        let (stored, receipt) = assign_permanent_ids(blocks);
        let json = export_json(&stored)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp = self.temp_path();
        tokio::fs::write(&temp, json.as_bytes()).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        info!(
            path = %self.path.display(),
            count = stored.len(),
            assigned = receipt.assigned.len(),
            "wrote document"
        );
        Ok(receipt)
    }
}
