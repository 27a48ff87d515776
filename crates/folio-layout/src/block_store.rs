//! Block store: the canonical ordered collection of blocks for one document.
//!
//! Blocks live in a `Vec` kept sorted by `order`, and `order` always equals
//! the block's index. Every mutation that changes the sequence finishes with
//! a single renumber pass, so readers only ever observe `0..n` with no gaps
//! or duplicates.
//!
//! All operations validate before they mutate. A stale id (a UI affordance
//! racing a delete) yields `LayoutError::BlockNotFound`, logs a warning, and
//! leaves the store untouched.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use strum::EnumString;
use tracing::{debug, warn};

use folio_types::{Block, BlockId, BlockKind, BlockPatch, DocumentId, GridLayout, RowId};

use crate::payload::{DefaultPayloads, PayloadFactory};
use crate::{GRID_COLUMN_LIMIT, LayoutError, Result};

/// Source of unique store identities, used to key row memoization.
static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Direction for single-step moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Direction {
    Up,
    Down,
}

/// A block to be inserted by [`BlockStore::insert_batch`].
#[derive(Clone, Debug, PartialEq)]
pub struct NewBlock {
    pub kind: BlockKind,
    /// `None` asks the payload factory for the kind's default.
    pub payload: Option<Value>,
    pub layout: Option<GridLayout>,
    pub visible: bool,
}

impl NewBlock {
    pub fn new(kind: BlockKind) -> Self {
        Self {
            kind,
            payload: None,
            layout: None,
            visible: true,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_layout(mut self, layout: GridLayout) -> Self {
        self.layout = Some(layout);
        self
    }
}

/// A violated ordering invariant, reported by [`BlockStore::check_invariants`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantError {
    #[error("block {id:?} at index {index} has order {order}")]
    OrderMismatch { id: BlockId, index: usize, order: usize },
    #[error("block id {0:?} appears more than once")]
    DuplicateId(BlockId),
}

/// Ordered collection of blocks for one editing session.
///
/// Exclusively borrowed (`&mut`) for every mutation, so a compound operation
/// such as grid conversion is never observed half-applied.
pub struct BlockStore {
    /// Document the blocks belong to.
    document_id: DocumentId,

    /// Blocks sorted by `order`; `blocks[i].order == i`.
    blocks: Vec<Block>,

    /// Next temporary id sequence (ids are `-next_temp`).
    next_temp: u64,

    /// Store version (bumped once per successful mutation).
    version: u64,

    /// Process-unique identity, so memoized views never mix two stores.
    instance: u64,

    /// Active selection; cleared when the selected block is deleted.
    selection: Option<BlockId>,

    /// Initial content for new blocks.
    payloads: Arc<dyn PayloadFactory>,
}

impl BlockStore {
    /// Create a new empty store using the built-in default payloads.
    pub fn new(document_id: DocumentId) -> Self {
        Self::with_payloads(document_id, Arc::new(DefaultPayloads))
    }

    /// Create a new empty store with a custom payload factory.
    pub fn with_payloads(document_id: DocumentId, payloads: Arc<dyn PayloadFactory>) -> Self {
        Self {
            document_id,
            blocks: Vec::new(),
            next_temp: 1,
            version: 0,
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            selection: None,
            payloads,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The document this store edits.
    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    /// Current version.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Process-unique identity of this store.
    pub fn instance(&self) -> u64 {
        self.instance
    }

    /// Blocks in document order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Look up a block by id.
    pub fn get(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| &b.id == id)
    }

    /// Index (== order) of a block.
    pub fn index_of(&self, id: &BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| &b.id == id)
    }

    /// Currently selected block, if any.
    pub fn selection(&self) -> Option<&BlockId> {
        self.selection.as_ref()
    }

    /// Members of a grid row, in document order.
    pub fn row_members(&self, row_id: &RowId) -> Vec<&Block> {
        self.blocks
            .iter()
            .filter(|b| b.row_id() == Some(row_id))
            .collect()
    }

    /// Geometry of a row as seen by the grouper: the lowest-order member's
    /// layout. `None` when no block references the row.
    pub fn row_geometry(&self, row_id: &RowId) -> Option<&GridLayout> {
        self.blocks
            .iter()
            .filter_map(|b| b.layout.as_ref())
            .find(|l| &l.row_id == row_id)
    }

    /// Cell positions of `row_id` that no member occupies, ascending.
    pub fn free_positions(&self, row_id: &RowId) -> Vec<usize> {
        let Some(geometry) = self.row_geometry(row_id) else {
            return Vec::new();
        };
        let taken: HashSet<usize> = self
            .row_members(row_id)
            .iter()
            .filter_map(|b| b.layout.as_ref().map(|l| l.position))
            .collect();
        (0..geometry.columns.min(GRID_COLUMN_LIMIT))
            .filter(|p| !taken.contains(p))
            .collect()
    }

    /// Block occupying `(row_id, position)`, lowest order first.
    pub fn occupant(&self, row_id: &RowId, position: usize) -> Option<&Block> {
        self.blocks.iter().find(|b| {
            b.layout
                .as_ref()
                .is_some_and(|l| &l.row_id == row_id && l.position == position)
        })
    }

    fn index_or_warn(&self, id: &BlockId, op: &'static str) -> Result<usize> {
        self.index_of(id).ok_or_else(|| {
            warn!(block = %id, op, "operation on unknown block ignored");
            LayoutError::BlockNotFound(id.clone())
        })
    }

    // =========================================================================
    // Id generation + renumbering
    // =========================================================================

    fn next_temporary_id(&mut self) -> BlockId {
        let id = BlockId::temporary(self.next_temp);
        self.next_temp += 1;
        id
    }

    fn build(&mut self, new: NewBlock) -> Block {
        let id = self.next_temporary_id();
        let payload = new
            .payload
            .unwrap_or_else(|| self.payloads.default_payload(new.kind));
        let mut block = Block::new(id, self.document_id.clone(), new.kind, payload);
        block.layout = new.layout;
        block.visible = new.visible;
        block
    }

    /// Restore `order == index` and bump the version. Called exactly once at
    /// the end of every mutation.
    fn commit(&mut self) {
        for (index, block) in self.blocks.iter_mut().enumerate() {
            block.order = index;
        }
        self.version += 1;
        debug_assert!(self.check_invariants().is_ok());
    }

    // =========================================================================
    // Block operations
    // =========================================================================

    /// Create a block of `kind` with its default payload and no layout.
    ///
    /// Appended when `at` is `None`; otherwise inserted at `at` (clamped to
    /// the end) and everything after it shifts down by one.
    pub fn add(&mut self, kind: BlockKind, at: Option<usize>) -> BlockId {
        let index = at.map_or(self.blocks.len(), |i| i.min(self.blocks.len()));
        let block = self.build(NewBlock::new(kind));
        let id = block.id.clone();
        self.blocks.insert(index, block);
        self.commit();
        debug!(block = %id, %kind, index, "added block");
        id
    }

    /// Insert several blocks starting at `at`, renumbering once.
    ///
    /// The blocks keep their relative order and any pre-attached layout, so a
    /// compound edit never exposes a block that has not yet joined its row.
    pub fn insert_batch(&mut self, at: usize, new_blocks: Vec<NewBlock>) -> Vec<BlockId> {
        if new_blocks.is_empty() {
            return Vec::new();
        }
        let index = at.min(self.blocks.len());
        let built: Vec<Block> = new_blocks.into_iter().map(|n| self.build(n)).collect();
        let ids: Vec<BlockId> = built.iter().map(|b| b.id.clone()).collect();
        self.blocks.splice(index..index, built);
        self.commit();
        debug!(count = ids.len(), index, "inserted block batch");
        ids
    }

    /// Patch a block and insert `new_blocks` directly after it, renumbering
    /// once.
    ///
    /// The store is validated before anything changes; an unknown `id`
    /// leaves it untouched. Grid conversion uses this so the source joining
    /// its row and the fillers appearing are one version bump.
    pub fn update_and_insert_after(
        &mut self,
        id: &BlockId,
        patch: BlockPatch,
        new_blocks: Vec<NewBlock>,
    ) -> Result<Vec<BlockId>> {
        let index = self.index_or_warn(id, "update_and_insert_after")?;
        patch.apply_to(&mut self.blocks[index]);
        let built: Vec<Block> = new_blocks.into_iter().map(|n| self.build(n)).collect();
        let ids: Vec<BlockId> = built.iter().map(|b| b.id.clone()).collect();
        self.blocks.splice(index + 1..index + 1, built);
        self.commit();
        debug!(block = %id, inserted = ids.len(), "updated block and inserted after it");
        Ok(ids)
    }

    /// Merge `patch` into a block and refresh its `updated_at`.
    pub fn update(&mut self, id: &BlockId, patch: BlockPatch) -> Result<()> {
        let index = self.index_or_warn(id, "update")?;
        patch.apply_to(&mut self.blocks[index]);
        self.commit();
        debug!(block = %id, "updated block");
        Ok(())
    }

    /// Replace a block's kind, resetting its payload to the new kind's default.
    pub fn convert_type(&mut self, id: &BlockId, kind: BlockKind) -> Result<()> {
        let index = self.index_or_warn(id, "convert_type")?;
        let payload = self.payloads.default_payload(kind);
        let block = &mut self.blocks[index];
        block.kind = kind;
        block.payload = payload;
        block.touch();
        self.commit();
        debug!(block = %id, %kind, "converted block type");
        Ok(())
    }

    /// Deep-copy a block directly after its source.
    ///
    /// Grid cells keep their row: the copy takes the lowest free cell of that
    /// row. When the row is full the copy becomes a single block placed after
    /// the row's last member, so the row stays contiguous. Two blocks never
    /// claim the same cell.
    pub fn duplicate(&mut self, id: &BlockId) -> Result<BlockId> {
        let index = self.index_or_warn(id, "duplicate")?;
        let source = self.blocks[index].clone();

        let layout = source.layout.as_ref().and_then(|layout| {
            let free = self.free_positions(&layout.row_id);
            free.first().map(|&position| GridLayout {
                position,
                ..layout.clone()
            })
        });
        let insert_at = match (&source.layout, &layout) {
            (Some(full_row), None) => self
                .blocks
                .iter()
                .rposition(|b| b.row_id() == Some(&full_row.row_id))
                .map_or(index + 1, |last| last + 1),
            _ => index + 1,
        };

        let new_id = self.next_temporary_id();
        let mut copy = Block::new(
            new_id.clone(),
            source.document_id.clone(),
            source.kind,
            source.payload.clone(),
        );
        copy.layout = layout;
        copy.visible = source.visible;

        self.blocks.insert(insert_at, copy);
        self.commit();
        debug!(source = %id, block = %new_id, index = insert_at, "duplicated block");
        Ok(new_id)
    }

    /// Remove a block, closing the gap in `order`.
    ///
    /// Clears the selection if it pointed at the removed block.
    pub fn delete(&mut self, id: &BlockId) -> Result<Block> {
        let index = self.index_or_warn(id, "delete")?;
        let removed = self.blocks.remove(index);
        if self.selection.as_ref() == Some(id) {
            self.selection = None;
        }
        self.commit();
        debug!(block = %id, index, "deleted block");
        Ok(removed)
    }

    /// Swap a block with its neighbour.
    ///
    /// Returns `Ok(false)` (and changes nothing) at either boundary.
    pub fn move_block(&mut self, id: &BlockId, direction: Direction) -> Result<bool> {
        let index = self.index_or_warn(id, "move")?;
        let target = match direction {
            Direction::Up if index > 0 => index - 1,
            Direction::Down if index + 1 < self.blocks.len() => index + 1,
            _ => return Ok(false),
        };
        self.blocks.swap(index, target);
        self.blocks[target].touch();
        self.blocks[index].touch();
        self.commit();
        debug!(block = %id, ?direction, "moved block");
        Ok(true)
    }

    /// Relocate a block to an absolute index (clamped), shifting the rest.
    pub fn move_to(&mut self, id: &BlockId, index: usize) -> Result<()> {
        let from = self.index_or_warn(id, "move_to")?;
        let to = index.min(self.blocks.len() - 1);
        if from == to {
            return Ok(());
        }
        let mut block = self.blocks.remove(from);
        block.touch();
        self.blocks.insert(to, block);
        self.commit();
        debug!(block = %id, from, to, "relocated block");
        Ok(())
    }

    /// Exchange both the order slot and the layout of two blocks.
    pub fn swap_slots(&mut self, a: &BlockId, b: &BlockId) -> Result<()> {
        let ia = self.index_or_warn(a, "swap")?;
        let ib = self.index_or_warn(b, "swap")?;
        if ia == ib {
            return Ok(());
        }
        let layout_a = self.blocks[ia].layout.take();
        let layout_b = self.blocks[ib].layout.take();
        self.blocks[ia].layout = layout_b;
        self.blocks[ib].layout = layout_a;
        self.blocks.swap(ia, ib);
        self.blocks[ia].touch();
        self.blocks[ib].touch();
        self.commit();
        debug!(a = %a, b = %b, "swapped block slots");
        Ok(())
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Mark a block as the active selection.
    pub fn select(&mut self, id: &BlockId) -> Result<()> {
        self.index_or_warn(id, "select")?;
        self.selection = Some(id.clone());
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    // =========================================================================
    // Bulk load / persistence support
    // =========================================================================

    /// Install a whole collection (initial load, import).
    ///
    /// Blocks are ordered by their `order` field (stable for ties) and then
    /// renumbered `0..n`. Duplicate ids reject the collection untouched.
    pub fn replace_all(&mut self, mut blocks: Vec<Block>) -> Result<()> {
        let mut seen = HashSet::with_capacity(blocks.len());
        for block in &blocks {
            if !seen.insert(&block.id) {
                return Err(LayoutError::DuplicateBlock(block.id.clone()));
            }
        }

        blocks.sort_by_key(|b| b.order);
        let max_temp = blocks
            .iter()
            .filter_map(|b| match b.id {
                BlockId::Num(n) if n < 0 => Some(n.unsigned_abs()),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        self.next_temp = self.next_temp.max(max_temp + 1);

        if self
            .selection
            .as_ref()
            .is_some_and(|sel| !blocks.iter().any(|b| &b.id == sel))
        {
            self.selection = None;
        }

        self.blocks = blocks;
        self.commit();
        debug!(count = self.blocks.len(), "replaced document blocks");
        Ok(())
    }

    /// Rewrite temporary ids with the permanent ids a backend assigned.
    ///
    /// Pairs whose old id is gone (deleted while the save was in flight) or
    /// whose new id is already taken are skipped. Returns how many ids changed.
    pub fn assign_ids(&mut self, assigned: &[(BlockId, BlockId)]) -> usize {
        let mut changed = 0;
        for (old, new) in assigned {
            if old == new {
                continue;
            }
            if self.index_of(new).is_some() {
                warn!(old = %old, new = %new, "assigned id already in use, skipping");
                continue;
            }
            let Some(index) = self.index_of(old) else {
                debug!(old = %old, "assigned id for a block that no longer exists");
                continue;
            };
            self.blocks[index].id = new.clone();
            if self.selection.as_ref() == Some(old) {
                self.selection = Some(new.clone());
            }
            changed += 1;
        }
        if changed > 0 {
            self.commit();
        }
        changed
    }

    /// Verify `order == index` and id uniqueness.
    pub fn check_invariants(&self) -> std::result::Result<(), InvariantError> {
        let mut seen = HashSet::with_capacity(self.blocks.len());
        for (index, block) in self.blocks.iter().enumerate() {
            if block.order != index {
                return Err(InvariantError::OrderMismatch {
                    id: block.id.clone(),
                    index,
                    order: block.order,
                });
            }
            if !seen.insert(&block.id) {
                return Err(InvariantError::DuplicateId(block.id.clone()));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStore")
            .field("document_id", &self.document_id)
            .field("blocks", &self.blocks.len())
            .field("version", &self.version)
            .finish()
    }
}

// =========================================================================
// Tests
// =========================================================================
