//! Drag/drop move engine.
//!
//! One authoritative [`DragPhase`] drives the gesture:
//!
//! ```text
//! Idle ──begin──▶ Dragging ──hover (settled)──▶ Hovering
//!                    ▲   ◀──leave (elapsed)────────┘
//!                    │
//!       drop ──▶ Committed | Cancelled ──end──▶ Idle
//! ```
//!
//! Hover changes are debounced: a target only becomes the hovered target
//! after `settle` has passed, and a hovered target is only dropped after
//! `leave` has passed without a new hover. Callers pass the current
//! [`Instant`] in, so the machine never reads a clock.
//!
//! Drops onto an occupied cell swap the dragged block with the occupant.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use folio_types::{BlockId, BlockPatch, GridLayout, RowId};

use crate::rows::{GridRow, LayoutRow, RowKey, group_rows};
use crate::{BlockStore, LayoutError, Result};

/// Hover debounce delays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DragTiming {
    /// How long a hover must rest on one target before it counts.
    pub settle: Duration,
    /// How long after leaving a target before the hover is cleared.
    pub leave: Duration,
}

impl Default for DragTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(50),
            leave: Duration::from_millis(100),
        }
    }
}

/// Where a block is released: a row, and optionally a cell of it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DropTarget {
    pub row: RowKey,
    /// Cell index for grid rows. `None` means the end of the row.
    pub position: Option<usize>,
}

impl DropTarget {
    /// The row as a whole.
    pub fn row(row: RowKey) -> Self {
        Self { row, position: None }
    }

    /// A specific cell of a grid row.
    pub fn cell(row_id: RowId, position: usize) -> Self {
        Self {
            row: RowKey::Grid(row_id),
            position: Some(position),
        }
    }
}

/// Why a drop did nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelReason {
    /// The dragged block was deleted during the gesture.
    SourceVanished,
    /// The target row no longer exists.
    TargetVanished,
    /// The target cell is outside the row.
    CellOutOfRange,
    /// Nothing was hovered and no target was given.
    NoTarget,
    /// [`DragEngine::cancel`] was called.
    Explicit,
}

/// State of the gesture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    Dragging {
        source: BlockId,
        origin: RowKey,
    },
    Hovering {
        source: BlockId,
        origin: RowKey,
        target: DropTarget,
    },
    /// The drop was applied. `origin` is the row the block was dragged from.
    Committed {
        source: BlockId,
        origin: RowKey,
        target: DropTarget,
    },
    Cancelled(CancelReason),
}

impl DragPhase {
    /// Whether a gesture is in progress (a new one cannot begin).
    pub fn is_active(&self) -> bool {
        matches!(self, DragPhase::Dragging { .. } | DragPhase::Hovering { .. })
    }
}

/// Result of [`DragEngine::drop`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropOutcome {
    /// The block now sits at `target`.
    Moved {
        block: BlockId,
        target: DropTarget,
        /// Previous occupant of the cell, which took the block's old slot.
        swapped_with: Option<BlockId>,
    },
    /// Dropped where it already was.
    Unchanged { block: BlockId },
    /// Nothing was changed.
    Cancelled(CancelReason),
    /// No drag was in progress.
    NotDragging,
}

/// Rejected drag starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DragError {
    #[error("a drag of {0:?} is already in progress")]
    AlreadyDragging(BlockId),
    #[error("cannot drag unknown block {0:?}")]
    UnknownSource(BlockId),
}

/// The drag/drop state machine.
#[derive(Debug)]
pub struct DragEngine {
    timing: DragTiming,
    phase: DragPhase,
    /// Hover waiting to settle, and when it started.
    pending: Option<(DropTarget, Instant)>,
    /// When the pointer left the hovered target.
    leaving: Option<Instant>,
}

impl Default for DragEngine {
    fn default() -> Self {
        Self::new(DragTiming::default())
    }
}

impl DragEngine {
    pub fn new(timing: DragTiming) -> Self {
        Self {
            timing,
            phase: DragPhase::Idle,
            pending: None,
            leaving: None,
        }
    }

    pub fn phase(&self) -> &DragPhase {
        &self.phase
    }

    pub fn timing(&self) -> DragTiming {
        self.timing
    }

    /// Block being dragged, if a gesture is active.
    pub fn source(&self) -> Option<&BlockId> {
        match &self.phase {
            DragPhase::Dragging { source, .. } | DragPhase::Hovering { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Row the active drag started from.
    pub fn origin(&self) -> Option<&RowKey> {
        match &self.phase {
            DragPhase::Dragging { origin, .. } | DragPhase::Hovering { origin, .. } => Some(origin),
            _ => None,
        }
    }

    /// Settled hover target, if any.
    pub fn hovered(&self) -> Option<&DropTarget> {
        match &self.phase {
            DragPhase::Hovering { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Start dragging `source`.
    ///
    /// Allowed from `Idle`, `Committed`, and `Cancelled`; a gesture in
    /// progress must be dropped, cancelled, or ended first.
    pub fn begin(&mut self, store: &BlockStore, source: &BlockId) -> std::result::Result<(), DragError> {
        if let Some(active) = self.source() {
            warn!(active = %active, requested = %source, "drag already in progress");
            return Err(DragError::AlreadyDragging(active.clone()));
        }
        let Some(block) = store.get(source) else {
            warn!(block = %source, "drag of unknown block rejected");
            return Err(DragError::UnknownSource(source.clone()));
        };

        let origin = RowKey::of(block);
        debug!(block = %source, ?origin, "drag started");
        self.phase = DragPhase::Dragging {
            source: source.clone(),
            origin,
        };
        self.pending = None;
        self.leaving = None;
        Ok(())
    }

    /// Pointer is over `target`.
    pub fn hover(&mut self, target: DropTarget, now: Instant) -> &DragPhase {
        if !self.phase.is_active() {
            return &self.phase;
        }
        self.leaving = None;
        let already_hovered = self.hovered() == Some(&target);
        let already_pending = self.pending.as_ref().is_some_and(|(t, _)| t == &target);
        if already_hovered {
            self.pending = None;
        } else if !already_pending {
            self.pending = Some((target, now));
        }
        self.tick(now)
    }

    /// Pointer left whatever it was over.
    pub fn leave(&mut self, now: Instant) -> &DragPhase {
        if !self.phase.is_active() {
            return &self.phase;
        }
        self.pending = None;
        if self.hovered().is_some() && self.leaving.is_none() {
            self.leaving = Some(now);
        }
        self.tick(now)
    }

    /// Apply any debounce deadline that has passed.
    pub fn tick(&mut self, now: Instant) -> &DragPhase {
        if let Some((target, since)) = &self.pending
            && now.saturating_duration_since(*since) >= self.timing.settle
        {
            let target = target.clone();
            self.pending = None;
            self.leaving = None;
            self.set_hover(Some(target));
        }
        if let Some(since) = self.leaving
            && now.saturating_duration_since(since) >= self.timing.leave
        {
            self.leaving = None;
            self.set_hover(None);
        }
        &self.phase
    }

    fn set_hover(&mut self, target: Option<DropTarget>) {
        let phase = std::mem::replace(&mut self.phase, DragPhase::Idle);
        self.phase = match (phase, target) {
            (
                DragPhase::Dragging { source, origin } | DragPhase::Hovering { source, origin, .. },
                Some(target),
            ) => DragPhase::Hovering {
                source,
                origin,
                target,
            },
            (
                DragPhase::Dragging { source, origin } | DragPhase::Hovering { source, origin, .. },
                None,
            ) => DragPhase::Dragging { source, origin },
            (other, _) => other,
        };
    }

    /// Abort the gesture without touching the store.
    ///
    /// Returns `false` if no gesture was active.
    pub fn cancel(&mut self) -> bool {
        if !self.phase.is_active() {
            return false;
        }
        debug!("drag cancelled");
        self.finish(DragPhase::Cancelled(CancelReason::Explicit));
        true
    }

    /// Drag-end signal: always back to `Idle`.
    pub fn end(&mut self) {
        self.finish(DragPhase::Idle);
    }

    fn finish(&mut self, phase: DragPhase) {
        self.phase = phase;
        self.pending = None;
        self.leaving = None;
    }

    fn cancel_with(&mut self, reason: CancelReason) -> DropOutcome {
        self.finish(DragPhase::Cancelled(reason));
        DropOutcome::Cancelled(reason)
    }

    /// Release the dragged block.
    ///
    /// The target is `target` if given, else the settled hover, else a hover
    /// still waiting to settle. Vanished sources or targets cancel the drop
    /// with the store untouched.
    pub fn drop(
        &mut self,
        store: &mut BlockStore,
        target: Option<DropTarget>,
        now: Instant,
    ) -> DropOutcome {
        self.tick(now);
        let (Some(source), Some(origin)) = (self.source().cloned(), self.origin().cloned()) else {
            return DropOutcome::NotDragging;
        };

        let target = target
            .or_else(|| self.hovered().cloned())
            .or_else(|| self.pending.as_ref().map(|(t, _)| t.clone()));
        let Some(target) = target else {
            warn!(block = %source, "drop without a target");
            return self.cancel_with(CancelReason::NoTarget);
        };

        if store.get(&source).is_none() {
            warn!(block = %source, "dragged block vanished before drop");
            return self.cancel_with(CancelReason::SourceVanished);
        }

        match apply_drop(store, &source, &target) {
            Ok(Ok(outcome)) => {
                debug!(block = %source, from = %origin, "drag committed");
                self.finish(DragPhase::Committed {
                    source,
                    origin,
                    target,
                });
                outcome
            }
            Ok(Err(reason)) => {
                warn!(block = %source, ?target, ?reason, "drop cancelled");
                self.cancel_with(reason)
            }
            Err(err) => {
                warn!(block = %source, %err, "drop failed");
                self.cancel_with(CancelReason::SourceVanished)
            }
        }
    }
}

// ============================================================================
// Drop application
// ============================================================================

/// Resolve and apply a drop. The inner `Err` is a cancellation decided before
/// any mutation.
fn apply_drop(
    store: &mut BlockStore,
    source: &BlockId,
    target: &DropTarget,
) -> Result<std::result::Result<DropOutcome, CancelReason>> {
    let grouping = group_rows(store.blocks());
    let Some(row) = grouping.find(&target.row) else {
        return Ok(Err(CancelReason::TargetVanished));
    };

    match row {
        LayoutRow::Single(anchor) => {
            if &anchor.id == source {
                return Ok(Ok(DropOutcome::Unchanged {
                    block: source.clone(),
                }));
            }
            let anchor = anchor.id.clone();
            if store.get(source).is_some_and(|b| b.is_grid_cell()) {
                store.update(source, BlockPatch::default().layout(None))?;
            }
            move_after(store, source, &anchor)?;
            info!(block = %source, after = %anchor, "dropped block onto plain row");
            Ok(Ok(DropOutcome::Moved {
                block: source.clone(),
                target: target.clone(),
                swapped_with: None,
            }))
        }
        LayoutRow::Grid(grid) => drop_into_grid(store, source, target, grid),
    }
}

fn drop_into_grid(
    store: &mut BlockStore,
    source: &BlockId,
    target: &DropTarget,
    grid: &GridRow,
) -> Result<std::result::Result<DropOutcome, CancelReason>> {
    let position = match target.position {
        Some(position) => position,
        None => grid
            .holes()
            .last()
            .copied()
            .unwrap_or(grid.columns.saturating_sub(1)),
    };
    let Some(cell) = grid.cells.get(position) else {
        return Ok(Err(CancelReason::CellOutOfRange));
    };
    let resolved = DropTarget::cell(grid.row_id.clone(), position);

    if let Some(occupant) = cell {
        if &occupant.id == source {
            return Ok(Ok(DropOutcome::Unchanged {
                block: source.clone(),
            }));
        }
        store.swap_slots(source, &occupant.id)?;
        info!(
            block = %source,
            occupant = %occupant.id,
            row = grid.row_id.short(),
            position,
            "dropped onto occupied cell, swapped"
        );
        return Ok(Ok(DropOutcome::Moved {
            block: source.clone(),
            target: resolved,
            swapped_with: Some(occupant.id.clone()),
        }));
    }

    let align = store
        .get(source)
        .and_then(|b| b.layout.as_ref())
        .map(|l| l.vertical_align)
        .unwrap_or_default();
    let layout = GridLayout::new(grid.row_id.clone(), position, grid.columns, grid.gap)
        .with_align(align);
    store.update(source, BlockPatch::default().layout(Some(layout)))?;

    // Order the block among the other members by cell position.
    let others: Vec<(usize, &BlockId)> = grid
        .cells
        .iter()
        .enumerate()
        .filter_map(|(p, c)| c.as_ref().map(|b| (p, &b.id)))
        .filter(|(_, id)| *id != source)
        .collect();
    let before = others.iter().rev().find(|(p, _)| *p < position).copied();
    let after = others.iter().find(|(p, _)| *p > position).copied();
    match (before, after) {
        (Some((_, anchor)), _) => move_after(store, source, anchor)?,
        (None, Some((_, anchor))) => move_before(store, source, anchor)?,
        (None, None) => {}
    }

    info!(block = %source, row = grid.row_id.short(), position, "dropped into free cell");
    Ok(Ok(DropOutcome::Moved {
        block: source.clone(),
        target: resolved,
        swapped_with: None,
    }))
}

/// Place `id` directly after `anchor` in order.
fn move_after(store: &mut BlockStore, id: &BlockId, anchor: &BlockId) -> Result<()> {
    let (from, to) = indices(store, id, anchor)?;
    let index = if from < to { to } else { to + 1 };
    store.move_to(id, index)
}

/// Place `id` directly before `anchor` in order.
fn move_before(store: &mut BlockStore, id: &BlockId, anchor: &BlockId) -> Result<()> {
    let (from, to) = indices(store, id, anchor)?;
    let index = if from < to { to - 1 } else { to };
    store.move_to(id, index)
}

fn indices(store: &BlockStore, id: &BlockId, anchor: &BlockId) -> Result<(usize, usize)> {
    let from = store
        .index_of(id)
        .ok_or_else(|| LayoutError::BlockNotFound(id.clone()))?;
    let to = store
        .index_of(anchor)
        .ok_or_else(|| LayoutError::BlockNotFound(anchor.clone()))?;
    Ok((from, to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{convert_to_grid, ungroup_row};
    use folio_types::{BlockKind, DocumentId};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn test_store() -> BlockStore {
        BlockStore::new(DocumentId::new("review-3"))
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn ids(store: &BlockStore) -> Vec<BlockId> {
        store.blocks().iter().map(|b| b.id.clone()).collect()
    }

    /// `[A, B, D, C]` with B and D forming a two-column row.
    fn scenario() -> (BlockStore, [BlockId; 4], RowId) {
        let mut store = test_store();
        let a = store.add(BlockKind::Heading, None);
        let b = store.add(BlockKind::Paragraph, None);
        let c = store.add(BlockKind::Quote, None);
        let conv = convert_to_grid(&mut store, &b, 2, 16).unwrap();
        let d = conv.created[0].clone();
        (store, [a, b, c, d], conv.row_id)
    }

    #[test]
    fn test_begin_and_end() {
        let (store, [a, ..], _) = scenario();
        let mut engine = DragEngine::default();
        assert_eq!(engine.phase(), &DragPhase::Idle);

        engine.begin(&store, &a).unwrap();
        assert_eq!(
            engine.phase(),
            &DragPhase::Dragging {
                source: a.clone(),
                origin: RowKey::Single(a.clone()),
            }
        );

        engine.end();
        assert_eq!(engine.phase(), &DragPhase::Idle);
    }

    #[test]
    fn test_begin_records_grid_origin() {
        let (store, [_, b, ..], row) = scenario();
        let mut engine = DragEngine::default();
        engine.begin(&store, &b).unwrap();
        assert!(matches!(engine.phase(), DragPhase::Dragging { origin: RowKey::Grid(r), .. } if *r == row));
        assert_eq!(engine.origin(), Some(&RowKey::Grid(row)));
    }

    #[test]
    fn test_begin_rejects_reentry() {
        let (store, [a, b, ..], _) = scenario();
        let mut engine = DragEngine::default();
        engine.begin(&store, &a).unwrap();
        assert_eq!(
            engine.begin(&store, &b).unwrap_err(),
            DragError::AlreadyDragging(a.clone())
        );
        assert_eq!(engine.source(), Some(&a));
    }

    #[test]
    fn test_begin_rejects_unknown_source() {
        let (store, ..) = scenario();
        let mut engine = DragEngine::default();
        assert_eq!(
            engine.begin(&store, &BlockId::Num(55)).unwrap_err(),
            DragError::UnknownSource(BlockId::Num(55))
        );
        assert_eq!(engine.phase(), &DragPhase::Idle);
    }

    #[test]
    fn test_begin_after_commit_or_cancel() {
        let (store, [a, b, ..], _) = scenario();
        let mut engine = DragEngine::default();
        engine.begin(&store, &a).unwrap();
        assert!(engine.cancel());
        assert_eq!(engine.phase(), &DragPhase::Cancelled(CancelReason::Explicit));
        assert!(!engine.cancel());

        engine.begin(&store, &b).unwrap();
        assert_eq!(engine.source(), Some(&b));
    }

    #[test]
    fn test_hover_settles_after_delay() {
        let (store, [a, _, c, _], _) = scenario();
        let mut engine = DragEngine::new(DragTiming {
            settle: ms(50),
            leave: ms(100),
        });
        let t0 = Instant::now();
        let target = DropTarget::row(RowKey::Single(c.clone()));

        engine.begin(&store, &a).unwrap();
        engine.hover(target.clone(), t0);
        assert!(engine.hovered().is_none());

        // Repeated hovers over the same target do not restart the clock.
        engine.hover(target.clone(), t0 + ms(30));
        engine.tick(t0 + ms(40));
        assert!(engine.hovered().is_none());

        engine.tick(t0 + ms(50));
        assert_eq!(engine.hovered(), Some(&target));
    }

    #[test]
    fn test_fast_pointer_never_settles() {
        let (store, [a, b, c, _], _) = scenario();
        let mut engine = DragEngine::default();
        let t0 = Instant::now();
        engine.begin(&store, &a).unwrap();

        engine.hover(DropTarget::row(RowKey::Single(c.clone())), t0);
        engine.hover(DropTarget::row(RowKey::Single(b.clone())), t0 + ms(20));
        engine.hover(DropTarget::row(RowKey::Single(c)), t0 + ms(40));
        engine.tick(t0 + ms(80));
        assert!(engine.hovered().is_none());
        engine.tick(t0 + ms(90));
        assert!(engine.hovered().is_some());
    }

    #[test]
    fn test_leave_clears_after_delay() {
        let (store, [a, _, c, _], _) = scenario();
        let mut engine = DragEngine::new(DragTiming {
            settle: Duration::ZERO,
            leave: ms(100),
        });
        let t0 = Instant::now();
        let target = DropTarget::row(RowKey::Single(c));

        engine.begin(&store, &a).unwrap();
        engine.hover(target.clone(), t0);
        assert_eq!(engine.hovered(), Some(&target));

        engine.leave(t0 + ms(10));
        engine.tick(t0 + ms(60));
        assert_eq!(engine.hovered(), Some(&target));

        // Coming back in time keeps the hover.
        engine.hover(target.clone(), t0 + ms(70));
        engine.tick(t0 + ms(500));
        assert_eq!(engine.hovered(), Some(&target));

        engine.leave(t0 + ms(600));
        engine.tick(t0 + ms(700));
        assert!(engine.hovered().is_none());
        assert!(matches!(engine.phase(), DragPhase::Dragging { .. }));
    }

    #[test]
    fn test_hover_ignored_when_idle() {
        let mut engine = DragEngine::default();
        let phase = engine.hover(DropTarget::row(RowKey::Single(BlockId::Num(1))), Instant::now());
        assert_eq!(phase, &DragPhase::Idle);
    }

    #[test]
    fn test_drag_cancel_safety() {
        let (mut store, [a, _, c, _], _) = scenario();
        let mut engine = DragEngine::default();
        engine.begin(&store, &a).unwrap();

        store.delete(&a).unwrap();
        let before = store.blocks().to_vec();
        let version = store.version();

        let outcome = engine.drop(
            &mut store,
            Some(DropTarget::row(RowKey::Single(c))),
            Instant::now(),
        );
        assert_eq!(outcome, DropOutcome::Cancelled(CancelReason::SourceVanished));
        assert_eq!(store.version(), version);
        assert_eq!(store.blocks(), before.as_slice());

        engine.end();
        assert_eq!(engine.phase(), &DragPhase::Idle);
    }

    #[test]
    fn test_drop_on_vanished_row_cancels() {
        let (mut store, [a, ..], row) = scenario();
        let mut engine = DragEngine::default();
        engine.begin(&store, &a).unwrap();
        ungroup_row(&mut store, &row).unwrap();
        let version = store.version();

        let outcome = engine.drop(&mut store, Some(DropTarget::cell(row, 0)), Instant::now());
        assert_eq!(outcome, DropOutcome::Cancelled(CancelReason::TargetVanished));
        assert_eq!(store.version(), version);
    }

    #[test]
    fn test_drop_without_target_cancels() {
        let (mut store, [a, ..], _) = scenario();
        let mut engine = DragEngine::default();
        engine.begin(&store, &a).unwrap();
        let version = store.version();

        assert_eq!(
            engine.drop(&mut store, None, Instant::now()),
            DropOutcome::Cancelled(CancelReason::NoTarget)
        );
        assert_eq!(store.version(), version);
    }

    #[test]
    fn test_drop_when_idle() {
        let (mut store, ..) = scenario();
        let mut engine = DragEngine::default();
        assert_eq!(engine.drop(&mut store, None, Instant::now()), DropOutcome::NotDragging);
    }

    #[test]
    fn test_drop_out_of_range_cell_cancels() {
        let (mut store, [a, ..], row) = scenario();
        let mut engine = DragEngine::default();
        engine.begin(&store, &a).unwrap();
        assert_eq!(
            engine.drop(&mut store, Some(DropTarget::cell(row, 7)), Instant::now()),
            DropOutcome::Cancelled(CancelReason::CellOutOfRange)
        );
    }

    #[test]
    fn test_drop_on_occupied_cell_swaps() {
        let (mut store, [a, b, c, d], row) = scenario();
        let mut engine = DragEngine::default();
        engine.begin(&store, &a).unwrap();

        let outcome = engine.drop(
            &mut store,
            Some(DropTarget::cell(row.clone(), 1)),
            Instant::now(),
        );

        assert_eq!(
            outcome,
            DropOutcome::Moved {
                block: a.clone(),
                target: DropTarget::cell(row.clone(), 1),
                swapped_with: Some(d.clone()),
            }
        );
        let la = store.get(&a).unwrap().layout.clone().unwrap();
        assert_eq!((la.row_id.clone(), la.position, la.columns, la.gap), (row.clone(), 1, 2, 16));
        assert!(store.get(&d).unwrap().layout.is_none());
        assert_eq!(ids(&store), vec![d.clone(), b.clone(), a.clone(), c.clone()]);

        let grouping = group_rows(store.blocks());
        assert!(grouping.is_clean());
        let keys: Vec<_> = grouping.rows.iter().map(LayoutRow::key).collect();
        assert_eq!(
            keys,
            vec![RowKey::Single(d), RowKey::Grid(row), RowKey::Single(c)]
        );
        assert!(matches!(
            engine.phase(),
            DragPhase::Committed { origin: RowKey::Single(o), .. } if *o == a
        ));
    }

    #[test]
    fn test_drop_on_own_cell_is_unchanged() {
        let (mut store, [_, b, ..], row) = scenario();
        let mut engine = DragEngine::default();
        engine.begin(&store, &b).unwrap();
        let version = store.version();

        let outcome = engine.drop(&mut store, Some(DropTarget::cell(row, 0)), Instant::now());
        assert_eq!(outcome, DropOutcome::Unchanged { block: b });
        assert_eq!(store.version(), version);
    }

    #[test]
    fn test_drop_into_free_cell_orders_by_position() {
        let mut store = test_store();
        let a = store.add(BlockKind::Heading, None);
        let b = store.add(BlockKind::Paragraph, None);
        let c = store.add(BlockKind::Quote, None);
        let conv = convert_to_grid(&mut store, &b, 3, 12).unwrap();
        store.delete(&conv.created[0]).unwrap();
        let tail = conv.created[1].clone();

        let mut engine = DragEngine::default();
        engine.begin(&store, &c).unwrap();
        let outcome = engine.drop(
            &mut store,
            Some(DropTarget::cell(conv.row_id.clone(), 1)),
            Instant::now(),
        );

        assert!(matches!(outcome, DropOutcome::Moved { swapped_with: None, .. }));
        assert_eq!(ids(&store), vec![a, b, c.clone(), tail]);
        let lc = store.get(&c).unwrap().layout.clone().unwrap();
        assert_eq!((lc.position, lc.columns, lc.gap), (1, 3, 12));
        let grouping = group_rows(store.blocks());
        assert!(grouping.is_clean());
        assert!(grouping.grid(&conv.row_id).unwrap().is_full());
    }

    #[test]
    fn test_drop_into_leftmost_free_cell_moves_before_members() {
        let (mut store, [a, b, c, d], row) = scenario();
        store.delete(&b).unwrap();

        let mut engine = DragEngine::default();
        engine.begin(&store, &c).unwrap();
        engine.drop(&mut store, Some(DropTarget::cell(row, 0)), Instant::now());

        assert_eq!(ids(&store), vec![a, c, d]);
    }

    #[test]
    fn test_drop_onto_plain_row_demotes() {
        let (mut store, [a, b, c, d], row) = scenario();
        let mut engine = DragEngine::default();
        engine.begin(&store, &d).unwrap();

        let outcome = engine.drop(
            &mut store,
            Some(DropTarget::row(RowKey::Single(a.clone()))),
            Instant::now(),
        );
        assert!(matches!(outcome, DropOutcome::Moved { .. }));
        assert!(store.get(&d).unwrap().layout.is_none());
        assert_eq!(ids(&store), vec![a, d, b.clone(), c]);

        let grouping = group_rows(store.blocks());
        let grid = grouping.grid(&row).unwrap();
        assert_eq!(grid.holes(), vec![1]);
        assert_eq!(grid.cells[0].as_ref().unwrap().id, b);
    }

    #[test]
    fn test_drop_onto_later_plain_row() {
        let (mut store, [a, b, c, d], _) = scenario();
        let mut engine = DragEngine::default();
        engine.begin(&store, &a).unwrap();
        engine.drop(
            &mut store,
            Some(DropTarget::row(RowKey::Single(c.clone()))),
            Instant::now(),
        );
        assert_eq!(ids(&store), vec![b, d, c, a]);
    }

    #[test]
    fn test_drop_uses_settled_hover() {
        let (mut store, [a, b, c, d], row) = scenario();
        let mut engine = DragEngine::default();
        let t0 = Instant::now();
        engine.begin(&store, &c).unwrap();
        engine.hover(DropTarget::cell(row.clone(), 0), t0);

        let outcome = engine.drop(&mut store, None, t0 + ms(200));
        assert_eq!(
            outcome,
            DropOutcome::Moved {
                block: c.clone(),
                target: DropTarget::cell(row, 0),
                swapped_with: Some(b.clone()),
            }
        );
        assert_eq!(ids(&store), vec![a, c, d, b]);
    }

    #[test]
    fn test_default_position_prefers_highest_hole() {
        let mut store = test_store();
        let a = store.add(BlockKind::Heading, None);
        let b = store.add(BlockKind::Paragraph, None);
        let conv = convert_to_grid(&mut store, &b, 3, 16).unwrap();
        store.delete(&conv.created[1]).unwrap();

        let mut engine = DragEngine::default();
        engine.begin(&store, &a).unwrap();
        let outcome = engine.drop(
            &mut store,
            Some(DropTarget::row(RowKey::Grid(conv.row_id.clone()))),
            Instant::now(),
        );
        assert_eq!(
            outcome,
            DropOutcome::Moved {
                block: a.clone(),
                target: DropTarget::cell(conv.row_id.clone(), 2),
                swapped_with: None,
            }
        );
    }

    #[test]
    fn test_default_position_full_row_swaps_last() {
        let (mut store, [a, _, _, d], row) = scenario();
        let mut engine = DragEngine::default();
        engine.begin(&store, &a).unwrap();
        let outcome = engine.drop(
            &mut store,
            Some(DropTarget::row(RowKey::Grid(row.clone()))),
            Instant::now(),
        );
        assert_eq!(
            outcome,
            DropOutcome::Moved {
                block: a,
                target: DropTarget::cell(row, 1),
                swapped_with: Some(d),
            }
        );
    }

    #[test]
    fn test_random_gestures_keep_cells_unique() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut store = test_store();
        for _ in 0..6 {
            store.add(BlockKind::Paragraph, None);
        }
        let mut engine = DragEngine::new(DragTiming {
            settle: Duration::ZERO,
            leave: Duration::ZERO,
        });

        for step in 0..1_500 {
            let n = store.len();
            let pick = |rng: &mut StdRng, store: &BlockStore| {
                store.blocks()[rng.gen_range(0..n)].id.clone()
            };
            match rng.gen_range(0..10) {
                0 => {
                    // New blocks go between rows, never inside one.
                    let mut starts: Vec<usize> =
                        group_rows(store.blocks()).rows.iter().map(|r| r.span().0).collect();
                    starts.push(n);
                    let at = starts[rng.gen_range(0..starts.len())];
                    store.add(BlockKind::Paragraph, Some(at));
                }
                1 if n > 2 => {
                    let id = pick(&mut rng, &store);
                    store.delete(&id).unwrap();
                }
                2 => {
                    let id = pick(&mut rng, &store);
                    store.duplicate(&id).unwrap();
                }
                3 => {
                    let id = pick(&mut rng, &store);
                    let columns = rng.gen_range(2..=4);
                    let _ = convert_to_grid(&mut store, &id, columns, 16);
                }
                _ => {
                    let source = pick(&mut rng, &store);
                    let anchor = store.blocks()[rng.gen_range(0..n)].clone();
                    let position = rng.gen_bool(0.7).then(|| rng.gen_range(0..5));
                    let target = DropTarget {
                        row: RowKey::of(&anchor),
                        position,
                    };
                    engine.begin(&store, &source).unwrap();
                    engine.drop(&mut store, Some(target), Instant::now());
                    engine.end();
                }
            }

            assert!(store.check_invariants().is_ok(), "order broken at step {step}");
            let grouping = group_rows(store.blocks());
            assert!(grouping.is_clean(), "step {step}: {:?}", grouping.issues);
            assert_eq!(engine.phase(), &DragPhase::Idle);
        }
    }
}
