//! Layout grouper: derive display rows from the flat block list.
//!
//! Rows are never stored. [`group_rows`] rebuilds them from each block's
//! `order` and `layout` on every call, and [`LayoutMemo`] caches the result
//! per store version.
//!
//! Rows come out in the order of their first member. Grid rows collect every
//! block sharing a `rowId`, wherever it sits; blocks between two members of
//! the same row are emitted after the grid as if outside it.
//!
//! Malformed grids never panic and never drop a block. Each problem becomes a
//! [`LayoutIssue`], and a block that cannot take its cell is emitted as a
//! single row right after its grid.

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use tracing::debug;

use folio_types::{Block, BlockId, IdError, RowId};

use crate::{BlockStore, GRID_COLUMN_LIMIT};

/// Identifies a row as a drop target.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum RowKey {
    /// A plain row, named by its only block.
    Single(BlockId),
    /// A grid row.
    Grid(RowId),
}

impl RowKey {
    /// Row key for the row a block currently sits in.
    pub fn of(block: &Block) -> Self {
        match block.row_id() {
            Some(row_id) => RowKey::Grid(row_id.clone()),
            None => RowKey::Single(block.id.clone()),
        }
    }

    /// Parse `block:<id>` as a single row, anything else as a grid row id.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        let s = s.trim();
        match s.strip_prefix("block:") {
            Some(id) => Ok(RowKey::Single(BlockId::parse(id)?)),
            None if s.is_empty() => Err(IdError::Empty),
            None => Ok(RowKey::Grid(RowId::new(s))),
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Single(id) => write!(f, "block:{id}"),
            RowKey::Grid(row_id) => write!(f, "{row_id}"),
        }
    }
}

impl fmt::Debug for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Single(id) => write!(f, "Single({id})"),
            RowKey::Grid(row_id) => write!(f, "Grid({})", row_id.short()),
        }
    }
}

/// A multi-column row.
#[derive(Clone, Debug, PartialEq)]
pub struct GridRow {
    pub row_id: RowId,
    pub columns: usize,
    pub gap: u32,
    /// Indexed by position; `None` is an empty cell.
    pub cells: Vec<Option<Block>>,
    /// `(min_order, max_order)` over the members.
    pub span: (usize, usize),
}

impl GridRow {
    /// Occupied cells in position order.
    pub fn members(&self) -> impl Iterator<Item = &Block> {
        self.cells.iter().flatten()
    }

    /// Empty cell positions, ascending.
    pub fn holes(&self) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.is_none().then_some(i))
            .collect()
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }
}

/// A derived display row.
#[derive(Clone, Debug, PartialEq)]
pub enum LayoutRow {
    Single(Block),
    Grid(GridRow),
}

impl LayoutRow {
    pub fn key(&self) -> RowKey {
        match self {
            LayoutRow::Single(block) => RowKey::Single(block.id.clone()),
            LayoutRow::Grid(grid) => RowKey::Grid(grid.row_id.clone()),
        }
    }

    /// `(min_order, max_order)` covered by this row.
    pub fn span(&self) -> (usize, usize) {
        match self {
            LayoutRow::Single(block) => (block.order, block.order),
            LayoutRow::Grid(grid) => grid.span,
        }
    }

    /// Blocks in this row (a single block, or grid cells by position).
    pub fn members(&self) -> Vec<&Block> {
        match self {
            LayoutRow::Single(block) => vec![block],
            LayoutRow::Grid(grid) => grid.members().collect(),
        }
    }

    pub fn as_grid(&self) -> Option<&GridRow> {
        match self {
            LayoutRow::Grid(grid) => Some(grid),
            LayoutRow::Single(_) => None,
        }
    }
}

/// A grid inconsistency found while grouping.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LayoutIssue {
    /// A member disagrees with the row's geometry; the lowest-order member's
    /// values were used.
    #[error("block {block} in row {row_id} has columns={columns} gap={gap}, differs from the row")]
    ConflictingGeometry {
        row_id: RowId,
        block: BlockId,
        columns: usize,
        gap: u32,
    },

    /// Two members claim one cell; the later one was moved out of the grid.
    #[error("block {block} claims taken cell {position} of row {row_id}")]
    DuplicatePosition {
        row_id: RowId,
        position: usize,
        block: BlockId,
    },

    /// A member sits outside the row; it was moved out of the grid.
    #[error("block {block} at position {position} is outside {columns}-column row {row_id}")]
    PositionOutOfRange {
        row_id: RowId,
        position: usize,
        columns: usize,
        block: BlockId,
    },

    /// Members are not adjacent in order.
    #[error("row {row_id} spans orders {}..={} with other blocks in between", .span.0, .span.1)]
    NonContiguous { row_id: RowId, span: (usize, usize) },

    /// The row declares no columns; its members were emitted as single rows.
    #[error("row {row_id} has zero columns")]
    ZeroColumns { row_id: RowId },

    /// The row is wider than [`GRID_COLUMN_LIMIT`]; its members were emitted
    /// as single rows.
    #[error("row {row_id} declares {columns} columns, more than {limit}", limit = GRID_COLUMN_LIMIT)]
    TooManyColumns { row_id: RowId, columns: usize },
}

/// Rows plus whatever was wrong with the input.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Grouping {
    pub rows: Vec<LayoutRow>,
    pub issues: Vec<LayoutIssue>,
}

impl Grouping {
    /// Find a row by key.
    pub fn find(&self, key: &RowKey) -> Option<&LayoutRow> {
        self.rows.iter().find(|row| &row.key() == key)
    }

    /// Find the grid row with this id.
    pub fn grid(&self, row_id: &RowId) -> Option<&GridRow> {
        self.rows
            .iter()
            .filter_map(LayoutRow::as_grid)
            .find(|grid| &grid.row_id == row_id)
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Partition blocks into display rows.
///
/// Input order does not matter; blocks are sorted by `order` first.
pub fn group_rows(blocks: &[Block]) -> Grouping {
    let mut sorted: Vec<&Block> = blocks.iter().collect();
    sorted.sort_by_key(|b| b.order);

    // Members of each row, in order of first appearance.
    let mut members: IndexMap<&RowId, Vec<&Block>> = IndexMap::new();
    for &block in &sorted {
        if let Some(row_id) = block.row_id() {
            members.entry(row_id).or_default().push(block);
        }
    }

    let mut grouping = Grouping::default();
    let mut emitted: HashSet<&RowId> = HashSet::new();

    for &block in &sorted {
        let Some(row_id) = block.row_id() else {
            grouping.rows.push(LayoutRow::Single(block.clone()));
            continue;
        };
        if !emitted.insert(row_id) {
            continue;
        }
        let row_members = members.get(row_id).map(Vec::as_slice).unwrap_or_default();
        emit_grid(row_id, row_members, &mut grouping);
    }

    if !grouping.issues.is_empty() {
        debug!(issues = grouping.issues.len(), "grouped rows with layout issues");
    }
    grouping
}

/// Rows only, for callers that do not care about diagnostics.
pub fn rows(blocks: &[Block]) -> Vec<LayoutRow> {
    group_rows(blocks).rows
}

fn emit_grid(row_id: &RowId, members: &[&Block], grouping: &mut Grouping) {
    let Some(geometry) = members.first().and_then(|b| b.layout.as_ref()) else {
        return;
    };
    let (columns, gap) = (geometry.columns, geometry.gap);

    if columns == 0 || columns > GRID_COLUMN_LIMIT {
        let issue = if columns == 0 {
            LayoutIssue::ZeroColumns {
                row_id: row_id.clone(),
            }
        } else {
            LayoutIssue::TooManyColumns {
                row_id: row_id.clone(),
                columns,
            }
        };
        grouping.issues.push(issue);
        grouping
            .rows
            .extend(members.iter().map(|b| LayoutRow::Single((*b).clone())));
        return;
    }

    let mut cells: Vec<Option<Block>> = vec![None; columns];
    let mut overflow = Vec::new();

    for block in members {
        let Some(layout) = block.layout.as_ref() else {
            continue;
        };
        if layout.columns != columns || layout.gap != gap {
            grouping.issues.push(LayoutIssue::ConflictingGeometry {
                row_id: row_id.clone(),
                block: block.id.clone(),
                columns: layout.columns,
                gap: layout.gap,
            });
        }
        match cells.get_mut(layout.position) {
            None => {
                grouping.issues.push(LayoutIssue::PositionOutOfRange {
                    row_id: row_id.clone(),
                    position: layout.position,
                    columns,
                    block: block.id.clone(),
                });
                overflow.push(*block);
            }
            Some(Some(_)) => {
                grouping.issues.push(LayoutIssue::DuplicatePosition {
                    row_id: row_id.clone(),
                    position: layout.position,
                    block: block.id.clone(),
                });
                overflow.push(*block);
            }
            Some(cell) => *cell = Some((*block).clone()),
        }
    }

    let placed: Vec<usize> = cells.iter().flatten().map(|b| b.order).collect();
    let first = members.first().map_or(0, |b| b.order);
    let min = placed.iter().copied().min().unwrap_or(first);
    let max = placed.iter().copied().max().unwrap_or(first);
    if !placed.is_empty() && max - min + 1 != placed.len() {
        grouping.issues.push(LayoutIssue::NonContiguous {
            row_id: row_id.clone(),
            span: (min, max),
        });
    }

    grouping.rows.push(LayoutRow::Grid(GridRow {
        row_id: row_id.clone(),
        columns,
        gap,
        cells,
        span: (min, max),
    }));
    grouping
        .rows
        .extend(overflow.into_iter().map(|b| LayoutRow::Single(b.clone())));
}

// ============================================================================
// Memoization
// ============================================================================

/// Caches the grouping of one store, keyed on `(instance, version)`.
///
/// The cache is never edited in place; a version change throws it away.
#[derive(Debug, Default)]
pub struct LayoutMemo {
    key: Option<(u64, u64)>,
    grouping: Grouping,
    computed: u64,
}

impl LayoutMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grouping for the store's current version.
    pub fn grouping(&mut self, store: &BlockStore) -> &Grouping {
        let key = (store.instance(), store.version());
        if self.key != Some(key) {
            self.grouping = group_rows(store.blocks());
            self.key = Some(key);
            self.computed += 1;
        }
        &self.grouping
    }

    /// Rows for the store's current version.
    pub fn rows(&mut self, store: &BlockStore) -> &[LayoutRow] {
        &self.grouping(store).rows
    }

    /// How many times the grouping has been recomputed.
    pub fn recomputations(&self) -> u64 {
        self.computed
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }
}
