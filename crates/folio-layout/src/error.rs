//! Error types for layout engine operations.

use thiserror::Error;

use folio_types::{BlockId, RowId};

/// Errors that can occur during block store and layout operations.
///
/// Every variant is raised *before* any mutation: an `Err` always means the
/// store was left exactly as it was.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// Block not found in the document (stale id, usually a UI race).
    #[error("block not found: {0:?}")]
    BlockNotFound(BlockId),

    /// No block references this row id.
    #[error("row not found: {0:?}")]
    RowNotFound(RowId),

    /// Two blocks in one collection share an id.
    #[error("duplicate block id: {0:?}")]
    DuplicateBlock(BlockId),

    /// Grid conversion asked for an unsupported column count.
    #[error("invalid column count {columns} (expected 2..={max})")]
    InvalidColumns { columns: usize, max: usize },

    /// Grid conversion on a block that is already a grid cell.
    #[error("block {0:?} is already part of a grid row")]
    AlreadyInGrid(BlockId),

    /// Cell index outside the row.
    #[error("position {position} out of range for a {columns}-column row")]
    PositionOutOfRange { position: usize, columns: usize },

    /// Cell is already taken by another block.
    #[error("cell {position} of row {row_id:?} is occupied by {occupant:?}")]
    CellOccupied {
        row_id: RowId,
        position: usize,
        occupant: BlockId,
    },
}
