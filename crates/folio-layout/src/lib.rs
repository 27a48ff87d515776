//! Document layout engine for folio.
//!
//! A document is a flat, ordered list of blocks. Everything visual is derived
//! from that list: single-column rows for plain blocks and multi-column grid
//! rows for blocks that share a `rowId`.
//!
//! # Components
//!
//! - [`BlockStore`]: canonical ordered collection; `order == index` after
//!   every mutation
//! - [`group_rows`] / [`LayoutMemo`]: pure projection of blocks into rows
//! - [`convert_to_grid`]: turn one block into the first cell of an N-column row
//! - [`DragEngine`]: drag/drop gesture state machine
//! - [`project`]: read-only preview projection (hidden blocks removed)
//! - [`export_json`] / [`import_json`]: the JSON exchange format
//!
//! All mutations go through `&mut BlockStore`. Compound operations (grid
//! conversion, drops) finish inside one call, so no reader ever observes a
//! half-applied edit.

mod block_store;
mod drag;
mod error;
mod exchange;
mod grid;
mod payload;
mod render;
mod rows;

pub use block_store::{BlockStore, Direction, InvariantError, NewBlock};
pub use drag::{
    CancelReason, DragEngine, DragError, DragPhase, DragTiming, DropOutcome, DropTarget,
};
pub use error::LayoutError;
pub use exchange::{ImportError, export_json, import_json};
pub use grid::{GridConversion, convert_to_grid, convert_to_grid_within, fill_cell, ungroup_row};
pub use payload::{DefaultPayloads, PayloadFactory};
pub use render::{
    BlockRenderer, PreviewCell, PreviewRow, SummaryRenderer, cell_spans, project, render_outline,
};
pub use rows::{GridRow, Grouping, LayoutIssue, LayoutMemo, LayoutRow, RowKey, group_rows, rows};

/// Result type for layout operations.
pub type Result<T> = std::result::Result<T, LayoutError>;

/// Default column count for grid conversion.
pub const DEFAULT_COLUMNS: usize = 2;

/// Default gap between grid cells, in pixels.
pub const DEFAULT_GAP: u32 = 16;

/// Upper bound on grid columns unless configured otherwise.
pub const MAX_COLUMNS: usize = 6;

/// Hard ceiling on row width. Imports reject wider rows, the grouper
/// reports them, and no configuration can raise grid conversion past it.
pub const GRID_COLUMN_LIMIT: usize = 64;
