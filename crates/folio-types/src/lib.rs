//! Shared identity and block types for folio.
//!
//! This crate is the data model: typed ids, the closed set of block kinds,
//! grid membership metadata, and the `Block` record exchanged with the
//! persistence boundary. It has **no internal folio dependencies**; the layout
//! engine and editor both build on it.
//!
//! # Key Types
//!
//! |-----------------|------------------------------------------------|
//! | Type            | Purpose                                        |
//! |-----------------|------------------------------------------------|
//! | [`BlockId`]     | Block identity (number or string key)          |
//! | [`DocumentId`]  | Owning document                                |
//! | [`RowId`]       | Multi-column row identity                      |
//! | [`BlockKind`]   | Content type (heading, paragraph, table, ...)  |
//! | [`GridLayout`]  | Cell membership: row, position, columns, gap   |
//! | [`Block`]       | The record itself                              |
//! | [`BlockPatch`]  | Partial update                                 |
//! |-----------------|------------------------------------------------|

pub mod block;
pub mod ids;

pub use block::{Block, BlockKind, BlockPatch, GridLayout, VerticalAlign};
pub use ids::{BlockId, DocumentId, IdError, RowId};
