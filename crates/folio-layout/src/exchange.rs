//! JSON exchange format: the import/export file and the persisted form.
//!
//! ```json
//! [{ "id": 12, "documentId": "r-1", "order": 0, "type": "heading",
//!    "payload": {...}, "layout": null, "visible": true,
//!    "createdAt": "2026-01-01T00:00:00Z", "updatedAt": "..." }]
//! ```
//!
//! Export writes blocks in their in-memory order. Import trusts `order`
//! fields rather than array position, and either accepts the whole file or
//! rejects it with one error naming the first bad element.

use std::collections::HashSet;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use folio_types::{Block, BlockId, BlockKind, GridLayout};

use crate::GRID_COLUMN_LIMIT;

/// Why an import was rejected. Nothing is applied on any of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("import is not valid JSON: {0}")]
    Syntax(String),

    #[error("import must be a JSON array of blocks")]
    NotAnArray,

    #[error("element {index} is not an object")]
    NotAnObject { index: usize },

    #[error("element {index} is missing `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("element {index} has unknown block type {kind:?}")]
    UnknownType { index: usize, kind: String },

    #[error("element {index} is malformed: {message}")]
    Invalid { index: usize, message: String },

    #[error("element {index} repeats block id {id}")]
    DuplicateId { index: usize, id: BlockId },
}

/// Serialize blocks as a pretty-printed JSON array, in the given order.
pub fn export_json(blocks: &[Block]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(blocks)
}

/// Parse and validate an exchange file.
///
/// The result is sorted by `order` and renumbered `0..n`.
pub fn import_json(text: &str) -> Result<Vec<Block>, ImportError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ImportError::Syntax(e.to_string()))?;
    let Value::Array(items) = value else {
        return Err(ImportError::NotAnArray);
    };

    let mut blocks = Vec::with_capacity(items.len());
    let mut seen = HashSet::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let Value::Object(object) = item else {
            return Err(ImportError::NotAnObject { index });
        };
        let block = parse_block(index, object)?;
        if !seen.insert(block.id.clone()) {
            return Err(ImportError::DuplicateId {
                index,
                id: block.id,
            });
        }
        blocks.push(block);
    }

    blocks.sort_by_key(|b| b.order);
    for (order, block) in blocks.iter_mut().enumerate() {
        block.order = order;
    }
    debug!(count = blocks.len(), "parsed exchange file");
    Ok(blocks)
}

fn non_null<'a>(object: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    object.get(field).filter(|v| !v.is_null())
}

fn parse_block(index: usize, mut object: Map<String, Value>) -> Result<Block, ImportError> {
    if non_null(&object, "id").is_none() {
        return Err(ImportError::MissingField { index, field: "id" });
    }

    let Some(raw_kind) = non_null(&object, "type") else {
        return Err(ImportError::MissingField { index, field: "type" });
    };
    let kind = raw_kind
        .as_str()
        .and_then(BlockKind::from_str)
        .ok_or_else(|| ImportError::UnknownType {
            index,
            kind: raw_kind.to_string().trim_matches('"').to_string(),
        })?;
    object.insert("type".into(), Value::String(kind.as_str().into()));

    if !object.contains_key("payload") {
        match object.remove("content") {
            Some(content) => {
                object.insert("payload".into(), content);
            }
            None => return Err(ImportError::MissingField { index, field: "payload" }),
        }
    }

    object
        .entry("order")
        .or_insert_with(|| Value::from(index));
    object
        .entry("documentId")
        .or_insert_with(|| Value::String(String::new()));

    let block: Block =
        serde_json::from_value(Value::Object(object)).map_err(|e| ImportError::Invalid {
            index,
            message: e.to_string(),
        })?;
    if let Some(layout) = &block.layout {
        check_geometry(index, layout)?;
    }
    Ok(block)
}

/// Grid geometry the grouper can lay out: `1..=GRID_COLUMN_LIMIT` columns
/// and a position inside the row.
fn check_geometry(index: usize, layout: &GridLayout) -> Result<(), ImportError> {
    let message = if layout.columns == 0 || layout.columns > GRID_COLUMN_LIMIT {
        format!(
            "layout.columns is {}, expected 1..={GRID_COLUMN_LIMIT}",
            layout.columns
        )
    } else if layout.position >= layout.columns {
        format!(
            "layout.position {} is outside a {}-column row",
            layout.position, layout.columns
        )
    } else {
        return Ok(());
    };
    Err(ImportError::Invalid { index, message })
}
