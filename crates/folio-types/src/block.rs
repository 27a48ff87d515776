//! Block types: the atomic, ordered content unit of a document.
//!
//! ## Design: order + optional grid membership
//!
//! A block knows two things about where it sits:
//!
//! - `order`: its index in the document's authoring sequence
//! - `layout`: optional grid membership (`rowId`, `position`, `columns`, `gap`)
//!
//! The row's `columns`/`gap` are copied onto every member so a block alone is
//! enough to place it. Rows themselves are never stored; they are derived by
//! grouping blocks that share a `rowId`.
//!
//! The payload is opaque here. It is only ever cloned (duplicate) or replaced
//! (update, type conversion).

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::{BlockId, DocumentId, RowId};

/// What a block *is* (content type).
///
/// Closed set. Kebab-case on the wire (`citation-list`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(ascii_case_insensitive, serialize_all = "kebab-case")]
pub enum BlockKind {
    /// Section heading.
    Heading,
    /// Rich-text paragraph. The filler type for new grid cells.
    #[default]
    Paragraph,
    /// Image with caption.
    Figure,
    /// Tabular data.
    Table,
    /// Highlighted aside.
    Callout,
    /// Titled card.
    Card,
    /// Pull quote.
    Quote,
    /// Reader poll.
    Poll,
    /// Bibliography / references.
    #[strum(serialize = "citation-list", serialize = "citations")]
    CitationList,
    /// Horizontal rule.
    Divider,
    /// Node/edge diagram.
    Diagram,
    /// Data chart.
    Chart,
    /// Bulleted or numbered list.
    List,
    /// Code listing.
    Code,
}

impl BlockKind {
    /// Every kind, in menu order.
    pub const ALL: [BlockKind; 14] = [
        BlockKind::Heading,
        BlockKind::Paragraph,
        BlockKind::Figure,
        BlockKind::Table,
        BlockKind::Callout,
        BlockKind::Card,
        BlockKind::Quote,
        BlockKind::Poll,
        BlockKind::CitationList,
        BlockKind::Divider,
        BlockKind::Diagram,
        BlockKind::Chart,
        BlockKind::List,
        BlockKind::Code,
    ];

    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Heading => "heading",
            BlockKind::Paragraph => "paragraph",
            BlockKind::Figure => "figure",
            BlockKind::Table => "table",
            BlockKind::Callout => "callout",
            BlockKind::Card => "card",
            BlockKind::Quote => "quote",
            BlockKind::Poll => "poll",
            BlockKind::CitationList => "citation-list",
            BlockKind::Divider => "divider",
            BlockKind::Diagram => "diagram",
            BlockKind::Chart => "chart",
            BlockKind::List => "list",
            BlockKind::Code => "code",
        }
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Vertical alignment of a block inside its grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum VerticalAlign {
    #[default]
    Top,
    #[strum(serialize = "center", serialize = "middle")]
    Center,
    Bottom,
}

impl VerticalAlign {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerticalAlign::Top => "top",
            VerticalAlign::Center => "center",
            VerticalAlign::Bottom => "bottom",
        }
    }

    fn is_top(&self) -> bool {
        matches!(self, VerticalAlign::Top)
    }
}

/// Grid membership of a block.
///
/// `columns` and `gap` describe the whole row and are expected to agree
/// across members; the grouper reports members that disagree.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridLayout {
    /// Row this block is a cell of.
    pub row_id: RowId,
    /// Zero-based cell index within the row.
    pub position: usize,
    /// Number of cells in the row.
    pub columns: usize,
    /// Gap between cells, in layout units.
    pub gap: u32,
    /// Alignment inside the cell. Omitted on the wire when `top`.
    #[serde(default, skip_serializing_if = "VerticalAlign::is_top")]
    pub vertical_align: VerticalAlign,
}

impl GridLayout {
    pub fn new(row_id: RowId, position: usize, columns: usize, gap: u32) -> Self {
        Self {
            row_id,
            position,
            columns,
            gap,
            vertical_align: VerticalAlign::Top,
        }
    }

    /// Same row geometry, different cell.
    pub fn at(&self, position: usize) -> Self {
        Self {
            position,
            vertical_align: VerticalAlign::Top,
            ..self.clone()
        }
    }

    /// Set the cell alignment.
    pub fn with_align(mut self, align: VerticalAlign) -> Self {
        self.vertical_align = align;
        self
    }
}

/// A block as held by the store and exchanged with the persistence boundary.
///
/// Field names follow the exchange format (`documentId`, `createdAt`, ...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Unique within the document.
    pub id: BlockId,
    /// Owning document.
    pub document_id: DocumentId,
    /// Position in authoring sequence; contiguous `0..n` across a document.
    pub order: usize,
    /// Content type.
    #[serde(rename = "type")]
    pub kind: BlockKind,
    /// Type-specific content. Never inspected by the engine.
    pub payload: serde_json::Value,
    /// Grid membership; `null` means a single-column row.
    pub layout: Option<GridLayout>,
    /// Hidden blocks are dropped from previews, dimmed in the editor.
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Creation time (ISO-8601 on the wire).
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_visible() -> bool {
    true
}

impl Block {
    /// A fresh, visible, single-column block.
    pub fn new(
        id: BlockId,
        document_id: DocumentId,
        kind: BlockKind,
        payload: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            document_id,
            order: 0,
            kind,
            payload,
            layout: None,
            visible: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Row this block belongs to, if it is a grid cell.
    pub fn row_id(&self) -> Option<&RowId> {
        self.layout.as_ref().map(|l| &l.row_id)
    }

    /// Whether this block is a cell of a multi-column row.
    pub fn is_grid_cell(&self) -> bool {
        self.layout.is_some()
    }

    /// Refresh `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Compare everything except timestamps.
    pub fn content_eq(&self, other: &Block) -> bool {
        self.id == other.id
            && self.document_id == other.document_id
            && self.order == other.order
            && self.kind == other.kind
            && self.payload == other.payload
            && self.layout == other.layout
            && self.visible == other.visible
    }
}

/// Partial update applied by `update(id, patch)`.
///
/// `None` leaves a field untouched. `layout: Some(None)` clears grid
/// membership.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlockPatch {
    pub payload: Option<serde_json::Value>,
    pub layout: Option<Option<GridLayout>>,
    pub visible: Option<bool>,
}

impl BlockPatch {
    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn layout(mut self, layout: Option<GridLayout>) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = Some(visible);
        self
    }

    /// Whether applying this patch would change nothing but `updated_at`.
    pub fn is_empty(&self) -> bool {
        self.payload.is_none() && self.layout.is_none() && self.visible.is_none()
    }

    /// Merge into `block` and refresh its `updated_at`.
    pub fn apply_to(self, block: &mut Block) {
        if let Some(payload) = self.payload {
            block.payload = payload;
        }
        if let Some(layout) = self.layout {
            block.layout = layout;
        }
        if let Some(visible) = self.visible {
            block.visible = visible;
        }
        block.touch();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Block {
        Block::new(
            BlockId::Num(1),
            DocumentId::new("doc"),
            BlockKind::Heading,
            json!({"text": "Intro", "level": 2}),
        )
    }

    #[test]
    fn test_block_kind_parsing() {
        assert_eq!(BlockKind::from_str("heading"), Some(BlockKind::Heading));
        assert_eq!(BlockKind::from_str("PARAGRAPH"), Some(BlockKind::Paragraph));
        assert_eq!(BlockKind::from_str("citation-list"), Some(BlockKind::CitationList));
        assert_eq!(BlockKind::from_str("citations"), Some(BlockKind::CitationList));
        assert_eq!(BlockKind::from_str("sidebar"), None);
    }

    #[test]
    fn test_block_kind_as_str_matches_wire() {
        for kind in BlockKind::ALL {
            let wire = serde_json::to_string(&kind).unwrap();
            assert_eq!(wire, format!("\"{}\"", kind.as_str()));
            assert_eq!(BlockKind::from_str(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_vertical_align_parsing() {
        assert_eq!(VerticalAlign::from_str("middle").ok(), Some(VerticalAlign::Center));
        assert_eq!(VerticalAlign::default(), VerticalAlign::Top);
    }

    #[test]
    fn test_block_wire_names() {
        let mut block = sample();
        block.layout = Some(GridLayout::new(RowId::new("r1"), 1, 2, 16));
        let value = serde_json::to_value(&block).unwrap();

        assert_eq!(value["type"], "heading");
        assert_eq!(value["documentId"], "doc");
        assert_eq!(value["layout"]["rowId"], "r1");
        assert_eq!(value["layout"]["position"], 1);
        assert!(value["layout"].get("verticalAlign").is_none());
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn test_absent_layout_serializes_as_null() {
        let value = serde_json::to_value(sample()).unwrap();
        assert!(value["layout"].is_null());
    }

    #[test]
    fn test_vertical_align_roundtrip_when_set() {
        let layout = GridLayout::new(RowId::new("r"), 0, 3, 8).with_align(VerticalAlign::Bottom);
        let json = serde_json::to_string(&layout).unwrap();
        assert!(json.contains("\"verticalAlign\":\"bottom\""));
        let back: GridLayout = serde_json::from_str(&json).unwrap();
        assert_eq!(back, layout);
    }

    #[test]
    fn test_missing_visible_defaults_true() {
        let block: Block = serde_json::from_value(json!({
            "id": 3,
            "documentId": "doc",
            "order": 0,
            "type": "divider",
            "payload": {},
            "layout": null
        }))
        .unwrap();
        assert!(block.visible);
    }

    #[test]
    fn test_patch_apply() {
        let mut block = sample();
        let before = block.updated_at;
        let layout = GridLayout::new(RowId::new("r"), 0, 2, 16);

        BlockPatch::default()
            .visible(false)
            .layout(Some(layout.clone()))
            .apply_to(&mut block);

        assert!(!block.visible);
        assert_eq!(block.layout, Some(layout));
        assert!(block.updated_at >= before);

        BlockPatch::default().layout(None).apply_to(&mut block);
        assert!(block.layout.is_none());
        assert!(!block.visible, "untouched fields survive");
    }

    #[test]
    fn test_grid_layout_at_keeps_geometry() {
        let layout = GridLayout::new(RowId::new("r"), 0, 3, 24).with_align(VerticalAlign::Center);
        let other = layout.at(2);
        assert_eq!(other.position, 2);
        assert_eq!(other.columns, 3);
        assert_eq!(other.gap, 24);
        assert_eq!(other.vertical_align, VerticalAlign::Top);
    }

    #[test]
    fn test_content_eq_ignores_timestamps() {
        let a = sample();
        let mut b = a.clone();
        b.updated_at = b.updated_at + chrono::Duration::seconds(5);
        assert!(a.content_eq(&b));
        b.visible = false;
        assert!(!a.content_eq(&b));
    }
}
