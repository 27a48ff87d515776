//! Default payloads for newly created blocks.
//!
//! The store never looks inside a payload; it only asks a [`PayloadFactory`]
//! for the initial content of a block of a given kind.

use serde_json::{Value, json};

use folio_types::BlockKind;

/// Supplies the initial payload for a new block of `kind`.
pub trait PayloadFactory: Send + Sync {
    fn default_payload(&self, kind: BlockKind) -> Value;
}

/// Built-in empty content for each block kind.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultPayloads;

impl PayloadFactory for DefaultPayloads {
    fn default_payload(&self, kind: BlockKind) -> Value {
        match kind {
            BlockKind::Heading => json!({ "text": "", "level": 2 }),
            BlockKind::Paragraph => json!({ "html": "" }),
            BlockKind::Figure => json!({ "src": null, "caption": "", "alt": "" }),
            BlockKind::Table => json!({
                "headers": ["", ""],
                "rows": [["", ""]],
            }),
            BlockKind::Callout => json!({ "tone": "info", "html": "" }),
            BlockKind::Card => json!({ "title": "", "body": "" }),
            BlockKind::Quote => json!({ "text": "", "attribution": "" }),
            BlockKind::Poll => json!({ "question": "", "options": [], "multiple": false }),
            BlockKind::CitationList => json!({ "style": "apa", "entries": [] }),
            BlockKind::Divider => json!({}),
            BlockKind::Diagram => json!({ "nodes": [], "edges": [] }),
            BlockKind::Chart => json!({ "chart": "bar", "series": [] }),
            BlockKind::List => json!({ "ordered": false, "items": [] }),
            BlockKind::Code => json!({ "language": "", "source": "" }),
        }
    }
}

impl<F> PayloadFactory for F
where
    F: Fn(BlockKind) -> Value + Send + Sync,
{
    fn default_payload(&self, kind: BlockKind) -> Value {
        self(kind)
    }
}
