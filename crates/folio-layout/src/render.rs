//! Read-only preview projection.
//!
//! Unlike the editing view, the preview removes hidden blocks before
//! grouping: a hidden cell becomes a hole and a grid whose cells are all
//! hidden disappears. Block content is drawn by a [`BlockRenderer`].

use serde_json::Value;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use folio_types::{Block, BlockId, BlockKind, RowId, VerticalAlign};

use crate::GRID_COLUMN_LIMIT;
use crate::rows::{LayoutRow, group_rows};

/// One rendered cell.
#[derive(Clone, Debug, PartialEq)]
pub struct PreviewCell {
    pub block: Block,
    pub align: VerticalAlign,
}

impl PreviewCell {
    fn new(block: Block) -> Self {
        let align = block
            .layout
            .as_ref()
            .map(|l| l.vertical_align)
            .unwrap_or_default();
        Self { block, align }
    }

    pub fn id(&self) -> &BlockId {
        &self.block.id
    }

    pub fn kind(&self) -> BlockKind {
        self.block.kind
    }
}

/// A row of the preview.
#[derive(Clone, Debug, PartialEq)]
pub enum PreviewRow {
    Single(PreviewCell),
    Grid {
        row_id: RowId,
        columns: usize,
        gap: u32,
        cells: Vec<Option<PreviewCell>>,
    },
}

impl PreviewRow {
    /// Horizontal `(x, width)` of every cell for a row `total_width` wide.
    pub fn cell_spans(&self, total_width: u32) -> Vec<(u32, u32)> {
        match self {
            PreviewRow::Single(_) => vec![(0, total_width)],
            PreviewRow::Grid { columns, gap, .. } => cell_spans(*columns, *gap, total_width),
        }
    }
}

/// Split `total_width` into `columns` equal cells separated by `gap`.
///
/// Cell width is `(total - gap * (columns - 1)) / columns`, floored at zero.
/// Offsets past `u32::MAX` are clamped. Rows with no columns, or more than
/// [`GRID_COLUMN_LIMIT`], have no spans.
pub fn cell_spans(columns: usize, gap: u32, total_width: u32) -> Vec<(u32, u32)> {
    if columns == 0 || columns > GRID_COLUMN_LIMIT {
        return Vec::new();
    }
    let n = columns as u64;
    let gaps = u64::from(gap) * (n - 1);
    let width = u64::from(total_width).saturating_sub(gaps) / n;
    let stride = width + u64::from(gap);
    let clamp = |v: u64| u32::try_from(v).unwrap_or(u32::MAX);
    (0..n).map(|i| (clamp(i * stride), clamp(width))).collect()
}

/// Group the visible blocks into preview rows.
pub fn project(blocks: &[Block]) -> Vec<PreviewRow> {
    let visible: Vec<Block> = blocks.iter().filter(|b| b.visible).cloned().collect();
    group_rows(&visible)
        .rows
        .into_iter()
        .map(|row| match row {
            LayoutRow::Single(block) => PreviewRow::Single(PreviewCell::new(block)),
            LayoutRow::Grid(grid) => PreviewRow::Grid {
                row_id: grid.row_id,
                columns: grid.columns,
                gap: grid.gap,
                cells: grid
                    .cells
                    .into_iter()
                    .map(|cell| cell.map(PreviewCell::new))
                    .collect(),
            },
        })
        .collect()
}

// ============================================================================
// Content rendering
// ============================================================================

/// Draws a block's content. The layout engine never reads payloads itself.
pub trait BlockRenderer {
    /// Text lines for `block`, each at most `width` terminal columns wide.
    fn render(&self, block: &Block, width: usize) -> Vec<String>;
}

/// Prints the block type, id, and a one-line summary of the payload.
#[derive(Clone, Copy, Debug, Default)]
pub struct SummaryRenderer;

/// Payload fields worth showing, most descriptive first.
const SUMMARY_FIELDS: &[&str] = &["text", "title", "question", "caption", "html", "body", "source"];

impl SummaryRenderer {
    fn summary(payload: &Value) -> Option<String> {
        let object = payload.as_object()?;
        SUMMARY_FIELDS
            .iter()
            .filter_map(|key| object.get(*key).and_then(Value::as_str))
            .map(strip_tags)
            .find(|text| !text.trim().is_empty())
    }
}

impl BlockRenderer for SummaryRenderer {
    fn render(&self, block: &Block, width: usize) -> Vec<String> {
        let mut lines = wrap(&format!("[{} {}]", block.kind, block.id), width);
        if let Some(summary) = Self::summary(&block.payload) {
            lines.extend(wrap(&summary, width));
        }
        lines
    }
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Break `text` into lines of at most `width` display columns.
///
/// Breaks fall between grapheme clusters. A cluster wider than `width`
/// gets a line of its own.
fn wrap(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return Vec::new();
    }
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_width = 0;
    for grapheme in text.graphemes(true) {
        if grapheme == "\n" || grapheme == "\r\n" {
            lines.push(std::mem::take(&mut line));
            line_width = 0;
            continue;
        }
        let grapheme_width = grapheme.width();
        if line_width + grapheme_width > width && !line.is_empty() {
            lines.push(std::mem::take(&mut line));
            line_width = 0;
        }
        line.push_str(grapheme);
        line_width += grapheme_width;
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Right-pad `line` with spaces to `width` display columns.
fn pad(line: &str, width: usize) -> String {
    let fill = width.saturating_sub(line.width());
    format!("{line}{}", " ".repeat(fill))
}

/// Separator between grid cells in the text outline.
const OUTLINE_GAP: &str = " | ";

/// Lay preview rows out as fixed-width text.
///
/// Grid cells sit side by side; shorter cells are padded according to
/// their vertical alignment.
pub fn render_outline(rows: &[PreviewRow], renderer: &dyn BlockRenderer, width: usize) -> String {
    let mut out = Vec::new();
    for row in rows {
        match row {
            PreviewRow::Single(cell) => out.extend(renderer.render(&cell.block, width)),
            PreviewRow::Grid {
                row_id,
                columns,
                cells,
                ..
            } => {
                out.push(format!("-- grid {} ({columns} columns)", row_id.short()));
                let spans = cell_spans(
                    *columns,
                    OUTLINE_GAP.width() as u32,
                    u32::try_from(width).unwrap_or(u32::MAX),
                );
                let cell_width = spans.first().map_or(0, |&(_, w)| w as usize);
                let rendered: Vec<(Vec<String>, VerticalAlign)> = cells
                    .iter()
                    .map(|cell| match cell {
                        Some(cell) => (renderer.render(&cell.block, cell_width), cell.align),
                        None => (wrap("(empty)", cell_width), VerticalAlign::Top),
                    })
                    .collect();
                let height = rendered.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
                let columns: Vec<Vec<String>> = rendered
                    .into_iter()
                    .map(|(lines, align)| align_lines(lines, align, height, cell_width))
                    .collect();
                for line in 0..height {
                    let parts: Vec<&str> = columns.iter().map(|c| c[line].as_str()).collect();
                    out.push(parts.join(OUTLINE_GAP).trim_end().to_string());
                }
            }
        }
    }
    let mut text = out.join("\n");
    text.push('\n');
    text
}

fn align_lines(lines: Vec<String>, align: VerticalAlign, height: usize, width: usize) -> Vec<String> {
    let spare = height - lines.len();
    let top = match align {
        VerticalAlign::Top => 0,
        VerticalAlign::Center => spare / 2,
        VerticalAlign::Bottom => spare,
    };
    let blank = " ".repeat(width);
    let mut out = vec![blank.clone(); top];
    out.extend(lines.iter().map(|l| pad(l, width)));
    out.resize(height, blank);
    out
}
