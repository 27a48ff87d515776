//! folio: inspect and edit document exchange files.
//!
//! Usage:
//!   folio rows review.json
//!   folio preview review.json --width 100
//!   folio add review.json heading --at 0
//!   folio grid review.json 12 --columns 3
//!   folio drop review.json 7 --row 3f2a9c1e-... --position 1
//!   folio drop review.json 7 --row block:12
//!
//! Mutating commands save the file in place. Logs go to stderr
//! (`RUST_LOG=debug` for more).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};

use folio_editor::{EditorConfig, EditorSession, JsonFileBackend};
use folio_layout::{
    Direction, DropOutcome, DropTarget, LayoutRow, RowKey, SummaryRenderer, group_rows, project,
    render_outline, ungroup_row,
};
use folio_types::{BlockId, BlockKind, DocumentId};

/// Inspect and edit folio documents.
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(about = "Inspect and edit folio document exchange files")]
struct Args {
    /// Editor config (RON). Defaults to <config dir>/folio/editor.ron
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List layout rows
    Rows { file: PathBuf },

    /// Render a text preview (hidden blocks omitted)
    Preview {
        file: PathBuf,
        #[arg(long, default_value_t = 80)]
        width: usize,
    },

    /// Report layout problems; fails if any are found
    Check { file: PathBuf },

    /// Add a block
    Add {
        file: PathBuf,
        kind: BlockKind,
        /// Insert at this index instead of appending
        #[arg(long)]
        at: Option<usize>,
    },

    /// Delete a block
    Delete {
        file: PathBuf,
        #[arg(value_parser = BlockId::parse, allow_negative_numbers = true)]
        id: BlockId,
    },

    /// Duplicate a block right after itself
    Duplicate {
        file: PathBuf,
        #[arg(value_parser = BlockId::parse, allow_negative_numbers = true)]
        id: BlockId,
    },

    /// Move a block one step up or down
    Move {
        file: PathBuf,
        #[arg(value_parser = BlockId::parse, allow_negative_numbers = true)]
        id: BlockId,
        direction: Direction,
    },

    /// Turn a block into the first cell of a new grid row
    Grid {
        file: PathBuf,
        #[arg(value_parser = BlockId::parse, allow_negative_numbers = true)]
        id: BlockId,
        #[arg(long, default_value_t = folio_layout::DEFAULT_COLUMNS)]
        columns: usize,
    },

    /// Drop a block onto a row (grid row id, or block:<ID> for a plain row)
    Drop {
        file: PathBuf,
        #[arg(value_parser = BlockId::parse, allow_negative_numbers = true)]
        id: BlockId,
        #[arg(long, value_parser = RowKey::parse)]
        row: RowKey,
        /// Target cell; defaults to the end of the row
        #[arg(long)]
        position: Option<usize>,
    },

    /// Dissolve a grid row into single blocks
    Ungroup { file: PathBuf, row: String },
}

impl Command {
    fn file(&self) -> &Path {
        match self {
            Command::Rows { file }
            | Command::Preview { file, .. }
            | Command::Check { file }
            | Command::Add { file, .. }
            | Command::Delete { file, .. }
            | Command::Duplicate { file, .. }
            | Command::Move { file, .. }
            | Command::Grid { file, .. }
            | Command::Drop { file, .. }
            | Command::Ungroup { file, .. } => file.as_path(),
        }
    }

    fn is_read_only(&self) -> bool {
        matches!(
            self,
            Command::Rows { .. } | Command::Preview { .. } | Command::Check { .. }
        )
    }
}

/// Relative paths that do not exist here are looked up in `document_dir`.
fn resolve_path(file: &Path, config: &EditorConfig) -> PathBuf {
    if file.is_absolute() || file.exists() {
        return file.to_path_buf();
    }
    match config.document_dir() {
        Some(dir) if dir.join(file).exists() => dir.join(file),
        _ => file.to_path_buf(),
    }
}

fn document_id(path: &Path) -> DocumentId {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".into());
    DocumentId::new(stem)
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => EditorConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EditorConfig::load_default().context("loading default config")?,
    };

    let path = resolve_path(args.command.file(), &config);
    if args.command.is_read_only() && !path.exists() {
        bail!("{} does not exist", path.display());
    }

    debug!(path = %path.display(), "opening document");
    let session = EditorSession::open(
        Arc::new(JsonFileBackend::new(&path)),
        document_id(&path),
        config,
    )
    .await
    .with_context(|| format!("opening {}", path.display()))?;

    run(&session, args.command).await
}

async fn run(session: &EditorSession, command: Command) -> Result<()> {
    match command {
        Command::Rows { .. } => {
            print!("{}", format_rows(&session.rows()));
            return Ok(());
        }
        Command::Preview { width, .. } => {
            let store = session.store().read();
            print!("{}", render_outline(&project(store.blocks()), &SummaryRenderer, width));
            return Ok(());
        }
        Command::Check { .. } => {
            let store = session.store().read();
            let grouping = group_rows(store.blocks());
            for issue in &grouping.issues {
                println!("{issue}");
            }
            if !grouping.is_clean() {
                bail!("{} layout issue(s) found", grouping.issues.len());
            }
            println!("ok: {} blocks in {} rows", store.len(), grouping.rows.len());
            return Ok(());
        }
        Command::Add { kind, at, .. } => {
            let index = session.edit(|s| {
                let id = s.add(kind, at);
                s.index_of(&id)
            });
            save(session).await?;
            print_block_at(session, index, "added");
        }
        Command::Delete { id, .. } => {
            session.edit(|s| s.delete(&id))?;
            save(session).await?;
            println!("deleted {id}");
        }
        Command::Duplicate { id, .. } => {
            let index = session.edit(|s| {
                let copy = s.duplicate(&id)?;
                Ok::<_, folio_layout::LayoutError>(s.index_of(&copy))
            })?;
            save(session).await?;
            print_block_at(session, index, "duplicated as");
        }
        Command::Move { id, direction, .. } => {
            let moved = session.edit(|s| s.move_block(&id, direction))?;
            if !moved {
                println!("{id} cannot move further {}", direction_name(direction));
                return Ok(());
            }
            save(session).await?;
            println!("moved {id} {}", direction_name(direction));
        }
        Command::Grid { id, columns, .. } => {
            let conversion = session.convert_to_grid(&id, columns)?;
            save(session).await?;
            println!("created grid row {} ({columns} columns)", conversion.row_id);
        }
        Command::Drop {
            id, row, position, ..
        } => {
            let mut engine = session.drag_engine();
            let outcome = session.edit(|s| {
                engine.begin(s, &id)?;
                let outcome = engine.drop(s, Some(DropTarget { row, position }), Instant::now());
                engine.end();
                Ok::<_, folio_layout::DragError>(outcome)
            })?;
            match outcome {
                DropOutcome::Moved {
                    target,
                    swapped_with,
                    ..
                } => {
                    save(session).await?;
                    match swapped_with {
                        Some(other) => println!("dropped {id} onto {target:?}, swapped with {other}"),
                        None => println!("dropped {id} onto {target:?}"),
                    }
                }
                DropOutcome::Unchanged { .. } => println!("{id} is already there"),
                DropOutcome::Cancelled(reason) => bail!("drop cancelled: {reason:?}"),
                DropOutcome::NotDragging => bail!("drop without an active drag"),
            }
        }
        Command::Ungroup { row, .. } => {
            let row_id = folio_types::RowId::new(row);
            let released = session.edit(|s| ungroup_row(s, &row_id))?;
            save(session).await?;
            println!("ungrouped {released} blocks");
        }
    }
    Ok(())
}

fn direction_name(direction: Direction) -> &'static str {
    match direction {
        Direction::Up => "up",
        Direction::Down => "down",
    }
}

async fn save(session: &EditorSession) -> Result<()> {
    session.save_now().await.context("saving document")?;
    Ok(())
}

fn print_block_at(session: &EditorSession, index: Option<usize>, verb: &str) {
    let store = session.store().read();
    if let Some(block) = index.and_then(|i| store.blocks().get(i)) {
        println!("{verb} {} {}", block.kind, block.id);
    }
}

fn format_rows(rows: &[LayoutRow]) -> String {
    let mut out = String::new();
    for row in rows {
        match row {
            LayoutRow::Single(block) => {
                let hidden = if block.visible { "" } else { " (hidden)" };
                out.push_str(&format!(
                    "{:>4}  {} {}{hidden}\n",
                    block.order, block.kind, block.id
                ));
            }
            LayoutRow::Grid(grid) => {
                let (min, max) = grid.span;
                out.push_str(&format!(
                    "{min:>4}  grid {} ({} columns, gap {}, orders {min}..={max})\n",
                    grid.row_id, grid.columns, grid.gap
                ));
                for (position, cell) in grid.cells.iter().enumerate() {
                    match cell {
                        Some(block) => out.push_str(&format!(
                            "        [{position}] {} {} ({})\n",
                            block.kind,
                            block.id,
                            block
                                .layout
                                .as_ref()
                                .map_or("top", |l| l.vertical_align.as_str())
                        )),
                        None => out.push_str(&format!("        [{position}] (empty)\n")),
                    }
                }
            }
        }
    }
    out
}
