//! Grid conversion: compound edits that create, fill, and dissolve grid rows.
//!
//! These only go through [`BlockStore`] operations. Each call holds the store
//! exclusively, so the intermediate state between its store calls is never
//! visible to anyone else.

use tracing::{debug, info, warn};

use folio_types::{BlockId, BlockKind, BlockPatch, GridLayout, RowId};

use crate::{BlockStore, GRID_COLUMN_LIMIT, LayoutError, MAX_COLUMNS, NewBlock, Result};

/// Result of [`convert_to_grid`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridConversion {
    /// The new row.
    pub row_id: RowId,
    /// The converted block, now at position 0.
    pub source: BlockId,
    /// Filler paragraphs at positions `1..columns`.
    pub created: Vec<BlockId>,
}

/// Turn a single block into the first cell of a new `columns`-wide row.
///
/// `columns - 1` empty paragraphs are inserted right after the block, so the
/// row appears where the block was. The whole conversion is one store
/// commit.
pub fn convert_to_grid(
    store: &mut BlockStore,
    id: &BlockId,
    columns: usize,
    gap: u32,
) -> Result<GridConversion> {
    convert_to_grid_within(store, id, columns, gap, MAX_COLUMNS)
}

/// [`convert_to_grid`] with a caller-supplied column limit, itself capped at
/// [`GRID_COLUMN_LIMIT`].
pub fn convert_to_grid_within(
    store: &mut BlockStore,
    id: &BlockId,
    columns: usize,
    gap: u32,
    max_columns: usize,
) -> Result<GridConversion> {
    let Some(index) = store.index_of(id) else {
        warn!(block = %id, "grid conversion of unknown block ignored");
        return Err(LayoutError::BlockNotFound(id.clone()));
    };
    let max_columns = max_columns.min(GRID_COLUMN_LIMIT);
    if !(2..=max_columns).contains(&columns) {
        return Err(LayoutError::InvalidColumns {
            columns,
            max: max_columns,
        });
    }
    if store.blocks()[index].is_grid_cell() {
        return Err(LayoutError::AlreadyInGrid(id.clone()));
    }

    let row_id = RowId::generate();
    let layout = GridLayout::new(row_id.clone(), 0, columns, gap);
    let fillers: Vec<NewBlock> = (1..columns)
        .map(|position| NewBlock::new(BlockKind::Paragraph).with_layout(layout.at(position)))
        .collect();

    let created =
        store.update_and_insert_after(id, BlockPatch::default().layout(Some(layout)), fillers)?;

    info!(block = %id, row = row_id.short(), columns, "converted block to grid");
    Ok(GridConversion {
        row_id,
        source: id.clone(),
        created,
    })
}

/// Dissolve a row: every member becomes a single block, in place.
///
/// Returns how many blocks were released.
pub fn ungroup_row(store: &mut BlockStore, row_id: &RowId) -> Result<usize> {
    let members: Vec<BlockId> = store
        .row_members(row_id)
        .into_iter()
        .map(|b| b.id.clone())
        .collect();
    if members.is_empty() {
        warn!(row = row_id.short(), "ungroup of unknown row ignored");
        return Err(LayoutError::RowNotFound(row_id.clone()));
    }
    for id in &members {
        store.update(id, BlockPatch::default().layout(None))?;
    }
    debug!(row = row_id.short(), count = members.len(), "ungrouped row");
    Ok(members.len())
}

/// Create a block directly in an empty cell of an existing row.
///
/// The new block is ordered right after the last member with a lower
/// position, or before the first member when it takes the leftmost slot.
pub fn fill_cell(
    store: &mut BlockStore,
    row_id: &RowId,
    position: usize,
    kind: BlockKind,
) -> Result<BlockId> {
    let Some(geometry) = store.row_geometry(row_id).cloned() else {
        warn!(row = row_id.short(), "fill of unknown row ignored");
        return Err(LayoutError::RowNotFound(row_id.clone()));
    };
    if position >= geometry.columns {
        return Err(LayoutError::PositionOutOfRange {
            position,
            columns: geometry.columns,
        });
    }
    if let Some(occupant) = store.occupant(row_id, position) {
        return Err(LayoutError::CellOccupied {
            row_id: row_id.clone(),
            position,
            occupant: occupant.id.clone(),
        });
    }

    let members = store.row_members(row_id);
    let at = members
        .iter()
        .filter(|b| b.layout.as_ref().is_some_and(|l| l.position < position))
        .map(|b| b.order + 1)
        .max()
        .or_else(|| members.iter().map(|b| b.order).min())
        .unwrap_or(store.len());

    let created = store.insert_batch(
        at,
        vec![NewBlock::new(kind).with_layout(geometry.at(position))],
    );
    let id = created
        .into_iter()
        .next()
        .ok_or_else(|| LayoutError::RowNotFound(row_id.clone()))?;
    debug!(block = %id, row = row_id.short(), position, "filled grid cell");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LayoutRow, group_rows};
    use folio_types::DocumentId;

    fn test_store() -> BlockStore {
        BlockStore::new(DocumentId::new("review-7"))
    }

    fn abc() -> (BlockStore, BlockId, BlockId, BlockId) {
        let mut store = test_store();
        let a = store.add(BlockKind::Heading, None);
        let b = store.add(BlockKind::Paragraph, None);
        let c = store.add(BlockKind::Quote, None);
        (store, a, b, c)
    }

    #[test]
    fn test_convert_middle_block_two_columns() {
        let (mut store, a, b, c) = abc();

        let conv = convert_to_grid(&mut store, &b, 2, 16).unwrap();
        assert_eq!(conv.source, b);
        assert_eq!(conv.created.len(), 1);
        let d = conv.created[0].clone();

        let ids: Vec<_> = store.blocks().iter().map(|x| x.id.clone()).collect();
        assert_eq!(ids, vec![a.clone(), b.clone(), d.clone(), c.clone()]);

        let lb = store.get(&b).unwrap().layout.clone().unwrap();
        let ld = store.get(&d).unwrap().layout.clone().unwrap();
        assert_eq!((lb.position, lb.columns, lb.gap), (0, 2, 16));
        assert_eq!((ld.position, ld.columns, ld.gap), (1, 2, 16));
        assert_eq!(lb.row_id, conv.row_id);
        assert_eq!(ld.row_id, conv.row_id);
        assert_eq!(store.get(&d).unwrap().kind, BlockKind::Paragraph);

        let grouping = group_rows(store.blocks());
        assert!(grouping.is_clean());
        assert_eq!(grouping.rows.len(), 3);
        assert_eq!(grouping.rows[0], LayoutRow::Single(store.get(&a).unwrap().clone()));
        let grid = grouping.rows[1].as_grid().unwrap();
        let members: Vec<_> = grid.members().map(|x| x.id.clone()).collect();
        assert_eq!(members, vec![b, d]);
        assert_eq!(grouping.rows[2].key(), crate::RowKey::Single(c));
    }

    #[test]
    fn test_convert_three_columns_anywhere() {
        for target in 0..3 {
            let (mut store, ..) = abc();
            let id = store.blocks()[target].id.clone();

            let conv = convert_to_grid(&mut store, &id, 3, 8).unwrap();

            let grouping = group_rows(store.blocks());
            let grids: Vec<_> = grouping.rows.iter().filter_map(LayoutRow::as_grid).collect();
            assert_eq!(grids.len(), 1);
            let grid = grids[0];
            assert_eq!(grid.columns, 3);
            assert!(grid.is_full());
            assert_eq!(grid.cells[0].as_ref().unwrap().id, id);
            for (i, created) in conv.created.iter().enumerate() {
                let cell = grid.cells[i + 1].as_ref().unwrap();
                assert_eq!(&cell.id, created);
                assert_eq!(cell.kind, BlockKind::Paragraph);
            }
            // The row sits where the block used to be.
            assert_eq!(grouping.rows[target].key(), crate::RowKey::Grid(conv.row_id));
            assert!(store.check_invariants().is_ok());
        }
    }

    #[test]
    fn test_convert_is_a_single_commit() {
        let (mut store, _, b, _) = abc();
        let version = store.version();

        convert_to_grid(&mut store, &b, 4, 16).unwrap();

        assert_eq!(store.version(), version + 1);
        assert_eq!(store.len(), 6);
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn test_convert_rejects_bad_columns_untouched() {
        let (mut store, _, b, _) = abc();
        let version = store.version();

        assert_eq!(
            convert_to_grid(&mut store, &b, 1, 16).unwrap_err(),
            LayoutError::InvalidColumns { columns: 1, max: MAX_COLUMNS }
        );
        assert!(convert_to_grid(&mut store, &b, MAX_COLUMNS + 1, 16).is_err());
        assert!(convert_to_grid_within(&mut store, &b, 4, 16, 3).is_err());
        assert_eq!(
            convert_to_grid_within(&mut store, &b, GRID_COLUMN_LIMIT + 1, 16, usize::MAX)
                .unwrap_err(),
            LayoutError::InvalidColumns {
                columns: GRID_COLUMN_LIMIT + 1,
                max: GRID_COLUMN_LIMIT
            }
        );
        assert_eq!(store.version(), version);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_convert_unknown_block_is_noop() {
        let (mut store, ..) = abc();
        let err = convert_to_grid(&mut store, &BlockId::Num(999), 2, 16).unwrap_err();
        assert_eq!(err, LayoutError::BlockNotFound(BlockId::Num(999)));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_convert_grid_cell_rejected() {
        let (mut store, _, b, _) = abc();
        let conv = convert_to_grid(&mut store, &b, 2, 16).unwrap();
        let err = convert_to_grid(&mut store, &conv.created[0], 2, 16).unwrap_err();
        assert_eq!(err, LayoutError::AlreadyInGrid(conv.created[0].clone()));
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_ungroup_row() {
        let (mut store, _, b, _) = abc();
        let conv = convert_to_grid(&mut store, &b, 3, 16).unwrap();

        assert_eq!(ungroup_row(&mut store, &conv.row_id).unwrap(), 3);
        assert!(store.blocks().iter().all(|x| x.layout.is_none()));
        assert_eq!(group_rows(store.blocks()).rows.len(), 5);

        assert_eq!(
            ungroup_row(&mut store, &conv.row_id).unwrap_err(),
            LayoutError::RowNotFound(conv.row_id)
        );
    }

    #[test]
    fn test_fill_cell_into_hole() {
        let (mut store, a, b, c) = abc();
        let conv = convert_to_grid(&mut store, &b, 3, 16).unwrap();
        store.delete(&conv.created[0]).unwrap();

        let filled = fill_cell(&mut store, &conv.row_id, 1, BlockKind::Figure).unwrap();

        let ids: Vec<_> = store.blocks().iter().map(|x| x.id.clone()).collect();
        assert_eq!(
            ids,
            vec![a, b, filled.clone(), conv.created[1].clone(), c]
        );
        let grid = group_rows(store.blocks());
        let grid = grid.grid(&conv.row_id).unwrap();
        assert_eq!(grid.cells[1].as_ref().unwrap().id, filled);
        assert_eq!(grid.cells[1].as_ref().unwrap().kind, BlockKind::Figure);
    }

    #[test]
    fn test_fill_leftmost_cell_goes_first() {
        let (mut store, _, b, _) = abc();
        let conv = convert_to_grid(&mut store, &b, 2, 16).unwrap();
        store.delete(&b).unwrap();

        let filled = fill_cell(&mut store, &conv.row_id, 0, BlockKind::Card).unwrap();
        assert_eq!(store.index_of(&filled), Some(1));
        assert_eq!(store.index_of(&conv.created[0]), Some(2));
    }

    #[test]
    fn test_fill_cell_errors() {
        let (mut store, _, b, _) = abc();
        let conv = convert_to_grid(&mut store, &b, 2, 16).unwrap();

        assert!(matches!(
            fill_cell(&mut store, &conv.row_id, 0, BlockKind::Card),
            Err(LayoutError::CellOccupied { position: 0, .. })
        ));
        assert_eq!(
            fill_cell(&mut store, &conv.row_id, 2, BlockKind::Card).unwrap_err(),
            LayoutError::PositionOutOfRange { position: 2, columns: 2 }
        );
        assert!(fill_cell(&mut store, &RowId::new("nope"), 0, BlockKind::Card).is_err());
    }
}
