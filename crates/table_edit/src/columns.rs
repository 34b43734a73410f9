//! Column insertion - add equal-width columns, preserving table width
//!
//! The table's total width is fixed, so inserting columns shrinks every
//! existing cell proportionally and gives the new columns the freed
//! width. The shrink scales cumulative borders rather than individual
//! widths, so borders shared between rows stay shared after rounding.
//! The new cells mirror the row-span pattern of the column immediately
//! adjacent, so a column inserted next to a merged region is itself
//! merged the same way.

use crate::editor::{cells_of_row_range, EditContext};
use crate::Result;
use table_model::geometry::{border_tolerance, left_border_of};
use table_model::span::renumber_spans;
use table_model::{CellProperties, GridStore, NodeId, RowSpan, TableCell};

pub fn insert_columns(
    store: &mut GridStore,
    table_id: NodeId,
    selected: &[NodeId],
    count: usize,
    behind: bool,
    with_placeholder: bool,
    ctx: &mut EditContext,
) -> Result<bool> {
    if selected.is_empty() || count == 0 {
        return Ok(false);
    }

    // Insertion border: rightmost right edge (behind) or leftmost left
    // edge of the selection, plus the row defining the column count.
    let mut x_best: Option<i64> = None;
    let mut ref_cell = None;
    for &cell_id in selected {
        let Ok(left) = left_border_of(store, cell_id) else {
            return Ok(false);
        };
        let cell = store.cell(cell_id)?;
        if cell.parent().and_then(|r| store.row(r).ok()).map(|r| r.parent()) != Some(Some(table_id)) {
            return Ok(false);
        }
        let candidate = if behind { left + cell.width } else { left };
        let better = match x_best {
            None => true,
            Some(x) => {
                if behind {
                    candidate > x
                } else {
                    candidate < x
                }
            }
        };
        if better {
            x_best = Some(candidate);
            ref_cell = Some(cell_id);
        }
    }
    let x = x_best.expect("selection non-empty");
    let ref_row = store
        .cell(ref_cell.expect("selection non-empty"))?
        .parent()
        .expect("cell belongs to a row");
    let column_count = store.row(ref_row)?.cell_count();

    let table_width = store.table(table_id)?.width;
    let new_width = table_width / (column_count + count) as i64;
    let new_total = new_width * count as i64;
    let old_target = table_width - new_total;
    if old_target <= 0 {
        return Ok(false);
    }

    let row_count = store.table(table_id)?.row_count();
    let all_cells = cells_of_row_range(store, table_id, 0, row_count.saturating_sub(1))?;
    ctx.layout.discard_frames(table_id, &all_cells);

    let tol = border_tolerance(x);
    let row_ids: Vec<NodeId> = store.table(table_id)?.rows().to_vec();
    for &row_id in &row_ids {
        let cell_ids: Vec<NodeId> = store.row(row_id)?.cells().to_vec();

        // Where the border falls in this row: count the cells entirely
        // to its left; a cell that straddles the border (a horizontal
        // merge crossing the insertion point) absorbs the new width
        // instead of being pushed aside.
        let mut insert_idx: usize = 0;
        let mut acc = 0i64;
        let mut straddler: Option<NodeId> = None;
        for &cell_id in &cell_ids {
            let width = store.cell(cell_id)?.width;
            if acc + width <= x + tol {
                insert_idx += 1;
                acc += width;
            } else {
                if x > acc + tol {
                    straddler = Some(cell_id);
                }
                break;
            }
        }

        // The adjacent column whose span pattern the new cells mirror.
        let adjacent = if behind {
            insert_idx.checked_sub(1).and_then(|i| cell_ids.get(i))
        } else {
            cell_ids.get(insert_idx)
        }
        .copied();
        let (adj_span, adj_props) = match adjacent {
            Some(id) => {
                let cell = store.cell(id)?;
                (cell.row_span, cell.properties.clone())
            }
            None => (RowSpan::Single, CellProperties::default()),
        };

        // Proportional shrink via cumulative borders: scaling the
        // borders rather than the widths keeps borders shared between
        // rows shared after rounding, so span chains stay aligned.
        let mut acc = 0i64;
        let mut prev_scaled = 0i64;
        for &cell_id in &cell_ids {
            acc += store.cell(cell_id)?.width;
            let scaled_border = acc * old_target / table_width;
            store.cell_mut(cell_id)?.width = scaled_border - prev_scaled;
            prev_scaled = scaled_border;
        }

        match straddler {
            Some(cell_id) => {
                store.cell_mut(cell_id)?.width += new_total;
            }
            None => {
                for i in 0..count {
                    let mut cell = TableCell::with_properties(new_width, adj_props.clone());
                    cell.row_span = adj_span;
                    if with_placeholder {
                        cell.content = ctx.content.create();
                    }
                    store.insert_cell(cell, row_id, Some(insert_idx + i))?;
                }
            }
        }
    }

    renumber_spans(store, table_id)?;
    ctx.record(|u| u.columns_inserted(table_id, x, count));
    ctx.layout.rebuild_frames(table_id);
    Ok(true)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use table_model::consistency::check_table;
    use table_model::{GridStore, InMemoryContent, NoopLayout};

    #[test]
    fn test_insert_column_preserves_table_width() {
        // Four 100-twip columns, insert one behind column 1.
        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(1, 4, 400);
        let mut content = InMemoryContent::new();
        let mut layout = NoopLayout::new();

        let selected = store.cell_at(table_id, 0, 1).unwrap();
        let mut ctx = EditContext::new(&mut content, &mut layout);
        assert!(insert_columns(&mut store, table_id, &[selected], 1, true, true, &mut ctx).unwrap());

        let row_id = store.table(table_id).unwrap().row_at(0).unwrap();
        let row = store.row(row_id).unwrap();
        assert_eq!(row.cell_count(), 5);
        assert_eq!(store.row_width(row_id).unwrap(), 400);

        // Every column shrank proportionally to 80.
        for &cell_id in row.cells() {
            assert_eq!(store.cell(cell_id).unwrap().width, 80);
        }
        assert!(check_table(&store, table_id).is_empty());
    }

    #[test]
    fn test_insert_column_mirrors_adjacent_span_pattern() {
        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(2, 2, 2000);
        let c0 = store.cell_at(table_id, 0, 0).unwrap();
        let c1 = store.cell_at(table_id, 1, 0).unwrap();
        store.cell_mut(c0).unwrap().row_span = RowSpan::Master { rows: 2 };
        store.cell_mut(c1).unwrap().row_span = RowSpan::Covered { below: 1 };

        let mut content = InMemoryContent::new();
        let mut layout = NoopLayout::new();
        let mut ctx = EditContext::new(&mut content, &mut layout);
        assert!(insert_columns(&mut store, table_id, &[c0], 1, true, true, &mut ctx).unwrap());

        // The new column (index 1 in both rows) is merged the same way.
        let new_top = store.cell_at(table_id, 0, 1).unwrap();
        let new_bottom = store.cell_at(table_id, 1, 1).unwrap();
        assert_eq!(store.cell(new_top).unwrap().row_span, RowSpan::Master { rows: 2 });
        assert_eq!(store.cell(new_bottom).unwrap().row_span, RowSpan::Covered { below: 1 });

        for r in 0..2 {
            let row_id = store.table(table_id).unwrap().row_at(r).unwrap();
            assert_eq!(store.row_width(row_id).unwrap(), 2000);
        }
        assert!(check_table(&store, table_id).is_empty());
    }

    #[test]
    fn test_insert_column_into_empty_selection_is_noop() {
        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(1, 2, 2000);
        let mut content = InMemoryContent::new();
        let mut layout = NoopLayout::new();

        let mut ctx = EditContext::new(&mut content, &mut layout);
        assert!(!insert_columns(&mut store, table_id, &[], 1, true, true, &mut ctx).unwrap());
    }
}
