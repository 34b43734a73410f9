//! Subtable flattening - lift nested tables into the outer grid
//!
//! One-shot conversion used when importing documents from models that
//! allow nested tables. Each nested row beyond the first becomes a new
//! outer row: the nested cells move over (keeping their identity and
//! content), and every sibling outer column gets a covered placeholder
//! so the grid stays rectangular. The nested first row's cells replace
//! the host cell in place.
//!
//! All-or-nothing: every precondition is checked across the whole table
//! before the first mutation; any violation aborts with `Ok(false)`.

use crate::editor::{cells_of_row_range, EditContext};
use crate::Result;
use table_model::span::{master_of, renumber_spans, MAX_SPAN_WALK};
use table_model::{GridStore, NodeId, RowSpan, TableCell, TableRow};

pub fn flatten_subtables(
    store: &mut GridStore,
    table_id: NodeId,
    ctx: &mut EditContext,
) -> Result<bool> {
    // Gather hosts and check the per-row precondition while at it.
    let row_ids: Vec<NodeId> = store.table(table_id)?.rows().to_vec();
    let mut hosts: Vec<(usize, NodeId, NodeId)> = Vec::new();
    for (r, &row_id) in row_ids.iter().enumerate() {
        let mut in_row = 0;
        for &cell_id in store.row(row_id)?.cells() {
            if let Some(nested) = store.cell(cell_id)?.nested_table {
                in_row += 1;
                hosts.push((r, cell_id, nested));
            }
        }
        if in_row > 1 {
            return Ok(false);
        }
    }
    if hosts.is_empty() {
        return Ok(false);
    }

    // Remaining preconditions, all before any mutation.
    for &(_, host_cell, nested) in &hosts {
        let Ok(nested_table) = store.table(nested) else {
            return Ok(false);
        };
        if store.cell(host_cell)?.row_span.in_span() {
            return Ok(false);
        }
        if ctx
            .content
            .is_externally_referenced(store.cell(host_cell)?.content)
        {
            return Ok(false);
        }
        for &nrow_id in nested_table.rows() {
            for &ncell_id in store.row(nrow_id)?.cells() {
                let cell = store.cell(ncell_id)?;
                if cell.nested_table.is_some() {
                    return Ok(false); // no nested table within a nested table
                }
                if ctx.content.is_externally_referenced(cell.content) {
                    return Ok(false);
                }
            }
        }
    }

    let last_row = store.table(table_id)?.row_count().saturating_sub(1);
    let all_cells = cells_of_row_range(store, table_id, 0, last_row)?;
    ctx.layout.discard_frames(table_id, &all_cells);

    // Bottom-up so earlier hosts keep their row indices.
    hosts.sort_by(|a, b| b.0.cmp(&a.0));
    for (row_idx, host_cell, nested) in hosts {
        flatten_one(store, table_id, row_idx, host_cell, nested, ctx)?;
    }

    renumber_spans(store, table_id)?;
    ctx.layout.rebuild_frames(table_id);
    Ok(true)
}

fn flatten_one(
    store: &mut GridStore,
    table_id: NodeId,
    row_idx: usize,
    host_cell: NodeId,
    nested_id: NodeId,
    ctx: &mut EditContext,
) -> Result<()> {
    let host_row_id = store
        .table(table_id)?
        .row_at(row_idx)
        .expect("host row index gathered above");
    let host_width = store.cell(host_cell)?.width;
    let host_idx = store.cell_index(host_row_id, host_cell)?;
    let nested_width = store.table(nested_id)?.width.max(1);
    let nested_rows: Vec<NodeId> = store.table(nested_id)?.rows().to_vec();

    if nested_rows.is_empty() {
        store.cell_mut(host_cell)?.nested_table = None;
        return Ok(());
    }

    let host_row_cells: Vec<NodeId> = store.row(host_row_id)?.cells().to_vec();
    let extra = nested_rows.len() - 1;

    // 1. Lift nested rows beyond the first into new outer rows, padding
    // the sibling columns with covered placeholders.
    for (j, &nrow_id) in nested_rows.iter().enumerate().skip(1) {
        let mut row = TableRow::new();
        row.height = store.row(nrow_id)?.height;
        row.height_rule = store.row(nrow_id)?.height_rule;
        let new_row_id = store.insert_row(row, table_id, Some(row_idx + j))?;

        for (i, &sibling) in host_row_cells.iter().enumerate() {
            if i == host_idx {
                move_nested_cells(store, nrow_id, new_row_id, None, host_width, nested_width)?;
            } else {
                let sib = store.cell(sibling)?;
                let mut cell = TableCell::with_properties(sib.width, sib.properties.clone());
                cell.row_span = RowSpan::Covered { below: 1 }; // renumbered below
                cell.content = ctx.content.create();
                store.insert_cell(cell, new_row_id, None)?;
            }
        }
    }

    // 2. The nested first row's cells replace the host cell in place;
    // non-empty host content moves into the first of them.
    let first_cells = move_nested_cells(
        store,
        nested_rows[0],
        host_row_id,
        Some(host_idx + 1),
        host_width,
        nested_width,
    )?;
    let host_content = store.cell(host_cell)?.content;
    if let Some(&first_cell) = first_cells.first() {
        if !ctx.content.is_empty(host_content) {
            let dst = store.cell(first_cell)?.content;
            ctx.content.move_content(host_content, dst);
            ctx.record(|u| u.content_moved(host_content, dst));
        }
    }
    ctx.notify_removing(&[host_cell]);
    let removed = store.remove_cell(host_cell)?;
    ctx.content.remove(removed.content);

    // 3. Extend each sibling's span through the lifted rows so the new
    // placeholders are claimed.
    if extra > 0 {
        for (i, &sibling) in host_row_cells.iter().enumerate() {
            if i == host_idx {
                continue;
            }
            let master = master_of(store, table_id, sibling, MAX_SPAN_WALK)?;
            let height = store.cell(master)?.row_span.master_rows();
            store.cell_mut(master)?.row_span = RowSpan::master_of_height(height + extra as u32);
        }
    }

    // 4. Drop the nested table's empty shell.
    for &nrow_id in &nested_rows {
        let _ = store.remove_row(nrow_id);
    }
    store.tables.remove(&nested_id);
    Ok(())
}

/// Move every cell of a nested row into `dst_row` (at `at`, or appended),
/// scaling widths from the nested table's width to the host cell's. The
/// cells keep their identity and content. Returns the moved cell ids.
fn move_nested_cells(
    store: &mut GridStore,
    src_row: NodeId,
    dst_row: NodeId,
    at: Option<usize>,
    host_width: i64,
    nested_width: i64,
) -> Result<Vec<NodeId>> {
    let cell_ids: Vec<NodeId> = store.row(src_row)?.cells().to_vec();
    let count = cell_ids.len();
    // Border-based scaling: nested rows sharing borders keep sharing
    // them after the move, so nested span chains survive the lift.
    let mut acc = 0i64;
    let mut prev_scaled = 0i64;
    for (k, &cell_id) in cell_ids.iter().enumerate() {
        acc += store.cell(cell_id)?.width;
        let scaled_border = if k == count - 1 {
            host_width
        } else {
            acc * host_width / nested_width
        };

        let mut cell = store.remove_cell(cell_id)?;
        cell.width = scaled_border - prev_scaled;
        prev_scaled = scaled_border;
        let index = at.map(|base| base + k);
        store.insert_cell(cell, dst_row, index)?;
    }
    Ok(cell_ids)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use table_model::consistency::check_table;
    use table_model::{GridStore, InMemoryContent, NoopLayout};

    /// 2x2 outer table with a 2x2 nested table in cell (0, 1).
    fn table_with_subtable(store: &mut GridStore) -> (NodeId, NodeId, NodeId) {
        let outer = store.build_uniform_table(2, 2, 2000);
        let nested = store.build_uniform_table(2, 2, 400);
        let host = store.cell_at(outer, 0, 1).unwrap();
        store.cell_mut(host).unwrap().nested_table = Some(nested);
        (outer, nested, host)
    }

    #[test]
    fn test_flatten_lifts_nested_rows() {
        let mut store = GridStore::new();
        let (outer, nested, host) = table_with_subtable(&mut store);
        let nested_cells: Vec<NodeId> = store.tables[&nested]
            .rows()
            .iter()
            .flat_map(|&r| store.row(r).unwrap().cells().to_vec())
            .collect();

        let mut content = InMemoryContent::new();
        let mut layout = NoopLayout::new();
        let mut ctx = EditContext::new(&mut content, &mut layout);
        assert!(flatten_subtables(&mut store, outer, &mut ctx).unwrap());

        // One extra outer row; the nested table shell is gone.
        assert_eq!(store.table(outer).unwrap().row_count(), 3);
        assert!(store.table(nested).is_err());
        assert!(store.cell(host).is_err());

        // The nested cells survived the move with scaled widths.
        for &id in &nested_cells {
            let cell = store.cell(id).unwrap();
            assert_eq!(cell.width, 500);
        }

        // Host row: untouched sibling plus the nested first row.
        let row0 = store.table(outer).unwrap().row_at(0).unwrap();
        assert_eq!(store.row(row0).unwrap().cell_count(), 3);
        assert_eq!(store.row_width(row0).unwrap(), 2000);

        // Lifted row: covered placeholder for the sibling column, and
        // the sibling spans both rows now.
        let sibling = store.cell_at(outer, 0, 0).unwrap();
        assert_eq!(store.cell(sibling).unwrap().row_span, RowSpan::Master { rows: 2 });
        let row1 = store.table(outer).unwrap().row_at(1).unwrap();
        assert_eq!(store.row_width(row1).unwrap(), 2000);

        assert!(check_table(&store, outer).is_empty());
    }

    #[test]
    fn test_flatten_aborts_on_two_subtables_in_one_row() {
        let mut store = GridStore::new();
        let (outer, _, _) = table_with_subtable(&mut store);
        let other_nested = store.build_uniform_table(1, 1, 100);
        let second_host = store.cell_at(outer, 0, 0).unwrap();
        store.cell_mut(second_host).unwrap().nested_table = Some(other_nested);

        let before_rows = store.table(outer).unwrap().row_count();
        let mut content = InMemoryContent::new();
        let mut layout = NoopLayout::new();
        let mut ctx = EditContext::new(&mut content, &mut layout);

        assert!(!flatten_subtables(&mut store, outer, &mut ctx).unwrap());
        assert_eq!(store.table(outer).unwrap().row_count(), before_rows);
    }

    #[test]
    fn test_flatten_aborts_on_nested_nested_table() {
        let mut store = GridStore::new();
        let (outer, nested, _) = table_with_subtable(&mut store);
        let deeper = store.build_uniform_table(1, 1, 100);
        let inner_cell = store.cell_at(nested, 0, 0).unwrap();
        store.cell_mut(inner_cell).unwrap().nested_table = Some(deeper);

        let mut content = InMemoryContent::new();
        let mut layout = NoopLayout::new();
        let mut ctx = EditContext::new(&mut content, &mut layout);

        assert!(!flatten_subtables(&mut store, outer, &mut ctx).unwrap());
        assert_eq!(store.table(outer).unwrap().row_count(), 2);
        assert!(store.table(nested).is_ok());
    }

    #[test]
    fn test_flatten_aborts_on_external_reference() {
        let mut store = GridStore::new();
        let (outer, _, host) = table_with_subtable(&mut store);
        let mut content = InMemoryContent::new();
        let host_content = store.cell(host).unwrap().content;
        content.put(host_content, Vec::new());
        content.mark_referenced(host_content);
        let mut layout = NoopLayout::new();
        let mut ctx = EditContext::new(&mut content, &mut layout);

        assert!(!flatten_subtables(&mut store, outer, &mut ctx).unwrap());
        assert_eq!(store.table(outer).unwrap().row_count(), 2);
    }
}
