//! Deletion - cells, columns, and row ranges
//!
//! Deleting anything that participates in a span needs preparation
//! before the actual removal, while row indices are still valid: a
//! doomed master hands its span to the first surviving cell below, and a
//! doomed covered cell shrinks its master. Rows left with nothing but
//! doomed cells are superfluous and go too.

use crate::collect::expand_selection_to_full_spans;
use crate::editor::EditContext;
use crate::Result;
use std::collections::HashSet;
use table_model::span::{master_of, renumber_spans, span_cells, MAX_SPAN_WALK};
use table_model::{GridStore, NodeId, RowSpan, TableCell};

/// Correct span bookkeeping for the cells about to be removed. Must run
/// before the removal itself: it needs the row indices the doomed cells
/// still occupy.
pub fn prepare_for_deletion(
    store: &mut GridStore,
    table_id: NodeId,
    doomed: &HashSet<NodeId>,
) -> Result<()> {
    let mut handled: HashSet<NodeId> = HashSet::new();
    let doomed_list: Vec<NodeId> = doomed.iter().copied().collect();

    for &cell_id in &doomed_list {
        let Ok(cell) = store.cell(cell_id) else { continue };
        if !cell.row_span.in_span() {
            continue;
        }
        let master = master_of(store, table_id, cell_id, MAX_SPAN_WALK)?;
        if !handled.insert(master) {
            continue;
        }

        let chain = span_cells(store, table_id, master)?;
        let doomed_in_chain = chain.iter().filter(|id| doomed.contains(id)).count();
        if doomed_in_chain == chain.len() {
            continue; // the whole span disappears together
        }

        if doomed.contains(&master) {
            // Ownership moves to the first surviving cell of the chain.
            let survivors: Vec<NodeId> = chain
                .iter()
                .copied()
                .filter(|id| !doomed.contains(id))
                .collect();
            let new_master = survivors[0];
            store.cell_mut(new_master)?.row_span =
                RowSpan::master_of_height(survivors.len() as u32);
        } else {
            let remaining = (chain.len() - doomed_in_chain) as u32;
            store.cell_mut(master)?.row_span = RowSpan::master_of_height(remaining);
        }
    }
    Ok(())
}

/// Rows in `first..=last` whose every cell is already in `candidates`:
/// nothing of them would survive, so the whole row joins the deletion.
pub fn find_superfluous_rows(
    store: &GridStore,
    table_id: NodeId,
    candidates: &[NodeId],
    first: usize,
    last: usize,
) -> Result<Vec<NodeId>> {
    let set: HashSet<NodeId> = candidates.iter().copied().collect();
    let table = store.table(table_id)?;
    let mut superfluous = Vec::new();
    if table.row_count() == 0 {
        return Ok(superfluous);
    }

    for r in first..=last.min(table.row_count() - 1) {
        let row_id = table.row_at(r).expect("row index clamped");
        let row = store.row(row_id)?;
        if row.cell_count() == 0 || row.cells().iter().all(|id| set.contains(id)) {
            superfluous.push(row_id);
        }
    }
    Ok(superfluous)
}

/// Delete the given cells plus every other cell of any span they touch.
/// Rows left empty are removed; surviving rows are rescaled to the table
/// width (the column-deletion case).
pub fn delete_cells(
    store: &mut GridStore,
    table_id: NodeId,
    cells: &[NodeId],
    ctx: &mut EditContext,
) -> Result<bool> {
    if cells.is_empty() {
        return Ok(false);
    }
    for &cell_id in cells {
        if store.row_index_of_cell(table_id, cell_id).is_err() {
            return Ok(false);
        }
    }

    let mut doomed: Vec<NodeId> = cells.to_vec();
    expand_selection_to_full_spans(store, table_id, &mut doomed)?;

    let mut first = usize::MAX;
    let mut last = 0;
    for &cell_id in &doomed {
        let r = store.row_index_of_cell(table_id, cell_id)?;
        first = first.min(r);
        last = last.max(r);
    }
    let superfluous = find_superfluous_rows(store, table_id, &doomed, first, last)?;

    let doomed_set: HashSet<NodeId> = doomed.iter().copied().collect();
    prepare_for_deletion(store, table_id, &doomed_set)?;

    ctx.layout.discard_frames(table_id, &doomed);
    ctx.notify_removing(&doomed);

    let mut removed: Vec<TableCell> = Vec::new();
    for &row_id in &superfluous {
        let (_, row_cells) = store.remove_row(row_id)?;
        for cell in row_cells {
            ctx.content.remove(cell.content);
            removed.push(cell);
        }
    }
    for &cell_id in &doomed {
        if store.cell(cell_id).is_err() {
            continue; // went with its row
        }
        let cell = store.remove_cell(cell_id)?;
        ctx.content.remove(cell.content);
        removed.push(cell);
    }

    // Degenerate leftovers: rows that lost everything.
    let row_ids: Vec<NodeId> = store.table(table_id)?.rows().to_vec();
    for row_id in row_ids {
        if store.row(row_id)?.cell_count() == 0 {
            store.remove_row(row_id)?;
        }
    }

    rescale_rows_to_width(store, table_id)?;
    renumber_spans(store, table_id)?;

    ctx.record(|u| u.cells_deleted(table_id, &removed));
    ctx.layout.rebuild_frames(table_id);
    Ok(true)
}

/// Delete the contiguous row range `first..=last`. Spans crossing the
/// range shrink; spans starting inside it hand ownership to their first
/// surviving row.
pub fn delete_rows(
    store: &mut GridStore,
    table_id: NodeId,
    first: usize,
    last: usize,
    ctx: &mut EditContext,
) -> Result<bool> {
    let row_count = store.table(table_id)?.row_count();
    if first > last || last >= row_count {
        return Ok(false);
    }

    let mut doomed: Vec<NodeId> = Vec::new();
    let mut row_ids: Vec<NodeId> = Vec::new();
    for r in first..=last {
        let row_id = store
            .table(table_id)?
            .row_at(r)
            .expect("range checked above");
        row_ids.push(row_id);
        doomed.extend_from_slice(store.row(row_id)?.cells());
    }

    let doomed_set: HashSet<NodeId> = doomed.iter().copied().collect();
    prepare_for_deletion(store, table_id, &doomed_set)?;

    ctx.layout.discard_frames(table_id, &doomed);
    ctx.notify_removing(&doomed);

    let mut removed: Vec<TableCell> = Vec::new();
    for row_id in row_ids {
        let (_, row_cells) = store.remove_row(row_id)?;
        for cell in row_cells {
            ctx.content.remove(cell.content);
            removed.push(cell);
        }
    }

    renumber_spans(store, table_id)?;

    ctx.record(|u| u.cells_deleted(table_id, &removed));
    ctx.layout.rebuild_frames(table_id);
    Ok(true)
}

/// Scale each surviving row back to the table width after cells were
/// removed from it. Scaling works on cumulative borders so borders
/// shared between rows stay shared after rounding and span chains keep
/// their alignment.
fn rescale_rows_to_width(store: &mut GridStore, table_id: NodeId) -> Result<()> {
    let table_width = store.table(table_id)?.width;
    let row_ids: Vec<NodeId> = store.table(table_id)?.rows().to_vec();

    for row_id in row_ids {
        let sum = store.row_width(row_id)?;
        if sum <= 0 || (sum - table_width).abs() <= 1 {
            continue;
        }
        let cell_ids: Vec<NodeId> = store.row(row_id)?.cells().to_vec();
        let mut acc = 0i64;
        let mut prev_scaled = 0i64;
        for &cell_id in &cell_ids {
            acc += store.cell(cell_id)?.width;
            let scaled_border = acc * table_width / sum;
            store.cell_mut(cell_id)?.width = scaled_border - prev_scaled;
            prev_scaled = scaled_border;
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
