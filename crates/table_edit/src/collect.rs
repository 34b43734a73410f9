//! Selection collector - rectangular closure of a cell selection
//!
//! Structural operations work on rectangles of whole cells, but user
//! selections rarely arrive that way: anchors land in the middle of
//! merged regions, and the implied rectangle's edges can cut through
//! cells. The collector expands a raw selection to the minimal rectangle
//! of whole cells, splitting boundary cells that only partially overlap
//! it, and reports failure (`None`) when no rectangle exists without
//! tearing an existing span.

use crate::{EditContext, Result};
use std::collections::HashSet;
use table_model::geometry::{border_tolerance, expand_bounds, left_border_of};
use table_model::span::{master_of, span_cells, span_extent, MAX_SPAN_WALK};
use table_model::{CellRect, GridSelection, GridStore, NodeId, RowSpan, TableCell};

enum ScanOutcome {
    /// Every cell in range is wholly inside or outside; members per row
    Complete(Vec<(NodeId, Vec<NodeId>)>),
    /// A master inside the rectangle spans past the current bottom
    GrowBottom(usize),
    /// Cells crossing a rectangle border, with the border to split at
    Straddlers(Vec<(NodeId, i64)>),
    /// A span reaches above the rectangle top; no closure exists
    TornSpan,
}

/// Compute the rectangular closure of `selection` within `table_id`.
///
/// May split boundary cells (a structural mutation) while working; the
/// caller is responsible for the layout discard/rebuild bracket. Returns
/// `None` when the anchors live outside this table or the geometry
/// cannot be made rectangular.
pub fn collect_rectangle(
    store: &mut GridStore,
    table_id: NodeId,
    selection: &GridSelection,
    ctx: &mut EditContext,
) -> Result<Option<CellRect>> {
    let seeds: Vec<NodeId> = match selection {
        GridSelection::Anchors { start, end } => vec![*start, *end],
        GridSelection::Cells(cells) => cells.clone(),
    };
    if seeds.is_empty() {
        return Ok(None);
    }

    // Every seed must live in this table.
    for &seed in &seeds {
        let Ok(cell) = store.cell(seed) else { return Ok(None) };
        let Some(row_id) = cell.parent() else { return Ok(None) };
        let Ok(row) = store.row(row_id) else { return Ok(None) };
        if row.parent() != Some(table_id) {
            return Ok(None);
        }
    }

    // Initial guess: the union of the seeds' span extents and borders.
    let mut top = usize::MAX;
    let mut bottom = 0;
    let mut bounds = (0i64, 0i64);
    for (i, &seed) in seeds.iter().enumerate() {
        let (t, b) = span_extent(store, table_id, seed)?;
        top = top.min(t);
        bottom = bottom.max(b);
        let row_id = store.cell(seed)?.parent().expect("seed checked above");
        let idx = store.cell_index(row_id, seed)?;
        expand_bounds(store, row_id, idx, &mut bounds, i == 0)?;
    }
    let (left, right) = bounds;

    // Scan until stable. Bottom growth happens at most once; straddler
    // splitting takes at most two further passes (a cell crossing both
    // borders is split twice). The pass bound protects against malformed
    // input cycling forever.
    let mut grown = false;
    for _ in 0..6 {
        match scan(store, table_id, top, bottom, left, right)? {
            ScanOutcome::Complete(rows) => {
                return Ok(Some(CellRect {
                    top,
                    bottom,
                    left,
                    right,
                    rows,
                }));
            }
            ScanOutcome::GrowBottom(new_bottom) => {
                if grown {
                    return Ok(None);
                }
                grown = true;
                bottom = new_bottom;
            }
            ScanOutcome::Straddlers(list) => {
                for (cell_id, at) in list {
                    // Splitting a spanned cell would tear the merge.
                    if store.cell(cell_id)?.row_span.in_span() {
                        return Ok(None);
                    }
                    split_cell_at(store, ctx, cell_id, at)?;
                }
            }
            ScanOutcome::TornSpan => return Ok(None),
        }
    }

    tracing::warn!(%table_id, "rectangle scan did not stabilize; selection not rectangular");
    Ok(None)
}

fn scan(
    store: &GridStore,
    table_id: NodeId,
    top: usize,
    bottom: usize,
    left: i64,
    right: i64,
) -> Result<ScanOutcome> {
    let table = store.table(table_id)?;
    if bottom >= table.row_count() {
        return Ok(ScanOutcome::TornSpan);
    }

    let tol = border_tolerance(right);
    let mut rows_out = Vec::new();
    let mut straddlers = Vec::new();
    let mut grow_to = bottom;

    for r in top..=bottom {
        let row_id = table.row_at(r).expect("row index checked");
        let row = store.row(row_id)?;
        let mut members = Vec::new();
        let mut x = 0i64;

        for &cell_id in row.cells() {
            let cell = store.cell(cell_id)?;
            let l = x;
            let rt = x + cell.width;
            x = rt;

            if rt <= left + tol || l >= right - tol {
                continue; // fully outside
            }
            if l >= left - tol && rt <= right + tol {
                // Fully inside; the cell's span must fit the rectangle.
                match cell.row_span {
                    RowSpan::Covered { .. } => {
                        let (t, _) = span_extent(store, table_id, cell_id)?;
                        if t < top {
                            return Ok(ScanOutcome::TornSpan);
                        }
                    }
                    RowSpan::Master { rows } => {
                        let span_bottom = r + rows as usize - 1;
                        if span_bottom > bottom {
                            grow_to = grow_to.max(span_bottom);
                        }
                    }
                    RowSpan::Single => {}
                }
                members.push(cell_id);
            } else {
                // Straddling: split at whichever border it crosses.
                let at = if l < left - tol { left } else { right };
                straddlers.push((cell_id, at));
            }
        }
        rows_out.push((row_id, members));
    }

    if grow_to > bottom {
        return Ok(ScanOutcome::GrowBottom(grow_to));
    }
    if !straddlers.is_empty() {
        return Ok(ScanOutcome::Straddlers(straddlers));
    }
    Ok(ScanOutcome::Complete(rows_out))
}

/// Split a cell in two at logical border `at`, preserving total row
/// width. The cell keeps its id as the left fragment; content follows
/// the wider fragment, which is the one disturbed least by the split.
fn split_cell_at(
    store: &mut GridStore,
    ctx: &mut EditContext,
    cell_id: NodeId,
    at: i64,
) -> Result<()> {
    let l = left_border_of(store, cell_id)?;
    let cell = store.cell(cell_id)?;
    let row_id = cell.parent().expect("cell belongs to a row");
    let right = l + cell.width;
    let props = cell.properties.clone();

    let left_width = at - l;
    let right_width = right - at;
    let idx = store.cell_index(row_id, cell_id)?;

    store.cell_mut(cell_id)?.width = left_width;
    let mut new_cell = TableCell::with_properties(right_width, props);
    new_cell.content = ctx.content.create();
    let new_id = store.insert_cell(new_cell, row_id, Some(idx + 1))?;

    if right_width > left_width {
        let a = store.cell(cell_id)?.content;
        let b = store.cell(new_id)?.content;
        store.cell_mut(cell_id)?.content = b;
        store.cell_mut(new_id)?.content = a;
    }
    Ok(())
}

/// Add every other cell of each touched span into the set. Used before
/// deletion so removing any part of a span removes the span whole.
pub fn expand_selection_to_full_spans(
    store: &GridStore,
    table_id: NodeId,
    cells: &mut Vec<NodeId>,
) -> Result<()> {
    let mut seen: HashSet<NodeId> = cells.iter().copied().collect();
    let mut i = 0;
    while i < cells.len() {
        let cell_id = cells[i];
        i += 1;
        if !store.cell(cell_id)?.row_span.in_span() {
            continue;
        }
        let master = master_of(store, table_id, cell_id, MAX_SPAN_WALK)?;
        for id in span_cells(store, table_id, master)? {
            if seen.insert(id) {
                cells.push(id);
            }
        }
    }
    Ok(())
}
