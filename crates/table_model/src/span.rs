//! Row-span ledger - bookkeeping for vertically merged cells
//!
//! All reasoning about [`RowSpan`] chains lives here: finding the master
//! of a covered cell, enumerating a span, and correcting chains when rows
//! are inserted or removed. No other module assigns `Covered` values.
//!
//! Chain shape: a master spanning `S` rows sits in the first row of the
//! region; the covered cell `d` rows below it holds `Covered { below: S - d }`,
//! so the bottom of the chain is always `Covered { below: 1 }`.
//!
//! Walks are bounded by an explicit step budget. A malformed chain yields
//! a best-effort answer plus a `tracing::warn!`; the consistency checker,
//! not the production paths, is responsible for surfacing drift.

use crate::geometry::{cell_at_left_border, left_border_of};
use crate::{GridStore, NodeId, Result, RowSpan};

/// Default step budget for span walks. No real document nests spans this
/// deep; the bound exists to keep walks terminating on corrupt input.
pub const MAX_SPAN_WALK: usize = 128;

/// Find the master cell of `cell_id`.
///
/// A master or single cell is its own master. For a covered cell the
/// ledger walks upward row by row at the same left border, stopping at
/// the first non-covered cell or when the step budget runs out; the best
/// candidate found so far is returned either way.
pub fn master_of(
    store: &GridStore,
    table_id: NodeId,
    cell_id: NodeId,
    max_steps_up: usize,
) -> Result<NodeId> {
    let cell = store.cell(cell_id)?;
    if !cell.row_span.is_covered() {
        return Ok(cell_id);
    }

    let x = left_border_of(store, cell_id)?;
    let mut row_idx = store.row_index_of_cell(table_id, cell_id)?;
    let mut best = cell_id;
    let mut steps = 0;

    while row_idx > 0 && steps < max_steps_up {
        row_idx -= 1;
        steps += 1;

        let row_id = store
            .table(table_id)?
            .row_at(row_idx)
            .expect("row index within table");
        match cell_at_left_border(store, row_id, x)? {
            Some(above) => {
                best = above;
                if !store.cell(above)?.row_span.is_covered() {
                    return Ok(above);
                }
            }
            None => break,
        }
    }

    tracing::warn!(%cell_id, "covered cell has no reachable master; returning best candidate");
    Ok(best)
}

/// Find the bottom-most covered cell of the span owned by `master_id`.
///
/// Returns the master itself for a single cell, or the deepest covered
/// cell reachable within the step budget.
pub fn last_covered_of(
    store: &GridStore,
    table_id: NodeId,
    master_id: NodeId,
    max_steps_down: usize,
) -> Result<NodeId> {
    let cells = span_cells_bounded(store, table_id, master_id, max_steps_down)?;
    Ok(*cells.last().expect("span contains at least the master"))
}

/// All cells of the span owned by `master_id`: the master plus every
/// covered cell below it at the same left border, until the chain
/// terminator (`below == 1`) is consumed inclusively or the table ends.
pub fn span_cells(store: &GridStore, table_id: NodeId, master_id: NodeId) -> Result<Vec<NodeId>> {
    span_cells_bounded(store, table_id, master_id, MAX_SPAN_WALK)
}

fn span_cells_bounded(
    store: &GridStore,
    table_id: NodeId,
    master_id: NodeId,
    max_steps_down: usize,
) -> Result<Vec<NodeId>> {
    let mut cells = vec![master_id];
    let master = store.cell(master_id)?;
    if master.row_span.is_covered() {
        tracing::warn!(%master_id, "span walk started on a covered cell");
        return Ok(cells);
    }

    let x = left_border_of(store, master_id)?;
    let mut row_idx = store.row_index_of_cell(table_id, master_id)?;
    let row_count = store.table(table_id)?.row_count();
    let mut steps = 0;

    while row_idx + 1 < row_count && steps < max_steps_down {
        row_idx += 1;
        steps += 1;

        let row_id = store
            .table(table_id)?
            .row_at(row_idx)
            .expect("row index within table");
        let below = match cell_at_left_border(store, row_id, x)? {
            Some(id) => id,
            None => break,
        };
        match store.cell(below)?.row_span {
            RowSpan::Covered { below: n } => {
                cells.push(below);
                if n == 1 {
                    break;
                }
            }
            _ => break,
        }
    }
    Ok(cells)
}

/// The `[top_row, bottom_row]` row-index extent of the span containing
/// `cell_id` (a single cell's extent is its own row twice).
pub fn span_extent(store: &GridStore, table_id: NodeId, cell_id: NodeId) -> Result<(usize, usize)> {
    let master_id = master_of(store, table_id, cell_id, MAX_SPAN_WALK)?;
    let top = store.row_index_of_cell(table_id, master_id)?;
    let height = store.cell(master_id)?.row_span.master_rows() as usize;
    let row_count = store.table(table_id)?.row_count();
    let bottom = (top + height - 1).min(row_count.saturating_sub(1));
    Ok((top, bottom))
}

/// Rewrite every chain's `Covered` values from its master's recorded
/// height. Idempotent; called by mutation endpoints after structural
/// changes. Chains that no longer reach their recorded height are
/// truncated to what the structure actually holds.
pub fn renumber_spans(store: &mut GridStore, table_id: NodeId) -> Result<()> {
    let row_ids: Vec<NodeId> = store.table(table_id)?.rows().to_vec();
    let row_count = row_ids.len();

    for (top, &row_id) in row_ids.iter().enumerate() {
        let cell_ids: Vec<NodeId> = store.row(row_id)?.cells().to_vec();
        for cell_id in cell_ids {
            let height = match store.cell(cell_id)?.row_span {
                RowSpan::Master { rows } => rows as usize,
                _ => continue,
            };

            // Clamp to the table bottom before walking.
            let height = height.min(row_count - top);
            let x = left_border_of(store, cell_id)?;

            let mut reached = 1;
            for d in 1..height {
                let below_row = row_ids[top + d];
                let below = match cell_at_left_border(store, below_row, x)? {
                    Some(id) if store.cell(id)?.row_span.is_covered() => id,
                    _ => break,
                };
                store.cell_mut(below)?.row_span = RowSpan::Covered {
                    below: (height - d) as u32,
                };
                reached = d + 1;
            }

            if reached != height {
                tracing::warn!(%cell_id, height, reached, "span chain shorter than master height; truncating");
                // Re-number the truncated chain so the bottom ends at 1.
                for d in 1..reached {
                    let below_row = row_ids[top + d];
                    if let Some(id) = cell_at_left_border(store, below_row, x)? {
                        store.cell_mut(id)?.row_span = RowSpan::Covered {
                            below: (reached - d) as u32,
                        };
                    }
                }
            }
            store.cell_mut(cell_id)?.row_span = RowSpan::master_of_height(reached as u32);
        }
    }
    Ok(())
}

/// Correct master heights after the table's row count changed.
///
/// `pivot` is the index at which rows were inserted (`delta > 0`, called
/// after insertion) or from which rows were removed (`delta < 0`, called
/// after removal). Spans strictly crossing the pivot absorb the change;
/// spans ending exactly at the pivot are extended only when
/// `extend_spans_ending_at_pivot` is set - a user-facing "insert row
/// below" must not silently grow a merge that stops there, while the
/// split engine's spanned-row insertion must.
pub fn rebalance_after_row_count_change(
    store: &mut GridStore,
    table_id: NodeId,
    pivot: usize,
    delta: i64,
    extend_spans_ending_at_pivot: bool,
) -> Result<()> {
    if delta == 0 {
        return Ok(());
    }

    let row_ids: Vec<NodeId> = store.table(table_id)?.rows().to_vec();
    let scan_top = pivot.min(row_ids.len());

    for (top, &row_id) in row_ids.iter().enumerate().take(scan_top) {
        let cell_ids: Vec<NodeId> = store.row(row_id)?.cells().to_vec();
        for cell_id in cell_ids {
            // Single cells count as one-row spans: a spanned-row insert
            // directly below one turns it into a two-row master.
            let rows = match store.cell(cell_id)?.row_span {
                RowSpan::Master { rows } => rows as i64,
                RowSpan::Single => 1,
                RowSpan::Covered { .. } => continue,
            };
            let bottom_old = top as i64 + rows - 1;

            let new_rows = if delta > 0 {
                let crosses = bottom_old >= pivot as i64;
                let ends_at_pivot = bottom_old + 1 == pivot as i64;
                if crosses || (ends_at_pivot && extend_spans_ending_at_pivot) {
                    rows + delta
                } else {
                    rows
                }
            } else {
                let removed = -delta;
                let overlap = (bottom_old.min(pivot as i64 + removed - 1) - pivot as i64 + 1)
                    .clamp(0, removed);
                rows - overlap
            };

            if new_rows != rows {
                store.cell_mut(cell_id)?.row_span = RowSpan::master_of_height(new_rows.max(1) as u32);
            }
        }
    }

    renumber_spans(store, table_id)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GridStore;

    /// 4x1 table with a span of 3 starting at row 0 in the only column.
    fn spanned_table(store: &mut GridStore) -> (NodeId, Vec<NodeId>) {
        let table_id = store.build_uniform_table(4, 1, 1000);
        let cells: Vec<NodeId> = (0..4)
            .map(|r| store.cell_at(table_id, r, 0).unwrap())
            .collect();
        store.cell_mut(cells[0]).unwrap().row_span = RowSpan::Master { rows: 3 };
        store.cell_mut(cells[1]).unwrap().row_span = RowSpan::Covered { below: 2 };
        store.cell_mut(cells[2]).unwrap().row_span = RowSpan::Covered { below: 1 };
        (table_id, cells)
    }

    #[test]
    fn test_master_of_walks_up() {
        let mut store = GridStore::new();
        let (table_id, cells) = spanned_table(&mut store);

        assert_eq!(master_of(&store, table_id, cells[0], MAX_SPAN_WALK).unwrap(), cells[0]);
        assert_eq!(master_of(&store, table_id, cells[1], MAX_SPAN_WALK).unwrap(), cells[0]);
        assert_eq!(master_of(&store, table_id, cells[2], MAX_SPAN_WALK).unwrap(), cells[0]);
        // The single cell below the span is its own master.
        assert_eq!(master_of(&store, table_id, cells[3], MAX_SPAN_WALK).unwrap(), cells[3]);
    }

    #[test]
    fn test_master_of_respects_step_budget() {
        let mut store = GridStore::new();
        let (table_id, cells) = spanned_table(&mut store);

        // One step up from row 2 only reaches row 1, still covered.
        let best = master_of(&store, table_id, cells[2], 1).unwrap();
        assert_eq!(best, cells[1]);
    }

    #[test]
    fn test_span_cells_and_last_covered() {
        let mut store = GridStore::new();
        let (table_id, cells) = spanned_table(&mut store);

        let span = span_cells(&store, table_id, cells[0]).unwrap();
        assert_eq!(span, vec![cells[0], cells[1], cells[2]]);

        let last = last_covered_of(&store, table_id, cells[0], MAX_SPAN_WALK).unwrap();
        assert_eq!(last, cells[2]);

        // A single cell is its own span.
        assert_eq!(span_cells(&store, table_id, cells[3]).unwrap(), vec![cells[3]]);
    }

    #[test]
    fn test_span_extent() {
        let mut store = GridStore::new();
        let (table_id, cells) = spanned_table(&mut store);

        assert_eq!(span_extent(&store, table_id, cells[1]).unwrap(), (0, 2));
        assert_eq!(span_extent(&store, table_id, cells[3]).unwrap(), (3, 3));
    }

    #[test]
    fn test_renumber_rewrites_stale_chain() {
        let mut store = GridStore::new();
        let (table_id, cells) = spanned_table(&mut store);

        // Scramble the chain values; renumber restores them from the master.
        store.cell_mut(cells[1]).unwrap().row_span = RowSpan::Covered { below: 9 };
        store.cell_mut(cells[2]).unwrap().row_span = RowSpan::Covered { below: 9 };
        renumber_spans(&mut store, table_id).unwrap();

        assert_eq!(store.cell(cells[1]).unwrap().row_span, RowSpan::Covered { below: 2 });
        assert_eq!(store.cell(cells[2]).unwrap().row_span, RowSpan::Covered { below: 1 });
    }

    #[test]
    fn test_renumber_truncates_broken_chain() {
        let mut store = GridStore::new();
        let (table_id, cells) = spanned_table(&mut store);

        // Row 2's cell claims to be single: the chain really ends at row 1.
        store.cell_mut(cells[2]).unwrap().row_span = RowSpan::Single;
        renumber_spans(&mut store, table_id).unwrap();

        assert_eq!(store.cell(cells[0]).unwrap().row_span, RowSpan::Master { rows: 2 });
        assert_eq!(store.cell(cells[1]).unwrap().row_span, RowSpan::Covered { below: 1 });
    }

    #[test]
    fn test_rebalance_shrinks_after_removal() {
        let mut store = GridStore::new();
        let (table_id, cells) = spanned_table(&mut store);

        // Remove row 1 (inside the span), then rebalance.
        let row_id = store.table(table_id).unwrap().row_at(1).unwrap();
        store.remove_row(row_id).unwrap();
        rebalance_after_row_count_change(&mut store, table_id, 1, -1, false).unwrap();

        assert_eq!(store.cell(cells[0]).unwrap().row_span, RowSpan::Master { rows: 2 });
        assert_eq!(store.cell(cells[2]).unwrap().row_span, RowSpan::Covered { below: 1 });
    }

    #[test]
    fn test_rebalance_extend_flag_distinguishes_boundary() {
        // Span of 2 over rows 0-1; insert a row at index 2 (right below
        // the span). Without the flag the span must stay at 2.
        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(3, 1, 1000);
        let c0 = store.cell_at(table_id, 0, 0).unwrap();
        let c1 = store.cell_at(table_id, 1, 0).unwrap();
        store.cell_mut(c0).unwrap().row_span = RowSpan::Master { rows: 2 };
        store.cell_mut(c1).unwrap().row_span = RowSpan::Covered { below: 1 };

        rebalance_after_row_count_change(&mut store, table_id, 2, 1, false).unwrap();
        assert_eq!(store.cell(c0).unwrap().row_span, RowSpan::Master { rows: 2 });
    }
}
