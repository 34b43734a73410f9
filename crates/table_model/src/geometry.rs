//! Geometry helpers - logical borders within a row
//!
//! Pure lookups over cell widths. A cell's left border is the sum of its
//! preceding siblings' widths; repeated proportional width redistribution
//! accumulates rounding drift, so border comparisons carry a small
//! tolerance proportional to the position being compared.

use crate::{GridStore, NodeId, Result};

/// Tolerance for border comparisons at logical position `x`.
///
/// Empirically `x / 1000` absorbs the drift of repeated integer width
/// redistribution; the ratio is a robustness knob, not a correctness
/// requirement.
pub fn border_tolerance(x: i64) -> i64 {
    x.abs() / 1000
}

/// Left logical border of a cell: sum of preceding sibling widths. O(row).
pub fn left_border_of(store: &GridStore, cell_id: NodeId) -> Result<i64> {
    let cell = store.cell(cell_id)?;
    let row_id = cell
        .parent()
        .ok_or_else(|| crate::GridModelError::CellNotFound(cell_id.as_uuid()))?;
    let row = store.row(row_id)?;

    let mut left = 0;
    for &sibling in row.cells() {
        if sibling == cell_id {
            return Ok(left);
        }
        left += store.cell(sibling)?.width;
    }
    Err(crate::GridModelError::StructureError(format!(
        "cell {cell_id} not listed in its parent row"
    )))
}

/// Find the cell in `row_id` whose `[left, right)` interval contains `x`.
///
/// Returns `None` only when `x` falls outside the row entirely; callers
/// treat that as a defect elsewhere in the structure, not as user input
/// to report.
pub fn cell_at_left_border(store: &GridStore, row_id: NodeId, x: i64) -> Result<Option<NodeId>> {
    let row = store.row(row_id)?;
    let tolerance = border_tolerance(x);

    let mut left = 0;
    for &cell_id in row.cells() {
        let width = store.cell(cell_id)?.width;
        let right = left + width;
        if x >= left - tolerance && x < right {
            return Ok(Some(cell_id));
        }
        left = right;
    }
    Ok(None)
}

/// Widen a running `[min, max)` interval to cover the cell at
/// `cell_index` in `row_id`, or reset it exactly to that cell's borders
/// when `init` is set (first cell visited in a selection scan).
pub fn expand_bounds(
    store: &GridStore,
    row_id: NodeId,
    cell_index: usize,
    bounds: &mut (i64, i64),
    init: bool,
) -> Result<()> {
    let row = store.row(row_id)?;
    let mut left = 0;
    for &id in row.cells().iter().take(cell_index) {
        left += store.cell(id)?.width;
    }
    let cell_id = row.cells().get(cell_index).copied().ok_or_else(|| {
        crate::GridModelError::StructureError(format!(
            "row has no cell at index {cell_index}"
        ))
    })?;
    let right = left + store.cell(cell_id)?.width;

    if init {
        *bounds = (left, right);
    } else {
        bounds.0 = bounds.0.min(left);
        bounds.1 = bounds.1.max(right);
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GridStore;

    #[test]
    fn test_left_border_sums_preceding_widths() {
        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(1, 4, 400);
        let row_id = store.table(table_id).unwrap().row_at(0).unwrap();
        let cells: Vec<_> = store.row(row_id).unwrap().cells().to_vec();

        assert_eq!(left_border_of(&store, cells[0]).unwrap(), 0);
        assert_eq!(left_border_of(&store, cells[1]).unwrap(), 100);
        assert_eq!(left_border_of(&store, cells[3]).unwrap(), 300);
    }

    #[test]
    fn test_cell_at_left_border_hits_and_misses() {
        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(1, 4, 4000);
        let row_id = store.table(table_id).unwrap().row_at(0).unwrap();
        let cells: Vec<_> = store.row(row_id).unwrap().cells().to_vec();

        assert_eq!(cell_at_left_border(&store, row_id, 0).unwrap(), Some(cells[0]));
        assert_eq!(cell_at_left_border(&store, row_id, 1000).unwrap(), Some(cells[1]));
        assert_eq!(cell_at_left_border(&store, row_id, 1500).unwrap(), Some(cells[1]));
        assert_eq!(cell_at_left_border(&store, row_id, 3999).unwrap(), Some(cells[3]));
        assert_eq!(cell_at_left_border(&store, row_id, 9000).unwrap(), None);
    }

    #[test]
    fn test_cell_at_left_border_absorbs_drift() {
        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(1, 2, 10000);
        let row_id = store.table(table_id).unwrap().row_at(0).unwrap();
        let cells: Vec<_> = store.row(row_id).unwrap().cells().to_vec();

        // A border a few twips off still resolves to the adjacent cell.
        assert_eq!(cell_at_left_border(&store, row_id, 4997).unwrap(), Some(cells[0]));
        assert_eq!(cell_at_left_border(&store, row_id, 5003).unwrap(), Some(cells[1]));
    }

    #[test]
    fn test_expand_bounds_accumulate_and_init() {
        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(1, 4, 400);
        let row_id = store.table(table_id).unwrap().row_at(0).unwrap();

        let mut bounds = (0, 0);
        expand_bounds(&store, row_id, 1, &mut bounds, true).unwrap();
        assert_eq!(bounds, (100, 200));

        expand_bounds(&store, row_id, 3, &mut bounds, false).unwrap();
        assert_eq!(bounds, (100, 400));

        expand_bounds(&store, row_id, 0, &mut bounds, false).unwrap();
        assert_eq!(bounds, (0, 400));

        expand_bounds(&store, row_id, 2, &mut bounds, true).unwrap();
        assert_eq!(bounds, (200, 300));
    }
}
