//! Merge engine - collapse a rectangular selection into one master cell
//!
//! The top-left cell of the rectangular closure becomes the master of a
//! span covering every rectangle row. Cells outside the first column are
//! deleted after their non-empty content is moved (not copied) into the
//! master; the first-column cells of the lower rows stay behind as the
//! covered chain that keeps the grid rectangular.

use crate::collect::collect_rectangle;
use crate::editor::{cells_of_row_range, EditContext};
use crate::Result;
use table_model::span::{
    rebalance_after_row_count_change, renumber_spans, span_cells, span_extent,
};
use table_model::{GridSelection, GridStore, NodeId, RowSpan, TableCell};

/// Merge the rectangular closure of `selection` into one cell.
///
/// Returns `Ok(false)` - nothing happened - when the selection has no
/// rectangular closure or already covers just a single cell.
pub fn merge_cells(
    store: &mut GridStore,
    table_id: NodeId,
    selection: &GridSelection,
    ctx: &mut EditContext,
) -> Result<bool> {
    // Discard frames for a superset of the affected region before any
    // mutation; the collector itself may split boundary cells.
    let seeds: Vec<NodeId> = match selection {
        GridSelection::Anchors { start, end } => vec![*start, *end],
        GridSelection::Cells(cells) => cells.clone(),
    };
    if seeds.is_empty() {
        return Ok(false);
    }
    let mut top = usize::MAX;
    let mut bottom = 0;
    for &seed in &seeds {
        let Ok((t, b)) = span_extent(store, table_id, seed) else {
            return Ok(false);
        };
        top = top.min(t);
        bottom = bottom.max(b);
    }
    let affected = cells_of_row_range(store, table_id, top, bottom)?;
    ctx.layout.discard_frames(table_id, &affected);

    let Some(rect) = collect_rectangle(store, table_id, selection, ctx)? else {
        ctx.layout.rebuild_frames(table_id);
        return Ok(false);
    };
    if rect.cell_count() <= 1 {
        ctx.layout.rebuild_frames(table_id);
        return Ok(false);
    }
    // A single-column rectangle that is exactly one existing span is one
    // logical cell already: nothing to merge.
    if rect.rows.iter().all(|(_, members)| members.len() == 1) {
        let members: Vec<NodeId> = rect.rows.iter().map(|(_, m)| m[0]).collect();
        if span_cells(store, table_id, members[0])? == members {
            ctx.layout.rebuild_frames(table_id);
            return Ok(false);
        }
    }

    let master = rect.top_left().expect("rectangle has a top-left cell");
    let row_count = rect.row_count() as u32;
    let master_content = store.cell(master)?.content;

    // Bottom-right borders, captured before that cell is deleted.
    let bottom_right_borders = rect
        .rows
        .last()
        .and_then(|(_, members)| members.last())
        .and_then(|&id| store.cell(id).ok())
        .and_then(|c| c.properties.borders.clone());

    // Delete everything outside the first column, migrating non-empty
    // content into the master.
    let mut deleted: Vec<TableCell> = Vec::new();
    for (_, members) in &rect.rows {
        for &cell_id in members.iter().skip(1) {
            let content = store.cell(cell_id)?.content;
            if !ctx.content.is_empty(content) {
                ctx.content.move_content(content, master_content);
                ctx.record(|u| u.content_moved(content, master_content));
            }
            ctx.notify_removing(&[cell_id]);
            let cell = store.remove_cell(cell_id)?;
            ctx.content.remove(cell.content);
            deleted.push(cell);
        }
    }

    // The kept first column becomes the span chain, all at the combined
    // width so every row still tiles the table.
    {
        let cell = store.cell_mut(master)?;
        cell.row_span = RowSpan::master_of_height(row_count);
        cell.width = rect.width();
    }
    for (ri, (_, members)) in rect.rows.iter().enumerate().skip(1) {
        let Some(&kept) = members.first() else { continue };
        let cell = store.cell_mut(kept)?;
        cell.row_span = RowSpan::Covered {
            below: row_count - ri as u32,
        };
        cell.width = rect.width();
    }

    // Border combine: own top/left, bottom-right cell's bottom/right.
    if let Some(borders) = bottom_right_borders {
        let cell = store.cell_mut(master)?;
        let mut combined = cell.properties.borders.clone().unwrap_or_default();
        combined.bottom = borders.bottom;
        combined.right = borders.right;
        cell.properties.borders = Some(combined);
    }

    // A rectangle row can lose every cell it had (its only members were
    // covered cells of spans that just got absorbed); such superfluous
    // rows are removed outright.
    for r in (rect.top..=rect.bottom).rev() {
        let table = store.table(table_id)?;
        let Some(row_id) = table.row_at(r) else { continue };
        if store.row(row_id)?.cell_count() == 0 {
            store.remove_row(row_id)?;
            rebalance_after_row_count_change(store, table_id, r, -1, false)?;
        }
    }
    renumber_spans(store, table_id)?;

    ctx.record(|u| u.merge_applied(master, &deleted));
    ctx.layout.rebuild_frames(table_id);
    Ok(true)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::EditContext;
    use table_model::consistency::check_table;
    use table_model::{GridStore, InMemoryContent, NoopLayout, RecordingUndo};

    fn register_contents(store: &GridStore, content: &mut InMemoryContent) {
        for cell in store.cells.values() {
            content.put(cell.content, Vec::new());
        }
    }

    #[test]
    fn test_merge_two_by_two_in_three_by_three() {
        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(3, 3, 3000);
        let mut content = InMemoryContent::new();
        register_contents(&store, &mut content);
        let mut layout = NoopLayout::new();

        let a = store.cell_at(table_id, 0, 0).unwrap();
        let b = store.cell_at(table_id, 1, 1).unwrap();

        let mut ctx = EditContext::new(&mut content, &mut layout);
        let changed = merge_cells(&mut store, table_id, &GridSelection::between(a, b), &mut ctx).unwrap();
        assert!(changed);

        // Master spans two rows at double width.
        let master = store.cell(a).unwrap();
        assert_eq!(master.row_span, RowSpan::Master { rows: 2 });
        assert_eq!(master.width, 2000);

        // Row 0 now has two cells (2000 + 1000), row 1 a covered
        // placeholder of width 2000 plus the untouched third column.
        let row0 = store.table(table_id).unwrap().row_at(0).unwrap();
        let row1 = store.table(table_id).unwrap().row_at(1).unwrap();
        assert_eq!(store.row(row0).unwrap().cell_count(), 2);
        assert_eq!(store.row(row1).unwrap().cell_count(), 2);

        let covered = store.cell_at(table_id, 1, 0).unwrap();
        assert_eq!(store.cell(covered).unwrap().row_span, RowSpan::Covered { below: 1 });
        assert_eq!(store.cell(covered).unwrap().width, 2000);

        assert!(check_table(&store, table_id).is_empty());
    }

    #[test]
    fn test_merge_single_cell_is_noop() {
        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(2, 2, 2000);
        let mut content = InMemoryContent::new();
        register_contents(&store, &mut content);
        let mut layout = NoopLayout::new();

        let before = serde_json::to_string(&store).unwrap();
        let a = store.cell_at(table_id, 0, 0).unwrap();

        let mut ctx = EditContext::new(&mut content, &mut layout);
        let changed = merge_cells(&mut store, table_id, &GridSelection::single(a), &mut ctx).unwrap();

        assert!(!changed);
        assert_eq!(serde_json::to_string(&store).unwrap(), before);
    }

    #[test]
    fn test_merge_moves_content_and_reports_undo() {
        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(1, 3, 3000);
        let mut content = InMemoryContent::new();
        register_contents(&store, &mut content);
        let mut layout = NoopLayout::new();
        let mut undo = RecordingUndo::new();

        let a = store.cell_at(table_id, 0, 0).unwrap();
        let b = store.cell_at(table_id, 0, 2).unwrap();
        let b_content = store.cell(b).unwrap().content;
        content.put(b_content, vec!["text".into()]);
        let a_content = store.cell(a).unwrap().content;

        let mut ctx = EditContext::new(&mut content, &mut layout).with_undo(&mut undo);
        assert!(merge_cells(&mut store, table_id, &GridSelection::between(a, b), &mut ctx).unwrap());

        assert_eq!(content.blocks(a_content), ["text"]);
        assert_eq!(undo.merges.len(), 1);
        assert_eq!(undo.merges[0].0, a);
        assert_eq!(undo.merges[0].1.len(), 2);
        assert_eq!(undo.content_moves, vec![(b_content, a_content)]);

        // The whole row merged into one full-width cell.
        let master = store.cell(a).unwrap();
        assert_eq!(master.width, 3000);
        assert_eq!(master.row_span, RowSpan::Single);
        assert!(check_table(&store, table_id).is_empty());
    }

    #[test]
    fn test_merge_notifies_observer_before_removal() {
        use table_model::RecordingObserver;

        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(1, 2, 2000);
        let mut content = InMemoryContent::new();
        register_contents(&store, &mut content);
        let mut layout = NoopLayout::new();
        let mut observer = RecordingObserver::default();

        let a = store.cell_at(table_id, 0, 0).unwrap();
        let b = store.cell_at(table_id, 0, 1).unwrap();

        let mut ctx = EditContext::new(&mut content, &mut layout).with_observer(&mut observer);
        assert!(merge_cells(&mut store, table_id, &GridSelection::between(a, b), &mut ctx).unwrap());

        assert_eq!(observer.removed, vec![b]);
    }
}
