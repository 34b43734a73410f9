//! Table editor - the public facade over structural operations
//!
//! `TableEditor` borrows the grid store and the collaborator hosts for
//! the duration of one editing call. Every operation runs synchronously
//! to completion: layout frames are discarded before the first
//! structural change and rebuilt after the grid is consistent again,
//! observers hear about removals before they happen, and the undo sink
//! is told what changed.
//!
//! Geometric failures (a selection that cannot be made rectangular, a
//! split with nothing to do) come back as `Ok(false)` - "nothing
//! happened" - never as errors.

use crate::{columns, delete, flatten, merge, rows, split, Result};
use table_model::{
    CellObserver, ContentHost, GridSelection, GridStore, LayoutHost, NodeId, UndoSink,
};

/// Host wiring for one editing call.
pub struct EditContext<'a> {
    pub content: &'a mut dyn ContentHost,
    pub layout: &'a mut dyn LayoutHost,
    pub undo: Option<&'a mut dyn UndoSink>,
    pub observer: Option<&'a mut dyn CellObserver>,
}

impl<'a> EditContext<'a> {
    /// Context with content and layout only (no undo recording, no
    /// observers)
    pub fn new(content: &'a mut dyn ContentHost, layout: &'a mut dyn LayoutHost) -> Self {
        Self {
            content,
            layout,
            undo: None,
            observer: None,
        }
    }

    /// Attach an undo sink
    pub fn with_undo(mut self, undo: &'a mut dyn UndoSink) -> Self {
        self.undo = Some(undo);
        self
    }

    /// Attach a cell observer
    pub fn with_observer(mut self, observer: &'a mut dyn CellObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Tell external listeners these cells are about to disappear.
    /// Synchronous, before removal: nobody observes a dangling id.
    pub(crate) fn notify_removing(&mut self, cells: &[NodeId]) {
        if let Some(observer) = self.observer.as_deref_mut() {
            observer.cells_removing(cells);
        }
    }

    pub(crate) fn record(&mut self, f: impl FnOnce(&mut dyn UndoSink)) {
        if let Some(undo) = self.undo.as_deref_mut() {
            f(undo);
        }
    }
}

/// Structural editor for one table.
pub struct TableEditor<'a> {
    pub(crate) store: &'a mut GridStore,
    pub(crate) table: NodeId,
    pub(crate) ctx: EditContext<'a>,
}

impl<'a> TableEditor<'a> {
    pub fn new(store: &'a mut GridStore, table: NodeId, ctx: EditContext<'a>) -> Self {
        Self { store, table, ctx }
    }

    /// Merge the rectangular closure of `selection` into one master cell.
    /// Returns `Ok(false)` when no rectangle exists or the selection is
    /// already a single cell.
    pub fn merge_cells(&mut self, selection: &GridSelection) -> Result<bool> {
        merge::merge_cells(self.store, self.table, selection, &mut self.ctx)
    }

    /// Split each target cell's span into `sub_count` parts, inserting
    /// rows as needed. With `equal_height`, split points are spaced
    /// evenly over the span's rendered height.
    pub fn split_cells(
        &mut self,
        targets: &[NodeId],
        sub_count: u32,
        equal_height: bool,
    ) -> Result<bool> {
        split::split_cells(
            self.store,
            self.table,
            targets,
            sub_count,
            equal_height,
            &mut self.ctx,
        )
    }

    /// Insert `count` rows above or below the rows touched by
    /// `selected`. Spans ending exactly at the insertion boundary are
    /// not extended.
    pub fn insert_rows(
        &mut self,
        selected: &[NodeId],
        count: usize,
        behind: bool,
        with_placeholder: bool,
    ) -> Result<bool> {
        rows::insert_rows(
            self.store,
            self.table,
            selected,
            count,
            behind,
            with_placeholder,
            &mut self.ctx,
        )
    }

    /// Insert `count` equal-width columns left or right of the columns
    /// touched by `selected`, shrinking existing columns proportionally.
    pub fn insert_columns(
        &mut self,
        selected: &[NodeId],
        count: usize,
        behind: bool,
        with_placeholder: bool,
    ) -> Result<bool> {
        columns::insert_columns(
            self.store,
            self.table,
            selected,
            count,
            behind,
            with_placeholder,
            &mut self.ctx,
        )
    }

    /// Delete the given cells plus every other cell of any span they
    /// touch, removing rows that end up with nothing left.
    pub fn delete_cells(&mut self, cells: &[NodeId]) -> Result<bool> {
        delete::delete_cells(self.store, self.table, cells, &mut self.ctx)
    }

    /// Delete the contiguous row range `first..=last`, shrinking spans
    /// that cross it.
    pub fn delete_rows(&mut self, first: usize, last: usize) -> Result<bool> {
        delete::delete_rows(self.store, self.table, first, last, &mut self.ctx)
    }

    /// Lift every nested table into the outer grid. All-or-nothing:
    /// any precondition failure returns `Ok(false)` with no mutation.
    pub fn flatten_subtables(&mut self) -> Result<bool> {
        flatten::flatten_subtables(self.store, self.table, &mut self.ctx)
    }
}

/// Every cell in the row range `first..=last`, for layout discard calls.
pub(crate) fn cells_of_row_range(
    store: &GridStore,
    table_id: NodeId,
    first: usize,
    last: usize,
) -> Result<Vec<NodeId>> {
    let table = store.table(table_id)?;
    let mut out = Vec::new();
    if table.row_count() == 0 {
        return Ok(out);
    }
    for r in first..=last.min(table.row_count() - 1) {
        let row_id = table.row_at(r).expect("row index clamped");
        out.extend_from_slice(store.row(row_id)?.cells());
    }
    Ok(out)
}
