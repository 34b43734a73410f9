//! Collaborator contracts - content model, layout, undo, and observers
//!
//! The grid core owns the table structure and nothing else. Cell content,
//! layout frames, and undo history belong to the surrounding document;
//! these traits are the seams through which structural operations talk to
//! them. All calls are synchronous: observers are told about removals
//! before they happen, and layout discard/rebuild brackets every
//! mutation.

use crate::{ContentId, NodeId, TableCell};
use std::collections::HashMap;

// =============================================================================
// Content Model
// =============================================================================

/// Access to the rich-text content living inside cells.
///
/// The core never inspects content; it only tests emptiness, moves ranges
/// between cells, and creates/deletes the one start/end node pair each
/// cell owns.
pub trait ContentHost {
    /// Is the cell's content empty (nothing worth preserving)?
    fn is_empty(&self, content: ContentId) -> bool;

    /// Create a fresh, empty content range for a new cell
    fn create(&mut self) -> ContentId;

    /// Delete a content range (its cell is being removed)
    fn remove(&mut self, content: ContentId);

    /// Move `src`'s content to the end of `dst`. Ownership transfers:
    /// `src` is empty afterwards but still exists.
    fn move_content(&mut self, src: ContentId, dst: ContentId);

    /// Does anything outside the table (field, chart data sequence,
    /// cross-reference) point into this range? Checked by subtable
    /// flattening before it rearranges content.
    fn is_externally_referenced(&self, _content: ContentId) -> bool {
        false
    }
}

/// In-memory content store: each range is a list of opaque content
/// blocks. The reference `ContentHost` used by the test suites and the
/// simplest embedders.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContent {
    ranges: HashMap<ContentId, Vec<String>>,
    referenced: Vec<ContentId>,
}

impl InMemoryContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register existing content under an already-issued id
    pub fn put(&mut self, content: ContentId, blocks: Vec<String>) {
        self.ranges.insert(content, blocks);
    }

    /// Read content back (for assertions)
    pub fn blocks(&self, content: ContentId) -> &[String] {
        self.ranges.get(&content).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Mark a range as externally referenced (flattening precondition)
    pub fn mark_referenced(&mut self, content: ContentId) {
        self.referenced.push(content);
    }

    /// Number of live ranges
    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }
}

impl ContentHost for InMemoryContent {
    fn is_empty(&self, content: ContentId) -> bool {
        self.ranges.get(&content).map(|b| b.is_empty()).unwrap_or(true)
    }

    fn create(&mut self) -> ContentId {
        let id = ContentId::new();
        self.ranges.insert(id, Vec::new());
        id
    }

    fn remove(&mut self, content: ContentId) {
        self.ranges.remove(&content);
    }

    fn move_content(&mut self, src: ContentId, dst: ContentId) {
        let blocks = self.ranges.remove(&src).unwrap_or_default();
        self.ranges.entry(dst).or_default().extend(blocks);
        // The source range still exists, just empty.
        self.ranges.insert(src, Vec::new());
    }

    fn is_externally_referenced(&self, content: ContentId) -> bool {
        self.referenced.contains(&content)
    }
}

// =============================================================================
// Layout
// =============================================================================

/// Contract with the layout/rendering engine.
///
/// Discard happens before any row or cell is added or removed, rebuild
/// after the grid is consistent again - never interleaved, so layout
/// never sees a half-mutated grid.
pub trait LayoutHost {
    /// Throw away cached frames for the given cells ahead of a mutation
    fn discard_frames(&mut self, table: NodeId, cells: &[NodeId]);

    /// Rebuild frames for the whole table after a mutation
    fn rebuild_frames(&mut self, table: NodeId);

    /// Current rendered height of a row in twips, if layout has one.
    /// The equal-height split prefers real rendered heights over stored
    /// attributes.
    fn current_row_height(&self, row: NodeId) -> Option<i64>;
}

/// Layout host that does nothing and reports no heights. Used by tests
/// and by embedders that lay out lazily.
#[derive(Debug, Clone, Default)]
pub struct NoopLayout {
    /// Fixed heights to report, for tests exercising the equal-height split
    pub row_heights: HashMap<NodeId, i64>,
}

impl NoopLayout {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LayoutHost for NoopLayout {
    fn discard_frames(&mut self, _table: NodeId, _cells: &[NodeId]) {}

    fn rebuild_frames(&mut self, _table: NodeId) {}

    fn current_row_height(&self, row: NodeId) -> Option<i64> {
        self.row_heights.get(&row).copied()
    }
}

// =============================================================================
// Undo Sink
// =============================================================================

/// Passive recorder for reversible mutations. The core reports what it
/// did; it never asks the sink to replay anything. All methods default to
/// no-ops so embedders implement only what they record.
pub trait UndoSink {
    /// A merge completed: `master` absorbed the region, `deleted` are the
    /// cells that were removed (full structs, enough to rebuild them).
    fn merge_applied(&mut self, _master: NodeId, _deleted: &[TableCell]) {}

    /// `count` rows were inserted at row index `at`
    fn rows_inserted(&mut self, _table: NodeId, _at: usize, _count: usize) {}

    /// `count` columns were inserted at logical border `at_border`
    fn columns_inserted(&mut self, _table: NodeId, _at_border: i64, _count: usize) {}

    /// Cells were deleted outside of a merge
    fn cells_deleted(&mut self, _table: NodeId, _deleted: &[TableCell]) {}

    /// Content moved from one cell's range to another's
    fn content_moved(&mut self, _src: ContentId, _dst: ContentId) {}
}

/// Undo sink that remembers everything it was told, for assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingUndo {
    pub merges: Vec<(NodeId, Vec<NodeId>)>,
    pub row_inserts: Vec<(NodeId, usize, usize)>,
    pub column_inserts: Vec<(NodeId, i64, usize)>,
    pub deletions: Vec<(NodeId, Vec<NodeId>)>,
    pub content_moves: Vec<(ContentId, ContentId)>,
}

impl RecordingUndo {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UndoSink for RecordingUndo {
    fn merge_applied(&mut self, master: NodeId, deleted: &[TableCell]) {
        self.merges
            .push((master, deleted.iter().map(|c| c.id()).collect()));
    }

    fn rows_inserted(&mut self, table: NodeId, at: usize, count: usize) {
        self.row_inserts.push((table, at, count));
    }

    fn columns_inserted(&mut self, table: NodeId, at_border: i64, count: usize) {
        self.column_inserts.push((table, at_border, count));
    }

    fn cells_deleted(&mut self, table: NodeId, deleted: &[TableCell]) {
        self.deletions
            .push((table, deleted.iter().map(|c| c.id()).collect()));
    }

    fn content_moved(&mut self, src: ContentId, dst: ContentId) {
        self.content_moves.push((src, dst));
    }
}

// =============================================================================
// Cell Observer
// =============================================================================

/// External listeners holding weak references to cells (chart data
/// sequences, cross-reference builders). Notified synchronously, before
/// removal, within the same mutating call - they must never observe a
/// dangling id.
pub trait CellObserver {
    fn cells_removing(&mut self, cells: &[NodeId]);
}

/// Observer that records the removal notifications it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    pub removed: Vec<NodeId>,
}

impl CellObserver for RecordingObserver {
    fn cells_removing(&mut self, cells: &[NodeId]) {
        self.removed.extend_from_slice(cells);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_content_move_empties_source() {
        let mut content = InMemoryContent::new();
        let a = content.create();
        let b = content.create();
        content.put(a, vec!["hello".into()]);
        content.put(b, vec!["world".into()]);

        content.move_content(a, b);

        assert!(content.is_empty(a));
        assert_eq!(content.blocks(b), ["world", "hello"]);
    }

    #[test]
    fn test_unknown_range_is_empty() {
        let content = InMemoryContent::new();
        assert!(content.is_empty(ContentId::new()));
    }
}
