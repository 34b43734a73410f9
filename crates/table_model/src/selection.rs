//! Selection descriptors for structural table operations
//!
//! A selection is transient: produced by the caller (usually from two
//! document positions), consumed within one operation, never persisted.

use crate::NodeId;
use serde::{Deserialize, Serialize};

/// What the user selected, before rectangular closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridSelection {
    /// The cells enclosing the two anchors of a document selection.
    /// `start` and `end` may be the same cell, or sit in any order.
    Anchors { start: NodeId, end: NodeId },
    /// An explicit set of cells (row/column header selection).
    Cells(Vec<NodeId>),
}

impl GridSelection {
    /// Selection of a single cell
    pub fn single(cell: NodeId) -> Self {
        Self::Anchors { start: cell, end: cell }
    }

    /// Selection between two anchor cells
    pub fn between(start: NodeId, end: NodeId) -> Self {
        Self::Anchors { start, end }
    }

    /// Explicit cell set
    pub fn cells(cells: Vec<NodeId>) -> Self {
        Self::Cells(cells)
    }
}

/// A normalized rectangle of whole cells, the output of rectangular
/// closure: row indices `top..=bottom`, logical borders `[left, right)`,
/// and per-row lists of the member cells in left-to-right order.
#[derive(Debug, Clone)]
pub struct CellRect {
    pub top: usize,
    pub bottom: usize,
    pub left: i64,
    pub right: i64,
    /// One entry per row in `top..=bottom`: (row id, member cell ids)
    pub rows: Vec<(NodeId, Vec<NodeId>)>,
}

impl CellRect {
    /// Number of rows covered
    pub fn row_count(&self) -> usize {
        self.bottom - self.top + 1
    }

    /// Horizontal extent in twips
    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    /// Total number of member cells
    pub fn cell_count(&self) -> usize {
        self.rows.iter().map(|(_, cells)| cells.len()).sum()
    }

    /// The top-left member cell (the merge master candidate)
    pub fn top_left(&self) -> Option<NodeId> {
        self.rows.first().and_then(|(_, cells)| cells.first()).copied()
    }
}
