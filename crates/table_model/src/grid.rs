//! Table grid model - tables, rows, cells, and node storage
//!
//! This module implements the logical grid underneath a rich-text table:
//! a table owns an ordered sequence of rows, a row owns an ordered
//! sequence of cells, and every cell carries a width plus a row-span
//! state that encodes vertical merging.
//!
//! Widths and heights are integer twips (twentieths of a point). The sum
//! of cell widths in every row equals the table width, within one twip of
//! rounding drift.
//!
//! Cells keep their [`NodeId`] across every structural operation; merge,
//! split, and insertion update fields in place so that external
//! cross-references (chart data sequences, content anchors) stay valid.

use crate::{ContentId, GridModelError, NodeId, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// Height Rules
// =============================================================================

/// How row height is determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HeightRule {
    /// Height is automatically determined by content
    #[default]
    Auto,
    /// Height is exactly as specified
    Exact,
    /// Height is at least as specified (can grow)
    AtLeast,
}

// =============================================================================
// Borders
// =============================================================================

/// Border style type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TableBorderStyle {
    #[default]
    None,
    Single,
    Double,
    Dotted,
    Dashed,
    Thick,
}

/// A single border definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableBorder {
    /// Border style
    pub style: TableBorderStyle,
    /// Border width in twips
    pub width: i64,
    /// Border color (CSS color string)
    pub color: String,
}

impl Default for TableBorder {
    fn default() -> Self {
        Self {
            style: TableBorderStyle::Single,
            width: 10,
            color: "#000000".to_string(),
        }
    }
}

impl TableBorder {
    /// Create a simple single-line border
    pub fn single(width: i64, color: &str) -> Self {
        Self {
            style: TableBorderStyle::Single,
            width,
            color: color.to_string(),
        }
    }
}

/// Cell borders (all four sides)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellBorders {
    pub top: Option<TableBorder>,
    pub bottom: Option<TableBorder>,
    pub left: Option<TableBorder>,
    pub right: Option<TableBorder>,
}

impl CellBorders {
    /// Create borders with all sides the same
    pub fn all(border: TableBorder) -> Self {
        Self {
            top: Some(border.clone()),
            bottom: Some(border.clone()),
            left: Some(border.clone()),
            right: Some(border),
        }
    }

    /// Create default borders (single black line)
    pub fn default_borders() -> Self {
        Self::all(TableBorder::default())
    }
}

// =============================================================================
// Cell Properties
// =============================================================================

/// Properties for a table cell
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellProperties {
    /// Cell borders
    pub borders: Option<CellBorders>,
    /// Cell background/shading color (CSS color string)
    pub shading: Option<String>,
}

impl CellProperties {
    /// Create default cell properties
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the borders
    pub fn with_borders(mut self, borders: CellBorders) -> Self {
        self.borders = Some(borders);
        self
    }

    /// Set the shading color
    pub fn with_shading(mut self, color: &str) -> Self {
        self.shading = Some(color.to_string());
        self
    }
}

// =============================================================================
// Row Span
// =============================================================================

/// Vertical merge state of a cell.
///
/// This replaces the classic signed-integer encoding (`+N` master, `-N`
/// covered) with a tagged variant carrying the same information. The
/// magnitude semantics are preserved: for a master spanning `S` rows, the
/// covered cell directly below it is `Covered { below: S - 1 }` and the
/// bottom cell of the chain is `Covered { below: 1 }`, the chain
/// terminator.
///
/// `Covered` values are assigned only by the span ledger (see the `span`
/// module); other components read them through the accessors here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RowSpan {
    /// Ordinary cell occupying a single row
    #[default]
    Single,
    /// First cell of a vertical merge, spanning `rows` rows
    Master { rows: u32 },
    /// Cell hidden under a master above; `below` counts the rows from
    /// this cell to the span bottom, inclusive
    Covered { below: u32 },
}

impl RowSpan {
    /// Check if this cell is the master of a vertical merge
    pub fn is_master(&self) -> bool {
        matches!(self, RowSpan::Master { .. })
    }

    /// Check if this cell is covered by a master above
    pub fn is_covered(&self) -> bool {
        matches!(self, RowSpan::Covered { .. })
    }

    /// Check if this cell participates in a vertical merge at all
    pub fn in_span(&self) -> bool {
        !matches!(self, RowSpan::Single)
    }

    /// Number of rows a master spans (1 for single and covered cells)
    pub fn master_rows(&self) -> u32 {
        match self {
            RowSpan::Master { rows } => (*rows).max(1),
            _ => 1,
        }
    }

    /// Rows remaining to the span bottom for a covered cell (0 otherwise)
    pub fn rows_below(&self) -> u32 {
        match self {
            RowSpan::Covered { below } => *below,
            _ => 0,
        }
    }

    /// Normalize a master height: a one-row master is just a single cell
    pub fn master_of_height(rows: u32) -> RowSpan {
        if rows > 1 {
            RowSpan::Master { rows }
        } else {
            RowSpan::Single
        }
    }
}

// =============================================================================
// Table Cell
// =============================================================================

/// A cell in a table row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCell {
    id: NodeId,
    parent: Option<NodeId>,
    /// Handle to the cell's content range in the surrounding document
    pub content: ContentId,
    /// Horizontal extent in twips; siblings in one row tile the table width
    pub width: i64,
    /// Vertical merge state
    pub row_span: RowSpan,
    /// Cell properties
    pub properties: CellProperties,
    /// Nested table hosted by this cell. Only populated by document
    /// import; subtable flattening lifts it into the outer grid.
    pub nested_table: Option<NodeId>,
}

impl TableCell {
    /// Create a new cell with the given width
    pub fn new(width: i64) -> Self {
        Self {
            id: NodeId::new(),
            parent: None,
            content: ContentId::new(),
            width,
            row_span: RowSpan::Single,
            properties: CellProperties::default(),
            nested_table: None,
        }
    }

    /// Create a cell with properties
    pub fn with_properties(width: i64, properties: CellProperties) -> Self {
        Self {
            id: NodeId::new(),
            parent: None,
            content: ContentId::new(),
            width,
            row_span: RowSpan::Single,
            properties,
            nested_table: None,
        }
    }

    /// Get the unique ID of this cell
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the ID of the owning row
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }
}

// =============================================================================
// Table Row
// =============================================================================

/// A row in a table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRow {
    id: NodeId,
    parent: Option<NodeId>,
    /// IDs of child cells, left to right
    cells: Vec<NodeId>,
    /// Fixed or minimum height in twips (None = sized by content)
    pub height: Option<i64>,
    /// How `height` is interpreted
    pub height_rule: HeightRule,
}

impl TableRow {
    /// Create a new empty row
    pub fn new() -> Self {
        Self {
            id: NodeId::new(),
            parent: None,
            cells: Vec::new(),
            height: None,
            height_rule: HeightRule::Auto,
        }
    }

    /// Create a row with a fixed height
    pub fn with_height(height: i64, rule: HeightRule) -> Self {
        Self {
            id: NodeId::new(),
            parent: None,
            cells: Vec::new(),
            height: Some(height),
            height_rule: rule,
        }
    }

    /// Get the unique ID of this row
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the ID of the owning table
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }

    /// Cell IDs, left to right
    pub fn cells(&self) -> &[NodeId] {
        &self.cells
    }

    /// Get the number of cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

impl Default for TableRow {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Table
// =============================================================================

/// A table: an ordered sequence of rows tiling a fixed logical width
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    id: NodeId,
    /// IDs of rows, top to bottom
    rows: Vec<NodeId>,
    /// Total logical width in twips; every row's cells sum to this
    pub width: i64,
}

impl Table {
    /// Create a new empty table with the given total width
    pub fn new(width: i64) -> Self {
        Self {
            id: NodeId::new(),
            rows: Vec::new(),
            width,
        }
    }

    /// Get the unique ID of this table
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Row IDs, top to bottom
    pub fn rows(&self) -> &[NodeId] {
        &self.rows
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the row at a specific index
    pub fn row_at(&self, index: usize) -> Option<NodeId> {
        self.rows.get(index).copied()
    }
}

// =============================================================================
// Grid Store
// =============================================================================

/// Node storage for the table grid.
///
/// All cross-references between tables, rows, and cells are [`NodeId`]s
/// resolved through this store, never pointers. A cell removed from the
/// store is gone; a cell whose width or span is updated keeps its ID.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridStore {
    pub tables: HashMap<NodeId, Table>,
    pub rows: HashMap<NodeId, TableRow>,
    pub cells: HashMap<NodeId, TableCell>,
}

impl GridStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get a table by ID
    pub fn table(&self, id: NodeId) -> Result<&Table> {
        self.tables
            .get(&id)
            .ok_or(GridModelError::TableNotFound(id.as_uuid()))
    }

    /// Get a mutable table by ID
    pub fn table_mut(&mut self, id: NodeId) -> Result<&mut Table> {
        self.tables
            .get_mut(&id)
            .ok_or(GridModelError::TableNotFound(id.as_uuid()))
    }

    /// Get a row by ID
    pub fn row(&self, id: NodeId) -> Result<&TableRow> {
        self.rows
            .get(&id)
            .ok_or(GridModelError::RowNotFound(id.as_uuid()))
    }

    /// Get a mutable row by ID
    pub fn row_mut(&mut self, id: NodeId) -> Result<&mut TableRow> {
        self.rows
            .get_mut(&id)
            .ok_or(GridModelError::RowNotFound(id.as_uuid()))
    }

    /// Get a cell by ID
    pub fn cell(&self, id: NodeId) -> Result<&TableCell> {
        self.cells
            .get(&id)
            .ok_or(GridModelError::CellNotFound(id.as_uuid()))
    }

    /// Get a mutable cell by ID
    pub fn cell_mut(&mut self, id: NodeId) -> Result<&mut TableCell> {
        self.cells
            .get_mut(&id)
            .ok_or(GridModelError::CellNotFound(id.as_uuid()))
    }

    /// Index of a row within its table
    pub fn row_index(&self, table_id: NodeId, row_id: NodeId) -> Result<usize> {
        let table = self.table(table_id)?;
        table
            .rows
            .iter()
            .position(|&id| id == row_id)
            .ok_or(GridModelError::RowNotFound(row_id.as_uuid()))
    }

    /// Index of a cell within its row
    pub fn cell_index(&self, row_id: NodeId, cell_id: NodeId) -> Result<usize> {
        let row = self.row(row_id)?;
        row.cells
            .iter()
            .position(|&id| id == cell_id)
            .ok_or(GridModelError::CellNotFound(cell_id.as_uuid()))
    }

    /// Row index of the row owning a cell
    pub fn row_index_of_cell(&self, table_id: NodeId, cell_id: NodeId) -> Result<usize> {
        let cell = self.cell(cell_id)?;
        let row_id = cell
            .parent
            .ok_or(GridModelError::CellNotFound(cell_id.as_uuid()))?;
        self.row_index(table_id, row_id)
    }

    /// The cell at position (row index, cell index) in a table
    pub fn cell_at(&self, table_id: NodeId, row_index: usize, cell_index: usize) -> Result<NodeId> {
        let table = self.table(table_id)?;
        let row_id = table
            .row_at(row_index)
            .ok_or(GridModelError::RowIndexOutOfRange {
                index: row_index,
                count: table.row_count(),
            })?;
        let row = self.row(row_id)?;
        row.cells
            .get(cell_index)
            .copied()
            .ok_or_else(|| GridModelError::StructureError(format!(
                "row {row_index} has no cell at index {cell_index}"
            )))
    }

    /// Sum of cell widths in a row
    pub fn row_width(&self, row_id: NodeId) -> Result<i64> {
        let row = self.row(row_id)?;
        let mut sum = 0;
        for &cell_id in &row.cells {
            sum += self.cell(cell_id)?.width;
        }
        Ok(sum)
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Insert a table into the store
    pub fn insert_table(&mut self, table: Table) -> NodeId {
        let id = table.id();
        self.tables.insert(id, table);
        id
    }

    /// Insert a row into a table at `index` (None = append)
    pub fn insert_row(
        &mut self,
        mut row: TableRow,
        table_id: NodeId,
        index: Option<usize>,
    ) -> Result<NodeId> {
        let row_id = row.id();
        row.set_parent(Some(table_id));

        let table = self.table_mut(table_id)?;
        match index {
            Some(idx) if idx <= table.rows.len() => table.rows.insert(idx, row_id),
            Some(idx) => {
                return Err(GridModelError::RowIndexOutOfRange {
                    index: idx,
                    count: table.rows.len(),
                })
            }
            None => table.rows.push(row_id),
        }

        self.rows.insert(row_id, row);
        Ok(row_id)
    }

    /// Insert a cell into a row at `index` (None = append)
    pub fn insert_cell(
        &mut self,
        mut cell: TableCell,
        row_id: NodeId,
        index: Option<usize>,
    ) -> Result<NodeId> {
        let cell_id = cell.id();
        cell.set_parent(Some(row_id));

        let row = self.row_mut(row_id)?;
        match index {
            Some(idx) => row.cells.insert(idx.min(row.cells.len()), cell_id),
            None => row.cells.push(cell_id),
        }

        self.cells.insert(cell_id, cell);
        Ok(cell_id)
    }

    /// Remove a cell from its row, returning the removed cell
    pub fn remove_cell(&mut self, cell_id: NodeId) -> Result<TableCell> {
        let cell = self
            .cells
            .remove(&cell_id)
            .ok_or(GridModelError::CellNotFound(cell_id.as_uuid()))?;

        if let Some(parent_id) = cell.parent {
            if let Some(row) = self.rows.get_mut(&parent_id) {
                row.cells.retain(|&id| id != cell_id);
            }
        }

        Ok(cell)
    }

    /// Remove a row and all of its cells, returning them
    pub fn remove_row(&mut self, row_id: NodeId) -> Result<(TableRow, Vec<TableCell>)> {
        let row = self
            .rows
            .remove(&row_id)
            .ok_or(GridModelError::RowNotFound(row_id.as_uuid()))?;

        let mut removed = Vec::with_capacity(row.cells.len());
        for &cell_id in &row.cells {
            if let Some(cell) = self.cells.remove(&cell_id) {
                removed.push(cell);
            }
        }

        if let Some(parent_id) = row.parent {
            if let Some(table) = self.tables.get_mut(&parent_id) {
                table.rows.retain(|&id| id != row_id);
            }
        }

        Ok((row, removed))
    }

    // =========================================================================
    // Builders
    // =========================================================================

    /// Build a uniform `rows` x `cols` table of equal-width cells.
    ///
    /// The last cell of each row absorbs the division remainder so every
    /// row tiles `total_width` exactly.
    pub fn build_uniform_table(&mut self, rows: usize, cols: usize, total_width: i64) -> NodeId {
        let rows = rows.max(1);
        let cols = cols.max(1);
        let col_width = total_width / cols as i64;

        let table_id = self.insert_table(Table::new(total_width));
        for _ in 0..rows {
            let row_id = self
                .insert_row(TableRow::new(), table_id, None)
                .expect("freshly inserted table");
            for col in 0..cols {
                let width = if col == cols - 1 {
                    total_width - col_width * (cols as i64 - 1)
                } else {
                    col_width
                };
                let cell = TableCell::with_properties(
                    width,
                    CellProperties::new().with_borders(CellBorders::default_borders()),
                );
                self.insert_cell(cell, row_id, None)
                    .expect("freshly inserted row");
            }
        }
        table_id
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_table_tiles_width() {
        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(3, 4, 8000);

        let table = store.table(table_id).unwrap();
        assert_eq!(table.row_count(), 3);
        for &row_id in table.rows() {
            assert_eq!(store.row_width(row_id).unwrap(), 8000);
            assert_eq!(store.row(row_id).unwrap().cell_count(), 4);
        }
    }

    #[test]
    fn test_uniform_table_absorbs_remainder() {
        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(1, 3, 1000);

        let row_id = store.table(table_id).unwrap().row_at(0).unwrap();
        assert_eq!(store.row_width(row_id).unwrap(), 1000);

        let last = *store.row(row_id).unwrap().cells().last().unwrap();
        assert_eq!(store.cell(last).unwrap().width, 334);
    }

    #[test]
    fn test_cell_identity_stable_across_updates() {
        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(2, 2, 2000);

        let cell_id = store.cell_at(table_id, 0, 0).unwrap();
        store.cell_mut(cell_id).unwrap().width = 1500;
        store.cell_mut(cell_id).unwrap().row_span = RowSpan::Master { rows: 2 };

        let cell = store.cell(cell_id).unwrap();
        assert_eq!(cell.id(), cell_id);
        assert_eq!(cell.width, 1500);
        assert!(cell.row_span.is_master());
    }

    #[test]
    fn test_remove_row_removes_cells() {
        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(2, 3, 3000);

        let row_id = store.table(table_id).unwrap().row_at(0).unwrap();
        let cell_ids: Vec<NodeId> = store.row(row_id).unwrap().cells().to_vec();

        let (_, removed) = store.remove_row(row_id).unwrap();
        assert_eq!(removed.len(), 3);
        assert_eq!(store.table(table_id).unwrap().row_count(), 1);
        for id in cell_ids {
            assert!(store.cell(id).is_err());
        }
    }

    #[test]
    fn test_row_span_accessors() {
        assert!(RowSpan::Single.master_rows() == 1);
        assert!(!RowSpan::Single.in_span());

        let master = RowSpan::Master { rows: 3 };
        assert!(master.is_master());
        assert_eq!(master.master_rows(), 3);

        let covered = RowSpan::Covered { below: 2 };
        assert!(covered.is_covered());
        assert_eq!(covered.rows_below(), 2);

        assert_eq!(RowSpan::master_of_height(1), RowSpan::Single);
        assert_eq!(RowSpan::master_of_height(4), RowSpan::Master { rows: 4 });
    }

    #[test]
    fn test_store_serde_round_trip() {
        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(2, 2, 2000);

        let json = serde_json::to_string(&store).unwrap();
        let restored: GridStore = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.table(table_id).unwrap().row_count(), 2);
        assert_eq!(restored.cells.len(), 4);
    }
}
