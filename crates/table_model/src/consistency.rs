//! Consistency checker - grid invariant verification
//!
//! Walks a whole table and reports every invariant violation it finds.
//! The test suites run this after every mutation; production paths never
//! call it (they tolerate minor drift and repair opportunistically).
//!
//! Verified invariants:
//! 1. every row's cell widths sum to the table width, within one twip
//! 2. every covered cell chains up to a master with matching magnitudes
//! 3. a span's master sits in the first row the span covers
//! 4. every cell belongs to at most one chain, with no gaps
//! 5. cell/content correspondence is 1:1 (no shared content ranges)

use crate::geometry::{border_tolerance, cell_at_left_border, left_border_of};
use crate::{ContentId, GridStore, NodeId, RowSpan};
use std::collections::{HashMap, HashSet};

/// A single invariant violation found by [`check_table`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyViolation {
    /// Row width differs from the table width by more than one twip
    RowWidthMismatch {
        row_index: usize,
        expected: i64,
        actual: i64,
    },
    /// Covered cell with no master reachable above it
    OrphanCovered { cell: NodeId, row_index: usize },
    /// A master's chain is missing, misnumbered, or misaligned
    BrokenChain { master: NodeId, detail: String },
    /// A cell is claimed by two different spans
    DoubleCoverage { cell: NodeId },
    /// Master spanning fewer than two rows, or covered cell with below = 0
    DegenerateSpanValue { cell: NodeId },
    /// A master's recorded height runs past the last row
    SpanPastTableEnd { master: NodeId },
    /// Two cells share one content range
    DuplicateContent { content: ContentId },
}

impl std::fmt::Display for ConsistencyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RowWidthMismatch { row_index, expected, actual } => {
                write!(f, "row {row_index}: widths sum to {actual}, table width is {expected}")
            }
            Self::OrphanCovered { cell, row_index } => {
                write!(f, "covered cell {cell} in row {row_index} has no master")
            }
            Self::BrokenChain { master, detail } => {
                write!(f, "span of master {master} is broken: {detail}")
            }
            Self::DoubleCoverage { cell } => write!(f, "cell {cell} is claimed by two spans"),
            Self::DegenerateSpanValue { cell } => write!(f, "cell {cell} has a degenerate span value"),
            Self::SpanPastTableEnd { master } => {
                write!(f, "span of master {master} runs past the table end")
            }
            Self::DuplicateContent { content } => {
                write!(f, "content range {content} is owned by two cells")
            }
        }
    }
}

/// Verify every invariant over one table. Returns all violations found;
/// an empty vector means the grid is consistent.
pub fn check_table(store: &GridStore, table_id: NodeId) -> Vec<ConsistencyViolation> {
    let mut violations = Vec::new();
    let table = match store.table(table_id) {
        Ok(t) => t,
        Err(_) => return violations,
    };
    let row_ids: Vec<NodeId> = table.rows().to_vec();
    let row_count = row_ids.len();

    // Invariant 1: width conservation per row.
    for (idx, &row_id) in row_ids.iter().enumerate() {
        if let Ok(actual) = store.row_width(row_id) {
            if (actual - table.width).abs() > 1 {
                violations.push(ConsistencyViolation::RowWidthMismatch {
                    row_index: idx,
                    expected: table.width,
                    actual,
                });
            }
        }
    }

    // Invariants 2-4: walk every master's chain, marking the covered
    // cells it accounts for.
    let mut claimed: HashSet<NodeId> = HashSet::new();
    for (top, &row_id) in row_ids.iter().enumerate() {
        let Ok(row) = store.row(row_id) else { continue };
        for &cell_id in row.cells() {
            let Ok(cell) = store.cell(cell_id) else { continue };
            let height = match cell.row_span {
                RowSpan::Master { rows } => {
                    if rows < 2 {
                        violations.push(ConsistencyViolation::DegenerateSpanValue { cell: cell_id });
                        continue;
                    }
                    rows as usize
                }
                RowSpan::Covered { below: 0 } => {
                    violations.push(ConsistencyViolation::DegenerateSpanValue { cell: cell_id });
                    continue;
                }
                _ => continue,
            };

            if top + height > row_count {
                violations.push(ConsistencyViolation::SpanPastTableEnd { master: cell_id });
                continue;
            }

            let Ok(x) = left_border_of(store, cell_id) else { continue };
            let width = cell.width;

            for d in 1..height {
                let below_row = row_ids[top + d];
                let found = cell_at_left_border(store, below_row, x).ok().flatten();
                let Some(below_id) = found else {
                    violations.push(ConsistencyViolation::BrokenChain {
                        master: cell_id,
                        detail: format!("no cell at border {x} in row {}", top + d),
                    });
                    break;
                };
                let Ok(below_cell) = store.cell(below_id) else { continue };

                let expected = RowSpan::Covered {
                    below: (height - d) as u32,
                };
                if below_cell.row_span != expected {
                    violations.push(ConsistencyViolation::BrokenChain {
                        master: cell_id,
                        detail: format!(
                            "row {}: expected {:?}, found {:?}",
                            top + d,
                            expected,
                            below_cell.row_span
                        ),
                    });
                    break;
                }
                if (below_cell.width - width).abs() > border_tolerance(x.max(width)) {
                    violations.push(ConsistencyViolation::BrokenChain {
                        master: cell_id,
                        detail: format!("row {}: covered cell width drifts from master", top + d),
                    });
                }
                if !claimed.insert(below_id) {
                    violations.push(ConsistencyViolation::DoubleCoverage { cell: below_id });
                }
            }
        }
    }

    // Covered cells never claimed by a master are orphans (this also
    // catches a covered cell in the first row, which can have no master).
    for (idx, &row_id) in row_ids.iter().enumerate() {
        let Ok(row) = store.row(row_id) else { continue };
        for &cell_id in row.cells() {
            let Ok(cell) = store.cell(cell_id) else { continue };
            if cell.row_span.is_covered() && !claimed.contains(&cell_id) {
                violations.push(ConsistencyViolation::OrphanCovered {
                    cell: cell_id,
                    row_index: idx,
                });
            }
        }
    }

    // Invariant 5: one content range per cell.
    let mut owners: HashMap<ContentId, NodeId> = HashMap::new();
    for &row_id in &row_ids {
        let Ok(row) = store.row(row_id) else { continue };
        for &cell_id in row.cells() {
            let Ok(cell) = store.cell(cell_id) else { continue };
            if owners.insert(cell.content, cell_id).is_some() {
                violations.push(ConsistencyViolation::DuplicateContent {
                    content: cell.content,
                });
            }
        }
    }

    violations
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_table_has_no_violations() {
        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(3, 3, 3000);
        assert!(check_table(&store, table_id).is_empty());
    }

    #[test]
    fn test_detects_width_mismatch() {
        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(2, 2, 2000);
        let cell = store.cell_at(table_id, 0, 0).unwrap();
        store.cell_mut(cell).unwrap().width = 500;

        let violations = check_table(&store, table_id);
        assert!(violations
            .iter()
            .any(|v| matches!(v, ConsistencyViolation::RowWidthMismatch { row_index: 0, .. })));
    }

    #[test]
    fn test_detects_orphan_covered_cell() {
        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(2, 1, 1000);
        let cell = store.cell_at(table_id, 1, 0).unwrap();
        store.cell_mut(cell).unwrap().row_span = RowSpan::Covered { below: 1 };

        let violations = check_table(&store, table_id);
        assert!(violations
            .iter()
            .any(|v| matches!(v, ConsistencyViolation::OrphanCovered { .. })));
    }

    #[test]
    fn test_detects_misnumbered_chain() {
        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(3, 1, 1000);
        let c0 = store.cell_at(table_id, 0, 0).unwrap();
        let c1 = store.cell_at(table_id, 1, 0).unwrap();
        let c2 = store.cell_at(table_id, 2, 0).unwrap();
        store.cell_mut(c0).unwrap().row_span = RowSpan::Master { rows: 3 };
        store.cell_mut(c1).unwrap().row_span = RowSpan::Covered { below: 2 };
        // Wrong terminator value.
        store.cell_mut(c2).unwrap().row_span = RowSpan::Covered { below: 3 };

        let violations = check_table(&store, table_id);
        assert!(violations
            .iter()
            .any(|v| matches!(v, ConsistencyViolation::BrokenChain { .. })));
    }

    #[test]
    fn test_detects_span_past_table_end() {
        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(2, 1, 1000);
        let c0 = store.cell_at(table_id, 0, 0).unwrap();
        store.cell_mut(c0).unwrap().row_span = RowSpan::Master { rows: 5 };

        let violations = check_table(&store, table_id);
        assert!(violations
            .iter()
            .any(|v| matches!(v, ConsistencyViolation::SpanPastTableEnd { .. })));
    }

    #[test]
    fn test_detects_duplicate_content() {
        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(1, 2, 2000);
        let a = store.cell_at(table_id, 0, 0).unwrap();
        let b = store.cell_at(table_id, 0, 1).unwrap();
        let shared = store.cell(a).unwrap().content;
        store.cell_mut(b).unwrap().content = shared;

        let violations = check_table(&store, table_id);
        assert!(violations
            .iter()
            .any(|v| matches!(v, ConsistencyViolation::DuplicateContent { .. })));
    }

    #[test]
    fn test_valid_span_passes() {
        let mut store = GridStore::new();
        let table_id = store.build_uniform_table(3, 2, 2000);
        let c0 = store.cell_at(table_id, 0, 0).unwrap();
        let c1 = store.cell_at(table_id, 1, 0).unwrap();
        let c2 = store.cell_at(table_id, 2, 0).unwrap();
        store.cell_mut(c0).unwrap().row_span = RowSpan::Master { rows: 3 };
        store.cell_mut(c1).unwrap().row_span = RowSpan::Covered { below: 2 };
        store.cell_mut(c2).unwrap().row_span = RowSpan::Covered { below: 1 };

        assert!(check_table(&store, table_id).is_empty());
    }
}
