//! Table Edit - structural editing of the table grid
//!
//! This crate implements the mutation engine over `table_model`'s grid:
//! rectangular selection closure, cell merging and splitting, row and
//! column insertion and deletion, and one-time subtable flattening.
//! Every operation preserves the grid invariants (width conservation,
//! span-chain integrity) and brackets its mutations with layout
//! discard/rebuild and synchronous observer notification.

mod editor;
mod error;
mod collect;
mod merge;
mod split;
mod rows;
mod columns;
mod delete;
mod flatten;

pub use editor::{EditContext, TableEditor};
pub use error::*;
pub use collect::{collect_rectangle, expand_selection_to_full_spans};
pub use rows::insert_spanned_row;
pub use delete::{find_superfluous_rows, prepare_for_deletion};
