//! Error types for table model operations

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum GridModelError {
    #[error("Table not found: {0}")]
    TableNotFound(Uuid),

    #[error("Row not found: {0}")]
    RowNotFound(Uuid),

    #[error("Cell not found: {0}")]
    CellNotFound(Uuid),

    #[error("Row index {index} out of range (table has {count} rows)")]
    RowIndexOutOfRange { index: usize, count: usize },

    #[error("Grid structure error: {0}")]
    StructureError(String),
}

pub type Result<T> = std::result::Result<T, GridModelError>;
