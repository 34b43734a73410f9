//! Error types for structural editing operations

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditError {
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Grid model error: {0}")]
    Model(#[from] table_model::GridModelError),
}

pub type Result<T> = std::result::Result<T, EditError>;
