//! Table Model - Grid structure, row-span ledger, and collaborator seams
//!
//! This crate provides the logical table grid underneath a rich-text
//! document: tables, rows, and cells with stable node IDs, vertical
//! merging via the row-span ledger, and the trait contracts through
//! which structural editing talks to the content model, layout engine,
//! undo history, and external cell observers.

mod node_id;
mod error;
mod grid;
mod selection;
mod hosts;
pub mod geometry;
pub mod span;
pub mod consistency;

pub use node_id::*;
pub use error::*;
pub use grid::*;
pub use selection::*;
pub use hosts::*;
