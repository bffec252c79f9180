//! Cell-related types and utilities
//!
//! This module contains:
//! - [`CellValue`] - The value stored in a cell
//! - [`CellAddress`] - A cell's location (e.g., "B1")
//! - [`CellRange`] - A range of cells (e.g., "D3:D1000")

mod address;
mod value;

pub use address::{CellAddress, CellRange};
pub use value::{format_number, CellValue};
