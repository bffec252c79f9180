//! # roadmap-core
//!
//! Cell model shared by the roadmap crates.
//!
//! This crate provides the small set of spreadsheet concepts the interface
//! workflow needs:
//! - [`CellValue`] - Cell values as read from a workbook (formulas as their cached result)
//! - [`CellAddress`] and [`CellRange`] - A1 addressing and ranges
//! - [`NumberFormat`] - Text/date classification of cell formats
//! - [`DataValidation`] - Dropdown list rules
//!
//! ## Example
//!
//! ```rust
//! use roadmap_core::{CellAddress, CellValue};
//!
//! let addr = CellAddress::parse("B1").unwrap();
//! assert_eq!((addr.row, addr.col), (0, 1));
//! assert_eq!(CellValue::Number(3.0).display_text(), "3");
//! ```

pub mod cell;
pub mod error;
pub mod number_format;
pub mod validation;

// Re-exports for convenience
pub use cell::{format_number, CellAddress, CellRange, CellValue};
pub use error::{Error, Result};
pub use number_format::{excel_serial_to_datetime, NumberFormat};
pub use validation::{DataValidation, ValidationType};
