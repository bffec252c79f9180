//! # roadmap-xlsx
//!
//! XLSX (Office Open XML) patching for the roadmap crates.
//!
//! A workbook is opened as its zip package, single sheets are decoded into a
//! [`Worksheet`], changed, and written back. Parts that were not rewritten are
//! saved byte-for-byte, so templates keep their drawings, defined names and
//! anything else this crate does not model.
//!
//! ## Example
//!
//! ```rust
//! use roadmap_xlsx::XlsxWorkbook;
//!
//! let mut workbook = XlsxWorkbook::blank(&["POINTAGE", "LC"]).unwrap();
//! let mut sheet = workbook.worksheet("POINTAGE").unwrap();
//! sheet.set_value(0, 1, "Dana Lee");
//! workbook.put_worksheet(&sheet).unwrap();
//!
//! let bytes = workbook.to_bytes().unwrap();
//! let reopened = XlsxWorkbook::from_bytes(&bytes).unwrap();
//! assert_eq!(
//!     reopened.worksheet("POINTAGE").unwrap().value_at("B1").unwrap().display_text(),
//!     "Dana Lee"
//! );
//! ```

pub mod error;
pub mod package;
pub mod workbook;
pub mod worksheet;

mod styles;
mod xml;

pub use error::{XlsxError, XlsxResult};
pub use package::Package;
pub use workbook::XlsxWorkbook;
pub use worksheet::Worksheet;
