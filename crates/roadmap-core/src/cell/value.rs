//! Cell value types

use std::fmt;

/// Represents the value stored in a cell
///
/// Formula cells are represented by their last cached result; nothing in
/// this workspace evaluates formulas.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// Empty cell (no value)
    #[default]
    Empty,

    /// Numeric value (all numbers stored as f64, including dates)
    Number(f64),

    /// String value
    Text(String),

    /// Boolean value (TRUE/FALSE)
    Boolean(bool),

    /// Error value as written in the file (#VALUE!, #REF!, etc.)
    Error(String),
}

impl CellValue {
    /// Create a new text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        CellValue::Text(s.into())
    }

    /// Check if the cell is empty
    ///
    /// A text cell holding only whitespace counts as empty, which is what the
    /// row scanners treat as a blank cell.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Text as a user sees it in a cell without a number format
    ///
    /// Integral numbers lose their fractional part (`3.0` → `"3"`), booleans
    /// render as `TRUE`/`FALSE`, empty cells as `""`.
    pub fn display_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(s) => s.clone(),
            CellValue::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Error(e) => e.clone(),
        }
    }
}

/// Shortest decimal form of a number, without a trailing `.0`
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_text())
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::text(s)
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<Option<String>> for CellValue {
    fn from(s: Option<String>) -> Self {
        s.map(CellValue::Text).unwrap_or(CellValue::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_conversions() {
        assert_eq!(CellValue::from(42), CellValue::Number(42.0));
        assert_eq!(CellValue::from(2.5), CellValue::Number(2.5));
        assert_eq!(CellValue::from(true), CellValue::Boolean(true));
        assert_eq!(CellValue::from("hello"), CellValue::text("hello"));
        assert_eq!(CellValue::from(None::<String>), CellValue::Empty);
    }

    #[test]
    fn test_display_text() {
        assert_eq!(CellValue::Number(3.0).display_text(), "3");
        assert_eq!(CellValue::Number(-12.0).display_text(), "-12");
        assert_eq!(CellValue::Number(7.5).display_text(), "7.5");
        assert_eq!(CellValue::Boolean(true).display_text(), "TRUE");
        assert_eq!(CellValue::Boolean(false).display_text(), "FALSE");
        assert_eq!(CellValue::Error("#N/A".into()).display_text(), "#N/A");
        assert_eq!(CellValue::Empty.display_text(), "");
        assert_eq!(CellValue::Number(1e20).display_text(), "100000000000000000000");
    }

    #[test]
    fn test_is_empty() {
        assert!(CellValue::Empty.is_empty());
        assert!(CellValue::text("   ").is_empty());
        assert!(!CellValue::text("x").is_empty());
        assert!(!CellValue::Number(0.0).is_empty());
        assert!(!CellValue::Boolean(false).is_empty());
    }
}
