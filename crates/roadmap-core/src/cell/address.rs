//! Cell address and range types

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Worksheet row limit
const MAX_ROWS: u32 = 1_048_576;

/// Worksheet column limit
const MAX_COLS: u16 = 16_384;

/// A cell address (e.g., "B1", "$A$2")
///
/// Rows and columns are 0-based internally and 1-based / lettered in A1
/// notation. The `$` markers are kept so range formulas can be written back
/// exactly as they are referenced in validation sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    /// Row index (0-based)
    pub row: u32,
    /// Column index (0-based, A=0)
    pub col: u16,
    /// Whether the row reference is absolute ($)
    pub row_absolute: bool,
    /// Whether the column reference is absolute ($)
    pub col_absolute: bool,
}

impl CellAddress {
    /// Create a relative cell address
    pub fn new(row: u32, col: u16) -> Self {
        Self {
            row,
            col,
            row_absolute: false,
            col_absolute: false,
        }
    }

    /// Create an absolute cell address ($A$1 style)
    pub fn absolute(row: u32, col: u16) -> Self {
        Self {
            row,
            col,
            row_absolute: true,
            col_absolute: true,
        }
    }

    /// Parse a cell address from A1-style notation
    ///
    /// # Examples
    /// ```
    /// use roadmap_core::CellAddress;
    ///
    /// let addr = CellAddress::parse("B1").unwrap();
    /// assert_eq!((addr.row, addr.col), (0, 1));
    ///
    /// let addr = CellAddress::parse("$A$2").unwrap();
    /// assert!(addr.row_absolute && addr.col_absolute);
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidAddress("empty address".into()));
        }

        let bytes = s.as_bytes();
        let mut pos = 0;

        let col_absolute = bytes.first() == Some(&b'$');
        if col_absolute {
            pos += 1;
        }

        let col_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
            pos += 1;
        }
        if pos == col_start {
            return Err(Error::InvalidAddress(format!("no column letters in '{}'", s)));
        }
        let col = Self::letters_to_column(&s[col_start..pos])?;

        let row_absolute = bytes.get(pos) == Some(&b'$');
        if row_absolute {
            pos += 1;
        }

        let row_str = &s[pos..];
        if row_str.is_empty() {
            return Err(Error::InvalidAddress(format!("no row number in '{}'", s)));
        }
        let row: u32 = row_str
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("invalid row number in '{}'", s)))?;
        if row == 0 {
            return Err(Error::InvalidAddress(format!(
                "row number must be >= 1 in '{}'",
                s
            )));
        }
        if row > MAX_ROWS {
            return Err(Error::RowOutOfBounds(row - 1, MAX_ROWS - 1));
        }

        Ok(Self {
            row: row - 1,
            col,
            row_absolute,
            col_absolute,
        })
    }

    /// Convert a column index to letters (0 = A, 25 = Z, 26 = AA)
    pub fn column_to_letters(col: u16) -> String {
        let mut letters = Vec::with_capacity(3);
        let mut n = col as u32 + 1;
        while n > 0 {
            n -= 1;
            letters.push((n % 26) as u8 + b'A');
            n /= 26;
        }
        letters.reverse();
        String::from_utf8(letters).unwrap_or_default()
    }

    /// Convert column letters to an index (A = 0, Z = 25, AA = 26)
    pub fn letters_to_column(letters: &str) -> Result<u16> {
        if letters.is_empty() {
            return Err(Error::InvalidAddress("empty column letters".into()));
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            if !c.is_ascii_alphabetic() {
                return Err(Error::InvalidAddress(format!(
                    "invalid column letter '{}'",
                    c
                )));
            }
            col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
            if col > MAX_COLS as u32 {
                return Err(Error::ColumnOutOfBounds(col - 1, MAX_COLS - 1));
            }
        }

        Ok((col - 1) as u16)
    }

    /// Format as an A1-style string
    pub fn to_a1_string(&self) -> String {
        let mut out = String::with_capacity(8);
        if self.col_absolute {
            out.push('$');
        }
        out.push_str(&Self::column_to_letters(self.col));
        if self.row_absolute {
            out.push('$');
        }
        out.push_str(&(self.row + 1).to_string());
        out
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1_string())
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A rectangular range of cells (e.g., "D3:D1000")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    /// Top-left corner
    pub start: CellAddress,
    /// Bottom-right corner
    pub end: CellAddress,
}

impl CellRange {
    /// Create a range, normalizing the corners
    pub fn new(start: CellAddress, end: CellAddress) -> Self {
        let (top, bottom) = if start.row <= end.row {
            (start, end)
        } else {
            (end, start)
        };
        let (left_col, right_col) = if start.col <= end.col {
            (start.col, end.col)
        } else {
            (end.col, start.col)
        };

        Self {
            start: CellAddress {
                row: top.row,
                col: left_col,
                row_absolute: top.row_absolute,
                col_absolute: start.col_absolute,
            },
            end: CellAddress {
                row: bottom.row,
                col: right_col,
                row_absolute: bottom.row_absolute,
                col_absolute: end.col_absolute,
            },
        }
    }

    /// A single-column range spanning `first_row..=last_row` (0-based rows)
    pub fn column(col: u16, first_row: u32, last_row: u32) -> Self {
        Self::new(
            CellAddress::new(first_row, col),
            CellAddress::new(last_row, col),
        )
    }

    /// Parse a range from A1:B10 notation (a lone address is a 1x1 range)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.split_once(':') {
            Some((start, end)) => {
                let start = CellAddress::parse(start)
                    .map_err(|e| Error::InvalidRange(format!("'{}': {}", s, e)))?;
                let end = CellAddress::parse(end)
                    .map_err(|e| Error::InvalidRange(format!("'{}': {}", s, e)))?;
                Ok(Self::new(start, end))
            }
            None => {
                let addr = CellAddress::parse(s)?;
                Ok(Self {
                    start: addr,
                    end: addr,
                })
            }
        }
    }

    /// Format as `'Sheet'!$B$3:$B$10000`, the shape list validations point at
    pub fn to_sheet_reference(&self, sheet: &str) -> String {
        format!(
            "'{}'!{}:{}",
            sheet.replace('\'', "''"),
            self.start.to_a1_string(),
            self.end.to_a1_string()
        )
    }

    /// Format as A1:B10 (single cells collapse to A1)
    pub fn to_a1_string(&self) -> String {
        if self.start == self.end {
            self.start.to_a1_string()
        } else {
            format!("{}:{}", self.start.to_a1_string(), self.end.to_a1_string())
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1_string())
    }
}

impl FromStr for CellRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
