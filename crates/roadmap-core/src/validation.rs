//! Data validation
//!
//! Dropdown lists are the only validation kind this workspace authors; other
//! kinds are kept as opaque entries so they survive a read/modify/write pass.
//!
//! ## Example
//!
//! ```rust
//! use roadmap_core::{CellRange, DataValidation};
//!
//! let validation = DataValidation::list("'LC'!$B$3:$B$10000")
//!     .with_range(CellRange::parse("E3:E1000").unwrap());
//!
//! assert_eq!(validation.sqref(), "E3:E1000");
//! ```

use crate::cell::CellRange;

/// Data validation rule for cells
#[derive(Debug, Clone, PartialEq)]
pub struct DataValidation {
    /// Type of validation
    pub validation_type: ValidationType,
    /// Cell ranges this validation applies to
    pub ranges: Vec<CellRange>,
    /// Allow blank/empty cells
    pub allow_blank: bool,
    /// Show the in-cell dropdown for list validation
    pub show_dropdown: bool,
    /// Show error alert when invalid data entered
    pub show_error_alert: bool,
}

impl Default for DataValidation {
    fn default() -> Self {
        Self {
            validation_type: ValidationType::Other {
                kind: "none".to_string(),
            },
            ranges: Vec::new(),
            allow_blank: true,
            show_dropdown: true,
            show_error_alert: true,
        }
    }
}

impl DataValidation {
    /// Create a list validation (dropdown)
    ///
    /// `source` is either a comma-separated list of values or a range
    /// reference such as `'LC'!$B$3:$B$10000`. A leading `=` is dropped.
    pub fn list(source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            validation_type: ValidationType::List {
                source: source.strip_prefix('=').unwrap_or(&source).to_string(),
            },
            ..Self::default()
        }
    }

    /// Create a custom formula validation
    pub fn custom(formula: impl Into<String>) -> Self {
        Self {
            validation_type: ValidationType::Custom {
                formula: formula.into(),
            },
            ..Self::default()
        }
    }

    /// Add a cell range to this validation
    pub fn with_range(mut self, range: CellRange) -> Self {
        self.ranges.push(range);
        self
    }

    /// List source, if this is a list validation
    pub fn list_source(&self) -> Option<&str> {
        match &self.validation_type {
            ValidationType::List { source } => Some(source),
            _ => None,
        }
    }

    /// Space separated `sqref` attribute value
    pub fn sqref(&self) -> String {
        self.ranges
            .iter()
            .map(|r| r.to_a1_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Types of data validation
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationType {
    /// Must be from a list
    List {
        /// Either comma-separated values or a range reference
        source: String,
    },

    /// Custom formula validation
    Custom {
        /// Formula that returns TRUE/FALSE
        formula: String,
    },

    /// Any other kind (`whole`, `date`, ...), kept by its XLSX type name
    Other {
        /// XLSX `type` attribute
        kind: String,
    },
}

impl ValidationType {
    /// Get the XLSX type string for this validation type
    pub fn xlsx_type(&self) -> &str {
        match self {
            ValidationType::List { .. } => "list",
            ValidationType::Custom { .. } => "custom",
            ValidationType::Other { kind } => kind,
        }
    }
}
