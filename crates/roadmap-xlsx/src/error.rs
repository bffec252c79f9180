//! XLSX error types

use thiserror::Error;

/// Result type for XLSX operations
pub type XlsxResult<T> = std::result::Result<T, XlsxError>;

/// Errors that can occur while opening, patching or saving a workbook
#[derive(Debug, Error)]
pub enum XlsxError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Invalid file format
    #[error("Invalid XLSX format: {0}")]
    InvalidFormat(String),

    /// Missing required part
    #[error("Missing required part: {0}")]
    MissingPart(String),

    /// No sheet with the requested name
    #[error("Worksheet '{0}' not found")]
    SheetNotFound(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] roadmap_core::Error),
}

impl XlsxError {
    /// Whether the underlying IO failure is a permission/sharing violation
    pub fn is_permission_denied(&self) -> bool {
        match self {
            XlsxError::Io(e) => e.kind() == std::io::ErrorKind::PermissionDenied,
            XlsxError::Zip(zip::result::ZipError::Io(e)) => {
                e.kind() == std::io::ErrorKind::PermissionDenied
            }
            _ => false,
        }
    }
}
