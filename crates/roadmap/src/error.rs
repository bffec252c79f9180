//! Error types for roadmap operations

use std::path::PathBuf;

use roadmap_xlsx::XlsxError;
use thiserror::Error;

/// Result type for roadmap operations
pub type RoadmapResult<T> = std::result::Result<T, RoadmapError>;

/// Errors raised while building, synchronizing, exporting or archiving
/// interface files
#[derive(Debug, Error)]
pub enum RoadmapError {
    /// Workbook could not be opened, patched or saved
    #[error("Workbook error: {0}")]
    Xlsx(#[from] XlsxError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive could not be written
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML handoff or export error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// A required sheet is missing from a workbook
    #[error("Sheet '{sheet}' not found in {}", path.display())]
    MissingSheet { sheet: String, path: PathBuf },

    /// The worker pool could not be started
    #[error("Worker pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl RoadmapError {
    /// Whether the failure means the file is locked or opened elsewhere
    pub fn is_permission_denied(&self) -> bool {
        match self {
            RoadmapError::Io(e) => e.kind() == std::io::ErrorKind::PermissionDenied,
            RoadmapError::Zip(zip::result::ZipError::Io(e)) => {
                e.kind() == std::io::ErrorKind::PermissionDenied
            }
            RoadmapError::Xlsx(e) => e.is_permission_denied(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_permission_denied_classification() {
        let locked = RoadmapError::from(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(locked.is_permission_denied());

        let nested = RoadmapError::from(XlsxError::Io(io::Error::from(
            io::ErrorKind::PermissionDenied,
        )));
        assert!(nested.is_permission_denied());

        let missing = RoadmapError::from(io::Error::from(io::ErrorKind::NotFound));
        assert!(!missing.is_permission_denied());

        let sheet = RoadmapError::MissingSheet {
            sheet: "LC".into(),
            path: PathBuf::from("RM_template.xlsx"),
        };
        assert!(!sheet.is_permission_denied());
        assert_eq!(sheet.to_string(), "Sheet 'LC' not found in RM_template.xlsx");
    }
}
