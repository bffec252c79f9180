//! # roadmap
//!
//! Lifecycle of the per-collaborator pointage workbooks ("interfaces") that
//! hang off a master roadmap workbook.
//!
//! ## Features
//!
//! - Create one interface per collaborator from a template, sequentially or
//!   on a bounded worker pool
//! - Push the LC reference table into the template and every interface
//! - Export every POINTAGE sheet into one XML file for the master workbook
//! - Delete interfaces behind a zip archive, or prune the ones whose
//!   collaborator left the list
//!
//! ## Base directory layout
//!
//! ```text
//! <base>/
//!   Synthèse_RM_CE.xlsm      master workbook
//!   RM_template.xlsx         interface template
//!   collabs.xml, LC.xlsx     handoff files, consumed once read
//!   RM_Collaborateurs/       RM_<name>.xlsx interfaces
//!   Archived/, Deleted/      zip archives
//!   pointage_output.xml      export
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use roadmap::{CreateMode, RoadmapManager, RoadmapOptions};
//!
//! let manager = RoadmapManager::new("/srv/roadmap", RoadmapOptions::default())?;
//! if manager.is_ready() {
//!     let summary = manager.create(CreateMode::Sequential, false)?;
//!     println!("{} created", summary.created);
//! }
//! # Ok::<(), roadmap::RoadmapError>(())
//! ```

pub mod archive;
pub mod collaborators;
pub mod error;
pub mod export;
pub mod interface;
pub mod layout;
pub mod manager;
pub mod options;
pub mod reference;
pub mod retry;
pub mod sync;

pub use error::{RoadmapError, RoadmapResult};
pub use export::ExportRow;
pub use manager::{CreateMode, CreateSummary, RoadmapManager, UpdateSummary};
pub use options::{DataSource, RoadmapOptions, ValidationLayout};
pub use reference::{LcRow, ReferenceSnapshot};
pub use retry::RetryPolicy;
pub use sync::{FileRole, SyncOutcome};

// Re-export the workbook layer
pub use roadmap_core::{CellValue, DataValidation};
pub use roadmap_xlsx::{Worksheet, XlsxError, XlsxWorkbook};
