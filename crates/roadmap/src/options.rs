//! Configuration for [`RoadmapManager`](crate::RoadmapManager)

use std::fmt;
use std::str::FromStr;

use crate::retry::RetryPolicy;

/// Where the collaborator list and the LC table are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataSource {
    /// `collabs.xml` and `LC.xlsx` handoff files, consumed once read
    #[default]
    Xml,
    /// Sheets of the master workbook (`Gestion_Interfaces` and `LC`)
    Master,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Xml => f.write_str("xml"),
            DataSource::Master => f.write_str("master"),
        }
    }
}

impl FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xml" => Ok(DataSource::Xml),
            "master" => Ok(DataSource::Master),
            other => Err(format!("unknown data source '{}' (expected xml or master)", other)),
        }
    }
}

/// Row bounds of the dropdown validations installed on POINTAGE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationLayout {
    /// First validated row (1-based)
    pub start_row: u32,
    /// Last validated row (1-based)
    pub end_row: u32,
    /// Last row of the LC source ranges (1-based)
    pub source_end_row: u32,
}

impl Default for ValidationLayout {
    fn default() -> Self {
        Self {
            start_row: 3,
            end_row: 1000,
            source_end_row: 10000,
        }
    }
}

/// Options for a [`RoadmapManager`](crate::RoadmapManager)
#[derive(Debug, Clone)]
pub struct RoadmapOptions {
    /// Worker threads for parallel interface creation (default: 8)
    pub max_workers: usize,
    /// Collaborator and LC source
    pub source: DataSource,
    /// Validation ranges written into POINTAGE
    pub layout: ValidationLayout,
    /// Retries when removing the interfaces directory
    pub rmtree_retry: RetryPolicy,
    /// Retries when removing a private working copy
    pub temp_cleanup_retry: RetryPolicy,
}

impl Default for RoadmapOptions {
    fn default() -> Self {
        Self {
            max_workers: 8,
            source: DataSource::Xml,
            layout: ValidationLayout::default(),
            rmtree_retry: RetryPolicy::tree_removal(),
            temp_cleanup_retry: RetryPolicy::temp_cleanup(),
        }
    }
}
