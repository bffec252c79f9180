//! Roadmap CLI - per-collaborator pointage workbook management

mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use roadmap::{CreateMode, DataSource, RoadmapManager, RoadmapOptions, RoadmapResult};

#[derive(Parser)]
#[command(name = "roadmap")]
#[command(
    author,
    version,
    about = "Create, update, export and archive collaborator roadmap workbooks"
)]
struct Cli {
    /// Base directory holding the master workbook and the template
    #[arg(long, global = true)]
    basedir: Option<PathBuf>,

    /// Source of the collaborator list and the LC table (xml or master)
    #[arg(long, global = true, default_value = "xml")]
    source: DataSource,

    /// Log file (default: .logs/roadmap.log next to the executable)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Commands {
    /// Create the missing collaborator interface files
    Create {
        /// Creation mode
        #[arg(long, value_enum, default_value = "normal")]
        way: Way,

        /// Worker threads for the parallel mode
        #[arg(long, default_value = "8")]
        workers: usize,

        /// Archive the current interfaces first
        #[arg(long)]
        archive: bool,
    },

    /// Zip and remove every collaborator interface file
    Delete {
        /// Also keep a copy in Archived/
        #[arg(long)]
        archive: bool,

        /// Confirm the deletion
        #[arg(long)]
        force: bool,
    },

    /// Export the POINTAGE sheets to pointage_output.xml
    Pointage {
        /// Archive and remove the interfaces after a successful export
        #[arg(long)]
        delete: bool,

        /// Export only the N-th file (1-based, in file name order)
        #[arg(long)]
        choice: Option<usize>,
    },

    /// Push the LC table into the template and every interface
    Update,

    /// Remove interfaces of collaborators no longer listed
    Cleanup,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Create { .. } => "create",
            Commands::Delete { .. } => "delete",
            Commands::Pointage { .. } => "pointage",
            Commands::Update => "update",
            Commands::Cleanup => "cleanup",
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Way {
    /// One file after the other
    Normal,
    /// Worker pool
    Para,
    /// Copy the template file, then patch each copy
    Xlw,
}

impl From<Way> for CreateMode {
    fn from(way: Way) -> Self {
        match way {
            Way::Normal => CreateMode::Sequential,
            Way::Para => CreateMode::Parallel,
            Way::Xlw => CreateMode::InPlace,
        }
    }
}

/// Operations reachable from the command line
trait Operations {
    fn create(&self, mode: CreateMode, archive: bool) -> RoadmapResult<()>;
    fn delete(&self, archive: bool) -> RoadmapResult<()>;
    fn pointage(&self, choice: Option<usize>) -> RoadmapResult<bool>;
    fn update(&self) -> RoadmapResult<()>;
    fn cleanup(&self) -> RoadmapResult<()>;
}

impl Operations for RoadmapManager {
    fn create(&self, mode: CreateMode, archive: bool) -> RoadmapResult<()> {
        RoadmapManager::create(self, mode, archive).map(|_| ())
    }

    fn delete(&self, archive: bool) -> RoadmapResult<()> {
        self.delete_and_archive_interfaces(archive)
    }

    fn pointage(&self, choice: Option<usize>) -> RoadmapResult<bool> {
        RoadmapManager::pointage(self, choice)
    }

    fn update(&self) -> RoadmapResult<()> {
        self.update_lc().map(|_| ())
    }

    fn cleanup(&self) -> RoadmapResult<()> {
        self.delete_missing_collaborators().map(|_| ())
    }
}

fn dispatch(ops: &impl Operations, command: &Commands) -> Result<()> {
    match *command {
        Commands::Create { way, archive, .. } => ops
            .create(way.into(), archive)
            .context("Failed to create interfaces")?,
        Commands::Delete { archive, force } => {
            if !force {
                log::warn!("Operation not confirmed. Use --force to proceed.");
                return Ok(());
            }
            ops.delete(archive).context("Failed to delete interfaces")?;
        }
        Commands::Pointage { delete, choice } => {
            let exported = ops.pointage(choice).context("Failed to export pointage")?;
            if delete && exported {
                ops.delete(true).context("Failed to delete interfaces")?;
            }
        }
        Commands::Update => ops.update().context("Failed to update LC")?,
        Commands::Cleanup => ops
            .cleanup()
            .context("Failed to remove missing collaborators")?,
    }
    Ok(())
}

fn options_for(cli: &Cli) -> RoadmapOptions {
    let mut options = RoadmapOptions {
        source: cli.source,
        ..RoadmapOptions::default()
    };
    if let Commands::Create { workers, .. } = cli.command {
        options.max_workers = workers;
    }
    options
}

fn run(cli: &Cli) -> Result<()> {
    let Some(basedir) = cli.basedir.as_deref() else {
        anyhow::bail!("No base directory provided");
    };
    log::info!("Base directory: {}", basedir.display());

    let manager = RoadmapManager::new(basedir, options_for(cli))
        .with_context(|| format!("Failed to prepare '{}'", basedir.display()))?;
    dispatch(&manager, &cli.command)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Some(path) = logging::init(cli.log_file.as_deref()) {
        log::debug!("Logging to {}", path.display());
    }

    if cli.basedir.is_none() {
        log::error!("No base directory provided");
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Fatal error in {}: {:#}", cli.command.name(), e);
            ExitCode::FAILURE
        }
    }
}
