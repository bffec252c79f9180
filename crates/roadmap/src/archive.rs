//! Folder to zip compression

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::RoadmapResult;

/// Zip every file under `src` into `dest`
///
/// Entry names are relative to the parent of `src`, so the folder name itself
/// is the top-level entry (`RM_Collaborateurs/RM_Dana Lee.xlsx`). Returns
/// the number of files written. A partially written archive is removed.
pub fn zip_folder(src: &Path, dest: &Path) -> RoadmapResult<usize> {
    let result = write_archive(src, dest);
    if result.is_err() && dest.exists() {
        if let Err(e) = std::fs::remove_file(dest) {
            log::warn!("Could not remove partial archive {}: {}", dest.display(), e);
        }
    }
    result
}

fn write_archive(src: &Path, dest: &Path) -> RoadmapResult<usize> {
    let base = src.parent().unwrap_or(src);
    let mut files = Vec::new();
    collect_files(src, &mut files)?;
    files.sort();

    let mut zip = ZipWriter::new(BufWriter::new(File::create(dest)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in &files {
        let name = entry_name(base, path);
        zip.start_file(name, options)?;
        let mut file = File::open(path)?;
        io::copy(&mut file, &mut zip)?;
    }
    zip.finish()?;

    log::debug!("Zipped {} file(s) from {} into {}", files.len(), src.display(), dest.display());
    Ok(files.len())
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&entry.path(), out)?;
        } else if file_type.is_file() {
            out.push(entry.path());
        }
    }
    Ok(())
}

/// Archive entry name with `/` separators
fn entry_name(base: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
