//! Logger setup: stderr plus an appended log file

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use env_logger::{Builder, Env, Target, WriteStyle};

/// Log file name inside the log directory
const LOG_FILE: &str = "roadmap.log";

/// Log directory, created on demand
const LOG_DIR: &str = ".logs";

/// Install the global logger
///
/// The level defaults to `debug` and follows `RUST_LOG` when set. Lines go to
/// stderr and are appended to `log_file`, or to the first writable
/// `.logs/roadmap.log` (next to the executable, in the working directory,
/// then in the temp directory). Returns the log file path, if one opened.
pub fn init(log_file: Option<&Path>) -> Option<PathBuf> {
    let opened = match log_file {
        Some(path) => open_log(path).map(|f| (path.to_path_buf(), f)),
        None => default_candidates()
            .into_iter()
            .find_map(|path| open_log(&path).map(|f| (path, f))),
    };
    let (path, file) = match opened {
        Some((path, file)) => (Some(path), Some(file)),
        None => (None, None),
    };

    let result = Builder::from_env(Env::default().default_filter_or("debug"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                record.level(),
                record.args()
            )
        })
        .write_style(WriteStyle::Never)
        .target(Target::Pipe(Box::new(Tee { file })))
        .try_init();
    if let Err(e) = result {
        eprintln!("Logger already installed: {}", e);
    }

    path
}

fn default_candidates() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir.join(LOG_DIR));
    }
    dirs.push(PathBuf::from(LOG_DIR));
    dirs.push(std::env::temp_dir());
    dirs.into_iter().map(|dir| dir.join(LOG_FILE)).collect()
}

fn open_log(path: &Path) -> Option<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).ok()?;
    }
    OpenOptions::new().create(true).append(true).open(path).ok()
}

/// Writes every log line to stderr and to the log file
struct Tee {
    file: Option<File>,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Some(file) = self.file.as_mut() {
            // File errors never fail a log line
            let _ = file.write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}
