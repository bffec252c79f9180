//! Bounded retry for operations that fail while a file is held elsewhere

use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

/// How many times to try, and how long to wait between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one (at least 1)
    pub max_attempts: u32,
    /// Fixed pause between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    /// Create a policy
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Policy for recursive directory removal (5 attempts, 2 s apart)
    pub const fn tree_removal() -> Self {
        Self::new(5, Duration::from_secs(2))
    }

    /// Policy for removing private working copies (5 attempts, 200 ms apart)
    pub const fn temp_cleanup() -> Self {
        Self::new(5, Duration::from_millis(200))
    }

    /// Single attempt, no wait
    pub const fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::tree_removal()
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy is exhausted
///
/// `on_retry` is told about each failed attempt that will be retried, with
/// the 1-based attempt number.
pub fn retry<T, E, F, R, N>(
    policy: RetryPolicy,
    is_retryable: R,
    mut on_retry: N,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    R: Fn(&E) -> bool,
    N: FnMut(u32, &E),
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts && is_retryable(&err) => {
                on_retry(attempt, &err);
                if !policy.delay.is_zero() {
                    thread::sleep(policy.delay);
                }
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Remove a directory tree, retrying while files are locked
///
/// Read-only entries are made writable before each retry. A path that does
/// not exist counts as removed. Returns whether the tree is gone.
pub fn rmtree_with_retry(path: &Path, policy: RetryPolicy) -> bool {
    let attempts = policy.max_attempts.max(1);
    let result = retry(
        policy,
        |e: &io::Error| e.kind() == io::ErrorKind::PermissionDenied,
        |attempt, e| {
            log::warn!(
                "[RMTREE] Attempt {}/{} failed: {}. Retrying in {:?}...",
                attempt,
                attempts,
                e,
                policy.delay
            );
            make_writable(path);
        },
        || match std::fs::remove_dir_all(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        },
    );

    match result {
        Ok(()) => true,
        Err(e) => {
            log::error!(
                "[RMTREE] Failed to remove folder {} after {} attempts: {}",
                path.display(),
                attempts,
                e
            );
            false
        }
    }
}

/// Clear the read-only flag on every entry under `path`
fn make_writable(path: &Path) {
    fn visit(path: &Path) {
        if let Ok(metadata) = std::fs::symlink_metadata(path) {
            let mut permissions = metadata.permissions();
            if permissions.readonly() {
                #[allow(clippy::permissions_set_readonly_false)]
                permissions.set_readonly(false);
                let _ = std::fs::set_permissions(path, permissions);
            }
            if metadata.is_dir() {
                if let Ok(entries) = std::fs::read_dir(path) {
                    for entry in entries.flatten() {
                        visit(&entry.path());
                    }
                }
            }
        }
    }
    visit(path);
}
