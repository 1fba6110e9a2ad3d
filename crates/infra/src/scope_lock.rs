//! Per-scope run lease using PID files
//!
//! Two sync runs for the same scope must not overlap. Each scope gets a
//! `{scope}.lock` file holding the owner's PID; a file whose owner is no
//! longer alive is treated as stale and replaced.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use storesync_domain::{Result, StoreSyncError};

/// Held lease on one sync scope; released on drop.
#[derive(Debug)]
pub struct ScopeLock {
    scope: String,
    path: PathBuf,
}

impl ScopeLock {
    /// Take the lease or fail with the current holder's PID.
    pub fn acquire<P: AsRef<Path>>(lock_dir: P, scope: &str) -> Result<Self> {
        let dir = lock_dir.as_ref();
        Self::try_acquire(dir, scope)?.ok_or_else(|| {
            let holder = read_pid(&lock_path(dir, scope))
                .map_or_else(|| "unknown".to_string(), |pid| pid.to_string());
            StoreSyncError::InvalidInput(format!(
                "sync scope '{scope}' is already running (PID: {holder})"
            ))
        })
    }

    /// Take the lease, or `None` while a live process holds it.
    pub fn try_acquire<P: AsRef<Path>>(lock_dir: P, scope: &str) -> Result<Option<Self>> {
        let dir = lock_dir.as_ref();
        fs::create_dir_all(dir)
            .map_err(|e| StoreSyncError::Internal(format!("failed to create lock dir: {e}")))?;
        let path = lock_path(dir, scope);

        // One retry: the first failure may just be a stale file.
        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let pid = std::process::id();
                    file.write_all(pid.to_string().as_bytes()).map_err(|e| {
                        StoreSyncError::Internal(format!("failed to write lock file: {e}"))
                    })?;
                    tracing::info!(scope, pid, path = %path.display(), "scope_lock.acquired");
                    return Ok(Some(Self { scope: scope.to_string(), path }));
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    if let Some(pid) = read_pid(&path) {
                        if is_process_running(pid) {
                            tracing::debug!(scope, holder = pid, "scope_lock.held");
                            return Ok(None);
                        }
                        tracing::warn!(scope, stale_pid = pid, "scope_lock.stale_lock_detected");
                    }
                    if let Err(err) = fs::remove_file(&path) {
                        tracing::warn!(error = %err, path = %path.display(), "scope_lock.remove_stale_failed");
                    }
                }
                Err(err) => {
                    return Err(StoreSyncError::Internal(format!("failed to create lock file: {err}")));
                }
            }
        }
        Ok(None)
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopeLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(error = %e, path = %self.path.display(), "scope_lock.release_failed");
        } else {
            tracing::info!(scope = %self.scope, "scope_lock.released");
        }
    }
}

fn lock_path(dir: &Path, scope: &str) -> PathBuf {
    let name: String = scope
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    dir.join(format!("{name}.lock"))
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(target_os = "linux")]
fn is_process_running(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_process_running(pid: u32) -> bool {
    use std::process::Command;

    // `kill -0` probes without delivering a signal.
    Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_process_running(pid: u32) -> bool {
    // No cheap probe; only our own PID is known to be alive.
    pid == std::process::id()
}
