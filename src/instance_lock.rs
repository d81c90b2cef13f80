use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use fs2::FileExt;

const LOCK_FILE_PREFIX: &str = "renderfleet";

/// Exclusive per-worker lock held for the lifetime of the process.
///
/// Two processes claiming the same `worker_id` on one host would fight over
/// the same heartbeat file and inbox, so startup takes an advisory lock keyed
/// by worker id and fails fast when it is already held.
#[derive(Debug)]
pub(crate) struct InstanceLock {
    _file: fs::File,
    path: PathBuf,
}

impl InstanceLock {
    pub(crate) fn acquire(worker_id: &str) -> Result<Self> {
        let path = std::env::temp_dir().join(format!("{LOCK_FILE_PREFIX}.{worker_id}.lock"));
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("failed to open instance lock {}", path.display()))?;
        file.try_lock_exclusive().with_context(|| {
            format!("another worker process already owns worker id {worker_id}")
        })?;
        let _ = writeln!(file, "{}", std::process::id());
        Ok(Self { _file: file, path })
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
