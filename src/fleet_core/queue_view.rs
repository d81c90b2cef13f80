use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::fleet_core::domain::QueueJob;

/// Typed listing over one queue or inbox directory.
///
/// Dispatcher, executor, and recovery all categorize directory entries the
/// same way through this view: hidden names (leading `.`) are invisible,
/// files and directories are jobs, anything else is ignored.
#[derive(Debug, Clone)]
pub struct QueueView {
    dir: PathBuf,
}

impl QueueView {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All jobs, sorted by name. A missing directory reads as empty; the
    /// sync layer may not have materialized it yet.
    pub fn jobs(&self) -> Vec<QueueJob> {
        let mut names = self.visible_names();
        names.sort();
        names
            .into_iter()
            .filter_map(|name| QueueJob::from_path(&self.dir.join(name)))
            .collect()
    }

    /// Oldest job by lexicographic name, the executor's drain order.
    pub fn first_job(&self) -> Option<QueueJob> {
        self.jobs().into_iter().next()
    }

    pub fn has_vip(&self) -> bool {
        self.visible_names()
            .iter()
            .any(|name| crate::fleet_core::domain::is_vip_name(name))
    }

    /// VIP jobs ordered by modification time so concurrent VIP submissions
    /// drain oldest-first.
    pub fn vips_by_mtime(&self) -> Vec<QueueJob> {
        let mut vips: Vec<(SystemTime, QueueJob)> = self
            .jobs()
            .into_iter()
            .filter(QueueJob::is_vip)
            .map(|job| {
                let mtime = std::fs::metadata(job.path())
                    .and_then(|meta| meta.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (mtime, job)
            })
            .collect();
        vips.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.name().cmp(&b.1.name())));
        vips.into_iter().map(|(_, job)| job).collect()
    }

    /// Whether the directory holds any visible entry. Used as the dispatch
    /// gate: a non-empty inbox means a handoff is still in flight.
    pub fn is_empty(&self) -> bool {
        self.visible_names().is_empty()
    }

    fn visible_names(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| !name.starts_with('.'))
            .collect()
    }
}
