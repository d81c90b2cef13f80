use std::path::Path;

use crate::fleet_core::domain::{Heartbeat, MediaKind, WorkerStatus};

/// A heartbeat at most this old still counts as a live, schedulable worker.
pub const IDLE_WINDOW_SECS: i64 = 90;
/// A BUSY heartbeat older than this marks its worker dead for recovery.
pub const DEAD_AFTER_SECS: i64 = 180;

/// Reads every parseable heartbeat in the directory, sorted by file name so
/// iteration order is stable across peers. Malformed files are skipped and
/// a missing directory reads as no workers at all.
pub(crate) fn read_heartbeats(heartbeat_dir: &Path) -> Vec<Heartbeat> {
    let Ok(entries) = std::fs::read_dir(heartbeat_dir) else {
        return Vec::new();
    };
    let mut files: Vec<_> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    files.iter().filter_map(|path| Heartbeat::load(path)).collect()
}

/// Workers whose latest heartbeat is fresh and IDLE, optionally restricted
/// to the roles serving one media kind.
pub fn idle_workers(heartbeat_dir: &Path, kind: Option<MediaKind>) -> Vec<String> {
    let now = crate::fleet_core::fsutil::now_epoch();
    read_heartbeats(heartbeat_dir)
        .into_iter()
        .filter(|beat| beat.age(now) <= IDLE_WINDOW_SECS && beat.status == WorkerStatus::Idle)
        .filter(|beat| match kind {
            Some(kind) => kind.worker_roles().contains(&beat.role.as_str()),
            None => true,
        })
        .map(|beat| beat.worker_id)
        .collect()
}

/// Workers that went silent mid-job: last report BUSY, heartbeat past the
/// dead window. Their inboxes are fair game for recovery.
pub fn dead_busy_workers(heartbeat_dir: &Path) -> Vec<String> {
    let now = crate::fleet_core::fsutil::now_epoch();
    read_heartbeats(heartbeat_dir)
        .into_iter()
        .filter(|beat| beat.age(now) > DEAD_AFTER_SECS && beat.status == WorkerStatus::Busy)
        .map(|beat| beat.worker_id)
        .collect()
}
