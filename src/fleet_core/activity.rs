use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::sync_ext::MutexExt;

/// Local activity log: one timestamped line per job-level event, appended to
/// a sidecar file next to the executable. Operators tail this file; nothing
/// in the fleet reads it back.
static ACTIVITY_LOG_PATH: Lazy<Mutex<PathBuf>> = Lazy::new(|| Mutex::new(default_log_path()));

fn default_log_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("job_activity.log")
}

pub fn log_activity(message: &str) {
    let path = ACTIVITY_LOG_PATH.lock_unpoisoned().clone();
    let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&path) {
        let _ = writeln!(file, "[{stamp}] {message}");
    }
}

/// Redirects the activity log, used by tests and by operators who keep the
/// binary on a read-only volume.
pub fn set_activity_log_path(path: impl Into<PathBuf>) {
    *ACTIVITY_LOG_PATH.lock_unpoisoned() = path.into();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_appended_with_timestamps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("activity.log");
        set_activity_log_path(&path);

        log_activity("activity-test job found: a.txt");
        log_activity("activity-test job finished: a.txt");
        set_activity_log_path(default_log_path());

        // Other tests may log concurrently while the sink is redirected;
        // only this test's marker lines are asserted on.
        let contents = std::fs::read_to_string(&path).expect("read");
        let lines: Vec<&str> = contents
            .lines()
            .filter(|line| line.contains("activity-test"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("activity-test job found: a.txt"));
    }
}
