use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::fleet_core::fsutil;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkerStatus {
    Starting,
    Idle,
    Busy,
    Paused,
    Offline,
}

/// Liveness beacon owned exclusively by its worker and replaced in full on
/// every emission.
///
/// `role` stays a plain string on the wire: peers running newer builds may
/// report roles this build does not know, and an unknown role must not make
/// the whole heartbeat unreadable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub worker_id: String,
    pub timestamp: i64,
    pub status: WorkerStatus,
    pub role: String,
    pub current_job: Option<String>,
}

impl Heartbeat {
    /// Loads a peer heartbeat; malformed records and records without a
    /// worker id are treated as absent.
    pub fn load(path: &Path) -> Option<Self> {
        let beat: Heartbeat = fsutil::read_json_opt(path)?;
        if beat.worker_id.is_empty() {
            return None;
        }
        Some(beat)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fsutil::write_json_file(path, self)
    }

    pub fn age(&self, now: i64) -> i64 {
        now - self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_uppercase() {
        let beat = Heartbeat {
            worker_id: "worker001".into(),
            timestamp: 1_700_000_000,
            status: WorkerStatus::Busy,
            role: "img_lead".into(),
            current_job: Some("background_job_0.txt".into()),
        };
        let json = serde_json::to_string(&beat).expect("serialize");
        assert!(json.contains("\"BUSY\""));
        assert!(json.contains("\"img_lead\""));
    }

    #[test]
    fn load_rejects_missing_worker_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("w.json");
        std::fs::write(
            &path,
            r#"{"worker_id":"","timestamp":1,"status":"IDLE","role":"img_worker","current_job":null}"#,
        )
        .expect("write");
        assert!(Heartbeat::load(&path).is_none());
    }

    #[test]
    fn load_round_trips_via_atomic_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("w.json");
        let beat = Heartbeat {
            worker_id: "worker002".into(),
            timestamp: 42,
            status: WorkerStatus::Idle,
            role: "vid_worker".into(),
            current_job: None,
        };
        beat.write(&path).expect("write");
        let loaded = Heartbeat::load(&path).expect("load");
        assert_eq!(loaded.worker_id, "worker002");
        assert_eq!(loaded.status, WorkerStatus::Idle);
        assert_eq!(loaded.age(100), 58);
    }
}
