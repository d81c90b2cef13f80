use std::path::{Path, PathBuf};

use crate::fleet_core::domain::MediaKind;

pub const JOB_FACTORY_DIR: &str = "01_job_factory";
pub const ACTIVE_FLOOR_DIR: &str = "02_active_floor";
pub const REVIEW_ROOM_DIR: &str = "03_review_room";
pub const ARCHIVE_DIR: &str = "04_archive";
pub const SYSTEM_DIR: &str = "_system";

/// Resolved view of the shared fleet tree.
///
/// Every coordination artifact lives under one synchronized root; components
/// never join path segments themselves so the layout stays in one place.
#[derive(Debug, Clone)]
pub struct FleetPaths {
    root: PathBuf,
}

impl FleetPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a configured subpath against the fleet root. Absolute paths
    /// pass through untouched so operators can relocate individual areas.
    pub fn resolve(&self, sub: impl AsRef<Path>) -> PathBuf {
        let sub = sub.as_ref();
        if sub.is_absolute() {
            sub.to_path_buf()
        } else {
            self.root.join(sub)
        }
    }

    pub fn queue_dir(&self, kind: MediaKind) -> PathBuf {
        self.root.join(JOB_FACTORY_DIR).join(kind.queue_dir_name())
    }

    pub fn active_floor(&self) -> PathBuf {
        self.root.join(ACTIVE_FLOOR_DIR)
    }

    pub fn inbox(&self, worker_id: &str) -> PathBuf {
        self.active_floor().join(worker_id).join("inbox")
    }

    pub fn review_room(&self) -> PathBuf {
        self.root.join(REVIEW_ROOM_DIR)
    }

    pub fn review_ready(&self) -> PathBuf {
        self.review_room().join("_ready")
    }

    pub fn archive(&self) -> PathBuf {
        self.root.join(ARCHIVE_DIR)
    }

    pub fn heartbeats(&self) -> PathBuf {
        self.root.join(SYSTEM_DIR).join("heartbeats")
    }

    pub fn heartbeat_file(&self, worker_id: &str) -> PathBuf {
        self.heartbeats().join(format!("{worker_id}.json"))
    }

    pub fn commands(&self) -> PathBuf {
        self.root.join(SYSTEM_DIR).join("commands")
    }

    pub fn command_file(&self, worker_id: &str) -> PathBuf {
        self.commands().join(format!("{worker_id}.cmd"))
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join(SYSTEM_DIR).join("settings.json")
    }

    pub fn flags(&self) -> PathBuf {
        self.root.join(SYSTEM_DIR).join("flags")
    }

    pub fn staging_prompts(&self) -> PathBuf {
        self.root.join(SYSTEM_DIR).join("staging_prompts")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_against_root() {
        let paths = FleetPaths::new("/srv/fleet");
        assert_eq!(
            paths.queue_dir(MediaKind::Img),
            PathBuf::from("/srv/fleet/01_job_factory/img_queue")
        );
        assert_eq!(
            paths.inbox("worker001"),
            PathBuf::from("/srv/fleet/02_active_floor/worker001/inbox")
        );
        assert_eq!(
            paths.command_file("worker001"),
            PathBuf::from("/srv/fleet/_system/commands/worker001.cmd")
        );
        assert_eq!(
            paths.resolve("_system/landing_zone"),
            PathBuf::from("/srv/fleet/_system/landing_zone")
        );
    }

    #[test]
    fn absolute_subpaths_pass_through() {
        let paths = FleetPaths::new("/srv/fleet");
        assert_eq!(
            paths.resolve("/mnt/scratch/landing"),
            PathBuf::from("/mnt/scratch/landing")
        );
    }
}
