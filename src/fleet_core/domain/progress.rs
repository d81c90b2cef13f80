use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::fleet_core::fsutil;

pub const PROGRESS_FILE: &str = "progress.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    InProgress,
    Done,
}

/// Durable journal of completed sub-items for one in-flight job.
///
/// The journal is the single source of truth for resumption: after a yield,
/// a crash, or a re-dispatch, the executor replays the job and skips every
/// sub-identifier recorded here. It is rewritten atomically after each
/// completed sub-item so a partial write can never lose earlier entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressJournal {
    #[serde(default)]
    pub completed_files: Vec<String>,
    pub status: ProgressStatus,
}

impl Default for ProgressJournal {
    fn default() -> Self {
        Self {
            completed_files: Vec::new(),
            status: ProgressStatus::InProgress,
        }
    }
}

impl ProgressJournal {
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(PROGRESS_FILE)
    }

    /// Loads the journal for `dir`, starting fresh when the file is missing
    /// or unreadable (a corrupt journal only costs redone work, never a
    /// wrong skip).
    pub fn load(dir: &Path) -> Self {
        fsutil::read_json_opt(&Self::path_in(dir)).unwrap_or_default()
    }

    pub fn contains(&self, sub_id: &str) -> bool {
        self.completed_files.iter().any(|done| done == sub_id)
    }

    /// Appends a completed sub-item and persists the journal.
    pub fn record(&mut self, dir: &Path, sub_id: &str) -> Result<()> {
        self.completed_files.push(sub_id.to_string());
        self.save(dir)
    }

    pub fn mark_done(&mut self, dir: &Path) -> Result<()> {
        self.status = ProgressStatus::Done;
        self.save(dir)
    }

    fn save(&self, dir: &Path) -> Result<()> {
        fsutil::write_json_file(&Self::path_in(dir), self)
    }
}
