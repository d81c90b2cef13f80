use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use super::role::MediaKind;

static VIP_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new("(?i)(vip|urgent)").expect("vip regex must compile"));

/// True when a job name carries the priority marker.
pub fn is_vip_name(name: &str) -> bool {
    VIP_NAME.is_match(name)
}

/// Classifies a job name into a weight bucket by case-insensitive substring
/// match. When several keys match, the highest weight wins; equal weights
/// fall back to the first match in key order. Unmatched names land in
/// `default`.
pub fn bucket_for_name(name: &str, weights: &BTreeMap<String, u64>) -> String {
    let lower = name.to_lowercase();
    let mut best: Option<(&str, u64)> = None;
    for (key, &weight) in weights {
        if key == "default" {
            continue;
        }
        if lower.contains(&key.to_lowercase())
            && best.map_or(true, |(_, best_weight)| weight > best_weight)
        {
            best = Some((key, weight));
        }
    }
    best.map_or_else(|| "default".to_string(), |(key, _)| key.to_string())
}

/// A job as it appears on the shared tree: image jobs are prompt files,
/// video jobs are directories of frames with sibling prompt files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueJob {
    Image(PathBuf),
    Video(PathBuf),
}

impl QueueJob {
    /// Typed view of a queue or inbox entry. Anything that is neither a
    /// plain file nor a directory (dangling symlink, vanished entry) is not
    /// a job.
    pub fn from_path(path: &Path) -> Option<Self> {
        if path.is_dir() {
            Some(QueueJob::Video(path.to_path_buf()))
        } else if path.is_file() {
            Some(QueueJob::Image(path.to_path_buf()))
        } else {
            None
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            QueueJob::Image(path) | QueueJob::Video(path) => path,
        }
    }

    pub fn name(&self) -> String {
        self.path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            QueueJob::Image(_) => MediaKind::Img,
            QueueJob::Video(_) => MediaKind::Vid,
        }
    }

    pub fn is_vip(&self) -> bool {
        is_vip_name(&self.name())
    }
}
