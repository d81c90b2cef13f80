use std::fs;
use std::io::BufReader;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub(crate) fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Reads and deserializes a JSON file, with path context on failure.
pub(crate) fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file =
        fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .with_context(|| format!("failed to parse JSON from {}", path.display()))
}

/// Best-effort JSON read used for peer-owned records on the shared tree.
/// Missing or malformed files yield `None`; the sync layer can expose
/// half-written state at any time and readers must shrug it off.
pub(crate) fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let file = fs::File::open(path).ok()?;
    serde_json::from_reader(BufReader::new(file)).ok()
}

/// Serializes a value to a JSON file via write-then-rename so readers on the
/// sync layer never observe a torn write.
pub(crate) fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("tmp");
    let file = fs::File::create(&tmp_path)
        .with_context(|| format!("failed to create temp file {}", tmp_path.display()))?;
    if let Err(err) = serde_json::to_writer_pretty(&file, value) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err).with_context(|| format!("failed to write JSON to {}", tmp_path.display()));
    }
    drop(file);
    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "failed to rename {} -> {}",
            tmp_path.display(),
            path.display()
        )
    })
}

/// Removes plain files directly under `dir`, creating the directory when it
/// does not exist yet. Subdirectories are left alone.
pub(crate) fn clear_dir_files(dir: &Path) {
    let _ = fs::create_dir_all(dir);
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() {
            let _ = fs::remove_file(&path);
        }
    }
}

/// Moves a queue entry (file or directory) to `dest`, overwriting any stale
/// occupant first. The rename itself is the atomic claim; callers treat a
/// failure as "another peer won" rather than as corruption.
pub(crate) fn move_entry(src: &Path, dest: &Path) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    if dest.is_dir() {
        fs::remove_dir_all(dest)?;
    } else if dest.exists() {
        fs::remove_file(dest)?;
    }
    fs::rename(src, dest)
}

/// Moves a single file, falling back to copy-and-remove when rename fails
/// (landing zones may sit on a different volume than the output directory).
pub(crate) fn move_file_with_fallback(src: &Path, dest: &Path) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(src, dest)?;
            fs::remove_file(src)
        }
    }
}
