use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fleet_core::domain::WorkerRole;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("config has an empty `worker_id`")]
    MissingWorkerId,
    #[error("config is missing the required `scripts` table")]
    MissingScripts,
}

/// Sleep intervals and renderer deadlines. Config-tunable so tests can
/// shrink them; the defaults are the fleet's nominal values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct TimingConfig {
    pub dispatch_interval_secs: u64,
    pub idle_sleep_secs: u64,
    pub pause_sleep_secs: u64,
    pub watchdog_poll_secs: u64,
    pub inter_output_timeout_secs: u64,
    pub image_timeout_secs: u64,
    pub video_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            dispatch_interval_secs: 15,
            idle_sleep_secs: 5,
            pause_sleep_secs: 2,
            watchdog_poll_secs: 10,
            inter_output_timeout_secs: 5 * 60,
            image_timeout_secs: 30 * 60,
            video_timeout_secs: 45 * 60,
        }
    }
}

impl TimingConfig {
    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_secs(self.dispatch_interval_secs)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_secs(self.idle_sleep_secs)
    }

    pub fn pause_sleep(&self) -> Duration {
        Duration::from_secs(self.pause_sleep_secs)
    }

    pub fn watchdog_poll(&self) -> Duration {
        Duration::from_secs(self.watchdog_poll_secs)
    }

    pub fn inter_output_timeout(&self) -> Duration {
        Duration::from_secs(self.inter_output_timeout_secs)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_secs)
    }

    pub fn video_timeout(&self) -> Duration {
        Duration::from_secs(self.video_timeout_secs)
    }
}

/// Merged worker configuration: the shared base `config.json` overlaid with
/// the host-local `local_config.json`, which persists runtime mutations
/// (role changes, pause state) across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub initial_role: WorkerRole,
    /// Root of the synchronized fleet tree. `~` expands to the home
    /// directory.
    pub fleet_root: String,
    /// Renderer script identifiers to script paths. `img_gen` and `vid_gen`
    /// are the entry points the executor uses; `refresh` names the
    /// environment refresh script.
    pub scripts: BTreeMap<String, String>,
    pub landing_zone: String,
    pub staging_area: String,
    /// Launcher binary for renderer scripts.
    pub renderer_bin: String,
    /// X display handed to the renderer subprocess.
    pub display: Option<String>,
    pub paused: bool,
    pub timing: TimingConfig,
    /// Where the local overlay persists; absent for hand-built test configs.
    #[serde(skip)]
    pub local_overlay: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: String::new(),
            initial_role: WorkerRole::ImgWorker,
            fleet_root: "~/RenderFleet".to_string(),
            scripts: BTreeMap::new(),
            landing_zone: "_system/landing_zone".to_string(),
            staging_area: "_system/staging_area".to_string(),
            renderer_bin: "actexec".to_string(),
            display: None,
            paused: false,
            timing: TimingConfig::default(),
            local_overlay: None,
        }
    }
}

const DEFAULT_VID_GEN_SCRIPT: &str = "_system/scripts/RunwayVideo.ascr";

impl WorkerConfig {
    /// Loads the base config, overlays `local_config.json` from the same
    /// directory (seeding it on first run), validates, and expands the
    /// fleet root. This is the only fatal path in the whole worker: a
    /// process without a usable config cannot participate in the fleet.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base_path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path(),
        };
        let mut merged = read_json_value(&base_path)?;

        let overlay_path = base_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("local_config.json");
        match read_json_value(&overlay_path) {
            Ok(overlay) => merge_objects(&mut merged, overlay),
            Err(ConfigError::Io { .. }) => seed_overlay(&overlay_path, &merged),
            // A corrupt overlay is ignored rather than fatal; the base
            // config still describes a runnable worker.
            Err(ConfigError::Parse { .. }) => {
                log::warn!("ignoring malformed overlay {}", overlay_path.display());
            }
            Err(other) => return Err(other),
        }

        let mut config: WorkerConfig =
            serde_json::from_value(merged).map_err(|source| ConfigError::Parse {
                path: base_path.clone(),
                source,
            })?;
        config.local_overlay = Some(overlay_path);

        if config.worker_id.is_empty() {
            return Err(ConfigError::MissingWorkerId);
        }
        if config.scripts.is_empty() {
            return Err(ConfigError::MissingScripts);
        }
        config
            .scripts
            .entry("vid_gen".to_string())
            .or_insert_with(|| DEFAULT_VID_GEN_SCRIPT.to_string());

        if let Ok(display) = std::env::var("DISPLAY")
            && !display.is_empty()
        {
            config.display = Some(display.clone());
            config.persist_overlay("display", serde_json::Value::String(display));
        }

        config.fleet_root = expand_tilde(&config.fleet_root);
        Ok(config)
    }

    /// Resolves a script key to its configured path; unknown keys pass
    /// through as literal paths.
    pub fn script_path(&self, key: &str) -> String {
        self.scripts
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    /// Persists one key into the local overlay so the change survives a
    /// restart. Best-effort: a read-only disk must not take the worker down.
    pub fn persist_overlay(&self, key: &str, value: serde_json::Value) {
        let Some(path) = self.local_overlay.as_deref() else {
            return;
        };
        let mut overlay = read_json_value(path).unwrap_or(serde_json::Value::Object(
            serde_json::Map::new(),
        ));
        if let Some(map) = overlay.as_object_mut() {
            map.insert(key.to_string(), value);
        }
        if let Err(err) = crate::fleet_core::fsutil::write_json_file(path, &overlay) {
            log::warn!("failed to persist local overlay {}: {err:#}", path.display());
        }
    }
}

fn default_config_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config.json")
}

fn read_json_value(path: &Path) -> Result<serde_json::Value, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn merge_objects(base: &mut serde_json::Value, overlay: serde_json::Value) {
    if let (Some(base_map), serde_json::Value::Object(overlay_map)) =
        (base.as_object_mut(), overlay)
    {
        for (key, value) in overlay_map {
            base_map.insert(key, value);
        }
    }
}

/// First run on a host: remember identity so later role changes have a file
/// to land in.
fn seed_overlay(path: &Path, merged: &serde_json::Value) {
    let mut seed = serde_json::Map::new();
    for key in ["worker_id", "initial_role"] {
        if let Some(value) = merged.get(key) {
            seed.insert(key.to_string(), value.clone());
        }
    }
    if let Err(err) =
        crate::fleet_core::fsutil::write_json_file(path, &serde_json::Value::Object(seed))
    {
        log::warn!("failed to seed local overlay {}: {err:#}", path.display());
    }
}

fn expand_tilde(path: &str) -> String {
    #[allow(deprecated)]
    fn home() -> Option<PathBuf> {
        std::env::home_dir()
    }
    if path == "~" {
        if let Some(home) = home() {
            return home.display().to_string();
        }
    } else if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = home()
    {
        return home.join(rest).display().to_string();
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_base(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("config.json");
        std::fs::write(&path, body).expect("write config");
        path
    }

    #[test]
    fn overlay_wins_over_base() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = write_base(
            dir.path(),
            r#"{"worker_id":"worker001","initial_role":"img_worker","fleet_root":"/srv/fleet","scripts":{"img_gen":"img.ascr"}}"#,
        );
        std::fs::write(
            dir.path().join("local_config.json"),
            r#"{"initial_role":"img_lead"}"#,
        )
        .expect("write overlay");

        let config = WorkerConfig::load(Some(&base)).expect("load");
        assert_eq!(config.initial_role, WorkerRole::ImgLead);
        assert_eq!(config.worker_id, "worker001");
        assert_eq!(config.script_path("vid_gen"), DEFAULT_VID_GEN_SCRIPT);
    }

    #[test]
    fn first_load_seeds_overlay_with_identity() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = write_base(
            dir.path(),
            r#"{"worker_id":"worker002","initial_role":"vid_worker","fleet_root":"/srv/fleet","scripts":{"vid_gen":"vid.ascr"}}"#,
        );

        let _ = WorkerConfig::load(Some(&base)).expect("load");
        let overlay: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("local_config.json")).expect("read"))
                .expect("parse");
        assert_eq!(overlay["worker_id"], "worker002");
        assert_eq!(overlay["initial_role"], "vid_worker");
    }

    #[test]
    fn missing_scripts_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = write_base(
            dir.path(),
            r#"{"worker_id":"worker003","initial_role":"img_worker","fleet_root":"/srv/fleet"}"#,
        );
        let err = WorkerConfig::load(Some(&base)).expect_err("must fail");
        assert!(matches!(err, ConfigError::MissingScripts));
    }

    #[test]
    fn persist_overlay_round_trips_pause_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = write_base(
            dir.path(),
            r#"{"worker_id":"worker004","initial_role":"img_worker","fleet_root":"/srv/fleet","scripts":{"img_gen":"img.ascr"}}"#,
        );
        let config = WorkerConfig::load(Some(&base)).expect("load");
        config.persist_overlay("paused", serde_json::Value::Bool(true));

        let reloaded = WorkerConfig::load(Some(&base)).expect("reload");
        assert!(reloaded.paused);
    }
}
