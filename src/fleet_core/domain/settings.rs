use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::fleet_core::fsutil;

/// Fleet-wide knobs edited by the submission GUI: scheduling weights and the
/// global pause switch. Re-read by every worker on each tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSettings {
    #[serde(default = "default_weights")]
    pub weights: BTreeMap<String, u64>,
    #[serde(default)]
    pub paused: bool,
}

fn default_weights() -> BTreeMap<String, u64> {
    let mut weights = BTreeMap::new();
    weights.insert("default".to_string(), 10);
    weights
}

impl Default for FleetSettings {
    fn default() -> Self {
        Self {
            weights: default_weights(),
            paused: false,
        }
    }
}

impl FleetSettings {
    pub fn load(path: &Path) -> Option<Self> {
        fsutil::read_json_opt(path)
    }

    /// Writes the initial settings file when the shared tree has none yet,
    /// so GUI and workers agree on a starting point.
    pub fn seed_if_missing(&self, path: &Path) -> Result<()> {
        if path.exists() {
            return Ok(());
        }
        fsutil::write_json_file(path, self)
    }

    /// Weights with the guaranteed `default` bucket; a missing key is
    /// supplied as 1.
    pub fn effective_weights(&self) -> BTreeMap<String, u64> {
        let mut weights = self.weights.clone();
        weights.entry("default".to_string()).or_insert(1);
        weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_default_key_is_supplied_as_one() {
        let settings: FleetSettings =
            serde_json::from_str(r#"{"weights":{"background":6},"paused":false}"#).expect("parse");
        let weights = settings.effective_weights();
        assert_eq!(weights.get("default"), Some(&1));
        assert_eq!(weights.get("background"), Some(&6));
    }

    #[test]
    fn seed_if_missing_does_not_clobber() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"weights":{"default":3},"paused":true}"#).expect("write");

        FleetSettings::default().seed_if_missing(&path).expect("seed");
        let loaded = FleetSettings::load(&path).expect("load");
        assert!(loaded.paused);
        assert_eq!(loaded.weights.get("default"), Some(&3));
    }

    #[test]
    fn absent_fields_fall_back_to_defaults() {
        let settings: FleetSettings = serde_json::from_str("{}").expect("parse");
        assert!(!settings.paused);
        assert_eq!(settings.weights.get("default"), Some(&10));
    }
}
