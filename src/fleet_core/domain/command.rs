use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::fleet_core::fsutil;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    SetRole,
    Pause,
    Unpause,
    Start,
    Stop,
    Yield,
}

/// One-shot control record at `_system/commands/<worker_id>.cmd`.
///
/// Last writer wins; the target worker (or for `yield`, its executor at the
/// next safe point) consumes the file by deleting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub action: CommandAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Command {
    pub fn new(action: CommandAction) -> Self {
        Self {
            action,
            value: None,
            role: None,
            reason: None,
        }
    }

    pub fn yield_for_vip() -> Self {
        Self {
            reason: Some("vip_waiting".to_string()),
            ..Self::new(CommandAction::Yield)
        }
    }

    /// The role requested by a `set_role` command; older submitters put it
    /// in `value`, newer ones in `role`.
    pub fn requested_role(&self) -> Option<&str> {
        self.role.as_deref().or(self.value.as_deref())
    }

    pub fn load(path: &Path) -> Option<Self> {
        fsutil::read_json_opt(path)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fsutil::write_json_file(path, self)
    }
}
