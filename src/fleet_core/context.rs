use std::collections::BTreeMap;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::fleet_core::config::WorkerConfig;
use crate::fleet_core::domain::{FleetSettings, Heartbeat, WorkerRole, WorkerStatus};
use crate::fleet_core::fsutil;
use crate::fleet_core::paths::FleetPaths;
use crate::sync_ext::{CondvarExt, MutexExt};

#[derive(Debug)]
struct RuntimeState {
    role: WorkerRole,
    paused: bool,
    fleet_paused: bool,
    weights: BTreeMap<String, u64>,
    status: WorkerStatus,
    stop_requested: bool,
}

/// Shared state for one worker process.
///
/// Immutable configuration and resolved paths are plain fields; everything
/// a command or settings reload can mutate at runtime sits behind one mutex.
/// All threads (executor, dispatcher, command watcher) hold an `Arc` to this.
#[derive(Debug)]
pub struct WorkerContext {
    pub config: WorkerConfig,
    pub paths: FleetPaths,
    state: Mutex<RuntimeState>,
    stop_cv: Condvar,
}

impl WorkerContext {
    pub fn new(config: WorkerConfig) -> Self {
        let paths = FleetPaths::new(config.fleet_root.clone());
        let state = RuntimeState {
            role: config.initial_role,
            paused: config.paused,
            fleet_paused: false,
            weights: FleetSettings::default().effective_weights(),
            status: WorkerStatus::Starting,
            stop_requested: false,
        };
        Self {
            config,
            paths,
            state: Mutex::new(state),
            stop_cv: Condvar::new(),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.config.worker_id
    }

    pub fn role(&self) -> WorkerRole {
        self.state.lock_unpoisoned().role
    }

    pub fn set_role(&self, role: WorkerRole) {
        self.state.lock_unpoisoned().role = role;
        self.config.persist_overlay(
            "initial_role",
            serde_json::Value::String(role.as_str().to_string()),
        );
        log::info!("role changed: now acting as {}", role.as_str());
    }

    pub fn set_paused(&self, paused: bool) {
        self.state.lock_unpoisoned().paused = paused;
        self.config
            .persist_overlay("paused", serde_json::Value::Bool(paused));
        log::info!("{} work", if paused { "paused" } else { "resumed" });
    }

    /// Local pause OR-ed with the fleet-wide switch.
    pub fn is_paused(&self) -> bool {
        let state = self.state.lock_unpoisoned();
        state.paused || state.fleet_paused
    }

    pub fn weights(&self) -> BTreeMap<String, u64> {
        self.state.lock_unpoisoned().weights.clone()
    }

    /// Picks up weight and pause changes from `_system/settings.json`.
    /// A missing or unreadable file leaves the current values in place.
    pub fn reload_fleet_settings(&self) {
        let Some(settings) = FleetSettings::load(&self.paths.settings_file()) else {
            return;
        };
        let mut state = self.state.lock_unpoisoned();
        state.weights = settings.effective_weights();
        state.fleet_paused = settings.paused;
    }

    pub fn local_status(&self) -> WorkerStatus {
        self.state.lock_unpoisoned().status
    }

    /// Writes this worker's heartbeat and remembers the reported status.
    /// Emission is best-effort: sync-layer contention shows up as transient
    /// write failures and the next beat will replace the file anyway.
    pub fn emit_heartbeat(&self, status: WorkerStatus, current_job: Option<&str>) {
        let role = {
            let mut state = self.state.lock_unpoisoned();
            state.status = status;
            state.role
        };
        let beat = Heartbeat {
            worker_id: self.config.worker_id.clone(),
            timestamp: fsutil::now_epoch(),
            status,
            role: role.as_str().to_string(),
            current_job: current_job.map(str::to_string),
        };
        let path = self.paths.heartbeat_file(&self.config.worker_id);
        if let Err(err) = beat.write(&path) {
            log::warn!("failed to write heartbeat {}: {err:#}", path.display());
        }
    }

    pub fn request_stop(&self) {
        self.state.lock_unpoisoned().stop_requested = true;
        self.stop_cv.notify_all();
    }

    pub fn stop_requested(&self) -> bool {
        self.state.lock_unpoisoned().stop_requested
    }

    /// Sleeps up to `dur`, waking early when a stop arrives. Returns true
    /// when the worker should shut down.
    pub fn sleep_interruptible(&self, dur: Duration) -> bool {
        let mut state = self.state.lock_unpoisoned();
        let mut remaining = dur;
        loop {
            if state.stop_requested {
                return true;
            }
            if remaining.is_zero() {
                return false;
            }
            let start = std::time::Instant::now();
            let (guard, timeout) = self.stop_cv.wait_timeout_unpoisoned(state, remaining);
            state = guard;
            if timeout.timed_out() {
                return state.stop_requested;
            }
            remaining = remaining.saturating_sub(start.elapsed());
        }
    }
}
