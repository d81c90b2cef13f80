use std::sync::Arc;

use anyhow::{Context, Result};

use crate::fleet_core::command_channel;
use crate::fleet_core::config::WorkerConfig;
use crate::fleet_core::context::WorkerContext;
use crate::fleet_core::dispatch::{
    FleetDispatcher, enforce_vip_preemption, recover_dead_workers,
};
use crate::fleet_core::domain::{FleetSettings, WorkerStatus};
use crate::fleet_core::executor;
use crate::instance_lock::InstanceLock;

/// One fleet worker process: executor plus command channel, and on lead
/// roles a dispatcher ticking alongside.
#[derive(Debug)]
pub struct FleetWorker {
    ctx: Arc<WorkerContext>,
    _lock: InstanceLock,
}

impl FleetWorker {
    pub fn new(config: WorkerConfig) -> Result<Self> {
        let lock = InstanceLock::acquire(&config.worker_id)?;
        Ok(Self {
            ctx: Arc::new(WorkerContext::new(config)),
            _lock: lock,
        })
    }

    pub fn context(&self) -> &Arc<WorkerContext> {
        &self.ctx
    }

    pub fn run(&self) -> Result<()> {
        let ctx = &self.ctx;
        log::info!(
            "render fleet worker {} starting as {}",
            ctx.worker_id(),
            ctx.role().as_str()
        );
        self.prepare_shared_tree()?;

        // A command parked while this worker was down applies before the
        // first tick, so an operator's role change is never raced by it.
        command_channel::poll_own_command(ctx);
        ctx.reload_fleet_settings();
        ctx.emit_heartbeat(WorkerStatus::Starting, None);

        let _watcher = command_channel::spawn_watcher(ctx.clone());
        let dispatcher_ctx = ctx.clone();
        let dispatcher_handle = std::thread::Builder::new()
            .name("fleet-dispatcher".to_string())
            .spawn(move || dispatcher_loop(&dispatcher_ctx))
            .context("failed to spawn dispatcher thread")?;

        executor::run_loop(ctx);

        ctx.emit_heartbeat(WorkerStatus::Offline, None);
        ctx.request_stop();
        let _ = dispatcher_handle.join();
        log::info!("worker {} stopped", ctx.worker_id());
        Ok(())
    }

    /// Makes sure every directory this worker touches exists and the
    /// settings file is seeded, so a fresh fleet root is usable at once.
    fn prepare_shared_tree(&self) -> Result<()> {
        let paths = &self.ctx.paths;
        let config = &self.ctx.config;
        for dir in [
            paths.queue_dir(crate::fleet_core::domain::MediaKind::Img),
            paths.queue_dir(crate::fleet_core::domain::MediaKind::Vid),
            paths.inbox(self.ctx.worker_id()),
            paths.review_ready(),
            paths.archive(),
            paths.heartbeats(),
            paths.commands(),
            paths.flags(),
            paths.staging_prompts(),
            paths.resolve(&config.landing_zone),
            paths.resolve(&config.staging_area),
        ] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        if let Err(err) = FleetSettings::default().seed_if_missing(&paths.settings_file()) {
            log::warn!("failed to seed fleet settings: {err:#}");
        }
        Ok(())
    }
}

/// Lead-side loop. Every worker runs it; it only acts while the current
/// role is a lead, so a runtime `set_role` promotion takes effect on the
/// next tick without a restart.
fn dispatcher_loop(ctx: &Arc<WorkerContext>) {
    let mut dispatcher = FleetDispatcher::new();
    loop {
        if ctx.sleep_interruptible(ctx.config.timing.dispatch_interval()) {
            return;
        }
        ctx.reload_fleet_settings();
        let Some(kind) = ctx.role().lead_kind() else {
            continue;
        };
        recover_dead_workers(ctx);
        enforce_vip_preemption(ctx, kind);
        dispatcher.dispatch_smart(ctx);
    }
}
