mod image;
mod video;

use std::sync::Arc;

use crate::fleet_core::activity::log_activity;
use crate::fleet_core::command_channel;
use crate::fleet_core::context::WorkerContext;
use crate::fleet_core::domain::{Command, CommandAction, QueueJob, WorkerStatus};
use crate::fleet_core::queue_view::QueueView;

/// How one job left the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecOutcome {
    /// All sub-items accounted for; the job reached its terminal directory.
    Finished,
    /// A yield command arrived; the job went back to its source queue.
    Yielded,
    /// The job path disappeared mid-run; another peer owns it now.
    Vanished,
}

/// Main worker loop: drain the inbox, report liveness, honor pause and stop.
pub fn run_loop(ctx: &Arc<WorkerContext>) {
    loop {
        if ctx.stop_requested() {
            break;
        }
        command_channel::poll_own_command(ctx);
        if ctx.stop_requested() {
            break;
        }
        ctx.reload_fleet_settings();

        if ctx.is_paused() {
            ctx.emit_heartbeat(WorkerStatus::Paused, None);
            if ctx.sleep_interruptible(ctx.config.timing.pause_sleep()) {
                break;
            }
            continue;
        }

        if process_next_job(ctx) {
            continue;
        }
        ctx.emit_heartbeat(WorkerStatus::Idle, None);
        if ctx.sleep_interruptible(ctx.config.timing.idle_sleep()) {
            break;
        }
    }
}

/// Processes the oldest inbox entry. Returns false when the inbox is empty
/// or the attempt should be retried on a later tick.
pub fn process_next_job(ctx: &WorkerContext) -> bool {
    let inbox = QueueView::new(ctx.paths.inbox(ctx.worker_id()));
    let Some(job) = inbox.first_job() else {
        return false;
    };
    let name = job.name();
    log::info!("job found: {name}");
    log_activity(&format!("job found: {name}"));
    ctx.emit_heartbeat(WorkerStatus::Busy, Some(&name));

    let result = match &job {
        QueueJob::Image(path) => {
            if path.extension().is_some_and(|ext| ext == "txt") {
                image::process(ctx, path)
            } else {
                // Not a prompt file; park it in the review room so the
                // inbox keeps draining and an operator can look at it.
                log::warn!("unsupported inbox file {name}, moving to review room");
                let dest = ctx.paths.review_room().join(&name);
                crate::fleet_core::fsutil::move_entry(path, &dest)
                    .map(|()| ExecOutcome::Finished)
                    .map_err(Into::into)
            }
        }
        QueueJob::Video(path) => video::process(ctx, path),
    };

    match result {
        Ok(ExecOutcome::Finished) => {
            log::info!("job finished: {name}");
            log_activity(&format!("job finished: {name}"));
            true
        }
        Ok(ExecOutcome::Yielded) => {
            log::info!("job yielded back to queue: {name}");
            log_activity(&format!("job yielded back to queue: {name}"));
            true
        }
        Ok(ExecOutcome::Vanished) => {
            log::warn!("job disappeared mid-run (claimed by a peer): {name}");
            false
        }
        Err(err) => {
            log::warn!("job {name} hit an error, will retry next tick: {err:#}");
            log_activity(&format!("error while processing {name}: {err:#}"));
            false
        }
    }
}

/// Consumes a pending yield command for this worker. Non-yield commands are
/// left in place for the command channel.
pub(crate) fn take_yield_command(ctx: &WorkerContext) -> bool {
    let path = ctx.paths.command_file(ctx.worker_id());
    let Some(cmd) = Command::load(&path) else {
        return false;
    };
    if cmd.action != CommandAction::Yield {
        return false;
    }
    let _ = std::fs::remove_file(&path);
    true
}
