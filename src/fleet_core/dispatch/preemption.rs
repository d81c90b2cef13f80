use crate::fleet_core::context::WorkerContext;
use crate::fleet_core::domain::{Command, MediaKind, WorkerStatus};
use crate::fleet_core::queue_view::QueueView;

use super::liveness::read_heartbeats;

/// Reclaims a worker for waiting VIP work.
///
/// Does nothing unless the queue holds a VIP-named entry. When it does and
/// no worker is IDLE, the last BUSY worker not already on a vip job is told
/// to yield; the dispatcher places the VIP on its next tick once the victim
/// returns its job to the queue. The victim check matches `vip` only (not
/// `urgent`) by long-standing queue convention. Returns the victim id when
/// a yield command was written.
pub fn enforce_vip_preemption(ctx: &WorkerContext, kind: MediaKind) -> Option<String> {
    let queue = QueueView::new(ctx.paths.queue_dir(kind));
    if !queue.has_vip() {
        return None;
    }

    let mut victim = None;
    for beat in read_heartbeats(&ctx.paths.heartbeats()) {
        if beat.status == WorkerStatus::Idle {
            // An idle worker will absorb the VIP without anyone yielding.
            return None;
        }
        let current = beat.current_job.as_deref().unwrap_or("");
        if beat.status == WorkerStatus::Busy && !current.to_lowercase().contains("vip") {
            victim = Some(beat.worker_id);
        }
    }

    let victim = victim?;
    let cmd_path = ctx.paths.command_file(&victim);
    if let Err(err) = Command::yield_for_vip().write(&cmd_path) {
        log::warn!("failed to write yield command for {victim}: {err:#}");
        return None;
    }
    log::info!("vip waiting: commanding worker {victim} to yield its current job");
    Some(victim)
}
