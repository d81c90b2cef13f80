use crate::fleet_core::activity::log_activity;
use crate::fleet_core::context::WorkerContext;
use crate::fleet_core::fsutil;
use crate::fleet_core::queue_view::QueueView;

use super::liveness;

/// Returns stranded jobs from dead workers' inboxes to their source queues.
///
/// A worker counts as dead when its last heartbeat is BUSY and past the
/// dead window. Files go back to the image queue, directories to the video
/// queue; a clashing name in the queue is an earlier incomplete copy and is
/// overwritten. Running this twice is harmless: the second pass finds the
/// inboxes already empty.
pub fn recover_dead_workers(ctx: &WorkerContext) -> usize {
    let mut recovered = 0;
    for worker in liveness::dead_busy_workers(&ctx.paths.heartbeats()) {
        let inbox = QueueView::new(ctx.paths.inbox(&worker));
        for job in inbox.jobs() {
            let dest = ctx.paths.queue_dir(job.kind()).join(job.name());
            match fsutil::move_entry(job.path(), &dest) {
                Ok(()) => {
                    log::info!("recovered {} from dead worker {worker}", job.name());
                    log_activity(&format!(
                        "recovered {} from dead worker {worker}",
                        job.name()
                    ));
                    recovered += 1;
                }
                Err(err) => {
                    // Possibly raced by another lead's recovery pass; the
                    // job is wherever the winner put it.
                    log::warn!(
                        "failed to recover {} from {worker}: {err}",
                        job.name()
                    );
                }
            }
        }
    }
    recovered
}
