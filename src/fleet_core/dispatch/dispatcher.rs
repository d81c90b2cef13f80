use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};

use crate::fleet_core::activity::log_activity;
use crate::fleet_core::context::WorkerContext;
use crate::fleet_core::domain::{WorkerStatus, bucket_for_name};
use crate::fleet_core::fsutil;
use crate::fleet_core::queue_view::QueueView;

use super::drr::DrrScheduler;
use super::liveness;

/// Job selection and handoff, run by lead workers.
///
/// Holds one `DrrScheduler` per queue path so image and video scheduling
/// never share cursors or deficits. The scheduler map is the only stringly
/// keyed container; everything below it works on typed values.
#[derive(Debug, Default)]
pub struct FleetDispatcher {
    schedulers: HashMap<PathBuf, DrrScheduler>,
}

impl FleetDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Picks the next job from a queue: any VIP entry wins outright
    /// (oldest by mtime first), otherwise deficit round robin over the
    /// weight buckets. The job is only selected here; moving it is the
    /// caller's claim attempt.
    pub fn get_next_job(
        &mut self,
        queue_dir: &Path,
        weights: &BTreeMap<String, u64>,
    ) -> Option<PathBuf> {
        let view = QueueView::new(queue_dir);
        let jobs = view.jobs();
        if jobs.is_empty() {
            return None;
        }

        if let Some(vip) = view.vips_by_mtime().into_iter().next() {
            log::debug!("vip short-circuit selected {}", vip.name());
            return Some(vip.path().to_path_buf());
        }

        let mut buckets: BTreeMap<String, VecDeque<PathBuf>> = BTreeMap::new();
        for job in jobs {
            buckets
                .entry(bucket_for_name(&job.name(), weights))
                .or_default()
                .push_back(job.path().to_path_buf());
        }

        self.scheduler_for(queue_dir, weights).select(&mut buckets, weights)
    }

    /// One dispatch tick: select a job and hand it to the first idle
    /// worker of the matching kind whose inbox is clear. Returns the
    /// receiving worker id when a job moved.
    pub fn dispatch_smart(&mut self, ctx: &WorkerContext) -> Option<String> {
        let kind = ctx.role().lead_kind()?;
        let queue_dir = ctx.paths.queue_dir(kind);

        let self_id = ctx.worker_id();
        let mut idle = liveness::idle_workers(&ctx.paths.heartbeats(), Some(kind));
        // The lead prefers itself when it has nothing to do, so a
        // single-worker fleet still makes progress.
        if ctx.local_status() == WorkerStatus::Idle {
            idle.retain(|worker| worker != self_id);
            idle.insert(0, self_id.to_string());
        }
        if idle.is_empty() {
            return None;
        }

        let job = self.get_next_job(&queue_dir, &ctx.weights())?;
        let job_name = job
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())?;

        for worker in idle {
            let inbox = ctx.paths.inbox(&worker);
            let _ = std::fs::create_dir_all(&inbox);
            if !QueueView::new(&inbox).is_empty() {
                // A previous handoff has not been drained yet.
                continue;
            }
            return match fsutil::move_entry(&job, &inbox.join(&job_name)) {
                Ok(()) => {
                    log::info!("dispatched {job_name} to {worker}");
                    log_activity(&format!("dispatched {job_name} to {worker}"));
                    Some(worker)
                }
                Err(err) => {
                    // Another lead claimed the job first; it is theirs now.
                    log::info!("lost dispatch race for {job_name}: {err}");
                    None
                }
            };
        }
        None
    }

    fn scheduler_for(
        &mut self,
        queue_dir: &Path,
        weights: &BTreeMap<String, u64>,
    ) -> &mut DrrScheduler {
        let expected = DrrScheduler::key_order(weights);
        let entry = self
            .schedulers
            .entry(queue_dir.to_path_buf())
            .or_insert_with(|| DrrScheduler::new(weights));
        if entry.order() != expected.as_slice() {
            // Weight keys changed under us; a fresh rotation is the only
            // state that still makes sense.
            *entry = DrrScheduler::new(weights);
        }
        entry
    }
}
