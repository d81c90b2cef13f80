use std::path::Path;

use anyhow::{Context, Result};

use crate::fleet_core::activity::log_activity;
use crate::fleet_core::context::WorkerContext;
use crate::fleet_core::domain::{MediaKind, ProgressJournal, WorkerStatus};
use crate::fleet_core::fsutil;
use crate::fleet_core::renderer::{RenderOutcome, RenderRequest, RenderRunner};

use super::{ExecOutcome, take_yield_command};

/// Runs an image job: one renderer invocation per non-blank prompt line,
/// journaling after each so a yield or crash resumes exactly where it left
/// off.
pub(super) fn process(ctx: &WorkerContext, job_path: &Path) -> Result<ExecOutcome> {
    let file_name = job_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let job_name = job_path
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let target_dir = ctx.paths.review_room().join(&job_name);
    std::fs::create_dir_all(&target_dir)
        .with_context(|| format!("failed to create {}", target_dir.display()))?;

    // An unreadable prompt file means zero prompts, not a crash; the job
    // still completes and moves on so it cannot wedge the inbox.
    let prompts = std::fs::read_to_string(job_path).unwrap_or_default();
    let mut journal = ProgressJournal::load(&target_dir);
    let runner = RenderRunner::new(ctx);
    let mut heartbeat = || ctx.emit_heartbeat(WorkerStatus::Busy, Some(&file_name));

    let mut prompt_index = 0usize;
    for line in prompts.lines() {
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        prompt_index += 1;
        let sub_id = format!("{job_name}_p{prompt_index}");
        if journal.contains(&sub_id) {
            continue;
        }

        log::info!("generating images for prompt {prompt_index} of {file_name}");
        let outcome = runner.run(
            &RenderRequest {
                script: "img_gen",
                prompt,
                output_dir: &target_dir,
                job_name: &sub_id,
                output_ext: ".png",
                max_outputs: 4,
                collect_images: true,
                global_timeout: ctx.config.timing.image_timeout(),
            },
            &mut heartbeat,
        );

        if outcome.counts_as_done() {
            if outcome == RenderOutcome::Skipped {
                let marker = target_dir.join(format!("{sub_id}_SKIPPED.txt"));
                let _ = std::fs::write(&marker, "Skipped after repeated sensitive flags.\n");
            }
            if let Err(err) = journal.record(&target_dir, &sub_id) {
                log::warn!("failed to journal {sub_id}: {err:#}");
            }
            log_activity(&format!("image set done: {sub_id}"));
        } else {
            // Left out of the journal on purpose: a future dispatch of
            // this job retries the prompt.
            log_activity(&format!("image set failed: {sub_id}"));
        }

        if take_yield_command(ctx) {
            let queue = ctx.paths.queue_dir(MediaKind::Img);
            if let Err(err) = fsutil::move_entry(job_path, &queue.join(&file_name)) {
                log::warn!("failed to return {file_name} to queue: {err}");
            }
            return Ok(ExecOutcome::Yielded);
        }
    }

    if !job_path.exists() {
        return Ok(ExecOutcome::Vanished);
    }
    if let Err(err) = journal.mark_done(&target_dir) {
        log::warn!("failed to finalize journal for {job_name}: {err:#}");
    }
    if let Err(err) = fsutil::move_entry(job_path, &target_dir.join(&file_name)) {
        log::warn!("failed to move finished job {file_name}: {err}");
        log_activity(&format!("error: failed to move finished job {file_name}: {err}"));
    }
    Ok(ExecOutcome::Finished)
}
