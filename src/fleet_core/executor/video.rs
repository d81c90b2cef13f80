use std::path::Path;

use anyhow::{Context, Result};
use filetime::FileTime;

use crate::fleet_core::activity::log_activity;
use crate::fleet_core::context::WorkerContext;
use crate::fleet_core::domain::{MediaKind, ProgressJournal, WorkerStatus};
use crate::fleet_core::fsutil;
use crate::fleet_core::renderer::{RenderRequest, RenderRunner};

use super::{ExecOutcome, take_yield_command};

const FRAME_EXTS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Runs a video job: each frame in the directory is staged with its sibling
/// prompt and rendered into up to two clips, journaled per frame in the job
/// directory itself.
pub(super) fn process(ctx: &WorkerContext, job_dir: &Path) -> Result<ExecOutcome> {
    let dir_name = job_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let staging_area = ctx.paths.resolve(&ctx.config.staging_area);
    std::fs::create_dir_all(&staging_area)
        .with_context(|| format!("failed to create {}", staging_area.display()))?;

    let mut journal = ProgressJournal::load(job_dir);
    let runner = RenderRunner::new(ctx);
    let mut heartbeat = || ctx.emit_heartbeat(WorkerStatus::Busy, Some(&dir_name));

    for frame_name in frame_names(job_dir) {
        if journal.contains(&frame_name) {
            continue;
        }
        let frame_path = job_dir.join(&frame_name);
        let prompt = std::fs::read_to_string(frame_path.with_extension("txt")).unwrap_or_default();

        fsutil::clear_dir_files(&staging_area);
        if let Err(err) = stage_frame(&frame_path, &staging_area.join(&frame_name)) {
            log::warn!("failed to stage frame {frame_name}: {err}");
            continue;
        }

        log::info!("generating video for frame {frame_name} of {dir_name}");
        let sub_id = format!("{frame_name}_vid");
        let outcome = runner.run(
            &RenderRequest {
                script: "vid_gen",
                prompt: &prompt,
                output_dir: job_dir,
                job_name: &sub_id,
                output_ext: ".mp4",
                max_outputs: 2,
                collect_images: false,
                global_timeout: ctx.config.timing.video_timeout(),
            },
            &mut heartbeat,
        );

        if outcome.counts_as_done() {
            if let Err(err) = journal.record(job_dir, &frame_name) {
                log::warn!("failed to journal {frame_name}: {err:#}");
            }
            log_activity(&format!("video done: {sub_id}"));
        } else {
            log_activity(&format!("video generation failed: {frame_name}"));
        }

        if take_yield_command(ctx) {
            let queue = ctx.paths.queue_dir(MediaKind::Vid);
            if let Err(err) = fsutil::move_entry(job_dir, &queue.join(&dir_name)) {
                log::warn!("failed to return {dir_name} to queue: {err}");
            }
            return Ok(ExecOutcome::Yielded);
        }
    }

    if !job_dir.exists() {
        return Ok(ExecOutcome::Vanished);
    }
    if let Err(err) = journal.mark_done(job_dir) {
        log::warn!("failed to finalize journal for {dir_name}: {err:#}");
    }
    let dest = ctx.paths.archive().join(&dir_name);
    if let Err(err) = fsutil::move_entry(job_dir, &dest) {
        log::warn!("failed to archive finished job {dir_name}: {err}");
        log_activity(&format!("error: failed to archive {dir_name}: {err}"));
    }
    Ok(ExecOutcome::Finished)
}

fn frame_names(job_dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(job_dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .flatten()
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| {
            Path::new(name).extension().is_some_and(|ext| {
                FRAME_EXTS.contains(&ext.to_string_lossy().to_lowercase().as_str())
            })
        })
        .collect();
    names.sort();
    names
}

/// Copies a frame into the staging area, carrying the mtime along so the
/// renderer sees the same ordering hints the submitter created.
fn stage_frame(src: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::copy(src, dest)?;
    if let Ok(meta) = std::fs::metadata(src) {
        let _ = filetime::set_file_mtime(dest, FileTime::from_last_modification_time(&meta));
    }
    Ok(())
}
