mod flags;

use std::collections::{HashSet, VecDeque};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

use crate::fleet_core::context::WorkerContext;
use crate::fleet_core::fsutil;
use crate::sync_ext::MutexExt;

use flags::FlagAction;

const MAX_ATTEMPTS: u32 = 2;
const IMAGE_EXTS: [&str; 3] = ["png", "jpg", "jpeg"];
const STDERR_TAIL_LINES: usize = 200;

/// One renderer invocation: which script, what prompt, where the collected
/// takes land and under which sub-identifier.
#[derive(Debug)]
pub struct RenderRequest<'a> {
    pub script: &'a str,
    pub prompt: &'a str,
    pub output_dir: &'a Path,
    pub job_name: &'a str,
    pub output_ext: &'a str,
    pub max_outputs: usize,
    pub collect_images: bool,
    pub global_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// At least one output was collected.
    Completed,
    /// The content filter refused twice; the sub-item is done as far as the
    /// fleet is concerned, but a marker should record the skip.
    Skipped,
    Failed,
}

impl RenderOutcome {
    /// Whether the executor should journal the sub-item as completed.
    pub fn counts_as_done(self) -> bool {
        matches!(self, RenderOutcome::Completed | RenderOutcome::Skipped)
    }
}

/// Drives the black-box renderer subprocess.
///
/// The renderer is launched per sub-item, reads its prompt from the staging
/// area, and drops raw outputs into the landing zone, from where they are
/// collected, renamed, and moved into the output directory. A watchdog
/// enforces the inter-output stall limit and the global deadline.
#[derive(Debug)]
pub struct RenderRunner<'a> {
    ctx: &'a WorkerContext,
}

struct WatchdogRun {
    start_failed: bool,
    partial_success: bool,
    timed_out: bool,
    exited_cleanly: bool,
    stderr_tail: String,
}

impl<'a> RenderRunner<'a> {
    pub fn new(ctx: &'a WorkerContext) -> Self {
        Self { ctx }
    }

    pub fn run(&self, req: &RenderRequest<'_>, heartbeat: &mut dyn FnMut()) -> RenderOutcome {
        let config = &self.ctx.config;
        let landing_zone = self.ctx.paths.resolve(&config.landing_zone);
        let flags_dir = self.ctx.paths.flags();
        let script_path = self.ctx.paths.resolve(config.script_path(req.script));
        if !script_path.exists() {
            log::error!("renderer script not found: {}", script_path.display());
            return RenderOutcome::Failed;
        }

        let watch_outputs = req.collect_images || is_image_ext(req.output_ext);

        for attempt in 1..=MAX_ATTEMPTS {
            fsutil::clear_dir_files(&flags_dir);
            fsutil::clear_dir_files(&landing_zone);
            self.stage_prompt(req.prompt);

            let run =
                self.execute_with_watchdog(&script_path, &landing_zone, watch_outputs, heartbeat, req.global_timeout);
            if run.start_failed {
                return RenderOutcome::Failed;
            }
            if run.timed_out {
                log::warn!(
                    "renderer hit the global deadline for {} (attempt {attempt})",
                    req.job_name
                );
                self.run_refresh();
                if attempt < MAX_ATTEMPTS {
                    continue;
                }
                return RenderOutcome::Failed;
            }

            if !run.partial_success {
                match flags::consume_flags(&flags_dir) {
                    Some(FlagAction::RetryRefresh) => {
                        self.run_refresh();
                        if attempt < MAX_ATTEMPTS {
                            continue;
                        }
                        return RenderOutcome::Failed;
                    }
                    Some(FlagAction::RetrySensitive) => {
                        if attempt < MAX_ATTEMPTS {
                            continue;
                        }
                        log::warn!("repeated sensitive flag, skipping {}", req.job_name);
                        return RenderOutcome::Skipped;
                    }
                    Some(FlagAction::ConditionalRetry) => {
                        if !landing_has_output(&landing_zone, req) {
                            log::warn!("flag raised with no output, retrying {}", req.job_name);
                            if attempt < MAX_ATTEMPTS {
                                continue;
                            }
                            return RenderOutcome::Failed;
                        }
                        log::warn!("flag raised but output exists, accepting {}", req.job_name);
                    }
                    None => {}
                }

                if !run.exited_cleanly {
                    if !run.stderr_tail.is_empty() {
                        log::warn!("renderer stderr:\n{}", run.stderr_tail);
                    }
                    return RenderOutcome::Failed;
                }
            }

            let collected = collect_outputs(&landing_zone, req);
            if collected == 0 {
                log::warn!("renderer finished but produced no outputs for {}", req.job_name);
                return RenderOutcome::Failed;
            }
            return RenderOutcome::Completed;
        }

        RenderOutcome::Failed
    }

    fn stage_prompt(&self, prompt: &str) {
        let staging = self.ctx.paths.staging_prompts();
        let _ = std::fs::create_dir_all(&staging);
        if let Err(err) = std::fs::write(staging.join("current_prompt.txt"), prompt) {
            log::warn!("failed to stage prompt: {err}");
        }
    }

    fn execute_with_watchdog(
        &self,
        script_path: &Path,
        landing_zone: &Path,
        watch_outputs: bool,
        heartbeat: &mut dyn FnMut(),
        global_timeout: Duration,
    ) -> WatchdogRun {
        let config = &self.ctx.config;
        let mut cmd = Command::new(&config.renderer_bin);
        cmd.arg(script_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        if let Some(display) = &config.display {
            cmd.env("DISPLAY", display);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                log::error!(
                    "failed to spawn renderer {} {}: {err}",
                    config.renderer_bin,
                    script_path.display()
                );
                return WatchdogRun {
                    start_failed: true,
                    partial_success: false,
                    timed_out: false,
                    exited_cleanly: false,
                    stderr_tail: String::new(),
                };
            }
        };
        let pump = StderrPump::spawn(&mut child);

        let start = Instant::now();
        let stall_limit = config.timing.inter_output_timeout();
        let poll = config.timing.watchdog_poll();
        let mut seen: HashSet<String> = HashSet::new();
        let mut first_output: Option<Instant> = None;
        let mut last_output: Option<Instant> = None;
        let mut partial_success = false;
        let mut timed_out = false;

        loop {
            heartbeat();

            if watch_outputs {
                for name in list_image_names(landing_zone) {
                    if seen.insert(name) {
                        let now = Instant::now();
                        first_output.get_or_insert(now);
                        last_output = Some(now);
                    }
                }
                if first_output.is_some()
                    && last_output.is_some_and(|last| last.elapsed() > stall_limit)
                {
                    // Output flow dried up mid-run; keep what arrived.
                    terminate(&mut child);
                    partial_success = true;
                    break;
                }
            }

            if start.elapsed() > global_timeout {
                terminate(&mut child);
                timed_out = true;
                break;
            }

            match child.try_wait() {
                Ok(Some(_)) | Err(_) => break,
                Ok(None) => {}
            }
            std::thread::sleep(poll);
        }

        let exited_cleanly = child.wait().map(|status| status.success()).unwrap_or(false);
        WatchdogRun {
            start_failed: false,
            partial_success,
            timed_out,
            exited_cleanly,
            stderr_tail: pump.into_tail(),
        }
    }

    fn run_refresh(&self) {
        let script = self
            .ctx
            .config
            .scripts
            .get("refresh")
            .cloned()
            .unwrap_or_else(|| "_system/scripts/refresh.ascr".to_string());
        let script_path = self.ctx.paths.resolve(script);
        log::info!("running environment refresh {}", script_path.display());
        let mut cmd = Command::new(&self.ctx.config.renderer_bin);
        cmd.arg(&script_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(display) = &self.ctx.config.display {
            cmd.env("DISPLAY", display);
        }
        match cmd.spawn() {
            Ok(mut child) => {
                let _ = child.wait();
            }
            Err(err) => log::warn!("refresh script failed to start: {err}"),
        }
    }
}

fn terminate(child: &mut Child) {
    if child.try_wait().ok().flatten().is_some() {
        return;
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn is_image_ext(ext: &str) -> bool {
    let ext = ext.trim_start_matches('.').to_lowercase();
    IMAGE_EXTS.contains(&ext.as_str())
}

fn list_image_names(landing_zone: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(landing_zone) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| {
            Path::new(name)
                .extension()
                .is_some_and(|ext| is_image_ext(&ext.to_string_lossy()))
        })
        .collect()
}

fn landing_has_output(landing_zone: &Path, req: &RenderRequest<'_>) -> bool {
    !matching_outputs(landing_zone, req).is_empty()
}

fn matching_outputs(landing_zone: &Path, req: &RenderRequest<'_>) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(landing_zone) else {
        return Vec::new();
    };
    let mut files: Vec<(SystemTime, PathBuf)> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            if req.collect_images {
                path.extension()
                    .is_some_and(|ext| is_image_ext(&ext.to_string_lossy()))
            } else {
                path.to_string_lossy()
                    .to_lowercase()
                    .ends_with(&req.output_ext.to_lowercase())
            }
        })
        .map(|path| {
            let created = std::fs::metadata(&path)
                .and_then(|meta| meta.created().or_else(|_| meta.modified()))
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (created, path)
        })
        .collect();
    files.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    files.into_iter().map(|(_, path)| path).collect()
}

/// Collects renderer outputs from the landing zone by creation order,
/// renaming each to `<job_name>_take<NNN><ext>` in the output directory.
fn collect_outputs(landing_zone: &Path, req: &RenderRequest<'_>) -> usize {
    let cap = if req.collect_images {
        usize::MAX
    } else {
        req.max_outputs
    };
    let mut moved = 0usize;
    for (idx, src) in matching_outputs(landing_zone, req).into_iter().take(cap).enumerate() {
        let ext = if req.collect_images {
            src.extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default()
        } else {
            req.output_ext.to_string()
        };
        let take_name = format!("{}_take{:03}{}", req.job_name, idx + 1, ext);
        let dest = req.output_dir.join(&take_name);
        match fsutil::move_file_with_fallback(&src, &dest) {
            Ok(()) => {
                log::info!("collected {} -> {take_name}", src.display());
                moved += 1;
            }
            Err(err) => log::warn!("failed to collect {}: {err}", src.display()),
        }
    }
    moved
}

/// Drains renderer stderr on a side thread so the pipe can never fill up
/// and stall the subprocess, keeping only a bounded tail for diagnostics.
struct StderrPump {
    handle: Option<std::thread::JoinHandle<()>>,
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl StderrPump {
    fn spawn(child: &mut Child) -> Self {
        let lines: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(VecDeque::new()));
        let handle = child.stderr.take().map(|stderr| {
            let lines = lines.clone();
            std::thread::spawn(move || {
                let reader = std::io::BufReader::new(stderr);
                for line in reader.lines().map_while(Result::ok) {
                    let mut tail = lines.lock_unpoisoned();
                    if tail.len() >= STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            })
        });
        Self { handle, lines }
    }

    fn into_tail(self) -> String {
        if let Some(handle) = self.handle {
            let _ = handle.join();
        }
        let tail = self.lines.lock_unpoisoned();
        tail.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_extension_detection_is_case_insensitive() {
        assert!(is_image_ext(".PNG"));
        assert!(is_image_ext("jpeg"));
        assert!(!is_image_ext(".mp4"));
    }

    #[test]
    fn outputs_collect_in_creation_order_with_take_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        let landing = dir.path().join("landing");
        let out = dir.path().join("out");
        std::fs::create_dir_all(&landing).expect("landing");
        for (name, secs) in [("b.png", 2_000), ("a.png", 1_000), ("notes.txt", 500)] {
            let path = landing.join(name);
            std::fs::write(&path, b"data").expect("write");
            filetime::set_file_mtime(&path, filetime::FileTime::from_unix_time(secs, 0))
                .expect("mtime");
        }

        let req = RenderRequest {
            script: "img_gen",
            prompt: "p",
            output_dir: &out,
            job_name: "job_p1",
            output_ext: ".png",
            max_outputs: 4,
            collect_images: true,
            global_timeout: Duration::from_secs(1),
        };
        let moved = collect_outputs(&landing, &req);
        assert_eq!(moved, 2);
        // Creation time is filesystem-dependent; both takes must exist and
        // the non-image file must be left behind.
        assert!(out.join("job_p1_take001.png").exists());
        assert!(out.join("job_p1_take002.png").exists());
        assert!(landing.join("notes.txt").exists());
    }

    #[test]
    fn video_collection_caps_at_max_outputs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let landing = dir.path().join("landing");
        let out = dir.path().join("job");
        std::fs::create_dir_all(&landing).expect("landing");
        for name in ["one.mp4", "two.mp4", "three.mp4"] {
            std::fs::write(landing.join(name), b"data").expect("write");
        }

        let req = RenderRequest {
            script: "vid_gen",
            prompt: "p",
            output_dir: &out,
            job_name: "frame_001.png_vid",
            output_ext: ".mp4",
            max_outputs: 2,
            collect_images: false,
            global_timeout: Duration::from_secs(1),
        };
        assert_eq!(collect_outputs(&landing, &req), 2);
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 2);
        assert_eq!(std::fs::read_dir(&landing).unwrap().count(), 1);
    }
}
