use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::fleet_core::config::{TimingConfig, WorkerConfig};
use crate::fleet_core::domain::WorkerRole;

/// Worker config rooted in a temp fleet tree, with every interval shrunk so
/// tests never sleep.
pub(crate) fn test_config(root: &Path, worker_id: &str, role: WorkerRole) -> WorkerConfig {
    let mut scripts = BTreeMap::new();
    scripts.insert("img_gen".to_string(), "_system/scripts/img_gen.sh".to_string());
    scripts.insert("vid_gen".to_string(), "_system/scripts/vid_gen.sh".to_string());
    WorkerConfig {
        worker_id: worker_id.to_string(),
        initial_role: role,
        fleet_root: root.to_string_lossy().into_owned(),
        scripts,
        timing: TimingConfig {
            dispatch_interval_secs: 0,
            idle_sleep_secs: 0,
            pause_sleep_secs: 0,
            watchdog_poll_secs: 0,
            inter_output_timeout_secs: 30,
            image_timeout_secs: 30,
            video_timeout_secs: 30,
        },
        ..WorkerConfig::default()
    }
}

/// Writes a raw heartbeat record, bypassing `Heartbeat` so tests can craft
/// arbitrary timestamps, roles, and malformed shapes.
pub(crate) fn write_heartbeat(
    heartbeat_dir: &Path,
    worker_id: &str,
    timestamp: i64,
    status: &str,
    role: &str,
    current_job: Option<&str>,
) {
    std::fs::create_dir_all(heartbeat_dir).expect("heartbeat dir");
    let current_job = match current_job {
        Some(job) => format!("\"{job}\""),
        None => "null".to_string(),
    };
    let body = format!(
        r#"{{"worker_id":"{worker_id}","timestamp":{timestamp},"status":"{status}","role":"{role}","current_job":{current_job}}}"#
    );
    std::fs::write(heartbeat_dir.join(format!("{worker_id}.json")), body).expect("heartbeat");
}

/// Creates an image job file with the given number of prompt lines.
pub(crate) fn make_image_job(queue_dir: &Path, name: &str, prompts: usize) -> PathBuf {
    std::fs::create_dir_all(queue_dir).expect("queue dir");
    let path = queue_dir.join(name);
    let body: String = (0..prompts)
        .map(|i| format!("prompt {i}\n"))
        .collect();
    std::fs::write(&path, body).expect("job file");
    path
}

/// Creates a video job directory with frames and sibling prompt files.
pub(crate) fn make_video_job(queue_dir: &Path, name: &str, frames: usize) -> PathBuf {
    let job_dir = queue_dir.join(name);
    std::fs::create_dir_all(&job_dir).expect("job dir");
    for i in 0..frames {
        std::fs::write(job_dir.join(format!("frame_{i:03}.png")), b"frame").expect("frame");
        std::fs::write(job_dir.join(format!("frame_{i:03}.txt")), format!("motion {i}"))
            .expect("prompt");
    }
    job_dir
}

/// Installs a shell script as the renderer for `script_key`, pointing the
/// config's launcher at `/bin/sh`. The script body runs with the fleet root
/// available; use [`mock_script_writing_outputs`] for the common case.
#[cfg(unix)]
pub(crate) fn install_mock_renderer(config: &mut WorkerConfig, root: &Path, script_key: &str, body: &str) {
    let scripts_dir = root.join("_system").join("scripts");
    std::fs::create_dir_all(&scripts_dir).expect("scripts dir");
    let script_path = scripts_dir.join(format!("{script_key}.sh"));
    std::fs::write(&script_path, format!("#!/bin/sh\n{body}\n")).expect("script");
    config.renderer_bin = "/bin/sh".to_string();
}

/// Script body that drops the named output files into the landing zone.
#[cfg(unix)]
pub(crate) fn mock_script_writing_outputs(root: &Path, outputs: &[&str]) -> String {
    let landing = root.join("_system").join("landing_zone");
    outputs
        .iter()
        .map(|name| format!("printf 'x' > '{}'", landing.join(name).display()))
        .collect::<Vec<_>>()
        .join("\n")
}
