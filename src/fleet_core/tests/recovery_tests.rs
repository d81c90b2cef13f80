use super::common::{make_image_job, make_video_job, test_config, write_heartbeat};
use crate::fleet_core::context::WorkerContext;
use crate::fleet_core::dispatch::recover_dead_workers;
use crate::fleet_core::domain::{MediaKind, WorkerRole};
use crate::fleet_core::fsutil;

#[test]
fn dead_worker_inbox_returns_to_kind_matching_queues() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = WorkerContext::new(test_config(dir.path(), "lead01", WorkerRole::ImgLead));
    let now = fsutil::now_epoch();
    write_heartbeat(
        &ctx.paths.heartbeats(),
        "w_dead",
        now - 200,
        "BUSY",
        "img_worker",
        Some("background_job_0.txt"),
    );

    let inbox = ctx.paths.inbox("w_dead");
    make_image_job(&inbox, "background_job_0.txt", 3);
    make_video_job(&inbox, "default_vid_0", 2);

    let recovered = recover_dead_workers(&ctx);
    assert_eq!(recovered, 2);
    assert!(
        ctx.paths
            .queue_dir(MediaKind::Img)
            .join("background_job_0.txt")
            .is_file()
    );
    assert!(ctx.paths.queue_dir(MediaKind::Vid).join("default_vid_0").is_dir());
    assert!(
        ctx.paths
            .queue_dir(MediaKind::Vid)
            .join("default_vid_0")
            .join("frame_000.png")
            .exists(),
        "recovered video job keeps its frames"
    );
    assert_eq!(std::fs::read_dir(&inbox).unwrap().count(), 0);
}

#[test]
fn recovery_is_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = WorkerContext::new(test_config(dir.path(), "lead01", WorkerRole::ImgLead));
    let now = fsutil::now_epoch();
    write_heartbeat(
        &ctx.paths.heartbeats(),
        "w_dead",
        now - 300,
        "BUSY",
        "img_worker",
        Some("job.txt"),
    );
    make_image_job(&ctx.paths.inbox("w_dead"), "job.txt", 1);

    assert_eq!(recover_dead_workers(&ctx), 1);
    let queue_file = ctx.paths.queue_dir(MediaKind::Img).join("job.txt");
    let first_pass = std::fs::read_to_string(&queue_file).expect("read");

    assert_eq!(recover_dead_workers(&ctx), 0);
    assert_eq!(std::fs::read_to_string(&queue_file).expect("read"), first_pass);
}

#[test]
fn recovery_overwrites_stale_queue_copy() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = WorkerContext::new(test_config(dir.path(), "lead01", WorkerRole::ImgLead));
    let now = fsutil::now_epoch();
    write_heartbeat(
        &ctx.paths.heartbeats(),
        "w_dead",
        now - 200,
        "BUSY",
        "img_worker",
        Some("job.txt"),
    );

    // An earlier incomplete copy of the same job is already in the queue.
    let queue = ctx.paths.queue_dir(MediaKind::Img);
    std::fs::create_dir_all(&queue).expect("queue");
    std::fs::write(queue.join("job.txt"), "stale\n").expect("stale");

    let inbox = ctx.paths.inbox("w_dead");
    std::fs::create_dir_all(&inbox).expect("inbox");
    std::fs::write(inbox.join("job.txt"), "authoritative\n").expect("fresh");

    assert_eq!(recover_dead_workers(&ctx), 1);
    assert_eq!(
        std::fs::read_to_string(queue.join("job.txt")).expect("read"),
        "authoritative\n"
    );
}

#[test]
fn live_and_idle_workers_are_left_alone() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = WorkerContext::new(test_config(dir.path(), "lead01", WorkerRole::ImgLead));
    let now = fsutil::now_epoch();
    write_heartbeat(
        &ctx.paths.heartbeats(),
        "w_live",
        now - 60,
        "BUSY",
        "img_worker",
        Some("job.txt"),
    );
    write_heartbeat(&ctx.paths.heartbeats(), "w_idle", now - 500, "IDLE", "img_worker", None);
    make_image_job(&ctx.paths.inbox("w_live"), "job.txt", 1);
    make_image_job(&ctx.paths.inbox("w_idle"), "other.txt", 1);

    assert_eq!(recover_dead_workers(&ctx), 0);
    assert!(ctx.paths.inbox("w_live").join("job.txt").exists());
    assert!(ctx.paths.inbox("w_idle").join("other.txt").exists());
}
