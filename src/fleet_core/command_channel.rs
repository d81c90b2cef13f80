use std::path::Path;
use std::sync::Arc;

use notify::{Event, EventKind, RecursiveMode, Watcher};

use crate::fleet_core::context::WorkerContext;
use crate::fleet_core::domain::{Command, CommandAction, WorkerRole, WorkerStatus};

/// Applies the command file addressed to this worker, if any.
///
/// Non-yield commands are consumed here; `yield` is deliberately left on
/// disk so the executor can pick it up at its next sub-item boundary.
/// Malformed files are deleted so a bad submitter cannot wedge the channel.
pub fn apply_command_file(ctx: &WorkerContext, path: &Path) {
    let own_name = format!("{}.cmd", ctx.worker_id());
    if path.file_name().map(|n| n.to_string_lossy().into_owned()) != Some(own_name) {
        return;
    }
    if !path.exists() {
        return;
    }
    let Some(cmd) = Command::load(path) else {
        log::warn!("deleting malformed command file {}", path.display());
        let _ = std::fs::remove_file(path);
        return;
    };
    if cmd.action == CommandAction::Yield {
        return;
    }

    log::info!("command received: {:?}", cmd.action);
    let _ = std::fs::remove_file(path);

    match cmd.action {
        CommandAction::SetRole => match cmd.requested_role().and_then(WorkerRole::parse) {
            Some(role) => ctx.set_role(role),
            None => log::warn!("set_role with unknown role {:?}", cmd.requested_role()),
        },
        CommandAction::Pause => ctx.set_paused(true),
        CommandAction::Unpause | CommandAction::Start => ctx.set_paused(false),
        CommandAction::Stop => {
            log::info!("stop command received, shutting down");
            ctx.emit_heartbeat(WorkerStatus::Offline, None);
            ctx.request_stop();
        }
        CommandAction::Yield => unreachable!("yield handled above"),
    }
}

/// Polls this worker's own command file; the executor calls this every tick
/// because change notifications can be lossy across the sync layer.
pub fn poll_own_command(ctx: &WorkerContext) {
    apply_command_file(ctx, &ctx.paths.command_file(ctx.worker_id()));
}

/// Starts a filesystem watcher on the shared command directory. The
/// returned watcher must stay alive for events to keep flowing; `None`
/// means watching is unavailable and polling carries the channel alone.
pub fn spawn_watcher(ctx: Arc<WorkerContext>) -> Option<notify::RecommendedWatcher> {
    let commands_dir = ctx.paths.commands();
    let _ = std::fs::create_dir_all(&commands_dir);

    let handler_ctx = ctx.clone();
    let mut watcher = match notify::recommended_watcher(
        move |res: Result<Event, notify::Error>| match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    for path in &event.paths {
                        apply_command_file(&handler_ctx, path);
                    }
                }
            }
            Err(err) => log::warn!("command watcher error: {err}"),
        },
    ) {
        Ok(watcher) => watcher,
        Err(err) => {
            log::warn!("failed to create command watcher: {err}");
            return None;
        }
    };

    if let Err(err) = watcher.watch(&commands_dir, RecursiveMode::NonRecursive) {
        log::warn!("failed to watch {}: {err}", commands_dir.display());
        return None;
    }
    log::info!("watching commands at {}", commands_dir.display());
    Some(watcher)
}
