use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use renderfleet::{FleetWorker, WorkerConfig};

/// Filesystem-coordinated render fleet worker.
///
/// Runs one worker process that executes jobs from its inbox and, when its
/// role is a lead, also dispatches jobs from the shared queues.
#[derive(Debug, Parser)]
#[command(name = "renderfleet", version, about)]
struct Cli {
    /// Path to the base config file. Defaults to `config.json` next to the
    /// executable.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match WorkerConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            log::error!("failed to load worker config: {err}");
            return ExitCode::FAILURE;
        }
    };

    let worker = match FleetWorker::new(config) {
        Ok(worker) => worker,
        Err(err) => {
            log::error!("worker startup failed: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    match worker.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("worker exited with error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
