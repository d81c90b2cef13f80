mod command;
mod heartbeat;
mod job;
mod progress;
mod role;
mod settings;

pub use command::{Command, CommandAction};
pub use heartbeat::{Heartbeat, WorkerStatus};
pub use job::{QueueJob, bucket_for_name, is_vip_name};
pub use progress::{PROGRESS_FILE, ProgressJournal, ProgressStatus};
pub use role::{MediaKind, WorkerRole};
pub use settings::FleetSettings;
