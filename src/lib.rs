pub mod fleet_core;
pub(crate) mod instance_lock;
pub(crate) mod sync_ext;

pub use fleet_core::config::{ConfigError, WorkerConfig};
pub use fleet_core::worker::FleetWorker;
