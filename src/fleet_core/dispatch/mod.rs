mod dispatcher;
mod drr;
mod liveness;
mod preemption;
mod recovery;

pub use dispatcher::FleetDispatcher;
pub use drr::DrrScheduler;
pub use liveness::{DEAD_AFTER_SECS, IDLE_WINDOW_SECS, dead_busy_workers, idle_workers};
pub use preemption::enforce_vip_preemption;
pub use recovery::recover_dead_workers;
