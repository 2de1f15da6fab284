//! Background tasks: report timers and periodic housekeeping.

mod pool_metrics;
mod scheduler;

pub use pool_metrics::spawn_pool_metrics;
pub use scheduler::{
    Clock, JobHandle, ReportExecutor, ReportScheduler, SchedulerError, SystemClock, RESYNC_INTERVAL,
};
