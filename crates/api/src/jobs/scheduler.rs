//! Per-report recurring timers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use domain::models::{InvalidRecurrence, RecurrenceSchedule, RecurrenceUnit, ReportDefinition};
use domain::services::{ReportStore, StoreError};

use crate::middleware::metrics::set_scheduled_reports_active;

/// Work performed on every fire of a report's timer.
#[async_trait]
pub trait ReportExecutor: Send + Sync {
    /// Runs one report. Returns Err with a message on failure.
    async fn execute(&self, report: Arc<ReportDefinition>) -> Result<(), String>;
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    InvalidRecurrence(#[from] InvalidRecurrence),

    #[error("Scheduler is shutting down")]
    ShuttingDown,
}

/// Source of the wall-clock time fire instants are computed against.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Longest a timer sleeps before re-reading its clock.
pub const RESYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Registration of a live timer.
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub id: String,
    pub schedule: RecurrenceSchedule,
    token: CancellationToken,
}

impl JobHandle {
    /// False once the timer was cancelled, replaced or shut down.
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }
}

struct ScheduledJob {
    token: CancellationToken,
}

/// Keeps exactly one timer per report id.
pub struct ReportScheduler {
    executor: Arc<dyn ReportExecutor>,
    clock: Arc<dyn Clock>,
    jobs: Mutex<HashMap<String, ScheduledJob>>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl ReportScheduler {
    pub fn new(executor: Arc<dyn ReportExecutor>) -> Self {
        Self::with_clock(executor, Arc::new(SystemClock))
    }

    pub fn with_clock(executor: Arc<dyn ReportExecutor>, clock: Arc<dyn Clock>) -> Self {
        Self {
            executor,
            clock,
            jobs: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<String, ScheduledJob>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a recurring timer for `report`, replacing any previous one
    /// for the same id.
    pub fn schedule(&self, report: ReportDefinition) -> Result<JobHandle, SchedulerError> {
        if self.shutdown.is_cancelled() {
            return Err(SchedulerError::ShuttingDown);
        }

        let schedule = report.recurrence()?;
        if report.duration_unit == RecurrenceUnit::Day && report.duration != 1 {
            warn!(
                report_id = %report.id,
                duration = report.duration,
                "Day recurrence ignores its amount, report fires once daily"
            );
        }

        let id = report.id.clone();
        let token = self.shutdown.child_token();
        let report = Arc::new(report);

        let active = {
            let mut jobs = self.jobs();
            if let Some(previous) = jobs.remove(&id) {
                previous.token.cancel();
                info!(report_id = %id, "Replaced existing report schedule");
            }

            self.tracker.spawn(job_loop(
                Arc::clone(&self.executor),
                Arc::clone(&self.clock),
                report,
                schedule,
                token.clone(),
                self.tracker.clone(),
            ));

            jobs.insert(
                id.clone(),
                ScheduledJob {
                    token: token.clone(),
                },
            );
            jobs.len()
        };
        set_scheduled_reports_active(active);

        info!(
            report_id = %id,
            cron = %schedule.cron_expression(),
            "Report scheduled"
        );

        Ok(JobHandle {
            id,
            schedule,
            token,
        })
    }

    /// Stops future fires of a report. Returns false for an unknown id.
    pub fn cancel(&self, id: &str) -> bool {
        let (removed, active) = {
            let mut jobs = self.jobs();
            let removed = jobs.remove(id);
            (removed, jobs.len())
        };

        match removed {
            Some(job) => {
                job.token.cancel();
                set_scheduled_reports_active(active);
                info!(report_id = %id, "Report schedule cancelled");
                true
            }
            None => false,
        }
    }

    /// True once `shutdown` was called; new schedules are refused.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn is_scheduled(&self, id: &str) -> bool {
        self.jobs().contains_key(id)
    }

    /// Ids of all registered reports, sorted.
    pub fn active_jobs(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.jobs().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Registers every stored definition across all tenants.
    ///
    /// Definitions that cannot be scheduled, and tenants whose definitions
    /// cannot be read, are logged and skipped. Only a failure to list the
    /// tenants is returned.
    pub async fn warm_start(&self, store: &dyn ReportStore) -> Result<usize, StoreError> {
        let mut scheduled = 0;

        for tenant in store.list_tenants().await? {
            let reports = match store.list_by_tenant(&tenant).await {
                Ok(reports) => reports,
                Err(e) => {
                    error!(tenant = %tenant, error = %e, "Skipping tenant during warm start");
                    continue;
                }
            };

            for report in reports {
                let id = report.id.clone();
                match self.schedule(report) {
                    Ok(_) => scheduled += 1,
                    Err(e) => warn!(report_id = %id, error = %e, "Skipping stored report"),
                }
            }
        }

        info!(scheduled, "Report schedules restored");
        Ok(scheduled)
    }

    /// Cancels every timer. Returns immediately; in-flight runs continue.
    pub fn shutdown(&self) {
        info!("Initiating report scheduler shutdown");
        self.shutdown.cancel();
        self.jobs().clear();
        self.tracker.close();
        set_scheduled_reports_active(0);
    }

    /// Waits for timer loops and in-flight runs to finish.
    ///
    /// Returns false when `timeout` elapsed first.
    pub async fn wait_for_shutdown(&self, timeout: Duration) -> bool {
        info!("Waiting for report runs to complete (timeout: {:?})", timeout);
        self.tracker.close();

        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => {
                info!("All report runs completed");
                true
            }
            Err(_) => {
                warn!("Report scheduler shutdown timed out after {:?}", timeout);
                false
            }
        }
    }
}

async fn job_loop(
    executor: Arc<dyn ReportExecutor>,
    clock: Arc<dyn Clock>,
    report: Arc<ReportDefinition>,
    schedule: RecurrenceSchedule,
    token: CancellationToken,
    tracker: TaskTracker,
) {
    let mut last_fire: Option<DateTime<Utc>> = None;

    loop {
        let now = clock.now();
        let after = match last_fire {
            Some(last) if last > now => last,
            _ => now,
        };

        let Some(next) = schedule.next_after(after) else {
            warn!(report_id = %report.id, "No further fire instant, stopping report timer");
            return;
        };

        // Re-read the clock at least every RESYNC_INTERVAL.
        loop {
            let now = clock.now();
            if now >= next {
                break;
            }
            let wait = (next - now).to_std().unwrap_or_default().min(RESYNC_INTERVAL);

            tokio::select! {
                _ = token.cancelled() => {
                    info!(report_id = %report.id, "Report timer stopped");
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }

        last_fire = Some(next);

        let executor = Arc::clone(&executor);
        let report = Arc::clone(&report);
        tracker.spawn(async move {
            info!(report_id = %report.id, fire_time = %next, "Report run starting");
            if let Err(e) = executor.execute(Arc::clone(&report)).await {
                error!(report_id = %report.id, error = %e, "Report run failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::TimeFilterUnit;
    use chrono::TimeZone;
    use domain::services::InMemoryReportStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    /// Wall clock that advances with the runtime clock, so paused-time tests
    /// move it.
    struct RuntimeClock {
        wall: DateTime<Utc>,
        anchor: Instant,
    }

    impl RuntimeClock {
        fn new() -> Self {
            Self {
                wall: Utc::now(),
                anchor: Instant::now(),
            }
        }
    }

    impl Clock for RuntimeClock {
        fn now(&self) -> DateTime<Utc> {
            let elapsed = chrono::Duration::from_std(self.anchor.elapsed())
                .unwrap_or_else(|_| chrono::Duration::zero());
            self.wall + elapsed
        }
    }

    /// Wall clock that only moves when told to.
    struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn set(&self, now: DateTime<Utc>) {
            *self.0.lock().unwrap() = now;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    #[derive(Default)]
    struct CountingExecutor {
        started: AtomicUsize,
        finished: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl ReportExecutor for CountingExecutor {
        async fn execute(&self, _report: Arc<ReportDefinition>) -> Result<(), String> {
            self.started.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.finished.fetch_add(1, Ordering::SeqCst);
            Err("Test failure".to_string())
        }
    }

    fn report(id: &str, tenant: &str, duration: u32, unit: RecurrenceUnit) -> ReportDefinition {
        ReportDefinition {
            id: id.to_string(),
            company_id: tenant.to_string(),
            cron_schedule: String::new(),
            visualization_id: "vis".to_string(),
            receiver: "ops@example.com".to_string(),
            index: format!("{}-alarms", tenant),
            request: "{}".to_string(),
            title: "Alarms".to_string(),
            duration,
            duration_unit: unit,
            time_filter: 1,
            time_filter_unit: TimeFilterUnit::Day,
            columns: "[]".to_string(),
            created_at: Utc::now(),
        }
    }

    fn scheduler(executor: Arc<CountingExecutor>) -> ReportScheduler {
        ReportScheduler::with_clock(executor, Arc::new(RuntimeClock::new()))
    }

    /// Store whose listing fails for one tenant.
    struct FlakyTenantStore {
        inner: InMemoryReportStore,
        failing_tenant: &'static str,
    }

    #[async_trait]
    impl ReportStore for FlakyTenantStore {
        async fn get(&self, id: &str) -> Result<Option<ReportDefinition>, StoreError> {
            self.inner.get(id).await
        }

        async fn put(&self, report: &ReportDefinition) -> Result<(), StoreError> {
            self.inner.put(report).await
        }

        async fn delete(&self, id: &str) -> Result<bool, StoreError> {
            self.inner.delete(id).await
        }

        async fn list_by_tenant(&self, tenant: &str) -> Result<Vec<ReportDefinition>, StoreError> {
            if tenant == self.failing_tenant {
                return Err(StoreError::Corrupt {
                    id: format!("{}-bad", tenant),
                    reason: "unknown duration unit".to_string(),
                });
            }
            self.inner.list_by_tenant(tenant).await
        }

        async fn list_tenants(&self) -> Result<Vec<String>, StoreError> {
            self.inner.list_tenants().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_second_fires_repeatedly() {
        let executor = Arc::new(CountingExecutor::default());
        let scheduler = scheduler(executor.clone());

        scheduler
            .schedule(report("r-1", "acme", 1, RecurrenceUnit::Second))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(3500)).await;

        let fired = executor.started.load(Ordering::SeqCst);
        assert!((3..=4).contains(&fired), "fired {} times", fired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_schedule_keeps_one_timer() {
        let executor = Arc::new(CountingExecutor::default());
        let scheduler = scheduler(executor.clone());

        let first = scheduler
            .schedule(report("r-1", "acme", 1, RecurrenceUnit::Second))
            .unwrap();
        let second = scheduler
            .schedule(report("r-1", "acme", 1, RecurrenceUnit::Second))
            .unwrap();

        assert!(!first.is_active());
        assert!(second.is_active());
        assert_eq!(scheduler.active_jobs(), vec!["r-1".to_string()]);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        let fired = executor.started.load(Ordering::SeqCst);
        assert!((3..=4).contains(&fired), "fired {} times", fired);
    }

    #[tokio::test]
    async fn test_cancel_unknown_id() {
        let scheduler = scheduler(Arc::new(CountingExecutor::default()));
        assert!(!scheduler.cancel("missing"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_future_fires_only() {
        let executor = Arc::new(CountingExecutor {
            delay: Duration::from_secs(10),
            ..Default::default()
        });
        let scheduler = scheduler(executor.clone());

        let handle = scheduler
            .schedule(report("r-1", "acme", 1, RecurrenceUnit::Second))
            .unwrap();
        // first fire lands within the first second
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let started = executor.started.load(Ordering::SeqCst);
        assert!(started >= 1);
        assert_eq!(executor.finished.load(Ordering::SeqCst), 0);

        assert!(scheduler.cancel("r-1"));
        assert!(!handle.is_active());
        assert!(!scheduler.is_scheduled("r-1"));

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(executor.started.load(Ordering::SeqCst), started);
        assert_eq!(executor.finished.load(Ordering::SeqCst), started);
    }

    #[tokio::test]
    async fn test_zero_duration_is_rejected() {
        let scheduler = scheduler(Arc::new(CountingExecutor::default()));
        let result = scheduler.schedule(report("r-1", "acme", 0, RecurrenceUnit::Hour));

        assert!(matches!(
            result,
            Err(SchedulerError::InvalidRecurrence(InvalidRecurrence::ZeroAmount))
        ));
        assert!(!scheduler.is_scheduled("r-1"));
    }

    #[tokio::test]
    async fn test_day_unit_with_amount_is_scheduled() {
        let scheduler = scheduler(Arc::new(CountingExecutor::default()));
        let handle = scheduler
            .schedule(report("r-1", "acme", 3, RecurrenceUnit::Day))
            .unwrap();

        assert_eq!(handle.schedule, RecurrenceSchedule::Daily { hour: 12 });
        scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_warm_start_registers_all_tenants() {
        let store = InMemoryReportStore::new();
        store
            .put(&report("r-1", "acme", 1, RecurrenceUnit::Hour))
            .await
            .unwrap();
        store
            .put(&report("r-2", "acme", 1, RecurrenceUnit::Month))
            .await
            .unwrap();
        store
            .put(&report("r-3", "globex", 2, RecurrenceUnit::Hour))
            .await
            .unwrap();

        let scheduler = scheduler(Arc::new(CountingExecutor::default()));
        let count = scheduler.warm_start(&store).await.unwrap();

        assert_eq!(count, 3);
        assert_eq!(scheduler.active_jobs(), vec!["r-1", "r-2", "r-3"]);
        scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_warm_start_skips_invalid_definitions() {
        let store = InMemoryReportStore::new();
        store
            .put(&report("r-1", "acme", 0, RecurrenceUnit::Hour))
            .await
            .unwrap();
        store
            .put(&report("r-2", "acme", 1, RecurrenceUnit::Hour))
            .await
            .unwrap();

        let scheduler = scheduler(Arc::new(CountingExecutor::default()));
        assert_eq!(scheduler.warm_start(&store).await.unwrap(), 1);
        assert_eq!(scheduler.active_jobs(), vec!["r-2"]);
        scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_warm_start_survives_unreadable_tenant() {
        let store = FlakyTenantStore {
            inner: InMemoryReportStore::new(),
            failing_tenant: "globex",
        };
        store
            .put(&report("r-1", "acme", 1, RecurrenceUnit::Hour))
            .await
            .unwrap();
        store
            .put(&report("r-2", "globex", 1, RecurrenceUnit::Hour))
            .await
            .unwrap();
        store
            .put(&report("r-3", "initech", 1, RecurrenceUnit::Month))
            .await
            .unwrap();

        let scheduler = scheduler(Arc::new(CountingExecutor::default()));
        assert_eq!(scheduler.warm_start(&store).await.unwrap(), 2);
        assert_eq!(scheduler.active_jobs(), vec!["r-1", "r-3"]);
        scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_deactivates_all_jobs() {
        let scheduler = scheduler(Arc::new(CountingExecutor::default()));
        let a = scheduler
            .schedule(report("r-1", "acme", 1, RecurrenceUnit::Hour))
            .unwrap();
        let b = scheduler
            .schedule(report("r-2", "acme", 1, RecurrenceUnit::Month))
            .unwrap();

        assert!(!scheduler.is_shutting_down());
        scheduler.shutdown();
        assert!(scheduler.is_shutting_down());
        assert!(scheduler.wait_for_shutdown(Duration::from_secs(2)).await);

        assert!(!a.is_active());
        assert!(!b.is_active());
        assert!(scheduler.active_jobs().is_empty());
        assert!(matches!(
            scheduler.schedule(report("r-3", "acme", 1, RecurrenceUnit::Hour)),
            Err(SchedulerError::ShuttingDown)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_follows_wall_clock_jump() {
        let executor = Arc::new(CountingExecutor::default());
        let clock = Arc::new(ManualClock(Mutex::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        )));
        let scheduler = ReportScheduler::with_clock(executor.clone(), clock.clone());

        scheduler
            .schedule(report("r-1", "acme", 1, RecurrenceUnit::Hour))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(executor.started.load(Ordering::SeqCst), 0);

        // wall clock moves past 11:00 without the runtime clock following
        clock.set(Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 1).unwrap());
        tokio::time::sleep(RESYNC_INTERVAL).await;

        assert_eq!(executor.started.load(Ordering::SeqCst), 1);
        scheduler.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_holds_while_wall_clock_stands_still() {
        let executor = Arc::new(CountingExecutor::default());
        let clock = Arc::new(ManualClock(Mutex::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap(),
        )));
        let scheduler = ReportScheduler::with_clock(executor.clone(), clock);

        scheduler
            .schedule(report("r-1", "acme", 1, RecurrenceUnit::Hour))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(3 * 3600)).await;

        assert_eq!(executor.started.load(Ordering::SeqCst), 0);
        scheduler.shutdown();
    }
}
