//! Tracked job wrapping a unit of work.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::manager::ManagerShared;
use crate::{
    EntryId, ErrorDetail, History, HistoryMetadata, JobContext, JobError, JobMetadata,
    LatencyAlert, ParseError, Runnable, StatusCode, chain, handler,
};

/// Display name for units that do not declare one.
pub const NAMELESS: &str = "(nameless)";

/// Runs shorter than this never trigger a latency alert.
const ALERT_LATENCY_FLOOR: Duration = Duration::from_secs(1);

/// A unit of work registered for one wave of a schedule.
///
/// The status code lives in an atomic so status queries never wait on a
/// running job. The report fields (display status, latency, error) are
/// refreshed after each transition and may briefly lag the atomic code.
pub struct Job {
    entry_id: OnceLock<EntryId>,
    wave: u32,
    total_wave: u32,
    name: String,
    unit: Arc<dyn Runnable>,
    manager: Weak<ManagerShared>,
    status: AtomicU8,
    report: RwLock<Report>,
    running: Mutex<()>,
}

#[derive(Debug, Clone, Default)]
struct Report {
    status: StatusCode,
    latency: Duration,
    latency_text: String,
    error: String,
    last_error: Option<JobError>,
}

/// Serializable view of a job at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    #[serde(flatten)]
    pub metadata: JobMetadata,
    pub name: String,
    pub status: StatusCode,
    pub latency: String,
    pub latency_ns: u64,
    pub error: String,
}

impl Job {
    pub(crate) fn new(
        unit: Arc<dyn Runnable>,
        wave: u32,
        total_wave: u32,
        manager: Weak<ManagerShared>,
    ) -> Arc<Self> {
        let name = resolve_name(unit.as_ref());
        Arc::new(Self {
            entry_id: OnceLock::new(),
            wave,
            total_wave,
            name,
            unit,
            manager,
            status: AtomicU8::new(StatusCode::Up.code()),
            report: RwLock::new(Report::default()),
            running: Mutex::new(()),
        })
    }

    /// A job whose spec failed to parse. It is never dispatched.
    pub(crate) fn down(
        unit: Arc<dyn Runnable>,
        wave: u32,
        total_wave: u32,
        manager: Weak<ManagerShared>,
        cause: &ParseError,
    ) -> Arc<Self> {
        let job = Self::new(unit, wave, total_wave, manager);
        job.status.store(StatusCode::Down.code(), Ordering::SeqCst);
        {
            let mut report = job.report_mut();
            report.status = StatusCode::Down;
            report.error = cause.to_string();
        }
        job
    }

    /// A job not owned by any manager: no interceptors, no history, no
    /// alerts. Useful for running a unit with status tracking on its own.
    pub fn standalone(unit: impl Runnable + 'static) -> Arc<Self> {
        Self::new(Arc::new(unit), 1, 1, Weak::new())
    }

    pub(crate) fn set_entry_id(&self, id: EntryId) {
        let _ = self.entry_id.set(id);
    }

    pub fn entry_id(&self) -> EntryId {
        self.entry_id.get().copied().unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wave(&self) -> u32 {
        self.wave
    }

    pub fn total_wave(&self) -> u32 {
        self.total_wave
    }

    pub fn is_last_wave(&self) -> bool {
        self.wave == self.total_wave
    }

    pub fn metadata(&self) -> JobMetadata {
        JobMetadata {
            entry_id: self.entry_id(),
            wave: self.wave,
            total_wave: self.total_wave,
            is_last_wave: self.is_last_wave(),
        }
    }

    /// Current status, read from the atomic cell.
    pub fn status(&self) -> StatusCode {
        StatusCode::from(self.status.load(Ordering::SeqCst))
    }

    /// Status as last mirrored into the report.
    pub fn display_status(&self) -> StatusCode {
        self.report().status
    }

    /// Duration of the last completed run.
    pub fn latency(&self) -> Duration {
        self.report().latency
    }

    pub fn latency_text(&self) -> String {
        self.report().latency_text.clone()
    }

    /// Error text of the last run, empty when it succeeded.
    pub fn error(&self) -> String {
        self.report().error.clone()
    }

    pub fn last_error(&self) -> Option<JobError> {
        self.report().last_error.clone()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let report = self.report();
        JobSnapshot {
            metadata: self.metadata(),
            name: self.name.clone(),
            status: report.status,
            latency: report.latency_text.clone(),
            latency_ns: duration_nanos(report.latency),
            error: report.error.clone(),
        }
    }

    /// Execute one run.
    ///
    /// Overlapping calls on the same job queue behind the run lock. The
    /// outcome is recorded on the job; nothing is returned to the caller.
    pub async fn run(self: &Arc<Self>) {
        let manager = self.manager.upgrade();
        let timezone = manager.as_ref().map_or(Tz::UTC, |m| m.timezone);
        let started_at = now_in(timezone);
        let clock = Instant::now();

        let _guard = self.running.lock().await;

        if self.status() == StatusCode::Down {
            return;
        }

        let ctx = JobContext::new().with_metadata(self.metadata());
        self.set_status(StatusCode::Running);

        let intercept = match &manager {
            Some(m) => Arc::clone(&m.interceptor),
            None => chain(Vec::new()),
        };
        let terminal = handler(|ctx: JobContext, job: Arc<Job>| async move {
            job.invoke(&ctx).await
        });
        let result = intercept(ctx.clone(), Arc::clone(self), terminal).await;

        let latency = clock.elapsed();
        let finished_at = now_in(timezone);
        let status = match &result {
            Ok(()) => StatusCode::Idle,
            Err(_) => StatusCode::Error,
        };
        self.status.store(status.code(), Ordering::SeqCst);
        {
            let mut report = self.report_mut();
            report.status = status;
            report.latency = latency;
            report.latency_text = format_latency(latency);
            match &result {
                Ok(()) => {
                    report.error.clear();
                    report.last_error = None;
                }
                Err(e) => {
                    report.error = e.to_string();
                    report.last_error = Some(e.clone());
                }
            }
        }

        let Some(manager) = manager else {
            return;
        };

        let history = self.history(
            &manager,
            status,
            started_at,
            finished_at,
            latency,
            result.as_ref().err(),
        );
        if let Err(e) = manager.storage.write_history(&history).await {
            error!(name = %self.name, error = %e, "failed to write job history");
        }

        self.check_latency(&manager, &ctx, latency).await;
    }

    async fn invoke(&self, ctx: &JobContext) -> Result<(), JobError> {
        match AssertUnwindSafe(self.unit.run(ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let err = JobError::from_panic(payload);
                error!(name = %self.name, error = %err, "job panicked");
                Err(err)
            }
        }
    }

    fn set_status(&self, status: StatusCode) {
        self.status.store(status.code(), Ordering::SeqCst);
        self.report_mut().status = status;
    }

    fn history(
        &self,
        manager: &ManagerShared,
        status: StatusCode,
        started_at: DateTime<Tz>,
        finished_at: DateTime<Tz>,
        latency: Duration,
        error: Option<&JobError>,
    ) -> History {
        let multi_wave = self.total_wave > 1;
        History {
            id: 0,
            created_at: finished_at.fixed_offset(),
            name: self.name.clone(),
            status: status.as_str().to_string(),
            status_code: status.code(),
            started_at: started_at.fixed_offset(),
            finished_at: finished_at.fixed_offset(),
            latency: duration_nanos(latency),
            latency_text: format_latency(latency),
            error: error.map(ErrorDetail::from),
            metadata: HistoryMetadata {
                machine_id: manager.machine_id.clone(),
                entry_id: self.entry_id(),
                wave: multi_wave.then_some(self.wave),
                total_wave: multi_wave.then_some(self.total_wave),
                is_last_wave: multi_wave.then_some(self.is_last_wave()),
            },
        }
    }

    /// Alert when the run took longer than both the floor and the job's own
    /// period, meaning the next occurrence may already be waiting.
    async fn check_latency(&self, manager: &ManagerShared, ctx: &JobContext, latency: Duration) {
        if latency <= ALERT_LATENCY_FLOOR {
            return;
        }

        let Some(entry) = manager.dispatcher.entry(self.entry_id()).await else {
            return;
        };
        let (Some(prev), Some(next)) = (entry.prev, entry.next) else {
            return;
        };

        let period = (next - prev).to_std().unwrap_or(Duration::ZERO);
        let max_latency = period.max(ALERT_LATENCY_FLOOR);
        if latency > max_latency {
            debug!(name = %self.name, ?latency, ?max_latency, "job exceeded its period");
            manager.alerter.notify_high_latency(
                ctx,
                self,
                &LatencyAlert {
                    prev,
                    next,
                    latency,
                    max_latency,
                },
            );
        }
    }

    fn report(&self) -> RwLockReadGuard<'_, Report> {
        self.report.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn report_mut(&self) -> RwLockWriteGuard<'_, Report> {
        self.report.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("entry_id", &self.entry_id())
            .field("name", &self.name)
            .field("wave", &self.wave)
            .field("total_wave", &self.total_wave)
            .field("status", &self.status())
            .finish()
    }
}

fn resolve_name(unit: &dyn Runnable) -> String {
    match unit.name() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => NAMELESS.to_string(),
    }
}

fn now_in(timezone: Tz) -> DateTime<Tz> {
    Utc::now().with_timezone(&timezone)
}

fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Human-readable latency, truncated to microseconds.
pub(crate) fn format_latency(d: Duration) -> String {
    let truncated = Duration::from_micros(u64::try_from(d.as_micros()).unwrap_or(u64::MAX));
    humantime::format_duration(truncated).to_string()
}
