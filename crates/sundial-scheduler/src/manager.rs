//! Job registration, lifecycle and status queries.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{
    Alerter, Dispatcher, Entry, EntryId, FuncJob, HistoryFilter, HistoryPageData, Interceptor,
    Job, JobContext, JobError, LogAlerter, NoopStorage, PageRequest, PageResponse, Runnable,
    SchedulerError, Sort, Sorts, SpecParser, StandardParser, StatusData, StatusPageData,
    Storage, StorageError, chain, sort_status_data,
};

/// Characters that appear inside schedule specs and so cannot separate them.
const RESERVED_SEPARATOR_CHARS: &[char] = &['*', '/', ',', '-', '?'];

const DEFAULT_STATUS_SORT: &str = "id";

/// Registers jobs, drives the dispatcher and answers status queries.
///
/// Cloning is cheap; clones share the same jobs. The dispatcher stops when
/// the last clone is dropped.
#[derive(Clone)]
pub struct Manager {
    inner: Arc<ManagerShared>,
}

/// State shared between the manager and the jobs it owns.
pub(crate) struct ManagerShared {
    pub(crate) dispatcher: Dispatcher,
    pub(crate) interceptor: Interceptor,
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) alerter: Arc<dyn Alerter>,
    pub(crate) machine_id: String,
    pub(crate) timezone: Tz,
    parser: Arc<dyn SpecParser>,
    down_jobs: RwLock<Vec<Arc<Job>>>,
    created_at: DateTime<Tz>,
    high_priority_down_jobs: bool,
}

impl Drop for ManagerShared {
    fn drop(&mut self) {
        self.dispatcher.stop();
    }
}

/// Basic facts about a running manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerInfo {
    pub location: String,
    pub created_time: DateTime<FixedOffset>,
    pub current_time: DateTime<FixedOffset>,
    pub up_time: String,
}

/// Builder for [`Manager`].
pub struct ManagerBuilder {
    timezone: Tz,
    parser: Arc<dyn SpecParser>,
    interceptors: Vec<Interceptor>,
    auto_start: bool,
    high_priority_down_jobs: bool,
    storage: Arc<dyn Storage>,
    alerter: Arc<dyn Alerter>,
    machine_id: Option<String>,
}

impl Default for ManagerBuilder {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            parser: Arc::new(StandardParser),
            interceptors: Vec::new(),
            auto_start: true,
            high_priority_down_jobs: true,
            storage: Arc::new(NoopStorage),
            alerter: Arc::new(LogAlerter),
            machine_id: None,
        }
    }
}

impl ManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timezone schedules are evaluated in and times are reported in.
    pub fn timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn parser(mut self, parser: impl SpecParser + 'static) -> Self {
        self.parser = Arc::new(parser);
        self
    }

    /// Add an interceptor. Interceptors run in the order they are added.
    ///
    /// Panics in the unit itself always become errors. A panic raised by an
    /// interceptor is only caught by a [`recover`](crate::interceptors::recover)
    /// added before it, so add `recover()` first.
    pub fn interceptor(mut self, interceptor: Interceptor) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Add several interceptors in order. See [`ManagerBuilder::interceptor`].
    pub fn interceptors(mut self, interceptors: impl IntoIterator<Item = Interceptor>) -> Self {
        self.interceptors.extend(interceptors);
        self
    }

    /// Build without starting the dispatcher; call [`Manager::start`] later.
    pub fn auto_start_disabled(mut self) -> Self {
        self.auto_start = false;
        self
    }

    /// List down jobs after the live ones instead of before.
    pub fn low_priority_down_jobs(mut self) -> Self {
        self.high_priority_down_jobs = false;
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn alerter(mut self, alerter: Arc<dyn Alerter>) -> Self {
        self.alerter = alerter;
        self
    }

    /// Identifier written to run history. Defaults to the host name.
    pub fn machine_id(mut self, machine_id: impl Into<String>) -> Self {
        self.machine_id = Some(machine_id.into());
        self
    }

    /// Build the manager, starting the dispatcher unless disabled.
    ///
    /// Starting requires a tokio runtime.
    pub fn build(self) -> Manager {
        let machine_id = self.machine_id.unwrap_or_else(default_machine_id);
        let dispatcher = Dispatcher::new(self.timezone);

        let manager = Manager {
            inner: Arc::new(ManagerShared {
                created_at: dispatcher.now(),
                dispatcher,
                interceptor: chain(self.interceptors),
                storage: self.storage,
                alerter: self.alerter,
                machine_id,
                timezone: self.timezone,
                parser: self.parser,
                down_jobs: RwLock::new(Vec::new()),
                high_priority_down_jobs: self.high_priority_down_jobs,
            }),
        };

        if self.auto_start {
            manager.start();
        }
        manager
    }
}

impl Manager {
    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::new()
    }

    pub fn timezone(&self) -> Tz {
        self.inner.timezone
    }

    pub fn machine_id(&self) -> &str {
        &self.inner.machine_id
    }

    pub fn is_running(&self) -> bool {
        self.inner.dispatcher.is_running()
    }

    /// Register a unit of work on one schedule.
    ///
    /// A spec that fails to parse is still recorded, as a down job, and the
    /// parse error is returned.
    pub async fn schedule(
        &self,
        spec: &str,
        unit: impl Runnable + 'static,
    ) -> Result<EntryId, SchedulerError> {
        self.schedule_wave(spec, Arc::new(unit), 1, 1).await
    }

    /// Register a unit of work on several schedules joined by `separator`,
    /// e.g. `"0 0 1 * * *#0 0 2 * * *"` with `"#"`.
    ///
    /// Waves are registered in order and registration stops at the first
    /// spec that fails to parse; earlier waves stay registered.
    pub async fn schedules(
        &self,
        spec: &str,
        separator: &str,
        unit: impl Runnable + 'static,
    ) -> Result<Vec<EntryId>, SchedulerError> {
        if spec.trim().is_empty() {
            return Err(SchedulerError::EmptySpec);
        }
        if separator.is_empty() {
            return Err(SchedulerError::EmptySeparator);
        }
        if separator
            .chars()
            .any(|c| c.is_whitespace() || RESERVED_SEPARATOR_CHARS.contains(&c))
        {
            return Err(SchedulerError::ReservedSeparator(separator.to_string()));
        }

        let unit: Arc<dyn Runnable> = Arc::new(unit);
        let specs: Vec<&str> = spec.split(separator).collect();
        let total = wave_number(specs.len());

        let mut ids = Vec::with_capacity(specs.len());
        for (index, wave_spec) in specs.into_iter().enumerate() {
            let id = self
                .schedule_wave(wave_spec, Arc::clone(&unit), wave_number(index + 1), total)
                .await?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Register a named async closure on one schedule.
    pub async fn schedule_func<F, Fut>(
        &self,
        spec: &str,
        name: &str,
        f: F,
    ) -> Result<EntryId, SchedulerError>
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        self.schedule(spec, FuncJob::new(name, f)).await
    }

    /// Register a named async closure on several schedules.
    pub async fn schedules_func<F, Fut>(
        &self,
        spec: &str,
        separator: &str,
        name: &str,
        f: F,
    ) -> Result<Vec<EntryId>, SchedulerError>
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        self.schedules(spec, separator, FuncJob::new(name, f)).await
    }

    #[tracing::instrument(skip(self, unit))]
    async fn schedule_wave(
        &self,
        spec: &str,
        unit: Arc<dyn Runnable>,
        wave: u32,
        total_wave: u32,
    ) -> Result<EntryId, SchedulerError> {
        let manager = Arc::downgrade(&self.inner);

        let schedule = match self.inner.parser.parse(spec) {
            Ok(schedule) => schedule,
            Err(e) => {
                let job = Job::down(unit, wave, total_wave, manager, &e);
                warn!(name = %job.name(), error = %e, "job registered as down");
                self.inner.down_jobs.write().await.push(job);
                return Err(e.into());
            }
        };

        let job = Job::new(unit, wave, total_wave, manager);
        let id = self.inner.dispatcher.schedule(schedule, Arc::clone(&job)).await;
        info!(entry_id = %id, name = %job.name(), "job scheduled");
        Ok(id)
    }

    /// Stop future runs of a job. Unknown ids are ignored and down jobs
    /// cannot be removed. A run already in progress finishes normally.
    pub async fn remove(&self, id: EntryId) {
        self.inner.dispatcher.remove(id).await;
    }

    /// Start dispatching. Starting a running manager does nothing.
    pub fn start(&self) {
        self.inner.dispatcher.start();
    }

    /// Stop dispatching. Runs already in progress are not interrupted.
    pub fn stop(&self) {
        self.inner.dispatcher.stop();
    }

    /// Registered entries, ordered by next fire time.
    pub async fn entries(&self) -> Vec<Entry> {
        self.inner.dispatcher.entries().await
    }

    pub async fn entry(&self, id: EntryId) -> Option<Entry> {
        self.inner.dispatcher.entry(id).await
    }

    /// Jobs whose spec failed to parse, in registration order.
    pub async fn down_jobs(&self) -> Vec<Arc<Job>> {
        self.inner.down_jobs.read().await.clone()
    }

    pub fn info(&self) -> ManagerInfo {
        let now = self.inner.dispatcher.now();
        let up_time = (now - self.inner.created_at).to_std().unwrap_or_default();
        ManagerInfo {
            location: self.inner.timezone.name().to_string(),
            created_time: self.inner.created_at.fixed_offset(),
            current_time: now.fixed_offset(),
            up_time: format_up_time(up_time),
        }
    }

    /// Snapshot of every job, live and down, for the status page.
    ///
    /// Live jobs are sorted by `sort_query`; down jobs keep their
    /// registration order and go first or last depending on configuration.
    /// An empty query sorts by id.
    pub async fn get_status_data(&self, sort_query: &str) -> StatusPageData {
        let query = if sort_query.trim().is_empty() {
            DEFAULT_STATUS_SORT
        } else {
            sort_query
        };
        let sorts = Sorts::parse(query);

        let mut live: Vec<StatusData> = self
            .entries()
            .await
            .into_iter()
            .map(|entry| StatusData {
                id: entry.id,
                job: entry.job.snapshot(),
                next: entry.next.map(|t| t.fixed_offset()),
                prev: entry.prev.map(|t| t.fixed_offset()),
            })
            .collect();
        sort_status_data(&mut live, &sorts);

        let down = self
            .inner
            .down_jobs
            .read()
            .await
            .iter()
            .map(|job| StatusData {
                id: EntryId::default(),
                job: job.snapshot(),
                next: None,
                prev: None,
            })
            .collect::<Vec<_>>();

        let data = if self.inner.high_priority_down_jobs {
            down.into_iter().chain(live).collect()
        } else {
            live.into_iter().chain(down).collect()
        };

        StatusPageData {
            data,
            sort: Sort::new(query, &sorts),
        }
    }

    /// One page of run history with links to the neighboring pages.
    ///
    /// A storage reporting nothing found yields an empty page.
    pub async fn get_history_data(
        &self,
        mut request: PageRequest,
    ) -> Result<HistoryPageData, SchedulerError> {
        request.validate()?;
        let Some(url) = request.url.clone() else {
            return Err(crate::PageError::MissingUrl.into());
        };

        let sorts = Sorts::parse(&request.sort);
        let storage = &self.inner.storage;

        let mut data = match storage
            .read_histories(&HistoryFilter {
                sorts: sorts.clone(),
                limit: request.limit,
                starting_after: request.starting_after,
                ending_before: request.ending_before,
            })
            .await
        {
            Ok(data) => data,
            Err(StorageError::NotFound) => {
                debug!("no history found");
                return Ok(HistoryPageData::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut pagination = PageResponse {
            sort: request.sort.clone(),
            starting_after: request.starting_after,
            ending_before: request.ending_before,
            total: data.len(),
            yielded: data.len(),
            limit: request.limit,
            previous_uri: None,
            next_uri: None,
            cursor_range: Vec::new(),
        };

        if let (Some(first), Some(last)) = (data.first(), data.last()) {
            pagination.cursor_range = vec![first.id, last.id];

            let has_next = storage
                .read_histories(&HistoryFilter {
                    sorts: sorts.clone(),
                    limit: 1,
                    starting_after: pagination.next_page_cursor(),
                    ending_before: None,
                })
                .await
                .is_ok_and(|next| !next.is_empty());
            if has_next {
                pagination.next_uri = Some(pagination.next_page_request().uri(&url));
            }

            let has_prev = storage
                .read_histories(&HistoryFilter {
                    sorts: sorts.clone(),
                    limit: 1,
                    starting_after: None,
                    ending_before: pagination.prev_page_cursor(),
                })
                .await
                .is_ok_and(|prev| !prev.is_empty());
            if has_prev {
                pagination.previous_uri = Some(pagination.prev_page_request().uri(&url));
            }
        }

        let timezone = self.inner.timezone;
        for record in &mut data {
            record.created_at = in_timezone(record.created_at, timezone);
            record.started_at = in_timezone(record.started_at, timezone);
            record.finished_at = in_timezone(record.finished_at, timezone);
        }

        Ok(HistoryPageData {
            data,
            pagination,
            sort: Sort::new(request.sort, &sorts),
        })
    }
}

impl Default for Manager {
    fn default() -> Self {
        ManagerBuilder::new().build()
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("timezone", &self.inner.timezone)
            .field("machine_id", &self.inner.machine_id)
            .field("dispatcher", &self.inner.dispatcher)
            .finish()
    }
}

fn default_machine_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

fn wave_number(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn in_timezone(t: DateTime<FixedOffset>, timezone: Tz) -> DateTime<FixedOffset> {
    t.with_timezone(&timezone).fixed_offset()
}

/// Human-readable uptime in whole seconds.
fn format_up_time(d: Duration) -> String {
    humantime::format_duration(Duration::from_secs(d.as_secs())).to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use url::Url;

    use super::*;
    use crate::{MemoryStorage, ParseError, StatusCode, func};

    fn manager() -> Manager {
        Manager::builder()
            .auto_start_disabled()
            .machine_id("test-host")
            .build()
    }

    fn noop() -> FuncJob {
        FuncJob::new("noop", |_ctx| async { Ok(()) })
    }

    #[tokio::test]
    async fn test_schedule_valid_spec() {
        let manager = manager();
        let id = manager.schedule("0 */5 * * * *", noop()).await.unwrap();

        assert!(id.is_valid());
        let entries = manager.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].job.entry_id(), id);
        assert_eq!(entries[0].job.status(), StatusCode::Up);
        assert!(manager.down_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_schedule_invalid_spec_records_down_job() {
        let manager = manager();
        let err = manager.schedule("not a spec", noop()).await.unwrap_err();

        assert!(matches!(
            err,
            SchedulerError::Parse(ParseError::InvalidExpression { .. })
        ));
        assert!(manager.entries().await.is_empty());

        let down = manager.down_jobs().await;
        assert_eq!(down.len(), 1);
        assert_eq!(down[0].status(), StatusCode::Down);
        assert!(!down[0].entry_id().is_valid());
        assert_eq!(down[0].error(), err.to_string());
    }

    #[tokio::test]
    async fn test_schedules_stops_at_first_bad_wave() {
        let manager = manager();
        let err = manager
            .schedules("0 0 1 * * *#bad spec#0 0 3 * * *", "#", noop())
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::Parse(_)));

        let entries = manager.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].job.wave(), 1);
        assert_eq!(entries[0].job.total_wave(), 3);

        let down = manager.down_jobs().await;
        assert_eq!(down.len(), 1);
        assert_eq!(down[0].wave(), 2);
    }

    #[tokio::test]
    async fn test_schedules_registers_every_wave() {
        let manager = manager();
        let ids = manager
            .schedules("0 0 1 * * * | 0 0 2 * * *", "|", noop())
            .await
            .unwrap();

        assert_eq!(ids.len(), 2);
        let entries = manager.entries().await;
        let last = entries.iter().find(|e| e.id == ids[1]).unwrap();
        assert!(last.job.is_last_wave());
    }

    #[tokio::test]
    async fn test_schedules_rejects_bad_arguments() {
        let manager = manager();
        assert!(matches!(
            manager.schedules("", "#", noop()).await,
            Err(SchedulerError::EmptySpec)
        ));
        assert!(matches!(
            manager.schedules("@daily", "", noop()).await,
            Err(SchedulerError::EmptySeparator)
        ));
        assert!(matches!(
            manager.schedules("@daily,@hourly", ",", noop()).await,
            Err(SchedulerError::ReservedSeparator(_))
        ));
        assert!(manager.entries().await.is_empty());
        assert!(manager.down_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_ignores_unknown_ids() {
        let manager = manager();
        let id = manager.schedule("@hourly", noop()).await.unwrap();
        manager.schedule("bad", noop()).await.unwrap_err();

        manager.remove(EntryId(999)).await;
        manager.remove(EntryId::default()).await;
        assert_eq!(manager.entries().await.len(), 1);
        assert_eq!(manager.down_jobs().await.len(), 1);

        manager.remove(id).await;
        assert!(manager.entries().await.is_empty());
        assert_eq!(manager.down_jobs().await.len(), 1);
    }

    #[tokio::test]
    async fn test_down_jobs_first_by_default() {
        let manager = manager();
        manager.schedule("@hourly", noop()).await.unwrap();
        manager.schedule("broken", noop()).await.unwrap_err();
        manager.schedule("@daily", noop()).await.unwrap();

        let page = manager.get_status_data("id:desc").await;
        let statuses: Vec<_> = page.data.iter().map(|d| d.job.status).collect();
        assert_eq!(
            statuses,
            vec![StatusCode::Down, StatusCode::Up, StatusCode::Up]
        );
        assert_eq!(page.data[1].id, EntryId(2));
        assert_eq!(page.sort.query, "id:desc");
        assert_eq!(page.sort.columns["id"], "DESC");
    }

    #[tokio::test]
    async fn test_low_priority_down_jobs_go_last() {
        let manager = Manager::builder()
            .auto_start_disabled()
            .low_priority_down_jobs()
            .build();
        manager.schedule("broken", noop()).await.unwrap_err();
        manager.schedule("@hourly", noop()).await.unwrap();

        let page = manager.get_status_data("").await;
        assert_eq!(page.sort.query, "id");
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0].job.status, StatusCode::Up);
        assert_eq!(page.data[1].job.status, StatusCode::Down);
        assert!(page.data[1].next.is_none());
    }

    #[tokio::test]
    async fn test_removed_job_leaves_status_data() {
        let manager = manager();
        let id = manager.schedule("@hourly", noop()).await.unwrap();
        manager.remove(id).await;
        assert!(manager.get_status_data("").await.data.is_empty());
    }

    #[tokio::test]
    async fn test_run_goes_through_manager_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counting = {
            let calls = Arc::clone(&calls);
            crate::interceptor(move |ctx, job, next| {
                calls.fetch_add(1, Ordering::SeqCst);
                next(ctx, job)
            })
        };
        let manager = Manager::builder()
            .auto_start_disabled()
            .interceptor(counting)
            .build();
        manager
            .schedule("@hourly", func(|_ctx| async { Ok(()) }))
            .await
            .unwrap();

        let job = Arc::clone(&manager.entries().await[0].job);
        job.run().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(job.status(), StatusCode::Idle);
    }

    #[tokio::test]
    async fn test_history_written_and_paginated() {
        let storage = Arc::new(MemoryStorage::new());
        let manager = Manager::builder()
            .auto_start_disabled()
            .machine_id("worker-7")
            .storage(storage.clone())
            .build();
        manager
            .schedules_func("@hourly#@daily", "#", "report", |_ctx| async {
                Err(JobError::msg("upstream down").with_code("UPSTREAM"))
            })
            .await
            .unwrap();

        for entry in manager.entries().await {
            entry.job.run().await;
            entry.job.run().await;
        }
        assert_eq!(storage.len().await, 4);

        let url = Url::parse("http://localhost/api/histories").unwrap();
        let page = manager
            .get_history_data(PageRequest {
                limit: 2,
                ..PageRequest::new(url.clone())
            })
            .await
            .unwrap();

        assert_eq!(page.data.len(), 2);
        assert_eq!(page.pagination.cursor_range, vec![1, 2]);
        assert_eq!(
            page.pagination.next_uri.as_deref(),
            Some("/api/histories?limit=2&sort=id&starting_after=2")
        );
        assert!(page.pagination.previous_uri.is_none());

        let record = &page.data[0];
        assert_eq!(record.name, "report");
        assert_eq!(record.status, "ERROR");
        assert_eq!(record.status_code, StatusCode::Error.code());
        assert_eq!(record.metadata.machine_id, "worker-7");
        assert_eq!(record.metadata.total_wave, Some(2));
        let error = record.error.as_ref().unwrap();
        assert_eq!(error.err, "upstream down");
        assert_eq!(error.code.as_deref(), Some("UPSTREAM"));

        let next = manager
            .get_history_data(PageRequest {
                limit: 2,
                starting_after: Some(2),
                ..PageRequest::new(url)
            })
            .await
            .unwrap();
        assert_eq!(next.pagination.cursor_range, vec![3, 4]);
        assert!(next.pagination.next_uri.is_none());
        assert_eq!(
            next.pagination.previous_uri.as_deref(),
            Some("/api/histories?ending_before=3&limit=2&sort=id")
        );
    }

    #[tokio::test]
    async fn test_history_requires_url() {
        let manager = manager();
        let err = manager
            .get_history_data(PageRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::Page(crate::PageError::MissingUrl)
        ));
    }

    #[tokio::test]
    async fn test_history_not_found_is_empty_page() {
        let storage = Arc::new(MemoryStorage::new());
        let manager = Manager::builder()
            .auto_start_disabled()
            .storage(storage)
            .build();

        let page = manager
            .get_history_data(PageRequest {
                starting_after: Some(10),
                ..PageRequest::new(Url::parse("http://localhost/histories").unwrap())
            })
            .await
            .unwrap();
        assert!(page.data.is_empty());
        assert!(page.pagination.cursor_range.is_empty());
    }

    #[tokio::test]
    async fn test_info_reports_timezone() {
        let tz: Tz = "Asia/Jakarta".parse().unwrap();
        let manager = Manager::builder()
            .auto_start_disabled()
            .timezone(tz)
            .build();

        let info = manager.info();
        assert_eq!(info.location, "Asia/Jakarta");
        assert_eq!(info.current_time.offset().local_minus_utc(), 7 * 3600);
        assert!(info.current_time >= info.created_time);
        assert!(!info.up_time.contains("ms"));
    }

    #[test]
    fn test_up_time_truncated_to_seconds() {
        assert_eq!(format_up_time(Duration::new(5, 123_456_789)), "5s");
        assert_eq!(format_up_time(Duration::from_millis(999)), "0s");
        assert_eq!(format_up_time(Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[tokio::test]
    async fn test_auto_start_and_stop() {
        let manager = Manager::builder().build();
        assert!(manager.is_running());
        manager.stop();
        assert!(!manager.is_running());

        let manager = manager_with_clone_dropped();
        assert!(manager.is_running());
    }

    fn manager_with_clone_dropped() -> Manager {
        let manager = Manager::builder().build();
        let clone = manager.clone();
        drop(clone);
        manager
    }
}
