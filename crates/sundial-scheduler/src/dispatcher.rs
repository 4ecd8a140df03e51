//! Dispatch loop firing jobs at their scheduled times.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, RwLock, watch};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{Job, Schedule};

/// Maximum time the loop sleeps before re-checking its entries.
const MAX_SLEEP: Duration = Duration::from_secs(60);

/// Identifier of a registered entry. Zero means "not registered".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl EntryId {
    /// Whether this id refers to a registered entry.
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered job together with its fire times.
#[derive(Clone)]
pub struct Entry {
    pub id: EntryId,
    pub schedule: Schedule,
    /// Next fire time; unset until the dispatcher is running.
    pub next: Option<DateTime<Tz>>,
    /// Last fire time; unset until the job has been dispatched once.
    pub prev: Option<DateTime<Tz>>,
    pub job: Arc<Job>,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("next", &self.next)
            .field("prev", &self.prev)
            .field("job", &self.job.name())
            .finish()
    }
}

/// Owns the entry table and the dispatch loop.
///
/// Each due entry is run on its own task, so a slow job never delays others.
/// Cloning is cheap; clones share the same table.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    timezone: Tz,
    entries: RwLock<Vec<Entry>>,
    next_id: AtomicU64,
    running: AtomicBool,
    wake: Notify,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
}

impl Dispatcher {
    pub fn new(timezone: Tz) -> Self {
        Self {
            inner: Arc::new(Inner {
                timezone,
                entries: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
                running: AtomicBool::new(false),
                wake: Notify::new(),
                shutdown: Mutex::new(None),
            }),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.inner.timezone
    }

    /// Current time in the dispatcher's timezone.
    pub fn now(&self) -> DateTime<Tz> {
        self.inner.now()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Register a job. The id is stored on the job before it can fire.
    pub async fn schedule(&self, schedule: Schedule, job: Arc<Job>) -> EntryId {
        let id = EntryId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        job.set_entry_id(id);

        let next = if self.is_running() {
            schedule.next_after(&self.now())
        } else {
            None
        };

        self.inner.entries.write().await.push(Entry {
            id,
            schedule,
            next,
            prev: None,
            job,
        });
        self.inner.wake.notify_one();

        debug!(entry_id = %id, "entry added");
        id
    }

    /// Deregister an entry. Unknown ids are ignored.
    pub async fn remove(&self, id: EntryId) {
        let mut entries = self.inner.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.id != id);

        if entries.len() != before {
            debug!(entry_id = %id, "entry removed");
            self.inner.wake.notify_one();
        }
    }

    /// Snapshot of all entries, ordered by next fire time with unset last.
    pub async fn entries(&self) -> Vec<Entry> {
        let mut entries = self.inner.entries.read().await.clone();
        entries.sort_by_key(|e| (e.next.is_none(), e.next));
        entries
    }

    pub async fn entry(&self, id: EntryId) -> Option<Entry> {
        self.inner
            .entries
            .read()
            .await
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    /// Spawn the dispatch loop on the current tokio runtime.
    ///
    /// Does nothing if the loop is already running.
    pub fn start(&self) {
        let mut shutdown = self
            .inner
            .shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if shutdown.is_some() {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime available, dispatcher not started");
            return;
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *shutdown = Some(shutdown_tx);
        self.inner.running.store(true, Ordering::SeqCst);

        runtime.spawn(run_loop(Arc::clone(&self.inner), shutdown_rx));
    }

    /// Stop dispatching. Runs already in progress are not interrupted.
    pub fn stop(&self) {
        let sender = self
            .inner
            .shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(sender) = sender {
            self.inner.running.store(false, Ordering::SeqCst);
            let _ = sender.send(true);
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("timezone", &self.inner.timezone)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Inner {
    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.timezone)
    }

    async fn sleep_duration(&self) -> Duration {
        let now = self.now();
        let entries = self.entries.read().await;

        match entries.iter().filter_map(|e| e.next).min() {
            Some(next) => (next - now).to_std().unwrap_or(Duration::ZERO).min(MAX_SLEEP),
            None => MAX_SLEEP,
        }
    }

    /// Advance every due entry and return the jobs to run.
    async fn take_due(&self) -> Vec<Arc<Job>> {
        let now = self.now();
        let mut entries = self.entries.write().await;
        let mut due = Vec::new();

        for entry in entries.iter_mut() {
            match entry.next {
                Some(next) if next <= now => {
                    entry.prev = Some(next);
                    entry.next = entry.schedule.next_after(&now);
                    due.push(Arc::clone(&entry.job));
                }
                _ => {}
            }
        }

        due
    }
}

async fn run_loop(inner: Arc<Inner>, mut shutdown_rx: watch::Receiver<bool>) {
    info!(timezone = %inner.timezone, "dispatcher starting");

    {
        let now = inner.now();
        let mut entries = inner.entries.write().await;
        for entry in entries.iter_mut() {
            entry.next = entry.schedule.next_after(&now);
        }
    }

    loop {
        let sleep_duration = inner.sleep_duration().await;

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
                continue;
            }
            _ = inner.wake.notified() => continue,
            _ = sleep(sleep_duration) => {}
        }

        for job in inner.take_due().await {
            debug!(entry_id = %job.entry_id(), name = %job.name(), "dispatching job");
            tokio::spawn(async move { job.run().await });
        }
    }

    info!("dispatcher stopped");
}
