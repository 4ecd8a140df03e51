//! High-latency notifications.

use std::time::Duration;

use chrono::DateTime;
use chrono_tz::Tz;
use tracing::warn;

use crate::{Job, JobContext};

/// Details of a run that outlasted its schedule period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatencyAlert {
    pub prev: DateTime<Tz>,
    pub next: DateTime<Tz>,
    pub latency: Duration,
    pub max_latency: Duration,
}

/// Receives high-latency notifications.
///
/// Called on the job's task after the run completes; implementations must
/// return quickly and hand slow delivery off to their own task.
pub trait Alerter: Send + Sync {
    fn notify_high_latency(&self, ctx: &JobContext, job: &Job, alert: &LatencyAlert);
}

/// Default alerter writing a warning to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlerter;

impl Alerter for LogAlerter {
    fn notify_high_latency(&self, ctx: &JobContext, job: &Job, alert: &LatencyAlert) {
        warn!(
            entry_id = %job.entry_id(),
            name = %job.name(),
            request_id = ctx.request_id().unwrap_or_default(),
            prev = %alert.prev,
            next = %alert.next,
            latency = %humantime::format_duration(alert.latency),
            max_latency = %humantime::format_duration(alert.max_latency),
            "job latency exceeded its schedule period"
        );
    }
}
