//! Demo jobs registered by `sundial serve`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{info, warn};

use sundial_scheduler::{JobError, Manager};

/// Register a handful of jobs covering each status the page can show.
pub async fn register(manager: &Manager) {
    if let Err(e) = manager
        .schedule_func("@every 10s", "heartbeat", |ctx| async move {
            info!(request_id = ctx.request_id().unwrap_or_default(), "heartbeat");
            Ok(())
        })
        .await
    {
        warn!(error = %e, "failed to register heartbeat");
    }

    let counter = Arc::new(AtomicU64::new(0));
    if let Err(e) = manager
        .schedule_func("*/20 * * * * *", "flaky-sync", move |_ctx| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt % 3 == 0 {
                    return Err(JobError::msg("upstream timed out")
                        .with_code("UPSTREAM_TIMEOUT")
                        .with_field("attempt", attempt));
                }
                Ok(())
            }
        })
        .await
    {
        warn!(error = %e, "failed to register flaky-sync");
    }

    // Runs longer than its period, so it raises latency alerts
    if let Err(e) = manager
        .schedule_func("@every 2s", "slow-report", |_ctx| async {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            Ok(())
        })
        .await
    {
        warn!(error = %e, "failed to register slow-report");
    }

    if let Err(e) = manager
        .schedules_func("0 0 9 * * MON-FRI#0 0 12 * * SAT", "#", "digest", |_ctx| async {
            Ok(())
        })
        .await
    {
        warn!(error = %e, "failed to register digest");
    }

    // Deliberately malformed, shows up as a down job
    if let Err(e) = manager
        .schedule_func("0 0 25 * * *", "misconfigured", |_ctx| async { Ok(()) })
        .await
    {
        warn!(error = %e, "misconfigured demo job is down");
    }
}
