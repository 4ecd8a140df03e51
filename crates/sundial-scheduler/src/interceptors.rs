//! Built-in interceptors.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tracing::{debug, error};

use crate::{Interceptor, JobError, interceptor};

/// Pool size used when none (or zero) is given.
pub const DEFAULT_WORKER_POOL_SIZE: usize = 1000;

/// Log every run: failures at error level, successes at debug level with
/// their latency.
pub fn logger() -> Interceptor {
    interceptor(|ctx, job, next| async move {
        let start = Instant::now();
        let name = job.name().to_string();
        let request_id = ctx.request_id().map(str::to_string);

        match next(ctx, job).await {
            Ok(()) => {
                debug!(
                    name = %name,
                    request_id = request_id.as_deref().unwrap_or_default(),
                    latency = %humantime::format_duration(start.elapsed()),
                    "cron job succeeded"
                );
                Ok(())
            }
            Err(e) => {
                error!(
                    name = %name,
                    request_id = request_id.as_deref().unwrap_or_default(),
                    error = %e,
                    code = e.code().unwrap_or_default(),
                    "cron job failed"
                );
                Err(e)
            }
        }
    })
}

/// Convert a panic anywhere further down the chain into an error.
pub fn recover() -> Interceptor {
    interceptor(|ctx, job, next| async move {
        let name = job.name().to_string();
        // `next` is called inside the guarded future so a panic while
        // building an inner future is caught as well
        let guarded = async move { next(ctx, job).await };
        match AssertUnwindSafe(guarded).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let err = JobError::from_panic(payload).with_op(name.clone());
                error!(name = %name, error = %err, "recovered from panic");
                Err(err)
            }
        }
    })
}

/// Limit how many jobs run at the same time across everything sharing this
/// interceptor. Runs over the limit wait for a free slot.
pub fn worker_pool(size: usize) -> Interceptor {
    let size = if size == 0 {
        DEFAULT_WORKER_POOL_SIZE
    } else {
        size
    };
    let pool = Arc::new(Semaphore::new(size));

    interceptor(move |ctx, job, next| {
        let pool = Arc::clone(&pool);
        async move {
            let _permit = pool
                .acquire_owned()
                .await
                .map_err(|e| JobError::msg(format!("worker pool closed: {}", e)))?;
            next(ctx, job).await
        }
    })
}

pub fn default_worker_pool() -> Interceptor {
    worker_pool(DEFAULT_WORKER_POOL_SIZE)
}

/// Attach a fresh request id to the context unless one is already set.
pub fn request_id() -> Interceptor {
    interceptor(|ctx, job, next| {
        let ctx = if ctx.request_id().is_some() {
            ctx
        } else {
            ctx.with_request_id(uuid::Uuid::new_v4().to_string())
        };
        next(ctx, job)
    })
}
