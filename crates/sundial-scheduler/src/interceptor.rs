//! Interceptor chain wrapping job execution.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::{Job, JobContext, JobError};

/// Boxed future returned by handlers and interceptors.
pub type RunFuture = Pin<Box<dyn Future<Output = Result<(), JobError>> + Send>>;

/// Continues execution of a job.
pub type Handler = Arc<dyn Fn(JobContext, Arc<Job>) -> RunFuture + Send + Sync>;

/// Middleware around job execution.
///
/// An interceptor receives the next handler and decides whether (and how
/// often) to call it. Returning without calling it short-circuits the run.
pub type Interceptor = Arc<dyn Fn(JobContext, Arc<Job>, Handler) -> RunFuture + Send + Sync>;

/// Build a [`Handler`] from an async closure.
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(JobContext, Arc<Job>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    Arc::new(move |ctx, job| -> RunFuture { Box::pin(f(ctx, job)) })
}

/// Build an [`Interceptor`] from an async closure.
pub fn interceptor<F, Fut>(f: F) -> Interceptor
where
    F: Fn(JobContext, Arc<Job>, Handler) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    Arc::new(move |ctx, job, next| -> RunFuture { Box::pin(f(ctx, job, next)) })
}

/// Compose interceptors into one.
///
/// The first interceptor is the outermost: its code before `next` runs first
/// and its code after `next` runs last. An empty chain calls the handler
/// directly.
pub fn chain(interceptors: impl IntoIterator<Item = Interceptor>) -> Interceptor {
    let interceptors: Arc<[Interceptor]> = interceptors.into_iter().collect();

    Arc::new(move |ctx: JobContext, job: Arc<Job>, handler: Handler| -> RunFuture {
        let mut chained: Handler = handler;
        for current in interceptors.iter().rev() {
            let current = Arc::clone(current);
            let next = chained;
            chained = Arc::new(move |ctx: JobContext, job: Arc<Job>| -> RunFuture {
                current(ctx, job, Arc::clone(&next))
            });
        }
        chained(ctx, job)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use proptest::prelude::*;

    use super::*;
    use crate::func;

    fn test_job() -> Arc<Job> {
        Job::standalone(func(|_ctx| async { Ok(()) }))
    }

    fn recording(log: Arc<Mutex<Vec<String>>>, label: &'static str) -> Interceptor {
        interceptor(move |ctx, job, next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(format!("{label}:before"));
                let result = next(ctx, job).await;
                log.lock().unwrap().push(format!("{label}:after"));
                result
            }
        })
    }

    #[tokio::test]
    async fn test_empty_chain_is_passthrough() {
        let chained = chain(Vec::new());

        let ok = handler(|_ctx, _job| async { Ok(()) });
        assert!(chained(JobContext::new(), test_job(), ok).await.is_ok());

        let failing = handler(|_ctx, _job| async { Err(JobError::msg("inner failure")) });
        let err = chained(JobContext::new(), test_job(), failing)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "inner failure");
    }

    #[tokio::test]
    async fn test_chain_runs_in_onion_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chained = chain(vec![
            recording(Arc::clone(&log), "first"),
            recording(Arc::clone(&log), "second"),
        ]);

        let inner_log = Arc::clone(&log);
        let terminal = handler(move |_ctx, _job| {
            let log = Arc::clone(&inner_log);
            async move {
                log.lock().unwrap().push("handler".to_string());
                Ok(())
            }
        });

        chained(JobContext::new(), test_job(), terminal).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "first:before",
                "second:before",
                "handler",
                "second:after",
                "first:after",
            ]
        );
    }

    #[tokio::test]
    async fn test_short_circuit_skips_handler() {
        let blocked = interceptor(|_ctx, _job, _next| async { Err(JobError::msg("blocked")) });
        let chained = chain(vec![blocked]);

        let called = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&called);
        let terminal = handler(move |_ctx, _job| {
            let flag = Arc::clone(&flag);
            async move {
                *flag.lock().unwrap() = true;
                Ok(())
            }
        });

        let err = chained(JobContext::new(), test_job(), terminal)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "blocked");
        assert!(!*called.lock().unwrap());
    }

    #[tokio::test]
    async fn test_interceptor_can_wrap_inner_error() {
        let wrapping = interceptor(|ctx, job, next| async move {
            next(ctx, job).await.map_err(|e| e.with_op("wrapped"))
        });
        let chained = chain(vec![wrapping]);
        let failing = handler(|_ctx, _job| async { Err(JobError::msg("inner")) });

        let err = chained(JobContext::new(), test_job(), failing)
            .await
            .unwrap_err();
        assert_eq!(err.op_traces(), ["wrapped".to_string()]);
    }

    #[tokio::test]
    async fn test_interceptor_can_replace_context() {
        let tagging = interceptor(|ctx, job, next| next(ctx.with_request_id("req-42"), job));
        let chained = chain(vec![tagging]);

        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        let terminal = handler(move |ctx, _job| {
            let slot = Arc::clone(&slot);
            async move {
                *slot.lock().unwrap() = ctx.request_id().map(str::to_string);
                Ok(())
            }
        });

        chained(JobContext::new(), test_job(), terminal).await.unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("req-42"));
    }

    proptest! {
        // Any number of passthrough interceptors preserves order and result
        #[test]
        fn chain_preserves_order_for_any_length(len in 0usize..8, fail in proptest::bool::ANY) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(async move {
                let log = Arc::new(Mutex::new(Vec::new()));
                let labels = ["a", "b", "c", "d", "e", "f", "g", "h"];
                let chained = chain(
                    labels[..len]
                        .iter()
                        .map(|label| recording(Arc::clone(&log), *label))
                        .collect::<Vec<_>>(),
                );

                let terminal = handler(move |_ctx, _job| async move {
                    if fail { Err(JobError::msg("fail")) } else { Ok(()) }
                });
                let result = chained(JobContext::new(), test_job(), terminal).await;
                assert_eq!(result.is_err(), fail);

                let log = log.lock().unwrap();
                let expected: Vec<String> = labels[..len]
                    .iter()
                    .map(|l| format!("{l}:before"))
                    .chain(labels[..len].iter().rev().map(|l| format!("{l}:after")))
                    .collect();
                assert_eq!(*log, expected);
            });
        }
    }
}
