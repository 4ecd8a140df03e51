//! The unit-of-work contract.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{JobContext, JobError};

/// A unit of work that can be scheduled.
///
/// The display name is declared by the unit itself; units without a name show
/// up as `(nameless)` on the status page.
#[async_trait]
pub trait Runnable: Send + Sync {
    /// Name shown on the status page and written to run history.
    fn name(&self) -> Option<&str> {
        None
    }

    /// Execute one run.
    async fn run(&self, ctx: &JobContext) -> Result<(), JobError>;
}

#[async_trait]
impl<R: Runnable + ?Sized> Runnable for Arc<R> {
    fn name(&self) -> Option<&str> {
        (**self).name()
    }

    async fn run(&self, ctx: &JobContext) -> Result<(), JobError> {
        (**self).run(ctx).await
    }
}

type FuncFuture = Pin<Box<dyn Future<Output = Result<(), JobError>> + Send>>;

type BoxedFunc = Box<dyn Fn(JobContext) -> FuncFuture + Send + Sync>;

/// Adapter turning an async closure into a [`Runnable`].
pub struct FuncJob {
    name: Option<String>,
    func: BoxedFunc,
}

impl FuncJob {
    /// Wrap a closure under an explicit name.
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        Self {
            name: Some(name.into()),
            func: Box::new(move |ctx| -> FuncFuture { Box::pin(f(ctx)) }),
        }
    }

    /// Wrap a closure without a name.
    pub fn nameless<F, Fut>(f: F) -> Self
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        Self {
            name: None,
            func: Box::new(move |ctx| -> FuncFuture { Box::pin(f(ctx)) }),
        }
    }
}

/// Wrap a bare closure; the job will be listed as `(nameless)`.
pub fn func<F, Fut>(f: F) -> FuncJob
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    FuncJob::nameless(f)
}

impl fmt::Debug for FuncJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncJob").field("name", &self.name).finish()
    }
}

#[async_trait]
impl Runnable for FuncJob {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    async fn run(&self, ctx: &JobContext) -> Result<(), JobError> {
        (self.func)(ctx.clone()).await
    }
}
