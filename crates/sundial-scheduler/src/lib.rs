//! Cron job wrapper for Sundial.
//!
//! This crate wraps units of work into tracked jobs that:
//! - Fire on cron-style schedules (parsed by the `cron` crate)
//! - Never overlap with themselves, even when triggered concurrently
//! - Run through an ordered interceptor chain
//! - Record status, latency and the last error for status pages
//! - Optionally write run history to a pluggable storage backend
//! - Warn when a run outlasts its own schedule period

mod alerter;
mod context;
mod dispatcher;
mod error;
mod history;
mod interceptor;
pub mod interceptors;
mod job;
mod manager;
mod page;
mod pagination;
mod runnable;
mod schedule;
mod sort;
mod status;
mod storage;

pub use alerter::{Alerter, LatencyAlert, LogAlerter};
pub use context::{JobContext, JobMetadata};
pub use dispatcher::{Dispatcher, Entry, EntryId};
pub use error::{ErrorClass, JobError, SchedulerError};
pub use history::{ErrorDetail, History, HistoryFilter, HistoryMetadata};
pub use interceptor::{Handler, Interceptor, RunFuture, chain, handler, interceptor};
pub use job::{Job, JobSnapshot, NAMELESS};
pub use manager::{Manager, ManagerBuilder, ManagerInfo};
pub use page::{HistoryPageData, StatusData, StatusPageData};
pub use pagination::{PageError, PageRequest, PageResponse};
pub use runnable::{FuncJob, Runnable, func};
pub use schedule::{ParseError, Schedule, SpecParser, StandardParser};
pub use sort::{Order, Sort, SortKey, Sorts, StatusColumn, sort_status_data};
pub use status::StatusCode;
pub use storage::{MemoryStorage, NoopStorage, Storage, StorageError};
