//! Per-invocation execution context.

use serde::{Deserialize, Serialize};

use crate::EntryId;

/// Scheduling position of a job, visible to the job while it runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetadata {
    /// Dispatcher entry id (zero for jobs that failed to register).
    pub entry_id: EntryId,
    /// 1-based position within a multi-schedule registration.
    pub wave: u32,
    /// Number of schedules registered together with this one.
    pub total_wave: u32,
    /// Whether this is the final wave.
    pub is_last_wave: bool,
}

/// Context handed through the interceptor chain to the unit of work.
///
/// A fresh context is built for every run. Interceptors may enrich it before
/// passing it on.
#[derive(Debug, Clone, Default)]
pub struct JobContext {
    metadata: Option<JobMetadata>,
    request_id: Option<String>,
}

impl JobContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the job metadata in the context.
    pub fn with_metadata(mut self, metadata: JobMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Store a request id used to correlate log lines of one run.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Job metadata, if the context was created by a job run.
    pub fn metadata(&self) -> Option<&JobMetadata> {
        self.metadata.as_ref()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}
