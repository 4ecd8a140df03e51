//! Error types for the scheduler.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{PageError, ParseError, StorageError};

/// Errors that can occur in manager operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Schedule spec could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Multi-wave spec was empty.
    #[error("invalid specification: spec is empty")]
    EmptySpec,

    /// Multi-wave separator was empty.
    #[error("invalid separator: separator is empty")]
    EmptySeparator,

    /// Multi-wave separator collides with the schedule grammar.
    #[error("invalid separator {0:?}: reserved by the schedule grammar")]
    ReservedSeparator(String),

    /// History storage error.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Invalid history page request.
    #[error(transparent)]
    Page(#[from] PageError),
}

/// How a job error should be treated by alerting and reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Unexpected failure.
    #[default]
    Error,
    /// Failure the job owner anticipates (e.g. nothing to process).
    Expected,
    /// The job panicked and the panic was converted into an error.
    Panic,
}

/// Error returned by a unit of work.
///
/// Any `std::error::Error` converts into a `JobError` with `?`, so units can
/// propagate their own errors and optionally enrich them with a code, a
/// human-facing message, fields and operation traces.
#[derive(Debug, Clone, PartialEq)]
pub struct JobError {
    err: String,
    code: Option<String>,
    message: Option<String>,
    fields: BTreeMap<String, serde_json::Value>,
    op_traces: Vec<String>,
    class: ErrorClass,
}

impl JobError {
    /// Create an error from a plain message.
    pub fn msg(err: impl Into<String>) -> Self {
        Self {
            err: err.into(),
            code: None,
            message: None,
            fields: BTreeMap::new(),
            op_traces: Vec::new(),
            class: ErrorClass::Error,
        }
    }

    /// Convert a panic payload into an error.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let text = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };

        let mut err = Self::msg(format!("panic: {}", text));
        err.class = ErrorClass::Panic;
        err
    }

    /// Attach a machine-readable error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach a human-facing message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach a structured field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Record the operation the error passed through.
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op_traces.push(op.into());
        self
    }

    /// Mark the error as anticipated by the job owner.
    pub fn expected(mut self) -> Self {
        self.class = ErrorClass::Expected;
        self
    }

    pub fn err(&self) -> &str {
        &self.err
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn fields(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.fields
    }

    pub fn op_traces(&self) -> &[String] {
        &self.op_traces
    }

    pub fn class(&self) -> ErrorClass {
        self.class
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.err)
    }
}

impl<E> From<E> for JobError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::msg(err.to_string())
    }
}
