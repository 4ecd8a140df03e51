//! Job status codes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Current status of a job.
///
/// The discriminants are the values stored in the job's atomic status cell
/// and written to run history as `status_code`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum StatusCode {
    /// Schedule spec failed to parse; the job is never dispatched.
    Down = 0,
    /// Registered but never run.
    #[default]
    Up = 1,
    /// Last run succeeded; waiting for the next execution time.
    Idle = 2,
    /// A run is in progress.
    Running = 3,
    /// Last run failed.
    Error = 4,
}

impl StatusCode {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusCode::Down => "DOWN",
            StatusCode::Up => "UP",
            StatusCode::Idle => "IDLE",
            StatusCode::Running => "RUNNING",
            StatusCode::Error => "ERROR",
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<u8> for StatusCode {
    fn from(v: u8) -> Self {
        match v {
            0 => StatusCode::Down,
            2 => StatusCode::Idle,
            3 => StatusCode::Running,
            4 => StatusCode::Error,
            _ => StatusCode::Up,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
