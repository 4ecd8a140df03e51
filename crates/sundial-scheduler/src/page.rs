//! Data returned by the status and history queries.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::{EntryId, History, JobSnapshot, PageResponse, Sort};

/// A job paired with its fire times. Down jobs have no id and no times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusData {
    pub id: EntryId,
    pub job: JobSnapshot,
    pub next: Option<DateTime<FixedOffset>>,
    pub prev: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPageData {
    pub data: Vec<StatusData>,
    pub sort: Sort,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryPageData {
    pub data: Vec<History>,
    pub pagination: PageResponse,
    pub sort: Sort,
}
