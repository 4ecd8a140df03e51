//! Run history records.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::{EntryId, ErrorClass, JobError, Sorts};

/// One completed run of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    /// Assigned by the storage on write; zero until then.
    pub id: i64,
    pub created_at: DateTime<FixedOffset>,
    pub name: String,
    pub status: String,
    pub status_code: u8,
    pub started_at: DateTime<FixedOffset>,
    pub finished_at: DateTime<FixedOffset>,
    /// Run duration in nanoseconds.
    pub latency: u64,
    pub latency_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    pub metadata: HistoryMetadata,
}

/// Structured error of a failed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub err: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub op_traces: Vec<String>,
    #[serde(default)]
    pub class: ErrorClass,
}

impl From<&JobError> for ErrorDetail {
    fn from(err: &JobError) -> Self {
        Self {
            err: err.err().to_string(),
            code: err.code().map(str::to_string),
            message: err.message().map(str::to_string),
            fields: err.fields().clone(),
            op_traces: err.op_traces().to_vec(),
            class: err.class(),
        }
    }
}

/// Where and as which wave a run happened.
///
/// Wave fields are only present for multi-wave registrations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMetadata {
    pub machine_id: String,
    pub entry_id: EntryId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wave: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_wave: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_last_wave: Option<bool>,
}

/// Query parameters passed to [`Storage::read_histories`](crate::Storage::read_histories).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryFilter {
    pub sorts: Sorts,
    pub limit: usize,
    /// Only records after this id in the requested order.
    pub starting_after: Option<i64>,
    /// Only the `limit` records right before this id in the requested order.
    pub ending_before: Option<i64>,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample() -> History {
        let at = FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 1, 9, 0, 0)
            .unwrap();
        History {
            id: 7,
            created_at: at,
            name: "send-invoices".to_string(),
            status: "ERROR".to_string(),
            status_code: 4,
            started_at: at,
            finished_at: at + chrono::Duration::milliseconds(1500),
            latency: 1_500_000_000,
            latency_text: "1s 500ms".to_string(),
            error: Some(ErrorDetail::from(
                &JobError::msg("smtp timeout")
                    .with_code("SMTP")
                    .with_field("attempt", 3)
                    .with_op("mailer.send"),
            )),
            metadata: HistoryMetadata {
                machine_id: "worker-1".to_string(),
                entry_id: EntryId(3),
                wave: Some(2),
                total_wave: Some(2),
                is_last_wave: Some(true),
            },
        }
    }

    #[test]
    fn test_serde_preserves_every_field() {
        let history = sample();
        let json = serde_json::to_string(&history).unwrap();
        let back: History = serde_json::from_str(&json).unwrap();
        assert_eq!(back, history);
    }

    #[test]
    fn test_single_wave_omits_wave_fields() {
        let mut history = sample();
        history.error = None;
        history.metadata.wave = None;
        history.metadata.total_wave = None;
        history.metadata.is_last_wave = None;

        let json = serde_json::to_value(&history).unwrap();
        assert!(json.get("error").is_none());
        assert!(json["metadata"].get("wave").is_none());
        assert_eq!(json["metadata"]["entry_id"], 3);
    }
}
