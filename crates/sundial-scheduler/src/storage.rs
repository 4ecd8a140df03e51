//! Run history storage.

use std::cmp::Ordering;
use std::collections::VecDeque;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{History, HistoryFilter, Order, Sorts};

/// Errors returned by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Nothing matched the query. Treated as an empty page by readers.
    #[error("history not found")]
    NotFound,

    #[error("unknown sort key {0:?}")]
    InvalidSort(String),

    #[error("failed to encode history: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Persists run history.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store a completed run. The storage assigns the record id.
    async fn write_history(&self, history: &History) -> Result<(), StorageError>;

    /// Read one page of records matching the filter.
    async fn read_histories(&self, filter: &HistoryFilter) -> Result<Vec<History>, StorageError>;
}

/// Storage that keeps nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStorage;

#[async_trait]
impl Storage for NoopStorage {
    async fn write_history(&self, _history: &History) -> Result<(), StorageError> {
        Ok(())
    }

    async fn read_histories(&self, _filter: &HistoryFilter) -> Result<Vec<History>, StorageError> {
        Ok(Vec::new())
    }
}

/// In-process storage.
///
/// Records are kept as encoded JSON, so reads go through the same
/// serialization a database-backed store would. With a capacity set, the
/// oldest records are dropped once it is exceeded; ids keep increasing.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: RwLock<MemoryInner>,
    capacity: Option<usize>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    last_id: i64,
    rows: VecDeque<String>,
}

impl MemoryStorage {
    /// Unbounded storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage keeping at most `capacity` records (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(MemoryInner::default()),
            capacity: Some(capacity.max(1)),
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.inner.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn write_history(&self, history: &History) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        let mut record = history.clone();
        record.id = inner.last_id + 1;

        let row = serde_json::to_string(&record)?;
        inner.last_id = record.id;
        inner.rows.push_back(row);

        if let Some(capacity) = self.capacity {
            while inner.rows.len() > capacity {
                inner.rows.pop_front();
            }
        }

        debug!(id = record.id, name = %record.name, "history stored");
        Ok(())
    }

    async fn read_histories(&self, filter: &HistoryFilter) -> Result<Vec<History>, StorageError> {
        let columns = resolve_columns(&filter.sorts)?;

        let mut records = {
            let inner = self.inner.read().await;
            inner
                .rows
                .iter()
                .map(|row| serde_json::from_str::<History>(row))
                .collect::<Result<Vec<_>, _>>()?
        };

        records.sort_by(|a, b| compare(&columns, a, b));

        let position = |cursor: i64| {
            records
                .iter()
                .position(|r| r.id == cursor)
                .ok_or(StorageError::NotFound)
        };

        let page = match (filter.starting_after, filter.ending_before) {
            (Some(cursor), _) => {
                let start = position(cursor)? + 1;
                records.drain(start..).take(filter.limit).collect()
            }
            (None, Some(cursor)) => {
                let end = position(cursor)?;
                let start = end.saturating_sub(filter.limit);
                records.drain(start..end).collect()
            }
            (None, None) => records.into_iter().take(filter.limit).collect(),
        };

        Ok(page)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryColumn {
    Id,
    CreatedAt,
    Name,
    Status,
    StatusCode,
    StartedAt,
    FinishedAt,
    Latency,
}

impl HistoryColumn {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "id" => Some(Self::Id),
            "created_at" => Some(Self::CreatedAt),
            "name" => Some(Self::Name),
            "status" => Some(Self::Status),
            "status_code" => Some(Self::StatusCode),
            "started_at" => Some(Self::StartedAt),
            "finished_at" => Some(Self::FinishedAt),
            "latency" => Some(Self::Latency),
            _ => None,
        }
    }

    fn compare(self, a: &History, b: &History) -> Ordering {
        match self {
            Self::Id => a.id.cmp(&b.id),
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::Name => a.name.cmp(&b.name),
            Self::Status => a.status.cmp(&b.status),
            Self::StatusCode => a.status_code.cmp(&b.status_code),
            Self::StartedAt => a.started_at.cmp(&b.started_at),
            Self::FinishedAt => a.finished_at.cmp(&b.finished_at),
            Self::Latency => a.latency.cmp(&b.latency),
        }
    }
}

fn resolve_columns(sorts: &Sorts) -> Result<Vec<(HistoryColumn, Order)>, StorageError> {
    let mut columns = sorts
        .iter()
        .map(|s| {
            HistoryColumn::from_key(&s.key)
                .map(|c| (c, s.order))
                .ok_or_else(|| StorageError::InvalidSort(s.key.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Ids are unique, so ending on them makes the order total
    if !columns.iter().any(|(c, _)| *c == HistoryColumn::Id) {
        columns.push((HistoryColumn::Id, Order::Asc));
    }
    Ok(columns)
}

/// First key dominates, like an SQL `ORDER BY`.
fn compare(columns: &[(HistoryColumn, Order)], a: &History, b: &History) -> Ordering {
    columns
        .iter()
        .map(|(column, order)| order.apply(column.compare(a, b)))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}
