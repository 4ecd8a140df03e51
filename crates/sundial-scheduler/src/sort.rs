//! Sort specs and status data ordering.
//!
//! A sort spec is a comma-separated list of `key[:asc|:desc]` pairs, e.g.
//! `status,next_run:desc`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::StatusData;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl Order {
    pub fn as_str(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            Order::Asc => Order::Desc,
            Order::Desc => Order::Asc,
        }
    }

    /// Apply this direction to an ascending comparison.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Order::Asc => ordering,
            Order::Desc => ordering.reverse(),
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `key:direction` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub key: String,
    pub order: Order,
}

/// Parsed sort spec, in the order given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sorts(Vec<SortKey>);

impl Sorts {
    /// Parse a sort spec. Empty segments are skipped; any direction other
    /// than `desc` means ascending.
    pub fn parse(query: &str) -> Self {
        let keys = query
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|segment| {
                let (key, direction) = match segment.split_once(':') {
                    Some((key, direction)) => (key.trim(), direction.trim()),
                    None => (segment, ""),
                };
                if key.is_empty() {
                    return None;
                }
                let order = if direction.eq_ignore_ascii_case("desc") {
                    Order::Desc
                } else {
                    Order::Asc
                };
                Some(SortKey {
                    key: key.to_string(),
                    order,
                })
            })
            .collect();
        Self(keys)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SortKey> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Same keys with every direction flipped.
    pub fn reversed(&self) -> Self {
        Self(
            self.0
                .iter()
                .map(|s| SortKey {
                    key: s.key.clone(),
                    order: s.order.reverse(),
                })
                .collect(),
        )
    }

    /// Map of key to `ASC`/`DESC`, used by the HTML views to mark sorted
    /// columns.
    pub fn columns(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|s| (s.key.clone(), s.order.as_str().to_string()))
            .collect()
    }
}

impl From<Vec<SortKey>> for Sorts {
    fn from(keys: Vec<SortKey>) -> Self {
        Self(keys)
    }
}

/// The sort applied to a page, echoed back to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub query: String,
    pub columns: BTreeMap<String, String>,
}

impl Sort {
    pub fn new(query: impl Into<String>, sorts: &Sorts) -> Self {
        Self {
            query: query.into(),
            columns: sorts.columns(),
        }
    }
}

/// Sortable columns of the status page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColumn {
    Id,
    Name,
    Status,
    PrevRun,
    NextRun,
    Latency,
}

impl StatusColumn {
    pub const ALL: [StatusColumn; 6] = [
        StatusColumn::Id,
        StatusColumn::Name,
        StatusColumn::Status,
        StatusColumn::PrevRun,
        StatusColumn::NextRun,
        StatusColumn::Latency,
    ];

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == key)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusColumn::Id => "id",
            StatusColumn::Name => "name",
            StatusColumn::Status => "status",
            StatusColumn::PrevRun => "prev_run",
            StatusColumn::NextRun => "next_run",
            StatusColumn::Latency => "latency",
        }
    }

    /// Ascending comparison for this column.
    pub fn compare(self, a: &StatusData, b: &StatusData) -> Ordering {
        match self {
            StatusColumn::Id => a.id.cmp(&b.id),
            StatusColumn::Name => a
                .job
                .name
                .cmp(&b.job.name)
                .then(a.job.metadata.wave.cmp(&b.job.metadata.wave)),
            StatusColumn::Status => a.job.status.as_str().cmp(b.job.status.as_str()),
            StatusColumn::PrevRun => compare_time(a.prev.as_ref(), b.prev.as_ref()),
            StatusColumn::NextRun => compare_time(a.next.as_ref(), b.next.as_ref()),
            StatusColumn::Latency => a.job.latency_ns.cmp(&b.job.latency_ns),
        }
    }
}

/// Compare fire times with unset treated as later than any set time.
pub fn compare_time(
    a: Option<&DateTime<FixedOffset>>,
    b: Option<&DateTime<FixedOffset>>,
) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => a.cmp(b),
    }
}

/// Sort status data by each key in turn.
///
/// Every key is a separate stable pass, so the last key given is the
/// primary one and earlier keys break its ties. Unknown keys sort by id
/// ascending.
pub fn sort_status_data(data: &mut [StatusData], sorts: &Sorts) {
    for sort in sorts.iter() {
        let (column, order) = match StatusColumn::from_key(&sort.key) {
            Some(column) => (column, sort.order),
            None => (StatusColumn::Id, Order::Asc),
        };
        data.sort_by(|a, b| order.apply(column.compare(a, b)));
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use proptest::prelude::*;

    use super::*;
    use crate::{EntryId, JobMetadata, JobSnapshot, StatusCode};

    fn at(minute: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 1, 12, minute, 0)
            .unwrap()
    }

    fn row(id: u64, name: &str, status: StatusCode, next: Option<u32>) -> StatusData {
        StatusData {
            id: EntryId(id),
            job: JobSnapshot {
                metadata: JobMetadata {
                    entry_id: EntryId(id),
                    wave: 1,
                    total_wave: 1,
                    is_last_wave: true,
                },
                name: name.to_string(),
                status,
                latency: String::new(),
                latency_ns: id * 10,
                error: String::new(),
            },
            next: next.map(at),
            prev: None,
        }
    }

    fn ids(data: &[StatusData]) -> Vec<u64> {
        data.iter().map(|d| d.id.0).collect()
    }

    #[test]
    fn test_parse_sort_spec() {
        let sorts = Sorts::parse("name, status:DESC ,latency:asc,,:desc");
        let keys: Vec<_> = sorts.iter().map(|s| (s.key.as_str(), s.order)).collect();
        assert_eq!(
            keys,
            vec![
                ("name", Order::Asc),
                ("status", Order::Desc),
                ("latency", Order::Asc),
            ]
        );
        assert_eq!(sorts.columns()["status"], "DESC");
        assert!(Sorts::parse("").is_empty());
    }

    #[test]
    fn test_reversed_flips_every_direction() {
        let sorts = Sorts::parse("id,name:desc").reversed();
        assert_eq!(sorts.columns()["id"], "DESC");
        assert_eq!(sorts.columns()["name"], "ASC");
    }

    #[test]
    fn test_next_run_puts_unset_last() {
        let mut data = vec![
            row(1, "a", StatusCode::Up, None),
            row(2, "b", StatusCode::Up, Some(30)),
            row(3, "c", StatusCode::Up, None),
            row(4, "d", StatusCode::Up, Some(10)),
        ];
        sort_status_data(&mut data, &Sorts::parse("next_run"));
        assert_eq!(ids(&data), vec![4, 2, 1, 3]);
    }

    #[test]
    fn test_descending_is_stable_reverse() {
        let mut data = vec![
            row(1, "same", StatusCode::Idle, None),
            row(2, "other", StatusCode::Error, None),
            row(3, "same", StatusCode::Idle, None),
        ];
        sort_status_data(&mut data, &Sorts::parse("name:desc"));
        assert_eq!(ids(&data), vec![1, 3, 2]);
    }

    #[test]
    fn test_later_keys_dominate() {
        let mut data = vec![
            row(3, "x", StatusCode::Idle, None),
            row(1, "y", StatusCode::Error, None),
            row(2, "x", StatusCode::Error, None),
        ];
        sort_status_data(&mut data, &Sorts::parse("id,status"));
        // ERROR < IDLE; ids break the tie
        assert_eq!(ids(&data), vec![1, 2, 3]);
    }

    #[test]
    fn test_unknown_key_sorts_by_id() {
        let mut data = vec![
            row(3, "c", StatusCode::Up, None),
            row(1, "a", StatusCode::Up, None),
            row(2, "b", StatusCode::Up, None),
        ];
        sort_status_data(&mut data, &Sorts::parse("color:desc"));
        assert_eq!(ids(&data), vec![1, 2, 3]);
    }

    proptest! {
        #[test]
        fn unset_next_run_always_after_set(
            nexts in proptest::collection::vec(proptest::option::of(0u32..60), 0..20)
        ) {
            let mut data: Vec<_> = nexts
                .iter()
                .enumerate()
                .map(|(i, n)| row(i as u64 + 1, "job", StatusCode::Up, *n))
                .collect();
            sort_status_data(&mut data, &Sorts::parse("next_run"));

            let first_unset = data.iter().position(|d| d.next.is_none()).unwrap_or(data.len());
            prop_assert!(data[first_unset..].iter().all(|d| d.next.is_none()));

            // Unset rows keep their merge order
            let unset_ids: Vec<_> = data[first_unset..].iter().map(|d| d.id.0).collect();
            let mut sorted = unset_ids.clone();
            sorted.sort_unstable();
            prop_assert_eq!(unset_ids, sorted);

            let set: Vec<_> = data[..first_unset].iter().map(|d| d.next).collect();
            prop_assert!(set.windows(2).all(|w| w[0] <= w[1]));
        }

        #[test]
        fn descending_reverses_distinct_ids(count in 0usize..30) {
            let mut data: Vec<_> = (1..=count as u64)
                .map(|i| row(i, "job", StatusCode::Idle, None))
                .collect();
            sort_status_data(&mut data, &Sorts::parse("id:desc"));
            let expected: Vec<_> = (1..=count as u64).rev().collect();
            prop_assert_eq!(ids(&data), expected);
        }
    }
}
