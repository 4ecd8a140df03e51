//! Schedule spec parsing and next fire time computation.
//!
//! Cron grammar is delegated to the `cron` crate. Specs may use the classic
//! five fields (minute first), the extended six or seven fields (seconds
//! first), a descriptor such as `@daily`, or `@every <duration>`.
//!
//! Day-of-week numbers follow crontab: 0 and 7 are Sunday, 6 is Saturday.
//! They are rewritten to day names before the `cron` crate sees them, since
//! that crate counts from 1 = Sunday.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Timelike};
use chrono_tz::Tz;
use thiserror::Error;

/// Errors produced while parsing a schedule spec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty spec string")]
    Empty,

    #[error("failed to parse cron expression {spec:?}: {reason}")]
    InvalidExpression { spec: String, reason: String },

    #[error("failed to parse duration {spec:?}: {reason}")]
    InvalidDuration { spec: String, reason: String },
}

/// A parsed schedule.
#[derive(Debug, Clone)]
pub enum Schedule {
    /// Calendar schedule backed by a cron expression.
    Cron(Box<cron::Schedule>),
    /// Fixed interval between runs.
    Every(Duration),
}

impl Schedule {
    /// Next fire time strictly after `after`, or `None` if the schedule is
    /// exhausted.
    pub fn next_after(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        match self {
            Schedule::Cron(schedule) => schedule.after(after).next(),
            Schedule::Every(interval) => {
                // Whole seconds only, and never less than one
                let secs = interval.as_secs().max(1);
                let step = chrono::Duration::seconds(i64::try_from(secs).ok()?);
                let truncated = after.with_nanosecond(0)?;
                truncated.checked_add_signed(step)
            }
        }
    }
}

/// Turns a spec string into a [`Schedule`].
pub trait SpecParser: Send + Sync {
    fn parse(&self, spec: &str) -> Result<Schedule, ParseError>;
}

/// Default parser accepting cron fields, descriptors and `@every`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardParser;

const EVERY_PREFIX: &str = "@every ";

/// Day names indexed by crontab weekday number.
const WEEKDAYS: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

impl SpecParser for StandardParser {
    fn parse(&self, spec: &str) -> Result<Schedule, ParseError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(ParseError::Empty);
        }

        if let Some(rest) = spec.strip_prefix(EVERY_PREFIX) {
            return parse_every(rest.trim());
        }

        let expression = match spec {
            "@midnight" => "@daily".to_string(),
            s if s.starts_with('@') => s.to_string(),
            s => {
                let mut fields: Vec<String> = s.split_whitespace().map(str::to_string).collect();
                if fields.len() == 5 {
                    fields.insert(0, "0".to_string());
                }
                if let Some(weekdays) = fields.get_mut(5) {
                    *weekdays = normalize_weekdays(weekdays);
                }
                fields.join(" ")
            }
        };

        cron::Schedule::from_str(&expression)
            .map(|s| Schedule::Cron(Box::new(s)))
            .map_err(|e| ParseError::InvalidExpression {
                spec: spec.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Rewrite numeric day-of-week items as day names.
///
/// Items that are already names, plain `*`, or out of range are left for the
/// `cron` crate to accept or reject.
fn normalize_weekdays(field: &str) -> String {
    field
        .split(',')
        .map(|item| weekday_names(item).unwrap_or_else(|| item.to_string()))
        .collect::<Vec<_>>()
        .join(",")
}

fn weekday_names(item: &str) -> Option<String> {
    let (base, step) = match item.split_once('/') {
        Some((base, step)) => (base, Some(step.parse::<usize>().ok()?)),
        None => (item, None),
    };
    if step == Some(0) {
        return None;
    }

    let (start, end) = match base {
        "*" if step.is_some() => (0, 6),
        "*" => return None,
        base => match base.split_once('-') {
            Some((start, end)) => (start.parse::<usize>().ok()?, end.parse::<usize>().ok()?),
            None => {
                let day = base.parse::<usize>().ok()?;
                // `n/step` runs to the end of the week
                (day, if step.is_some() { 6 } else { day })
            }
        },
    };
    if start > end || end > 7 {
        return None;
    }

    let days: BTreeSet<usize> = (start..=end)
        .step_by(step.unwrap_or(1))
        .map(|day| day % 7)
        .collect();
    Some(
        days.into_iter()
            .map(|day| WEEKDAYS[day])
            .collect::<Vec<_>>()
            .join(","),
    )
}

fn parse_every(text: &str) -> Result<Schedule, ParseError> {
    let interval = humantime::parse_duration(text).map_err(|e| ParseError::InvalidDuration {
        spec: text.to_string(),
        reason: e.to_string(),
    })?;

    if interval.is_zero() {
        return Err(ParseError::InvalidDuration {
            spec: text.to_string(),
            reason: "duration must be positive".to_string(),
        });
    }

    Ok(Schedule::Every(interval))
}
