//! Ranking / Reporting Aggregator
//!
//! Own and aggregated focus time per task over a week, a month or all time.
//! Windows are computed in the caller's time zone from a reference day.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::checkins::month_bounds;
use crate::domain::{DomainError, DomainResult, Task};
use crate::tree::TaskTree;

const MS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RankingMode {
    #[default]
    Week,
    Month,
    All,
}

impl RankingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankingMode::Week => "week",
            RankingMode::Month => "month",
            RankingMode::All => "all",
        }
    }
}

impl std::str::FromStr for RankingMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "week" => Ok(RankingMode::Week),
            "month" => Ok(RankingMode::Month),
            "all" => Ok(RankingMode::All),
            other => Err(DomainError::InvalidInput(format!("Unknown ranking mode '{}'", other))),
        }
    }
}

/// Inclusive time range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Week: Sunday 00:00 to Saturday 23:59:59.999. Month: the 1st 00:00 to
    /// the last day 23:59:59. `None` for all time.
    pub fn for_mode<Tz: TimeZone>(mode: RankingMode, reference: NaiveDate, tz: &Tz) -> DomainResult<Option<Self>> {
        let (first, last, end_time) = match mode {
            RankingMode::All => return Ok(None),
            RankingMode::Week => {
                let back = i64::from(reference.weekday().num_days_from_sunday());
                let first = reference - Duration::days(back);
                let end_time = NaiveTime::from_hms_milli_opt(23, 59, 59, 999);
                (first, first + Duration::days(6), end_time)
            }
            RankingMode::Month => {
                let (first, last) = month_bounds(reference)?;
                (first, last, NaiveTime::from_hms_opt(23, 59, 59))
            }
        };

        let end_time = end_time.ok_or_else(|| invalid_day(reference))?;
        let midnight = first.and_hms_opt(0, 0, 0).ok_or_else(|| invalid_day(reference))?;
        Ok(Some(Self {
            start: local_to_utc(tz, midnight)?,
            end: local_to_utc(tz, last.and_time(end_time))?,
        }))
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }

    /// `dd/mm - dd/mm` in the given zone
    pub fn label<Tz: TimeZone>(&self, tz: &Tz) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        format!(
            "{} - {}",
            self.start.with_timezone(tz).format("%d/%m"),
            self.end.with_timezone(tz).format("%d/%m")
        )
    }
}

fn invalid_day(day: NaiveDate) -> DomainError {
    DomainError::InvalidInput(format!("Cannot build a window around {}", day))
}

fn local_to_utc<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> DomainResult<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| DomainError::InvalidInput(format!("{} does not exist in this time zone", local)))
}

/// Time logged directly on `task` inside `window` (all time when `None`)
///
/// All time uses the stored `time_spent_ms`. Windowed modes count each
/// session whose start falls inside the window, closing open sessions at
/// `now`.
pub fn own_time(task: &Task, window: Option<&TimeWindow>, now: DateTime<Utc>) -> i64 {
    match window {
        None => task.time_spent_ms,
        Some(window) => task
            .sessions
            .iter()
            .filter(|s| window.contains(s.start))
            .map(|s| s.duration_ms(now))
            .sum(),
    }
}

/// Aggregated time per task, memoized for one report
pub struct TimeAggregator<'a> {
    tree: &'a TaskTree,
    window: Option<TimeWindow>,
    now: DateTime<Utc>,
    totals: HashMap<u32, i64>,
}

impl<'a> TimeAggregator<'a> {
    pub fn new(tree: &'a TaskTree, window: Option<TimeWindow>, now: DateTime<Utc>) -> Self {
        Self {
            tree,
            window,
            now,
            totals: HashMap::new(),
        }
    }

    pub fn own_time(&self, id: u32) -> i64 {
        self.tree
            .get(id)
            .map_or(0, |task| own_time(task, self.window.as_ref(), self.now))
    }

    /// Own time plus the aggregated time of every child
    pub fn aggregated_time(&mut self, id: u32) -> i64 {
        if let Some(total) = self.totals.get(&id) {
            return *total;
        }

        // Children come before parents, so each sum reads finished totals
        for node in self.tree.post_order_ids(id) {
            if self.totals.contains_key(&node) {
                continue;
            }
            let children: i64 = self
                .tree
                .children(Some(node))
                .map(|child| self.totals.get(&child.id).copied().unwrap_or(0))
                .sum();
            let total = self.own_time(node) + children;
            self.totals.insert(node, total);
        }

        self.totals.get(&id).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankEntry {
    pub id: u32,
    pub title: String,
    pub total_ms: i64,
    pub own_ms: i64,
    pub hours: f64,
    pub own_hours: f64,
    /// Bar length relative to the top entry
    pub percent: f64,
    /// Share of the bar logged on the task itself
    pub own_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankReport {
    pub mode: RankingMode,
    pub window: Option<TimeWindow>,
    pub range_label: String,
    pub entries: Vec<RankEntry>,
    /// Flat sum of stored time over the scope, not recursive
    pub total_focus_ms: i64,
    pub total_hours: f64,
}

/// Rank the tasks in `scope` (a subtree, or everything) by aggregated time
pub fn rank<Tz: TimeZone>(
    tree: &TaskTree,
    scope: Option<u32>,
    mode: RankingMode,
    reference: NaiveDate,
    tz: &Tz,
    now: DateTime<Utc>,
) -> DomainResult<RankReport>
where
    Tz::Offset: std::fmt::Display,
{
    let scoped = scoped_tasks(tree, scope)?;
    let window = TimeWindow::for_mode(mode, reference, tz)?;
    let mut aggregator = TimeAggregator::new(tree, window, now);

    let mut rows: Vec<(&Task, i64, i64)> = scoped
        .iter()
        .map(|task| (*task, aggregator.aggregated_time(task.id), aggregator.own_time(task.id)))
        .filter(|(_, total, _)| *total > 0)
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.id.cmp(&b.0.id)));

    let max = rows.first().map_or(1, |row| row.1).max(1) as f64;
    let entries = rows
        .into_iter()
        .map(|(task, total, own)| RankEntry {
            id: task.id,
            title: task.title.clone(),
            total_ms: total,
            own_ms: own,
            hours: to_hours(total),
            own_hours: to_hours(own),
            percent: total as f64 / max * 100.0,
            own_percent: own as f64 / total as f64 * 100.0,
        })
        .collect();

    let total_focus_ms: i64 = scoped.iter().map(|t| t.time_spent_ms).sum();
    Ok(RankReport {
        mode,
        range_label: window.map_or_else(|| "all time".to_string(), |w| w.label(tz)),
        window,
        entries,
        total_focus_ms,
        total_hours: to_hours(total_focus_ms),
    })
}

/// Every task, or the subtree under `scope`
pub fn scoped_tasks(tree: &TaskTree, scope: Option<u32>) -> DomainResult<Vec<&Task>> {
    match scope {
        None => Ok(tree.tasks().iter().collect()),
        Some(id) if tree.contains(id) => Ok(tree.subtree(id)),
        Some(id) => Err(DomainError::task_not_found(id)),
    }
}

/// Milliseconds as hours, one decimal
pub fn to_hours(ms: i64) -> f64 {
    (ms as f64 / MS_PER_HOUR * 10.0).round() / 10.0
}
