//! Dashboard insights
//!
//! Month statistics over a scope of tasks: pre-session stress, daily stress
//! and focus calendars, the stress journal and upcoming deadlines.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use super::ranking::{scoped_tasks, to_hours};
use crate::domain::{DomainResult, SessionRecord, Task};
use crate::tree::TaskTree;

const MS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StressSummary {
    /// Mean pre-session stress, one decimal; 0 when nothing was rated
    pub avg_stress: f64,
    pub rated_sessions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StressDay {
    pub date: NaiveDate,
    pub level: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FocusDay {
    pub date: NaiveDate,
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JournalEntry {
    /// `<task id>-<session index>`
    pub id: String,
    pub task_id: u32,
    pub task_title: String,
    pub at: DateTime<Utc>,
    pub stress_level: u8,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadlineEntry {
    pub id: u32,
    pub title: String,
    pub deadline: DateTime<Utc>,
    pub days_left: i64,
    pub overdue: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    /// `YYYY-MM`
    pub month: String,
    pub stress: StressSummary,
    pub stress_calendar: Vec<StressDay>,
    pub focus_calendar: Vec<FocusDay>,
    pub journal: Vec<JournalEntry>,
    pub deadlines: Vec<DeadlineEntry>,
}

/// Build the dashboard for `scope` and the month containing `month`
pub fn insights<Tz: TimeZone>(
    tree: &TaskTree,
    scope: Option<u32>,
    month: NaiveDate,
    tz: &Tz,
    now: DateTime<Utc>,
) -> DomainResult<Insights> {
    let tasks = scoped_tasks(tree, scope)?;

    // Sessions of the month, with their local start day
    let in_month: Vec<(&Task, usize, &SessionRecord, NaiveDate)> = tasks
        .iter()
        .flat_map(|task| {
            task.sessions
                .iter()
                .enumerate()
                .map(move |(index, session)| (*task, index, session))
        })
        .filter_map(|(task, index, session)| {
            let day = session.start.with_timezone(tz).date_naive();
            (day.year() == month.year() && day.month() == month.month()).then_some((task, index, session, day))
        })
        .collect();

    let mut stress_sum = 0u64;
    let mut rated = 0usize;
    let mut stress_days: BTreeMap<NaiveDate, (u64, usize)> = BTreeMap::new();
    let mut focus_days: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    let mut journal = Vec::new();

    for (task, index, session, day) in &in_month {
        *focus_days.entry(*day).or_default() += session.duration_ms(now);

        let Some(level) = session.stress_level else {
            continue;
        };
        stress_sum += u64::from(level);
        rated += 1;
        let entry = stress_days.entry(*day).or_default();
        entry.0 += u64::from(level);
        entry.1 += 1;

        if let Some(note) = session.stress_note.as_deref().filter(|n| !n.trim().is_empty()) {
            journal.push(JournalEntry {
                id: format!("{}-{}", task.id, index),
                task_id: task.id,
                task_title: task.title.clone(),
                at: session.start,
                stress_level: level,
                note: note.to_string(),
            });
        }
    }
    journal.sort_by(|a, b| b.at.cmp(&a.at));

    let avg_stress = if rated > 0 { round1(stress_sum as f64 / rated as f64) } else { 0.0 };

    Ok(Insights {
        month: format!("{:04}-{:02}", month.year(), month.month()),
        stress: StressSummary {
            avg_stress,
            rated_sessions: rated,
        },
        stress_calendar: stress_days
            .into_iter()
            .map(|(date, (sum, count))| StressDay {
                date,
                level: sum as f64 / count as f64,
                count,
            })
            .collect(),
        focus_calendar: focus_days
            .into_iter()
            .map(|(date, ms)| FocusDay { date, hours: to_hours(ms) })
            .collect(),
        journal,
        deadlines: deadlines(&tasks, now),
    })
}

/// Not-done tasks with a deadline, soonest first
pub fn deadlines(tasks: &[&Task], now: DateTime<Utc>) -> Vec<DeadlineEntry> {
    let mut entries: Vec<DeadlineEntry> = tasks
        .iter()
        .filter(|t| !t.is_done())
        .filter_map(|t| {
            let deadline = t.deadline?;
            Some(DeadlineEntry {
                id: t.id,
                title: t.title.clone(),
                deadline,
                days_left: days_left(deadline, now),
                overdue: t.is_overdue(now),
            })
        })
        .collect();
    entries.sort_by(|a, b| a.days_left.cmp(&b.days_left).then(a.id.cmp(&b.id)));
    entries
}

/// Whole days until `deadline`, rounded up
pub fn days_left(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let diff = (deadline - now).num_milliseconds() as f64;
    (diff / MS_PER_DAY).ceil() as i64
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskStatus;
    use chrono::Duration;

    fn at(m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, m, d, h, 0, 0).unwrap()
    }

    fn rated(start: DateTime<Utc>, minutes: i64, level: u8, note: &str) -> SessionRecord {
        SessionRecord {
            end: Some(start + Duration::minutes(minutes)),
            stress_level: Some(level),
            stress_note: (!note.is_empty()).then(|| note.to_string()),
            ..SessionRecord::open_at(start)
        }
    }

    fn task(id: u32, parent_id: Option<u32>, sessions: Vec<SessionRecord>) -> Task {
        let mut task = Task::new_project(format!("Task {}", id), at(3, 1, 9));
        task.id = id;
        task.parent_id = parent_id;
        task.sessions = sessions;
        task
    }

    fn sample() -> TaskTree {
        let mut unrated = SessionRecord::open_at(at(3, 5, 14));
        unrated.end = Some(at(3, 5, 16));

        TaskTree::from_tasks(vec![
            task(1, None, vec![rated(at(3, 5, 9), 60, 6, "nervous"), unrated]),
            task(2, Some(1), vec![rated(at(3, 5, 11), 30, 2, ""), rated(at(3, 8, 9), 90, 7, "deadline")]),
            task(3, None, vec![rated(at(3, 9, 9), 60, 9, "other project")]),
            task(4, Some(1), vec![rated(at(2, 20, 9), 60, 10, "last month")]),
        ])
    }

    #[test]
    fn test_month_stress_summary_for_subtree() {
        let tree = sample();
        let report = insights(&tree, Some(1), NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(), &Utc, at(3, 31, 0)).unwrap();

        assert_eq!(report.month, "2024-03");
        // 6, 2, 7 in March; task 3 is out of scope and task 4's session is in February
        assert_eq!(report.stress.rated_sessions, 3);
        assert_eq!(report.stress.avg_stress, 5.0);
    }

    #[test]
    fn test_calendars_group_by_day() {
        let tree = sample();
        let report = insights(&tree, Some(1), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), &Utc, at(3, 31, 0)).unwrap();

        let fifth = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(report.stress_calendar[0], StressDay { date: fifth, level: 4.0, count: 2 });
        assert_eq!(report.stress_calendar.len(), 2);

        // 60 + 120 + 30 minutes on the 5th, 90 on the 8th
        assert_eq!(report.focus_calendar[0], FocusDay { date: fifth, hours: 3.5 });
        assert_eq!(report.focus_calendar[1].hours, 1.5);
    }

    #[test]
    fn test_journal_newest_first_and_needs_note() {
        let tree = sample();
        let report = insights(&tree, None, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), &Utc, at(3, 31, 0)).unwrap();

        let notes: Vec<&str> = report.journal.iter().map(|e| e.note.as_str()).collect();
        assert_eq!(notes, vec!["other project", "deadline", "nervous"]);
        assert_eq!(report.journal[1].id, "2-1");
        assert_eq!(report.journal[1].task_title, "Task 2");
    }

    #[test]
    fn test_empty_month() {
        let tree = sample();
        let report = insights(&tree, None, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(), &Utc, at(7, 1, 0)).unwrap();
        assert_eq!(report.stress.avg_stress, 0.0);
        assert_eq!(report.stress.rated_sessions, 0);
        assert!(report.focus_calendar.is_empty());
    }

    #[test]
    fn test_deadlines_sorted_and_skip_done() {
        let now = at(3, 10, 12);
        let mut soon = task(1, None, vec![]);
        soon.deadline = Some(now + Duration::hours(30));
        let mut late = task(2, None, vec![]);
        late.deadline = Some(now - Duration::hours(30));
        let mut done = task(3, None, vec![]);
        done.deadline = Some(now + Duration::hours(1));
        done.status = TaskStatus::Done;
        let undated = task(4, None, vec![]);

        let tasks = vec![&soon, &late, &done, &undated];
        let entries = deadlines(&tasks, now);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 2);
        assert_eq!(entries[0].days_left, -1);
        assert!(entries[0].overdue);
        assert_eq!(entries[1].days_left, 2);
        assert!(!entries[1].overdue);
    }

    #[test]
    fn test_days_left_rounds_up() {
        let now = at(3, 10, 12);
        assert_eq!(days_left(now + Duration::hours(1), now), 1);
        assert_eq!(days_left(now + Duration::hours(24), now), 1);
        assert_eq!(days_left(now - Duration::hours(1), now), 0);
    }
}
