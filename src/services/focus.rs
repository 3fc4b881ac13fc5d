//! Focus Session Timer
//!
//! State machine: `Idle` -> `Running` on start, back to `Idle` on a
//! successful stop. Pause, navigation, unload and teardown all end the
//! session through [`FocusTimer::stop`].
//!
//! A stop whose write fails leaves the timer `Running`, so the caller can
//! retry or explicitly [`FocusTimer::discard`] the session. The state lock is
//! held for the whole stop; a second concurrent stop finds the timer idle and
//! cannot add the same interval twice.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::clock::Clock;
use crate::config::FocusSettings;
use crate::domain::{validate_stress_level, DomainError, DomainResult, SessionRecord, Task, TaskStatus};
use crate::repository::TaskStore;

/// Answers collected before a session starts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreSessionCheck {
    pub stress_level: Option<u8>,
    /// Only kept together with a stress level
    pub stress_note: Option<String>,
    pub did_breathing: bool,
}

/// Why a session is being closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEnd {
    Pause,
    Navigate,
    Unload,
    Teardown,
}

impl SessionEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEnd::Pause => "pause",
            SessionEnd::Navigate => "navigate",
            SessionEnd::Unload => "unload",
            SessionEnd::Teardown => "teardown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StopOutcome {
    /// Nothing was open
    NotRunning,
    /// Session dropped without adding time
    Discarded { task_id: u32, elapsed_ms: i64 },
    Saved {
        task_id: u32,
        elapsed_ms: i64,
        time_spent_ms: i64,
    },
}

/// Optional countdown shown next to the session clock
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Countdown {
    pub duration_secs: u64,
    pub remaining_secs: u64,
    pub active: bool,
}

impl Countdown {
    fn with_minutes(minutes: u32) -> Self {
        let secs = u64::from(minutes) * 60;
        Self {
            duration_secs: secs,
            remaining_secs: secs,
            active: false,
        }
    }

    /// Reached zero; the session keeps running untimed
    pub fn is_free_time(&self) -> bool {
        self.remaining_secs == 0
    }
}

/// One observation of the running clock; never written to the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tick {
    pub task_id: u32,
    /// Stored time at session start plus the open session
    pub total_elapsed_ms: i64,
    pub session_elapsed_ms: i64,
    pub countdown: Countdown,
    /// Set on the tick where the countdown hit zero
    pub alarm: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TimerStatus {
    Idle,
    Running {
        task_id: u32,
        started_at: DateTime<Utc>,
        time_spent_ms_at_start: i64,
    },
}

#[derive(Debug, Clone)]
struct OpenSession {
    task_id: u32,
    started_at: DateTime<Utc>,
    base_time_spent_ms: i64,
}

struct TimerInner {
    session: Option<OpenSession>,
    countdown: Countdown,
    /// When the countdown last started running, and what was left then
    countdown_anchor: Option<(DateTime<Utc>, u64)>,
}

impl TimerInner {
    /// Run the countdown from `now`, if anything is left
    fn resume_countdown(&mut self, now: DateTime<Utc>) {
        if self.countdown.remaining_secs > 0 {
            self.countdown.active = true;
            self.countdown_anchor = Some((now, self.countdown.remaining_secs));
        } else {
            self.countdown.active = false;
            self.countdown_anchor = None;
        }
    }

    /// Bring `remaining_secs` up to wall time; true when it just reached zero
    fn sync_countdown(&mut self, now: DateTime<Utc>) -> bool {
        let Some((since, left_then)) = self.countdown_anchor else {
            return false;
        };
        if !self.countdown.active {
            return false;
        }

        let passed = (now - since).num_milliseconds().max(0) as u64 / 1000;
        self.countdown.remaining_secs = left_then.saturating_sub(passed);
        if self.countdown.remaining_secs == 0 {
            self.countdown.active = false;
            self.countdown_anchor = None;
            return true;
        }
        false
    }

    /// Stop the countdown, keeping what is left
    fn halt_countdown(&mut self, now: DateTime<Utc>) {
        self.sync_countdown(now);
        self.countdown.active = false;
        self.countdown_anchor = None;
    }
}

pub struct FocusTimer<S: TaskStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    settings: FocusSettings,
    inner: Mutex<TimerInner>,
}

impl<S: TaskStore> FocusTimer<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, settings: FocusSettings) -> Self {
        let countdown = Countdown::with_minutes(settings.default_countdown_minutes.max(1));
        Self {
            store,
            clock,
            settings,
            inner: Mutex::new(TimerInner {
                session: None,
                countdown,
                countdown_anchor: None,
            }),
        }
    }

    pub async fn status(&self) -> TimerStatus {
        match &self.inner.lock().await.session {
            None => TimerStatus::Idle,
            Some(open) => TimerStatus::Running {
                task_id: open.task_id,
                started_at: open.started_at,
                time_spent_ms_at_start: open.base_time_spent_ms,
            },
        }
    }

    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.session.is_some()
    }

    /// Open a session on `task_id`
    ///
    /// Appends a placeholder session (`end == start`) and marks the task in
    /// progress. Fails with `Conflict` when a session is already open. If
    /// the write fails the timer stays idle.
    pub async fn start(&self, task_id: u32, check: PreSessionCheck) -> DomainResult<Task> {
        let mut inner = self.inner.lock().await;
        if let Some(open) = &inner.session {
            return Err(DomainError::Conflict(format!(
                "A session is already running on task {}",
                open.task_id
            )));
        }
        if let Some(level) = check.stress_level {
            validate_stress_level(level)?;
        }

        let mut task = self
            .store
            .find_by_id(task_id)
            .await?
            .ok_or_else(|| DomainError::task_not_found(task_id))?;

        let now = self.clock.now();
        let mut session = SessionRecord::open_at(now);
        session.did_breathing = check.did_breathing;
        if let Some(level) = check.stress_level {
            session.stress_level = Some(level);
            session.stress_note = check.stress_note.filter(|n| !n.trim().is_empty());
        }
        task.sessions.push(session);
        task.status = TaskStatus::InProgress;

        let task = self.store.update(&task).await?;

        inner.session = Some(OpenSession {
            task_id,
            started_at: now,
            base_time_spent_ms: task.time_spent_ms,
        });
        inner.resume_countdown(now);
        log::info!("Focus session started on task {}", task_id);
        Ok(task)
    }

    /// Close the open session
    ///
    /// Intervals shorter than `min_session_ms` are dropped: the placeholder
    /// is removed and no time is added. Otherwise the elapsed time is added
    /// to `time_spent_ms`, the last session's end is set to now and the task
    /// is marked paused.
    pub async fn stop(&self, reason: SessionEnd) -> DomainResult<StopOutcome> {
        let mut inner = self.inner.lock().await;
        let Some(open) = inner.session.clone() else {
            return Ok(StopOutcome::NotRunning);
        };

        let now = self.clock.now();
        let elapsed_ms = (now - open.started_at).num_milliseconds().max(0);

        let Some(mut task) = self.store.find_by_id(open.task_id).await? else {
            inner.session = None;
            inner.halt_countdown(now);
            log::warn!("Task {} vanished during its focus session", open.task_id);
            return Err(DomainError::task_not_found(open.task_id));
        };

        if elapsed_ms < self.settings.min_session_ms {
            if task.sessions.last().is_some_and(|s| s.start == open.started_at) {
                task.sessions.pop();
            }
            task.status = TaskStatus::Paused;
            self.store.update(&task).await.inspect_err(|e| {
                log::error!("Dropping short session on task {} failed: {}", open.task_id, e);
            })?;

            inner.session = None;
            inner.halt_countdown(now);
            log::debug!("Discarded {}ms session on task {}", elapsed_ms, open.task_id);
            return Ok(StopOutcome::Discarded {
                task_id: open.task_id,
                elapsed_ms,
            });
        }

        task.time_spent_ms += elapsed_ms;
        match task.sessions.last_mut() {
            Some(last) if last.start == open.started_at => last.end = Some(now),
            // The record was replaced mid-session; keep its sessions intact
            _ => task.sessions.push(SessionRecord {
                end: Some(now),
                ..SessionRecord::open_at(open.started_at)
            }),
        }
        task.status = TaskStatus::Paused;

        let saved = self.store.update(&task).await.inspect_err(|e| {
            log::error!(
                "Saving focus session on task {} ({}) failed: {}",
                open.task_id,
                reason.as_str(),
                e
            );
        })?;

        inner.session = None;
        inner.halt_countdown(now);
        log::info!(
            "Focus session on task {} saved: {}ms ({})",
            open.task_id,
            elapsed_ms,
            reason.as_str()
        );
        Ok(StopOutcome::Saved {
            task_id: open.task_id,
            elapsed_ms,
            time_spent_ms: saved.time_spent_ms,
        })
    }

    /// Abandon the open session without writing anything
    ///
    /// The recovery path after a stop could not be saved.
    pub async fn discard(&self) -> StopOutcome {
        let mut inner = self.inner.lock().await;
        let Some(open) = inner.session.take() else {
            return StopOutcome::NotRunning;
        };
        let now = self.clock.now();
        inner.halt_countdown(now);

        let elapsed_ms = (now - open.started_at).num_milliseconds().max(0);
        log::warn!("Discarded unsaved {}ms session on task {}", elapsed_ms, open.task_id);
        StopOutcome::Discarded {
            task_id: open.task_id,
            elapsed_ms,
        }
    }

    /// Observe the running clock
    ///
    /// The countdown follows wall time, whatever the tick interval. Returns
    /// `None` when idle.
    pub async fn tick(&self) -> Option<Tick> {
        let mut inner = self.inner.lock().await;
        let open = inner.session.clone()?;

        let now = self.clock.now();
        let session_elapsed_ms = (now - open.started_at).num_milliseconds().max(0);

        let alarm = inner.sync_countdown(now);
        if alarm {
            log::info!("Countdown finished on task {}; free time", open.task_id);
        }

        Some(Tick {
            task_id: open.task_id,
            total_elapsed_ms: open.base_time_spent_ms + session_elapsed_ms,
            session_elapsed_ms,
            countdown: inner.countdown.clone(),
            alarm,
        })
    }

    pub async fn countdown(&self) -> Countdown {
        let mut inner = self.inner.lock().await;
        inner.sync_countdown(self.clock.now());
        inner.countdown.clone()
    }

    /// Set the countdown length; it runs right away if a session is open
    pub async fn set_countdown(&self, minutes: u32) -> Countdown {
        let minutes = if minutes < 1 { self.settings.default_countdown_minutes.max(1) } else { minutes };
        let mut inner = self.inner.lock().await;
        inner.countdown = Countdown::with_minutes(minutes);
        inner.countdown_anchor = None;
        if inner.session.is_some() {
            inner.resume_countdown(self.clock.now());
        }
        inner.countdown.clone()
    }

    /// Typed-in minutes; anything unusable falls back to the default length
    pub async fn set_countdown_from_input(&self, input: &str) -> Countdown {
        let minutes = input.trim().parse::<u32>().unwrap_or(0);
        self.set_countdown(minutes).await
    }

    pub fn presets(&self) -> &[u32] {
        &self.settings.countdown_presets
    }

    /// Restore the full duration
    pub async fn reset_countdown(&self) -> Countdown {
        let mut inner = self.inner.lock().await;
        inner.countdown.remaining_secs = inner.countdown.duration_secs;
        inner.countdown.active = false;
        inner.countdown_anchor = None;
        if inner.session.is_some() {
            inner.resume_countdown(self.clock.now());
        }
        inner.countdown.clone()
    }
}

impl<S: TaskStore + 'static> FocusTimer<S> {
    /// Emit a [`Tick`] every `tick_interval_ms` until the session ends or
    /// the receiver goes away
    pub fn spawn_ticker(self: Arc<Self>, tx: mpsc::Sender<Tick>) -> JoinHandle<()> {
        let period = StdDuration::from_millis(self.settings.tick_interval_ms.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(tick) = self.tick().await else {
                    break;
                };
                if tx.send(tick).await.is_err() {
                    break;
                }
            }
        })
    }
}
