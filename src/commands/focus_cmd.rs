//! Commands for focus sessions and the countdown

use std::time::Duration;

use serde::Serialize;

use super::report;
use crate::domain::Task;
use crate::services::{Countdown, PreSessionCheck, SessionEnd, StopOutcome, TimerStatus};
use crate::AppState;

/// Delay before the first save retry; doubles on each further attempt
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusStatus {
    pub timer: TimerStatus,
    pub countdown: Countdown,
    pub presets: Vec<u32>,
}

/// Open a focus session on a task
pub async fn start_focus(
    state: &AppState,
    task_id: u32,
    stress_level: Option<u8>,
    stress_note: Option<String>,
    did_breathing: bool,
) -> Result<Task, String> {
    let check = PreSessionCheck {
        stress_level,
        stress_note,
        did_breathing,
    };
    state.timer.start(task_id, check).await.map_err(report("start_focus"))
}

/// Close the open session once
pub async fn stop_focus(state: &AppState, reason: SessionEnd) -> Result<StopOutcome, String> {
    state.timer.stop(reason).await.map_err(report("stop_focus"))
}

/// Close the open session, retrying failed saves with backoff
///
/// Gives up after `focus.save_retries` attempts; the timer is then still
/// running and the caller decides whether to [`discard_focus`].
pub async fn stop_focus_with_retry(state: &AppState, reason: SessionEnd) -> Result<StopOutcome, String> {
    let attempts = state.settings.focus.save_retries.max(1);
    let mut delay = RETRY_BASE_DELAY;
    let mut attempt = 1;
    loop {
        match state.timer.stop(reason).await {
            Ok(outcome) => return Ok(outcome),
            // The task is gone and the timer already went idle
            Err(e) if e.is_not_found() => return Err(report("stop_focus")(e)),
            Err(e) if attempt >= attempts => return Err(report("stop_focus")(e)),
            Err(e) => {
                log::warn!(
                    "Saving session failed (attempt {}/{}): {}; retrying in {:?}",
                    attempt,
                    attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
        }
    }
}

/// Drop the open session without saving
pub async fn discard_focus(state: &AppState) -> StopOutcome {
    state.timer.discard().await
}

pub async fn focus_status(state: &AppState) -> FocusStatus {
    FocusStatus {
        timer: state.timer.status().await,
        countdown: state.timer.countdown().await,
        presets: state.timer.presets().to_vec(),
    }
}

/// Set the countdown from typed-in minutes
pub async fn set_countdown(state: &AppState, minutes: &str) -> Countdown {
    state.timer.set_countdown_from_input(minutes).await
}

pub async fn reset_countdown(state: &AppState) -> Countdown {
    state.timer.reset_countdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::test_state;
    use crate::commands::{create_project, get_task};
    use crate::domain::TaskStatus;
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn test_start_and_stop_records_time() {
        let (state, clock) = test_state().await;
        let project = create_project(&state, "Deep work".into()).await.unwrap();

        start_focus(&state, project.id, Some(4), Some("tired".into()), true).await.unwrap();
        assert!(matches!(focus_status(&state).await.timer, TimerStatus::Running { .. }));

        clock.advance(ChronoDuration::minutes(30));
        let outcome = stop_focus_with_retry(&state, SessionEnd::Pause).await.unwrap();
        assert!(matches!(outcome, StopOutcome::Saved { time_spent_ms: 1_800_000, .. }));

        let detail = get_task(&state, project.id).await.unwrap();
        assert_eq!(detail.task.status, TaskStatus::Paused);
        assert_eq!(detail.task.sessions[0].stress_note.as_deref(), Some("tired"));

        // Second stop is a no-op
        assert_eq!(stop_focus(&state, SessionEnd::Unload).await.unwrap(), StopOutcome::NotRunning);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_and_discard_recovers() {
        let (state, clock) = test_state().await;
        let project = create_project(&state, "Fragile".into()).await.unwrap();
        start_focus(&state, project.id, None, None, false).await.unwrap();
        clock.advance(ChronoDuration::minutes(5));

        state.db_state.close().await;
        assert!(stop_focus_with_retry(&state, SessionEnd::Unload).await.is_err());
        assert!(state.timer.is_running().await);

        let outcome = discard_focus(&state).await;
        assert!(matches!(outcome, StopOutcome::Discarded { elapsed_ms: 300_000, .. }));
        assert!(!state.timer.is_running().await);
    }

    #[tokio::test]
    async fn test_countdown_commands() {
        let (state, _clock) = test_state().await;

        let countdown = set_countdown(&state, "45").await;
        assert_eq!(countdown.duration_secs, 45 * 60);
        assert!(!countdown.active);

        let fallback = set_countdown(&state, "zero").await;
        assert_eq!(fallback.duration_secs, 25 * 60);

        let reset = reset_countdown(&state).await;
        assert_eq!(reset.remaining_secs, 25 * 60);
        assert_eq!(focus_status(&state).await.presets, vec![10, 25, 45, 60]);
    }
}
