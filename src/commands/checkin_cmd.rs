//! Commands for the daily check-in journal

use super::{parse_date, parse_month, report};
use crate::domain::{CheckIn, Mood};
use crate::AppState;

/// Record today's check-in
pub async fn record_checkin(
    state: &AppState,
    stress_level: u8,
    mood: String,
    note: Option<String>,
    breathing_minutes: u32,
) -> Result<CheckIn, String> {
    let mood = Mood::parse(&mood).map_err(report("record_checkin"))?;
    state
        .journal()
        .record(stress_level, mood, note.as_deref().unwrap_or_default(), breathing_minutes)
        .await
        .map_err(report("record_checkin"))
}

/// Check-ins of one day (`YYYY-MM-DD`), one month (`YYYY-MM`), or all of them
pub async fn list_checkins(state: &AppState, date: Option<String>, month: Option<String>) -> Result<Vec<CheckIn>, String> {
    let journal = state.journal();
    match (date, month) {
        (Some(day), _) => {
            let day = parse_date(&day).map_err(report("list_checkins"))?;
            journal.for_day(day).await
        }
        (None, Some(month)) => {
            let month = parse_month(&month).map_err(report("list_checkins"))?;
            journal.for_month(month).await
        }
        (None, None) => journal.all().await,
    }
    .map_err(report("list_checkins"))
}
