//! Check-in journal
//!
//! Daily stress/mood entries, independent of tasks.

use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate};

use super::clock::Clock;
use crate::domain::{CheckIn, DomainError, DomainResult, Mood};
use crate::repository::CheckInStore;

pub struct CheckInJournal<S: CheckInStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: CheckInStore> CheckInJournal<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&Local).date_naive()
    }

    /// Record an entry dated today
    pub async fn record(&self, stress_level: u8, mood: Mood, note: &str, breathing_minutes: u32) -> DomainResult<CheckIn> {
        let checkin = CheckIn::new(self.today(), stress_level, mood, note.trim().to_string(), breathing_minutes);
        checkin.validate()?;

        let saved = self.store.create(&checkin).await?;
        log::info!("Check-in {} recorded for {} (stress {})", saved.id, saved.date, saved.stress_level);
        Ok(saved)
    }

    pub async fn for_day(&self, date: NaiveDate) -> DomainResult<Vec<CheckIn>> {
        self.store.list_by_date(date).await
    }

    /// Entries of the month containing `month`
    pub async fn for_month(&self, month: NaiveDate) -> DomainResult<Vec<CheckIn>> {
        let (first, last) = month_bounds(month)?;
        self.store.list_between(first, last).await
    }

    pub async fn all(&self) -> DomainResult<Vec<CheckIn>> {
        self.store.list().await
    }
}

/// First and last day of the month containing `day`
pub fn month_bounds(day: NaiveDate) -> DomainResult<(NaiveDate, NaiveDate)> {
    let invalid = || DomainError::InvalidInput(format!("No month around {}", day));
    let first = day.with_day(1).ok_or_else(invalid)?;
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    }
    .ok_or_else(invalid)?;
    let last = next.pred_opt().ok_or_else(invalid)?;
    Ok((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{CheckInRepository, DbState, Repository};
    use crate::services::clock::ManualClock;
    use chrono::{Duration, TimeZone, Utc};

    async fn setup() -> (DbState, Arc<CheckInRepository>, Arc<ManualClock>, CheckInJournal<CheckInRepository>) {
        let db = DbState::open_in_memory().await.expect("Failed to init test DB");
        let store = Arc::new(CheckInRepository::new(db.conn.clone()));
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()));
        let journal = CheckInJournal::new(store.clone(), clock.clone());
        (db, store, clock, journal)
    }

    #[tokio::test]
    async fn test_record_is_dated_today() {
        let (_db, _store, _clock, journal) = setup().await;

        let saved = journal.record(6, Mood::Stressed, "  busy day ", 4).await.unwrap();
        assert!(saved.id > 0);
        assert_eq!(saved.date, journal.today());
        assert_eq!(saved.note, "busy day");

        let today = journal.for_day(journal.today()).await.unwrap();
        assert_eq!(today, vec![saved]);
    }

    #[tokio::test]
    async fn test_record_rejects_out_of_range_stress() {
        let (_db, store, _clock, journal) = setup().await;
        assert!(journal.record(11, Mood::Sad, "", 0).await.is_err());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_for_month() {
        let (_db, _store, clock, journal) = setup().await;

        journal.record(3, Mood::Happy, "", 0).await.unwrap();
        clock.advance(Duration::days(40));
        journal.record(5, Mood::Neutral, "", 0).await.unwrap();

        let first = journal.today() - Duration::days(40);
        assert_eq!(journal.for_month(first).await.unwrap().len(), 1);
        assert_eq!(journal.for_month(journal.today()).await.unwrap().len(), 1);
        assert_eq!(journal.all().await.unwrap().len(), 2);
    }

    #[test]
    fn test_month_bounds() {
        let (first, last) = month_bounds(NaiveDate::from_ymd_opt(2024, 2, 14).unwrap()).unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let (_, last) = month_bounds(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()).unwrap();
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
    }
}
