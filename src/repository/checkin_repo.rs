//! Check-in Repository
//!
//! Handles all check-in journal database operations.

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

use crate::domain::{CheckIn, DomainError, DomainResult, Mood};
use super::db::{inserted_id, internal, not_initialized, SharedConnection};
use super::traits::{BulkRepository, CheckInQueries, Repository};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct CheckInRepository {
    conn: SharedConnection,
}

impl CheckInRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Repository<CheckIn> for CheckInRepository {
    async fn create(&self, entity: &CheckIn) -> DomainResult<CheckIn> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        conn.execute(
            "INSERT INTO checkins (date, stress_level, mood, note, breathing_minutes) VALUES (?, ?, ?, ?, ?)",
            params![
                entity.date.format(DATE_FORMAT).to_string(),
                entity.stress_level,
                entity.mood.as_str(),
                entity.note,
                entity.breathing_minutes,
            ],
        )
        .map_err(internal)?;

        let mut checkin = entity.clone();
        checkin.id = inserted_id(conn)?;
        Ok(checkin)
    }

    async fn find_by_id(&self, id: u32) -> DomainResult<Option<CheckIn>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let mut checkins = query_checkins(
            conn,
            "SELECT id, date, stress_level, mood, note, breathing_minutes FROM checkins WHERE id = ?",
            params![id],
        )?;
        Ok(checkins.pop())
    }

    async fn list(&self) -> DomainResult<Vec<CheckIn>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        query_checkins(
            conn,
            "SELECT id, date, stress_level, mood, note, breathing_minutes FROM checkins ORDER BY date ASC, id ASC",
            [],
        )
    }

    async fn update(&self, entity: &CheckIn) -> DomainResult<CheckIn> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let changed = conn
            .execute(
                "UPDATE checkins SET date = ?, stress_level = ?, mood = ?, note = ?, breathing_minutes = ? WHERE id = ?",
                params![
                    entity.date.format(DATE_FORMAT).to_string(),
                    entity.stress_level,
                    entity.mood.as_str(),
                    entity.note,
                    entity.breathing_minutes,
                    entity.id,
                ],
            )
            .map_err(internal)?;

        if changed == 0 {
            return Err(DomainError::NotFound(format!("Check-in {} not found", entity.id)));
        }
        Ok(entity.clone())
    }

    async fn delete(&self, id: u32) -> DomainResult<()> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        conn.execute("DELETE FROM checkins WHERE id = ?", params![id])
            .map_err(internal)?;
        Ok(())
    }
}

#[async_trait]
impl BulkRepository<CheckIn> for CheckInRepository {
    async fn bulk_put(&self, entities: &[CheckIn]) -> DomainResult<usize> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(not_initialized)?;
        let tx = conn.transaction().map_err(internal)?;

        for entity in entities {
            tx.execute(
                "INSERT OR REPLACE INTO checkins (id, date, stress_level, mood, note, breathing_minutes) VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    entity.id,
                    entity.date.format(DATE_FORMAT).to_string(),
                    entity.stress_level,
                    entity.mood.as_str(),
                    entity.note,
                    entity.breathing_minutes,
                ],
            )
            .map_err(internal)?;
        }

        tx.commit().map_err(internal)?;
        Ok(entities.len())
    }

    async fn bulk_delete(&self, ids: &[u32]) -> DomainResult<usize> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(not_initialized)?;
        let tx = conn.transaction().map_err(internal)?;

        let mut removed = 0;
        for id in ids {
            removed += tx
                .execute("DELETE FROM checkins WHERE id = ?", params![id])
                .map_err(internal)?;
        }

        tx.commit().map_err(internal)?;
        Ok(removed)
    }

    async fn clear(&self) -> DomainResult<usize> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;
        conn.execute("DELETE FROM checkins", []).map_err(internal)
    }
}

#[async_trait]
impl CheckInQueries for CheckInRepository {
    async fn list_by_date(&self, date: NaiveDate) -> DomainResult<Vec<CheckIn>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        query_checkins(
            conn,
            "SELECT id, date, stress_level, mood, note, breathing_minutes FROM checkins WHERE date = ? ORDER BY id ASC",
            params![date.format(DATE_FORMAT).to_string()],
        )
    }

    async fn list_between(&self, from: NaiveDate, to: NaiveDate) -> DomainResult<Vec<CheckIn>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        // ISO dates compare correctly as text
        query_checkins(
            conn,
            "SELECT id, date, stress_level, mood, note, breathing_minutes FROM checkins WHERE date >= ? AND date <= ? ORDER BY date ASC, id ASC",
            params![
                from.format(DATE_FORMAT).to_string(),
                to.format(DATE_FORMAT).to_string()
            ],
        )
    }
}

fn query_checkins<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> DomainResult<Vec<CheckIn>> {
    let mut stmt = conn.prepare(sql).map_err(internal)?;
    let mut rows = stmt.query(params).map_err(internal)?;

    let mut checkins = Vec::new();
    while let Some(row) = rows.next().map_err(internal)? {
        checkins.push(row_to_checkin(row)?);
    }
    Ok(checkins)
}

fn row_to_checkin(row: &Row) -> DomainResult<CheckIn> {
    let date: String = row.get(1).map_err(internal)?;
    let mood: String = row.get(3).map_err(internal)?;

    Ok(CheckIn {
        id: row.get(0).map_err(internal)?,
        date: NaiveDate::parse_from_str(&date, DATE_FORMAT)
            .map_err(|e| DomainError::Internal(format!("Invalid check-in date {}: {}", date, e)))?,
        stress_level: row.get(2).map_err(internal)?,
        mood: Mood::from_str(&mood),
        note: row.get(4).map_err(internal)?,
        breathing_minutes: row.get(5).map_err(internal)?,
    })
}
