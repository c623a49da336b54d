use super::Database;
use crate::accumulator::UsageRecord;
use crate::constants::DATE_FORMAT;
use crate::error::EngineError;
use crate::models::{AppKey, TrackedApplication};
use crate::safe_lock;
use crate::store::{UsageSnapshot, UsageStore};
use chrono::NaiveDate;
use log::{debug, warn};
use rusqlite::{params, Connection, Row};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// A stored usage row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub application: TrackedApplication,
    pub total: Duration,
}

pub struct SqliteUsageStore {
    db: Mutex<Database>,
}

impl SqliteUsageStore {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Rows for every day in `start..=end`, oldest first.
    pub fn usage_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyUsage>, EngineError> {
        let db = safe_lock(&self.db, "usage database");
        let mut stmt = db.connection().prepare(
            "SELECT date, name, executable_path, process_id, usage_ms FROM app_usage
             WHERE date >= ?1 AND date <= ?2
             ORDER BY date ASC, usage_ms DESC, name ASC",
        )?;

        let rows = stmt.query_map(params![format_date(start), format_date(end)], read_row)?;

        let mut usage = Vec::new();
        for row in rows {
            let (date, name, path, process_id, usage_ms) = row?;
            let Ok(date) = NaiveDate::parse_from_str(&date, DATE_FORMAT) else {
                warn!("Skipping usage row with malformed date '{date}'");
                continue;
            };
            let Some(total) = to_duration(usage_ms) else {
                warn!("Skipping negative usage for {name} on {date}");
                continue;
            };
            usage.push(DailyUsage {
                date,
                application: TrackedApplication::new(
                    name,
                    u32::try_from(process_id).unwrap_or_default(),
                    non_empty(path),
                ),
                total,
            });
        }
        Ok(usage)
    }
}

type RawRow = (String, String, String, i64, i64);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn non_empty(path: String) -> Option<String> {
    (!path.is_empty()).then_some(path)
}

fn to_duration(usage_ms: i64) -> Option<Duration> {
    u64::try_from(usage_ms).ok().map(Duration::from_millis)
}

fn to_millis(duration: Duration) -> Result<i64, EngineError> {
    i64::try_from(duration.as_millis())
        .map_err(|_| EngineError::invalid("usage", "duration too large to store"))
}

fn upsert(conn: &Connection, date: &str, record: &UsageRecord) -> Result<(), EngineError> {
    let app = &record.application;
    conn.execute(
        "INSERT INTO app_usage (date, name, executable_path, process_id, usage_ms)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(date, name, executable_path)
         DO UPDATE SET process_id = excluded.process_id, usage_ms = excluded.usage_ms",
        params![
            date,
            app.name,
            app.executable_path.as_deref().unwrap_or_default(),
            i64::from(app.process_id),
            to_millis(record.total)?,
        ],
    )?;
    Ok(())
}

impl UsageStore for SqliteUsageStore {
    fn load_carried_over(&self, date: NaiveDate) -> Result<HashMap<AppKey, Duration>, EngineError> {
        let db = safe_lock(&self.db, "usage database");
        let mut stmt = db.connection().prepare(
            "SELECT date, name, executable_path, process_id, usage_ms FROM app_usage WHERE date = ?1",
        )?;
        let rows = stmt.query_map(params![format_date(date)], read_row)?;

        let mut carried_over = HashMap::new();
        for row in rows {
            let (_, name, path, _, usage_ms) = row?;
            if let Some(total) = to_duration(usage_ms) {
                let key = AppKey {
                    name,
                    executable_path: non_empty(path),
                };
                carried_over.insert(key, total);
            }
        }
        Ok(carried_over)
    }

    fn flush(&self, snapshot: &UsageSnapshot) -> Result<(), EngineError> {
        let db = safe_lock(&self.db, "usage database");
        let tx = db.connection().unchecked_transaction()?;
        let date = format_date(snapshot.date);
        for record in &snapshot.records {
            upsert(&tx, &date, record)?;
        }
        tx.commit()?;
        debug!("Stored {} usage row(s) for {date}", snapshot.records.len());
        Ok(())
    }
}
