//! SQLite-backed observation store.

use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params, types::Type};
use std::path::Path;

use super::ObservationStore;
use crate::error::{WeatherError, WeatherResult};
use crate::model::{NewObservation, ObservationPatch, WeatherObservation};

const DATE_FORMAT: &str = "%Y-%m-%d";

const SELECT_COLUMNS: &str =
    "SELECT id, location, date, temperature, description, humidity, wind_speed FROM weather";

/// Observation store over a single SQLite connection.
pub struct SqliteObservationStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteObservationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteObservationStore").finish_non_exhaustive()
    }
}

impl SqliteObservationStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> WeatherResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                WeatherError::Storage(format!(
                    "Failed to create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory store.
    pub fn in_memory() -> WeatherResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> WeatherResult<Self> {
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn count(&self) -> WeatherResult<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM weather", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn init_schema(conn: &Connection) -> WeatherResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS weather (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            location TEXT NOT NULL,
            date TEXT NOT NULL,
            temperature REAL NOT NULL,
            description TEXT,
            humidity INTEGER,
            wind_speed REAL
        );

        CREATE INDEX IF NOT EXISTS idx_weather_location_date ON weather(location, date);
        "#,
    )?;
    Ok(())
}

fn row_to_observation(row: &rusqlite::Row) -> rusqlite::Result<WeatherObservation> {
    let date_str: String = row.get(2)?;
    let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(WeatherObservation {
        id: row.get(0)?,
        location: row.get(1)?,
        date,
        temperature: row.get(3)?,
        description: row.get(4)?,
        humidity: row.get(5)?,
        wind_speed: row.get(6)?,
    })
}

fn fetch_by_id(conn: &Connection, id: i64) -> WeatherResult<Option<WeatherObservation>> {
    let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
    let obs = conn.query_row(&sql, params![id], row_to_observation).optional()?;
    Ok(obs)
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

impl ObservationStore for SqliteObservationStore {
    fn insert(&self, observation: NewObservation) -> WeatherResult<WeatherObservation> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO weather (location, date, temperature, description, humidity, wind_speed)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                observation.location,
                format_date(observation.date),
                observation.temperature,
                observation.description,
                observation.humidity,
                observation.wind_speed,
            ],
        )?;

        let id = conn.last_insert_rowid();
        tracing::debug!(id, location = %observation.location, date = %observation.date, "Inserted observation");

        Ok(WeatherObservation {
            id,
            location: observation.location,
            date: observation.date,
            temperature: observation.temperature,
            description: observation.description,
            humidity: observation.humidity,
            wind_speed: observation.wind_speed,
        })
    }

    fn find_by_location_and_date(
        &self,
        location: &str,
        date: NaiveDate,
    ) -> WeatherResult<Option<WeatherObservation>> {
        let conn = self.conn.lock();
        let sql = format!("{SELECT_COLUMNS} WHERE location = ?1 AND date = ?2 ORDER BY id LIMIT 1");
        let obs = conn
            .query_row(&sql, params![location, format_date(date)], row_to_observation)
            .optional()?;
        Ok(obs)
    }

    fn find_by_location_and_date_range(
        &self,
        location: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> WeatherResult<Vec<WeatherObservation>> {
        let conn = self.conn.lock();
        let sql = format!(
            "{SELECT_COLUMNS} WHERE location = ?1 AND date BETWEEN ?2 AND ?3 ORDER BY date, id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![location, format_date(start), format_date(end)],
            row_to_observation,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn update_fields(
        &self,
        id: i64,
        patch: &ObservationPatch,
    ) -> WeatherResult<Option<WeatherObservation>> {
        let conn = self.conn.lock();
        let Some(mut obs) = fetch_by_id(&conn, id)? else {
            return Ok(None);
        };

        patch.apply_to(&mut obs);

        conn.execute(
            r#"
            UPDATE weather
            SET temperature = ?1, description = ?2, humidity = ?3, wind_speed = ?4
            WHERE id = ?5
            "#,
            params![obs.temperature, obs.description, obs.humidity, obs.wind_speed, id],
        )?;

        tracing::debug!(id, "Updated observation");
        Ok(Some(obs))
    }

    fn delete_by_id(&self, id: i64) -> WeatherResult<bool> {
        let conn = self.conn.lock();
        let affected = conn.execute("DELETE FROM weather WHERE id = ?1", params![id])?;
        if affected > 0 {
            tracing::debug!(id, "Deleted observation");
        }
        Ok(affected > 0)
    }

    fn list_all(&self) -> WeatherResult<Vec<WeatherObservation>> {
        let conn = self.conn.lock();
        let sql = format!("{SELECT_COLUMNS} ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_observation)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteObservationStore {
        SqliteObservationStore::in_memory().expect("Failed to create test store")
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn new_obs(location: &str, d: u32, temperature: f64) -> NewObservation {
        NewObservation {
            location: location.into(),
            date: date(d),
            temperature,
            description: Some("Sunny".into()),
            humidity: Some(40),
            wind_speed: Some(10.5),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let store = create_test_store();
        let stored = store.insert(new_obs("Paris", 10, 21.0)).unwrap();
        assert!(stored.id > 0);

        let found = store.find_by_location_and_date("Paris", date(10)).unwrap().unwrap();
        assert_eq!(found, stored);

        assert!(store.find_by_location_and_date("Paris", date(11)).unwrap().is_none());
        assert!(store.find_by_location_and_date("paris", date(10)).unwrap().is_none());
    }

    #[test]
    fn test_optional_fields_roundtrip_as_null() {
        let store = create_test_store();
        let stored = store
            .insert(NewObservation {
                location: "Quito".into(),
                date: date(1),
                temperature: 14.0,
                description: None,
                humidity: None,
                wind_speed: None,
            })
            .unwrap();

        let found = store.find_by_location_and_date("Quito", date(1)).unwrap().unwrap();
        assert_eq!(found, stored);
        assert_eq!(found.description, None);
    }

    #[test]
    fn test_duplicates_are_allowed_and_oldest_wins() {
        let store = create_test_store();
        let first = store.insert(new_obs("Rome", 5, 25.0)).unwrap();
        store.insert(new_obs("Rome", 5, 30.0)).unwrap();

        assert_eq!(store.count().unwrap(), 2);
        let found = store.find_by_location_and_date("Rome", date(5)).unwrap().unwrap();
        assert_eq!(found.id, first.id);
        assert_eq!(found.temperature, 25.0);
    }

    #[test]
    fn test_range_lookup_is_ordered_and_filtered() {
        let store = create_test_store();
        store.insert(new_obs("Berlin", 12, 1.0)).unwrap();
        store.insert(new_obs("Berlin", 10, 2.0)).unwrap();
        store.insert(new_obs("Berlin", 20, 3.0)).unwrap();
        store.insert(new_obs("Munich", 11, 4.0)).unwrap();

        let rows = store.find_by_location_and_date_range("Berlin", date(9), date(12)).unwrap();
        let dates: Vec<_> = rows.iter().map(|o| o.date).collect();
        assert_eq!(dates, vec![date(10), date(12)]);
    }

    #[test]
    fn test_update_only_supplied_fields() {
        let store = create_test_store();
        let stored = store.insert(new_obs("Lima", 3, 19.0)).unwrap();

        let patch = ObservationPatch { humidity: Some(55), ..Default::default() };
        let updated = store.update_fields(stored.id, &patch).unwrap().unwrap();

        assert_eq!(updated.humidity, Some(55));
        assert_eq!(updated.temperature, 19.0);
        assert_eq!(updated.description.as_deref(), Some("Sunny"));
        assert_eq!(updated.wind_speed, Some(10.5));

        let reloaded = store.find_by_location_and_date("Lima", date(3)).unwrap().unwrap();
        assert_eq!(reloaded, updated);
    }

    #[test]
    fn test_update_nonexistent() {
        let store = create_test_store();
        let patch = ObservationPatch { temperature: Some(1.0), ..Default::default() };
        assert!(store.update_fields(999, &patch).unwrap().is_none());
    }

    #[test]
    fn test_delete() {
        let store = create_test_store();
        let stored = store.insert(new_obs("Oslo", 7, 8.0)).unwrap();

        assert!(store.delete_by_id(stored.id).unwrap());
        assert!(!store.delete_by_id(stored.id).unwrap());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_delete_nonexistent() {
        let store = create_test_store();
        assert!(!store.delete_by_id(42).unwrap());
    }

    #[test]
    fn test_list_all_ordered_by_id() {
        let store = create_test_store();
        let a = store.insert(new_obs("B", 2, 1.0)).unwrap();
        let b = store.insert(new_obs("A", 1, 2.0)).unwrap();

        let all = store.list_all().unwrap();
        assert_eq!(all.iter().map(|o| o.id).collect::<Vec<_>>(), vec![a.id, b.id]);
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("weather.db");

        {
            let store = SqliteObservationStore::open(&path).unwrap();
            store.insert(new_obs("Cairo", 15, 35.0)).unwrap();
        }

        let store = SqliteObservationStore::open(&path).unwrap();
        let found = store.find_by_location_and_date("Cairo", date(15)).unwrap();
        assert_eq!(found.map(|o| o.temperature), Some(35.0));
    }
}
