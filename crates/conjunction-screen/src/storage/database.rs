//! SQLite catalog and alert store

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use super::{AlertStore, CatalogStore};
use crate::error::{Error, Result};
use crate::types::{
    Alert, CandidatePair, CatalogEntry, ConjunctionEvent, MeanElements, ObjectId, ObjectMetadata,
    OrbitalState, RiskLevel,
};
use crate::types::conjunction::alert_key_time;

const STATE_COLUMNS: &str = "s.object_id, COALESCE(o.name, 'OBJECT ' || s.object_id), s.epoch_ms, \
    s.inclination_deg, s.eccentricity, s.raan_deg, s.mean_motion, s.arg_perigee_deg, \
    s.mean_anomaly_deg, s.line1, s.line2";

const ALERT_COLUMNS: &str = "id, satellite1_id, satellite2_id, tca_ms, min_distance_km, \
    relative_velocity_kms, collision_probability, risk_level, resolved, \
    sat1_x, sat1_y, sat1_z, sat2_x, sat2_y, sat2_z, created_at, updated_at";

const EVENT_COLUMNS: &str = "id, primary_id, secondary_id, tca_ms, miss_distance_m, \
    relative_velocity_ms, risk_level, primary_altitude_km, secondary_altitude_km, \
    screening_epoch, stale_state, created_at, updated_at";

/// Row counts for status output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub objects: usize,
    pub current_states: usize,
    pub alerts: usize,
    pub unresolved_alerts: usize,
    pub events: usize,
}

/// SQLite-backed catalog, alert and event store
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| Error::storage(format!("Failed to open database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.migrate()?;
        Ok(store)
    }

    /// Create an in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::storage(format!("Failed to open in-memory database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
        "#).map_err(|e| Error::storage(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS objects (
                object_id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS orbital_states (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                object_id INTEGER NOT NULL,
                epoch_ms INTEGER NOT NULL,
                inclination_deg REAL NOT NULL,
                eccentricity REAL NOT NULL,
                raan_deg REAL NOT NULL,
                mean_motion REAL NOT NULL,
                arg_perigee_deg REAL NOT NULL,
                mean_anomaly_deg REAL NOT NULL,
                line1 TEXT NOT NULL,
                line2 TEXT NOT NULL,
                is_current INTEGER NOT NULL DEFAULT 0,
                fetched_at TEXT NOT NULL,
                UNIQUE(object_id, epoch_ms)
            );

            CREATE INDEX IF NOT EXISTS idx_states_current ON orbital_states(is_current, object_id);

            -- Alerts are keyed by the unordered pair and the TCA in whole seconds
            CREATE TABLE IF NOT EXISTS collision_alerts (
                id TEXT PRIMARY KEY,
                object_low INTEGER NOT NULL,
                object_high INTEGER NOT NULL,
                satellite1_id INTEGER NOT NULL,
                satellite2_id INTEGER NOT NULL,
                tca_ms INTEGER NOT NULL,
                min_distance_km REAL NOT NULL,
                relative_velocity_kms REAL NOT NULL,
                collision_probability REAL NOT NULL,
                risk_level TEXT NOT NULL,
                resolved INTEGER NOT NULL DEFAULT 0,
                sat1_x REAL NOT NULL,
                sat1_y REAL NOT NULL,
                sat1_z REAL NOT NULL,
                sat2_x REAL NOT NULL,
                sat2_y REAL NOT NULL,
                sat2_z REAL NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(object_low, object_high, tca_ms)
            );

            CREATE INDEX IF NOT EXISTS idx_alerts_unresolved ON collision_alerts(resolved, tca_ms);

            CREATE TABLE IF NOT EXISTS conjunction_events (
                id TEXT PRIMARY KEY,
                primary_id INTEGER NOT NULL,
                secondary_id INTEGER NOT NULL,
                tca_ms INTEGER NOT NULL,
                miss_distance_m REAL NOT NULL,
                relative_velocity_ms REAL NOT NULL,
                risk_level TEXT NOT NULL,
                primary_altitude_km REAL NOT NULL,
                secondary_altitude_km REAL NOT NULL,
                screening_epoch TEXT NOT NULL,
                stale_state INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(primary_id, secondary_id, tca_ms)
            );

            CREATE INDEX IF NOT EXISTS idx_events_primary_tca ON conjunction_events(primary_id, tca_ms);
        "#).map_err(|e| Error::storage(format!("Failed to create tables: {}", e)))?;

        tracing::debug!("Database migrations complete");
        Ok(())
    }

    // ==================== Catalog Operations ====================

    /// Insert or rename an object
    pub fn upsert_object(&self, object: &ObjectMetadata) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT INTO objects (object_id, name, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(object_id) DO UPDATE SET
                name = excluded.name,
                updated_at = excluded.updated_at
            "#,
            params![object.object_id, object.name, Utc::now().to_rfc3339()],
        ).map_err(|e| Error::storage(format!("Failed to upsert object: {}", e)))?;

        Ok(())
    }

    /// Store an element set; the newest epoch per object becomes current
    ///
    /// Returns whether `state` is now the current state of its object.
    pub fn insert_state(&self, state: &OrbitalState) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::storage(format!("Failed to begin transaction: {}", e)))?;

        let epoch_ms = state.epoch.timestamp_millis();
        let e = &state.elements;
        tx.execute(
            r#"
            INSERT OR IGNORE INTO orbital_states (
                object_id, epoch_ms, inclination_deg, eccentricity, raan_deg, mean_motion,
                arg_perigee_deg, mean_anomaly_deg, line1, line2, is_current, fetched_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11)
            "#,
            params![
                state.object_id,
                epoch_ms,
                e.inclination_deg,
                e.eccentricity,
                e.raan_deg,
                e.mean_motion_rev_per_day,
                e.arg_perigee_deg,
                e.mean_anomaly_deg,
                state.line1,
                state.line2,
                Utc::now().to_rfc3339(),
            ],
        ).map_err(|e| Error::storage(format!("Failed to insert state: {}", e)))?;

        tx.execute(
            r#"
            UPDATE orbital_states SET is_current = (epoch_ms = (
                SELECT MAX(epoch_ms) FROM orbital_states WHERE object_id = ?1
            ))
            WHERE object_id = ?1
            "#,
            params![state.object_id],
        ).map_err(|e| Error::storage(format!("Failed to update current state: {}", e)))?;

        let is_current: bool = tx
            .query_row(
                "SELECT is_current FROM orbital_states WHERE object_id = ?1 AND epoch_ms = ?2",
                params![state.object_id, epoch_ms],
                |row| row.get(0),
            )
            .map_err(|e| Error::storage(format!("Failed to read state: {}", e)))?;

        tx.commit()
            .map_err(|e| Error::storage(format!("Failed to commit state: {}", e)))?;
        Ok(is_current)
    }

    /// Row counts across all tables
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock();
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = conn
                .query_row(sql, [], |row| row.get(0))
                .map_err(|e| Error::storage(format!("Failed to count rows: {}", e)))?;
            Ok(n as usize)
        };

        Ok(StoreStats {
            objects: count("SELECT COUNT(*) FROM objects")?,
            current_states: count("SELECT COUNT(*) FROM orbital_states WHERE is_current = 1")?,
            alerts: count("SELECT COUNT(*) FROM collision_alerts")?,
            unresolved_alerts: count("SELECT COUNT(*) FROM collision_alerts WHERE resolved = 0")?,
            events: count("SELECT COUNT(*) FROM conjunction_events")?,
        })
    }
}

impl CatalogStore for SqliteStore {
    fn current_entries(&self) -> Result<Vec<CatalogEntry>> {
        let conn = self.conn.lock();

        let sql = format!(
            "SELECT {} FROM orbital_states s LEFT JOIN objects o ON o.object_id = s.object_id \
             WHERE s.is_current = 1 ORDER BY s.object_id",
            STATE_COLUMNS
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::storage(format!("Failed to prepare query: {}", e)))?;

        let entries = stmt
            .query_map([], row_to_entry)
            .map_err(|e| Error::storage(format!("Failed to list states: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    fn current_entry(&self, id: ObjectId) -> Result<Option<CatalogEntry>> {
        let conn = self.conn.lock();

        let sql = format!(
            "SELECT {} FROM orbital_states s LEFT JOIN objects o ON o.object_id = s.object_id \
             WHERE s.is_current = 1 AND s.object_id = ?1",
            STATE_COLUMNS
        );
        let entry = conn
            .query_row(&sql, params![id], row_to_entry)
            .optional()
            .map_err(|e| Error::storage(format!("Failed to get state: {}", e)))?;

        Ok(entry)
    }

    fn object(&self, id: ObjectId) -> Result<Option<ObjectMetadata>> {
        let conn = self.conn.lock();

        let object = conn
            .query_row(
                "SELECT object_id, name FROM objects WHERE object_id = ?1",
                params![id],
                |row| {
                    Ok(ObjectMetadata {
                        object_id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(|e| Error::storage(format!("Failed to get object: {}", e)))?;

        Ok(object)
    }
}

impl AlertStore for SqliteStore {
    fn find_alert(&self, pair: CandidatePair, tca: DateTime<Utc>) -> Result<Option<Alert>> {
        let conn = self.conn.lock();
        select_alert_by_key(&conn, pair, alert_key_time(tca).timestamp_millis())
    }

    fn insert_alert_if_absent(&self, alert: &Alert) -> Result<Alert> {
        let conn = self.conn.lock();
        let pair = alert.pair();
        let tca_ms = alert_key_time(alert.tca).timestamp_millis();
        let p1 = alert.satellite1_position_km;
        let p2 = alert.satellite2_position_km;

        let inserted = conn.execute(
            r#"
            INSERT INTO collision_alerts (
                id, object_low, object_high, satellite1_id, satellite2_id, tca_ms,
                min_distance_km, relative_velocity_kms, collision_probability, risk_level,
                resolved, sat1_x, sat1_y, sat1_z, sat2_x, sat2_y, sat2_z, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            ON CONFLICT(object_low, object_high, tca_ms) DO NOTHING
            "#,
            params![
                alert.id.to_string(),
                pair.low(),
                pair.high(),
                alert.satellite1_id,
                alert.satellite2_id,
                tca_ms,
                alert.min_distance_km,
                alert.relative_velocity_kms,
                alert.collision_probability,
                alert.risk_level.as_str(),
                alert.resolved,
                p1[0],
                p1[1],
                p1[2],
                p2[0],
                p2[1],
                p2[2],
                alert.created_at.to_rfc3339(),
                alert.updated_at.to_rfc3339(),
            ],
        ).map_err(|e| Error::storage(format!("Failed to insert alert: {}", e)))?;

        if inserted == 0 {
            tracing::trace!("Alert for {} at {} already exists", pair, alert.tca);
        }

        select_alert_by_key(&conn, pair, tca_ms)?.ok_or_else(|| {
            Error::internal(format!("Alert for {} vanished after insert", pair))
        })
    }

    fn list_unresolved(&self, level: Option<RiskLevel>) -> Result<Vec<Alert>> {
        let conn = self.conn.lock();

        let sql = format!(
            "SELECT {} FROM collision_alerts WHERE resolved = 0 \
             AND (?1 IS NULL OR risk_level = ?1) ORDER BY tca_ms, object_low, object_high",
            ALERT_COLUMNS
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::storage(format!("Failed to prepare query: {}", e)))?;

        let alerts = stmt
            .query_map(params![level.map(|l| l.as_str())], row_to_alert)
            .map_err(|e| Error::storage(format!("Failed to list alerts: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(alerts)
    }

    fn resolve_alert(&self, id: Uuid, at: DateTime<Utc>) -> Result<Alert> {
        let conn = self.conn.lock();

        let updated = conn.execute(
            "UPDATE collision_alerts SET resolved = 1, updated_at = ?2 WHERE id = ?1",
            params![id.to_string(), at.to_rfc3339()],
        ).map_err(|e| Error::storage(format!("Failed to resolve alert: {}", e)))?;

        if updated == 0 {
            return Err(Error::not_found(format!("Alert {}", id)));
        }

        select_alert_by_id(&conn, id)?
            .ok_or_else(|| Error::not_found(format!("Alert {}", id)))
    }

    fn record_event(&self, event: &ConjunctionEvent) -> Result<ConjunctionEvent> {
        let conn = self.conn.lock();
        let tca_ms = alert_key_time(event.tca).timestamp_millis();

        conn.execute(
            r#"
            INSERT INTO conjunction_events (
                id, primary_id, secondary_id, tca_ms, miss_distance_m, relative_velocity_ms,
                risk_level, primary_altitude_km, secondary_altitude_km, screening_epoch,
                stale_state, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(primary_id, secondary_id, tca_ms) DO NOTHING
            "#,
            params![
                event.id.to_string(),
                event.primary_id,
                event.secondary_id,
                tca_ms,
                event.miss_distance_m,
                event.relative_velocity_ms,
                event.risk_level.as_str(),
                event.primary_altitude_km,
                event.secondary_altitude_km,
                event.screening_epoch.to_rfc3339(),
                event.stale_state,
                event.created_at.to_rfc3339(),
                event.updated_at.to_rfc3339(),
            ],
        ).map_err(|e| Error::storage(format!("Failed to record event: {}", e)))?;

        let sql = format!(
            "SELECT {} FROM conjunction_events WHERE primary_id = ?1 AND secondary_id = ?2 AND tca_ms = ?3",
            EVENT_COLUMNS
        );
        conn.query_row(
            &sql,
            params![event.primary_id, event.secondary_id, tca_ms],
            row_to_event,
        )
        .map_err(|e| Error::storage(format!("Failed to read event: {}", e)))
    }

    fn upcoming_events(
        &self,
        primary: ObjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ConjunctionEvent>> {
        let conn = self.conn.lock();

        let sql = format!(
            "SELECT {} FROM conjunction_events WHERE primary_id = ?1 AND tca_ms BETWEEN ?2 AND ?3 \
             ORDER BY miss_distance_m ASC",
            EVENT_COLUMNS
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::storage(format!("Failed to prepare query: {}", e)))?;

        let events = stmt
            .query_map(
                params![primary, from.timestamp_millis(), to.timestamp_millis()],
                row_to_event,
            )
            .map_err(|e| Error::storage(format!("Failed to list events: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(events)
    }

    fn high_risk_events(
        &self,
        primary: ObjectId,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConjunctionEvent>> {
        let conn = self.conn.lock();

        let sql = format!(
            "SELECT {} FROM conjunction_events WHERE primary_id = ?1 AND tca_ms > ?2 \
             AND risk_level IN ('HIGH', 'CRITICAL') ORDER BY tca_ms ASC",
            EVENT_COLUMNS
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::storage(format!("Failed to prepare query: {}", e)))?;

        let events = stmt
            .query_map(params![primary, now.timestamp_millis()], row_to_event)
            .map_err(|e| Error::storage(format!("Failed to list events: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(events)
    }

    fn purge_events_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock();

        let count = conn.execute(
            "DELETE FROM conjunction_events WHERE tca_ms < ?1",
            params![cutoff.timestamp_millis()],
        ).map_err(|e| Error::storage(format!("Failed to purge events: {}", e)))?;

        Ok(count)
    }
}

fn select_alert_by_key(conn: &Connection, pair: CandidatePair, tca_ms: i64) -> Result<Option<Alert>> {
    let sql = format!(
        "SELECT {} FROM collision_alerts WHERE object_low = ?1 AND object_high = ?2 AND tca_ms = ?3",
        ALERT_COLUMNS
    );
    let alert = conn
        .query_row(&sql, params![pair.low(), pair.high(), tca_ms], row_to_alert)
        .optional()
        .map_err(|e| Error::storage(format!("Failed to get alert: {}", e)))?;
    Ok(alert)
}

fn select_alert_by_id(conn: &Connection, id: Uuid) -> Result<Option<Alert>> {
    let sql = format!("SELECT {} FROM collision_alerts WHERE id = ?1", ALERT_COLUMNS);
    let alert = conn
        .query_row(&sql, params![id.to_string()], row_to_alert)
        .optional()
        .map_err(|e| Error::storage(format!("Failed to get alert: {}", e)))?;
    Ok(alert)
}

fn millis_to_datetime(idx: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_risk_level(idx: usize, s: &str) -> rusqlite::Result<RiskLevel> {
    s.parse::<RiskLevel>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_uuid(idx: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<CatalogEntry> {
    let object_id: ObjectId = row.get(0)?;
    let name: String = row.get(1)?;
    let epoch_ms: i64 = row.get(2)?;

    Ok(CatalogEntry {
        metadata: ObjectMetadata { object_id, name },
        state: OrbitalState {
            object_id,
            epoch: millis_to_datetime(2, epoch_ms)?,
            elements: MeanElements {
                inclination_deg: row.get(3)?,
                eccentricity: row.get(4)?,
                raan_deg: row.get(5)?,
                mean_motion_rev_per_day: row.get(6)?,
                arg_perigee_deg: row.get(7)?,
                mean_anomaly_deg: row.get(8)?,
            },
            line1: row.get(9)?,
            line2: row.get(10)?,
        },
    })
}

fn row_to_alert(row: &rusqlite::Row) -> rusqlite::Result<Alert> {
    let id_str: String = row.get(0)?;
    let tca_ms: i64 = row.get(3)?;
    let risk_str: String = row.get(7)?;
    let created_at_str: String = row.get(15)?;
    let updated_at_str: String = row.get(16)?;

    Ok(Alert {
        id: parse_uuid(0, &id_str)?,
        satellite1_id: row.get(1)?,
        satellite2_id: row.get(2)?,
        tca: millis_to_datetime(3, tca_ms)?,
        min_distance_km: row.get(4)?,
        relative_velocity_kms: row.get(5)?,
        collision_probability: row.get(6)?,
        risk_level: parse_risk_level(7, &risk_str)?,
        resolved: row.get(8)?,
        satellite1_position_km: [row.get(9)?, row.get(10)?, row.get(11)?],
        satellite2_position_km: [row.get(12)?, row.get(13)?, row.get(14)?],
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
    })
}

fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<ConjunctionEvent> {
    let id_str: String = row.get(0)?;
    let tca_ms: i64 = row.get(3)?;
    let risk_str: String = row.get(6)?;
    let screening_epoch_str: String = row.get(9)?;
    let created_at_str: String = row.get(11)?;
    let updated_at_str: String = row.get(12)?;

    Ok(ConjunctionEvent {
        id: parse_uuid(0, &id_str)?,
        primary_id: row.get(1)?,
        secondary_id: row.get(2)?,
        tca: millis_to_datetime(3, tca_ms)?,
        miss_distance_m: row.get(4)?,
        relative_velocity_ms: row.get(5)?,
        risk_level: parse_risk_level(6, &risk_str)?,
        primary_altitude_km: row.get(7)?,
        secondary_altitude_km: row.get(8)?,
        screening_epoch: parse_timestamp(&screening_epoch_str),
        stale_state: row.get(10)?,
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{approach, entry};
    use chrono::{Duration, TimeZone};

    fn alert(a: ObjectId, b: ObjectId, tca: DateTime<Utc>, level: RiskLevel) -> Alert {
        let now = Utc::now();
        Alert {
            id: Uuid::new_v4(),
            satellite1_id: a,
            satellite2_id: b,
            tca,
            min_distance_km: 0.8,
            relative_velocity_kms: 11.2,
            collision_probability: 0.5,
            risk_level: level,
            resolved: false,
            satellite1_position_km: [6778.0, 1.0, 2.0],
            satellite2_position_km: [6778.5, 1.0, 2.0],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_newest_state_becomes_current() {
        let store = SqliteStore::in_memory().unwrap();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        let iss = entry(25544, "ISS (ZARYA)", 15.5, 51.6, 10.0, t0);
        store.upsert_object(&iss.metadata).unwrap();
        assert!(store.insert_state(&iss.state).unwrap());

        let newer = entry(25544, "ISS (ZARYA)", 15.51, 51.6, 11.0, t0 + Duration::days(1));
        assert!(store.insert_state(&newer.state).unwrap());

        let older = entry(25544, "ISS (ZARYA)", 15.49, 51.6, 9.0, t0 - Duration::days(1));
        assert!(!store.insert_state(&older.state).unwrap());

        let current = store.current_entry(25544).unwrap().unwrap();
        assert_eq!(current.state.epoch, t0 + Duration::days(1));
        assert_eq!(current.name(), "ISS (ZARYA)");
        assert_eq!(store.current_entries().unwrap().len(), 1);
        assert_eq!(store.stats().unwrap().current_states, 1);
    }

    #[test]
    fn test_alerts_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("catalog.db");
        let tca = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

        let stored = {
            let store = SqliteStore::new(&path).unwrap();
            store
                .insert_alert_if_absent(&alert(7, 8, tca, RiskLevel::Medium))
                .unwrap()
        };

        let reopened = SqliteStore::new(&path).unwrap();
        let found = reopened
            .find_alert(CandidatePair::new(8, 7), tca)
            .unwrap()
            .unwrap();
        assert_eq!(found.id, stored.id);
        assert_eq!(found.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_state_without_object_row_gets_placeholder_name() {
        let store = SqliteStore::in_memory().unwrap();
        let orphan = entry(99001, "", 15.0, 97.0, 0.0, Utc::now());
        store.insert_state(&orphan.state).unwrap();

        let entry = store.current_entry(99001).unwrap().unwrap();
        assert_eq!(entry.name(), "OBJECT 99001");
        assert!(store.object(99001).unwrap().is_none());
        assert!(store.current_entry(1).unwrap().is_none());
    }

    #[test]
    fn test_alert_insert_is_idempotent_on_unordered_pair() {
        let store = SqliteStore::in_memory().unwrap();
        let tca = Utc.with_ymd_and_hms(2026, 2, 1, 3, 4, 5).unwrap();

        let first = store
            .insert_alert_if_absent(&alert(10, 20, tca, RiskLevel::High))
            .unwrap();
        // reversed pair, sub-second TCA jitter
        let again = store
            .insert_alert_if_absent(&alert(
                20,
                10,
                tca + Duration::milliseconds(400),
                RiskLevel::Critical,
            ))
            .unwrap();

        assert_eq!(first.id, again.id);
        assert_eq!(again.risk_level, RiskLevel::High);
        assert_eq!(store.stats().unwrap().alerts, 1);
        assert!(store
            .find_alert(CandidatePair::new(20, 10), tca)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_concurrent_alert_inserts() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let tca = Utc.with_ymd_and_hms(2026, 2, 1, 3, 4, 5).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let (a, b) = if i % 2 == 0 { (1, 2) } else { (2, 1) };
                    store
                        .insert_alert_if_absent(&alert(a, b, tca, RiskLevel::Medium))
                        .unwrap()
                        .id
                })
            })
            .collect();

        let ids: std::collections::HashSet<Uuid> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.stats().unwrap().alerts, 1);
    }

    #[test]
    fn test_list_and_resolve() {
        let store = SqliteStore::in_memory().unwrap();
        let tca = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();

        let critical = store
            .insert_alert_if_absent(&alert(1, 2, tca + Duration::hours(2), RiskLevel::Critical))
            .unwrap();
        store
            .insert_alert_if_absent(&alert(3, 4, tca + Duration::hours(1), RiskLevel::Low))
            .unwrap();

        let all = store.list_unresolved(None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].satellite1_id, 3);

        let only_critical = store.list_unresolved(Some(RiskLevel::Critical)).unwrap();
        assert_eq!(only_critical.len(), 1);
        assert_eq!(only_critical[0].id, critical.id);

        let resolved_at = tca + Duration::days(1);
        let resolved = store.resolve_alert(critical.id, resolved_at).unwrap();
        assert!(resolved.resolved);
        assert_eq!(resolved.updated_at, resolved_at);
        assert_eq!(resolved.min_distance_km, critical.min_distance_km);
        assert_eq!(resolved.created_at, critical.created_at);
        assert_eq!(store.list_unresolved(None).unwrap().len(), 1);

        let err = store.resolve_alert(Uuid::new_v4(), resolved_at).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_events_queries_and_purge() {
        let store = SqliteStore::in_memory().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

        let record = |secondary, hours: i64, miss_m: f64, level| {
            let approach = approach(1, secondary, now + Duration::hours(hours), miss_m, 9000.0);
            store
                .record_event(&ConjunctionEvent::from_approach(&approach, level, now))
                .unwrap()
        };
        let first = record(2, 10, 900.0, RiskLevel::Critical);
        let duplicate = record(2, 10, 900.0, RiskLevel::Critical);
        assert_eq!(first.id, duplicate.id);
        record(3, 30, 4000.0, RiskLevel::High);
        record(4, 5, 8000.0, RiskLevel::Medium);
        record(5, -48, 100.0, RiskLevel::Critical);

        let upcoming = store
            .upcoming_events(1, now, now + Duration::days(7))
            .unwrap();
        let ids: Vec<ObjectId> = upcoming.iter().map(|e| e.secondary_id).collect();
        assert_eq!(ids, vec![2, 3, 4]);

        let high = store.high_risk_events(1, now).unwrap();
        let ids: Vec<ObjectId> = high.iter().map(|e| e.secondary_id).collect();
        assert_eq!(ids, vec![2, 3]);

        assert_eq!(store.purge_events_before(now - Duration::days(1)).unwrap(), 1);
        assert_eq!(store.stats().unwrap().events, 3);
    }
}
