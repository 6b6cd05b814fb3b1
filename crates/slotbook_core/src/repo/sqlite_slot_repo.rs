//! Relational slot engine backed by SQLite.
//!
//! # Responsibility
//! - Persist slots in the `slots` table keyed by `(slot_date, hour)`.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - `UNIQUE(slot_date, hour)` guarantees at most one slot per key.
//! - Every multi-statement operation runs in a `BEGIN IMMEDIATE`
//!   transaction, so writers on the same database file serialize.
//! - `book` only ever writes a slot whose occupant is empty.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::{open_db, open_db_in_memory};
use crate::model::contact::normalize_contact;
use crate::model::slot::{Slot, SlotId, SlotTime, BLOCKED_SENTINEL};
use crate::repo::slot_repo::{
    canonical_hours, check_cancel, EngineKind, ReplaceGuard, SlotRef, SlotRepository,
    StorageError, StoreError, StoreResult,
};
use chrono::NaiveDate;
use log::{debug, info, warn};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use uuid::Uuid;

const SLOT_SELECT_SQL: &str = "SELECT
    slot_uuid,
    slot_date,
    hour,
    occupant_name,
    occupant_contact
FROM slots";

const TOUCH_UPDATED_AT: &str = "updated_at = (strftime('%s', 'now') * 1000)";

/// SQLite-backed slot store.
///
/// Owns one connection. Separate instances opened on the same file (other
/// threads or processes) serialize through SQLite's own write lock.
pub struct SqliteSlotRepository {
    conn: Mutex<Connection>,
}

impl SqliteSlotRepository {
    /// Wraps an already migrated connection.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        ensure_slot_connection_ready(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens (creating when missing) and migrates a database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::try_new(open_db(path)?)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }
}

impl SlotRepository for SqliteSlotRepository {
    fn engine(&self) -> EngineKind {
        EngineKind::Sqlite
    }

    fn init_day(&self, date: NaiveDate, default_hours: &[SlotTime]) -> StoreResult<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if count_day_slots(&tx, date)? > 0 {
            return Ok(false);
        }

        let hours = canonical_hours(default_hours);
        for hour in &hours {
            insert_slot(&tx, date, *hour, BLOCKED_SENTINEL)?;
        }
        tx.commit()?;

        info!(
            "event=day_init module=store status=ok engine=sqlite date={date} slots={}",
            hours.len()
        );
        Ok(true)
    }

    fn list_day(&self, date: NaiveDate) -> StoreResult<Vec<Slot>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "{SLOT_SELECT_SQL}
             WHERE slot_date = ?1
             ORDER BY hour ASC;"
        ))?;

        let mut rows = stmt.query([date_key(date)])?;
        let mut slots = Vec::new();
        while let Some(row) = rows.next()? {
            slots.push(parse_slot_row(row)?);
        }
        Ok(slots)
    }

    fn book(
        &self,
        date: NaiveDate,
        hour: SlotTime,
        name: &str,
        contact: &str,
    ) -> StoreResult<()> {
        let contact = normalize_contact(contact);
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = tx
            .execute(
                &format!(
                    "UPDATE slots
                     SET occupant_name = ?1, occupant_contact = ?2, {TOUCH_UPDATED_AT}
                     WHERE slot_date = ?3
                       AND hour = ?4
                       AND occupant_name = '';"
                ),
                params![name, contact, date_key(date), hour.to_string()],
            )
            .map_err(|err| map_conflict(err, date, hour))?;

        if changed == 0 {
            let exists = slot_exists(&tx, date, hour)?;
            debug!(
                "event=slot_book module=store status=rejected engine=sqlite date={date} hour={hour} exists={exists}"
            );
            return Err(if exists {
                StoreError::AlreadyTaken { date, hour }
            } else {
                StoreError::NotFound(SlotRef::Key { date, hour })
            });
        }

        tx.commit().map_err(|err| map_conflict(err, date, hour))?;
        info!("event=slot_book module=store status=ok engine=sqlite date={date} hour={hour}");
        Ok(())
    }

    fn self_cancel(&self, date: NaiveDate, hour: SlotTime, contact: &str) -> StoreResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let occupant: Option<(String, String, String)> = tx
            .query_row(
                "SELECT slot_uuid, occupant_name, occupant_contact
                 FROM slots
                 WHERE slot_date = ?1
                   AND hour = ?2;",
                params![date_key(date), hour.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((slot_uuid, stored_name, stored_contact)) = occupant else {
            return Err(StoreError::NotFound(SlotRef::Key { date, hour }));
        };
        check_cancel(date, hour, &stored_name, &stored_contact, contact)?;

        tx.execute(
            &format!(
                "UPDATE slots
                 SET occupant_name = '', occupant_contact = '', {TOUCH_UPDATED_AT}
                 WHERE slot_uuid = ?1;"
            ),
            [slot_uuid],
        )?;
        tx.commit()?;

        info!("event=slot_cancel module=store status=ok engine=sqlite date={date} hour={hour}");
        Ok(())
    }

    fn admin_set(&self, id: &SlotId, name: &str, contact: &str) -> StoreResult<()> {
        let slot_uuid = row_key(id)?;
        let contact = normalize_contact(contact);
        let conn = self.conn.lock();

        let changed = conn.execute(
            &format!(
                "UPDATE slots
                 SET occupant_name = ?1, occupant_contact = ?2, {TOUCH_UPDATED_AT}
                 WHERE slot_uuid = ?3;"
            ),
            params![name, contact, slot_uuid.to_string()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(SlotRef::Id(id.clone())));
        }

        info!("event=slot_admin_set module=store status=ok engine=sqlite slot_id={id}");
        Ok(())
    }

    fn admin_delete_hour(&self, id: &SlotId) -> StoreResult<()> {
        let slot_uuid = row_key(id)?;
        let conn = self.conn.lock();

        let changed = conn.execute(
            "DELETE FROM slots WHERE slot_uuid = ?1;",
            [slot_uuid.to_string()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(SlotRef::Id(id.clone())));
        }

        info!("event=slot_delete module=store status=ok engine=sqlite slot_id={id}");
        Ok(())
    }

    fn admin_add_hour(&self, date: NaiveDate, hour: SlotTime) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "INSERT OR IGNORE INTO slots (slot_uuid, slot_date, hour, occupant_name, occupant_contact)
             VALUES (?1, ?2, ?3, '', '');",
            params![Uuid::new_v4().to_string(), date_key(date), hour.to_string()],
        )?;

        info!(
            "event=slot_add module=store status=ok engine=sqlite date={date} hour={hour} created={}",
            changed > 0
        );
        Ok(changed > 0)
    }

    fn replace_day_pattern(
        &self,
        date: NaiveDate,
        hours: &[SlotTime],
        guard: ReplaceGuard,
    ) -> StoreResult<()> {
        let hours = canonical_hours(hours);
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if guard == ReplaceGuard::RefuseIfBooked {
            let booked = count_booked_slots(&tx, date)?;
            if booked > 0 {
                return Err(StoreError::DayHasBookings { date, booked });
            }
        }

        // Dropping `tx` on any error below rolls the delete back.
        tx.execute("DELETE FROM slots WHERE slot_date = ?1;", [date_key(date)])?;
        for hour in &hours {
            if let Err(err) = insert_slot(&tx, date, *hour, "") {
                warn!(
                    "event=day_replace module=store status=rollback engine=sqlite date={date} hour={hour} error={err}"
                );
                return Err(err);
            }
        }
        tx.commit()?;

        info!(
            "event=day_replace module=store status=ok engine=sqlite date={date} slots={}",
            hours.len()
        );
        Ok(())
    }
}

/// The relational engine only understands row ids.
fn row_key(id: &SlotId) -> StoreResult<Uuid> {
    id.as_row()
        .ok_or_else(|| StoreError::NotFound(SlotRef::Id(id.clone())))
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn insert_slot(
    conn: &Connection,
    date: NaiveDate,
    hour: SlotTime,
    occupant_name: &str,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO slots (slot_uuid, slot_date, hour, occupant_name, occupant_contact)
         VALUES (?1, ?2, ?3, ?4, '');",
        params![
            Uuid::new_v4().to_string(),
            date_key(date),
            hour.to_string(),
            occupant_name
        ],
    )?;
    Ok(())
}

fn count_day_slots(conn: &Connection, date: NaiveDate) -> StoreResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM slots WHERE slot_date = ?1;",
        [date_key(date)],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn count_booked_slots(conn: &Connection, date: NaiveDate) -> StoreResult<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*)
         FROM slots
         WHERE slot_date = ?1
           AND occupant_name <> ''
           AND occupant_name <> ?2;",
        params![date_key(date), BLOCKED_SENTINEL],
        |row| row.get(0),
    )?;
    usize::try_from(count)
        .map_err(|_| StoreError::Storage(StorageError::InvalidData(format!("negative count {count}"))))
}

fn slot_exists(conn: &Connection, date: NaiveDate, hour: SlotTime) -> StoreResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM slots WHERE slot_date = ?1 AND hour = ?2;",
            params![date_key(date), hour.to_string()],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// A constraint violation while booking means another writer won the slot.
fn map_conflict(err: rusqlite::Error, date: NaiveDate, hour: SlotTime) -> StoreError {
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => StoreError::AlreadyTaken { date, hour },
        _ => StoreError::from(err),
    }
}

fn parse_slot_row(row: &Row<'_>) -> StoreResult<Slot> {
    let uuid_text: String = row.get("slot_uuid")?;
    let slot_uuid = Uuid::parse_str(&uuid_text).map_err(|_| {
        StorageError::InvalidData(format!("invalid uuid `{uuid_text}` in slots.slot_uuid"))
    })?;

    let date_text: String = row.get("slot_date")?;
    let date = NaiveDate::parse_from_str(&date_text, "%Y-%m-%d").map_err(|_| {
        StorageError::InvalidData(format!("invalid date `{date_text}` in slots.slot_date"))
    })?;

    let hour_text: String = row.get("hour")?;
    let hour = hour_text.parse::<SlotTime>().map_err(|_| {
        StorageError::InvalidData(format!("invalid hour `{hour_text}` in slots.hour"))
    })?;

    Ok(Slot {
        id: SlotId::row(slot_uuid),
        date,
        hour,
        occupant_name: row.get("occupant_name")?,
        occupant_contact: row.get("occupant_contact")?,
    })
}

fn ensure_slot_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(StoreError::Storage(StorageError::InvalidData(format!(
            "slot store requires schema version {expected_version}, got {actual_version}"
        ))));
    }
    Ok(())
}
