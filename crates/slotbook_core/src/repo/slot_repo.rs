//! Slot store contract shared by every persistence engine.
//!
//! # Responsibility
//! - Define the operation set both engines implement with identical
//!   observable semantics.
//! - Define the typed outcome taxonomy returned by every mutating call.
//!
//! # Invariants
//! - Failures are returned as `StoreError` values, never as silent no-ops.
//! - `StorageError` detail never reaches end users; see
//!   `BookingError::user_message`.
//! - A failed `replace_day_pattern` leaves the day exactly as it was.

use crate::db::DbError;
use crate::model::slot::{Slot, SlotId, SlotTime};
use chrono::NaiveDate;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence backend identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// Transactional SQLite table.
    Sqlite,
    /// Whole-document JSON file.
    Json,
}

impl EngineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Json => "json",
        }
    }
}

impl Display for EngineKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How `replace_day_pattern` treats slots that hold live bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceGuard {
    /// Destroy every existing slot, booked or not.
    Force,
    /// Fail with `StoreError::DayHasBookings` when any slot is booked.
    RefuseIfBooked,
}

/// Reference to the slot a `NotFound` outcome is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotRef {
    Id(SlotId),
    Key { date: NaiveDate, hour: SlotTime },
}

impl Display for SlotRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id {id}"),
            Self::Key { date, hour } => write!(f, "{date} {hour}"),
        }
    }
}

/// Engine-level failure (I/O, transaction, encoding, persisted garbage).
#[derive(Debug)]
pub enum StorageError {
    Db(DbError),
    Io(std::io::Error),
    Json(serde_json::Error),
    /// Persisted data cannot be converted into a valid read model.
    InvalidData(String),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "slot file i/o failed: {err}"),
            Self::Json(err) => write!(f, "slot document encoding failed: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted slot data: {message}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Typed outcome of a slot store operation.
#[derive(Debug)]
pub enum StoreError {
    /// Referenced slot/hour does not exist.
    NotFound(SlotRef),
    /// Booking race lost: the slot already has an occupant.
    AlreadyTaken { date: NaiveDate, hour: SlotTime },
    /// Cancel on a slot without occupant.
    AlreadyEmpty { date: NaiveDate, hour: SlotTime },
    /// Claimed contact does not match the stored one.
    ContactMismatch { date: NaiveDate, hour: SlotTime },
    /// Guarded day replacement found live bookings.
    DayHasBookings { date: NaiveDate, booked: usize },
    Storage(StorageError),
}

impl StoreError {
    /// Stable short code for logs and shell mapping.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::AlreadyTaken { .. } => "already_taken",
            Self::AlreadyEmpty { .. } => "already_empty",
            Self::ContactMismatch { .. } => "contact_mismatch",
            Self::DayHasBookings { .. } => "day_has_bookings",
            Self::Storage(_) => "storage_failure",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(slot) => write!(f, "slot not found: {slot}"),
            Self::AlreadyTaken { date, hour } => write!(f, "slot already taken: {date} {hour}"),
            Self::AlreadyEmpty { date, hour } => write!(f, "slot already empty: {date} {hour}"),
            Self::ContactMismatch { date, hour } => {
                write!(f, "contact does not match booking: {date} {hour}")
            }
            Self::DayHasBookings { date, booked } => {
                write!(f, "day {date} has {booked} live booking(s)")
            }
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StorageError> for StoreError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Storage(StorageError::Db(value))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(StorageError::from(value))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Storage(StorageError::Io(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Storage(StorageError::Json(value))
    }
}

/// Slot store operations implemented by every engine.
///
/// All calls are synchronous and may block briefly on disk or transaction
/// commit. Every mutating call crosses a concurrency boundary: engines must
/// serialize mutations on the same date.
pub trait SlotRepository: Send + Sync {
    /// Which backend this is.
    fn engine(&self) -> EngineKind;

    /// Ensures `date` exists. When absent, creates one blocked slot per
    /// `default_hours` entry. Returns whether the day was created.
    fn init_day(&self, date: NaiveDate, default_hours: &[SlotTime]) -> StoreResult<bool>;

    /// Slots of `date` ordered by hour; empty when the day is absent.
    fn list_day(&self, date: NaiveDate) -> StoreResult<Vec<Slot>>;

    /// Atomically moves an available slot to booked.
    fn book(
        &self,
        date: NaiveDate,
        hour: SlotTime,
        name: &str,
        contact: &str,
    ) -> StoreResult<()>;

    /// Clears a booked slot when `contact` matches the stored contact.
    fn self_cancel(&self, date: NaiveDate, hour: SlotTime, contact: &str) -> StoreResult<()>;

    /// Unconditionally overwrites occupant name and contact.
    fn admin_set(&self, id: &SlotId, name: &str, contact: &str) -> StoreResult<()>;

    /// Removes one slot from its day.
    fn admin_delete_hour(&self, id: &SlotId) -> StoreResult<()>;

    /// Creates an empty slot unless the hour already exists. Returns whether
    /// a slot was created.
    fn admin_add_hour(&self, date: NaiveDate, hour: SlotTime) -> StoreResult<bool>;

    /// Destructively replaces every slot of `date` with empty slots at
    /// exactly `hours`. All-or-nothing.
    fn replace_day_pattern(
        &self,
        date: NaiveDate,
        hours: &[SlotTime],
        guard: ReplaceGuard,
    ) -> StoreResult<()>;
}

impl<R: SlotRepository + ?Sized> SlotRepository for Box<R> {
    fn engine(&self) -> EngineKind {
        (**self).engine()
    }

    fn init_day(&self, date: NaiveDate, default_hours: &[SlotTime]) -> StoreResult<bool> {
        (**self).init_day(date, default_hours)
    }

    fn list_day(&self, date: NaiveDate) -> StoreResult<Vec<Slot>> {
        (**self).list_day(date)
    }

    fn book(
        &self,
        date: NaiveDate,
        hour: SlotTime,
        name: &str,
        contact: &str,
    ) -> StoreResult<()> {
        (**self).book(date, hour, name, contact)
    }

    fn self_cancel(&self, date: NaiveDate, hour: SlotTime, contact: &str) -> StoreResult<()> {
        (**self).self_cancel(date, hour, contact)
    }

    fn admin_set(&self, id: &SlotId, name: &str, contact: &str) -> StoreResult<()> {
        (**self).admin_set(id, name, contact)
    }

    fn admin_delete_hour(&self, id: &SlotId) -> StoreResult<()> {
        (**self).admin_delete_hour(id)
    }

    fn admin_add_hour(&self, date: NaiveDate, hour: SlotTime) -> StoreResult<bool> {
        (**self).admin_add_hour(date, hour)
    }

    fn replace_day_pattern(
        &self,
        date: NaiveDate,
        hours: &[SlotTime],
        guard: ReplaceGuard,
    ) -> StoreResult<()> {
        (**self).replace_day_pattern(date, hours, guard)
    }
}

/// Cancel decision shared by both engines so they classify alike.
pub(crate) fn check_cancel(
    date: NaiveDate,
    hour: SlotTime,
    stored_name: &str,
    stored_contact: &str,
    claimed_contact: &str,
) -> StoreResult<()> {
    if stored_name.is_empty() {
        return Err(StoreError::AlreadyEmpty { date, hour });
    }
    if !crate::model::contact::contacts_match(stored_contact, claimed_contact) {
        return Err(StoreError::ContactMismatch { date, hour });
    }
    Ok(())
}

/// Sorted, deduplicated copy of `hours`.
pub(crate) fn canonical_hours(hours: &[SlotTime]) -> Vec<SlotTime> {
    let mut out = hours.to_vec();
    out.sort_unstable();
    out.dedup();
    out
}
