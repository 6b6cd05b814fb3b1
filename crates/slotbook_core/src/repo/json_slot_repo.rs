//! Whole-document JSON slot engine.
//!
//! # Responsibility
//! - Persist every day in one JSON document keyed by date, then by hour.
//! - Emulate transactions with a serialized read-modify-write cycle.
//!
//! # Invariants
//! - Every mutation holds the instance write lock and an exclusive advisory
//!   lock on `<file>.lock` for the whole read-check-mutate-write cycle.
//! - The document is replaced by rename of a fully written temp file, so a
//!   reader never observes a partially written day.
//! - A failed mutation writes nothing.
//! - A date key is present only while its day has at least one slot.

use crate::model::contact::normalize_contact;
use crate::model::slot::{is_booking_name, Slot, SlotId, SlotTime, BLOCKED_SENTINEL};
use crate::repo::slot_repo::{
    canonical_hours, check_cancel, EngineKind, ReplaceGuard, SlotRef, SlotRepository,
    StorageError, StoreError, StoreResult,
};
use chrono::NaiveDate;
use fs2::FileExt;
use log::{debug, error, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Persisted shape of one slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct SlotRecord {
    #[serde(default)]
    name: String,
    #[serde(default)]
    whatsapp: String,
}

impl SlotRecord {
    fn empty() -> Self {
        Self::default()
    }

    fn blocked() -> Self {
        Self {
            name: BLOCKED_SENTINEL.to_string(),
            whatsapp: String::new(),
        }
    }
}

type DayDocument = BTreeMap<String, SlotRecord>;
type StoreDocument = BTreeMap<String, DayDocument>;

/// Whether a mutation closure changed the document.
enum Mutation<T> {
    Unchanged(T),
    Changed(T),
}

/// JSON-file-backed slot store.
pub struct JsonSlotRepository {
    path: PathBuf,
    lock_path: PathBuf,
    access: RwLock<()>,
    #[cfg(test)]
    fail_next_write: std::sync::atomic::AtomicBool,
}

impl JsonSlotRepository {
    /// Creates a store over `path`. The file is created on first write; a
    /// missing or empty file reads as an empty store.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = sidecar_lock_path(&path);
        Self {
            path,
            lock_path,
            access: RwLock::new(()),
            #[cfg(test)]
            fail_next_write: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Location of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_locked<T>(&self, op: impl FnOnce(&StoreDocument) -> StoreResult<T>) -> StoreResult<T> {
        let _guard = self.access.read();
        let _file_lock = FileLock::acquire(&self.lock_path, LockMode::Shared)?;
        let document = self.read_document()?;
        op(&document)
    }

    fn mutate_locked<T>(
        &self,
        event: &str,
        op: impl FnOnce(&mut StoreDocument) -> StoreResult<Mutation<T>>,
    ) -> StoreResult<T> {
        let _guard = self.access.write();
        let _file_lock = FileLock::acquire(&self.lock_path, LockMode::Exclusive)?;

        let mut document = self.read_document()?;
        match op(&mut document)? {
            Mutation::Unchanged(value) => Ok(value),
            Mutation::Changed(value) => {
                if let Err(err) = self.write_document(&document) {
                    error!(
                        "event={event} module=store status=error engine=json error_code=write_failed error={err}"
                    );
                    return Err(err);
                }
                Ok(value)
            }
        }
    }

    fn read_document(&self) -> StoreResult<StoreDocument> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(StoreDocument::new()),
            Err(err) => return Err(err.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(StoreDocument::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write_document(&self, document: &StoreDocument) -> StoreResult<()> {
        #[cfg(test)]
        if self
            .fail_next_write
            .swap(false, std::sync::atomic::Ordering::SeqCst)
        {
            return Err(StoreError::Storage(StorageError::Io(std::io::Error::other(
                "injected write failure",
            ))));
        }

        let temp = NamedTempFile::new_in(parent_dir(&self.path))?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, document)?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }
}

impl SlotRepository for JsonSlotRepository {
    fn engine(&self) -> EngineKind {
        EngineKind::Json
    }

    fn init_day(&self, date: NaiveDate, default_hours: &[SlotTime]) -> StoreResult<bool> {
        let hours = canonical_hours(default_hours);
        let created = self.mutate_locked("day_init", |document| {
            let key = date_key(date);
            if document.get(&key).is_some_and(|day| !day.is_empty()) {
                return Ok(Mutation::Unchanged(false));
            }
            if hours.is_empty() {
                return Ok(if document.remove(&key).is_some() {
                    Mutation::Changed(true)
                } else {
                    Mutation::Unchanged(true)
                });
            }
            let day = hours
                .iter()
                .map(|hour| (hour.to_string(), SlotRecord::blocked()))
                .collect();
            document.insert(key, day);
            Ok(Mutation::Changed(true))
        })?;

        if created {
            info!(
                "event=day_init module=store status=ok engine=json date={date} slots={}",
                hours.len()
            );
        }
        Ok(created)
    }

    fn list_day(&self, date: NaiveDate) -> StoreResult<Vec<Slot>> {
        self.read_locked(|document| {
            let Some(day) = document.get(&date_key(date)) else {
                return Ok(Vec::new());
            };

            let mut slots = day
                .iter()
                .map(|(hour_text, record)| {
                    let hour = parse_hour_key(date, hour_text)?;
                    Ok(Slot {
                        id: SlotId::composite(date, hour),
                        date,
                        hour,
                        occupant_name: record.name.clone(),
                        occupant_contact: record.whatsapp.clone(),
                    })
                })
                .collect::<StoreResult<Vec<_>>>()?;
            slots.sort_by_key(|slot| slot.hour);
            Ok(slots)
        })
    }

    fn book(
        &self,
        date: NaiveDate,
        hour: SlotTime,
        name: &str,
        contact: &str,
    ) -> StoreResult<()> {
        let contact = normalize_contact(contact);
        self.mutate_locked("slot_book", |document| {
            let record = slot_mut(document, date, hour)?;
            if !record.name.is_empty() {
                debug!(
                    "event=slot_book module=store status=rejected engine=json date={date} hour={hour}"
                );
                return Err(StoreError::AlreadyTaken { date, hour });
            }
            record.name = name.to_string();
            record.whatsapp = contact;
            Ok(Mutation::Changed(()))
        })?;

        info!("event=slot_book module=store status=ok engine=json date={date} hour={hour}");
        Ok(())
    }

    fn self_cancel(&self, date: NaiveDate, hour: SlotTime, contact: &str) -> StoreResult<()> {
        self.mutate_locked("slot_cancel", |document| {
            let record = slot_mut(document, date, hour)?;
            check_cancel(date, hour, &record.name, &record.whatsapp, contact)?;
            *record = SlotRecord::empty();
            Ok(Mutation::Changed(()))
        })?;

        info!("event=slot_cancel module=store status=ok engine=json date={date} hour={hour}");
        Ok(())
    }

    fn admin_set(&self, id: &SlotId, name: &str, contact: &str) -> StoreResult<()> {
        let contact = normalize_contact(contact);
        let (date, hour) = composite_key(id)?;
        self.mutate_locked("slot_admin_set", |document| {
            let record = slot_mut(document, date, hour)
                .map_err(|_| StoreError::NotFound(SlotRef::Id(id.clone())))?;
            record.name = name.to_string();
            record.whatsapp = contact;
            Ok(Mutation::Changed(()))
        })?;

        info!("event=slot_admin_set module=store status=ok engine=json slot_id={id}");
        Ok(())
    }

    fn admin_delete_hour(&self, id: &SlotId) -> StoreResult<()> {
        let (date, hour) = composite_key(id)?;
        self.mutate_locked("slot_delete", |document| {
            let key = date_key(date);
            let Some(day) = document.get_mut(&key) else {
                return Err(StoreError::NotFound(SlotRef::Id(id.clone())));
            };
            if day.remove(&hour.to_string()).is_none() {
                return Err(StoreError::NotFound(SlotRef::Id(id.clone())));
            }
            // A day without slots does not exist.
            if day.is_empty() {
                document.remove(&key);
            }
            Ok(Mutation::Changed(()))
        })?;

        info!("event=slot_delete module=store status=ok engine=json slot_id={id}");
        Ok(())
    }

    fn admin_add_hour(&self, date: NaiveDate, hour: SlotTime) -> StoreResult<bool> {
        let created = self.mutate_locked("slot_add", |document| {
            let day = document.entry(date_key(date)).or_default();
            let key = hour.to_string();
            if day.contains_key(&key) {
                return Ok(Mutation::Unchanged(false));
            }
            day.insert(key, SlotRecord::empty());
            Ok(Mutation::Changed(true))
        })?;

        info!(
            "event=slot_add module=store status=ok engine=json date={date} hour={hour} created={created}"
        );
        Ok(created)
    }

    fn replace_day_pattern(
        &self,
        date: NaiveDate,
        hours: &[SlotTime],
        guard: ReplaceGuard,
    ) -> StoreResult<()> {
        let hours = canonical_hours(hours);
        self.mutate_locked("day_replace", |document| {
            let key = date_key(date);
            if guard == ReplaceGuard::RefuseIfBooked {
                let booked = document
                    .get(&key)
                    .map_or(0, |day| day.values().filter(|r| is_booking_name(&r.name)).count());
                if booked > 0 {
                    return Err(StoreError::DayHasBookings { date, booked });
                }
            }

            if hours.is_empty() {
                document.remove(&key);
                return Ok(Mutation::Changed(()));
            }

            // The new day is built completely before it replaces the old one.
            let day: DayDocument = hours
                .iter()
                .map(|hour| (hour.to_string(), SlotRecord::empty()))
                .collect();
            document.insert(key, day);
            Ok(Mutation::Changed(()))
        })?;

        info!(
            "event=day_replace module=store status=ok engine=json date={date} slots={}",
            hours.len()
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum LockMode {
    Shared,
    Exclusive,
}

/// Advisory lock on the sidecar file, released on drop.
struct FileLock {
    file: File,
}

impl FileLock {
    fn acquire(path: &Path, mode: LockMode) -> StoreResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        match mode {
            LockMode::Shared => FileExt::lock_shared(&file)?,
            LockMode::Exclusive => FileExt::lock_exclusive(&file)?,
        }
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_hour_key(date: NaiveDate, hour_text: &str) -> StoreResult<SlotTime> {
    hour_text.parse::<SlotTime>().map_err(|_| {
        StoreError::Storage(StorageError::InvalidData(format!(
            "invalid hour key `{hour_text}` under date {date}"
        )))
    })
}

fn slot_mut(
    document: &mut StoreDocument,
    date: NaiveDate,
    hour: SlotTime,
) -> StoreResult<&mut SlotRecord> {
    document
        .get_mut(&date_key(date))
        .and_then(|day| day.get_mut(&hour.to_string()))
        .ok_or_else(|| StoreError::NotFound(SlotRef::Key { date, hour }))
}

/// The file engine only understands composite ids.
fn composite_key(id: &SlotId) -> StoreResult<(NaiveDate, SlotTime)> {
    id.as_composite()
        .ok_or_else(|| StoreError::NotFound(SlotRef::Id(id.clone())))
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn sidecar_lock_path(path: &Path) -> PathBuf {
    let mut name: OsString = path
        .file_name()
        .map_or_else(|| OsString::from("slots.json"), OsString::from);
    name.push(".lock");
    path.with_file_name(name)
}
