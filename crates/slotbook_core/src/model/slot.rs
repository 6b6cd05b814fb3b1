//! Slot domain model.
//!
//! # Responsibility
//! - Define the bookable unit (`Slot`) and its time-of-day key (`SlotTime`).
//! - Unify engine-specific slot identity behind one opaque `SlotId`.
//!
//! # Invariants
//! - `(date, hour)` is unique within a day.
//! - A slot is available iff `occupant_name` is empty.
//! - A booked (non-blocked) slot always carries a non-empty contact.
//!
//! # See also
//! - model/contact.rs

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Occupant name marking a slot as not offered for booking.
pub const BLOCKED_SENTINEL: &str = "Not available";

const MINUTES_PER_DAY: u32 = 24 * 60;
const COMPOSITE_ID_SEPARATOR: char = '|';

static CANONICAL_HOUR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("valid hour regex"));

/// Minute-granular time of day used as the slot key within one date.
///
/// Always rendered as zero-padded 24-hour `HH:MM`, so string order and
/// chronological order agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotTime(u16);

impl SlotTime {
    /// Builds a time from hour and minute components.
    ///
    /// Returns `None` when `hour > 23` or `minute > 59`.
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Self::from_minutes(hour * 60 + minute)
    }

    /// Builds a time from minutes since midnight.
    pub fn from_minutes(minutes: u32) -> Option<Self> {
        if minutes >= MINUTES_PER_DAY {
            return None;
        }
        u16::try_from(minutes).ok().map(Self)
    }

    pub(crate) const fn from_hm_const(hour: u16, minute: u16) -> Self {
        Self(hour * 60 + minute)
    }

    /// Minutes since midnight.
    pub fn minutes(self) -> u32 {
        u32::from(self.0)
    }

    pub fn hour(self) -> u32 {
        self.minutes() / 60
    }

    pub fn minute(self) -> u32 {
        self.minutes() % 60
    }

    /// Renders as `HH.MM`, the dotted form used in booking notices.
    pub fn dotted(self) -> String {
        format!("{:02}.{:02}", self.hour(), self.minute())
    }

    /// Parses the strict colon form `H:MM` or `HH:MM`.
    ///
    /// Returns `None` for anything else, including out-of-range components.
    pub fn parse_colon(value: &str) -> Option<Self> {
        let captures = CANONICAL_HOUR_RE.captures(value)?;
        let hour = captures.get(1)?.as_str().parse::<u32>().ok()?;
        let minute = captures.get(2)?.as_str().parse::<u32>().ok()?;
        Self::new(hour, minute)
    }
}

impl Display for SlotTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// Error returned when text is not a valid `HH:MM` time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSlotTimeError(pub String);

impl Display for ParseSlotTimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid slot time `{}`; expected HH:MM", self.0)
    }
}

impl Error for ParseSlotTimeError {}

impl FromStr for SlotTime {
    type Err = ParseSlotTimeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse_colon(value).ok_or_else(|| ParseSlotTimeError(value.to_string()))
    }
}

impl TryFrom<String> for SlotTime {
    type Error = ParseSlotTimeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SlotTime> for String {
    fn from(value: SlotTime) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SlotKey {
    /// Relational row key.
    Row(Uuid),
    /// File engine key: the slot's own date and hour.
    Composite { date: NaiveDate, hour: SlotTime },
}

/// Opaque, engine-agnostic slot identifier.
///
/// Callers receive ids from `list_day` and hand them back to administrative
/// operations without inspecting them. The string form round-trips through
/// `Display` / `FromStr`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotId(SlotKey);

impl SlotId {
    pub(crate) fn row(uuid: Uuid) -> Self {
        Self(SlotKey::Row(uuid))
    }

    pub(crate) fn composite(date: NaiveDate, hour: SlotTime) -> Self {
        Self(SlotKey::Composite { date, hour })
    }

    pub(crate) fn as_row(&self) -> Option<Uuid> {
        match self.0 {
            SlotKey::Row(uuid) => Some(uuid),
            SlotKey::Composite { .. } => None,
        }
    }

    pub(crate) fn as_composite(&self) -> Option<(NaiveDate, SlotTime)> {
        match self.0 {
            SlotKey::Row(_) => None,
            SlotKey::Composite { date, hour } => Some((date, hour)),
        }
    }
}

impl Display for SlotId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            SlotKey::Row(uuid) => write!(f, "{uuid}"),
            SlotKey::Composite { date, hour } => {
                write!(f, "{}{COMPOSITE_ID_SEPARATOR}{hour}", date.format("%Y-%m-%d"))
            }
        }
    }
}

/// Error returned when text is not a slot id produced by this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSlotIdError(pub String);

impl Display for ParseSlotIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid slot id `{}`", self.0)
    }
}

impl Error for ParseSlotIdError {}

impl FromStr for SlotId {
    type Err = ParseSlotIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let invalid = || ParseSlotIdError(value.to_string());

        if let Some((date_text, hour_text)) = trimmed.split_once(COMPOSITE_ID_SEPARATOR) {
            let date = NaiveDate::parse_from_str(date_text, "%Y-%m-%d").map_err(|_| invalid())?;
            let hour = hour_text.parse::<SlotTime>().map_err(|_| invalid())?;
            return Ok(Self::composite(date, hour));
        }

        Uuid::parse_str(trimmed).map(Self::row).map_err(|_| invalid())
    }
}

impl Serialize for SlotId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Read model for one slot of one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    /// Opaque id accepted by administrative operations.
    pub id: SlotId,
    pub date: NaiveDate,
    pub hour: SlotTime,
    /// Empty means available; `BLOCKED_SENTINEL` means not offered.
    pub occupant_name: String,
    /// Normalized contact; empty when unbooked.
    pub occupant_contact: String,
}

impl Slot {
    /// Whether self-service booking may take this slot.
    pub fn is_available(&self) -> bool {
        self.occupant_name.is_empty()
    }

    pub fn is_blocked(&self) -> bool {
        self.occupant_name == BLOCKED_SENTINEL
    }

    /// Whether a real client holds this slot.
    pub fn is_booked(&self) -> bool {
        is_booking_name(&self.occupant_name)
    }
}

/// Whether an occupant name denotes a real booking (not empty, not blocked).
pub fn is_booking_name(name: &str) -> bool {
    !name.is_empty() && name != BLOCKED_SENTINEL
}

#[cfg(test)]
mod tests {
    use super::{Slot, SlotId, SlotTime, BLOCKED_SENTINEL};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid test date")
    }

    #[test]
    fn slot_time_parses_and_pads() {
        let time: SlotTime = "9:05".parse().expect("single digit hour should parse");
        assert_eq!(time.to_string(), "09:05");
        assert_eq!(time.dotted(), "09.05");
        assert_eq!(time.minutes(), 545);
    }

    #[test]
    fn slot_time_rejects_out_of_range_and_other_shapes() {
        assert!("24:00".parse::<SlotTime>().is_err());
        assert!("12:60".parse::<SlotTime>().is_err());
        assert!("12.30".parse::<SlotTime>().is_err());
        assert!("123:00".parse::<SlotTime>().is_err());
        assert!("".parse::<SlotTime>().is_err());
    }

    #[test]
    fn slot_time_order_matches_string_order() {
        let early: SlotTime = "09:30".parse().expect("valid");
        let late: SlotTime = "13:15".parse().expect("valid");
        assert!(early < late);
        assert!(early.to_string() < late.to_string());
    }

    #[test]
    fn slot_id_round_trips_both_shapes() {
        let composite = SlotId::composite(date("2026-10-15"), "12:00".parse().expect("valid"));
        assert_eq!(composite.to_string(), "2026-10-15|12:00");
        assert_eq!(
            composite.to_string().parse::<SlotId>().expect("composite id"),
            composite
        );

        let uuid = Uuid::new_v4();
        let row = SlotId::row(uuid);
        assert_eq!(row.to_string().parse::<SlotId>().expect("row id"), row);
        assert_eq!(row.as_row(), Some(uuid));
        assert!(row.as_composite().is_none());
    }

    #[test]
    fn slot_id_rejects_garbage() {
        assert!("not-an-id".parse::<SlotId>().is_err());
        assert!("2026-13-40|12:00".parse::<SlotId>().is_err());
        assert!("2026-10-15|noon".parse::<SlotId>().is_err());
    }

    #[test]
    fn availability_flags_follow_occupant_name() {
        let mut slot = Slot {
            id: SlotId::composite(date("2026-10-15"), "12:00".parse().expect("valid")),
            date: date("2026-10-15"),
            hour: "12:00".parse().expect("valid"),
            occupant_name: String::new(),
            occupant_contact: String::new(),
        };
        assert!(slot.is_available());
        assert!(!slot.is_booked());

        slot.occupant_name = BLOCKED_SENTINEL.to_string();
        assert!(!slot.is_available());
        assert!(slot.is_blocked());
        assert!(!slot.is_booked());

        slot.occupant_name = "Jane".to_string();
        assert!(slot.is_booked());
    }

    #[test]
    fn listed_slot_serializes_with_plain_string_keys() {
        let slot = Slot {
            id: SlotId::composite(date("2026-10-15"), "09:30".parse().expect("valid")),
            date: date("2026-10-15"),
            hour: "09:30".parse().expect("valid"),
            occupant_name: "Jane".to_string(),
            occupant_contact: "+90555".to_string(),
        };

        let value = serde_json::to_value(&slot).expect("slot should serialize");
        assert_eq!(value["id"], "2026-10-15|09:30");
        assert_eq!(value["date"], "2026-10-15");
        assert_eq!(value["hour"], "09:30");
        assert_eq!(value["occupant_contact"], "+90555");

        let hour: SlotTime = serde_json::from_value(value["hour"].clone()).expect("hour");
        assert_eq!(hour, slot.hour);
    }
}
