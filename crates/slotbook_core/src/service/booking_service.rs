//! Booking protocol layered over the slot store.
//!
//! # Responsibility
//! - Validate and normalize request input before any store access.
//! - Clamp public callers to the visible date window.
//! - Translate administrative pattern requests into a day replacement.
//! - Fire the booking notification side channel after a committed booking.
//!
//! # Invariants
//! - `ValidationError` is raised here and never reaches the store.
//! - Public callers can never read or book outside
//!   `today..=today + public_window_days`; admin callers are not clamped.
//! - A notifier failure never turns a committed booking into an error.

use crate::model::contact::{is_valid_contact, normalize_contact};
use crate::model::slot::{is_booking_name, Slot, SlotId, SlotTime};
use crate::repo::slot_repo::{ReplaceGuard, SlotRepository, StoreError};
use crate::schedule::pattern::{
    default_day_hours, SessionPattern, DEFAULT_CLOSING_TIME, FALLBACK_PATTERN_START,
};
use crate::service::clock::Clock;
use crate::service::notify::{BookingNotice, BookingNotifier, LogNotifier};
use chrono::{Days, NaiveDate};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static HOUR_INPUT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[:.](\d{2})$").expect("valid hour input regex"));

/// Request input rejected before touching the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Hour field is blank.
    MissingHour,
    /// Occupant name is blank after trim.
    BlankName,
    /// Contact has no digit after normalization.
    InvalidContact,
    /// Hour is not `H:MM`, `HH:MM` or `HH.MM` within a day.
    MalformedHour(String),
    /// Slot id was not issued by any engine.
    MalformedSlotId(String),
    /// A real booking name was written without a contact.
    MissingContact,
    /// Pattern produced no hours before closing time.
    EmptyPattern { start: SlotTime },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingHour => write!(f, "hour is required"),
            Self::BlankName => write!(f, "name must not be blank"),
            Self::InvalidContact => write!(f, "contact must contain at least one digit"),
            Self::MalformedHour(value) => write!(f, "invalid hour `{value}`; expected HH:MM"),
            Self::MalformedSlotId(value) => write!(f, "invalid slot id `{value}`"),
            Self::MissingContact => write!(f, "a booked slot requires a contact"),
            Self::EmptyPattern { start } => {
                write!(f, "pattern starting at {start} produces no slots")
            }
        }
    }
}

impl Error for ValidationError {}

/// Outcome of a booking-protocol call.
#[derive(Debug)]
pub enum BookingError {
    Validation(ValidationError),
    Store(StoreError),
}

impl BookingError {
    /// Stable short code for logs and shell mapping.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Store(err) => err.code(),
        }
    }

    /// Message safe to show to an end user.
    ///
    /// Expected outcomes get a specific message; storage failures get a
    /// generic one without engine detail.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(ValidationError::MalformedHour(_)) => {
                "Please enter the time as HH:MM.".to_string()
            }
            Self::Validation(ValidationError::EmptyPattern { .. }) => {
                "The chosen start time leaves no sessions before closing.".to_string()
            }
            Self::Validation(ValidationError::MissingContact) => {
                "A booking needs a WhatsApp number.".to_string()
            }
            Self::Validation(ValidationError::MalformedSlotId(_)) => {
                "This time slot no longer exists.".to_string()
            }
            Self::Validation(_) => "Please fill in all fields.".to_string(),
            Self::Store(StoreError::NotFound(_)) => "This time slot no longer exists.".to_string(),
            Self::Store(StoreError::AlreadyTaken { .. }) => {
                "This time slot was just taken. Please choose another one.".to_string()
            }
            Self::Store(StoreError::AlreadyEmpty { .. }) => {
                "This time slot has no booking to cancel.".to_string()
            }
            Self::Store(StoreError::ContactMismatch { .. }) => {
                "The WhatsApp number does not match this booking.".to_string()
            }
            Self::Store(StoreError::DayHasBookings { booked, .. }) => format!(
                "This day still has {booked} booking(s); cancel them before changing the pattern."
            ),
            Self::Store(StoreError::Storage(_)) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

impl Display for BookingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BookingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<ValidationError> for BookingError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for BookingError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

pub type BookingResult<T> = Result<T, BookingError>;

/// Tunables of the booking protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingPolicy {
    /// Generated days stop strictly before this time.
    pub closing_time: SlotTime,
    /// Public callers see `today..=today + public_window_days`.
    pub public_window_days: u32,
    /// Refuse pattern replacement over live bookings.
    pub protect_booked_slots: bool,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            closing_time: DEFAULT_CLOSING_TIME,
            public_window_days: 2,
            protect_booked_slots: true,
        }
    }
}

/// Public self-service booking request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookRequest {
    /// Raw `YYYY-MM-DD`; missing or malformed means today.
    pub date: Option<String>,
    pub hour: String,
    pub name: String,
    pub contact: String,
}

/// Public self-cancel request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CancelRequest {
    pub date: Option<String>,
    pub hour: String,
    pub contact: String,
}

/// Administrative "apply pattern to day" request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternRequest {
    pub date: Option<String>,
    /// `A`/`dense` or `B`/`relaxed`.
    pub selector: String,
    /// `H:MM`, `HH:MM` or `HH.MM`; malformed falls back to 10:00.
    pub start: String,
}

/// Committed booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingReceipt {
    pub date: NaiveDate,
    pub hour: SlotTime,
}

/// Result of a successful pattern application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedPattern {
    pub date: NaiveDate,
    pub pattern: SessionPattern,
    /// `false` when the selector was unknown and the default ran instead.
    pub selector_recognized: bool,
    pub start: SlotTime,
    pub hours: Vec<SlotTime>,
}

/// Booking protocol facade over one slot engine.
pub struct BookingService<R: SlotRepository> {
    repo: R,
    policy: BookingPolicy,
    clock: Box<dyn Clock>,
    notifier: Box<dyn BookingNotifier>,
}

impl<R: SlotRepository> BookingService<R> {
    /// Creates a service over `repo`; notices go to the log until
    /// [`Self::with_notifier`] installs another sink.
    pub fn new(repo: R, policy: BookingPolicy, clock: Box<dyn Clock>) -> Self {
        Self {
            repo,
            policy,
            clock,
            notifier: Box::new(LogNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn BookingNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn policy(&self) -> &BookingPolicy {
        &self.policy
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Resolves a public caller's date: parse (today on failure), then clamp
    /// into the visible window.
    pub fn public_date(&self, requested: Option<&str>) -> NaiveDate {
        let today = self.today();
        clamp_public_date(
            parse_date_or(requested, today),
            today,
            self.policy.public_window_days,
        )
    }

    /// Resolves an administrative caller's date without clamping.
    pub fn admin_date(&self, requested: Option<&str>) -> NaiveDate {
        parse_date_or(requested, self.today())
    }

    /// Ensures `date` is initialized (blocked default pattern) and returns
    /// its slots. Existing days are never reset.
    pub fn open_day(&self, date: NaiveDate) -> BookingResult<Vec<Slot>> {
        self.repo
            .init_day(date, &default_day_hours(self.policy.closing_time))?;
        Ok(self.repo.list_day(date)?)
    }

    /// Read-only day snapshot ordered by hour.
    pub fn list_day(&self, date: NaiveDate) -> BookingResult<Vec<Slot>> {
        Ok(self.repo.list_day(date)?)
    }

    /// Books a slot for a public caller.
    pub fn book(&self, request: &BookRequest) -> BookingResult<BookingReceipt> {
        let hour = required_hour(&request.hour)?;
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ValidationError::BlankName.into());
        }
        if !is_valid_contact(&request.contact) {
            return Err(ValidationError::InvalidContact.into());
        }
        let contact = normalize_contact(&request.contact);
        let date = self.public_date(request.date.as_deref());

        if let Err(err) = self.repo.book(date, hour, name, &contact) {
            info!(
                "event=booking module=service status=rejected date={date} hour={hour} reason={}",
                err.code()
            );
            return Err(err.into());
        }

        let notice = BookingNotice::new(date, hour, name, contact, self.today());
        if let Err(err) = self.notifier.notify(&notice) {
            warn!(
                "event=booking_notice module=service status=error date={date} hour={hour} error={err}"
            );
        }

        Ok(BookingReceipt { date, hour })
    }

    /// Cancels a public caller's own booking after contact confirmation.
    pub fn self_cancel(&self, request: &CancelRequest) -> BookingResult<()> {
        let hour = required_hour(&request.hour)?;
        if !is_valid_contact(&request.contact) {
            return Err(ValidationError::InvalidContact.into());
        }
        let date = self.public_date(request.date.as_deref());

        self.repo
            .self_cancel(date, hour, &normalize_contact(&request.contact))
            .map_err(|err| {
                info!(
                    "event=self_cancel module=service status=rejected date={date} hour={hour} reason={}",
                    err.code()
                );
                BookingError::from(err)
            })
    }

    /// Overwrites a slot's occupant, bypassing the "already taken" rule.
    ///
    /// An empty name clears the contact too, keeping unbooked slots
    /// contact-free.
    pub fn admin_set(&self, id: &str, name: &str, contact: &str) -> BookingResult<()> {
        let slot_id = parse_slot_id(id)?;
        let name = name.trim();
        let contact = if name.is_empty() {
            String::new()
        } else {
            normalize_contact(contact)
        };
        if is_booking_name(name) && !contact.chars().any(|ch| ch.is_ascii_digit()) {
            return Err(ValidationError::MissingContact.into());
        }

        Ok(self.repo.admin_set(&slot_id, name, &contact)?)
    }

    /// Removes one slot by id.
    pub fn admin_delete_hour(&self, id: &str) -> BookingResult<()> {
        let slot_id = parse_slot_id(id)?;
        Ok(self.repo.admin_delete_hour(&slot_id)?)
    }

    /// Adds an empty slot at a leniently formatted hour. Returns the
    /// canonical hour.
    pub fn admin_add_hour(&self, date: NaiveDate, hour_input: &str) -> BookingResult<SlotTime> {
        let hour = required_hour(hour_input)?;
        self.repo.admin_add_hour(date, hour)?;
        Ok(hour)
    }

    /// Replaces `date` with a freshly generated pattern.
    ///
    /// Unknown selectors fall back to [`SessionPattern::Relaxed`]; the outcome
    /// reports whether that happened. A malformed start falls back to 10:00.
    pub fn apply_pattern(&self, request: &PatternRequest) -> BookingResult<AppliedPattern> {
        let date = self.admin_date(request.date.as_deref());

        let (pattern, selector_recognized) = match SessionPattern::from_selector(&request.selector)
        {
            Some(pattern) => (pattern, true),
            None => {
                warn!(
                    "event=apply_pattern module=service status=fallback date={date} selector_len={} pattern={}",
                    request.selector.len(),
                    SessionPattern::default().as_str()
                );
                (SessionPattern::default(), false)
            }
        };
        let start = normalize_hour_input(&request.start).unwrap_or(FALLBACK_PATTERN_START);

        let hours = pattern.hours(start, self.policy.closing_time);
        if hours.is_empty() {
            return Err(ValidationError::EmptyPattern { start }.into());
        }

        let guard = if self.policy.protect_booked_slots {
            ReplaceGuard::RefuseIfBooked
        } else {
            ReplaceGuard::Force
        };
        self.repo.replace_day_pattern(date, &hours, guard)?;

        info!(
            "event=apply_pattern module=service status=ok date={date} pattern={} start={start} slots={}",
            pattern.as_str(),
            hours.len()
        );
        Ok(AppliedPattern {
            date,
            pattern,
            selector_recognized,
            start,
            hours,
        })
    }
}

/// Canonicalizes administrative hour input (`H:MM`, `HH:MM`, `HH.MM`).
pub fn normalize_hour_input(raw: &str) -> Result<SlotTime, ValidationError> {
    let trimmed = raw.trim();
    let malformed = || ValidationError::MalformedHour(trimmed.to_string());
    let captures = HOUR_INPUT_RE.captures(trimmed).ok_or_else(malformed)?;
    let hour = captures
        .get(1)
        .and_then(|value| value.as_str().parse::<u32>().ok())
        .ok_or_else(malformed)?;
    let minute = captures
        .get(2)
        .and_then(|value| value.as_str().parse::<u32>().ok())
        .ok_or_else(malformed)?;
    SlotTime::new(hour, minute).ok_or_else(malformed)
}

/// Clamps `date` into `today..=today + window_days`.
pub fn clamp_public_date(date: NaiveDate, today: NaiveDate, window_days: u32) -> NaiveDate {
    let last = today
        .checked_add_days(Days::new(u64::from(window_days)))
        .unwrap_or(NaiveDate::MAX);
    date.clamp(today, last)
}

/// Parses ISO `YYYY-MM-DD`; anything else resolves to `fallback`.
pub fn parse_date_or(raw: Option<&str>, fallback: NaiveDate) -> NaiveDate {
    raw.map(str::trim)
        .and_then(|value| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok())
        .unwrap_or(fallback)
}

fn required_hour(raw: &str) -> Result<SlotTime, ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::MissingHour);
    }
    normalize_hour_input(raw)
}

fn parse_slot_id(raw: &str) -> Result<SlotId, ValidationError> {
    raw.parse::<SlotId>()
        .map_err(|_| ValidationError::MalformedSlotId(raw.trim().to_string()))
}
