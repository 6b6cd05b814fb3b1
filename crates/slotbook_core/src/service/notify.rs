//! Booking notification side channel.
//!
//! # Responsibility
//! - Build the one-line notice sent after a successful booking.
//! - Define the fire-and-forget notifier seam consumed by outbound alerts.
//!
//! # Invariants
//! - A notifier failure never changes a committed booking outcome.
//! - Logged notices carry date and hour only, never name or contact.

use crate::model::slot::SlotTime;
use chrono::NaiveDate;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Payload handed to the notifier once per successful booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingNotice {
    pub date: NaiveDate,
    pub hour: SlotTime,
    pub occupant_name: String,
    pub contact: String,
    /// Human-readable headline, e.g. `15:00 JANE DOE` for today or
    /// `17 Oct Sat 15.00 Jane Doe` for another day.
    pub title: String,
}

impl BookingNotice {
    pub fn new(
        date: NaiveDate,
        hour: SlotTime,
        occupant_name: impl Into<String>,
        contact: impl Into<String>,
        today: NaiveDate,
    ) -> Self {
        let occupant_name = occupant_name.into();
        let title = if date == today {
            format!("{hour} {}", occupant_name.to_uppercase())
        } else {
            format!(
                "{} {} {occupant_name}",
                date.format("%-d %b %a"),
                hour.dotted()
            )
        };
        Self {
            date,
            hour,
            occupant_name,
            contact: contact.into(),
            title,
        }
    }
}

/// Error reported by a notifier transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyError(pub String);

impl Display for NotifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "booking notification failed: {}", self.0)
    }
}

impl Error for NotifyError {}

/// Receives one notice per successful booking.
pub trait BookingNotifier: Send + Sync {
    fn notify(&self, notice: &BookingNotice) -> Result<(), NotifyError>;
}

/// Default notifier: records the notice in the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl BookingNotifier for LogNotifier {
    fn notify(&self, notice: &BookingNotice) -> Result<(), NotifyError> {
        info!(
            "event=booking_notice module=notify status=ok date={} hour={}",
            notice.date, notice.hour
        );
        Ok(())
    }
}
