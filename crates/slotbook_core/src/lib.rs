//! Core domain logic for Slotbook, a single-resource daily appointment book.
//! This crate is the single source of truth for booking invariants.

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schedule;
pub mod service;

pub use bootstrap::{open_booking_service, open_store, OpenedStore};
pub use config::{AppConfig, ConfigError, EngineChoice};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::contact::{contacts_match, is_valid_contact, normalize_contact};
pub use model::slot::{Slot, SlotId, SlotTime, BLOCKED_SENTINEL};
pub use repo::json_slot_repo::JsonSlotRepository;
pub use repo::slot_repo::{
    EngineKind, ReplaceGuard, SlotRef, SlotRepository, StorageError, StoreError, StoreResult,
};
pub use repo::sqlite_slot_repo::SqliteSlotRepository;
pub use schedule::pattern::SessionPattern;
pub use service::booking_service::{
    AppliedPattern, BookRequest, BookingError, BookingPolicy, BookingReceipt, BookingResult,
    BookingService, CancelRequest, PatternRequest, ValidationError,
};
pub use service::clock::{Clock, FixedClock, SystemClock};
pub use service::notify::{BookingNotice, BookingNotifier, LogNotifier, NotifyError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
