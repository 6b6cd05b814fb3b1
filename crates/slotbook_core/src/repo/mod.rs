//! Slot store contract and its two persistence engines.
//!
//! # Responsibility
//! - Define the engine-agnostic `SlotRepository` contract.
//! - Isolate SQLite and JSON-file details from the booking protocol.
//!
//! # Invariants
//! - Both engines return the same `StoreError` kinds for the same situations.
//! - Engines never validate request input; the booking service does.

pub mod json_slot_repo;
pub mod slot_repo;
pub mod sqlite_slot_repo;
