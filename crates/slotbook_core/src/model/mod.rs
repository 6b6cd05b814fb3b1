//! Slot calendar domain model.
//!
//! # Responsibility
//! - Define canonical data structures shared by both storage engines.
//! - Keep contact normalization in one place so engines compare alike.
//!
//! # Invariants
//! - Every slot is identified by a stable, engine-issued `SlotId`.
//! - Hours are stored and compared in canonical `HH:MM` form.

pub mod contact;
pub mod slot;
