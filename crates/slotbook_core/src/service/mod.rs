//! Booking protocol services.
//!
//! # Responsibility
//! - Turn raw request input into validated slot store calls.
//! - Keep shell layers decoupled from engine details.

pub mod booking_service;
pub mod clock;
pub mod notify;
