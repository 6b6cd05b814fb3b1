//! Pure schedule helpers (no storage access).

pub mod pattern;
