//! Day pattern generation.
//!
//! # Responsibility
//! - Turn a start time and a session/break cadence into slot start times.
//! - Name the closed set of cadences offered to administrators.
//!
//! # Invariants
//! - Output is strictly increasing and every value is `< closing`.
//! - Pure: no I/O, no shared state.

use crate::model::slot::SlotTime;

/// Default closing time bounding generated days.
pub const DEFAULT_CLOSING_TIME: SlotTime = SlotTime::from_hm_const(20, 0);

/// Start time of the pattern a fresh day is initialized with.
pub const DEFAULT_DAY_START: SlotTime = SlotTime::from_hm_const(12, 0);

/// Start time used when an administrator's start input is malformed.
pub const FALLBACK_PATTERN_START: SlotTime = SlotTime::from_hm_const(10, 0);

/// Generates slot start times from a textual `HH:MM` start.
///
/// Each value advances by `session_minutes + break_minutes` and generation
/// continues while the value is `< closing`. A malformed `start`, a start at
/// or past `closing`, or a zero step yields an empty sequence.
pub fn generate(
    start: &str,
    session_minutes: u32,
    break_minutes: u32,
    closing: SlotTime,
) -> Vec<SlotTime> {
    match SlotTime::parse_colon(start.trim()) {
        Some(start) => generate_from(start, session_minutes, break_minutes, closing),
        None => Vec::new(),
    }
}

/// Same as [`generate`] for an already parsed start time.
pub fn generate_from(
    start: SlotTime,
    session_minutes: u32,
    break_minutes: u32,
    closing: SlotTime,
) -> Vec<SlotTime> {
    let step = session_minutes.saturating_add(break_minutes);
    if step == 0 {
        return Vec::new();
    }

    let limit = closing.minutes();
    let mut out = Vec::new();
    let mut current = start.minutes();
    while current < limit {
        match SlotTime::from_minutes(current) {
            Some(time) => out.push(time),
            None => break,
        }
        current = current.saturating_add(step);
    }
    out
}

/// Hours a day is seeded with on first initialization.
pub fn default_day_hours(closing: SlotTime) -> Vec<SlotTime> {
    let pattern = SessionPattern::Dense;
    generate_from(
        DEFAULT_DAY_START,
        pattern.session_minutes(),
        pattern.break_minutes(),
        closing,
    )
}

/// Session cadence an administrator can apply to a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPattern {
    /// 60-minute sessions with 15-minute breaks (selector `A`).
    Dense,
    /// 90-minute sessions with 15-minute breaks (selector `B`). Any
    /// selector other than `A` runs this cadence.
    #[default]
    Relaxed,
}

impl SessionPattern {
    /// Parses a selector. Accepts `A`/`dense` and `B`/`relaxed`,
    /// case-insensitive, surrounding whitespace ignored.
    pub fn from_selector(selector: &str) -> Option<Self> {
        match selector.trim().to_ascii_lowercase().as_str() {
            "a" | "dense" => Some(Self::Dense),
            "b" | "relaxed" => Some(Self::Relaxed),
            _ => None,
        }
    }

    pub fn session_minutes(self) -> u32 {
        match self {
            Self::Dense => 60,
            Self::Relaxed => 90,
        }
    }

    pub fn break_minutes(self) -> u32 {
        15
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dense => "dense",
            Self::Relaxed => "relaxed",
        }
    }

    /// Generates this cadence's hours from `start` up to `closing`.
    pub fn hours(self, start: SlotTime, closing: SlotTime) -> Vec<SlotTime> {
        generate_from(start, self.session_minutes(), self.break_minutes(), closing)
    }
}

#[cfg(test)]
mod tests {
    use super::{default_day_hours, generate, SessionPattern, DEFAULT_CLOSING_TIME};
    use crate::model::slot::SlotTime;

    fn rendered(hours: &[SlotTime]) -> Vec<String> {
        hours.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn dense_noon_pattern_matches_reference_sequence() {
        let hours = generate("12:00", 60, 15, DEFAULT_CLOSING_TIME);
        assert_eq!(
            rendered(&hours),
            vec!["12:00", "13:15", "14:30", "15:45", "17:00", "18:15", "19:30"]
        );
    }

    #[test]
    fn relaxed_pattern_from_ten() {
        let hours = generate("10:00", 90, 15, DEFAULT_CLOSING_TIME);
        assert_eq!(
            rendered(&hours),
            vec!["10:00", "11:45", "13:30", "15:15", "17:00", "18:45"]
        );
    }

    #[test]
    fn start_at_or_after_closing_is_empty() {
        assert!(generate("20:00", 60, 15, DEFAULT_CLOSING_TIME).is_empty());
        assert!(generate("21:30", 60, 15, DEFAULT_CLOSING_TIME).is_empty());
    }

    #[test]
    fn malformed_start_is_empty_not_an_error() {
        assert!(generate("noon", 60, 15, DEFAULT_CLOSING_TIME).is_empty());
        assert!(generate("12.00", 60, 15, DEFAULT_CLOSING_TIME).is_empty());
        assert!(generate("25:00", 60, 15, DEFAULT_CLOSING_TIME).is_empty());
    }

    #[test]
    fn zero_step_is_empty() {
        assert!(generate("12:00", 0, 0, DEFAULT_CLOSING_TIME).is_empty());
    }

    #[test]
    fn last_value_is_strictly_before_closing() {
        let closing: SlotTime = "19:30".parse().expect("valid");
        let hours = generate("12:00", 60, 15, closing);
        assert_eq!(hours.last().map(ToString::to_string).as_deref(), Some("18:15"));
    }

    #[test]
    fn default_day_is_dense_from_noon() {
        assert_eq!(
            default_day_hours(DEFAULT_CLOSING_TIME),
            generate("12:00", 60, 15, DEFAULT_CLOSING_TIME)
        );
    }

    #[test]
    fn selector_parsing_is_closed_and_case_insensitive() {
        assert_eq!(SessionPattern::from_selector(" a "), Some(SessionPattern::Dense));
        assert_eq!(SessionPattern::from_selector("Relaxed"), Some(SessionPattern::Relaxed));
        assert_eq!(SessionPattern::from_selector("B"), Some(SessionPattern::Relaxed));
        assert_eq!(SessionPattern::from_selector("c"), None);
    }

    #[test]
    fn unrecognized_selector_cadence_is_relaxed() {
        assert_eq!(SessionPattern::default(), SessionPattern::Relaxed);
        assert_eq!(SessionPattern::default().session_minutes(), 90);
    }
}
