//! Venue aggregate and its per-date availability ledger.

use crate::error::{MarketError, Result};
use crate::types::{BookingId, UserId, VenueId};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// The slice of the venue aggregate the booking engine needs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Venue {
    /// Venue ID
    pub id: VenueId,
    /// Owner who accepts or rejects booking requests
    pub owner_id: UserId,
    /// Display name (used in notifications)
    pub name: String,
    /// Accept requests immediately instead of waiting for the owner
    pub auto_approve: bool,
}

/// A half-open time window `[start, end)` within a single day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Inclusive start
    pub start: NaiveTime,
    /// Exclusive end
    pub end: NaiveTime,
}

impl TimeWindow {
    /// Creates a window, rejecting empty or inverted ranges.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] if `start >= end`.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if start >= end {
            return Err(MarketError::Validation(format!(
                "start time {start} must be before end time {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Whether two windows share any instant. Touching endpoints do not overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Why a slot is unavailable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    /// Reserved by an accepted booking
    Booked,
    /// Blocked by the owner
    Blocked,
}

impl SlotKind {
    /// Storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Booked => "booked",
            Self::Blocked => "blocked",
        }
    }

    /// Parses the storage representation.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidStatus`] for unknown values.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "booked" => Ok(Self::Booked),
            "blocked" => Ok(Self::Blocked),
            other => Err(MarketError::InvalidStatus(other.to_string())),
        }
    }
}

/// One reserved interval on a venue's date.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Reserved window
    pub window: TimeWindow,
    /// Booked or blocked
    pub kind: SlotKind,
    /// Booking that owns a booked slot
    pub booking_id: Option<BookingId>,
}

/// All slots of a venue on one date.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayAvailability {
    /// Calendar date
    pub date: Option<NaiveDate>,
    /// Slots on that date
    pub slots: Vec<Slot>,
}

impl DayAvailability {
    /// Whether `window` is free of any booked or blocked slot.
    #[must_use]
    pub fn is_free(&self, window: &TimeWindow) -> bool {
        !self.slots.iter().any(|slot| slot.window.overlaps(window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap_or_default()
    }

    fn window(start: u32, end: u32) -> TimeWindow {
        TimeWindow { start: t(start), end: t(end) }
    }

    #[test]
    fn adjacent_windows_do_not_overlap() {
        assert!(!window(10, 12).overlaps(&window(12, 14)));
        assert!(!window(12, 14).overlaps(&window(10, 12)));
    }

    #[test]
    fn nested_and_partial_windows_overlap() {
        assert!(window(10, 14).overlaps(&window(11, 12)));
        assert!(window(11, 12).overlaps(&window(10, 14)));
        assert!(window(10, 12).overlaps(&window(11, 13)));
    }

    #[test]
    fn inverted_window_is_rejected() {
        assert!(TimeWindow::new(t(12), t(10)).is_err());
        assert!(TimeWindow::new(t(12), t(12)).is_err());
    }

    #[test]
    fn blocked_slots_make_day_unavailable() {
        let day = DayAvailability {
            date: None,
            slots: vec![Slot {
                window: window(9, 11),
                kind: SlotKind::Blocked,
                booking_id: None,
            }],
        };
        assert!(!day.is_free(&window(10, 12)));
        assert!(day.is_free(&window(11, 12)));
    }
}
