use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AvailabilitySlot {
    pub weekday: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl AvailabilitySlot {
    pub fn new(weekday: Weekday, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            weekday,
            start,
            end,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }
}

/// Returns true when the declared slots cover `[start, end]` on `weekday` entirely.
///
/// Slots on the same day that touch or overlap are merged first, so a driver
/// declaring 09:00-11:00 and 11:00-13:00 covers a 10:00-12:00 job.
pub fn covers(slots: &[AvailabilitySlot], weekday: Weekday, start: NaiveTime, end: NaiveTime) -> bool {
    if start >= end {
        return false;
    }

    let mut day: Vec<(NaiveTime, NaiveTime)> = slots
        .iter()
        .filter(|slot| slot.weekday == weekday && slot.is_valid())
        .map(|slot| (slot.start, slot.end))
        .collect();
    day.sort();

    let mut merged: Option<(NaiveTime, NaiveTime)> = None;
    for (slot_start, slot_end) in day {
        merged = match merged {
            Some((m_start, m_end)) if slot_start <= m_end => Some((m_start, m_end.max(slot_end))),
            Some(span) => {
                if span.0 <= start && span.1 >= end {
                    return true;
                }
                Some((slot_start, slot_end))
            }
            None => Some((slot_start, slot_end)),
        };
    }

    matches!(merged, Some((m_start, m_end)) if m_start <= start && m_end >= end)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveTime, Weekday};

    use super::{covers, AvailabilitySlot};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn single_slot_covering_window_matches() {
        let slots = [AvailabilitySlot::new(Weekday::Mon, t(8, 0), t(17, 0))];
        assert!(covers(&slots, Weekday::Mon, t(9, 0), t(12, 0)));
    }

    #[test]
    fn exact_boundaries_match() {
        let slots = [AvailabilitySlot::new(Weekday::Mon, t(9, 0), t(12, 0))];
        assert!(covers(&slots, Weekday::Mon, t(9, 0), t(12, 0)));
    }

    #[test]
    fn wrong_weekday_does_not_match() {
        let slots = [AvailabilitySlot::new(Weekday::Tue, t(0, 0), t(23, 0))];
        assert!(!covers(&slots, Weekday::Mon, t(9, 0), t(12, 0)));
    }

    #[test]
    fn partial_overlap_does_not_match() {
        let slots = [AvailabilitySlot::new(Weekday::Mon, t(10, 0), t(17, 0))];
        assert!(!covers(&slots, Weekday::Mon, t(9, 0), t(12, 0)));
    }

    #[test]
    fn adjacent_slots_are_merged() {
        let slots = [
            AvailabilitySlot::new(Weekday::Mon, t(11, 0), t(13, 0)),
            AvailabilitySlot::new(Weekday::Mon, t(9, 0), t(11, 0)),
        ];
        assert!(covers(&slots, Weekday::Mon, t(10, 0), t(12, 30)));
    }

    #[test]
    fn gap_between_slots_breaks_coverage() {
        let slots = [
            AvailabilitySlot::new(Weekday::Mon, t(9, 0), t(10, 30)),
            AvailabilitySlot::new(Weekday::Mon, t(11, 0), t(13, 0)),
        ];
        assert!(!covers(&slots, Weekday::Mon, t(10, 0), t(12, 0)));
        assert!(covers(&slots, Weekday::Mon, t(11, 15), t(12, 0)));
    }

    #[test]
    fn empty_availability_never_matches() {
        assert!(!covers(&[], Weekday::Mon, t(9, 0), t(12, 0)));
    }
}
