//! Quarter-hour slot arithmetic for the scheduled dispatch job.
//!
//! A run at local 09:52 services slot 09:45; a run at 09:53 services 10:00.
//! Recipients match a slot when their preferred time lies within the
//! tolerance either side of it. Windows that cross an hour boundary are split
//! into two ranges, one per hour.

use std::fmt;

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveSlot {
    pub hour: u32,
    pub minute: u32,
}

impl fmt::Display for EffectiveSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl Serialize for EffectiveSlot {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Preferred times `hour:minute_from..=hour:minute_to` in the reference zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinuteRange {
    pub hour: u32,
    pub minute_from: u32,
    pub minute_to: u32,
}

impl MinuteRange {
    pub fn contains(&self, hour: u32, minute: u32) -> bool {
        hour == self.hour && (self.minute_from..=self.minute_to).contains(&minute)
    }
}

/// Round `minute` to the nearest multiple of `slot_minutes`, carrying into the
/// next hour (and day) when the rounding reaches 60.
pub fn round_to_slot(hour: u32, minute: u32, slot_minutes: u32) -> EffectiveSlot {
    let rounded = (minute + slot_minutes / 2) / slot_minutes * slot_minutes;
    if rounded >= 60 {
        EffectiveSlot {
            hour: (hour + 1) % 24,
            minute: 0,
        }
    } else {
        EffectiveSlot {
            hour,
            minute: rounded,
        }
    }
}

/// The slot being serviced at `now`, evaluated in `tz`.
pub fn effective_slot(now: DateTime<Utc>, tz: Tz, slot_minutes: u32) -> EffectiveSlot {
    let local = now.with_timezone(&tz);
    round_to_slot(local.hour(), local.minute(), slot_minutes)
}

/// Ranges of preferred times that fall within `tolerance` minutes of `slot`.
pub fn match_ranges(slot: EffectiveSlot, tolerance: u32) -> Vec<MinuteRange> {
    let tolerance = tolerance.min(59);
    let mut ranges = Vec::with_capacity(2);

    if slot.minute < tolerance {
        ranges.push(MinuteRange {
            hour: (slot.hour + 23) % 24,
            minute_from: 60 + slot.minute - tolerance,
            minute_to: 59,
        });
    }

    ranges.push(MinuteRange {
        hour: slot.hour,
        minute_from: slot.minute.saturating_sub(tolerance),
        minute_to: (slot.minute + tolerance).min(59),
    });

    if slot.minute + tolerance > 59 {
        ranges.push(MinuteRange {
            hour: (slot.hour + 1) % 24,
            minute_from: 0,
            minute_to: slot.minute + tolerance - 60,
        });
    }

    ranges
}
