use std::fmt::Debug;

use chrono::{DateTime, Local, Utc};

/// Occupied interval of a lesson: half-open `[start_at, start_at + duration_min)`.
#[derive(Clone, Copy)]
pub struct Slot {
    start_at: DateTime<Utc>,
    duration_min: u32,
}

impl Slot {
    pub fn new(start_at: DateTime<Utc>, duration_min: u32) -> Slot {
        Slot {
            start_at,
            duration_min,
        }
    }

    pub fn start_at(&self) -> DateTime<Local> {
        self.start_at.with_timezone(&Local)
    }

    pub fn start_at_utc(&self) -> DateTime<Utc> {
        self.start_at
    }

    pub fn end_at(&self) -> DateTime<Local> {
        self.end_at_utc().with_timezone(&Local)
    }

    pub fn end_at_utc(&self) -> DateTime<Utc> {
        self.start_at + chrono::Duration::minutes(self.duration_min as i64)
    }

    pub fn duration_min(&self) -> u32 {
        self.duration_min
    }

    pub fn in_slot(&self, time: DateTime<Local>) -> bool {
        let start = self.start_at();
        let end = self.end_at();

        time >= start && time < end
    }

    /// Both intervals are half-open, so a lesson ending exactly when
    /// another starts is not a conflict.
    pub fn has_conflict(&self, other: &Slot) -> bool {
        other.start_at < self.end_at_utc() && other.end_at_utc() > self.start_at
    }
}

impl Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let start_at = self.start_at();
        let fmt = "%H:%M";
        write!(
            f,
            "[({}):{}<->{}]",
            start_at.format("%d.%m"),
            start_at.format(fmt),
            self.end_at().format(fmt)
        )
    }
}
