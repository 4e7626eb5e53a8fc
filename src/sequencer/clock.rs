use chrono::{Local, NaiveDateTime, Utc};
use chrono_tz::Tz;

use crate::camera::HourBucket;

/// Last wall-clock hour the sequencer saw.
///
/// Polled rather than scheduled: a restart lands up to one poll interval after
/// the boundary, and at most once per boundary crossing.
#[derive(Debug, Clone)]
pub struct SequenceClock {
    bucket: HourBucket,
}

impl SequenceClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            bucket: HourBucket::of(now),
        }
    }

    pub fn hour(&self) -> u32 {
        self.bucket.hour
    }

    /// Record `now`; `true` when it falls in a different hour than the last observation.
    pub fn observe(&mut self, now: NaiveDateTime) -> bool {
        let bucket = HourBucket::of(now);
        if bucket == self.bucket {
            return false;
        }
        self.bucket = bucket;
        true
    }
}

/// Source of local wall-clock time, optionally pinned to an IANA zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock {
    tz: Option<Tz>,
}

impl WallClock {
    pub fn new(tz: Option<Tz>) -> Self {
        Self { tz }
    }

    pub fn now(&self) -> NaiveDateTime {
        match self.tz {
            Some(tz) => Utc::now().with_timezone(&tz).naive_local(),
            None => Local::now().naive_local(),
        }
    }
}
