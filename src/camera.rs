//! Camera media naming and the snapshot relevance filter.
//!
//! Camera files are named `<camera>_<YYYYMMDD>_<HHMMSS>.<ext>`. The camera part
//! may itself contain underscores; the timestamp is always the last two
//! segments. Timestamps are taken to be in the configured display timezone.

use std::cmp::Reverse;

use chrono::{NaiveDate, NaiveDateTime, Timelike};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Snapshot,
    Clip,
}

impl MediaKind {
    /// Classify by extension, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "gif" => Some(Self::Snapshot),
            "mp4" => Some(Self::Clip),
            _ => None,
        }
    }
}

/// One calendar hour. Two times share a bucket iff date and hour both match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HourBucket {
    pub date: NaiveDate,
    pub hour: u32,
}

impl HourBucket {
    pub fn of(at: NaiveDateTime) -> Self {
        Self {
            date: at.date(),
            hour: at.hour(),
        }
    }
}

/// A parsed camera file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraShot {
    pub camera: String,
    pub taken_at: NaiveDateTime,
    pub kind: MediaKind,
}

impl CameraShot {
    /// Parse a bare file name. `None` for anything off the naming grammar.
    pub fn parse(name: &str) -> Option<Self> {
        let (stem, _) = name.rsplit_once('.')?;
        let kind = MediaKind::from_name(name)?;
        let mut parts = stem.rsplitn(3, '_');
        let time = parts.next()?;
        let date = parts.next()?;
        let camera = parts.next()?;
        if camera.is_empty() || date.len() != 8 || time.len() != 6 {
            return None;
        }
        if !date.bytes().chain(time.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }
        let num = |s: &str, range: std::ops::Range<usize>| s.get(range)?.parse::<u32>().ok();
        let date = NaiveDate::from_ymd_opt(
            i32::try_from(num(date, 0..4)?).ok()?,
            num(date, 4..6)?,
            num(date, 6..8)?,
        )?;
        let taken_at = date.and_hms_opt(num(time, 0..2)?, num(time, 2..4)?, num(time, 4..6)?)?;
        Some(Self {
            camera: camera.to_string(),
            taken_at,
            kind,
        })
    }

    pub fn hour_bucket(&self) -> HourBucket {
        HourBucket::of(self.taken_at)
    }
}

/// Which tier of the relevance filter produced a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relevance {
    CurrentHour,
    Today,
    Everything,
}

/// Pick the camera snapshots worth showing at `now`.
///
/// Snapshots from the current clock hour win; failing that, today's; failing
/// that, everything (including names that do not parse). The result is ordered
/// newest first and may be empty.
pub fn select_relevant<S: AsRef<str>>(names: &[S], now: NaiveDateTime) -> (Vec<String>, Relevance) {
    let mut parsed: Vec<(&str, Option<CameraShot>)> = names
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| MediaKind::from_name(name) == Some(MediaKind::Snapshot))
        .map(|name| (name, CameraShot::parse(name)))
        .collect();
    parsed.sort_by_key(|(name, shot)| Reverse((shot.as_ref().map(|s| s.taken_at), *name)));

    let pick = |keep: &dyn Fn(&CameraShot) -> bool| -> Vec<String> {
        parsed
            .iter()
            .filter(|(_, shot)| shot.as_ref().is_some_and(keep))
            .map(|(name, _)| name.to_string())
            .collect()
    };

    let current = HourBucket::of(now);
    let hour = pick(&|shot| shot.hour_bucket() == current);
    if !hour.is_empty() {
        return (hour, Relevance::CurrentHour);
    }
    let today = pick(&|shot| shot.taken_at.date() == now.date());
    if !today.is_empty() {
        return (today, Relevance::Today);
    }
    let all = parsed.iter().map(|(name, _)| name.to_string()).collect();
    (all, Relevance::Everything)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn parses_camera_with_underscores() {
        let shot = CameraShot::parse("front_door_20250504_093015.jpg").unwrap();
        assert_eq!(shot.camera, "front_door");
        assert_eq!(shot.taken_at, at(4, 9, 30) + chrono::Duration::seconds(15));
        assert_eq!(shot.kind, MediaKind::Snapshot);
        assert_eq!(shot.hour_bucket().hour, 9);
    }

    #[test]
    fn clip_extension_is_case_insensitive() {
        let shot = CameraShot::parse("Garage_20250504_230000.MP4").unwrap();
        assert_eq!(shot.kind, MediaKind::Clip);
    }

    #[test]
    fn rejects_malformed_names() {
        for name in [
            "front.jpg",
            "_20250504_093015.jpg",
            "front_2025054_093015.jpg",
            "front_20250504_0930.jpg",
            "front_20251304_093015.jpg",
            "front_20250504_253015.jpg",
            "front_2025o504_093015.jpg",
            "front_20250504_093015.txt",
            "front_20250504_093015",
        ] {
            assert!(CameraShot::parse(name).is_none(), "{name} parsed");
        }
    }

    #[test]
    fn same_hour_groups_into_one_bucket() {
        let a = CameraShot::parse("yard_20250504_090001.jpg").unwrap();
        let b = CameraShot::parse("yard_20250504_095959.mp4").unwrap();
        let c = CameraShot::parse("yard_20250504_100000.jpg").unwrap();
        assert_eq!(a.hour_bucket(), b.hour_bucket());
        assert_ne!(a.hour_bucket(), c.hour_bucket());
    }

    #[test]
    fn same_hour_on_another_day_is_not_current() {
        let names = ["yard_20250503_090500.jpg", "yard_20250504_070000.jpg"];
        let (picked, tier) = select_relevant(&names, at(4, 9, 30));
        assert_eq!(tier, Relevance::Today);
        assert_eq!(picked, vec!["yard_20250504_070000.jpg"]);
    }

    #[test]
    fn current_hour_wins() {
        let names = [
            "yard_20250504_080000.jpg",
            "yard_20250504_091000.jpg",
            "door_20250504_095000.jpg",
            "door_20250504_095500.mp4",
        ];
        let (picked, tier) = select_relevant(&names, at(4, 9, 58));
        assert_eq!(tier, Relevance::CurrentHour);
        assert_eq!(picked, vec!["door_20250504_095000.jpg", "yard_20250504_091000.jpg"]);
    }

    #[test]
    fn falls_back_to_today() {
        let names = ["yard_20250503_230000.jpg", "yard_20250504_010000.jpg"];
        let (picked, tier) = select_relevant(&names, at(4, 9, 0));
        assert_eq!(tier, Relevance::Today);
        assert_eq!(picked, vec!["yard_20250504_010000.jpg"]);
    }

    #[test]
    fn falls_back_to_everything_including_unparsed() {
        let names = ["snapshot.jpg", "yard_20250501_010000.jpg", "yard_20250502_010000.jpg"];
        let (picked, tier) = select_relevant(&names, at(4, 9, 0));
        assert_eq!(tier, Relevance::Everything);
        assert_eq!(
            picked,
            vec!["yard_20250502_010000.jpg", "yard_20250501_010000.jpg", "snapshot.jpg"]
        );
    }

    #[test]
    fn empty_input_is_not_an_error() {
        let names: [&str; 0] = [];
        let (picked, tier) = select_relevant(&names, at(4, 9, 0));
        assert!(picked.is_empty());
        assert_eq!(tier, Relevance::Everything);
    }
}
