//! Violation classification
//!
//! A passage is a violation when its latest track point lands in the last 15
//! seconds of the 60-second signal cycle (yellow/all-red clearance).

use super::counters::RunCounters;
use super::passage::{Passage, TrackPoint};
use chrono::{DateTime, Timelike};

/// First second-of-minute inside the clearance window (inclusive)
pub const VIOLATION_WINDOW_START: u32 = 45;
/// Last second-of-minute inside the clearance window (inclusive)
pub const VIOLATION_WINDOW_END: u32 = 59;

#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub license: String,
    pub point: TrackPoint,
}

/// Point with the greatest timestamp; ties keep the earliest in the slice
pub fn latest_point(track: &[TrackPoint]) -> Option<&TrackPoint> {
    let mut iter = track.iter();
    let mut latest = iter.next()?;
    for point in iter {
        if point.t > latest.t {
            latest = point;
        }
    }
    Some(latest)
}

/// Seconds field (0..=59) of a unix timestamp, UTC calendar
///
/// `None` when the timestamp is outside the calendar range.
pub fn second_of_minute(t: i64) -> Option<u32> {
    DateTime::from_timestamp(t, 0).map(|dt| dt.second())
}

pub fn in_violation_window(second: u32) -> bool {
    (VIOLATION_WINDOW_START..=VIOLATION_WINDOW_END).contains(&second)
}

/// Classify a decoded passage
///
/// Bumps the violation counter on a hit. `processed` is the caller's
/// responsibility.
pub fn classify(passage: &Passage, counters: &RunCounters) -> Option<Violation> {
    let point = latest_point(&passage.track)?;

    // Unplaceable timestamps cannot be keyed, so never count them
    if !second_of_minute(point.t).is_some_and(in_violation_window) {
        return None;
    }

    counters.record_violation();
    Some(Violation {
        license: passage.license_num.clone(),
        point: *point,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2023-11-14 22:13:00 UTC
    const MINUTE: i64 = 1699999980;

    fn point(t: i64) -> TrackPoint {
        TrackPoint { t, x: 0.0, y: 0.0 }
    }

    fn passage(track: Vec<TrackPoint>) -> Passage {
        Passage {
            license_num: "AB123".to_string(),
            track,
        }
    }

    #[test]
    fn test_empty_track_is_not_a_violation() {
        let counters = RunCounters::new();
        assert_eq!(classify(&passage(vec![]), &counters), None);
        assert_eq!(counters.violations(), 0);
    }

    #[test]
    fn test_latest_point_decides() {
        let counters = RunCounters::new();
        let p = passage(vec![point(MINUTE + 45), point(MINUTE + 10)]);

        let violation = classify(&p, &counters).unwrap();
        assert_eq!(violation.license, "AB123");
        assert_eq!(violation.point.t, MINUTE + 45);
        assert_eq!(counters.violations(), 1);
    }

    #[test]
    fn test_latest_point_wins_over_earlier_qualifying_points() {
        let counters = RunCounters::new();
        // Both :50 and :59 qualify, the later one is reported
        let p = passage(vec![point(MINUTE + 50), point(MINUTE + 59), point(MINUTE + 3)]);

        let violation = classify(&p, &counters).unwrap();
        assert_eq!(violation.point.t, MINUTE + 59);
    }

    #[test]
    fn test_earlier_qualifying_point_is_ignored() {
        let counters = RunCounters::new();
        // Earlier point is at :50, latest at :05 of the next minute
        let p = passage(vec![point(MINUTE + 50), point(MINUTE + 65)]);

        assert_eq!(classify(&p, &counters), None);
        assert_eq!(counters.violations(), 0);
    }

    #[test]
    fn test_tie_keeps_first_seen() {
        let track = vec![
            TrackPoint { t: MINUTE + 46, x: 1.0, y: 1.0 },
            TrackPoint { t: MINUTE + 46, x: 2.0, y: 2.0 },
            TrackPoint { t: MINUTE + 1, x: 3.0, y: 3.0 },
        ];
        let counters = RunCounters::new();

        let violation = classify(&passage(track), &counters).unwrap();
        assert_eq!(violation.point.x, 1.0);
        assert_eq!(violation.point.y, 1.0);
    }

    #[test]
    fn test_window_boundaries() {
        assert!(!in_violation_window(44));
        assert!(in_violation_window(45));
        assert!(in_violation_window(59));
        assert!(!in_violation_window(0));

        assert_eq!(second_of_minute(1700000000), Some(20));
        assert_eq!(second_of_minute(1700000045), Some(5));
        assert_eq!(second_of_minute(MINUTE + 44), Some(44));
        assert_eq!(second_of_minute(MINUTE + 60), Some(0));
        assert_eq!(second_of_minute(-1), Some(59));
        assert_eq!(second_of_minute(i64::MAX), None);
    }

    #[test]
    fn test_out_of_range_timestamp_is_not_a_violation() {
        // i64::MAX - 8 is :59 under plain modular arithmetic
        let counters = RunCounters::new();
        let p = passage(vec![point(i64::MAX - 8)]);

        assert_eq!(classify(&p, &counters), None);
        assert_eq!(counters.violations(), 0);
    }

    #[test]
    fn test_latest_point_empty() {
        assert!(latest_point(&[]).is_none());
    }
}
