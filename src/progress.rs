/*
 *  progress.rs
 *
 *  SchoolRing - the day at a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Elapsed fraction and current/next class lookup
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use chrono::{NaiveTime, Timelike};

use crate::schedule::ClassInterval;

/// Fraction of `start..end` elapsed at `now`, clamped to `[0, 1]`.
///
/// Second-of-day precision. An empty (or reversed) interval counts as
/// already elapsed and yields `1.0`.
pub fn percent(now: NaiveTime, start: NaiveTime, end: NaiveTime) -> f32 {
    let now = now.num_seconds_from_midnight() as i64;
    let start = start.num_seconds_from_midnight() as i64;
    let end = end.num_seconds_from_midnight() as i64;

    let span = end - start;
    if span <= 0 {
        return 1.0;
    }
    ((now - start) as f32 / span as f32).clamp(0.0, 1.0)
}

/// First interval containing `now` (both ends inclusive). At a shared
/// boundary the earlier interval wins, except that a break never wins over
/// a real class.
pub fn current_class(now: NaiveTime, schedule: &[ClassInterval]) -> Option<&ClassInterval> {
    let mut matching = schedule.iter().filter(|c| c.start() <= now && now <= c.end());
    let first = matching.next()?;
    if first.is_break() {
        return matching.find(|c| !c.is_break()).or(Some(first));
    }
    Some(first)
}

/// First real class starting after `now`; breaks are never reported.
pub fn next_class(now: NaiveTime, schedule: &[ClassInterval]) -> Option<&ClassInterval> {
    schedule.iter().find(|c| c.start() > now && !c.is_break())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::normalize;
    use embedded_graphics::pixelcolor::Rgb888;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day() -> Vec<ClassInterval> {
        let color = Rgb888::new(10, 20, 30);
        normalize(
            vec![
                ClassInterval::new("A", t(8, 0), t(8, 50), color).unwrap(),
                ClassInterval::new("B", t(9, 0), t(9, 50), color).unwrap(),
                ClassInterval::new("C", t(9, 50), t(10, 40), color).unwrap(),
            ],
            true,
            t(15, 15),
        )
        .classes()
        .to_vec()
    }

    #[test]
    fn test_percent_bounds() {
        assert_eq!(percent(t(7, 0), t(8, 0), t(9, 0)), 0.0);
        assert_eq!(percent(t(8, 0), t(8, 0), t(9, 0)), 0.0);
        assert_eq!(percent(t(8, 30), t(8, 0), t(9, 0)), 0.5);
        assert_eq!(percent(t(9, 0), t(8, 0), t(9, 0)), 1.0);
        assert_eq!(percent(t(12, 0), t(8, 0), t(9, 0)), 1.0);
    }

    #[test]
    fn test_percent_zero_length_interval() {
        assert_eq!(percent(t(7, 0), t(8, 0), t(8, 0)), 1.0);
        assert_eq!(percent(t(8, 0), t(8, 0), t(8, 0)), 1.0);
        assert_eq!(percent(t(9, 0), t(8, 0), t(8, 0)), 1.0);
    }

    #[test]
    fn test_percent_always_in_range() {
        for minute in (0..24 * 60).step_by(7) {
            let now = t(minute / 60, minute % 60);
            let p = percent(now, t(10, 0), t(11, 30));
            assert!((0.0..=1.0).contains(&p), "{} out of range at {}", p, now);
        }
    }

    #[test]
    fn test_current_class_lookup() {
        let schedule = day();
        assert_eq!(current_class(t(8, 20), &schedule).unwrap().name(), "A");
        assert!(current_class(t(8, 55), &schedule).unwrap().is_break());
        assert!(current_class(t(7, 59), &schedule).is_none());
        assert!(current_class(t(11, 0), &schedule).is_none());
    }

    #[test]
    fn test_boundary_prefers_earlier_real_class() {
        let schedule = day();
        // 8:50 is both the end of A and the start of the break
        assert_eq!(current_class(t(8, 50), &schedule).unwrap().name(), "A");
        // 9:00 is both the end of the break and the start of B
        assert_eq!(current_class(t(9, 0), &schedule).unwrap().name(), "B");
        assert!(current_class(t(8, 55), &schedule).unwrap().is_break());
        // 9:50 is shared by B and C
        assert_eq!(current_class(t(9, 50), &schedule).unwrap().name(), "B");
    }

    #[test]
    fn test_next_class_skips_breaks() {
        let schedule = day();
        assert_eq!(next_class(t(7, 0), &schedule).unwrap().name(), "A");
        // the break starts at 8:50, but B is reported
        assert_eq!(next_class(t(8, 30), &schedule).unwrap().name(), "B");
        assert_eq!(next_class(t(9, 0), &schedule).unwrap().name(), "C");
        assert!(next_class(t(9, 50), &schedule).is_none());

        for minute in (7 * 60..11 * 60).step_by(5) {
            if let Some(next) = next_class(t(minute / 60, minute % 60), &schedule) {
                assert!(!next.is_break());
            }
        }
    }
}
