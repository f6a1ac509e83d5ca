/*
 *  schedule.rs
 *
 *  SchoolRing - the day at a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Class intervals, schedule payload parsing and break normalization
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

use chrono::{DateTime, FixedOffset, NaiveTime, TimeZone};
use embedded_graphics::pixelcolor::Rgb888;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Name given to the synthetic intervals that fill gaps between classes.
pub const BREAK_NAME: &str = "Break";

/// Neutral colour used for synthetic breaks (platform GRAY).
pub const BREAK_COLOR: Rgb888 = Rgb888::new(0x88, 0x88, 0x88);

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("schedule payload error: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("invalid colour '{0}'")]
    InvalidColor(String),
    #[error("class '{name}' ends before it starts ({start} > {end})")]
    ReversedInterval { name: String, start: NaiveTime, end: NaiveTime },
}

/// One class period (or synthetic break) of the school day.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassInterval {
    name: String,
    start: NaiveTime,
    end: NaiveTime,
    color: Rgb888,
}

impl ClassInterval {
    pub fn new(
        name: impl Into<String>,
        start: NaiveTime,
        end: NaiveTime,
        color: Rgb888,
    ) -> Result<Self, ScheduleError> {
        let name = name.into();
        if start > end {
            return Err(ScheduleError::ReversedInterval { name, start, end });
        }
        Ok(Self { name, start, end, color })
    }

    /// Synthetic break spanning `start..end`.
    fn gap(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            name: BREAK_NAME.to_string(),
            start,
            end,
            color: BREAK_COLOR,
        }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn start(&self) -> NaiveTime { self.start }
    pub fn end(&self) -> NaiveTime { self.end }
    pub fn color(&self) -> Rgb888 { self.color }

    pub fn is_break(&self) -> bool {
        self.name == BREAK_NAME
    }
}

/// The normalized school day: gap-free classes plus session flags.
#[derive(Debug, Clone, PartialEq)]
pub struct SchoolDay {
    classes: Vec<ClassInterval>,
    in_session: bool,
    effective_end: NaiveTime,
}

impl SchoolDay {
    /// No classes, no school.
    pub fn empty(default_end: NaiveTime) -> Self {
        Self {
            classes: Vec::new(),
            in_session: false,
            effective_end: default_end,
        }
    }

    pub fn classes(&self) -> &[ClassInterval] { &self.classes }
    pub fn in_session(&self) -> bool { self.in_session }
    pub fn effective_end(&self) -> NaiveTime { self.effective_end }

    pub fn first_start(&self) -> Option<NaiveTime> {
        self.classes.first().map(ClassInterval::start)
    }

    /// Builds a day from an upstream `/schedule/get` response.
    ///
    /// Never fails: a malformed payload is logged and yields an empty day
    /// that is not in session, so the render loop keeps going.
    pub fn from_payload<Tz: TimeZone>(payload: &Value, default_end: NaiveTime, tz: &Tz) -> Self {
        match parse_payload(payload, tz) {
            Ok((classes, in_session)) => {
                let day = normalize(classes, in_session, default_end);
                debug!(
                    "Schedule parsed: {} intervals, in session: {}, ends {}",
                    day.classes.len(),
                    day.in_session,
                    day.effective_end
                );
                day
            }
            Err(e) => {
                warn!("Discarding schedule payload: {}", e);
                Self::empty(default_end)
            }
        }
    }
}

/// Walks adjacent pairs and fills every gap with a [`BREAK_NAME`] interval.
///
/// Empty and single-class inputs come back unchanged; nothing is added
/// before the first class or after the last. Overlapping neighbours get no
/// break since there is no gap to fill.
pub fn normalize(mut classes: Vec<ClassInterval>, in_session: bool, default_end: NaiveTime) -> SchoolDay {
    classes.sort_by_key(|c| c.start);

    let mut normalized = Vec::with_capacity(classes.len() * 2);
    let mut iter = classes.into_iter().peekable();
    while let Some(current) = iter.next() {
        let gap = iter
            .peek()
            .filter(|next| current.end < next.start)
            .map(|next| ClassInterval::gap(current.end, next.start));
        normalized.push(current);
        if let Some(brk) = gap {
            normalized.push(brk);
        }
    }

    let effective_end = normalized
        .last()
        .map(|last| last.end.min(default_end))
        .unwrap_or(default_end);

    SchoolDay {
        classes: normalized,
        in_session,
        effective_end,
    }
}

/// Parses `#RRGGBB` (or `#AARRGGBB`, alpha ignored).
pub fn parse_hex_color(text: &str) -> Result<Rgb888, ScheduleError> {
    let invalid = || ScheduleError::InvalidColor(text.to_string());
    let hex = text.strip_prefix('#').ok_or_else(invalid)?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let rgb = match hex.len() {
        6 => hex,
        8 => &hex[2..],
        _ => return Err(invalid()),
    };
    let value = u32::from_str_radix(rgb, 16).map_err(|_| invalid())?;
    Ok(Rgb888::new(
        ((value >> 16) & 0xFF) as u8,
        ((value >> 8) & 0xFF) as u8,
        (value & 0xFF) as u8,
    ))
}

#[derive(Debug, Deserialize)]
struct ScheduleResponse {
    schedule: SchedulePayload,
}

#[derive(Debug, Deserialize)]
struct SchedulePayload {
    day: Option<Value>,
    classes: Vec<ClassEntry>,
}

#[derive(Debug, Deserialize)]
struct ClassEntry {
    class: ClassInfo,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
}

#[derive(Debug, Deserialize)]
struct ClassInfo {
    name: String,
    color: String,
}

fn parse_payload<Tz: TimeZone>(
    payload: &Value,
    tz: &Tz,
) -> Result<(Vec<ClassInterval>, bool), ScheduleError> {
    let response = ScheduleResponse::deserialize(payload)?;
    let in_session = response.schedule.day.is_some();

    let classes = response
        .schedule
        .classes
        .into_iter()
        .map(|entry| {
            ClassInterval::new(
                entry.class.name,
                entry.start.with_timezone(tz).time(),
                entry.end.with_timezone(tz).time(),
                parse_hex_color(&entry.class.color)?,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((classes, in_session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn class(name: &str, start: NaiveTime, end: NaiveTime) -> ClassInterval {
        ClassInterval::new(name, start, end, Rgb888::new(1, 2, 3)).unwrap()
    }

    fn school_end() -> NaiveTime {
        t(15, 15)
    }

    #[test]
    fn test_break_inserted_between_classes() {
        let day = normalize(
            vec![class("A", t(8, 0), t(8, 50)), class("B", t(9, 0), t(9, 50))],
            true,
            school_end(),
        );

        let names: Vec<&str> = day.classes().iter().map(|c| c.name()).collect();
        assert_eq!(names, ["A", BREAK_NAME, "B"]);
        assert_eq!(day.classes()[1].start(), t(8, 50));
        assert_eq!(day.classes()[1].end(), t(9, 0));
        assert_eq!(day.classes()[1].color(), BREAK_COLOR);
        assert_eq!(day.effective_end(), t(9, 50));
        assert!(day.in_session());
    }

    #[test]
    fn test_output_is_gap_free() {
        let day = normalize(
            vec![
                class("A", t(8, 0), t(8, 45)),
                class("B", t(8, 45), t(9, 30)),
                class("C", t(10, 0), t(10, 40)),
                class("D", t(11, 5), t(12, 0)),
                class("E", t(12, 0), t(12, 30)),
            ],
            true,
            school_end(),
        );

        assert_eq!(day.classes().len(), 7);
        for pair in day.classes().windows(2) {
            assert_eq!(pair[0].end(), pair[1].start());
        }
    }

    #[test]
    fn test_single_and_empty_unchanged() {
        let single = normalize(vec![class("A", t(8, 0), t(8, 50))], true, school_end());
        assert_eq!(single.classes().len(), 1);
        assert_eq!(single.classes()[0].name(), "A");

        let empty = normalize(Vec::new(), true, school_end());
        assert!(empty.classes().is_empty());
        assert!(empty.in_session());
        assert_eq!(empty.effective_end(), school_end());
    }

    #[test]
    fn test_effective_end_capped_by_default() {
        let day = normalize(vec![class("Late", t(14, 0), t(16, 0))], true, school_end());
        assert_eq!(day.effective_end(), school_end());
    }

    #[test]
    fn test_overlapping_classes_get_no_break() {
        let day = normalize(
            vec![class("A", t(8, 0), t(9, 10)), class("B", t(9, 0), t(9, 50))],
            true,
            school_end(),
        );
        assert_eq!(day.classes().len(), 2);
    }

    #[test]
    fn test_reversed_interval_rejected() {
        let err = ClassInterval::new("X", t(10, 0), t(9, 0), BREAK_COLOR).unwrap_err();
        assert!(matches!(err, ScheduleError::ReversedInterval { .. }));
    }

    #[test]
    fn test_hex_color_parsing() {
        assert_eq!(parse_hex_color("#FF8000").unwrap(), Rgb888::new(0xFF, 0x80, 0x00));
        assert_eq!(parse_hex_color("#80FF8000").unwrap(), Rgb888::new(0xFF, 0x80, 0x00));
        assert!(parse_hex_color("FF8000").is_err());
        assert!(parse_hex_color("#GG0000").is_err());
        assert!(parse_hex_color("#FFF").is_err());
        assert!(parse_hex_color("#+FFFFF").is_err());
        assert!(parse_hex_color("#1é23456").is_err());
    }

    #[test]
    fn test_payload_parsed_in_time_zone() {
        let payload = json!({
            "schedule": {
                "day": "1",
                "classes": [
                    {
                        "class": { "name": "Math", "color": "#FF0000" },
                        "start": "2026-10-19T13:00:00Z",
                        "end": "2026-10-19T13:50:00Z"
                    },
                    {
                        "class": { "name": "History", "color": "#00FF00" },
                        "start": "2026-10-19T14:00:00Z",
                        "end": "2026-10-19T14:50:00Z"
                    }
                ]
            }
        });
        let central = FixedOffset::west_opt(5 * 3600).unwrap();
        let day = SchoolDay::from_payload(&payload, school_end(), &central);

        assert!(day.in_session());
        assert_eq!(day.classes().len(), 3);
        assert_eq!(day.classes()[0].name(), "Math");
        assert_eq!(day.classes()[0].start(), t(8, 0));
        assert_eq!(day.classes()[0].color(), Rgb888::new(0xFF, 0, 0));
        assert!(day.classes()[1].is_break());
        assert_eq!(day.effective_end(), t(9, 50));
    }

    #[test]
    fn test_null_day_means_no_school() {
        let payload = json!({
            "schedule": {
                "day": null,
                "classes": [
                    {
                        "class": { "name": "Math", "color": "#FF0000" },
                        "start": "2026-10-19T08:00:00Z",
                        "end": "2026-10-19T08:50:00Z"
                    }
                ]
            }
        });
        let day = SchoolDay::from_payload(&payload, school_end(), &Utc);
        assert!(!day.in_session());
        assert_eq!(day.classes().len(), 1);
    }

    #[test]
    fn test_empty_classes_with_day() {
        let payload = json!({ "schedule": { "day": 3, "classes": [] } });
        let day = SchoolDay::from_payload(&payload, school_end(), &Utc);
        assert!(day.in_session());
        assert_eq!(day.effective_end(), school_end());
    }

    #[test]
    fn test_malformed_payload_yields_empty_day() {
        let bad_shape = json!({ "error": "unauthorized" });
        let bad_date = json!({
            "schedule": {
                "day": "1",
                "classes": [
                    { "class": { "name": "M", "color": "#FF0000" }, "start": "soon", "end": "later" }
                ]
            }
        });
        let bad_color = json!({
            "schedule": {
                "day": "1",
                "classes": [
                    {
                        "class": { "name": "M", "color": "red" },
                        "start": "2026-10-19T08:00:00Z",
                        "end": "2026-10-19T08:50:00Z"
                    }
                ]
            }
        });
        let multibyte_color = json!({
            "schedule": {
                "day": "1",
                "classes": [
                    {
                        "class": { "name": "M", "color": "#1é23456" },
                        "start": "2026-10-19T08:00:00Z",
                        "end": "2026-10-19T08:50:00Z"
                    }
                ]
            }
        });

        for payload in [bad_shape, bad_date, bad_color, multibyte_color] {
            let day = SchoolDay::from_payload(&payload, school_end(), &Utc);
            assert_eq!(day, SchoolDay::empty(school_end()));
        }
    }
}
