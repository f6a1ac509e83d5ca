/*
 *  render.rs
 *
 *  SchoolRing - the day at a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Frame description: background, rings, tap indicator and labels
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

use chrono::{Datelike, NaiveDateTime, NaiveTime};
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};

use crate::config::FaceConfig;
use crate::lunch::LunchMenu;
use crate::progress::{current_class, next_class, percent};
use crate::schedule::SchoolDay;

/// Ring arcs start at 12 o'clock.
pub const TWELVE_O_CLOCK_DEG: f32 = -90.0;

const ELLIPSIS: char = '…';
const NO_SCHOOL: &str = "No School";
const WHOLE_DAY: &str = "School";
const LUNCH_HEADING: &str = "Lunch";

/// Pixel size of the drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn center(&self) -> PointF {
        PointF { x: self.width as f32 / 2.0, y: self.height as f32 / 2.0 }
    }

    /// The bounds shrunk around their centre by `scale` on each axis.
    pub fn scaled(&self, scale: f32) -> RectF {
        let c = self.center();
        let half_w = self.width as f32 * scale / 2.0;
        let half_h = self.height as f32 * scale / 2.0;
        RectF {
            left: c.x - half_w,
            top: c.y - half_h,
            right: c.x + half_w,
            bottom: c.y + half_h,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectF {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl RectF {
    pub fn width(&self) -> f32 { self.right - self.left }
    pub fn height(&self) -> f32 { self.bottom - self.top }
}

/// Everything lifecycle callbacks know about the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayState {
    pub ambient: bool,
    pub low_bit_ambient: bool,
    pub burn_in_protection: bool,
    pub visible: bool,
    pub tap_indicator_visible: bool,
    pub lunch_view_active: bool,
    pub bounds: Bounds,
    pub is_round: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextSize {
    /// labels, lunch lines
    Small,
    /// the centre clock on square panels
    Time,
    /// the centre clock on round panels
    TimeRound,
}

/// Measures rendered text; supplied by whoever owns the fonts.
pub trait TextMeasure {
    fn text_width(&self, text: &str, size: TextSize) -> u32;
    fn line_height(&self, size: TextSize) -> u32;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CircleShape {
    pub center: PointF,
    pub radius: f32,
    pub color: Rgb888,
}

/// A stroked arc inscribed in `oval`, angles in degrees, clockwise.
#[derive(Debug, Clone, PartialEq)]
pub struct RingArc {
    pub oval: RectF,
    pub start_angle: f32,
    pub sweep_angle: f32,
    pub color: Rgb888,
    pub stroke_width: u32,
}

/// Text centred horizontally on `x`, sitting on `baseline`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLabel {
    pub text: String,
    pub x: f32,
    pub baseline: f32,
    pub size: TextSize,
    pub color: Rgb888,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CenterContent {
    Time(TextLabel),
    Lunch(Vec<TextLabel>),
}

/// What to draw for one frame, back to front.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawPlan {
    pub bounds: Bounds,
    pub background: Rgb888,
    pub tap_indicator: Option<CircleShape>,
    pub center: CenterContent,
    pub day_ring: Option<RingArc>,
    pub class_ring: Option<RingArc>,
    pub percent_label: Option<TextLabel>,
    pub next_class_label: Option<TextLabel>,
    pub anti_alias: bool,
}

/// Radius of the tap indicator (and of the tappable region).
pub fn tap_radius(bounds: Bounds, scale: f32) -> f32 {
    bounds.width.min(bounds.height) as f32 * scale / 2.0
}

/// `"<name>: <value>"`, with the name cut to its first few characters plus
/// an ellipsis once the whole string is too wide. The value is never cut.
pub fn combine_and_truncate(
    name: &str,
    value: &str,
    bounds_width: u32,
    config: &FaceConfig,
    measure: &dyn TextMeasure,
) -> String {
    let text = format!("{name}: {value}");
    if too_wide(&text, bounds_width, config, measure) {
        let head: String = name.chars().take(config.truncate_chars).collect();
        format!("{head}{ELLIPSIS}: {value}")
    } else {
        text
    }
}

fn truncate_line(text: &str, bounds_width: u32, config: &FaceConfig, measure: &dyn TextMeasure) -> String {
    if too_wide(text, bounds_width, config, measure) {
        let head: String = text.chars().take(config.truncate_chars).collect();
        format!("{head}{ELLIPSIS}")
    } else {
        text.to_string()
    }
}

fn too_wide(text: &str, bounds_width: u32, config: &FaceConfig, measure: &dyn TextMeasure) -> bool {
    let width = measure.text_width(text, TextSize::Small) as f32;
    width >= config.truncation_width_ratio * bounds_width as f32
}

/// `H:MM`, 12-hour clock, no leading zero.
pub fn clock_text(time: NaiveTime) -> String {
    time.format("%-I:%M").to_string()
}

/// Start used for the day ring when no classes are known.
pub fn default_school_start(now: NaiveDateTime, config: &FaceConfig) -> NaiveTime {
    if now.weekday() == config.late_start_day {
        config.late_school_start
    } else {
        config.default_school_start
    }
}

/// Builds the frame for `now`. Pure: nothing here touches engine state.
pub fn render(
    state: &DisplayState,
    day: &SchoolDay,
    lunch: &LunchMenu,
    now: NaiveDateTime,
    config: &FaceConfig,
    measure: &dyn TextMeasure,
) -> DrawPlan {
    let theme = &config.theme;
    let bounds = state.bounds;
    let center = bounds.center();
    let time_of_day = now.time();
    let labels_shown = !state.ambient && !state.lunch_view_active;

    let time_size = if state.is_round { TextSize::TimeRound } else { TextSize::Time };
    let time_h = measure.line_height(time_size) as f32;
    let small_h = measure.line_height(TextSize::Small) as f32;

    let background = if state.ambient { Rgb888::BLACK } else { theme.background };

    let tap_indicator = state.tap_indicator_visible.then(|| CircleShape {
        center,
        radius: tap_radius(bounds, config.tap_indicator_scale),
        color: theme.tap_indicator,
    });

    let center_content = if state.lunch_view_active {
        CenterContent::Lunch(lunch_lines(lunch, bounds, time_h, small_h, config, measure))
    } else {
        CenterContent::Time(TextLabel {
            text: clock_text(time_of_day),
            x: center.x,
            baseline: center.y + time_h / 2.0,
            size: time_size,
            color: theme.text,
        })
    };

    let ring_color = |normal: Rgb888| if state.ambient { theme.ambient_ring } else { normal };

    let day_start = day.first_start().unwrap_or_else(|| default_school_start(now, config));
    let day_percent = percent(time_of_day, day_start, day.effective_end());
    let day_ring = day.in_session().then(|| RingArc {
        oval: bounds.scaled(config.school_ring_scale),
        start_angle: TWELVE_O_CLOCK_DEG,
        sweep_angle: 360.0 * day_percent,
        color: ring_color(theme.school_ring),
        stroke_width: config.ring_stroke_width,
    });

    let current = current_class(time_of_day, day.classes());
    let class_percent = current.map(|c| percent(time_of_day, c.start(), c.end()));
    let class_ring = current.zip(class_percent).map(|(class, p)| RingArc {
        oval: bounds.scaled(config.class_ring_scale),
        start_angle: TWELVE_O_CLOCK_DEG,
        sweep_angle: 360.0 * p,
        color: ring_color(class.color()),
        stroke_width: config.ring_stroke_width,
    });

    let small_label = |text: String, baseline: f32| TextLabel {
        text,
        x: center.x,
        baseline,
        size: TextSize::Small,
        color: theme.text,
    };

    let percent_label = labels_shown.then(|| {
        let text = if day.in_session() {
            let (name, p) = match (current, class_percent) {
                (Some(class), Some(p)) => (class.name(), p),
                _ => (WHOLE_DAY, day_percent),
            };
            let value = format!("{}%", (p * 100.0).round() as i32);
            combine_and_truncate(name, &value, bounds.width, config, measure)
        } else {
            NO_SCHOOL.to_string()
        };
        small_label(text, center.y - time_h)
    });

    let next_class_label = if labels_shown {
        next_class(time_of_day, day.classes()).map(|next| {
            let text = combine_and_truncate(
                next.name(),
                &clock_text(next.start()),
                bounds.width,
                config,
                measure,
            );
            small_label(text, center.y + time_h + small_h)
        })
    } else {
        None
    };

    DrawPlan {
        bounds,
        background,
        tap_indicator,
        center: center_content,
        day_ring,
        class_ring,
        percent_label,
        next_class_label,
        anti_alias: !(state.low_bit_ambient && state.ambient),
    }
}

/// Heading plus as many dishes as fit inside the class ring.
fn lunch_lines(
    lunch: &LunchMenu,
    bounds: Bounds,
    time_h: f32,
    small_h: f32,
    config: &FaceConfig,
    measure: &dyn TextMeasure,
) -> Vec<TextLabel> {
    let center = bounds.center();
    let step = (small_h * 1.5).max(1.0);
    let floor = bounds.scaled(config.class_ring_scale).bottom - config.ring_stroke_width as f32 - small_h;

    let line = |text: String, baseline: f32| TextLabel {
        text,
        x: center.x,
        baseline,
        size: TextSize::Small,
        color: config.theme.text,
    };

    let heading_baseline = center.y - time_h;
    let mut lines = vec![line(LUNCH_HEADING.to_string(), heading_baseline)];
    let mut baseline = heading_baseline + step;
    for dish in lunch.dishes() {
        if baseline > floor {
            break;
        }
        lines.push(line(truncate_line(dish, bounds.width, config, measure), baseline));
        baseline += step;
    }
    lines
}
