/*
 *  display/canvas.rs
 *
 *  SchoolRing - the day at a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Paints a DrawPlan with embedded-graphics primitives
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

use embedded_graphics::{
    mono_font::{
        ascii::{FONT_10X20, FONT_6X10, FONT_9X18_BOLD},
        MonoFont, MonoTextStyle,
    },
    pixelcolor::{Rgb888, RgbColor},
    prelude::*,
    primitives::{Arc, Circle, PrimitiveStyle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};
use log::{debug, trace};
use std::borrow::Cow;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use crate::display::error::DisplayError;
use crate::display::framebuffer::VarFrameBuf;
use crate::display::traits::{FaceSurface, SurfaceCapabilities};
use crate::render::{CenterContent, CircleShape, DrawPlan, RingArc, TextLabel, TextMeasure, TextSize};

/// Luma above which a colour stays lit on a low-bit ambient panel.
const LOW_BIT_THRESHOLD: u32 = 96;

/// The mono fonts are ASCII only; an ellipsis is painted as three dots.
fn ascii_glyphs(text: &str) -> Cow<'_, str> {
    if text.contains('…') {
        Cow::Owned(text.replace('…', "..."))
    } else {
        Cow::Borrowed(text)
    }
}

/// Font table shared by layout and painting.
#[derive(Debug, Clone, Copy)]
pub struct MonoTextMeasure {
    small: &'static MonoFont<'static>,
    time: &'static MonoFont<'static>,
    time_round: &'static MonoFont<'static>,
}

impl Default for MonoTextMeasure {
    fn default() -> Self {
        Self {
            small: &FONT_6X10,
            time: &FONT_9X18_BOLD,
            time_round: &FONT_10X20,
        }
    }
}

impl MonoTextMeasure {
    pub fn font(&self, size: TextSize) -> &'static MonoFont<'static> {
        match size {
            TextSize::Small => self.small,
            TextSize::Time => self.time,
            TextSize::TimeRound => self.time_round,
        }
    }
}

impl TextMeasure for MonoTextMeasure {
    fn text_width(&self, text: &str, size: TextSize) -> u32 {
        let font = self.font(size);
        let n = ascii_glyphs(text).chars().count() as u32;
        if n == 0 {
            return 0;
        }
        font.character_size.width * n + font.character_spacing * (n - 1)
    }

    fn line_height(&self, size: TextSize) -> u32 {
        self.font(size).character_size.height
    }
}

/// Collapses a colour to black or white; used when the panel is in
/// low-bit ambient and cannot show intermediate shades.
fn low_bit(color: Rgb888) -> Rgb888 {
    let luma = (color.r() as u32 * 299 + color.g() as u32 * 587 + color.b() as u32 * 114) / 1000;
    if luma > LOW_BIT_THRESHOLD { Rgb888::WHITE } else { Rgb888::BLACK }
}

fn to_point(x: f32, y: f32) -> Point {
    Point::new(x.round() as i32, y.round() as i32)
}

/// Draws `plan` back to front onto `target`.
pub fn paint<D>(plan: &DrawPlan, fonts: &MonoTextMeasure, target: &mut D) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888> + OriginDimensions,
{
    let tint = |c: Rgb888| if plan.anti_alias { c } else { low_bit(c) };

    target.clear(plan.background)?;

    if let Some(circle) = plan.tap_indicator.as_ref() {
        draw_disc(target, circle, tint(circle.color))?;
    }

    match &plan.center {
        CenterContent::Time(label) => draw_label(target, label, fonts, tint(label.color))?,
        CenterContent::Lunch(lines) => {
            for line in lines {
                draw_label(target, line, fonts, tint(line.color))?;
            }
        }
    }

    for ring in [plan.day_ring.as_ref(), plan.class_ring.as_ref()].into_iter().flatten() {
        draw_ring(target, ring, tint(ring.color))?;
    }

    for label in [plan.percent_label.as_ref(), plan.next_class_label.as_ref()].into_iter().flatten() {
        draw_label(target, label, fonts, tint(label.color))?;
    }
    Ok(())
}

fn draw_disc<D>(target: &mut D, circle: &CircleShape, color: Rgb888) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    let diameter = (circle.radius * 2.0).round().max(0.0) as u32;
    Circle::with_center(to_point(circle.center.x, circle.center.y), diameter)
        .into_styled(PrimitiveStyle::with_fill(color))
        .draw(target)
}

/// Arcs are circular, so a non-square oval is inscribed by its short side.
fn draw_ring<D>(target: &mut D, ring: &RingArc, color: Rgb888) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    if ring.sweep_angle <= 0.0 {
        return Ok(());
    }
    let diameter = ring.oval.width().min(ring.oval.height()).max(0.0);
    let cx = (ring.oval.left + ring.oval.right) / 2.0;
    let cy = (ring.oval.top + ring.oval.bottom) / 2.0;
    let top_left = to_point(cx - diameter / 2.0, cy - diameter / 2.0);

    Arc::new(top_left, diameter.round() as u32, ring.start_angle.deg(), ring.sweep_angle.deg())
        .into_styled(PrimitiveStyle::with_stroke(color, ring.stroke_width))
        .draw(target)
}

fn draw_label<D>(target: &mut D, label: &TextLabel, fonts: &MonoTextMeasure, color: Rgb888) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    let style = MonoTextStyle::new(fonts.font(label.size), color);
    let layout = TextStyleBuilder::new()
        .alignment(Alignment::Center)
        .baseline(Baseline::Alphabetic)
        .build();
    Text::with_text_style(&ascii_glyphs(&label.text), to_point(label.x, label.baseline), style, layout)
        .draw(target)?;
    Ok(())
}

/// In-memory surface: paints into an RGB framebuffer and optionally writes
/// each frame out as a PPM snapshot.
pub struct FrameCanvas {
    frame: VarFrameBuf<Rgb888>,
    fonts: MonoTextMeasure,
    round: bool,
    snapshot: Option<PathBuf>,
    frames: u64,
}

impl FrameCanvas {
    pub fn new(width: u32, height: u32, round: bool) -> Result<Self, DisplayError> {
        if width == 0 || height == 0 {
            return Err(DisplayError::InvalidConfiguration(format!(
                "canvas must not be empty ({}x{})",
                width, height
            )));
        }
        Ok(Self {
            frame: VarFrameBuf::new(width, height, Rgb888::BLACK),
            fonts: MonoTextMeasure::default(),
            round,
            snapshot: None,
            frames: 0,
        })
    }

    pub fn with_snapshot(mut self, path: Option<PathBuf>) -> Self {
        self.snapshot = path;
        self
    }

    pub fn frame(&self) -> &VarFrameBuf<Rgb888> {
        &self.frame
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames
    }

    fn write_snapshot(&self, path: &PathBuf) -> Result<(), DisplayError> {
        let mut out = BufWriter::new(File::create(path)?);
        self.frame.write_ppm(&mut out)?;
        trace!("frame {} written to {}", self.frames, path.display());
        Ok(())
    }
}

impl FaceSurface for FrameCanvas {
    fn capabilities(&self) -> SurfaceCapabilities {
        SurfaceCapabilities {
            width: self.frame.width() as u32,
            height: self.frame.height() as u32,
            round: self.round,
            low_bit_ambient: false,
        }
    }

    fn measure(&self) -> &dyn TextMeasure {
        &self.fonts
    }

    fn present(&mut self, plan: &DrawPlan) -> Result<(), DisplayError> {
        let ours = (self.frame.width() as u32, self.frame.height() as u32);
        let theirs = (plan.bounds.width, plan.bounds.height);
        if ours != theirs {
            return Err(DisplayError::BufferSizeMismatch { expected: ours, actual: theirs });
        }

        paint(plan, &self.fonts, &mut self.frame)?;
        self.frames += 1;
        debug!("frame {} presented", self.frames);

        if let Some(path) = self.snapshot.as_ref() {
            self.write_snapshot(path)?;
        }
        Ok(())
    }
}
