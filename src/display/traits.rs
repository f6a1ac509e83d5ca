/*
 *  display/traits.rs
 *
 *  SchoolRing - the day at a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Surface port the runtime presents frames on
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

use crate::display::error::DisplayError;
use crate::render::{DrawPlan, TextMeasure};

/// Surface capabilities and metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceCapabilities {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Circular panel (the corners are not visible)
    pub round: bool,

    /// Whether the panel can show more than a handful of colours while ambient
    pub low_bit_ambient: bool,
}

/// Where finished frames go.
///
/// The runtime owns exactly one surface and calls it from its own task only,
/// so implementations need no interior locking.
pub trait FaceSurface: Send {
    fn capabilities(&self) -> SurfaceCapabilities;

    /// Fonts used to lay labels out; must match what `present` draws with.
    fn measure(&self) -> &dyn TextMeasure;

    /// Draws `plan` and pushes it to the panel.
    fn present(&mut self, plan: &DrawPlan) -> Result<(), DisplayError>;
}
