/*
 *  engine.rs
 *
 *  SchoolRing - the day at a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Face state machine: lifecycle events in, actions out
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

use log::{debug, info};

use crate::config::FaceConfig;
use crate::lunch::LunchMenu;
use crate::render::{tap_radius, Bounds, DisplayState};
use crate::schedule::SchoolDay;
use crate::token::AuthToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapKind {
    /// finger down
    Touch,
    /// finger went somewhere else, gesture abandoned
    TouchCancel,
    /// finger lifted, completing a tap
    Tap,
}

/// Side effects the runtime performs on the engine's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Render and present a frame.
    Redraw,
    /// Redraw now and arm the tick for the next boundary, replacing any
    /// pending tick.
    StartTick,
    StopTick,
    /// Continue the tick chain after a firing.
    ArmTick,
    FetchSchedule(AuthToken),
    /// Arm the schedule poll one interval out, replacing any pending one.
    ArmSchedulePoll,
    FetchLunch,
    ArmLunchPoll,
    AcquireToken,
    Teardown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Active,
    TornDown,
}

/// Owns everything the face knows. Every handler is synchronous and
/// returns the actions it needs; nothing here touches timers or I/O.
#[derive(Debug)]
pub struct FaceEngine {
    config: FaceConfig,
    phase: Phase,
    display: DisplayState,
    token: Option<AuthToken>,
    day: SchoolDay,
    lunch: LunchMenu,
    tick_running: bool,
}

impl FaceEngine {
    pub fn new(config: FaceConfig) -> Self {
        let day = SchoolDay::empty(config.default_school_end);
        Self {
            config,
            phase: Phase::Created,
            display: DisplayState::default(),
            token: None,
            day,
            lunch: LunchMenu::default(),
            tick_running: false,
        }
    }

    pub fn config(&self) -> &FaceConfig { &self.config }
    pub fn display_state(&self) -> &DisplayState { &self.display }
    pub fn school_day(&self) -> &SchoolDay { &self.day }
    pub fn lunch(&self) -> &LunchMenu { &self.lunch }
    pub fn token(&self) -> Option<&AuthToken> { self.token.as_ref() }
    pub fn tick_running(&self) -> bool { self.tick_running }

    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    pub fn is_torn_down(&self) -> bool {
        self.phase == Phase::TornDown
    }

    /// Starts token acquisition and both polls; the schedule poll only
    /// goes out if a token is already held.
    pub fn activate(&mut self) -> Vec<Action> {
        if self.phase != Phase::Created {
            return Vec::new();
        }
        info!("Face activated");
        self.phase = Phase::Active;

        let mut actions = vec![Action::AcquireToken];
        actions.extend(self.schedule_poll());
        actions.extend(self.lunch_poll());
        actions.extend(self.refresh());
        actions
    }

    pub fn deactivate(&mut self) -> Vec<Action> {
        if self.phase == Phase::TornDown {
            return Vec::new();
        }
        info!("Face deactivated");
        self.phase = Phase::TornDown;
        self.tick_running = false;
        vec![Action::Teardown]
    }

    pub fn set_visible(&mut self, visible: bool) -> Vec<Action> {
        if self.is_torn_down() {
            return Vec::new();
        }
        self.display.visible = visible;
        self.refresh()
    }

    pub fn enter_ambient(&mut self, ambient: bool) -> Vec<Action> {
        if self.is_torn_down() {
            return Vec::new();
        }
        debug!("ambient: {}", ambient);
        self.display.ambient = ambient;
        self.refresh()
    }

    pub fn properties_changed(&mut self, low_bit_ambient: bool, burn_in_protection: bool) -> Vec<Action> {
        if self.is_torn_down() {
            return Vec::new();
        }
        self.display.low_bit_ambient = low_bit_ambient;
        self.display.burn_in_protection = burn_in_protection;
        self.redraw_if_visible()
    }

    pub fn bounds_changed(&mut self, bounds: Bounds, is_round: bool) -> Vec<Action> {
        if self.is_torn_down() {
            return Vec::new();
        }
        self.display.bounds = bounds;
        self.display.is_round = is_round;
        self.redraw_if_visible()
    }

    /// Touch inside the tap region shows the indicator; a completed tap
    /// hides it and, inside the region, toggles the lunch view.
    pub fn tap(&mut self, x: i32, y: i32, kind: TapKind) -> Vec<Action> {
        if self.is_torn_down() {
            return Vec::new();
        }
        let inside = self.within_tap_region(x, y);
        match kind {
            TapKind::Touch => {
                if inside {
                    self.display.tap_indicator_visible = true;
                }
            }
            TapKind::TouchCancel => self.display.tap_indicator_visible = false,
            TapKind::Tap => {
                self.display.tap_indicator_visible = false;
                if inside {
                    self.display.lunch_view_active = !self.display.lunch_view_active;
                    debug!("lunch view: {}", self.display.lunch_view_active);
                }
            }
        }
        self.redraw_if_visible()
    }

    fn within_tap_region(&self, x: i32, y: i32) -> bool {
        let center = self.display.bounds.center();
        let radius = tap_radius(self.display.bounds, self.config.tap_indicator_scale);
        let (dx, dy) = (x as f32 - center.x, y as f32 - center.y);
        dx * dx + dy * dy <= radius * radius
    }

    /// The platform's once-a-minute tick.
    pub fn time_tick(&mut self) -> Vec<Action> {
        if self.is_active() { vec![Action::Redraw] } else { Vec::new() }
    }

    pub fn time_zone_changed(&mut self) -> Vec<Action> {
        self.redraw_if_visible()
    }

    pub fn schedule_poll_due(&mut self) -> Vec<Action> {
        self.schedule_poll()
    }

    pub fn lunch_poll_due(&mut self) -> Vec<Action> {
        self.lunch_poll()
    }

    /// The tick re-checks its run condition on every firing.
    pub fn tick_due(&mut self) -> Vec<Action> {
        if !self.is_active() || !self.tick_running {
            return Vec::new();
        }
        if self.tick_wanted() {
            vec![Action::Redraw, Action::ArmTick]
        } else {
            self.tick_running = false;
            Vec::new()
        }
    }

    /// A token from discovery or a push: store it and poll straight away.
    pub fn install_token(&mut self, token: AuthToken) -> Vec<Action> {
        if self.is_torn_down() {
            return Vec::new();
        }
        if self.token.as_ref() == Some(&token) {
            debug!("token unchanged, polling anyway");
        } else {
            info!("Token installed");
        }
        self.token = Some(token);
        self.schedule_poll()
    }

    pub fn apply_schedule(&mut self, day: SchoolDay) -> Vec<Action> {
        if !self.is_active() {
            return Vec::new();
        }
        self.day = day;
        self.redraw_if_visible()
    }

    pub fn apply_lunch(&mut self, lunch: LunchMenu) -> Vec<Action> {
        if !self.is_active() {
            return Vec::new();
        }
        self.lunch = lunch;
        self.redraw_if_visible()
    }

    fn schedule_poll(&self) -> Vec<Action> {
        if !self.is_active() {
            return Vec::new();
        }
        match self.token.clone() {
            Some(token) => vec![Action::FetchSchedule(token), Action::ArmSchedulePoll],
            None => {
                debug!("No token, schedule poll not armed");
                Vec::new()
            }
        }
    }

    fn lunch_poll(&self) -> Vec<Action> {
        if !self.is_active() {
            return Vec::new();
        }
        vec![Action::FetchLunch, Action::ArmLunchPoll]
    }

    fn tick_wanted(&self) -> bool {
        self.display.visible && !self.display.ambient
    }

    /// Brings the tick in line with visibility/ambient and asks for a frame.
    fn refresh(&mut self) -> Vec<Action> {
        if !self.is_active() {
            return Vec::new();
        }
        match (self.tick_wanted(), self.tick_running) {
            (true, false) => {
                self.tick_running = true;
                vec![Action::StartTick]
            }
            (false, true) => {
                self.tick_running = false;
                let mut actions = vec![Action::StopTick];
                actions.extend(self.redraw_if_visible());
                actions
            }
            _ => self.redraw_if_visible(),
        }
    }

    fn redraw_if_visible(&self) -> Vec<Action> {
        if self.is_active() && self.display.visible {
            vec![Action::Redraw]
        } else {
            Vec::new()
        }
    }
}
