/*
 *  lib.rs
 *
 *  SchoolRing - the day at a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  School day clock face engine
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

pub mod config;
pub mod display;
pub mod engine;
pub mod error;
pub mod host;
pub mod lunch;
pub mod progress;
pub mod provider;
pub mod render;
pub mod runtime;
pub mod schedule;
pub mod scheduler;
pub mod token;

pub use config::FaceConfig;
pub use engine::{Action, FaceEngine, TapKind};
pub use error::FaceError;
pub use runtime::{Clock, FaceEvent, FaceHandle, FaceRuntime, SystemClock};
