/*
 *  display/error.rs
 *
 *  SchoolRing - the day at a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display error types
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

use std::fmt;
use std::error::Error;

/// Unified error type for all display operations
#[derive(Debug)]
pub enum DisplayError {
    /// Invalid configuration
    InvalidConfiguration(String),

    /// Frame does not match the surface it is presented on
    BufferSizeMismatch { expected: (u32, u32), actual: (u32, u32) },

    /// Writing a frame snapshot failed
    Io(std::io::Error),
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayError::InvalidConfiguration(msg) =>
                write!(f, "Invalid configuration: {}", msg),
            DisplayError::BufferSizeMismatch { expected, actual } =>
                write!(f, "Frame size mismatch: expected {}x{}, got {}x{}",
                    expected.0, expected.1, actual.0, actual.1),
            DisplayError::Io(err) =>
                write!(f, "Snapshot I/O error: {}", err),
        }
    }
}

impl Error for DisplayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DisplayError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DisplayError {
    fn from(err: std::io::Error) -> Self {
        DisplayError::Io(err)
    }
}

impl From<core::convert::Infallible> for DisplayError {
    fn from(err: core::convert::Infallible) -> Self {
        match err {}
    }
}
