/*
 *  display/error.rs
 *
 *  LS020 - S65 panel driver
 *  (c) 2020-26 Stuart Hunter
 *
 *  Unified error type for the panel and its update engine
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

use crate::display::geometry::Rect;

/// Unified error type for all panel operations
#[derive(Debug)]
pub enum DisplayError {
    /// Reset, init tables or rotation setup failed during attach
    InitializationFailed(String),

    /// SPI device could not be opened or configured
    SpiError(String),

    /// GPIO line error (reset or command/data select)
    GpioError(String),

    /// Operation not supported by this panel
    UnsupportedOperation,

    /// Invalid rotation angle
    InvalidRotation(u16),

    /// Rectangle outside the logical frame for the current orientation
    OutOfBounds { rect: Rect, width: u32, height: u32 },

    /// Raw buffer write does not fit the frame
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Command or data transfer on the bus failed
    InterfaceError(display_interface::DisplayError),
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayError::InitializationFailed(msg) =>
                write!(f, "Display initialization failed: {}", msg),
            DisplayError::SpiError(msg) =>
                write!(f, "SPI communication error: {}", msg),
            DisplayError::GpioError(msg) =>
                write!(f, "GPIO error: {}", msg),
            DisplayError::UnsupportedOperation =>
                write!(f, "Operation not supported by this display"),
            DisplayError::InvalidRotation(degrees) =>
                write!(f, "Invalid rotation angle: {} (must be 0, 90, 180, or 270)", degrees),
            DisplayError::OutOfBounds { rect, width, height } =>
                write!(f, "Rectangle ({},{})-({},{}) outside {}x{} frame",
                       rect.x0, rect.y0, rect.x1, rect.y1, width, height),
            DisplayError::BufferSizeMismatch { expected, actual } =>
                write!(f, "Buffer size mismatch: expected {} bytes, got {}", expected, actual),
            DisplayError::InterfaceError(err) =>
                write!(f, "Display interface error: {:?}", err),
        }
    }
}

impl Error for DisplayError {
    // display_interface::DisplayError doesn't implement std::error::Error
    // so we can't provide it as a source
}

impl From<display_interface::DisplayError> for DisplayError {
    fn from(err: display_interface::DisplayError) -> Self {
        DisplayError::InterfaceError(err)
    }
}

impl DisplayError {
    /// True for failures of the command/data transport itself
    pub fn is_transport(&self) -> bool {
        matches!(self, DisplayError::InterfaceError(_))
    }
}
