/*
 *  display/traits.rs
 *
 *  LS020 - S65 panel driver
 *  (c) 2020-26 Stuart Hunter
 *
 *  Core trait definitions for display driver abstraction
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

/// Display capabilities and metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayCapabilities {
    /// Logical width in pixels for the current rotation
    pub width: u32,

    /// Logical height in pixels for the current rotation
    pub height: u32,

    /// Bits per pixel on the wire
    pub bits_per_pixel: u8,

    /// Whether the display supports hardware rotation
    pub supports_rotation: bool,

    /// Whether updates may send a sub-rectangle of the frame
    pub supports_partial_update: bool,

    /// Maximum recommended frame rate
    pub max_fps: u32,
}

/// Minimal hardware abstraction - all display drivers must implement this trait
///
/// This trait defines the core operations that every display driver must support,
/// regardless of the specific hardware implementation.
pub trait DisplayDriver: Send {
    /// Returns the capabilities of this display
    fn capabilities(&self) -> &DisplayCapabilities;

    /// Returns the display dimensions as (width, height)
    fn dimensions(&self) -> (u32, u32) {
        let caps = self.capabilities();
        (caps.width, caps.height)
    }

    /// Initialize the display hardware
    fn init(&mut self) -> Result<(), DisplayError>;

    /// Send whatever changed since the last flush
    fn flush(&mut self) -> Result<(), DisplayError>;

    /// Clear the display to black
    fn clear(&mut self) -> Result<(), DisplayError>;

    /// Write a full raw frame (RGB565, native byte order) and flush it
    fn write_buffer(&mut self, buffer: &[u8]) -> Result<(), DisplayError>;

    /// Set display brightness (0-255)
    ///
    /// Returns an error if the display doesn't support brightness control.
    fn set_brightness(&mut self, _value: u8) -> Result<(), DisplayError> {
        Err(DisplayError::UnsupportedOperation)
    }

    /// Set display rotation (if supported)
    ///
    /// Rotation angle should be 0, 90, 180, or 270 degrees.
    fn set_rotation(&mut self, degrees: u16) -> Result<(), DisplayError> {
        if !self.capabilities().supports_rotation {
            return Err(DisplayError::UnsupportedOperation);
        }
        if degrees != 0 && degrees != 90 && degrees != 180 && degrees != 270 {
            return Err(DisplayError::InvalidRotation(degrees));
        }
        // Default implementation returns error; drivers should override
        Err(DisplayError::UnsupportedOperation)
    }
}
