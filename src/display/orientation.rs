/*
 *  display/orientation.rs
 *
 *  LS020 - S65 panel driver
 *  (c) 2020-26 Stuart Hunter
 *
 *  Logical rectangle to controller addressing window, per orientation
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

use embedded_graphics::geometry::Size;

use crate::display::error::DisplayError;
use crate::display::geometry::{Rect, HEIGHT, WIDTH};

/// Last address on the controller's short axis (window registers 0x08/0x09)
const A_MAX: u8 = (HEIGHT - 1) as u8;

/// Last address on the controller's long axis (window registers 0x0A/0x0B)
const B_MAX: u8 = (WIDTH - 1) as u8;

/// Panel rotation.
///
/// 0° and 180° present the native 176x132 landscape frame, 90° and 270°
/// a 132x176 portrait frame. Each case is its own hand-derived register
/// mapping, not a rotation formula.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Orientation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

/// Values for the six addressing registers of one window.
///
/// `a_*` land in 0x08/0x09, `b_*` in 0x0A/0x0B, the cursor in 0x06/0x07.
/// A start larger than its end is how the controller scans an axis
/// backwards, so the fields are not ordered pairs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub a_start: u8,
    pub a_end: u8,
    pub b_start: u8,
    pub b_end: u8,
    pub cursor_a: u8,
    pub cursor_b: u8,
}

impl Window {
    /// (register, value) pairs in the order the controller expects them
    pub fn registers(&self) -> [(u8, u8); 6] {
        [
            (0x08, self.a_start),
            (0x09, self.a_end),
            (0x0A, self.b_start),
            (0x0B, self.b_end),
            (0x06, self.cursor_a),
            (0x07, self.cursor_b),
        ]
    }
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::Deg0,
        Orientation::Deg90,
        Orientation::Deg180,
        Orientation::Deg270,
    ];

    /// Module-parameter style index, only the low two bits count
    pub fn from_index(index: u8) -> Self {
        match index & 3 {
            1 => Orientation::Deg90,
            2 => Orientation::Deg180,
            3 => Orientation::Deg270,
            _ => Orientation::Deg0,
        }
    }

    pub fn from_degrees(degrees: u16) -> Result<Self, DisplayError> {
        match degrees {
            0 => Ok(Orientation::Deg0),
            90 => Ok(Orientation::Deg90),
            180 => Ok(Orientation::Deg180),
            270 => Ok(Orientation::Deg270),
            _ => Err(DisplayError::InvalidRotation(degrees)),
        }
    }

    pub fn index(self) -> u8 {
        match self {
            Orientation::Deg0 => 0,
            Orientation::Deg90 => 1,
            Orientation::Deg180 => 2,
            Orientation::Deg270 => 3,
        }
    }

    pub fn degrees(self) -> u16 {
        self.index() as u16 * 90
    }

    pub fn is_portrait(self) -> bool {
        matches!(self, Orientation::Deg90 | Orientation::Deg270)
    }

    /// Width and height of the frame as the application sees it
    pub fn logical_size(self) -> Size {
        if self.is_portrait() {
            Size::new(HEIGHT as u32, WIDTH as u32)
        } else {
            Size::new(WIDTH as u32, HEIGHT as u32)
        }
    }

    /// Scan-direction values for registers 0x01 and 0x05
    pub fn scan_registers(self) -> (u8, u8) {
        match self {
            Orientation::Deg0 => (0x40, 0x04),
            Orientation::Deg90 => (0x00, 0x00),
            Orientation::Deg180 => (0x80, 0x04),
            Orientation::Deg270 => (0xC0, 0x00),
        }
    }

    /// Addressing window for a logical rectangle.
    ///
    /// Rectangles that do not fit the logical frame are rejected rather
    /// than truncated into the 8-bit registers.
    pub fn window(self, rect: Rect) -> Result<Window, DisplayError> {
        let size = self.logical_size();
        if !rect.fits(size) {
            return Err(DisplayError::OutOfBounds {
                rect,
                width: size.width,
                height: size.height,
            });
        }

        // fits() bounds every coordinate below 176
        let (x0, y0, x1, y1) = (rect.x0 as u8, rect.y0 as u8, rect.x1 as u8, rect.y1 as u8);

        let window = match self {
            Orientation::Deg0 => Window {
                a_start: y0,
                a_end: y1,
                b_start: B_MAX - x0,
                b_end: B_MAX - x1,
                cursor_a: y0,
                cursor_b: B_MAX - x0,
            },
            Orientation::Deg90 => Window {
                a_start: x0,
                a_end: x1,
                b_start: y0,
                b_end: y1,
                cursor_a: x0,
                cursor_b: y0,
            },
            Orientation::Deg180 => Window {
                a_start: A_MAX - y0,
                a_end: A_MAX - y1,
                b_start: x0,
                b_end: x1,
                cursor_a: A_MAX - y0,
                cursor_b: x0,
            },
            Orientation::Deg270 => Window {
                a_start: A_MAX - x0,
                a_end: A_MAX - x1,
                b_start: B_MAX - y0,
                b_end: B_MAX - y1,
                cursor_a: A_MAX - x0,
                cursor_b: B_MAX - y0,
            },
        };

        Ok(window)
    }

    /// Inverse of [`Orientation::window`]
    pub fn logical(self, window: &Window) -> Rect {
        let (a0, a1) = (window.a_start as u16, window.a_end as u16);
        let (b0, b1) = (window.b_start as u16, window.b_end as u16);
        let (a_max, b_max) = (A_MAX as u16, B_MAX as u16);

        match self {
            Orientation::Deg0 => Rect::new(b_max - b0, a0, b_max - b1, a1),
            Orientation::Deg90 => Rect::new(a0, b0, a1, b1),
            Orientation::Deg180 => Rect::new(b0, a_max - a0, b1, a_max - a1),
            Orientation::Deg270 => Rect::new(a_max - a0, b_max - b0, a_max - a1, b_max - b1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_frame_deg0_matches_setup_window() {
        let full = Rect::full(Orientation::Deg0.logical_size());
        let w = Orientation::Deg0.window(full).unwrap();
        assert_eq!(
            w.registers(),
            [(0x08, 0x00), (0x09, 0x83), (0x0A, 0xAF), (0x0B, 0x00), (0x06, 0x00), (0x07, 0xAF)]
        );
    }

    #[test]
    fn test_explicit_assignments() {
        let r = Rect::new(10, 20, 30, 40);

        let w = Orientation::Deg0.window(r).unwrap();
        assert_eq!((w.a_start, w.a_end, w.b_start, w.b_end), (20, 40, 165, 145));
        assert_eq!((w.cursor_a, w.cursor_b), (20, 165));

        let w = Orientation::Deg90.window(r).unwrap();
        assert_eq!((w.a_start, w.a_end, w.b_start, w.b_end), (10, 30, 20, 40));
        assert_eq!((w.cursor_a, w.cursor_b), (10, 20));

        let w = Orientation::Deg180.window(r).unwrap();
        assert_eq!((w.a_start, w.a_end, w.b_start, w.b_end), (111, 91, 10, 30));
        assert_eq!((w.cursor_a, w.cursor_b), (111, 10));

        let w = Orientation::Deg270.window(r).unwrap();
        assert_eq!((w.a_start, w.a_end, w.b_start, w.b_end), (121, 101, 155, 135));
        assert_eq!((w.cursor_a, w.cursor_b), (121, 155));
    }

    #[test]
    fn test_window_round_trips_for_every_orientation() {
        for orientation in Orientation::ALL {
            let size = orientation.logical_size();
            let (w, h) = (size.width as u16, size.height as u16);
            let samples = [
                Rect::full(size),
                Rect::new(0, 0, 0, 0),
                Rect::new(w - 1, h - 1, w - 1, h - 1),
                Rect::new(3, 7, 100, h - 1),
                Rect::new(w / 2, 1, w - 2, h / 2),
            ];
            for rect in samples {
                let window = orientation.window(rect).unwrap();
                assert_eq!(orientation.logical(&window), rect, "{:?} {:?}", orientation, rect);
            }
        }
    }

    #[test]
    fn test_out_of_range_rejected() {
        // x = 140 is valid landscape but past the portrait width
        let r = Rect::new(140, 0, 150, 10);
        assert!(Orientation::Deg0.window(r).is_ok());
        assert!(matches!(
            Orientation::Deg270.window(r),
            Err(DisplayError::OutOfBounds { width: 132, height: 176, .. })
        ));

        let inverted = Rect::new(10, 0, 5, 0);
        assert!(Orientation::Deg90.window(inverted).is_err());
    }

    #[test]
    fn test_degrees_and_index() {
        for orientation in Orientation::ALL {
            assert_eq!(Orientation::from_degrees(orientation.degrees()).unwrap(), orientation);
            assert_eq!(Orientation::from_index(orientation.index()), orientation);
        }
        assert_eq!(Orientation::from_index(7), Orientation::Deg270);
        assert!(matches!(Orientation::from_degrees(45), Err(DisplayError::InvalidRotation(45))));
    }

    #[test]
    fn test_scan_registers() {
        assert_eq!(Orientation::Deg0.scan_registers(), (0x40, 0x04));
        assert_eq!(Orientation::Deg90.scan_registers(), (0x00, 0x00));
        assert_eq!(Orientation::Deg180.scan_registers(), (0x80, 0x04));
        assert_eq!(Orientation::Deg270.scan_registers(), (0xC0, 0x00));
    }
}
