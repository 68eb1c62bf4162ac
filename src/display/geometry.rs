/*
 *  display/geometry.rs
 *
 *  LS020 - S65 panel driver
 *  (c) 2020-26 Stuart Hunter
 *
 *  Panel dimensions and the inclusive rectangle used for damage tracking
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

use embedded_graphics::geometry::{Point, Size};
use embedded_graphics::primitives::Rectangle;

/// Panel width in the native landscape orientation
pub const WIDTH: u16 = 176;

/// Panel height in the native landscape orientation
pub const HEIGHT: u16 = 132;

/// Pixels in one frame, independent of orientation
pub const FRAME_PIXELS: usize = WIDTH as usize * HEIGHT as usize;

/// Bytes on the wire for one full frame (RGB565, two bytes per pixel)
pub const FRAME_BYTES: usize = FRAME_PIXELS * 2;

/// Inclusive pixel rectangle `(x0, y0)..=(x1, y1)` in logical coordinates.
///
/// Unlike `embedded_graphics::primitives::Rectangle` this keeps the
/// panel's min/max bound form, which is what the dirty tracker unions
/// and what the addressing registers take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x0: u16,
    pub y0: u16,
    pub x1: u16,
    pub y1: u16,
}

impl Rect {
    pub const fn new(x0: u16, y0: u16, x1: u16, y1: u16) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Rectangle from an origin and an extent; `None` for an empty extent.
    pub fn from_origin(x: u16, y: u16, width: u16, height: u16) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self {
            x0: x,
            y0: y,
            x1: x.saturating_add(width - 1),
            y1: y.saturating_add(height - 1),
        })
    }

    /// The whole frame for the given logical size
    pub fn full(size: Size) -> Self {
        Self {
            x0: 0,
            y0: 0,
            x1: (size.width.max(1) - 1) as u16,
            y1: (size.height.max(1) - 1) as u16,
        }
    }

    /// Clip an embedded-graphics rectangle to the frame; `None` when nothing
    /// of it lands on the panel.
    pub fn from_rectangle(area: &Rectangle, bounds: Size) -> Option<Self> {
        let clipped = area.intersection(&Rectangle::new(Point::zero(), bounds));
        let bottom_right = clipped.bottom_right()?;
        Some(Self {
            x0: clipped.top_left.x as u16,
            y0: clipped.top_left.y as u16,
            x1: bottom_right.x as u16,
            y1: bottom_right.y as u16,
        })
    }

    pub fn to_rectangle(&self) -> Rectangle {
        Rectangle::new(
            Point::new(self.x0 as i32, self.y0 as i32),
            Size::new(self.width() as u32, self.height() as u32),
        )
    }

    #[inline]
    pub fn width(&self) -> u16 {
        self.x1 - self.x0 + 1
    }

    #[inline]
    pub fn height(&self) -> u16 {
        self.y1 - self.y0 + 1
    }

    #[inline]
    pub fn area(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// Bytes needed to ship this rectangle big-endian RGB565
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.area() * 2
    }

    /// min <= max on both axes
    #[inline]
    pub fn is_ordered(&self) -> bool {
        self.x0 <= self.x1 && self.y0 <= self.y1
    }

    /// True when min <= max on both axes and the max bounds sit inside `size`
    pub fn fits(&self, size: Size) -> bool {
        self.is_ordered()
            && (self.x1 as u32) < size.width
            && (self.y1 as u32) < size.height
    }

    pub fn is_full(&self, size: Size) -> bool {
        *self == Self::full(size)
    }

    pub fn contains(&self, x: u16, y: u16) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    /// Smallest rectangle covering both
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Pull every bound inside `size`
    pub fn clamp_to(&self, size: Size) -> Rect {
        let max_x = (size.width.max(1) - 1) as u16;
        let max_y = (size.height.max(1) - 1) as u16;
        Rect {
            x0: self.x0.min(max_x),
            y0: self.y0.min(max_y),
            x1: self.x1.min(max_x),
            y1: self.y1.min(max_y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANDSCAPE: Size = Size::new(WIDTH as u32, HEIGHT as u32);

    #[test]
    fn test_frame_constants() {
        assert_eq!(FRAME_PIXELS, 23_232);
        assert_eq!(FRAME_BYTES, 46_464);
    }

    #[test]
    fn test_from_origin_extents() {
        let r = Rect::from_origin(10, 20, 5, 3).unwrap();
        assert_eq!(r, Rect::new(10, 20, 14, 22));
        assert_eq!(r.width(), 5);
        assert_eq!(r.height(), 3);
        assert_eq!(r.area(), 15);
        assert_eq!(r.byte_len(), 30);

        assert!(Rect::from_origin(0, 0, 0, 4).is_none());
        assert!(Rect::from_origin(0, 0, 4, 0).is_none());
    }

    #[test]
    fn test_full_frame() {
        let full = Rect::full(LANDSCAPE);
        assert_eq!(full, Rect::new(0, 0, 175, 131));
        assert_eq!(full.byte_len(), FRAME_BYTES);
        assert!(full.is_full(LANDSCAPE));
        assert!(full.fits(LANDSCAPE));
        assert!(!full.fits(Size::new(132, 176)));
    }

    #[test]
    fn test_union_and_clamp() {
        let a = Rect::new(5, 5, 10, 10);
        let b = Rect::new(0, 8, 7, 200);
        assert_eq!(a.union(&b), Rect::new(0, 5, 10, 200));
        assert_eq!(a.union(&b).clamp_to(LANDSCAPE), Rect::new(0, 5, 10, 131));
    }

    #[test]
    fn test_from_rectangle_clips() {
        let area = Rectangle::new(Point::new(-4, 120), Size::new(10, 40));
        let r = Rect::from_rectangle(&area, LANDSCAPE).unwrap();
        assert_eq!(r, Rect::new(0, 120, 5, 131));

        let outside = Rectangle::new(Point::new(200, 0), Size::new(10, 10));
        assert!(Rect::from_rectangle(&outside, LANDSCAPE).is_none());
    }

    #[test]
    fn test_to_rectangle() {
        let r = Rect::new(3, 4, 7, 9);
        let rect = r.to_rectangle();
        assert_eq!(rect.top_left, Point::new(3, 4));
        assert_eq!(rect.size, Size::new(5, 6));
        assert_eq!(Rect::from_rectangle(&rect, LANDSCAPE), Some(r));
    }
}
