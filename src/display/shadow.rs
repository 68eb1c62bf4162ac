/*
 *  display/shadow.rs
 *
 *  LS020 - S65 panel driver
 *  (c) 2020-26 Stuart Hunter
 *
 *  Shadow copy of the last transmitted frame, used to diff for damage
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

use crate::display::framebuffer::{unpack_pixel, FrameBuffer};
use crate::display::geometry::{Rect, FRAME_PIXELS};

/// What the panel was last sent, pixel for pixel.
///
/// Only written after a transfer is confirmed, so a failed transfer
/// leaves the difference in place for the next diff to find again.
#[derive(Debug)]
pub struct ShadowCopy {
    pixels: Box<[u16]>,
    /// Panel content unknown (fresh attach or rotated); diff reports the full frame
    stale: bool,
}

impl ShadowCopy {
    /// Zeroed shadow; `None` when the heap cannot spare a second frame
    pub fn allocate() -> Option<Self> {
        let mut pixels = Vec::new();
        pixels.try_reserve_exact(FRAME_PIXELS).ok()?;
        pixels.resize(FRAME_PIXELS, 0u16);
        Some(Self {
            pixels: pixels.into_boxed_slice(),
            stale: false,
        })
    }

    /// Force the next diff to cover the whole frame
    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Bounding box of every pixel that differs from `frame`.
    ///
    /// The frame may be written while this runs; a pixel changed behind the
    /// scan is caught on the next pass.
    pub fn diff(&self, frame: &FrameBuffer) -> Option<Rect> {
        let size = frame.size();
        if self.stale {
            return Some(Rect::full(size));
        }

        let (width, height) = (size.width as usize, size.height as usize);
        let mut found: Option<Rect> = None;

        for y in 0..height {
            let row = y * width;
            let differs = |x: &usize| frame.pixel_at(row + *x) != self.pixels[row + *x];

            let Some(first) = (0..width).find(differs) else {
                continue;
            };
            // a hit exists, so the reverse search cannot come back empty
            let last = (first..width).rev().find(differs).unwrap_or(first);

            let span = Rect::new(first as u16, y as u16, last as u16, y as u16);
            found = Some(found.map_or(span, |f| f.union(&span)));
        }

        found
    }

    /// Record what was just sent for `rect`: big-endian wire bytes,
    /// row-major within the rectangle
    pub fn sync_from_wire(&mut self, rect: Rect, stride: usize, wire: &[u8]) {
        let mut pairs = wire.chunks_exact(2);
        for y in rect.y0..=rect.y1 {
            let row = y as usize * stride;
            for x in rect.x0..=rect.x1 {
                match pairs.next() {
                    Some(pair) => self.pixels[row + x as usize] = unpack_pixel([pair[0], pair[1]]),
                    None => return,
                }
            }
        }
        if rect.area() == FRAME_PIXELS {
            self.stale = false;
        }
    }

    /// Record one pixel confirmed on the slow path
    #[inline]
    pub fn store(&mut self, index: usize, value: u16) {
        self.pixels[index] = value;
    }

    /// Every pixel has been stored since the last invalidate
    pub fn mark_fresh(&mut self) {
        self.stale = false;
    }

    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    /// True when every pixel matches the frame
    pub fn matches(&self, frame: &FrameBuffer) -> bool {
        self.pixels
            .iter()
            .enumerate()
            .all(|(i, &p)| frame.pixel_at(i) == p)
    }
}
