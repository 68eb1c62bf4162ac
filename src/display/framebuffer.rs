/*
 *  display/framebuffer.rs
 *
 *  LS020 - S65 panel driver
 *  (c) 2020-26 Stuart Hunter
 *
 *  Shared RGB565 frame memory and the embedded-graphics canvas over it
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

use core::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use embedded_graphics::geometry::{OriginDimensions, Point, Size};
use embedded_graphics::pixelcolor::raw::RawU16;
use embedded_graphics::pixelcolor::{IntoStorage, Rgb565};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

use crate::display::dirty::DirtyTracker;
use crate::display::error::DisplayError;
use crate::display::geometry::{Rect, FRAME_BYTES, FRAME_PIXELS};
use crate::display::orientation::Orientation;

/// Wire order of one pixel: high byte first
#[inline]
pub fn pack_pixel(pixel: u16) -> [u8; 2] {
    pixel.to_be_bytes()
}

#[inline]
pub fn unpack_pixel(bytes: [u8; 2]) -> u16 {
    u16::from_be_bytes(bytes)
}

/// 8-bit RGB down to RGB565
pub fn rgb_to_rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
}

/// Frame memory owned by the driver and shared with whoever draws into it.
///
/// Pixels are atomics so a writer may keep drawing while the engine scans
/// or packs the frame; a pixel that changes mid-scan is picked up either
/// by this cycle or the next one. The pixel count never changes, only the
/// logical stride when the orientation flips between landscape and
/// portrait.
#[derive(Debug)]
pub struct FrameBuffer {
    pixels: Box<[AtomicU16]>,
    portrait: AtomicBool,
}

impl FrameBuffer {
    /// Zeroed frame memory; fails instead of aborting when the heap is short
    pub fn allocate(orientation: Orientation) -> Result<Self, DisplayError> {
        let mut pixels = Vec::new();
        pixels.try_reserve_exact(FRAME_PIXELS).map_err(|e| {
            DisplayError::InitializationFailed(format!("Couldn't allocate video memory: {}", e))
        })?;
        pixels.extend((0..FRAME_PIXELS).map(|_| AtomicU16::new(0)));

        Ok(Self {
            pixels: pixels.into_boxed_slice(),
            portrait: AtomicBool::new(orientation.is_portrait()),
        })
    }

    /// Logical (width, height) for the current orientation
    pub fn size(&self) -> Size {
        if self.portrait.load(Ordering::Acquire) {
            Orientation::Deg90.logical_size()
        } else {
            Orientation::Deg0.logical_size()
        }
    }

    /// Pixels per logical row
    pub fn stride(&self) -> usize {
        self.size().width as usize
    }

    pub(crate) fn set_orientation(&self, orientation: Orientation) {
        self.portrait.store(orientation.is_portrait(), Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    #[inline]
    pub fn pixel_at(&self, index: usize) -> u16 {
        self.pixels[index].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_pixel_at(&self, index: usize, value: u16) {
        self.pixels[index].store(value, Ordering::Relaxed);
    }

    pub fn pixel(&self, x: u16, y: u16) -> Option<u16> {
        self.index(x, y).map(|i| self.pixel_at(i))
    }

    /// Returns false when (x, y) is outside the logical frame
    pub fn set_pixel(&self, x: u16, y: u16, value: u16) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.set_pixel_at(i, value);
                true
            }
            None => false,
        }
    }

    pub fn fill(&self, value: u16) {
        for p in self.pixels.iter() {
            p.store(value, Ordering::Relaxed);
        }
    }

    /// Copy of the whole frame, row-major
    pub fn snapshot(&self) -> Vec<u16> {
        self.pixels.iter().map(|p| p.load(Ordering::Relaxed)).collect()
    }

    /// Pack `rect` row-major into `out` in wire order; returns bytes written.
    ///
    /// Stops early if `out` is too short for the whole rectangle.
    pub fn pack_region(&self, rect: Rect, out: &mut [u8]) -> usize {
        let stride = self.stride();
        let mut chunks = out.chunks_exact_mut(2);
        let mut written = 0;

        for y in rect.y0..=rect.y1 {
            let row = y as usize * stride;
            for x in rect.x0..=rect.x1 {
                let Some(slot) = chunks.next() else {
                    return written;
                };
                slot.copy_from_slice(&pack_pixel(self.pixel_at(row + x as usize)));
                written += 2;
            }
        }
        written
    }

    /// Write raw bytes at a byte offset, pixels in native byte order.
    ///
    /// This is the untracked path: nothing is marked dirty, the next update
    /// finds the change by diffing or falls back to a full frame. Writes
    /// running past the end are truncated; returns the bytes taken.
    pub fn write_bytes(&self, offset: usize, bytes: &[u8]) -> Result<usize, DisplayError> {
        if offset >= FRAME_BYTES && !bytes.is_empty() {
            return Err(DisplayError::BufferSizeMismatch {
                expected: FRAME_BYTES,
                actual: offset.saturating_add(bytes.len()),
            });
        }
        let count = bytes.len().min(FRAME_BYTES.saturating_sub(offset));

        let mut pos = offset;
        let mut rest = &bytes[..count];

        // leading odd byte lands in the second half of a pixel
        if pos % 2 == 1 {
            if let Some((&b, tail)) = rest.split_first() {
                self.patch_byte(pos, b);
                pos += 1;
                rest = tail;
            }
        }

        let mut pairs = rest.chunks_exact(2);
        for pair in &mut pairs {
            self.set_pixel_at(pos / 2, u16::from_ne_bytes([pair[0], pair[1]]));
            pos += 2;
        }
        if let [b] = pairs.remainder() {
            self.patch_byte(pos, *b);
        }

        Ok(count)
    }

    /// Read raw bytes at a byte offset, native byte order; returns bytes read
    pub fn read_bytes(&self, offset: usize, buf: &mut [u8]) -> usize {
        let count = buf.len().min(FRAME_BYTES.saturating_sub(offset));
        for (i, out) in buf[..count].iter_mut().enumerate() {
            let pos = offset + i;
            *out = self.pixel_at(pos / 2).to_ne_bytes()[pos % 2];
        }
        count
    }

    fn patch_byte(&self, pos: usize, byte: u8) {
        let mut ne = self.pixel_at(pos / 2).to_ne_bytes();
        ne[pos % 2] = byte;
        self.set_pixel_at(pos / 2, u16::from_ne_bytes(ne));
    }

    #[inline]
    fn index(&self, x: u16, y: u16) -> Option<usize> {
        let size = self.size();
        if (x as u32) < size.width && (y as u32) < size.height {
            Some(y as usize * size.width as usize + x as usize)
        } else {
            None
        }
    }
}

/// embedded-graphics target that draws into the shared frame and reports
/// every touched rectangle to the dirty tracker.
///
/// Clones are cheap and can be handed to other threads.
#[derive(Debug, Clone)]
pub struct Canvas {
    frame: Arc<FrameBuffer>,
    dirty: Arc<DirtyTracker>,
}

impl Canvas {
    pub fn new(frame: Arc<FrameBuffer>, dirty: Arc<DirtyTracker>) -> Self {
        Self { frame, dirty }
    }

    pub fn frame(&self) -> &Arc<FrameBuffer> {
        &self.frame
    }

    /// Read back a pixel as a colour
    pub fn get_pixel(&self, point: Point) -> Option<Rgb565> {
        if point.x < 0 || point.y < 0 {
            return None;
        }
        self.frame
            .pixel(point.x as u16, point.y as u16)
            .map(|raw| Rgb565::from(RawU16::new(raw)))
    }

    fn clip(&self, area: &Rectangle) -> Option<Rect> {
        Rect::from_rectangle(area, self.frame.size())
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        self.frame.size()
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let size = self.frame.size();
        let mut touched: Option<Rect> = None;

        for Pixel(p, color) in pixels {
            if p.x < 0 || p.y < 0 || p.x as u32 >= size.width || p.y as u32 >= size.height {
                continue;
            }
            let (x, y) = (p.x as u16, p.y as u16);
            self.frame.set_pixel(x, y, color.into_storage());
            let dot = Rect::new(x, y, x, y);
            touched = Some(touched.map_or(dot, |t| t.union(&dot)));
        }

        // one report per batch keeps the tracker lock off the per-pixel path
        if let Some(rect) = touched {
            self.dirty.mark_rect(rect);
        }
        Ok(())
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        let Some(clipped) = self.clip(area) else {
            return Ok(());
        };

        for (p, color) in area.points().zip(colors) {
            if p.x >= 0 && p.y >= 0 && clipped.contains(p.x as u16, p.y as u16) {
                self.frame.set_pixel(p.x as u16, p.y as u16, color.into_storage());
            }
        }

        self.dirty.mark_rect(clipped);
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let Some(clipped) = self.clip(area) else {
            return Ok(());
        };

        let raw = color.into_storage();
        for y in clipped.y0..=clipped.y1 {
            for x in clipped.x0..=clipped.x1 {
                self.frame.set_pixel(x, y, raw);
            }
        }

        self.dirty.mark_rect(clipped);
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.frame.fill(color.into_storage());
        self.dirty.mark_rect(Rect::full(self.frame.size()));
        Ok(())
    }
}
