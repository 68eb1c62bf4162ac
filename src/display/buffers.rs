/*
 *  display/buffers.rs
 *
 *  LS020 - S65 panel driver
 *  (c) 2020-26 Stuart Hunter
 *
 *  Transfer buffer tiers and the partial-update size ceiling
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

use embedded_graphics::geometry::Size;
use log::{debug, info, warn};

use crate::display::geometry::{Rect, FRAME_BYTES};

/// Default share of the full frame, in percent, above which a partial
/// update is sent as a full frame instead
pub const DEFAULT_PARTIAL_CEILING_PCT: u8 = 25;

/// Source of transfer memory.
///
/// Every variant may fail; a failure only moves the engine down a tier.
pub trait Allocator: Send {
    /// Long-lived memory the bus can DMA from directly
    fn coherent(&mut self, len: usize) -> Option<Vec<u8>>;

    /// Long-lived ordinary memory
    fn regular(&mut self, len: usize) -> Option<Vec<u8>>;

    /// Short-lived memory for a single transfer; must not block
    fn transient(&mut self, len: usize) -> Option<Vec<u8>>;
}

/// Heap-backed allocator using fallible reservations.
///
/// spidev copies every transfer into its own DMA bounce buffer, so on
/// Linux the coherent tier is plain heap memory kept for the device's
/// lifetime.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

fn try_zeroed(len: usize) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).ok()?;
    buf.resize(len, 0);
    Some(buf)
}

impl Allocator for SystemAllocator {
    fn coherent(&mut self, len: usize) -> Option<Vec<u8>> {
        try_zeroed(len)
    }

    fn regular(&mut self, len: usize) -> Option<Vec<u8>> {
        try_zeroed(len)
    }

    fn transient(&mut self, len: usize) -> Option<Vec<u8>> {
        try_zeroed(len)
    }
}

/// Buffer acquisition strategies, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Dma,
    Preallocated,
    Transient,
    PixelByPixel,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Dma => "dma",
            Tier::Preallocated => "preallocated",
            Tier::Transient => "transient",
            Tier::PixelByPixel => "pixel-by-pixel",
        };
        f.write_str(name)
    }
}

/// The order tiers are tried in on every update
pub const TIER_ORDER: [Tier; 4] = [Tier::Dma, Tier::Preallocated, Tier::Transient, Tier::PixelByPixel];

/// Memory handed out for one transfer
#[derive(Debug)]
pub enum Staging<'a> {
    Dma(&'a mut [u8]),
    Preallocated(&'a mut [u8]),
    /// Freed when the staging is dropped after the transfer
    Transient(Vec<u8>),
    /// No buffer at all, one 2-byte write per pixel
    PixelByPixel,
}

impl Staging<'_> {
    pub fn tier(&self) -> Tier {
        match self {
            Staging::Dma(_) => Tier::Dma,
            Staging::Preallocated(_) => Tier::Preallocated,
            Staging::Transient(_) => Tier::Transient,
            Staging::PixelByPixel => Tier::PixelByPixel,
        }
    }

    /// Byte buffer to pack into, `None` on the slow path
    pub fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        match self {
            Staging::Dma(buf) | Staging::Preallocated(buf) => Some(buf),
            Staging::Transient(buf) => Some(buf.as_mut_slice()),
            Staging::PixelByPixel => None,
        }
    }
}

/// Owns the long-lived transfer buffers and picks a tier per update
pub struct TransferBuffers {
    dma: Option<Vec<u8>>,
    regular: Option<Vec<u8>>,
    allocator: Box<dyn Allocator>,
    ceiling_pct: u8,
}

impl fmt::Debug for TransferBuffers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferBuffers")
            .field("dma", &self.dma.as_ref().map(Vec::len))
            .field("regular", &self.regular.as_ref().map(Vec::len))
            .field("ceiling_pct", &self.ceiling_pct)
            .finish()
    }
}

fn fits(buf: &Option<Vec<u8>>, len: usize) -> bool {
    buf.as_ref().is_some_and(|b| b.len() >= len)
}

impl TransferBuffers {
    /// Try the coherent full-frame buffer first, a regular one if that
    /// fails; with neither, updates allocate per transfer.
    pub fn attach(mut allocator: Box<dyn Allocator>, ceiling_pct: u8) -> Self {
        let dma = allocator.coherent(FRAME_BYTES);
        let regular = match dma {
            Some(_) => {
                info!("DMA transfer buffer allocated ({} bytes)", FRAME_BYTES);
                None
            }
            None => {
                warn!("Couldn't allocate DMA transfer buffer, trying regular memory");
                let regular = allocator.regular(FRAME_BYTES);
                match regular {
                    Some(_) => info!("SPI buffer allocated for optimized performance"),
                    None => warn!("Couldn't allocate SPI buffer, will use temporary buffers"),
                }
                regular
            }
        };

        Self {
            dma,
            regular,
            allocator,
            ceiling_pct: clamp_ceiling(ceiling_pct),
        }
    }

    pub fn ceiling_pct(&self) -> u8 {
        self.ceiling_pct
    }

    pub fn set_ceiling_pct(&mut self, pct: u8) {
        self.ceiling_pct = clamp_ceiling(pct);
    }

    /// Best long-lived tier available without allocating
    pub fn resident_tier(&self) -> Option<Tier> {
        if self.dma.is_some() {
            Some(Tier::Dma)
        } else if self.regular.is_some() {
            Some(Tier::Preallocated)
        } else {
            None
        }
    }

    /// Region actually worth sending.
    ///
    /// Past the ceiling the per-window overhead of a partial update is no
    /// longer worth saving, so the whole frame goes instead.
    pub fn apply_ceiling(&self, region: Rect, frame: Size) -> Rect {
        let limit = FRAME_BYTES * self.ceiling_pct as usize / 100;
        if region.byte_len() > limit {
            debug!("Region {} bytes over ceiling {} bytes, sending full frame",
                   region.byte_len(), limit);
            Rect::full(frame)
        } else {
            region
        }
    }

    /// Staging memory for `len` bytes, walking [`TIER_ORDER`] until one
    /// tier can serve; the last tier always can.
    pub fn acquire(&mut self, len: usize) -> Staging<'_> {
        let len = len.min(FRAME_BYTES);
        let mut transient = None;

        let tier = TIER_ORDER
            .into_iter()
            .find(|tier| match tier {
                Tier::Dma => fits(&self.dma, len),
                Tier::Preallocated => fits(&self.regular, len),
                Tier::Transient => {
                    transient = self.allocator.transient(len);
                    if transient.is_none() {
                        warn!("Failed to allocate {} byte transfer buffer, using slow mode", len);
                    }
                    transient.is_some()
                }
                Tier::PixelByPixel => true,
            })
            .unwrap_or(Tier::PixelByPixel);

        match (tier, transient) {
            (Tier::Dma, _) => match self.dma.as_deref_mut() {
                Some(buf) => Staging::Dma(&mut buf[..len]),
                None => Staging::PixelByPixel,
            },
            (Tier::Preallocated, _) => match self.regular.as_deref_mut() {
                Some(buf) => Staging::Preallocated(&mut buf[..len]),
                None => Staging::PixelByPixel,
            },
            (Tier::Transient, Some(mut buf)) => {
                buf.truncate(len);
                Staging::Transient(buf)
            }
            _ => Staging::PixelByPixel,
        }
    }
}

fn clamp_ceiling(pct: u8) -> u8 {
    pct.clamp(1, 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::drivers::mock::FlakyAllocator;

    const LANDSCAPE: Size = Size::new(176, 132);

    #[test]
    fn test_dma_tier_preferred() {
        let mut buffers = TransferBuffers::attach(Box::new(SystemAllocator), 25);
        assert_eq!(buffers.resident_tier(), Some(Tier::Dma));
        let staging = buffers.acquire(100);
        assert_eq!(staging.tier(), Tier::Dma);
    }

    #[test]
    fn test_dma_failure_falls_back_to_regular() {
        let alloc = FlakyAllocator::new().fail_coherent();
        let mut buffers = TransferBuffers::attach(Box::new(alloc), 25);
        assert_eq!(buffers.resident_tier(), Some(Tier::Preallocated));
        let mut staging = buffers.acquire(FRAME_BYTES);
        assert_eq!(staging.tier(), Tier::Preallocated);
        assert_eq!(staging.bytes_mut().map(|b| b.len()), Some(FRAME_BYTES));
    }

    #[test]
    fn test_both_resident_failures_use_transient() {
        let alloc = FlakyAllocator::new().fail_coherent().fail_regular();
        let stats = alloc.stats();
        let mut buffers = TransferBuffers::attach(Box::new(alloc), 25);
        assert_eq!(buffers.resident_tier(), None);

        let mut staging = buffers.acquire(64);
        assert_eq!(staging.tier(), Tier::Transient);
        assert_eq!(staging.bytes_mut().map(|b| b.len()), Some(64));
        assert_eq!(stats.lock().unwrap().transient_requests, vec![64]);
    }

    #[test]
    fn test_transient_failure_uses_pixel_path() {
        let alloc = FlakyAllocator::new().fail_coherent().fail_regular().fail_transient();
        let mut buffers = TransferBuffers::attach(Box::new(alloc), 25);
        let mut staging = buffers.acquire(64);
        assert_eq!(staging.tier(), Tier::PixelByPixel);
        assert!(staging.bytes_mut().is_none());
    }

    #[test]
    fn test_transient_sized_for_region_and_capped() {
        let alloc = FlakyAllocator::new().fail_coherent().fail_regular();
        let stats = alloc.stats();
        let mut buffers = TransferBuffers::attach(Box::new(alloc), 25);
        drop(buffers.acquire(FRAME_BYTES * 3));
        assert_eq!(stats.lock().unwrap().transient_requests, vec![FRAME_BYTES]);
    }

    #[test]
    fn test_ceiling_default_quarter() {
        let buffers = TransferBuffers::attach(Box::new(SystemAllocator), DEFAULT_PARTIAL_CEILING_PCT);
        // 11616 bytes = 5808 pixels is exactly a quarter and stays partial
        let at_limit = Rect::from_origin(0, 0, 88, 66).unwrap();
        assert_eq!(at_limit.byte_len(), FRAME_BYTES / 4);
        assert_eq!(buffers.apply_ceiling(at_limit, LANDSCAPE), at_limit);

        let over = Rect::from_origin(0, 0, 89, 66).unwrap();
        assert_eq!(buffers.apply_ceiling(over, LANDSCAPE), Rect::new(0, 0, 175, 131));
    }

    #[test]
    fn test_ceiling_configurable() {
        let mut buffers = TransferBuffers::attach(Box::new(SystemAllocator), 25);
        let half = Rect::from_origin(0, 0, 88, 132).unwrap();
        assert_eq!(buffers.apply_ceiling(half, LANDSCAPE), Rect::full(LANDSCAPE));

        buffers.set_ceiling_pct(50);
        assert_eq!(buffers.apply_ceiling(half, LANDSCAPE), half);

        buffers.set_ceiling_pct(0);
        assert_eq!(buffers.ceiling_pct(), 1);
    }

    #[test]
    fn test_tier_order_is_fixed() {
        assert_eq!(TIER_ORDER, [Tier::Dma, Tier::Preallocated, Tier::Transient, Tier::PixelByPixel]);
        assert_eq!(Tier::PixelByPixel.to_string(), "pixel-by-pixel");
    }
}
