/*
 *  display/drivers/ls020.rs
 *
 *  LS020 - S65 panel driver
 *  (c) 2020-26 Stuart Hunter
 *
 *  LS020 176x132 RGB565 panel: attach sequence and incremental updates
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

use std::sync::Arc;

use display_interface::WriteOnlyDataCommand;
use embedded_graphics::geometry::Size;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};

use crate::display::buffers::{Allocator, Tier, TransferBuffers, DEFAULT_PARTIAL_CEILING_PCT};
use crate::display::dirty::DirtyTracker;
use crate::display::error::DisplayError;
use crate::display::framebuffer::{Canvas, FrameBuffer};
use crate::display::geometry::{Rect, FRAME_BYTES, HEIGHT, WIDTH};
use crate::display::orientation::Orientation;
use crate::display::sequencer;
use crate::display::shadow::ShadowCopy;
use crate::display::traits::{DisplayCapabilities, DisplayDriver};
use crate::pacer::{resolve_fps, DEFAULT_FPS, MAX_FPS};

/// How an update cycle finds out what changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DamageStrategy {
    /// Compare the frame against a shadow of what was last sent; also
    /// catches writes that never reported a rectangle
    #[default]
    ShadowDiff,
    /// Trust the rectangles reported through [`Canvas`] and `update`
    Marks,
}

/// Knobs resolved from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub orientation: Orientation,
    pub fps: u32,
    pub partial_update: bool,
    pub damage: DamageStrategy,
    pub partial_ceiling_pct: u8,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            orientation: Orientation::Deg0,
            fps: DEFAULT_FPS,
            partial_update: true,
            damage: DamageStrategy::ShadowDiff,
            partial_ceiling_pct: DEFAULT_PARTIAL_CEILING_PCT,
        }
    }
}

impl EngineSettings {
    /// Out-of-range values pulled back to something the panel can run with
    pub fn sanitized(self) -> Self {
        Self {
            fps: resolve_fps(self.fps),
            partial_ceiling_pct: self.partial_ceiling_pct.clamp(1, 100),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    WindowProgramming,
    Transferring,
}

/// What one call to [`Ls020::update`] did on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Nothing changed, nothing was sent
    Unchanged,
    Sent {
        region: Rect,
        tier: Tier,
        window_programmed: bool,
        bytes: usize,
    },
}

/// LS020 panel on a command/data transport.
///
/// Owns the frame memory, the shadow copy and the transfer buffers. The
/// frame and the dirty tracker are shared with [`Canvas`] handles, which
/// may draw from other threads while an update runs.
pub struct Ls020<DI, RST, D> {
    interface: DI,
    rst: RST,
    delay: D,

    frame: Arc<FrameBuffer>,
    dirty: Arc<DirtyTracker>,
    shadow: Option<ShadowCopy>,
    buffers: TransferBuffers,

    orientation: Orientation,
    partial_update: bool,
    fps: u32,
    window_cached: bool,
    state: EngineState,

    capabilities: DisplayCapabilities,
}

impl<DI, RST, D> Ls020<DI, RST, D>
where
    DI: WriteOnlyDataCommand,
    RST: OutputPin,
    D: DelayNs,
{
    /// Allocate frame memory and buffers, then reset, initialise and
    /// rotate the panel.
    ///
    /// Any failure drops everything acquired so far and returns the error.
    pub fn attach(
        interface: DI,
        rst: RST,
        delay: D,
        settings: EngineSettings,
        allocator: Box<dyn Allocator>,
    ) -> Result<Self, DisplayError> {
        let settings = settings.sanitized();
        let orientation = settings.orientation;

        let frame = Arc::new(FrameBuffer::allocate(orientation)?);
        info!("Video memory allocated: {} bytes", FRAME_BYTES);

        let dirty = Arc::new(DirtyTracker::new(orientation.logical_size()));
        let buffers = TransferBuffers::attach(allocator, settings.partial_ceiling_pct);

        let mut partial_update = settings.partial_update;
        let shadow = match (partial_update, settings.damage) {
            (true, DamageStrategy::ShadowDiff) => match ShadowCopy::allocate() {
                Some(mut shadow) => {
                    // panel content is unknown until the first full frame lands
                    shadow.invalidate();
                    info!("Shadow buffer allocated for partial updates");
                    Some(shadow)
                }
                None => {
                    warn!("Failed to allocate shadow buffer, disabling partial updates");
                    partial_update = false;
                    None
                }
            },
            _ => None,
        };

        let mut panel = Self {
            interface,
            rst,
            delay,
            frame,
            dirty,
            shadow,
            buffers,
            orientation,
            partial_update,
            fps: settings.fps,
            window_cached: false,
            state: EngineState::Idle,
            capabilities: capabilities_for(orientation, partial_update),
        };

        panel.init_panel()?;

        info!("LS020 {}x{} attached (rotation {}°, fps {}, partial updates {}, damage {:?})",
              WIDTH, HEIGHT, orientation.degrees(), panel.fps,
              if partial_update { "enabled" } else { "disabled" }, settings.damage);

        Ok(panel)
    }

    /// Reset, init tables and scan direction
    fn init_panel(&mut self) -> Result<(), DisplayError> {
        self.window_cached = false;
        self.state = EngineState::Idle;
        if let Some(shadow) = self.shadow.as_mut() {
            shadow.invalidate();
        }

        sequencer::hard_reset(&mut self.rst, &mut self.delay)?;
        sequencer::initialize(&mut self.interface, &mut self.delay)?;
        sequencer::configure_rotation(&mut self.interface, self.orientation)
            .inspect_err(|e| error!("Failed to set rotation: {}", e))?;
        Ok(())
    }

    /// Drawing handle over the shared frame; clones freely
    pub fn canvas(&self) -> Canvas {
        Canvas::new(Arc::clone(&self.frame), Arc::clone(&self.dirty))
    }

    pub fn frame(&self) -> &Arc<FrameBuffer> {
        &self.frame
    }

    pub fn dirty(&self) -> &Arc<DirtyTracker> {
        &self.dirty
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn partial_update(&self) -> bool {
        self.partial_update
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// True while the controller still holds the full-frame window
    pub fn window_cached(&self) -> bool {
        self.window_cached
    }

    pub fn resident_tier(&self) -> Option<Tier> {
        self.buffers.resident_tier()
    }

    pub fn set_partial_ceiling_pct(&mut self, pct: u8) {
        self.buffers.set_ceiling_pct(pct);
    }

    /// Shadow pixels, for checking what the panel was last confirmed to hold
    pub fn shadow(&self) -> Option<&[u16]> {
        self.shadow.as_ref().map(ShadowCopy::pixels)
    }

    /// Rotate the panel at runtime.
    ///
    /// The frame keeps its pixels but is reinterpreted with the new row
    /// width, so the whole frame is marked and resent on the next update.
    pub fn set_orientation(&mut self, orientation: Orientation) -> Result<(), DisplayError> {
        // the window registers no longer mean what the cache thinks
        self.window_cached = false;
        sequencer::configure_rotation(&mut self.interface, orientation)?;

        self.orientation = orientation;
        self.frame.set_orientation(orientation);
        self.dirty.reset_bounds(orientation.logical_size());
        if let Some(shadow) = self.shadow.as_mut() {
            shadow.invalidate();
        }
        self.capabilities = capabilities_for(orientation, self.partial_update);
        Ok(())
    }

    /// Raw frame write at a byte offset (native-endian pixels), then an
    /// update. Nothing is marked: the change is found by diffing, or the
    /// whole frame goes when marks are the only source.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<usize, DisplayError> {
        let written = self.frame.write_bytes(offset, bytes)?;
        self.update(None)?;
        Ok(written)
    }

    /// Run one update cycle.
    ///
    /// `damage` is the rectangle an explicit write just touched, `None` for
    /// a periodic tick. With partial updates off the full frame always goes.
    /// With a shadow the diff decides and pending marks are dropped.
    /// Otherwise the pending marks decide, and an unmarked cycle sends the
    /// full frame.
    pub fn update(&mut self, damage: Option<Rect>) -> Result<UpdateOutcome, DisplayError> {
        let size = self.frame.size();
        if let Some(rect) = damage {
            if !rect.is_ordered() {
                return Err(DisplayError::OutOfBounds { rect, width: size.width, height: size.height });
            }
            self.dirty.mark_rect(rect);
        }

        let marked = self.dirty.take();

        let region = match (self.partial_update, self.shadow.as_ref()) {
            (false, _) => Some(Rect::full(size)),
            (true, Some(shadow)) => shadow.diff(&self.frame),
            (true, None) => Some(marked.unwrap_or(Rect::full(size))),
        };

        let Some(region) = region else {
            trace!("No changes detected");
            return Ok(UpdateOutcome::Unchanged);
        };

        let region = if self.partial_update {
            self.buffers.apply_ceiling(region, size)
        } else {
            region
        };

        match self.transfer(region, size) {
            Ok(outcome) => {
                self.state = EngineState::Idle;
                Ok(outcome)
            }
            Err(e) => {
                error!("Update of ({},{})-({},{}) failed: {}",
                       region.x0, region.y0, region.x1, region.y1, e);
                self.state = EngineState::Idle;
                self.window_cached = false;
                // the next cycle retries the whole region
                self.dirty.restore(region);
                Err(e)
            }
        }
    }

    fn transfer(&mut self, region: Rect, size: Size) -> Result<UpdateOutcome, DisplayError> {
        let window = self.orientation.window(region)?;
        let full = region.is_full(size);

        self.state = EngineState::WindowProgramming;
        let window_programmed = !full || !self.window_cached;
        if window_programmed {
            sequencer::program_window(&mut self.interface, &window)?;
        }
        self.window_cached = full;

        self.state = EngineState::Transferring;
        let stride = self.frame.stride();
        let mut staging = self.buffers.acquire(region.byte_len());
        let tier = staging.tier();

        let bytes = match staging.bytes_mut() {
            Some(buf) => {
                let packed = self.frame.pack_region(region, buf);
                let wire = &buf[..packed];
                sequencer::write_pixels(&mut self.interface, wire)?;
                if let Some(shadow) = self.shadow.as_mut() {
                    shadow.sync_from_wire(region, stride, wire);
                }
                packed
            }
            None => write_pixel_by_pixel(
                &mut self.interface,
                &self.frame,
                self.shadow.as_mut(),
                region,
                full,
            )?,
        };

        debug!("{} update: ({},{}) to ({},{}) [{}x{}] via {} buffer",
               if full { "Full" } else { "Partial" },
               region.x0, region.y0, region.x1, region.y1,
               region.width(), region.height(), tier);

        Ok(UpdateOutcome::Sent { region, tier, window_programmed, bytes })
    }

    /// Hand back the transport, reset line and delay
    pub fn release(self) -> (DI, RST, D) {
        (self.interface, self.rst, self.delay)
    }
}

/// One 2-byte data write per pixel, no buffer at all.
///
/// Each pixel lands in the shadow as soon as its write succeeds, so a
/// failure part way through only leaves the unsent tail for the next diff.
fn write_pixel_by_pixel<DI>(
    interface: &mut DI,
    frame: &FrameBuffer,
    mut shadow: Option<&mut ShadowCopy>,
    region: Rect,
    full: bool,
) -> Result<usize, DisplayError>
where
    DI: WriteOnlyDataCommand,
{
    debug!("Using pixel-by-pixel transfer for {}x{} region", region.width(), region.height());
    let stride = frame.stride();
    for y in region.y0..=region.y1 {
        let row = y as usize * stride;
        for x in region.x0..=region.x1 {
            let index = row + x as usize;
            let pixel = frame.pixel_at(index);
            sequencer::write_pixel(interface, pixel)?;
            if let Some(shadow) = shadow.as_deref_mut() {
                shadow.store(index, pixel);
            }
        }
    }
    if full {
        if let Some(shadow) = shadow {
            shadow.mark_fresh();
        }
    }
    Ok(region.byte_len())
}

fn capabilities_for(orientation: Orientation, partial_update: bool) -> DisplayCapabilities {
    let size = orientation.logical_size();
    DisplayCapabilities {
        width: size.width,
        height: size.height,
        bits_per_pixel: 16,
        supports_rotation: true,
        supports_partial_update: partial_update,
        max_fps: MAX_FPS,
    }
}

impl<DI, RST, D> DisplayDriver for Ls020<DI, RST, D>
where
    DI: WriteOnlyDataCommand + Send,
    RST: OutputPin + Send,
    D: DelayNs + Send,
{
    fn capabilities(&self) -> &DisplayCapabilities {
        &self.capabilities
    }

    fn init(&mut self) -> Result<(), DisplayError> {
        self.init_panel()
    }

    fn flush(&mut self) -> Result<(), DisplayError> {
        self.update(None).map(|_| ())
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        self.frame.fill(0);
        self.dirty.mark_rect(Rect::full(self.frame.size()));
        self.flush()
    }

    fn write_buffer(&mut self, buffer: &[u8]) -> Result<(), DisplayError> {
        if buffer.len() != FRAME_BYTES {
            return Err(DisplayError::BufferSizeMismatch {
                expected: FRAME_BYTES,
                actual: buffer.len(),
            });
        }
        self.write(0, buffer).map(|_| ())
    }

    fn set_rotation(&mut self, degrees: u16) -> Result<(), DisplayError> {
        self.set_orientation(Orientation::from_degrees(degrees)?)
    }
}
