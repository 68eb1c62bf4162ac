/*
 *  display/mod.rs
 *
 *  LS020 - S65 panel driver
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display subsystem - frame memory, damage tracking and the panel engine
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

// Core trait definitions
pub mod traits;
pub mod error;

// Frame memory and damage
pub mod geometry;
pub mod orientation;
pub mod framebuffer;
pub mod dirty;
pub mod shadow;
pub mod buffers;

// Panel command sequences
pub mod sequencer;

// Display drivers
pub mod drivers;

// Re-exports for convenience
pub use traits::{DisplayDriver, DisplayCapabilities};
pub use error::DisplayError;
pub use geometry::{Rect, WIDTH, HEIGHT, FRAME_BYTES, FRAME_PIXELS};
pub use orientation::{Orientation, Window};
pub use framebuffer::{Canvas, FrameBuffer};
pub use dirty::DirtyTracker;
pub use shadow::ShadowCopy;
pub use buffers::{Allocator, SystemAllocator, Tier, TransferBuffers};
pub use drivers::ls020::{DamageStrategy, EngineSettings, EngineState, Ls020, UpdateOutcome};
