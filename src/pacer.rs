/*
 *  pacer.rs
 *
 *  LS020 - S65 panel driver
 *	(c) 2020-26 Stuart Hunter
 *
 *	Flush tick rate limiting
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
use std::time::{Duration, Instant};

use log::warn;

pub const DEFAULT_FPS: u32 = 60;
pub const MIN_FPS: u32 = 1;
pub const MAX_FPS: u32 = 120;

/// Rate used when the requested one is out of range
pub const FALLBACK_FPS: u32 = 40;

/// Requested refresh rate, or the fallback with a warning when outside
/// `MIN_FPS..=MAX_FPS`
pub fn resolve_fps(requested: u32) -> u32 {
    if (MIN_FPS..=MAX_FPS).contains(&requested) {
        requested
    } else {
        warn!("Invalid fps {}, using {}", requested, FALLBACK_FPS);
        FALLBACK_FPS
    }
}

#[derive(Debug)]
pub struct Pacer {
    next_deadline: Instant,
    frame: Duration,
}

// SPI at 30MHz moves a full frame in ~13ms, 60fps leaves headroom
impl Pacer {
    pub fn new(target_fps: u32) -> Self {
        Self { next_deadline: Instant::now(), frame: frame_period(target_fps) }
    }

    pub fn frame(&self) -> Duration {
        self.frame
    }

    /// Returns true if we should flush now; if true, it also schedules the next deadline.
    #[inline]
    pub fn should_flush(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.next_deadline {
            self.next_deadline = now + self.frame;
            true
        } else {
            false
        }
    }

    /// Time left before the next flush is due
    pub fn until_next(&self) -> Duration {
        self.next_deadline.saturating_duration_since(Instant::now())
    }
}

fn frame_period(fps: u32) -> Duration {
    Duration::from_micros((1_000_000u32 / resolve_fps(fps)) as u64)
}
