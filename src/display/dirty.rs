/*
 *  display/dirty.rs
 *
 *  LS020 - S65 panel driver
 *  (c) 2020-26 Stuart Hunter
 *
 *  Explicit damage marking: the pending dirty rectangle
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

use std::sync::{Mutex, MutexGuard, PoisonError};

use embedded_graphics::geometry::Size;
use log::{trace, warn};

use crate::display::geometry::Rect;

#[derive(Debug)]
struct DirtyState {
    bounds: Size,
    /// `Some` while damage is pending
    rect: Option<Rect>,
}

/// Bounding box of everything reported as damaged since the last
/// successful flush.
///
/// One mutex guards the four bounds and the pending flag. It is held for
/// the comparison only, never across a bus transfer, so reporters never
/// wait on the panel.
#[derive(Debug)]
pub struct DirtyTracker {
    state: Mutex<DirtyState>,
}

impl DirtyTracker {
    pub fn new(bounds: Size) -> Self {
        Self {
            state: Mutex::new(DirtyState { bounds, rect: None }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DirtyState> {
        // the state is plain data, a panicked holder cannot leave it torn
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Report a written area by origin and extent; empty areas are ignored
    pub fn mark(&self, x: u16, y: u16, width: u16, height: u16) {
        if let Some(rect) = Rect::from_origin(x, y, width, height) {
            self.mark_rect(rect);
        }
    }

    /// Union `rect` into the pending rectangle, then clamp to the frame.
    /// Inverted rectangles are dropped.
    pub fn mark_rect(&self, rect: Rect) {
        if !rect.is_ordered() {
            warn!("Ignoring inverted damage ({},{})-({},{})", rect.x0, rect.y0, rect.x1, rect.y1);
            return;
        }
        let mut state = self.lock();
        let merged = match state.rect {
            Some(pending) => pending.union(&rect),
            None => rect,
        };
        let clamped = merged.clamp_to(state.bounds);
        trace!("dirty += ({},{})-({},{}) -> ({},{})-({},{})",
               rect.x0, rect.y0, rect.x1, rect.y1,
               clamped.x0, clamped.y0, clamped.x1, clamped.y1);
        state.rect = Some(clamped);
    }

    /// Current pending rectangle without clearing it
    pub fn pending(&self) -> Option<Rect> {
        self.lock().rect
    }

    pub fn is_pending(&self) -> bool {
        self.lock().rect.is_some()
    }

    /// Absorb and clear the pending rectangle.
    ///
    /// Reports arriving after this belong to the next cycle.
    pub fn take(&self) -> Option<Rect> {
        self.lock().rect.take()
    }

    /// Put back a region whose flush failed so the next cycle retries it
    pub fn restore(&self, rect: Rect) {
        self.mark_rect(rect);
    }

    pub fn bounds(&self) -> Size {
        self.lock().bounds
    }

    /// New frame geometry (orientation change); the whole frame is damaged
    pub fn reset_bounds(&self, bounds: Size) {
        let mut state = self.lock();
        state.bounds = bounds;
        state.rect = Some(Rect::full(bounds));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const LANDSCAPE: Size = Size::new(176, 132);

    #[test]
    fn test_first_mark_initialises() {
        let t = DirtyTracker::new(LANDSCAPE);
        assert!(!t.is_pending());
        t.mark(10, 20, 5, 5);
        assert_eq!(t.pending(), Some(Rect::new(10, 20, 14, 24)));
    }

    #[test]
    fn test_marks_accumulate_union() {
        let t = DirtyTracker::new(LANDSCAPE);
        let marks = [(10, 20, 5, 5), (0, 30, 2, 2), (100, 0, 1, 1), (50, 50, 10, 10)];
        let mut expected: Option<Rect> = None;
        for (x, y, w, h) in marks {
            t.mark(x, y, w, h);
            let r = Rect::from_origin(x, y, w, h).unwrap();
            expected = Some(expected.map_or(r, |e| e.union(&r)));
        }
        assert_eq!(t.pending(), expected);
        assert_eq!(t.pending(), Some(Rect::new(0, 0, 100, 59)));
    }

    #[test]
    fn test_marks_clamped_to_bounds() {
        let t = DirtyTracker::new(LANDSCAPE);
        t.mark(170, 120, 40, 40);
        assert_eq!(t.pending(), Some(Rect::new(170, 120, 175, 131)));

        t.mark(0, 0, u16::MAX, 1);
        assert_eq!(t.pending(), Some(Rect::new(0, 0, 175, 131)));
    }

    #[test]
    fn test_zero_area_ignored() {
        let t = DirtyTracker::new(LANDSCAPE);
        t.mark(5, 5, 0, 10);
        assert!(!t.is_pending());
    }

    #[test]
    fn test_take_clears_and_restore_reinstates() {
        let t = DirtyTracker::new(LANDSCAPE);
        t.mark(1, 1, 2, 2);
        let taken = t.take().unwrap();
        assert!(!t.is_pending());
        assert_eq!(t.take(), None);

        // a report that raced with the failed cycle survives the restore
        t.mark(40, 40, 1, 1);
        t.restore(taken);
        assert_eq!(t.pending(), Some(Rect::new(1, 1, 40, 40)));
    }

    #[test]
    fn test_reset_bounds_marks_full_frame() {
        let t = DirtyTracker::new(LANDSCAPE);
        t.reset_bounds(Size::new(132, 176));
        assert_eq!(t.bounds(), Size::new(132, 176));
        assert_eq!(t.pending(), Some(Rect::new(0, 0, 131, 175)));
    }

    #[test]
    fn test_inverted_mark_ignored() {
        let t = DirtyTracker::new(LANDSCAPE);
        t.mark_rect(Rect::new(10, 0, 5, 0));
        assert_eq!(t.pending(), None);

        t.mark_rect(Rect::new(1, 1, 2, 2));
        t.mark_rect(Rect::new(3, 9, 3, 4));
        assert_eq!(t.pending(), Some(Rect::new(1, 1, 2, 2)));
    }

    #[test]
    fn test_concurrent_marks_are_not_lost() {
        let t = Arc::new(DirtyTracker::new(LANDSCAPE));
        let handles: Vec<_> = (0..4u16)
            .map(|i| {
                let t = Arc::clone(&t);
                thread::spawn(move || {
                    for j in 0..25u16 {
                        t.mark(i * 40 + j, j, 1, 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(t.pending(), Some(Rect::new(0, 0, 144, 24)));
    }
}
