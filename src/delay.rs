use embedded_hal::delay::DelayNs;

use crate::board::CustomBoard;

/// Blocking delay sleeping on a board's sleep timer.
///
/// Durations are rounded up to whole ticks, so a delay never ends early.
pub struct Delay<'a, B> {
    board: &'a B,
}

impl<'a, B: CustomBoard> Delay<'a, B> {
    /// Create a delay on `board`.
    pub const fn new(board: &'a B) -> Self {
        Self { board }
    }

    fn ticks_for(&self, ns: u32) -> i64 {
        let ns = i64::from(ns);
        let ticks = self.board.ns_to_ticks(ns);
        if self.board.ticks_to_ns(ticks) < ns {
            ticks + 1
        } else {
            ticks
        }
    }
}

impl<B: CustomBoard> DelayNs for Delay<'_, B> {
    fn delay_ns(&mut self, ns: u32) {
        let ticks = self.ticks_for(ns);
        if ticks > 0 {
            self.board.sleep_ticks(ticks);
        }
    }
}
