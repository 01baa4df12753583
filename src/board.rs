//! Board facade binding the tick timer, the sleep timer and the UART together.

use crate::timer::{NANOS_PER_SECOND, SharedState, SleepTimer, TickTimer, Timer, WaitForInterrupt};
use crate::usart::GenericUart;

/// Tick length assumed while no tick rate is configured.
pub const DEFAULT_NS_PER_TICK: i64 = 1_000_000;

/// Timekeeping and console hooks a runtime needs from a board.
pub trait CustomBoard {
    /// Console UART.
    type Uart: GenericUart;

    /// Block for about `d` ticks.
    fn sleep_ticks(&self, d: i64);

    /// Ticks elapsed since the tick timer was started.
    fn ticks(&self) -> i64;

    /// Convert a tick count to nanoseconds.
    fn ticks_to_ns(&self, ticks: i64) -> i64;

    /// Convert nanoseconds to whole ticks, truncating.
    fn ns_to_ticks(&self, ns: i64) -> i64;

    /// Console UART, if the board has one.
    fn uart(&self) -> Option<&Self::Uart>;
}

/// Timekeeping built from two hardware timers.
///
/// Exactly one sleep may be in progress at a time. The interrupt handlers of the two timers
/// must call [`Board::on_tick`] and [`Board::on_wakeup`].
pub struct Board<'a, T, S, U, W> {
    state: &'a SharedState,
    tick: TickTimer<T>,
    sleep: SleepTimer<S>,
    uart: U,
    wait: W,
}

impl<'a, T, S, U, W> Board<'a, T, S, U, W> {
    /// Bind the timers and the UART to `state`.
    pub const fn new(
        state: &'a SharedState,
        tick_timer: T,
        sleep_timer: S,
        uart: U,
        wait: W,
    ) -> Self {
        Self {
            state,
            tick: TickTimer::new(tick_timer),
            sleep: SleepTimer::new(sleep_timer),
            uart,
            wait,
        }
    }

    /// Ticks counted so far.
    pub fn ticks_now(&self) -> u64 {
        self.state.ticks.get()
    }

    /// Length of one tick, [`DEFAULT_NS_PER_TICK`] until the tick timer is configured.
    pub fn ns_per_tick(&self) -> i64 {
        match self.tick.rate() {
            0 => DEFAULT_NS_PER_TICK,
            rate => (NANOS_PER_SECOND / u64::from(rate)).max(1) as i64,
        }
    }

    /// Convert a tick count to nanoseconds.
    pub fn ticks_to_ns(&self, ticks: i64) -> i64 {
        ticks.saturating_mul(self.ns_per_tick())
    }

    /// Convert nanoseconds to whole ticks, truncating.
    pub fn ns_to_ticks(&self, ns: i64) -> i64 {
        ns / self.ns_per_tick()
    }

    /// Console UART.
    pub const fn uart(&self) -> &U {
        &self.uart
    }
}

impl<T: Timer, S, U, W> Board<'_, T, S, U, W> {
    /// Start the tick timer at `rate_hz` ticks per second.
    pub fn start_ticks(&self, rate_hz: u32) {
        self.tick.configure(rate_hz);
        self.tick.start();
    }

    /// Tick timer interrupt handler.
    pub fn on_tick(&self) {
        self.tick.on_tick(&self.state.ticks);
    }
}

impl<T, S: Timer, U, W> Board<'_, T, S, U, W> {
    /// Sleep timer interrupt handler.
    pub fn on_wakeup(&self) {
        self.sleep.on_wakeup(&self.state.wakeup);
    }
}

impl<T, S: Timer, U, W: WaitForInterrupt> Board<'_, T, S, U, W> {
    /// Block for about `ticks` ticks, returning only after that much time has passed.
    ///
    /// Sleeps longer than the sleep timer can count in one go are split into several
    /// one-shots. There is no timeout.
    pub fn sleep_ticks(&self, ticks: i64) {
        let wakeup = &self.state.wakeup;
        let mut remaining = self.ticks_to_ns(ticks);

        loop {
            // Lower the flag before arming so a stale wakeup can't end this sleep.
            wakeup.clear();
            remaining = self.sleep.arm(remaining);

            while !wakeup.is_set() {
                self.wait.wait(|| wakeup.is_set());
            }

            if remaining <= 0 {
                break;
            }
        }
    }
}

impl<T, S, U, W> CustomBoard for Board<'_, T, S, U, W>
where
    S: Timer,
    U: GenericUart,
    W: WaitForInterrupt,
{
    type Uart = U;

    fn sleep_ticks(&self, d: i64) {
        Board::sleep_ticks(self, d);
    }

    fn ticks(&self) -> i64 {
        self.ticks_now() as i64
    }

    fn ticks_to_ns(&self, ticks: i64) -> i64 {
        Board::ticks_to_ns(self, ticks)
    }

    fn ns_to_ticks(&self, ns: i64) -> i64 {
        Board::ns_to_ticks(self, ns)
    }

    fn uart(&self) -> Option<&U> {
        Some(&self.uart)
    }
}
