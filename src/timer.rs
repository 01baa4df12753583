//! Tick and sleep timers.
//!
//! Two hardware timers drive timekeeping. The tick timer runs periodically and its interrupt
//! advances a [`TickCounter`]. The sleep timer is armed as a one-shot for every sleep and its
//! interrupt raises a [`WakeupFlag`]. Each piece of shared state has exactly one interrupt
//! writer and is read by the main context with plain atomic loads.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::fmt::debug;

/// Nanoseconds in one second.
pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Largest value of the 16-bit prescaler and auto-reload registers, plus one.
const COUNTER_RANGE: u64 = 1 << 16;

/// Prescaler and auto-reload values for a timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerConfig {
    prescaler: u16,
    period: u16,
    one_shot: bool,
}

impl TimerConfig {
    /// Periodic update events at `rate_hz` from a counter clocked at `clock_hz`.
    #[must_use]
    pub fn frequency(rate_hz: u32, clock_hz: u32) -> Self {
        let cycles = u64::from(clock_hz)
            .checked_div(u64::from(rate_hz))
            .unwrap_or(u64::MAX);
        Self::from_cycles(cycles, false)
    }

    /// A single update event no earlier than `ns` nanoseconds after start from a counter
    /// clocked at `clock_hz`.
    ///
    /// Delays longer than [`TimerConfig::max_delay_ns`] are cut to that span.
    #[must_use]
    pub fn delay(ns: i64, clock_hz: u32) -> Self {
        let ns = u128::try_from(ns).unwrap_or(0);
        let cycles = (ns * u128::from(clock_hz)).div_ceil(u128::from(NANOS_PER_SECOND));
        Self::from_cycles(u64::try_from(cycles).unwrap_or(u64::MAX), true)
    }

    /// Longest delay a single one-shot can cover with a counter clocked at `clock_hz`.
    pub fn max_delay_ns(clock_hz: u32) -> i64 {
        if clock_hz == 0 {
            return i64::MAX;
        }

        let span = u128::from(COUNTER_RANGE * COUNTER_RANGE) * u128::from(NANOS_PER_SECOND)
            / u128::from(clock_hz);
        i64::try_from(span).unwrap_or(i64::MAX)
    }

    fn from_cycles(cycles: u64, one_shot: bool) -> Self {
        let cycles = cycles.clamp(1, COUNTER_RANGE * COUNTER_RANGE);
        let divider = cycles.div_ceil(COUNTER_RANGE);
        // A one-shot must not fire early, a periodic timer keeps the nearest lower period.
        let period = if one_shot {
            cycles.div_ceil(divider)
        } else {
            cycles / divider
        };

        Self {
            prescaler: (divider - 1) as u16,
            period: (period - 1) as u16,
            one_shot,
        }
    }

    /// Prescaler register value (divider minus one).
    pub const fn prescaler(&self) -> u16 {
        self.prescaler
    }

    /// Auto-reload register value (period minus one).
    pub const fn period(&self) -> u16 {
        self.period
    }

    /// Whether the counter stops after the first update event.
    pub const fn one_shot(&self) -> bool {
        self.one_shot
    }

    /// Update event rate achieved with a counter clocked at `clock_hz`.
    pub fn rate(&self, clock_hz: u32) -> u32 {
        let cycles = (u64::from(self.prescaler) + 1) * (u64::from(self.period) + 1);
        (u64::from(clock_hz) / cycles) as u32
    }
}

/// Hardware timer with an update interrupt.
///
/// Methods take `&self` so the same timer can be driven from the main context and from its
/// interrupt handler.
pub trait Timer {
    /// Frequency of the clock feeding the counter.
    fn clock_hz(&self) -> u32;

    /// Stop the counter and load `config`.
    fn configure(&self, config: &TimerConfig);

    /// Start counting with the update interrupt enabled.
    fn start(&self);

    /// Stop counting.
    fn stop(&self);

    /// Test and clear the update flag.
    fn take_update(&self) -> bool;
}

impl<T: Timer + ?Sized> Timer for &T {
    fn clock_hz(&self) -> u32 {
        (**self).clock_hz()
    }

    fn configure(&self, config: &TimerConfig) {
        (**self).configure(config);
    }

    fn start(&self) {
        (**self).start();
    }

    fn stop(&self) {
        (**self).stop();
    }

    fn take_update(&self) -> bool {
        (**self).take_update()
    }
}

/// Platform primitive halting the core until an interrupt arrives.
pub trait WaitForInterrupt {
    /// Halt until the next interrupt unless `ready` already returns `true`.
    ///
    /// An interrupt arriving after `ready` was evaluated must still end the halt.
    fn wait<F: Fn() -> bool>(&self, ready: F);
}

/// Monotonic 64-bit tick count.
///
/// Stored as two 32-bit halves so that every access is a single word on 32-bit cores. Only the
/// tick interrupt writes it.
#[derive(Debug)]
pub struct TickCounter {
    low: AtomicU32,
    high: AtomicU32,
}

impl TickCounter {
    /// Counter starting at zero.
    pub const fn new() -> Self {
        Self {
            low: AtomicU32::new(0),
            high: AtomicU32::new(0),
        }
    }

    /// Advance by one tick. Must only be called from the tick interrupt.
    pub fn increment(&self) {
        let low = self.low.load(Ordering::SeqCst).wrapping_add(1);
        if low == 0 {
            let high = self.high.load(Ordering::SeqCst);
            self.high.store(high.wrapping_add(1), Ordering::SeqCst);
        }
        self.low.store(low, Ordering::SeqCst);
    }

    /// Current count.
    pub fn get(&self) -> u64 {
        loop {
            let high = self.high.load(Ordering::SeqCst);
            let low = self.low.load(Ordering::SeqCst);

            // A tick that carried into the high half landed between the two reads.
            if self.high.load(Ordering::SeqCst) == high {
                return (u64::from(high) << 32) | u64::from(low);
            }
        }
    }
}

impl Default for TickCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Flag raised by the sleep timer interrupt.
#[derive(Debug, Default)]
pub struct WakeupFlag(AtomicBool);

impl WakeupFlag {
    /// Lowered flag.
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Lower the flag.
    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Raise the flag. Must only be called from the sleep timer interrupt.
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check whether the flag is raised.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// State shared between the main context and the timer interrupts.
#[derive(Debug, Default)]
pub struct SharedState {
    /// Written by the tick interrupt.
    pub ticks: TickCounter,
    /// Written by the sleep timer interrupt.
    pub wakeup: WakeupFlag,
}

impl SharedState {
    /// State with zero ticks and the wakeup flag lowered.
    pub const fn new() -> Self {
        Self {
            ticks: TickCounter::new(),
            wakeup: WakeupFlag::new(),
        }
    }
}

/// Periodic timer producing ticks.
#[derive(Debug)]
pub struct TickTimer<T> {
    timer: T,
    rate: AtomicU32,
}

impl<T> TickTimer<T> {
    /// Wrap an unconfigured timer.
    pub const fn new(timer: T) -> Self {
        Self {
            timer,
            rate: AtomicU32::new(0),
        }
    }

    /// Configured tick rate in Hz, 0 before [`TickTimer::configure`].
    pub fn rate(&self) -> u32 {
        self.rate.load(Ordering::SeqCst)
    }
}

impl<T: Timer> TickTimer<T> {
    /// Set up periodic update events at `rate_hz`.
    pub fn configure(&self, rate_hz: u32) {
        let clock_hz = self.timer.clock_hz();
        let config = TimerConfig::frequency(rate_hz, clock_hz);
        debug!(
            "tick timer: {} Hz from {} Hz, achieved {} Hz",
            rate_hz,
            clock_hz,
            config.rate(clock_hz)
        );

        self.timer.configure(&config);
        self.rate.store(rate_hz, Ordering::SeqCst);
    }

    /// Start the timer with its interrupt enabled.
    pub fn start(&self) {
        self.timer.start();
    }

    /// Tick interrupt handler.
    pub fn on_tick(&self, ticks: &TickCounter) {
        // The handler can be entered without a pending update, skip those.
        if self.timer.take_update() {
            ticks.increment();
        }
    }
}

/// One-shot timer waking a sleeping caller.
#[derive(Debug)]
pub struct SleepTimer<S> {
    timer: S,
}

impl<S> SleepTimer<S> {
    /// Wrap an unconfigured timer.
    pub const fn new(timer: S) -> Self {
        Self { timer }
    }
}

impl<S: Timer> SleepTimer<S> {
    /// Arm the timer to fire once after `ns` nanoseconds, or after the longest span it can
    /// count if that is shorter.
    ///
    /// Returns the nanoseconds left over for a later arm, 0 if the whole delay is covered.
    pub fn arm(&self, ns: i64) -> i64 {
        let clock_hz = self.timer.clock_hz();
        let chunk = ns.min(TimerConfig::max_delay_ns(clock_hz));

        self.timer.configure(&TimerConfig::delay(chunk, clock_hz));
        self.timer.start();
        ns - chunk
    }

    /// Sleep timer interrupt handler.
    pub fn on_wakeup(&self, wakeup: &WakeupFlag) {
        if self.timer.take_update() {
            // One-pulse mode already halts the counter, stop it anyway before waking the
            // sleeper so that a woken caller never sees a running timer.
            self.timer.stop();
            wakeup.set();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use super::*;

    /// Timer double. [`MockTimer::expire`] plays the part of the counter reaching its period.
    #[derive(Debug, Default)]
    pub struct MockTimer {
        clock_hz: u32,
        running: AtomicBool,
        pending: AtomicBool,
        starts: AtomicU32,
        config: Mutex<Option<TimerConfig>>,
    }

    impl MockTimer {
        pub fn new(clock_hz: u32) -> Self {
            Self {
                clock_hz,
                ..Self::default()
            }
        }

        pub fn expire(&self) {
            if self.is_running() {
                self.pending.store(true, Ordering::SeqCst);
                if self.config().is_some_and(|config| config.one_shot()) {
                    self.running.store(false, Ordering::SeqCst);
                }
            }
        }

        pub fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        pub fn starts(&self) -> u32 {
            self.starts.load(Ordering::SeqCst)
        }

        pub fn config(&self) -> Option<TimerConfig> {
            *self.config.lock().unwrap()
        }
    }

    impl Timer for MockTimer {
        fn clock_hz(&self) -> u32 {
            self.clock_hz
        }

        fn configure(&self, config: &TimerConfig) {
            self.stop();
            *self.config.lock().unwrap() = Some(*config);
        }

        fn start(&self) {
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.running.store(true, Ordering::SeqCst);
        }

        fn stop(&self) {
            self.running.store(false, Ordering::SeqCst);
        }

        fn take_update(&self) -> bool {
            self.pending.swap(false, Ordering::SeqCst)
        }
    }

    #[test]
    fn frequency_config() {
        let config = TimerConfig::frequency(1000, 110_000_000);
        assert_eq!(config.prescaler(), 1);
        assert_eq!(config.period(), 54_999);
        assert!(!config.one_shot());
        assert_eq!(config.rate(110_000_000), 1000);

        let config = TimerConfig::frequency(1000, 4_000_000);
        assert_eq!(config.prescaler(), 0);
        assert_eq!(config.period(), 3_999);
        assert_eq!(config.rate(4_000_000), 1000);
    }

    #[test]
    fn frequency_config_limits() {
        // Faster than the input clock: one cycle per update.
        let config = TimerConfig::frequency(10_000_000, 1_000_000);
        assert_eq!((config.prescaler(), config.period()), (0, 0));

        let config = TimerConfig::frequency(0, 216_000_000);
        assert_eq!((config.prescaler(), config.period()), (u16::MAX, u16::MAX));
    }

    #[test]
    fn delay_config() {
        // 500 ms at 108 MHz is 54 000 000 cycles.
        let config = TimerConfig::delay(500_000_000, 108_000_000);
        assert!(config.one_shot());
        assert_eq!(config.prescaler(), 823);
        assert_eq!(config.period(), 65_533);

        let cycles = (u64::from(config.prescaler()) + 1) * (u64::from(config.period()) + 1);
        assert!(cycles >= 54_000_000);
        assert!(cycles - 54_000_000 < 824);
    }

    #[test]
    fn delay_config_never_fires_early() {
        for (ns, clock_hz) in [
            (1, 108_000_000),
            (999, 16_000_000),
            (1_000_001, 110_000_000),
            (12_345_678_901, 216_000_000),
        ] {
            let config = TimerConfig::delay(ns, clock_hz);
            let cycles = (u128::from(config.prescaler()) + 1) * (u128::from(config.period()) + 1);
            let requested = (ns as u128 * u128::from(clock_hz)).div_ceil(1_000_000_000);
            assert!(cycles >= requested, "{ns} ns at {clock_hz} Hz");
        }
    }

    #[test]
    fn max_delay_span() {
        assert_eq!(TimerConfig::max_delay_ns(108_000_000), 39_768_215_703);
        assert_eq!(TimerConfig::max_delay_ns(0), i64::MAX);

        let config = TimerConfig::delay(TimerConfig::max_delay_ns(108_000_000), 108_000_000);
        assert_eq!((config.prescaler(), config.period()), (u16::MAX, u16::MAX));
    }

    #[test]
    fn arm_splits_long_delays() {
        let timer = SleepTimer::new(MockTimer::new(108_000_000));
        let span = TimerConfig::max_delay_ns(108_000_000);

        assert_eq!(timer.arm(60_000_000_000), 60_000_000_000 - span);
        assert_eq!(timer.timer.config(), Some(TimerConfig::delay(span, 108_000_000)));

        assert_eq!(timer.arm(1_000_000), 0);
        assert_eq!(timer.arm(-3), 0);
        assert_eq!(timer.timer.starts(), 3);
    }

    #[test]
    fn delay_config_limits() {
        let config = TimerConfig::delay(0, 16_000_000);
        assert_eq!((config.prescaler(), config.period()), (0, 0));

        let config = TimerConfig::delay(-5, 16_000_000);
        assert_eq!((config.prescaler(), config.period()), (0, 0));

        let config = TimerConfig::delay(i64::MAX, 216_000_000);
        assert_eq!((config.prescaler(), config.period()), (u16::MAX, u16::MAX));
    }

    #[test]
    fn tick_counter_carries() {
        let ticks = TickCounter::new();
        ticks.low.store(u32::MAX - 1, Ordering::SeqCst);

        ticks.increment();
        assert_eq!(ticks.get(), u64::from(u32::MAX));

        ticks.increment();
        assert_eq!(ticks.get(), 1 << 32);

        ticks.increment();
        assert_eq!(ticks.get(), (1 << 32) + 1);
    }

    #[test]
    fn tick_handler_ignores_spurious_entries() {
        let ticks = TickCounter::new();
        let timer = TickTimer::new(MockTimer::new(16_000_000));
        timer.configure(1000);
        timer.start();

        timer.on_tick(&ticks);
        assert_eq!(ticks.get(), 0);

        for _ in 0..5 {
            timer.timer.expire();
            timer.on_tick(&ticks);
        }
        timer.on_tick(&ticks);
        assert_eq!(ticks.get(), 5);
    }

    #[test]
    fn wakeup_handler_stops_timer_before_raising_flag() {
        let flag = WakeupFlag::new();
        let timer = SleepTimer::new(MockTimer::new(16_000_000));

        timer.on_wakeup(&flag);
        assert!(!flag.is_set());

        timer.arm(1_000_000);
        assert!(timer.timer.is_running());
        assert_eq!(timer.timer.config(), Some(TimerConfig::delay(1_000_000, 16_000_000)));

        timer.timer.expire();
        timer.on_wakeup(&flag);
        assert!(flag.is_set());
        assert!(!timer.timer.is_running());
    }
}
