//! Hooks the runtime calls for time and console output.
//!
//! A [`Runtime`] lives in a `static` and holds the one board of the firmware image. The same
//! reference is what interrupt handlers use to reach the board, so it has to be installed
//! before any board interrupt is unmasked. Until then every hook falls back to a board-less
//! default: no ticks, one millisecond per tick, no sleeping, output discarded.

use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use nano_fmt::NanoWrite;

use crate::Error;
use crate::board::{CustomBoard, DEFAULT_NS_PER_TICK};
use crate::fmt::info;
use crate::usart::GenericUart;

/// Slot holding the installed board.
pub struct Runtime<B> {
    board: AtomicPtr<B>,
}

impl<B: 'static> Runtime<B> {
    /// Runtime without a board.
    pub const fn new() -> Self {
        Self {
            board: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Install the board. Only the first call succeeds.
    pub fn install(&self, board: &'static B) -> Result<(), Error>
    where
        B: Sync,
    {
        self.board
            .compare_exchange(
                ptr::null_mut(),
                ptr::from_ref(board).cast_mut(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map_err(|_| Error::AlreadyInstalled)?;

        info!("board installed");
        Ok(())
    }

    /// The installed board.
    pub fn board(&self) -> Option<&'static B> {
        let board = self.board.load(Ordering::SeqCst);
        // SAFETY: the pointer is either null or was made from a `&'static B` in `install`, and
        // it is never written through.
        unsafe { board.as_ref() }
    }
}

impl<B: 'static> Default for Runtime<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: CustomBoard + 'static> Runtime<B> {
    /// Block for about `d` ticks. Returns immediately without a board.
    pub fn sleep_ticks(&self, d: i64) {
        if let Some(board) = self.board() {
            board.sleep_ticks(d);
        }
    }

    /// Ticks since start, 0 without a board.
    pub fn ticks(&self) -> i64 {
        self.board().map_or(0, |board| board.ticks())
    }

    /// Convert a tick count to nanoseconds.
    pub fn ticks_to_ns(&self, ticks: i64) -> i64 {
        match self.board() {
            Some(board) => board.ticks_to_ns(ticks),
            None => ticks.saturating_mul(DEFAULT_NS_PER_TICK),
        }
    }

    /// Convert nanoseconds to whole ticks.
    pub fn ns_to_ticks(&self, ns: i64) -> i64 {
        match self.board() {
            Some(board) => board.ns_to_ticks(ns),
            None => ns / DEFAULT_NS_PER_TICK,
        }
    }

    /// Write a character to the console UART, dropping it if there is none.
    pub fn put_char(&self, c: u8) {
        if let Some(uart) = self.board().and_then(CustomBoard::uart) {
            // Console output has no error channel.
            let _ = uart.write_byte(c);
        }
    }
}

impl<B: CustomBoard + 'static> NanoWrite for &Runtime<B> {
    fn write_byte(&mut self, b: u8) {
        self.put_char(b);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};

    use nano_fmt::NanoDisplay;

    use super::*;
    use crate::usart::tests::MockUart;

    /// Board double with 10 ms ticks and a sleep that just advances time.
    #[derive(Default)]
    struct SimBoard {
        now: AtomicI64,
        uart: Option<MockUart>,
    }

    impl CustomBoard for SimBoard {
        type Uart = MockUart;

        fn sleep_ticks(&self, d: i64) {
            self.now.fetch_add(d, Ordering::SeqCst);
        }

        fn ticks(&self) -> i64 {
            self.now.load(Ordering::SeqCst)
        }

        fn ticks_to_ns(&self, ticks: i64) -> i64 {
            ticks * 10_000_000
        }

        fn ns_to_ticks(&self, ns: i64) -> i64 {
            ns / 10_000_000
        }

        fn uart(&self) -> Option<&MockUart> {
            self.uart.as_ref()
        }
    }

    fn leak(board: SimBoard) -> &'static SimBoard {
        Box::leak(Box::new(board))
    }

    #[test]
    fn defaults_without_board() {
        let runtime = Runtime::<SimBoard>::new();

        assert!(runtime.board().is_none());
        assert_eq!(runtime.ticks(), 0);
        assert_eq!(runtime.ticks_to_ns(1), 1_000_000);
        assert_eq!(runtime.ns_to_ticks(1_500_000), 1);
        runtime.sleep_ticks(100);
        runtime.put_char(b'x');
    }

    #[test]
    fn forwards_to_board() {
        let runtime = Runtime::new();
        let board = leak(SimBoard {
            uart: Some(MockUart::default()),
            ..SimBoard::default()
        });
        runtime.install(board).unwrap();

        runtime.sleep_ticks(7);
        assert_eq!(runtime.ticks(), 7);
        assert_eq!(runtime.ticks_to_ns(2), 20_000_000);
        assert_eq!(runtime.ns_to_ticks(25_000_000), 2);

        let mut out = &runtime;
        "Boo! ".fmt(&mut out);
        42i32.fmt(&mut out);
        assert_eq!(board.uart.as_ref().unwrap().sent(), b"Boo! 42");
    }

    #[test]
    fn output_dropped_without_uart() {
        let runtime = Runtime::new();
        runtime.install(leak(SimBoard::default())).unwrap();
        runtime.put_char(b'x');
    }

    #[test]
    fn installs_once() {
        let runtime = Runtime::new();
        let first = leak(SimBoard::default());
        runtime.install(first).unwrap();

        assert_eq!(runtime.install(leak(SimBoard::default())), Err(Error::AlreadyInstalled));
        assert!(ptr::eq(runtime.board().unwrap(), first));
    }
}
