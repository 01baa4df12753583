//! NUCLEO-L552ZE-Q wiring: TIM16 ticks, TIM15 sleeps, LPUART1 is the console.

use cortex_m::peripheral::NVIC;
use stm32l5::stm32l552 as pac;

pub use pac::Interrupt;

use super::{Clock, Clocks};
use crate::board::Board;
use crate::chip::hw::{Wfi, polled_uart, rcc_registers, update_timer};
use crate::timer::SharedState;
use crate::usart::Serial;

/// External crystal frequency.
pub const HSE_HZ: u32 = 8_000_000;
/// Tick timer rate.
pub const TICK_RATE: u32 = 1000;
/// Console baud rate.
pub const BAUDRATE: u32 = 115_200;
/// Console receive buffer size.
pub const RX_BUFFER_SIZE: usize = 64;

// Only the upper four priority bits are implemented.
pub const TICK_PRIORITY: u8 = 0xC0;
pub const SLEEP_PRIORITY: u8 = 0xD0;
pub const UART_PRIORITY: u8 = 0xE0;

pub const TICK_INTERRUPT: Interrupt = Interrupt::TIM16;
pub const SLEEP_INTERRUPT: Interrupt = Interrupt::TIM15;
pub const UART_INTERRUPT: Interrupt = Interrupt::LPUART1;

const APB1ENR2_LPUART1EN: u32 = 1 << 0;
const APB2ENR_TIM15EN: u32 = 1 << 16;
const APB2ENR_TIM16EN: u32 = 1 << 17;

rcc_registers!(Rcc, pac::RCC);
update_timer!(Tim16, pac::TIM16, Clock::Pclk2Tim);
update_timer!(Tim15, pac::TIM15, Clock::Pclk2Tim);
polled_uart!(Lpuart1, pac::LPUART1, Clock::Lpuart1, lpuart_brr);

/// LPUART divisor: 256 times the kernel clock over the baud rate.
fn lpuart_brr(kernel_hz: u64, baud: u64) -> u32 {
    (kernel_hz * 256 / baud) as u32
}

/// The live clock tree.
pub fn clocks() -> Clocks<Rcc> {
    Clocks::new(Rcc, HSE_HZ)
}

/// Board type of this chip.
pub type ChipBoard = Board<'static, Tim16, Tim15, Serial<Lpuart1, RX_BUFFER_SIZE>, Wfi>;

/// Board over `state`, not yet started.
pub const fn board(state: &'static SharedState) -> ChipBoard {
    Board::new(state, Tim16, Tim15, Serial::new(Lpuart1), Wfi)
}

/// Clock the peripherals, start the console and the tick timer, then unmask their interrupts.
///
/// The board must already be installed, the tick interrupt can fire as soon as this returns.
pub fn init(board: &ChipBoard, nvic: &mut NVIC) {
    // SAFETY: enable bits are only set here, before any of the peripherals is used.
    let rcc = unsafe { &*pac::RCC::ptr() };
    rcc.apb2enr
        .modify(|r, w| unsafe { w.bits(r.bits() | APB2ENR_TIM15EN | APB2ENR_TIM16EN) });
    rcc.apb1enr2
        .modify(|r, w| unsafe { w.bits(r.bits() | APB1ENR2_LPUART1EN) });

    board.uart().inner().configure(BAUDRATE);
    board.start_ticks(TICK_RATE);

    // SAFETY: the handlers only reach the board through the installed reference.
    unsafe {
        nvic.set_priority(TICK_INTERRUPT, TICK_PRIORITY);
        nvic.set_priority(SLEEP_INTERRUPT, SLEEP_PRIORITY);
        nvic.set_priority(UART_INTERRUPT, UART_PRIORITY);
        NVIC::unmask(TICK_INTERRUPT);
        NVIC::unmask(SLEEP_INTERRUPT);
        NVIC::unmask(UART_INTERRUPT);
    }
}
