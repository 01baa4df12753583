//! NUCLEO-F722ZE wiring: TIM7 ticks, TIM3 sleeps, USART3 is the console.

use cortex_m::peripheral::NVIC;
use stm32f7::stm32f7x2 as pac;

pub use pac::Interrupt;

use super::{Clock, Clocks};
use crate::board::Board;
use crate::chip::hw::{Wfi, polled_uart, rcc_registers, update_timer};
use crate::timer::SharedState;
use crate::usart::Serial;

/// External clock frequency, fed from the ST-LINK MCO.
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

pub const TICK_INTERRUPT: Interrupt = Interrupt::TIM7;
pub const SLEEP_INTERRUPT: Interrupt = Interrupt::TIM3;
pub const UART_INTERRUPT: Interrupt = Interrupt::USART3;

const APB1ENR_TIM3EN: u32 = 1 << 1;
const APB1ENR_TIM7EN: u32 = 1 << 5;
const APB1ENR_USART3EN: u32 = 1 << 18;

rcc_registers!(Rcc, pac::RCC);
update_timer!(Tim7, pac::TIM7, Clock::Pclk1Tim);
update_timer!(Tim3, pac::TIM3, Clock::Pclk1Tim);
polled_uart!(Usart3, pac::USART3, Clock::Usart3, usart_brr);

/// USART divisor with 16x oversampling.
fn usart_brr(kernel_hz: u64, baud: u64) -> u32 {
    (kernel_hz / baud) as u32
}

/// The live clock tree.
pub fn clocks() -> Clocks<Rcc> {
    Clocks::new(Rcc, HSE_HZ)
}

/// Board type of this chip.
pub type ChipBoard = Board<'static, Tim7, Tim3, Serial<Usart3, RX_BUFFER_SIZE>, Wfi>;

/// Board over `state`, not yet started.
pub const fn board(state: &'static SharedState) -> ChipBoard {
    Board::new(state, Tim7, Tim3, Serial::new(Usart3), Wfi)
}

/// Clock the peripherals, start the console and the tick timer, then unmask their interrupts.
///
/// The board must already be installed, the tick interrupt can fire as soon as this returns.
pub fn init(board: &ChipBoard, nvic: &mut NVIC) {
    // SAFETY: enable bits are only set here, before any of the peripherals is used.
    let rcc = unsafe { &*pac::RCC::ptr() };
    rcc.apb1enr.modify(|r, w| unsafe {
        w.bits(r.bits() | APB1ENR_TIM3EN | APB1ENR_TIM7EN | APB1ENR_USART3EN)
    });

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
