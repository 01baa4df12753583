#![no_std]
#![no_main]

use cortex_m_rt::entry;
use nano_fmt::NanoDisplay;
use panic_halt as _;

use stm32_generic::runtime::Runtime;
use stm32_generic::timer::SharedState;

#[cfg(feature = "stm32f7x2")]
use stm32_generic::chip::stm32f7x2 as chip;
#[cfg(feature = "stm32l5x2")]
use stm32_generic::chip::stm32l5x2 as chip;
#[cfg(feature = "stm32f7x2")]
use stm32f7::stm32f7x2::interrupt;
#[cfg(feature = "stm32l5x2")]
use stm32l5::stm32l552::interrupt;

#[cfg(not(any(feature = "stm32l5x2", feature = "stm32f7x2")))]
compile_error!("the firmware needs a chip family feature");

/// Time between two messages.
const PERIOD_NS: i64 = 500_000_000;

/// Tick count and wakeup flag, written by the timer interrupts.
static STATE: SharedState = SharedState::new();

static BOARD: chip::ChipBoard = chip::board(&STATE);

static RUNTIME: Runtime<chip::ChipBoard> = Runtime::new();

fn on_tick() {
    if let Some(board) = RUNTIME.board() {
        board.on_tick();
    }
}

fn on_wakeup() {
    if let Some(board) = RUNTIME.board() {
        board.on_wakeup();
    }
}

fn on_receive() {
    if let Some(board) = RUNTIME.board() {
        board.uart().receive();
    }
}

#[cfg(feature = "stm32l5x2")]
#[interrupt]
fn TIM16() {
    on_tick();
}

#[cfg(feature = "stm32l5x2")]
#[interrupt]
fn TIM15() {
    on_wakeup();
}

#[cfg(feature = "stm32l5x2")]
#[interrupt]
fn LPUART1() {
    on_receive();
}

#[cfg(feature = "stm32f7x2")]
#[interrupt]
fn TIM7() {
    on_tick();
}

#[cfg(feature = "stm32f7x2")]
#[interrupt]
fn TIM3() {
    on_wakeup();
}

#[cfg(feature = "stm32f7x2")]
#[interrupt]
fn USART3() {
    on_receive();
}

#[entry]
fn main() -> ! {
    let mut cp = cortex_m::Peripherals::take().unwrap();

    // Interrupt handlers find the board through the runtime, install it before unmasking them.
    RUNTIME.install(&BOARD).unwrap();
    chip::init(&BOARD, &mut cp.NVIC);

    let mut out = &RUNTIME;
    "stm32-generic\r\n".fmt(&mut out);

    let period = RUNTIME.ns_to_ticks(PERIOD_NS);
    let mut i = 0u32;

    loop {
        RUNTIME.sleep_ticks(period);

        "Boo! ".fmt(&mut out);
        i.fmt(&mut out);
        "\r\n".fmt(&mut out);

        i = i.wrapping_add(1);
    }
}
