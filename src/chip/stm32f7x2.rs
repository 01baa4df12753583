//! STM32F7x2 clock tree.

use super::{ahb_clock, apb_clock, apb_timer_clock};
use crate::clock::{ClockTree, Field, Mux, Node, Reg, RegisterFile};

#[cfg(feature = "stm32f7x2")]
mod board;
#[cfg(feature = "stm32f7x2")]
pub use board::*;

/// Low-speed internal RC oscillator.
pub const LSI_HZ: u32 = 32_000;
/// Low-speed external crystal.
pub const LSE_HZ: u32 = 32_768;
/// High-speed internal RC oscillator.
pub const HSI_HZ: u32 = 16_000_000;

crate::clock_names! {
    /// Clocks of the STM32F7x2 family.
    pub enum Clock {
        Lsi => "LSI",
        Lse => "LSE",
        Hsi => "HSI",
        Hse => "HSE",
        HseRtc => "HSE_RTC",
        Sysclk => "SYSCLK",
        Hclk => "HCLK",
        Pclk1 => "PCLK1",
        Pclk1Tim => "PCLK1_TIM",
        Pclk2 => "PCLK2",
        Pclk2Tim => "PCLK2_TIM",
        PllP => "PLLP",
        PllQ => "PLLQ",
        PllSaiP => "PLLSAIP",
        PllSaiQ => "PLLSAIQ",
        Clk48 => "CLK48",
        Rtc => "RTC",
        Sdmmc1 => "SDMMC1",
        Usart1 => "USART1",
        Usart2 => "USART2",
        Usart3 => "USART3",
        Uart4 => "UART4",
        Uart5 => "UART5",
        Usart6 => "USART6",
        Uart7 => "UART7",
        Uart8 => "UART8",
    }
}

const CR: Reg = Reg::at(0x00);
const PLLCFGR: Reg = Reg::at(0x04);
const CFGR: Reg = Reg::at(0x08);
const BDCR: Reg = Reg::at(0x70);
const CSR: Reg = Reg::at(0x74);
const PLLSAICFGR: Reg = Reg::at(0x88);
const DCKCFGR1: Reg = Reg::at(0x8C);
const DCKCFGR2: Reg = Reg::at(0x90);

const HSIRDY: Field = CR.bit(1);
const HSERDY: Field = CR.bit(17);
const PLLRDY: Field = CR.bit(25);
const PLLSAIRDY: Field = CR.bit(29);

const PLLM: Field = PLLCFGR.field(0, 6);
const PLLN: Field = PLLCFGR.field(6, 9);
const PLLP: Field = PLLCFGR.field(16, 2);
const PLLSRC: Field = PLLCFGR.bit(22);
const PLLQ: Field = PLLCFGR.field(24, 4);

const PLLSAIN: Field = PLLSAICFGR.field(6, 9);
const PLLSAIP: Field = PLLSAICFGR.field(16, 2);
const PLLSAIQ: Field = PLLSAICFGR.field(24, 4);

const HPRE: Field = CFGR.field(4, 4);
const PPRE1: Field = CFGR.field(10, 3);
const PPRE2: Field = CFGR.field(13, 3);
const RTCPRE: Field = CFGR.field(16, 5);

const LSERDY: Field = BDCR.bit(1);
const LSIRDY: Field = CSR.bit(1);
const TIMPRE: Field = DCKCFGR1.bit(24);

static SYSCLK: Mux<Clock> = Mux::new(
    CFGR.field(2, 2),
    &[Some(Clock::Hsi), Some(Clock::Hse), Some(Clock::PllP), None],
);

static CLK48: Mux<Clock> = Mux::new(DCKCFGR2.bit(27), &[Some(Clock::PllQ), Some(Clock::PllSaiP)]);

static RTC: Mux<Clock> = Mux::new(
    BDCR.field(8, 2),
    &[None, Some(Clock::Lse), Some(Clock::Lsi), Some(Clock::HseRtc)],
);

static SDMMC1: Mux<Clock> = Mux::new(DCKCFGR2.bit(28), &[Some(Clock::Clk48), Some(Clock::Sysclk)]);

/// Sources of the UARTs on APB2.
const APB2_UART_SOURCES: &[Option<Clock>] = &[
    Some(Clock::Pclk2),
    Some(Clock::Sysclk),
    Some(Clock::Hsi),
    Some(Clock::Lse),
];

/// Sources of the UARTs on APB1.
const APB1_UART_SOURCES: &[Option<Clock>] = &[
    Some(Clock::Pclk1),
    Some(Clock::Sysclk),
    Some(Clock::Hsi),
    Some(Clock::Lse),
];

static USART1: Mux<Clock> = Mux::new(DCKCFGR2.field(0, 2), APB2_UART_SOURCES);
static USART2: Mux<Clock> = Mux::new(DCKCFGR2.field(2, 2), APB1_UART_SOURCES);
static USART3: Mux<Clock> = Mux::new(DCKCFGR2.field(4, 2), APB1_UART_SOURCES);
static UART4: Mux<Clock> = Mux::new(DCKCFGR2.field(6, 2), APB1_UART_SOURCES);
static UART5: Mux<Clock> = Mux::new(DCKCFGR2.field(8, 2), APB1_UART_SOURCES);
static USART6: Mux<Clock> = Mux::new(DCKCFGR2.field(10, 2), APB2_UART_SOURCES);
static UART7: Mux<Clock> = Mux::new(DCKCFGR2.field(12, 2), APB1_UART_SOURCES);
static UART8: Mux<Clock> = Mux::new(DCKCFGR2.field(14, 2), APB1_UART_SOURCES);

/// Clock tree of an STM32F7x2 reading the RCC registers `regs`.
#[derive(Debug)]
pub struct Clocks<R> {
    regs: R,
    hse_hz: u32,
}

impl<R> Clocks<R> {
    /// Tree over `regs` with an external crystal of `hse_hz`.
    pub const fn new(regs: R, hse_hz: u32) -> Self {
        Self { regs, hse_hz }
    }
}

impl<R: RegisterFile> Clocks<R> {
    /// VCO output of the PLL driving `ready` with multiplier `n`.
    ///
    /// Both PLLs share the divider and reference clock of the main PLL.
    fn vco(&self, ready: Field, n: Field) -> u32 {
        let regs = &self.regs;
        let m = PLLM.get(regs);
        if !ready.is_set(regs) || m < 2 {
            return 0;
        }

        let input = if PLLSRC.is_set(regs) {
            self.frequency(Clock::Hse)
        } else {
            self.frequency(Clock::Hsi)
        };
        (input / m).saturating_mul(n.get(regs))
    }

    /// Output with the 2, 4, 6 or 8 divider in `p`.
    fn p_output(&self, ready: Field, n: Field, p: Field) -> u32 {
        self.vco(ready, n) / ((p.get(&self.regs) + 1) * 2)
    }

    /// Output with the 2..=15 divider in `q`, values below 2 are invalid.
    fn q_output(&self, ready: Field, n: Field, q: Field) -> u32 {
        match q.get(&self.regs) {
            0 | 1 => 0,
            q => self.vco(ready, n) / q,
        }
    }

    /// Timer kernel clock of the bus clocked by `pclk` with prescaler `ppre`.
    fn timer_clock(&self, pclk: Clock, ppre: Field) -> u32 {
        let ppre = ppre.get(&self.regs);
        if !TIMPRE.is_set(&self.regs) {
            return apb_timer_clock(self.frequency(pclk), ppre);
        }

        // With TIMPRE the timers run at HCLK up to an APB divider of 4.
        if ppre <= 0b101 {
            self.frequency(Clock::Hclk)
        } else {
            self.frequency(pclk) * 4
        }
    }
}

impl<R: RegisterFile> ClockTree for Clocks<R> {
    type Clock = Clock;
    type Registers = R;

    fn node(clock: Clock) -> Node<Clock> {
        use Clock::*;

        match clock {
            Lsi | Lse | Hsi | Hse => Node::Primitive { inputs: &[] },
            HseRtc => Node::Primitive { inputs: &[Hse] },
            Hclk => Node::Primitive { inputs: &[Sysclk] },
            Pclk1 | Pclk2 => Node::Primitive { inputs: &[Hclk] },
            Pclk1Tim => Node::Primitive { inputs: &[Pclk1, Hclk] },
            Pclk2Tim => Node::Primitive { inputs: &[Pclk2, Hclk] },
            PllP | PllQ | PllSaiP | PllSaiQ => Node::Primitive { inputs: &[Hsi, Hse] },
            Sysclk => Node::Derived(&SYSCLK),
            Clk48 => Node::Derived(&CLK48),
            Rtc => Node::Derived(&RTC),
            Sdmmc1 => Node::Derived(&SDMMC1),
            Usart1 => Node::Derived(&USART1),
            Usart2 => Node::Derived(&USART2),
            Usart3 => Node::Derived(&USART3),
            Uart4 => Node::Derived(&UART4),
            Uart5 => Node::Derived(&UART5),
            Usart6 => Node::Derived(&USART6),
            Uart7 => Node::Derived(&UART7),
            Uart8 => Node::Derived(&UART8),
        }
    }

    fn registers(&self) -> &R {
        &self.regs
    }

    fn primitive(&self, clock: Clock) -> u32 {
        let regs = &self.regs;

        match clock {
            Clock::Lsi if LSIRDY.is_set(regs) => LSI_HZ,
            Clock::Lse if LSERDY.is_set(regs) => LSE_HZ,
            Clock::Hsi if HSIRDY.is_set(regs) => HSI_HZ,
            Clock::Hse if HSERDY.is_set(regs) => self.hse_hz,
            Clock::HseRtc => match RTCPRE.get(regs) {
                0 | 1 => 0,
                div => self.frequency(Clock::Hse) / div,
            },
            Clock::Hclk => ahb_clock(self.frequency(Clock::Sysclk), HPRE.get(regs)),
            Clock::Pclk1 => apb_clock(self.frequency(Clock::Hclk), PPRE1.get(regs)),
            Clock::Pclk2 => apb_clock(self.frequency(Clock::Hclk), PPRE2.get(regs)),
            Clock::Pclk1Tim => self.timer_clock(Clock::Pclk1, PPRE1),
            Clock::Pclk2Tim => self.timer_clock(Clock::Pclk2, PPRE2),
            Clock::PllP => self.p_output(PLLRDY, PLLN, PLLP),
            Clock::PllQ => self.q_output(PLLRDY, PLLN, PLLQ),
            Clock::PllSaiP => self.p_output(PLLSAIRDY, PLLSAIN, PLLSAIP),
            Clock::PllSaiQ => self.q_output(PLLSAIRDY, PLLSAIN, PLLSAIQ),
            _ => 0,
        }
    }
}
