//! STM32L5x2 clock tree.

use super::{ahb_clock, apb_clock, apb_timer_clock};
use crate::clock::{ClockTree, Field, Mux, Node, Reg, RegisterFile};

#[cfg(feature = "stm32l5x2")]
mod board;
#[cfg(feature = "stm32l5x2")]
pub use board::*;

/// Low-speed internal RC oscillator.
pub const LSI_HZ: u32 = 32_000;
/// Low-speed external crystal.
pub const LSE_HZ: u32 = 32_768;
/// High-speed internal RC oscillator.
pub const HSI_HZ: u32 = 16_000_000;
/// 48 MHz internal RC oscillator.
pub const HSI48_HZ: u32 = 48_000_000;

/// MSI frequency for each `MSIRANGE` value.
const MSI_RANGES: [u32; 12] = [
    100_000, 200_000, 400_000, 800_000, 1_000_000, 2_000_000, 4_000_000, 8_000_000, 16_000_000,
    24_000_000, 32_000_000, 48_000_000,
];

crate::clock_names! {
    /// Clocks of the STM32L5x2 family.
    pub enum Clock {
        Lsi => "LSI",
        Lse => "LSE",
        Msi => "MSI",
        Hsi => "HSI",
        Hse => "HSE",
        HseRtc => "HSE_RTC",
        Hsi48 => "HSI48",
        Sysclk => "SYSCLK",
        Hclk => "HCLK",
        Pclk1 => "PCLK1",
        Pclk1Tim => "PCLK1_TIM",
        Pclk2 => "PCLK2",
        Pclk2Tim => "PCLK2_TIM",
        PllClk => "PLLCLK",
        PllP => "PLLP",
        PllQ => "PLLQ",
        PllSai1P => "PLLSAI1P",
        PllSai1Q => "PLLSAI1Q",
        PllSai1R => "PLLSAI1R",
        PllSai2P => "PLLSAI2P",
        Clk48 => "CLK48",
        Rtc => "RTC",
        Rng => "RNG",
        Sdmmc1 => "SDMMC1",
        Usart1 => "USART1",
        Usart2 => "USART2",
        Usart3 => "USART3",
        Uart4 => "UART4",
        Uart5 => "UART5",
        Lpuart1 => "LPUART1",
        Adc => "ADC",
    }
}

const CR: Reg = Reg::at(0x00);
const CFGR: Reg = Reg::at(0x08);
const PLLCFGR: Reg = Reg::at(0x0C);
const PLLSAI1CFGR: Reg = Reg::at(0x10);
const PLLSAI2CFGR: Reg = Reg::at(0x14);
const CCIPR1: Reg = Reg::at(0x88);
const BDCR: Reg = Reg::at(0x90);
const CSR: Reg = Reg::at(0x94);
const CRRCR: Reg = Reg::at(0x98);
const CCIPR2: Reg = Reg::at(0x9C);

const MSIRDY: Field = CR.bit(1);
const MSIRGSEL: Field = CR.bit(3);
const MSIRANGE: Field = CR.field(4, 4);
const HSIRDY: Field = CR.bit(10);
const HSERDY: Field = CR.bit(17);
const PLLRDY: Field = CR.bit(25);
const PLLSAI1RDY: Field = CR.bit(27);
const PLLSAI2RDY: Field = CR.bit(29);

const HPRE: Field = CFGR.field(4, 4);
const PPRE1: Field = CFGR.field(8, 3);
const PPRE2: Field = CFGR.field(11, 3);

const LSIRDY: Field = CSR.bit(1);
const MSISRANGE: Field = CSR.field(8, 4);
const LSERDY: Field = BDCR.bit(1);
const HSI48RDY: Field = CRRCR.bit(1);

static SYSCLK: Mux<Clock> = Mux::new(
    CFGR.field(2, 2),
    &[
        Some(Clock::Msi),
        Some(Clock::Hsi),
        Some(Clock::Hse),
        Some(Clock::PllClk),
    ],
);

static CLK48: Mux<Clock> = Mux::new(
    CCIPR1.field(26, 2),
    &[
        Some(Clock::Hsi48),
        Some(Clock::PllQ),
        Some(Clock::PllSai1Q),
        Some(Clock::Msi),
    ],
);

static RTC: Mux<Clock> = Mux::new(
    BDCR.field(8, 2),
    &[None, Some(Clock::Lse), Some(Clock::Lsi), Some(Clock::HseRtc)],
);

static RNG: Mux<Clock> = Mux::fixed(&[Some(Clock::Clk48)]);

static SDMMC1: Mux<Clock> = Mux::new(CCIPR2.bit(14), &[Some(Clock::Clk48), Some(Clock::PllP)]);

static USART1: Mux<Clock> = Mux::new(
    CCIPR1.field(0, 2),
    &[
        Some(Clock::Pclk2),
        Some(Clock::Sysclk),
        Some(Clock::Hsi),
        Some(Clock::Lse),
    ],
);

/// Sources of every APB1 UART kernel clock.
const APB1_UART_SOURCES: &[Option<Clock>] = &[
    Some(Clock::Pclk1),
    Some(Clock::Sysclk),
    Some(Clock::Hsi),
    Some(Clock::Lse),
];

static USART2: Mux<Clock> = Mux::new(CCIPR1.field(2, 2), APB1_UART_SOURCES);
static USART3: Mux<Clock> = Mux::new(CCIPR1.field(4, 2), APB1_UART_SOURCES);
static UART4: Mux<Clock> = Mux::new(CCIPR1.field(6, 2), APB1_UART_SOURCES);
static UART5: Mux<Clock> = Mux::new(CCIPR1.field(8, 2), APB1_UART_SOURCES);
static LPUART1: Mux<Clock> = Mux::new(CCIPR1.field(10, 2), APB1_UART_SOURCES);

static ADC: Mux<Clock> = Mux::new(
    CCIPR1.field(28, 2),
    &[None, Some(Clock::PllSai1R), None, Some(Clock::Sysclk)],
);

/// PLL reference clock sources.
const PLL_INPUTS: &[Clock] = &[Clock::Msi, Clock::Hsi, Clock::Hse];

/// Output taps of a PLL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tap {
    P,
    Q,
    R,
}

/// Clock tree of an STM32L5x2 reading the RCC registers `regs`.
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
    fn msi(&self) -> u32 {
        if !MSIRDY.is_set(&self.regs) {
            return 0;
        }

        let range = if MSIRGSEL.is_set(&self.regs) {
            MSIRANGE.get(&self.regs)
        } else {
            MSISRANGE.get(&self.regs)
        };
        MSI_RANGES.get(range as usize).copied().unwrap_or(0)
    }

    /// Output `tap` of the PLL configured by `cfgr`.
    ///
    /// All three PLLs share the configuration register layout. A tap whose enable bit is clear
    /// reads as 0.
    fn pll(&self, cfgr: Reg, ready: Field, tap: Tap) -> u32 {
        let regs = &self.regs;
        if !ready.is_set(regs) {
            return 0;
        }

        let input = match cfgr.field(0, 2).get(regs) {
            1 => self.frequency(Clock::Msi),
            2 => self.frequency(Clock::Hsi),
            3 => self.frequency(Clock::Hse),
            _ => 0,
        };
        let m = cfgr.field(4, 4).get(regs) + 1;
        let n = cfgr.field(8, 7).get(regs);

        let divider = match tap {
            Tap::P if cfgr.bit(16).is_set(regs) => match cfgr.field(27, 5).get(regs) {
                0 if cfgr.bit(17).is_set(regs) => 17,
                0 => 7,
                pdiv => pdiv,
            },
            Tap::Q if cfgr.bit(20).is_set(regs) => (cfgr.field(21, 2).get(regs) + 1) * 2,
            Tap::R if cfgr.bit(24).is_set(regs) => (cfgr.field(25, 2).get(regs) + 1) * 2,
            _ => return 0,
        };

        (input / m).saturating_mul(n) / divider
    }
}

impl<R: RegisterFile> ClockTree for Clocks<R> {
    type Clock = Clock;
    type Registers = R;

    fn node(clock: Clock) -> Node<Clock> {
        use Clock::*;

        match clock {
            Lsi | Lse | Msi | Hsi | Hse | Hsi48 => Node::Primitive { inputs: &[] },
            HseRtc => Node::Primitive { inputs: &[Hse] },
            Hclk => Node::Primitive { inputs: &[Sysclk] },
            Pclk1 | Pclk2 => Node::Primitive { inputs: &[Hclk] },
            Pclk1Tim => Node::Primitive { inputs: &[Pclk1] },
            Pclk2Tim => Node::Primitive { inputs: &[Pclk2] },
            PllClk | PllP | PllQ | PllSai1P | PllSai1Q | PllSai1R | PllSai2P => {
                Node::Primitive { inputs: PLL_INPUTS }
            }
            Sysclk => Node::Derived(&SYSCLK),
            Clk48 => Node::Derived(&CLK48),
            Rtc => Node::Derived(&RTC),
            Rng => Node::Derived(&RNG),
            Sdmmc1 => Node::Derived(&SDMMC1),
            Usart1 => Node::Derived(&USART1),
            Usart2 => Node::Derived(&USART2),
            Usart3 => Node::Derived(&USART3),
            Uart4 => Node::Derived(&UART4),
            Uart5 => Node::Derived(&UART5),
            Lpuart1 => Node::Derived(&LPUART1),
            Adc => Node::Derived(&ADC),
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
            Clock::Msi => self.msi(),
            Clock::Hsi if HSIRDY.is_set(regs) => HSI_HZ,
            Clock::Hse if HSERDY.is_set(regs) => self.hse_hz,
            Clock::HseRtc => self.frequency(Clock::Hse) / 32,
            Clock::Hsi48 if HSI48RDY.is_set(regs) => HSI48_HZ,
            Clock::Hclk => ahb_clock(self.frequency(Clock::Sysclk), HPRE.get(regs)),
            Clock::Pclk1 => apb_clock(self.frequency(Clock::Hclk), PPRE1.get(regs)),
            Clock::Pclk2 => apb_clock(self.frequency(Clock::Hclk), PPRE2.get(regs)),
            Clock::Pclk1Tim => apb_timer_clock(self.frequency(Clock::Pclk1), PPRE1.get(regs)),
            Clock::Pclk2Tim => apb_timer_clock(self.frequency(Clock::Pclk2), PPRE2.get(regs)),
            Clock::PllClk => self.pll(PLLCFGR, PLLRDY, Tap::R),
            Clock::PllP => self.pll(PLLCFGR, PLLRDY, Tap::P),
            Clock::PllQ => self.pll(PLLCFGR, PLLRDY, Tap::Q),
            Clock::PllSai1P => self.pll(PLLSAI1CFGR, PLLSAI1RDY, Tap::P),
            Clock::PllSai1Q => self.pll(PLLSAI1CFGR, PLLSAI1RDY, Tap::Q),
            Clock::PllSai1R => self.pll(PLLSAI1CFGR, PLLSAI1RDY, Tap::R),
            Clock::PllSai2P => self.pll(PLLSAI2CFGR, PLLSAI2RDY, Tap::P),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::tests::Fixture;
    use crate::clock::{ClockName, find_cycle};

    /// MSI range 6 feeding the main PLL at 110 MHz, as the board runs it.
    fn board_fixture() -> Fixture {
        let mut regs = Fixture::default();
        regs.set(MSIRDY, 1)
            .set(MSIRGSEL, 1)
            .set(MSIRANGE, 6)
            .set(HSIRDY, 1)
            .set(PLLRDY, 1)
            .set(CFGR.field(2, 2), 3)
            .set(PLLCFGR.field(0, 2), 1)
            .set(PLLCFGR.field(4, 4), 0)
            .set(PLLCFGR.field(8, 7), 55)
            .set(PLLCFGR.bit(16), 1)
            .set(PLLCFGR.field(27, 5), 7)
            .set(PLLCFGR.bit(20), 1)
            .set(PLLCFGR.field(21, 2), 0)
            .set(PLLCFGR.bit(24), 1)
            .set(PLLCFGR.field(25, 2), 0)
            .set(LSERDY, 1)
            .set(BDCR.field(8, 2), 1)
            .set(HSI48RDY, 1);
        regs
    }

    #[test]
    fn board_configuration() {
        let clocks = Clocks::new(board_fixture(), 8_000_000);

        let expected = [
            (Clock::Msi, 4_000_000),
            (Clock::Hsi, 16_000_000),
            (Clock::PllClk, 110_000_000),
            (Clock::PllP, 31_428_571),
            (Clock::PllQ, 110_000_000),
            (Clock::Sysclk, 110_000_000),
            (Clock::Hclk, 110_000_000),
            (Clock::Pclk1, 110_000_000),
            (Clock::Pclk2, 110_000_000),
            (Clock::Pclk1Tim, 110_000_000),
            (Clock::Pclk2Tim, 110_000_000),
            (Clock::Lse, 32_768),
            (Clock::Rtc, 32_768),
            (Clock::Hsi48, 48_000_000),
            (Clock::Clk48, 48_000_000),
            (Clock::Rng, 48_000_000),
            (Clock::Sdmmc1, 48_000_000),
            (Clock::Usart1, 110_000_000),
            (Clock::Lpuart1, 110_000_000),
            (Clock::Lsi, 0),
            (Clock::Hse, 0),
            (Clock::HseRtc, 0),
            (Clock::PllSai1P, 0),
            (Clock::PllSai2P, 0),
            (Clock::Adc, 0),
        ];

        for (clock, hz) in expected {
            assert_eq!(clocks.frequency(clock), hz, "{}", clock.name());
        }
    }

    #[test]
    fn reset_state_runs_from_msi() {
        let mut regs = Fixture::default();
        regs.set(MSIRDY, 1).set(MSISRANGE, 6);
        let clocks = Clocks::new(regs, 8_000_000);

        assert_eq!(clocks.frequency(Clock::Sysclk), 4_000_000);
        assert_eq!(clocks.frequency(Clock::Pclk2Tim), 4_000_000);
        assert_eq!(clocks.frequency(Clock::PllClk), 0);
        assert_eq!(clocks.frequency(Clock::Rtc), 0);
    }

    #[test]
    fn msi_range_out_of_table() {
        let mut regs = Fixture::default();
        regs.set(MSIRDY, 1).set(MSIRGSEL, 1).set(MSIRANGE, 12);
        assert_eq!(Clocks::new(regs, 0).frequency(Clock::Msi), 0);
    }

    #[test]
    fn bus_prescalers() {
        let mut regs = board_fixture();
        regs.set(HPRE, 0b1000).set(PPRE1, 0b100).set(PPRE2, 0b111);
        let clocks = Clocks::new(regs, 8_000_000);

        assert_eq!(clocks.frequency(Clock::Hclk), 55_000_000);
        assert_eq!(clocks.frequency(Clock::Pclk1), 27_500_000);
        assert_eq!(clocks.frequency(Clock::Pclk1Tim), 55_000_000);
        assert_eq!(clocks.frequency(Clock::Pclk2), 3_437_500);
        assert_eq!(clocks.frequency(Clock::Pclk2Tim), 6_875_000);
    }

    #[test]
    fn pll_p_default_dividers() {
        let mut regs = board_fixture();
        regs.set(PLLCFGR.field(27, 5), 0);
        assert_eq!(Clocks::new(&regs, 0).frequency(Clock::PllP), 220_000_000 / 7);

        regs.set(PLLCFGR.bit(17), 1);
        assert_eq!(Clocks::new(&regs, 0).frequency(Clock::PllP), 220_000_000 / 17);
    }

    #[test]
    fn disabled_taps_and_unlocked_pll() {
        let mut regs = board_fixture();
        regs.set(PLLCFGR.bit(20), 0);
        assert_eq!(Clocks::new(&regs, 0).frequency(Clock::PllQ), 0);

        regs.set(PLLRDY, 0);
        let clocks = Clocks::new(&regs, 0);
        assert_eq!(clocks.frequency(Clock::PllClk), 0);
        assert_eq!(clocks.frequency(Clock::Sysclk), 0);
        assert_eq!(clocks.frequency(Clock::Pclk1), 0);
    }

    #[test]
    fn sai_pll_from_hse() {
        let mut regs = board_fixture();
        regs.set(HSERDY, 1)
            .set(PLLSAI1RDY, 1)
            .set(PLLSAI1CFGR.field(0, 2), 3)
            .set(PLLSAI1CFGR.field(4, 4), 1)
            .set(PLLSAI1CFGR.field(8, 7), 24)
            .set(PLLSAI1CFGR.bit(24), 1)
            .set(CCIPR1.field(28, 2), 1)
            .set(BDCR.field(8, 2), 3);
        let clocks = Clocks::new(regs, 8_000_000);

        assert_eq!(clocks.frequency(Clock::PllSai1R), 48_000_000);
        assert_eq!(clocks.frequency(Clock::Adc), 48_000_000);
        assert_eq!(clocks.frequency(Clock::HseRtc), 250_000);
        assert_eq!(clocks.frequency(Clock::Rtc), 250_000);
    }

    #[test]
    fn peripheral_selectors() {
        let mut regs = board_fixture();
        regs.set(CCIPR1.field(10, 2), 2)
            .set(CCIPR1.field(4, 2), 3)
            .set(CCIPR1.field(26, 2), 1)
            .set(CCIPR1.field(28, 2), 2);
        let clocks = Clocks::new(regs, 8_000_000);

        assert_eq!(clocks.frequency(Clock::Lpuart1), 16_000_000);
        assert_eq!(clocks.frequency(Clock::Usart3), 32_768);
        assert_eq!(clocks.frequency(Clock::Clk48), 110_000_000);
        assert_eq!(clocks.frequency(Clock::Adc), 0);
    }

    #[test]
    fn names() {
        let clocks = Clocks::new(board_fixture(), 8_000_000);

        assert_eq!(clocks.frequency_by_name("PCLK2_TIM"), 110_000_000);
        assert_eq!(clocks.frequency_by_name("PLLSAI1Q"), 0);
        assert_eq!(clocks.frequency_by_name("PLCLK1_TIM"), 0);
        assert_eq!(Clock::ALL.len(), 31);
        for &clock in Clock::ALL {
            assert_eq!(Clock::from_name(clock.name()), Some(clock));
        }
    }

    #[test]
    fn table_is_acyclic() {
        assert_eq!(find_cycle::<Clocks<Fixture>>(), None);
    }
}
