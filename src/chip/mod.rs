//! Chip family support.
//!
//! The clock tables are plain data and always built, so they can be checked on the host. The
//! hardware drivers behind them need the family's peripheral access crate and are only built
//! with the matching feature.

pub mod stm32f7x2;
pub mod stm32l5x2;

#[cfg(any(feature = "stm32l5x2", feature = "stm32f7x2"))]
pub use hw::Wfi;

/// SYSCLK shift for each value of the AHB prescaler field.
const AHB_SHIFT: [u32; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4, 6, 7, 8, 9];

/// HCLK from SYSCLK and the `HPRE` field.
fn ahb_clock(sysclk: u32, hpre: u32) -> u32 {
    AHB_SHIFT
        .get(hpre as usize)
        .map_or(0, |&shift| sysclk >> shift)
}

/// APB divider shift for the 3-bit `PPREx` field. Values below 4 leave the clock undivided.
fn apb_shift(ppre: u32) -> u32 {
    ppre.saturating_sub(3)
}

/// Peripheral clock from HCLK and the `PPREx` field.
fn apb_clock(hclk: u32, ppre: u32) -> u32 {
    hclk >> apb_shift(ppre)
}

/// Timer kernel clock of an APB bus: the bus clock when undivided, twice it otherwise.
fn apb_timer_clock(pclk: u32, ppre: u32) -> u32 {
    if apb_shift(ppre) == 0 { pclk } else { pclk * 2 }
}

/// Hardware drivers shared by both families. The register blocks differ only in their crate.
#[cfg(any(feature = "stm32l5x2", feature = "stm32f7x2"))]
mod hw {
    pub const TIM_CR1_CEN: u32 = 1 << 0;
    pub const TIM_CR1_URS: u32 = 1 << 2;
    pub const TIM_CR1_OPM: u32 = 1 << 3;
    pub const TIM_DIER_UIE: u32 = 1 << 0;
    pub const TIM_SR_UIF: u32 = 1 << 0;
    pub const TIM_EGR_UG: u32 = 1 << 0;

    pub const UART_CR1_UE: u32 = 1 << 0;
    pub const UART_CR1_RE: u32 = 1 << 2;
    pub const UART_CR1_TE: u32 = 1 << 3;
    pub const UART_CR1_RXNEIE: u32 = 1 << 5;
    pub const UART_ISR_ORE: u32 = 1 << 3;
    pub const UART_ISR_RXNE: u32 = 1 << 5;
    pub const UART_ISR_TXE: u32 = 1 << 7;
    pub const UART_ICR_ORECF: u32 = 1 << 3;

    /// Read-only view of the RCC block as a [`RegisterFile`](crate::clock::RegisterFile).
    macro_rules! rcc_registers {
        ($name:ident, $rcc:ty) => {
            /// Live RCC registers.
            #[derive(Clone, Copy, Debug)]
            pub struct $name;

            impl $crate::clock::RegisterFile for $name {
                fn read(&self, offset: usize) -> u32 {
                    // SAFETY: every offset in the clock table lies inside the RCC block and
                    // reading RCC registers has no side effects.
                    unsafe {
                        let reg = <$rcc>::ptr().cast::<u8>().add(offset).cast::<u32>();
                        core::ptr::read_volatile(reg)
                    }
                }
            }
        };
    }

    /// Timer driver for a 16-bit timer with an update interrupt.
    macro_rules! update_timer {
        ($name:ident, $tim:ty, $clock:expr) => {
            /// Timer with its input clock taken from the clock tree.
            #[derive(Clone, Copy, Debug)]
            pub struct $name;

            impl $name {
                fn regs(&self) -> &'static <$tim as core::ops::Deref>::Target {
                    // SAFETY: the board owns this timer, nothing else touches it.
                    unsafe { &*<$tim>::ptr() }
                }
            }

            impl $crate::timer::Timer for $name {
                fn clock_hz(&self) -> u32 {
                    $crate::clock::ClockTree::frequency(&clocks(), $clock)
                }

                fn configure(&self, config: &$crate::timer::TimerConfig) {
                    use $crate::chip::hw::*;

                    let tim = self.regs();
                    let mode = if config.one_shot() { TIM_CR1_OPM } else { 0 };

                    tim.cr1.write(|w| unsafe { w.bits(0) });
                    tim.psc.write(|w| unsafe { w.bits(config.prescaler().into()) });
                    tim.arr.write(|w| unsafe { w.bits(config.period().into()) });
                    // URS keeps the update generated below from raising the interrupt.
                    tim.cr1.write(|w| unsafe { w.bits(TIM_CR1_URS | mode) });
                    tim.egr.write(|w| unsafe { w.bits(TIM_EGR_UG) });
                    tim.sr.write(|w| unsafe { w.bits(!TIM_SR_UIF) });
                }

                fn start(&self) {
                    use $crate::chip::hw::*;

                    let tim = self.regs();
                    tim.dier.write(|w| unsafe { w.bits(TIM_DIER_UIE) });
                    tim.cr1.modify(|r, w| unsafe { w.bits(r.bits() | TIM_CR1_CEN) });
                }

                fn stop(&self) {
                    use $crate::chip::hw::*;

                    self.regs()
                        .cr1
                        .modify(|r, w| unsafe { w.bits(r.bits() & !TIM_CR1_CEN) });
                }

                fn take_update(&self) -> bool {
                    use $crate::chip::hw::*;

                    let tim = self.regs();
                    if tim.sr.read().bits() & TIM_SR_UIF == 0 {
                        return false;
                    }
                    // rc_w0: writing ones leaves the other flags alone.
                    tim.sr.write(|w| unsafe { w.bits(!TIM_SR_UIF) });
                    true
                }
            }
        };
    }

    /// Polling transmitter and interrupt driven receiver for a USART/LPUART.
    macro_rules! polled_uart {
        ($name:ident, $uart:ty, $clock:expr, $brr:expr) => {
            /// Console UART.
            #[derive(Clone, Copy, Debug)]
            pub struct $name;

            impl $name {
                fn regs(&self) -> &'static <$uart as core::ops::Deref>::Target {
                    // SAFETY: the board owns this UART, nothing else touches it.
                    unsafe { &*<$uart>::ptr() }
                }

                /// Enable the UART at `baud` with the receive interrupt on.
                pub fn configure(&self, baud: u32) {
                    use $crate::chip::hw::*;

                    let kernel_hz = $crate::clock::ClockTree::frequency(&clocks(), $clock);
                    let brr: u32 = $brr(u64::from(kernel_hz), u64::from(baud.max(1)));
                    $crate::fmt::debug!("uart: {} baud from {} Hz, BRR {}", baud, kernel_hz, brr);

                    let uart = self.regs();
                    uart.cr1.write(|w| unsafe { w.bits(0) });
                    uart.brr.write(|w| unsafe { w.bits(brr) });
                    uart.cr1.write(|w| unsafe {
                        w.bits(UART_CR1_UE | UART_CR1_RE | UART_CR1_TE | UART_CR1_RXNEIE)
                    });
                }
            }

            impl $crate::usart::GenericUart for $name {
                fn write_byte(&self, b: u8) -> Result<(), $crate::Error> {
                    use $crate::chip::hw::*;

                    let uart = self.regs();
                    while uart.isr.read().bits() & UART_ISR_TXE == 0 {}
                    uart.tdr.write(|w| unsafe { w.bits(b.into()) });
                    Ok(())
                }

                fn read_byte(&self) -> Option<u8> {
                    use $crate::chip::hw::*;

                    let uart = self.regs();
                    let isr = uart.isr.read().bits();
                    if isr & UART_ISR_ORE != 0 {
                        uart.icr.write(|w| unsafe { w.bits(UART_ICR_ORECF) });
                    }
                    (isr & UART_ISR_RXNE != 0).then(|| uart.rdr.read().bits() as u8)
                }
            }
        };
    }

    /// Halts the core with `wfi` inside an interrupt-free section.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Wfi;

    impl crate::timer::WaitForInterrupt for Wfi {
        fn wait<F: Fn() -> bool>(&self, ready: F) {
            // A pending interrupt still ends `wfi` with PRIMASK set, so an interrupt that
            // arrives after the check cannot be slept through.
            cortex_m::interrupt::free(|_| {
                if !ready() {
                    cortex_m::asm::wfi();
                }
            });
        }
    }

    pub(crate) use {polled_uart, rcc_registers, update_timer};
}
