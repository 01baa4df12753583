#![cfg_attr(not(test), no_std)]

#[cfg(all(feature = "stm32l5x2", feature = "stm32f7x2"))]
compile_error!("select exactly one chip family feature");

mod fmt;

pub mod board;
pub mod bus;
pub mod chip;
pub mod clock;
pub mod delay;
pub mod error;
pub mod ring_buffer;
pub mod runtime;
pub mod timer;
pub mod usart;

pub use error::Error;
pub use nano_fmt;
