//! Placeholder buses for chips without SPI or I2C drivers.

use embedded_hal::i2c::{self, I2c, Operation};
use embedded_hal::spi::{self, SpiBus};

use crate::Error;

/// SPI and I2C bus that rejects every transfer with [`Error::NotImplemented`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Unsupported;

impl spi::ErrorType for Unsupported {
    type Error = Error;
}

impl SpiBus for Unsupported {
    fn read(&mut self, _words: &mut [u8]) -> Result<(), Error> {
        Err(Error::NotImplemented)
    }

    fn write(&mut self, _words: &[u8]) -> Result<(), Error> {
        Err(Error::NotImplemented)
    }

    fn transfer(&mut self, _read: &mut [u8], _write: &[u8]) -> Result<(), Error> {
        Err(Error::NotImplemented)
    }

    fn transfer_in_place(&mut self, _words: &mut [u8]) -> Result<(), Error> {
        Err(Error::NotImplemented)
    }

    fn flush(&mut self) -> Result<(), Error> {
        Err(Error::NotImplemented)
    }
}

impl i2c::ErrorType for Unsupported {
    type Error = Error;
}

impl I2c for Unsupported {
    fn transaction(
        &mut self,
        _address: u8,
        _operations: &mut [Operation<'_>],
    ) -> Result<(), Error> {
        Err(Error::NotImplemented)
    }
}
