use core::cell::RefCell;

use critical_section::Mutex;
use nano_fmt::NanoWrite;

use crate::Error;
use crate::fmt::warning;
use crate::ring_buffer::RingBuffer;

/// Byte level access to a UART.
pub trait GenericUart {
    /// Transmit one byte, waiting for room in the transmitter.
    fn write_byte(&self, b: u8) -> Result<(), Error>;

    /// Take a received byte, if there is one.
    fn read_byte(&self) -> Option<u8>;
}

impl<U: GenericUart + ?Sized> GenericUart for &U {
    fn write_byte(&self, b: u8) -> Result<(), Error> {
        (**self).write_byte(b)
    }

    fn read_byte(&self) -> Option<u8> {
        (**self).read_byte()
    }
}

/// UART with a receive buffer filled from its interrupt handler.
pub struct Serial<U, const SIZE: usize> {
    uart: U,
    rx: Mutex<RefCell<RingBuffer<SIZE>>>,
}

impl<U, const SIZE: usize> Serial<U, SIZE> {
    /// Wrap `uart` with an empty receive buffer.
    pub const fn new(uart: U) -> Self {
        Self {
            uart,
            rx: Mutex::new(RefCell::new(RingBuffer::new())),
        }
    }

    /// Underlying UART.
    pub const fn inner(&self) -> &U {
        &self.uart
    }

    /// Number of bytes waiting in the receive buffer.
    pub fn buffered(&self) -> usize {
        critical_section::with(|cs| self.rx.borrow_ref(cs).len())
    }
}

impl<U: GenericUart, const SIZE: usize> Serial<U, SIZE> {
    /// Receive interrupt handler: move every byte the UART holds into the buffer.
    pub fn receive(&self) {
        while let Some(b) = self.uart.read_byte() {
            let dropped = critical_section::with(|cs| self.rx.borrow_ref_mut(cs).put(b));
            if dropped.is_some() {
                warning!("serial receive buffer overflow");
            }
        }
    }
}

impl<U: GenericUart, const SIZE: usize> GenericUart for Serial<U, SIZE> {
    fn write_byte(&self, b: u8) -> Result<(), Error> {
        self.uart.write_byte(b)
    }

    fn read_byte(&self) -> Option<u8> {
        critical_section::with(|cs| self.rx.borrow_ref_mut(cs).get())
    }
}

impl<U: GenericUart, const SIZE: usize> NanoWrite for &Serial<U, SIZE> {
    fn write_byte(&mut self, b: u8) {
        // Output has nowhere to report failures, drop the byte.
        let _ = GenericUart::write_byte(*self, b);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use nano_fmt::NanoDisplay;

    use super::*;

    /// UART double recording transmitted bytes and replaying queued input.
    #[derive(Debug, Default)]
    pub struct MockUart {
        pub sent: Mutex<Vec<u8>>,
        pub incoming: Mutex<Vec<u8>>,
    }

    impl MockUart {
        pub fn sent(&self) -> Vec<u8> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl GenericUart for MockUart {
        fn write_byte(&self, b: u8) -> Result<(), Error> {
            self.sent.lock().unwrap().push(b);
            Ok(())
        }

        fn read_byte(&self) -> Option<u8> {
            let mut incoming = self.incoming.lock().unwrap();
            (!incoming.is_empty()).then(|| incoming.remove(0))
        }
    }

    #[test]
    fn receive_buffers_input() {
        let serial = Serial::<_, 8>::new(MockUart::default());
        serial.inner().incoming.lock().unwrap().extend_from_slice(b"hi");

        serial.receive();
        assert_eq!(serial.buffered(), 2);
        assert_eq!(serial.read_byte(), Some(b'h'));
        assert_eq!(serial.read_byte(), Some(b'i'));
        assert_eq!(serial.read_byte(), None);
    }

    #[test]
    fn receive_overflow_keeps_newest() {
        let serial = Serial::<_, 4>::new(MockUart::default());
        serial
            .inner()
            .incoming
            .lock()
            .unwrap()
            .extend_from_slice(b"abcdef");

        serial.receive();
        assert_eq!(serial.buffered(), 4);
        assert_eq!(serial.read_byte(), Some(b'c'));
    }

    #[test]
    fn formatted_output() {
        let serial = Serial::<_, 4>::new(MockUart::default());
        let mut w = &serial;

        "ticks=".fmt(&mut w);
        1234u32.fmt(&mut w);
        assert_eq!(serial.inner().sent(), b"ticks=1234");
    }
}
