#![no_std]

/// Byte sink for resource constrained systems.
pub trait NanoWrite {
    /// Write a byte to the sink.
    fn write_byte(&mut self, b: u8);

    /// Write every byte of `bytes`.
    fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_byte(b);
        }
    }
}

impl<W: NanoWrite + ?Sized> NanoWrite for &mut W {
    fn write_byte(&mut self, b: u8) {
        (**self).write_byte(b);
    }
}

/// Display trait for resource constrained systems.
pub trait NanoDisplay {
    /// Write formatted representation of `self` to `f`.
    fn fmt<F: NanoWrite>(self, f: &mut F);
}

impl NanoDisplay for &str {
    fn fmt<F: NanoWrite>(self, f: &mut F) {
        f.write_bytes(self.as_bytes());
    }
}

impl NanoDisplay for char {
    fn fmt<F: NanoWrite>(self, f: &mut F) {
        let mut buf = [0; 4];
        f.write_bytes(self.encode_utf8(&mut buf).as_bytes());
    }
}

/// Implement NanoDisplay for an unsigned type.
macro_rules! display_unsigned {
    ($ty:ident) => {
        impl $crate::NanoDisplay for $ty {
            fn fmt<F: $crate::NanoWrite>(mut self, f: &mut F) {
                const MAX_POW10: $ty = <$ty>::pow(10, $ty::MAX.ilog10() as u32);

                let mut div = MAX_POW10;
                let mut print = false;

                while div > 0 {
                    let dig = (self / div) as u8;
                    self %= div;
                    div /= 10;

                    if !print && dig > 0 {
                        print = true;
                    }

                    if print || (div == 0) {
                        f.write_byte(b'0' + dig);
                    }
                }
            }
        }
    };
}

/// Implement NanoDisplay for a signed type through its unsigned counterpart.
macro_rules! display_signed {
    ($ty:ident) => {
        impl $crate::NanoDisplay for $ty {
            fn fmt<F: $crate::NanoWrite>(self, f: &mut F) {
                if self < 0 {
                    f.write_byte(b'-');
                }
                self.unsigned_abs().fmt(f);
            }
        }
    };
}

display_unsigned!(u8);
display_unsigned!(u16);
display_unsigned!(u32);
display_unsigned!(u64);
display_unsigned!(u128);
display_unsigned!(usize);

display_signed!(i8);
display_signed!(i16);
display_signed!(i32);
display_signed!(i64);
display_signed!(i128);
display_signed!(isize);
