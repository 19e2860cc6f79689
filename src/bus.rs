use embedded_hal::i2c as hal_i2c;

bitflags::bitflags! {
    /// Transaction primitives an I2C adapter is able to perform.
    ///
    /// The bit layout follows the Linux `I2C_FUNC_*` constants so a host running on top of
    /// `/dev/i2c-*` can pass the value reported by the `I2C_FUNCS` ioctl straight through.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Functionality: u32 {
        /// Plain I2C-level commands (combined read/write transfers).
        const I2C = 0x0000_0001;
        const SMBUS_QUICK = 0x0001_0000;
        const SMBUS_READ_BYTE = 0x0002_0000;
        const SMBUS_WRITE_BYTE = 0x0004_0000;
        const SMBUS_READ_BYTE_DATA = 0x0008_0000;
        const SMBUS_WRITE_BYTE_DATA = 0x0010_0000;
        const SMBUS_READ_WORD_DATA = 0x0020_0000;
        const SMBUS_WRITE_WORD_DATA = 0x0040_0000;

        /// Addressed single-register byte read and write, which is all this driver needs.
        const SMBUS_BYTE_DATA = Self::SMBUS_READ_BYTE_DATA.bits()
            | Self::SMBUS_WRITE_BYTE_DATA.bits();

        /// Everything an I2C master can emulate in software.
        const SMBUS_EMUL = Self::SMBUS_QUICK.bits()
            | Self::SMBUS_READ_BYTE.bits()
            | Self::SMBUS_WRITE_BYTE.bits()
            | Self::SMBUS_BYTE_DATA.bits()
            | Self::SMBUS_READ_WORD_DATA.bits()
            | Self::SMBUS_WRITE_WORD_DATA.bits();
    }
}

impl Functionality {
    /// What any `embedded-hal` I2C master offers: raw transfers plus full SMBus emulation.
    pub const fn embedded_hal() -> Self {
        Self::I2C.union(Self::SMBUS_EMUL)
    }
}

/// A bus adapter as seen during enumeration.
///
/// Detection only ever asks the adapter what it can do, it never talks to the bus.
pub trait Adapter {
    fn functionality(&self) -> Functionality;

    /// Check that every primitive in `required` is supported.
    fn check_functionality(&self, required: Functionality) -> bool {
        self.functionality().contains(required)
    }
}

impl Adapter for Functionality {
    fn functionality(&self) -> Functionality {
        *self
    }
}

impl<A: Adapter + ?Sized> Adapter for &A {
    fn functionality(&self) -> Functionality {
        (**self).functionality()
    }
}

/// Single-register byte accesses on top of an `embedded-hal` I2C bus.
///
/// These are the only two bus transactions the driver ever issues.
pub(crate) trait I2cExt {
    type Error;

    fn write_reg<R: Into<u8>>(&mut self, addr: u8, reg: R, value: u8) -> Result<(), Self::Error>;
    fn read_reg<R: Into<u8>>(&mut self, addr: u8, reg: R) -> Result<u8, Self::Error>;
}

impl<I2C: hal_i2c::I2c> I2cExt for I2C {
    type Error = I2C::Error;

    fn write_reg<R: Into<u8>>(&mut self, addr: u8, reg: R, value: u8) -> Result<(), Self::Error> {
        self.write(addr, &[reg.into(), value])
    }

    fn read_reg<R: Into<u8>>(&mut self, addr: u8, reg: R) -> Result<u8, Self::Error> {
        let mut buf = [0x00];
        self.write_read(addr, &[reg.into()], &mut buf)?;
        Ok(buf[0])
    }
}
