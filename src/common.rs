/// The one address the chip is hardwired to.
pub const SUPPORTED_ADDRESS: u8 = 0x21;

/// Addresses probed during bus enumeration.
///
/// `0x20` is the chip's base address with all address pins low.  It is part of the scan, but
/// detection only ever accepts [`SUPPORTED_ADDRESS`].
pub const NORMAL_ADDRESSES: &[u8] = &[0x20, 0x21];

/// Register map, valid for `IOCON.BANK = 0` which is the reset state of the chip (and this
/// driver does not change it).
///
/// Port A is wired as latched outputs and port B as inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Regs {
    /// IODIR: input/output direction: 0=output; 1=input
    IODIRA = 0x00,
    /// IODIR: input/output direction: 0=output; 1=input
    IODIRB = 0x01,
    /// GPIO: reflects logic level on pins
    GPIOA = 0x12,
    /// GPIO: reflects logic level on pins
    GPIOB = 0x13,
    /// OLAT: output latches: sets state for pins configured as outputs
    OLATA = 0x14,
    /// OLAT: output latches: sets state for pins configured as outputs
    OLATB = 0x15,
}

impl Regs {
    /// Direction register of the output port.
    pub const OUTPUT_DIRECTION: Regs = Regs::IODIRA;
    /// Direction register of the input port.
    pub const INPUT_DIRECTION: Regs = Regs::IODIRB;
    /// Latch driving the output port.
    pub const OUTPUT: Regs = Regs::OLATA;
    /// Pin levels of the input port.
    pub const INPUT: Regs = Regs::GPIOB;
}

impl From<Regs> for u8 {
    fn from(r: Regs) -> u8 {
        r as u8
    }
}

/// Direction of all eight pins of one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    /// IODIR value putting all eight pins of a port into this direction.
    pub const fn port_mask(self) -> u8 {
        match self {
            Direction::Input => 0xff,
            Direction::Output => 0x00,
        }
    }
}
