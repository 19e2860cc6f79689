//! The two control points a bound chip exposes.
//!
//! `output` takes decimal text and drives the output port latch, `input` renders the input port
//! levels as decimal text.  Each access is exactly one register transaction, nothing is cached.
use crate::{AttrError, ChipMutex, ClientState, Clock, InputError, Regs, Timestamps};
use core::fmt::Write;
use core::num::IntErrorKind;

/// Longest text `get_input` produces: three digits plus the newline.
pub const INPUT_TEXT_LEN: usize = 4;

/// Access allowed on an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    ReadOnly,
    WriteOnly,
}

/// An attribute as registered with the host at bind time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Attribute {
    pub name: &'static str,
    pub mode: Mode,
}

impl Attribute {
    pub const OUTPUT: Attribute = Attribute {
        name: "output",
        mode: Mode::WriteOnly,
    };
    pub const INPUT: Attribute = Attribute {
        name: "input",
        mode: Mode::ReadOnly,
    };

    pub fn is_readable(&self) -> bool {
        self.mode == Mode::ReadOnly
    }

    pub fn is_writable(&self) -> bool {
        self.mode == Mode::WriteOnly
    }
}

/// Attributes every bound chip exposes.
pub const ATTRIBUTES: &[Attribute] = &[Attribute::OUTPUT, Attribute::INPUT];

/// Parse a signed decimal integer the way attribute writes are parsed.
///
/// A leading `+` or `-` and a single trailing newline are accepted, anything else must be a
/// decimal digit.
pub fn parse_value(text: &str) -> Result<i32, InputError> {
    let digits = text.strip_suffix('\n').unwrap_or(text);
    digits.parse::<i32>().map_err(|e| match e.kind() {
        IntErrorKind::Empty => InputError::Empty,
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => InputError::Overflow,
        _ => InputError::InvalidDigit,
    })
}

/// Drive the output port with the value written as `text`.
///
/// The text is parsed before the chip is locked; malformed text never reaches the bus.  The
/// value is truncated to the 8-bit port width.
pub fn set_output<M, C, I2C>(
    state: &ClientState<M, C>,
    i2c: &mut I2C,
    text: &str,
) -> Result<(), AttrError<I2C::Error>>
where
    M: ChipMutex<Data = Timestamps>,
    C: Clock,
    I2C: embedded_hal::i2c::I2c,
{
    let value = parse_value(text).inspect_err(|_| warn!("rejected output value"))?;
    debug!("set output to {=i32}", value);
    state
        .write(i2c, Regs::OUTPUT, value as u8)
        .map_err(AttrError::Transport)
}

/// Read the input port and render it as decimal text with a trailing newline.
pub fn get_input<M, C, I2C>(
    state: &ClientState<M, C>,
    i2c: &mut I2C,
) -> Result<heapless::String<INPUT_TEXT_LEN>, I2C::Error>
where
    M: ChipMutex<Data = Timestamps>,
    C: Clock,
    I2C: embedded_hal::i2c::I2c,
{
    let value = state.read(i2c, Regs::INPUT)?;
    debug!("input read returned {=u8}", value);

    let mut text = heapless::String::new();
    // cannot fail, a u8 needs at most three digits
    let res = writeln!(text, "{}", value);
    debug_assert!(res.is_ok());
    Ok(text)
}
