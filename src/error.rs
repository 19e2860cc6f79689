use core::fmt;

/// No compatible chip at the candidate address, or the adapter cannot do byte-data transfers.
///
/// This is a negative match for the enumerator, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NotFound;

/// Malformed text written to the `output` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputError {
    /// Nothing (or only a newline) was written.
    Empty,
    /// Something other than an optional sign followed by decimal digits.
    InvalidDigit,
    /// The number does not fit a signed 32-bit integer.
    Overflow,
}

/// Errors of the `output` and `input` attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AttrError<E> {
    /// The written text was rejected before any bus access.
    Input(InputError),
    /// The bus transaction failed.
    Transport(E),
    /// No chip is bound at the requested address.
    NotBound,
    /// The chip has no attribute by that name.
    NoSuchAttribute,
    /// Reading a write-only attribute or writing a read-only one.
    PermissionDenied,
}

impl<E> From<InputError> for AttrError<E> {
    fn from(e: InputError) -> Self {
        AttrError::Input(e)
    }
}

/// Errors while binding a detected chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BindError<E> {
    /// A direction register write failed, the chip was not exposed.
    Transport(E),
    /// A chip is already bound at this address.
    AlreadyBound,
    /// The device name is not in the id table.
    UnknownDevice,
    /// No room for another client.
    NoMemory,
}

/// Errors while unbinding a chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UnbindError {
    /// No chip is bound at this address.
    NotBound,
    /// `n` requests are still in flight.
    Busy(usize),
}

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("no compatible device found")
    }
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::Empty => f.write_str("empty value"),
            InputError::InvalidDigit => f.write_str("not a decimal integer"),
            InputError::Overflow => f.write_str("value out of range"),
        }
    }
}

impl<E: fmt::Debug> fmt::Display for AttrError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrError::Input(e) => write!(f, "invalid input: {}", e),
            AttrError::Transport(e) => write!(f, "bus transaction failed: {:?}", e),
            AttrError::NotBound => f.write_str("no device bound at this address"),
            AttrError::NoSuchAttribute => f.write_str("no such attribute"),
            AttrError::PermissionDenied => f.write_str("permission denied"),
        }
    }
}

impl<E: fmt::Debug> fmt::Display for BindError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::Transport(e) => write!(f, "device initialization failed: {:?}", e),
            BindError::AlreadyBound => f.write_str("a device is already bound at this address"),
            BindError::UnknownDevice => f.write_str("device name not in the id table"),
            BindError::NoMemory => f.write_str("out of memory"),
        }
    }
}

impl fmt::Display for UnbindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnbindError::NotBound => f.write_str("no device bound at this address"),
            UnbindError::Busy(n) => write!(f, "device busy with {} requests", n),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl std::error::Error for NotFound {}
#[cfg(any(test, feature = "std"))]
impl std::error::Error for InputError {}
#[cfg(any(test, feature = "std"))]
impl<E: fmt::Debug> std::error::Error for AttrError<E> {}
#[cfg(any(test, feature = "std"))]
impl<E: fmt::Debug> std::error::Error for BindError<E> {}
#[cfg(any(test, feature = "std"))]
impl std::error::Error for UnbindError {}
