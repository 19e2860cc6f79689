//! Driver core for an MCP23017-style I2C port-expander wired with port A as latched outputs and
//! port B as inputs.
//!
//! The crate covers bus-address detection, the one-time direction setup at bind time and a
//! register access layer that serializes every transaction on a bound chip.  On top of that sit
//! the two control points a chip exposes, `output` and `input`, and (with `std`) a [`Registry`]
//! modelling the host's bind/unbind lifecycle.
//!
//! ```
//! # use embedded_hal_mock::eh1::i2c::{Mock, Transaction};
//! # let expectations = [
//! #     Transaction::write(0x21, vec![0x00, 0x00]),
//! #     Transaction::write(0x21, vec![0x01, 0xff]),
//! #     Transaction::write(0x21, vec![0x14, 0x2a]),
//! #     Transaction::write_read(0x21, vec![0x13], vec![0x07]),
//! # ];
//! # let mut i2c = Mock::new(&expectations);
//! use chip_i2c::{Functionality, Registry};
//!
//! let registry = Registry::new();
//! assert_eq!(registry.scan(&Functionality::embedded_hal(), &mut i2c), [0x21]);
//!
//! registry.store(0x21, "output", "42\n", &mut i2c).unwrap();
//! assert_eq!(registry.show(0x21, "input", &mut i2c).unwrap(), "7\n");
//! # i2c.done();
//! ```
#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[macro_use]
mod fmt;

pub mod attr;
mod bus;
pub mod client;
mod common;
mod detect;
mod error;
mod mutex;
#[cfg(any(test, feature = "std"))]
mod registry;

pub use attr::{get_input, set_output, Attribute, Mode, ATTRIBUTES, INPUT_TEXT_LEN};
pub use bus::{Adapter, Functionality};
pub use client::{ClientState, Clock, Timestamps};
#[cfg(any(test, feature = "std"))]
pub use client::{StdClientState, StdClock};
pub use common::{Direction, Regs, NORMAL_ADDRESSES, SUPPORTED_ADDRESS};
pub use detect::{detect, device_id, DeviceId, DEVICE_IDS, DRIVER_NAME};
pub use error::{AttrError, BindError, InputError, NotFound, UnbindError};
pub use mutex::ChipMutex;
#[cfg(any(test, feature = "std"))]
pub use registry::{BoardInfo, ClientHandle, Registry};

pub(crate) use bus::I2cExt;
