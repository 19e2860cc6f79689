//! Per-chip client state and the register access layer.
//!
//! Every bus transaction the driver issues goes through [`ClientState::read`] or
//! [`ClientState::write`].  Both hold the client's lock for exactly one transaction, so callers
//! sharing a bound chip can never interleave on the bus.
use crate::{ChipMutex, Direction, I2cExt, Regs};

/// Monotonic time source for the access bookkeeping.
pub trait Clock {
    /// Current time in ticks.  Must never go backwards.
    fn now(&self) -> u64;
}

impl<F: Fn() -> u64> Clock for F {
    fn now(&self) -> u64 {
        self()
    }
}

/// Microseconds since the clock was created.
#[cfg(any(test, feature = "std"))]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: std::time::Instant,
}

#[cfg(any(test, feature = "std"))]
impl StdClock {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "std"))]
impl Clock for StdClock {
    fn now(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

/// When the ports were last touched successfully.  Informational only.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamps {
    pub last_output_update: Option<u64>,
    pub last_input_read: Option<u64>,
}

/// State of one bound chip.
///
/// A `ClientState` only exists for a chip whose direction registers were configured
/// successfully; see [`ClientState::probe`].  It is neither `Clone` nor `Copy`.
pub struct ClientState<M, C> {
    lock: M,
    clock: C,
    address: u8,
    variant: u8,
}

#[cfg(any(test, feature = "std"))]
pub type StdClientState = ClientState<std::sync::Mutex<Timestamps>, StdClock>;

impl<M, C> ClientState<M, C>
where
    M: ChipMutex<Data = Timestamps>,
    C: Clock,
{
    /// Bind a chip: allocate its state and configure the port directions.
    ///
    /// The state is only handed out when both direction registers were written.  On a bus error
    /// the chip is left in an unknown direction state and must not be used.
    pub fn probe<I2C>(
        i2c: &mut I2C,
        address: u8,
        id: &crate::DeviceId,
        clock: C,
    ) -> Result<Self, I2C::Error>
    where
        I2C: embedded_hal::i2c::I2c,
    {
        info!("probing {=str} at {=u8:#x}", id.name, address);
        let state = Self {
            lock: M::create(Timestamps::default()),
            clock,
            address,
            variant: id.variant,
        };
        state.init(i2c)?;
        Ok(state)
    }

    /// Configure port A as latched outputs, then port B as inputs.
    ///
    /// Stops at the first failed write.
    fn init<I2C>(&self, i2c: &mut I2C) -> Result<(), I2C::Error>
    where
        I2C: embedded_hal::i2c::I2c,
    {
        debug!("init client at {=u8:#x}", self.address);
        self.write(i2c, Regs::OUTPUT_DIRECTION, Direction::Output.port_mask())
            .inspect_err(|_| warn!("setting output direction failed"))?;
        self.write(i2c, Regs::INPUT_DIRECTION, Direction::Input.port_mask())
            .inspect_err(|_| warn!("setting input direction failed"))?;
        Ok(())
    }

    /// Read one register.
    pub fn read<I2C>(&self, i2c: &mut I2C, reg: Regs) -> Result<u8, I2C::Error>
    where
        I2C: embedded_hal::i2c::I2c,
    {
        let value = self.lock.lock(|ts| {
            let res = i2c.read_reg(self.address, reg);
            if res.is_ok() && reg == Regs::INPUT {
                ts.last_input_read = Some(self.clock.now());
            }
            res
        })?;
        trace!("read reg {=u8:#x} returned {=u8:#x}", u8::from(reg), value);
        Ok(value)
    }

    /// Write one register.
    pub fn write<I2C>(&self, i2c: &mut I2C, reg: Regs, value: u8) -> Result<(), I2C::Error>
    where
        I2C: embedded_hal::i2c::I2c,
    {
        self.lock.lock(|ts| {
            let res = i2c.write_reg(self.address, reg, value);
            if res.is_ok() && reg == Regs::OUTPUT {
                ts.last_output_update = Some(self.clock.now());
            }
            res
        })?;
        trace!("write reg {=u8:#x} with {=u8:#x}", u8::from(reg), value);
        Ok(())
    }

    /// Snapshot of the access bookkeeping.
    pub fn timestamps(&self) -> Timestamps {
        self.lock.lock(|ts| *ts)
    }
}

impl<M, C> ClientState<M, C> {
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Chip sub-model, from the id table entry that matched at bind time.
    pub fn variant(&self) -> u8 {
        self.variant
    }
}
