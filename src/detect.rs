//! Bus enumeration support.
//!
//! Detection is pure: it looks at the adapter's capabilities and the candidate address and
//! nothing else, so it can run concurrently with anything, including itself.
use crate::{Adapter, Functionality, NotFound, SUPPORTED_ADDRESS};

/// Name the driver binds under.
pub const DRIVER_NAME: &str = "chip_i2c";

/// One entry of the device id table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceId {
    pub name: &'static str,
    /// Chip sub-model, copied into the client state at bind time.
    pub variant: u8,
}

/// Devices this driver can bind to.
pub const DEVICE_IDS: &[DeviceId] = &[DeviceId {
    name: DRIVER_NAME,
    variant: 0,
}];

/// Look up the id table entry for a detected device name.
pub fn device_id(name: &str) -> Option<&'static DeviceId> {
    DEVICE_IDS.iter().find(|id| id.name == name)
}

/// Decide whether the chip sits at `address` on the bus behind `adapter`.
///
/// Returns the device name to bind with.  The address is hardwired, so there is nothing to
/// probe on the wire: an adapter that cannot do byte-data transfers never matches, otherwise
/// only [`SUPPORTED_ADDRESS`] does.
pub fn detect<A: Adapter>(adapter: &A, address: u8) -> Result<&'static str, NotFound> {
    if !adapter.check_functionality(Functionality::SMBUS_BYTE_DATA) {
        debug!("adapter lacks byte-data support");
        return Err(NotFound);
    }

    if address != SUPPORTED_ADDRESS {
        return Err(NotFound);
    }

    info!("chip device found at {=u8:#x}", address);
    Ok(DRIVER_NAME)
}
