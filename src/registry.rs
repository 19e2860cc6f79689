//! Host side of the driver lifecycle.
//!
//! A [`Registry`] is owned by whatever enumerates the bus.  It binds detected chips, keeps their
//! client state, dispatches attribute reads and writes by name and tears clients down again.
//! There is no process-wide state; two registries know nothing of each other.
use crate::{
    attr, detect, device_id, Adapter, AttrError, Attribute, BindError, ClientState, StdClientState,
    StdClock, UnbindError, ATTRIBUTES, INPUT_TEXT_LEN, NORMAL_ADDRESSES,
};
use std::collections::hash_map::Entry as Slot;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// A chip to bind, as produced by detection or declared by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardInfo {
    pub name: &'static str,
    pub address: u8,
}

/// A bound chip and the number of handles onto it.
struct Entry {
    state: StdClientState,
    users: Mutex<usize>,
    idle: Condvar,
}

impl Entry {
    fn users(&self) -> MutexGuard<'_, usize> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Access to the client state of a bound chip.
///
/// [`Registry::unbind`] waits until every handle onto the chip has been dropped.
pub struct ClientHandle {
    entry: Arc<Entry>,
}

impl ClientHandle {
    fn new(entry: &Arc<Entry>) -> Self {
        *entry.users() += 1;
        Self {
            entry: Arc::clone(entry),
        }
    }
}

impl Deref for ClientHandle {
    type Target = StdClientState;

    fn deref(&self) -> &StdClientState {
        &self.entry.state
    }
}

impl Drop for ClientHandle {
    fn drop(&mut self) {
        let mut users = self.entry.users();
        *users -= 1;
        if *users == 0 {
            self.entry.idle.notify_all();
        }
    }
}

/// Bound chips of one bus, keyed by address.
#[derive(Default)]
pub struct Registry {
    clients: Mutex<HashMap<u8, Arc<Entry>>>,
    limit: Option<usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that holds at most `limit` bound chips.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<u8, Arc<Entry>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_room<E>(&self, clients: &mut HashMap<u8, Arc<Entry>>) -> Result<(), BindError<E>> {
        if self.limit.is_some_and(|limit| clients.len() >= limit) {
            return Err(BindError::NoMemory);
        }
        clients.try_reserve(1).map_err(|_| BindError::NoMemory)
    }

    /// Bind a chip and register its attributes.
    ///
    /// The chip is configured without holding the table, so requests to other chips carry on
    /// meanwhile.  Nothing is registered unless both direction registers were configured.
    pub fn bind<I2C>(&self, i2c: &mut I2C, info: BoardInfo) -> Result<(), BindError<I2C::Error>>
    where
        I2C: embedded_hal::i2c::I2c,
    {
        let id = device_id(info.name).ok_or(BindError::UnknownDevice)?;

        {
            let mut clients = self.clients();
            if clients.contains_key(&info.address) {
                return Err(BindError::AlreadyBound);
            }
            self.check_room(&mut clients)?;
        }

        let state: StdClientState = ClientState::probe(i2c, info.address, id, StdClock::new())
            .map_err(BindError::Transport)?;

        // a concurrent bind of the same address may have won while the chip was configured
        let mut clients = self.clients();
        self.check_room(&mut clients)?;
        match clients.entry(info.address) {
            Slot::Occupied(_) => Err(BindError::AlreadyBound),
            Slot::Vacant(slot) => {
                slot.insert(Arc::new(Entry {
                    state,
                    users: Mutex::new(0),
                    idle: Condvar::new(),
                }));
                info!("bound {=str} at {=u8:#x}", info.name, info.address);
                Ok(())
            }
        }
    }

    /// Run detection over the scan list and bind every match.
    ///
    /// Returns the addresses that were bound.  A chip that fails to bind is skipped.
    pub fn scan<A, I2C>(&self, adapter: &A, i2c: &mut I2C) -> Vec<u8>
    where
        A: Adapter,
        I2C: embedded_hal::i2c::I2c,
    {
        let mut bound = Vec::new();
        for &address in NORMAL_ADDRESSES {
            let Ok(name) = detect(adapter, address) else {
                continue;
            };
            match self.bind(i2c, BoardInfo { name, address }) {
                Ok(()) => bound.push(address),
                Err(_) => warn!("binding {=u8:#x} failed", address),
            }
        }
        bound
    }

    /// Attributes registered for the chip at `address`, if one is bound.
    pub fn attributes(&self, address: u8) -> Option<&'static [Attribute]> {
        self.clients().contains_key(&address).then_some(ATTRIBUTES)
    }

    /// Addresses with a bound chip, in ascending order.
    pub fn bound_addresses(&self) -> Vec<u8> {
        let mut addresses: Vec<_> = self.clients().keys().copied().collect();
        addresses.sort_unstable();
        addresses
    }

    /// Client state of the chip at `address`.
    ///
    /// Holding on to the returned handle keeps [`Registry::unbind`] waiting.
    pub fn client(&self, address: u8) -> Option<ClientHandle> {
        self.clients().get(&address).map(ClientHandle::new)
    }

    fn lookup<E>(
        &self,
        address: u8,
        name: &str,
    ) -> Result<(ClientHandle, Attribute), AttrError<E>> {
        let client = self.client(address).ok_or(AttrError::NotBound)?;
        let attribute = ATTRIBUTES
            .iter()
            .find(|a| a.name == name)
            .copied()
            .ok_or(AttrError::NoSuchAttribute)?;
        Ok((client, attribute))
    }

    /// Write `text` to the attribute `name` of the chip at `address`.
    ///
    /// Returns the number of bytes consumed.
    pub fn store<I2C>(
        &self,
        address: u8,
        name: &str,
        text: &str,
        i2c: &mut I2C,
    ) -> Result<usize, AttrError<I2C::Error>>
    where
        I2C: embedded_hal::i2c::I2c,
    {
        let (client, attribute) = self.lookup(address, name)?;
        if attribute != Attribute::OUTPUT {
            return Err(AttrError::PermissionDenied);
        }
        attr::set_output(&*client, i2c, text)?;
        Ok(text.len())
    }

    /// Read the attribute `name` of the chip at `address`.
    pub fn show<I2C>(
        &self,
        address: u8,
        name: &str,
        i2c: &mut I2C,
    ) -> Result<heapless::String<INPUT_TEXT_LEN>, AttrError<I2C::Error>>
    where
        I2C: embedded_hal::i2c::I2c,
    {
        let (client, attribute) = self.lookup(address, name)?;
        if attribute != Attribute::INPUT {
            return Err(AttrError::PermissionDenied);
        }
        attr::get_input(&*client, i2c).map_err(AttrError::Transport)
    }

    /// Unbind the chip at `address` unless a request is still in flight.
    pub fn try_unbind(&self, address: u8) -> Result<(), UnbindError> {
        let mut clients = self.clients();
        let entry = clients.get(&address).ok_or(UnbindError::NotBound)?;
        let users = *entry.users();
        if users > 0 {
            return Err(UnbindError::Busy(users));
        }
        clients.remove(&address);
        info!("unbound {=u8:#x}", address);
        Ok(())
    }

    /// Unbind the chip at `address`, waiting for requests in flight.
    ///
    /// The attributes are unregistered first, so no new request can reach the chip.  The calling
    /// thread then sleeps until the last handle is dropped, after which no transaction can be in
    /// flight and the client state is destroyed.
    pub fn unbind(&self, address: u8) -> Result<(), UnbindError> {
        let entry = self
            .clients()
            .remove(&address)
            .ok_or(UnbindError::NotBound)?;

        debug!("unbind of {=u8:#x} waiting for requests", address);
        let users = entry
            .idle
            .wait_while(entry.users(), |users| *users > 0)
            .unwrap_or_else(PoisonError::into_inner);
        drop(users);
        drop(entry);
        info!("unbound {=u8:#x}", address);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BoardInfo, Registry};
    use crate::client::tests::{Event, Recorder};
    use crate::{
        AttrError, BindError, Functionality, InputError, UnbindError, ATTRIBUTES, DRIVER_NAME,
    };
    use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation, SevenBitAddress};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{mpsc, Arc, Mutex};
    use std::time::Duration;

    const CHIP: BoardInfo = BoardInfo {
        name: DRIVER_NAME,
        address: 0x21,
    };

    #[test]
    fn bind_registers_attributes() {
        let registry = Registry::new();
        let mut bus = Recorder::default();
        assert_eq!(registry.attributes(0x21), None);

        registry.bind(&mut bus, CHIP).unwrap();

        assert_eq!(registry.attributes(0x21), Some(ATTRIBUTES));
        assert_eq!(registry.bound_addresses(), [0x21]);
        assert_eq!(registry.client(0x21).map(|c| c.variant()), Some(0));
        assert_eq!(
            bus.log(),
            [
                Event::Write {
                    reg: 0x00,
                    value: 0x00
                },
                Event::Write {
                    reg: 0x01,
                    value: 0xff
                },
            ]
        );
    }

    #[test]
    fn failed_output_direction_aborts_bind() {
        let registry = Registry::new();
        let mut bus = Recorder::default();
        bus.fail_on(0x00);

        assert_eq!(
            registry.bind(&mut bus, CHIP),
            Err(BindError::Transport(ErrorKind::Other))
        );
        assert_eq!(registry.attributes(0x21), None);
        // the input direction is never attempted
        assert!(bus.log().is_empty());
    }

    #[test]
    fn failed_input_direction_aborts_bind() {
        let registry = Registry::new();
        let mut bus = Recorder::default();
        bus.fail_on(0x01);

        assert_eq!(
            registry.bind(&mut bus, CHIP),
            Err(BindError::Transport(ErrorKind::Other))
        );
        assert_eq!(registry.attributes(0x21), None);
        assert_eq!(
            registry.show(0x21, "input", &mut bus),
            Err(AttrError::NotBound)
        );
    }

    #[test]
    fn bind_rejects_duplicates_and_unknown_devices() {
        let registry = Registry::new();
        let mut bus = Recorder::default();

        registry.bind(&mut bus, CHIP).unwrap();
        assert_eq!(registry.bind(&mut bus, CHIP), Err(BindError::AlreadyBound));
        assert_eq!(
            registry.bind(
                &mut bus,
                BoardInfo {
                    name: "pca9555",
                    address: 0x22
                }
            ),
            Err(BindError::UnknownDevice)
        );
        assert_eq!(bus.log().len(), 2);
    }

    #[test]
    fn scan_binds_hardwired_address_only() {
        let registry = Registry::new();
        let mut bus = Recorder::default();

        assert_eq!(registry.scan(&Functionality::embedded_hal(), &mut bus), [0x21]);
        assert_eq!(registry.attributes(0x20), None);
        assert_eq!(registry.attributes(0x21), Some(ATTRIBUTES));
    }

    #[test]
    fn scan_skips_incapable_adapter() {
        let registry = Registry::new();
        let mut bus = Recorder::default();

        assert!(registry.scan(&Functionality::I2C, &mut bus).is_empty());
        assert!(registry.bound_addresses().is_empty());
        assert!(bus.log().is_empty());
    }

    #[test]
    fn attribute_dispatch() {
        let registry = Registry::new();
        let mut bus = Recorder::default();
        registry.bind(&mut bus, CHIP).unwrap();
        bus.set_input(7);

        assert_eq!(registry.store(0x21, "output", "42\n", &mut bus), Ok(3));
        assert_eq!(registry.show(0x21, "input", &mut bus).unwrap(), "7\n");
        assert_eq!(
            registry.store(0x21, "output", "not-a-number", &mut bus),
            Err(AttrError::Input(InputError::InvalidDigit))
        );
        assert_eq!(
            bus.log()[2..],
            [
                Event::Write {
                    reg: 0x14,
                    value: 42
                },
                Event::Read { reg: 0x13 },
            ]
        );
        let ts = registry.client(0x21).unwrap().timestamps();
        assert!(ts.last_output_update.is_some());
        assert!(ts.last_input_read.is_some());
    }

    #[test]
    fn attribute_permissions() {
        let registry = Registry::new();
        let mut bus = Recorder::default();
        registry.bind(&mut bus, CHIP).unwrap();

        assert_eq!(
            registry.show(0x21, "output", &mut bus),
            Err(AttrError::PermissionDenied)
        );
        assert_eq!(
            registry.store(0x21, "input", "1", &mut bus),
            Err(AttrError::PermissionDenied)
        );
        assert_eq!(
            registry.show(0x21, "chip_led", &mut bus),
            Err(AttrError::NoSuchAttribute)
        );
        assert_eq!(
            registry.store(0x20, "output", "1", &mut bus),
            Err(AttrError::NotBound)
        );
        assert_eq!(bus.log().len(), 2);
    }

    #[test]
    fn unbind_unregisters() {
        let registry = Registry::new();
        let mut bus = Recorder::default();
        registry.bind(&mut bus, CHIP).unwrap();

        assert_eq!(registry.try_unbind(0x21), Ok(()));
        assert_eq!(registry.attributes(0x21), None);
        assert_eq!(registry.try_unbind(0x21), Err(UnbindError::NotBound));
        assert_eq!(registry.unbind(0x21), Err(UnbindError::NotBound));

        registry.bind(&mut bus, CHIP).unwrap();
        assert_eq!(registry.unbind(0x21), Ok(()));
        assert!(registry.bound_addresses().is_empty());
    }

    /// Transport that parks every transaction until the test lets it go.
    #[derive(Clone)]
    struct Gate {
        armed: Arc<AtomicBool>,
        entered: mpsc::SyncSender<()>,
        release: Arc<Mutex<mpsc::Receiver<()>>>,
        events: Arc<Mutex<Vec<&'static str>>>,
    }

    impl ErrorType for Gate {
        type Error = ErrorKind;
    }

    impl I2c<SevenBitAddress> for Gate {
        fn transaction(
            &mut self,
            _address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if self.armed.load(Ordering::SeqCst) {
                self.entered.send(()).unwrap();
                self.release.lock().unwrap().recv().unwrap();
                self.events.lock().unwrap().push("transaction done");
            }
            for op in operations.iter_mut() {
                if let Operation::Read(buf) = op {
                    buf.fill(0);
                }
            }
            Ok(())
        }
    }

    #[test]
    fn unbind_waits_for_transaction_in_flight() {
        let (entered_tx, entered_rx) = mpsc::sync_channel(1);
        let (release_tx, release_rx) = mpsc::channel();
        let gate = Gate {
            armed: Arc::new(AtomicBool::new(false)),
            entered: entered_tx,
            release: Arc::new(Mutex::new(release_rx)),
            events: Arc::new(Mutex::new(Vec::new())),
        };
        let registry = Registry::new();
        registry.bind(&mut gate.clone(), CHIP).unwrap();
        gate.armed.store(true, Ordering::SeqCst);

        std::thread::scope(|s| {
            let registry = &registry;
            let mut bus = gate.clone();
            let reader = s.spawn(move || registry.show(0x21, "input", &mut bus));

            entered_rx.recv().unwrap();
            assert_eq!(registry.try_unbind(0x21), Err(UnbindError::Busy(1)));

            let events = gate.events.clone();
            let unbinder = s.spawn(move || {
                registry.unbind(0x21).unwrap();
                events.lock().unwrap().push("unbound");
            });

            std::thread::sleep(Duration::from_millis(50));
            assert!(!unbinder.is_finished());
            assert_eq!(registry.attributes(0x21), None);

            release_tx.send(()).unwrap();
            unbinder.join().unwrap();
            assert_eq!(reader.join().unwrap().unwrap(), "0\n");
        });

        assert_eq!(
            *gate.events.lock().unwrap(),
            ["transaction done", "unbound"]
        );
    }

    #[test]
    fn bind_beyond_limit_is_out_of_memory() {
        let registry = Registry::with_limit(1);
        let mut bus = Recorder::default();
        registry.bind(&mut bus, CHIP).unwrap();

        assert_eq!(
            registry.bind(
                &mut bus,
                BoardInfo {
                    name: DRIVER_NAME,
                    address: 0x22
                }
            ),
            Err(BindError::NoMemory)
        );
        assert_eq!(registry.attributes(0x22), None);
        // the refused chip was never configured
        assert_eq!(bus.log().len(), 2);

        registry.unbind(0x21).unwrap();
        assert_eq!(
            registry.bind(
                &mut bus,
                BoardInfo {
                    name: DRIVER_NAME,
                    address: 0x22
                }
            ),
            Ok(())
        );
    }

    #[test]
    fn bind_does_not_stall_other_chips() {
        let (entered_tx, entered_rx) = mpsc::sync_channel(1);
        let (release_tx, release_rx) = mpsc::channel();
        let gate = Gate {
            armed: Arc::new(AtomicBool::new(true)),
            entered: entered_tx,
            release: Arc::new(Mutex::new(release_rx)),
            events: Arc::new(Mutex::new(Vec::new())),
        };
        let registry = Registry::new();
        let mut bus = Recorder::default();
        registry.bind(&mut bus, CHIP).unwrap();
        bus.set_input(9);

        std::thread::scope(|s| {
            let registry = &registry;
            let mut slow = gate.clone();
            let binder = s.spawn(move || {
                registry.bind(
                    &mut slow,
                    BoardInfo {
                        name: DRIVER_NAME,
                        address: 0x22,
                    },
                )
            });

            // the second chip is mid-configuration
            entered_rx.recv().unwrap();
            assert_eq!(registry.show(0x21, "input", &mut bus).unwrap(), "9\n");
            assert_eq!(registry.try_unbind(0x21), Ok(()));
            assert_eq!(registry.attributes(0x22), None);

            release_tx.send(()).unwrap();
            entered_rx.recv().unwrap();
            release_tx.send(()).unwrap();
            assert_eq!(binder.join().unwrap(), Ok(()));
        });

        assert_eq!(registry.bound_addresses(), [0x22]);
    }

    /// CPU time spent by the calling thread, in clock ticks.
    #[cfg(target_os = "linux")]
    fn thread_cpu_ticks() -> u64 {
        let stat = std::fs::read_to_string("/proc/thread-self/stat").unwrap();
        // utime and stime are fields 14 and 15, counted after the parenthesised name
        let fields: Vec<&str> = stat[stat.rfind(')').unwrap() + 1..]
            .split_whitespace()
            .collect();
        fields[11].parse::<u64>().unwrap() + fields[12].parse::<u64>().unwrap()
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn unbind_sleeps_while_handle_is_held() {
        let registry = Registry::new();
        let mut bus = Recorder::default();
        registry.bind(&mut bus, CHIP).unwrap();
        let handle = registry.client(0x21).unwrap();

        std::thread::scope(|s| {
            let registry = &registry;
            let unbinder = s.spawn(move || {
                let before = thread_cpu_ticks();
                registry.unbind(0x21).unwrap();
                thread_cpu_ticks() - before
            });

            std::thread::sleep(Duration::from_millis(500));
            assert!(!unbinder.is_finished());
            assert_eq!(registry.try_unbind(0x21), Err(UnbindError::NotBound));

            drop(handle);
            let ticks = unbinder.join().unwrap();
            // a busy-waiting unbind burns about 50 ticks over the hold
            assert!(ticks < 10, "unbind used {} ticks while waiting", ticks);
        });
    }

    #[test]
    fn handles_count_as_users() {
        let registry = Registry::new();
        let mut bus = Recorder::default();
        registry.bind(&mut bus, CHIP).unwrap();

        let first = registry.client(0x21).unwrap();
        let second = registry.client(0x21).unwrap();
        assert_eq!(registry.try_unbind(0x21), Err(UnbindError::Busy(2)));
        drop(first);
        assert_eq!(registry.try_unbind(0x21), Err(UnbindError::Busy(1)));
        drop(second);
        assert_eq!(registry.try_unbind(0x21), Ok(()));
    }
}
