/// Common interface for mutex implementations.
///
/// `chip-i2c` needs a mutex to make sure only a single caller talks to a bound chip at any one
/// time.  The lock is held for exactly one bus transaction.  `chip-i2c` already implements this
/// trait for a number of existing mutex types, some of them guarded by a feature that needs to be
/// enabled:
///
/// | Mutex | Feature Name | Notes |
/// | --- | --- | --- |
/// | [`core::cell::RefCell`] | _always available_ | For sharing within a single execution context. |
/// | [`std::sync::Mutex`][mutex-std] | `std` | For platforms where `std` is available. |
/// | [`critical_section::Mutex`][mutex-cs] | `critical-section` | Shared with interrupt handlers. |
///
/// [mutex-std]: https://doc.rust-lang.org/std/sync/struct.Mutex.html
/// [mutex-cs]: https://docs.rs/critical-section/latest/critical_section/struct.Mutex.html
///
/// Reads need the lock just like writes: some chip variants couple the state of both ports
/// internally, so a read/write lock is not an option.
///
/// For other mutex types, a custom implementation is needed.  Due to the orphan rule, it might be
/// necessary to wrap it in a newtype:
///
/// ```
/// struct MyMutex<T>(std::sync::Mutex<T>);
///
/// impl<T> chip_i2c::ChipMutex for MyMutex<T> {
///     type Data = T;
///
///     fn create(v: T) -> Self {
///         Self(std::sync::Mutex::new(v))
///     }
///
///     fn lock<R, F: FnOnce(&mut Self::Data) -> R>(&self, f: F) -> R {
///         let mut v = self.0.lock().unwrap();
///         f(&mut v)
///     }
/// }
/// ```
pub trait ChipMutex {
    /// The bookkeeping protected by this mutex.
    type Data;

    /// Create a new mutex of this type.
    fn create(v: Self::Data) -> Self;

    /// Lock the mutex and give a closure access to the data inside.
    ///
    /// The lock must be released when the closure returns, on every path.
    fn lock<R, F: FnOnce(&mut Self::Data) -> R>(&self, f: F) -> R;
}

impl<T> ChipMutex for core::cell::RefCell<T> {
    type Data = T;

    fn create(v: Self::Data) -> Self {
        core::cell::RefCell::new(v)
    }

    fn lock<R, F: FnOnce(&mut Self::Data) -> R>(&self, f: F) -> R {
        let mut v = self.borrow_mut();
        f(&mut v)
    }
}

#[cfg(any(test, feature = "std"))]
impl<T> ChipMutex for std::sync::Mutex<T> {
    type Data = T;

    fn create(v: Self::Data) -> Self {
        std::sync::Mutex::new(v)
    }

    fn lock<R, F: FnOnce(&mut Self::Data) -> R>(&self, f: F) -> R {
        // timestamps are plain data, a poisoned lock still holds a valid value
        let mut v = self.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut v)
    }
}

#[cfg(any(test, feature = "critical-section"))]
impl<T> ChipMutex for critical_section::Mutex<core::cell::RefCell<T>> {
    type Data = T;

    fn create(v: Self::Data) -> Self {
        critical_section::Mutex::new(core::cell::RefCell::new(v))
    }

    fn lock<R, F: FnOnce(&mut Self::Data) -> R>(&self, f: F) -> R {
        critical_section::with(|cs| {
            let mut v = self.borrow_ref_mut(cs);
            f(&mut v)
        })
    }
}
