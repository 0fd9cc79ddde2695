//! Mutual exclusion around key registration.
//!
//! Polling needs no lock since it runs on one context. Registration from a
//! second context does, because it walks and extends the registry while
//! taking blocks off the pool's free list.

/// Runs a closure with exclusive access to the registry.
pub trait RegistrationLock {
    fn with<R>(&self, f: impl FnOnce() -> R) -> R;
}

/// No locking, for single-context use.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoLock;

impl RegistrationLock for NoLock {
    fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        f()
    }
}

/// Spin lock for targets with threads or preemptive tasks.
impl RegistrationLock for spin::Mutex<()> {
    fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.lock();
        f()
    }
}

/// Global critical section (interrupts off on single-core MCUs).
#[derive(Copy, Clone, Debug, Default)]
pub struct CriticalSection;

impl RegistrationLock for CriticalSection {
    fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        critical_section::with(|_cs| f())
    }
}
