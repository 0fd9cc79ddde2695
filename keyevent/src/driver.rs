//! Poll driver.
//!
//! One [`Driver::poll`] call is one tick: every registered key is sampled and
//! advanced in registration order, and the events they produce are held back
//! until the whole pass is done. Only then is the handler called, so a
//! handler never observes a half-scanned tick.

use log::{debug, trace, warn};

use crate::config::{Config, DEFAULT_MAX_KEYS};
use crate::debounce::{KeyEvents, KeyState};
use crate::error::{Error, SampleError};
use crate::event::EventHandler;
use crate::lock::{NoLock, RegistrationLock};
use crate::registry::{KeyDescriptor, Keys, Locator, Registry};
use crate::sample::Sampler;

/// Millisecond clock the driver can derive tick lengths from.
pub trait TickSource {
    fn now_ms(&mut self) -> u32;
}

impl<F: FnMut() -> u32> TickSource for F {
    fn now_ms(&mut self) -> u32 {
        self()
    }
}

/// Key driver for up to `N` keys.
pub struct Driver<S, H, L = NoLock, const N: usize = DEFAULT_MAX_KEYS> {
    config: Config,
    sampler: S,
    handler: H,
    lock: L,
    registry: Registry<N>,
    states: [KeyState; N],
    pending: [KeyEvents; N],
    snapshot: [bool; N],
    last_tick: Option<u32>,
}

impl<S: Sampler, H: EventHandler, const N: usize> Driver<S, H, NoLock, N> {
    /// Bring up a driver whose keys are only registered from one context.
    pub fn new(config: Config, sampler: S, handler: H) -> Result<Self, Error> {
        Self::with_lock(config, sampler, handler, NoLock)
    }
}

impl<S: Sampler, H: EventHandler, L: RegistrationLock, const N: usize> Driver<S, H, L, N> {
    /// Bring up a driver that serializes registration through `lock`.
    pub fn with_lock(config: Config, mut sampler: S, handler: H, lock: L) -> Result<Self, Error> {
        config.validate()?;
        sampler.configure(&config)?;
        let registry = Registry::new(&config)?;

        debug!(
            "{:?} key driver up: {} keys max, {} pool blocks",
            config.backend,
            N,
            registry.pool_usage().1
        );

        Ok(Self {
            config,
            sampler,
            handler,
            lock,
            registry,
            states: [KeyState::new(); N],
            pending: core::array::from_fn(|_| KeyEvents::new()),
            snapshot: [false; N],
            last_tick: None,
        })
    }

    /// Register a key and return its slot.
    pub fn register(&mut self, key: KeyDescriptor) -> Result<usize, Error> {
        self.registry.register(key, &self.lock)
    }

    pub fn register_gpio(&mut self, pin: u8, name: &'static str, id: u16) -> Result<usize, Error> {
        self.register(KeyDescriptor::new(name, id, Locator::Pin(pin)))
    }

    pub fn register_matrix(
        &mut self,
        row: u8,
        col: u8,
        name: &'static str,
        id: u16,
    ) -> Result<usize, Error> {
        self.register(KeyDescriptor::new(name, id, Locator::Matrix { row, col }))
    }

    pub fn register_code(&mut self, code: u16, name: &'static str, id: u16) -> Result<usize, Error> {
        self.register(KeyDescriptor::new(name, id, Locator::Code(code)))
    }

    /// Run one tick that lasted `dt_ms` and return how many events were
    /// dispatched.
    ///
    /// A zero-length tick does nothing. If the snapshot backend fails, the
    /// tick is dropped without touching any key state and the error is
    /// returned; the next tick simply tries again.
    pub fn poll(&mut self, dt_ms: u32) -> Result<usize, SampleError> {
        if dt_ms == 0 {
            return Ok(0);
        }

        let count = self.registry.len();
        if let Err(err) = self.sampler.begin_scan(&mut self.snapshot[..count]) {
            warn!("tick dropped: {}", err);
            return Err(err);
        }

        for (slot, key) in self.registry.iter().enumerate() {
            let raw = self
                .sampler
                .sample(slot, &key.locator, &self.snapshot[..count]);
            self.pending[slot] = self.states[slot].advance(raw, dt_ms, &self.config.timing);
        }

        let mut dispatched = 0;
        for (slot, key) in self.registry.iter().enumerate() {
            for event in core::mem::take(&mut self.pending[slot]) {
                trace!("{} ({}): {}", key.name, key.id, event);
                self.handler.on_event(key.name, key.id, event);
                dispatched += 1;
            }
        }
        Ok(dispatched)
    }

    /// Run one tick timed by `clock`.
    ///
    /// The first call only records the clock reading. The clock may wrap.
    pub fn poll_clock<T: TickSource>(&mut self, clock: &mut T) -> Result<usize, SampleError> {
        let now = clock.now_ms();
        let dt = match self.last_tick.replace(now) {
            Some(prev) => now.wrapping_sub(prev),
            None => 0,
        };
        self.poll(dt)
    }

    /// Registered keys in registration order.
    pub fn keys(&self) -> Keys<'_, N> {
        self.registry.iter()
    }

    pub fn key_count(&self) -> usize {
        self.registry.len()
    }

    /// Runtime state of the key in `slot`.
    pub fn state(&self, slot: usize) -> Option<&KeyState> {
        if slot < self.registry.len() {
            self.states.get(slot)
        } else {
            None
        }
    }

    /// Pool blocks in use and total usable blocks.
    pub fn pool_usage(&self) -> (usize, usize) {
        self.registry.pool_usage()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    pub fn sampler_mut(&mut self) -> &mut S {
        &mut self.sampler
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}
