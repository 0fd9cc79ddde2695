//! Registry of the keys a driver polls.
//!
//! Keys are kept as a singly linked list of pool blocks in registration
//! order. That order is the key's slot: it picks the runtime state the key
//! uses and the order its events are dispatched in. Keys are never removed.

use log::{debug, warn};

use crate::config::{BackendMode, Config, MatrixBounds};
use crate::error::Error;
use crate::lock::RegistrationLock;
use crate::pool::{BlockId, BlockPool};

/// Where a key is wired.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Locator {
    /// Independent GPIO pin.
    Pin(u8),
    /// Row/column position in a key matrix.
    Matrix { row: u8, col: u8 },
    /// Opaque code understood by a custom snapshot backend.
    Code(u16),
}

impl Locator {
    /// Backend that can sample this kind of locator.
    pub const fn mode(&self) -> BackendMode {
        match self {
            Locator::Pin(_) => BackendMode::Gpio,
            Locator::Matrix { .. } => BackendMode::Matrix,
            Locator::Code(_) => BackendMode::Custom,
        }
    }
}

impl Default for Locator {
    fn default() -> Self {
        Locator::Code(0)
    }
}

/// Identity of a registered key.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyDescriptor {
    pub name: &'static str,
    pub id: u16,
    pub locator: Locator,
}

impl KeyDescriptor {
    pub const fn new(name: &'static str, id: u16, locator: Locator) -> Self {
        Self { name, id, locator }
    }
}

#[derive(Default)]
struct Node {
    key: KeyDescriptor,
    next: Option<BlockId>,
}

/// Up to `N` keys registered for one backend.
pub struct Registry<const N: usize> {
    pool: BlockPool<Node, N>,
    head: Option<BlockId>,
    tail: Option<BlockId>,
    len: usize,
    mode: BackendMode,
    bounds: MatrixBounds,
}

impl<const N: usize> Registry<N> {
    /// Bytes of pool budget each registered key costs.
    pub const fn block_stride() -> usize {
        BlockPool::<Node, N>::stride()
    }

    pub fn new(config: &Config) -> Result<Self, Error> {
        let pool = BlockPool::new(config.pool_bytes)?;
        Ok(Self {
            pool,
            head: None,
            tail: None,
            len: 0,
            mode: config.backend,
            bounds: config.matrix,
        })
    }

    /// Add a key at the end of the registry and return its slot.
    ///
    /// The duplicate scan and the insertion run under `lock`, so two
    /// contexts registering at once cannot both pass the scan.
    pub fn register<L: RegistrationLock>(
        &mut self,
        key: KeyDescriptor,
        lock: &L,
    ) -> Result<usize, Error> {
        let result = self.check(&key).and_then(|()| lock.with(|| self.insert(key)));
        match result {
            Ok(slot) => debug!(
                "registered key {} (id {}) at {:?} in slot {}",
                key.name, key.id, key.locator, slot
            ),
            Err(err) => warn!("rejected key {} (id {}): {}", key.name, key.id, err),
        }
        result
    }

    fn check(&self, key: &KeyDescriptor) -> Result<(), Error> {
        if key.name.is_empty() || key.locator.mode() != self.mode {
            return Err(Error::InvalidParameter);
        }
        if let Locator::Matrix { row, col } = key.locator {
            if !self.bounds.contains(row, col) {
                return Err(Error::OutOfRange);
            }
        }
        Ok(())
    }

    fn insert(&mut self, key: KeyDescriptor) -> Result<usize, Error> {
        // Locators of one registry all share a variant, so plain equality
        // is the backend's hardware equality rule.
        if self
            .iter()
            .any(|k| k.id == key.id || k.locator == key.locator)
        {
            return Err(Error::Duplicate);
        }
        if self.len >= N {
            return Err(Error::Full);
        }

        let id = self.pool.alloc()?;
        self.pool[id].key = key;
        match self.tail {
            Some(tail) => self.pool[tail].next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.len += 1;
        Ok(self.len - 1)
    }

    /// Registered keys in registration order.
    pub fn iter(&self) -> Keys<'_, N> {
        Keys {
            pool: &self.pool,
            cursor: self.head,
        }
    }

    pub fn get(&self, slot: usize) -> Option<&KeyDescriptor> {
        self.iter().nth(slot)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn mode(&self) -> BackendMode {
        self.mode
    }

    /// Pool blocks in use and total usable blocks.
    pub fn pool_usage(&self) -> (usize, usize) {
        (self.pool.used(), self.pool.capacity())
    }
}

/// Iterator over registered keys.
pub struct Keys<'a, const N: usize> {
    pool: &'a BlockPool<Node, N>,
    cursor: Option<BlockId>,
}

impl<'a, const N: usize> Iterator for Keys<'a, N> {
    type Item = &'a KeyDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        let node = &self.pool[self.cursor?];
        self.cursor = node.next;
        Some(&node.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::NoLock;

    fn gpio_registry<const N: usize>() -> Registry<N> {
        Registry::new(&Config::new().with_backend(BackendMode::Gpio)).unwrap()
    }

    fn pin(name: &'static str, id: u16, pin: u8) -> KeyDescriptor {
        KeyDescriptor::new(name, id, Locator::Pin(pin))
    }

    #[test]
    fn test_insertion_order() {
        let mut reg = gpio_registry::<4>();
        assert_eq!(reg.register(pin("UP", 10, 3), &NoLock), Ok(0));
        assert_eq!(reg.register(pin("DOWN", 11, 1), &NoLock), Ok(1));
        assert_eq!(reg.register(pin("OK", 5, 2), &NoLock), Ok(2));

        let names: Vec<_> = reg.iter().map(|k| k.name).collect();
        assert_eq!(names, ["UP", "DOWN", "OK"]);
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.get(1).map(|k| k.id), Some(11));
        assert_eq!(reg.get(3), None);
    }

    #[test]
    fn test_empty_name() {
        let mut reg = gpio_registry::<4>();
        assert_eq!(
            reg.register(pin("", 1, 1), &NoLock),
            Err(Error::InvalidParameter)
        );
        assert!(reg.is_empty());
    }

    #[test]
    fn test_locator_for_other_backend() {
        let mut reg = gpio_registry::<4>();
        let key = KeyDescriptor::new("A", 1, Locator::Code(9));
        assert_eq!(reg.register(key, &NoLock), Err(Error::InvalidParameter));
    }

    #[test]
    fn test_duplicates() {
        let mut reg = gpio_registry::<4>();
        reg.register(pin("A", 1, 1), &NoLock).unwrap();
        assert_eq!(
            reg.register(pin("B", 1, 2), &NoLock),
            Err(Error::Duplicate)
        );
        assert_eq!(
            reg.register(pin("C", 2, 1), &NoLock),
            Err(Error::Duplicate)
        );
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.pool_usage().0, 1);
    }

    #[test]
    fn test_full() {
        let mut reg = gpio_registry::<2>();
        reg.register(pin("A", 1, 1), &NoLock).unwrap();
        reg.register(pin("B", 2, 2), &NoLock).unwrap();
        assert_eq!(reg.register(pin("C", 3, 3), &NoLock), Err(Error::Full));
        assert_eq!(reg.len(), 2);
        // A duplicate is reported before the registry is found full.
        assert_eq!(
            reg.register(pin("D", 1, 4), &NoLock),
            Err(Error::Duplicate)
        );
    }

    #[test]
    fn test_pool_exhausted_before_full() {
        let config = Config::new()
            .with_backend(BackendMode::Gpio)
            .with_pool_bytes(Registry::<4>::block_stride() * 2);
        let mut reg = Registry::<4>::new(&config).unwrap();
        assert_eq!(reg.pool_usage(), (0, 2));
        reg.register(pin("A", 1, 1), &NoLock).unwrap();
        reg.register(pin("B", 2, 2), &NoLock).unwrap();
        assert_eq!(
            reg.register(pin("C", 3, 3), &NoLock),
            Err(Error::OutOfMemory)
        );
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_pool_budget_too_small() {
        let config = Config::new().with_pool_bytes(Registry::<4>::block_stride() - 1);
        assert!(matches!(
            Registry::<4>::new(&config),
            Err(Error::PoolConfiguration)
        ));
    }

    #[test]
    fn test_matrix_rules() {
        let mut reg = Registry::<8>::new(&Config::new()).unwrap();
        let at = |row, col| Locator::Matrix { row, col };
        reg.register(KeyDescriptor::new("K00", 1, at(0, 0)), &NoLock)
            .unwrap();
        reg.register(KeyDescriptor::new("K01", 2, at(0, 1)), &NoLock)
            .unwrap();
        reg.register(KeyDescriptor::new("K10", 3, at(1, 0)), &NoLock)
            .unwrap();
        assert_eq!(
            reg.register(KeyDescriptor::new("X", 4, at(1, 0)), &NoLock),
            Err(Error::Duplicate)
        );
        assert_eq!(
            reg.register(KeyDescriptor::new("X", 4, at(8, 0)), &NoLock),
            Err(Error::OutOfRange)
        );
        assert_eq!(
            reg.register(KeyDescriptor::new("X", 4, at(0, 8)), &NoLock),
            Err(Error::OutOfRange)
        );
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_custom_codes() {
        let config = Config::new().with_backend(BackendMode::Custom);
        let mut reg = Registry::<4>::new(&config).unwrap();
        reg.register(KeyDescriptor::new("A", 1, Locator::Code(0x100)), &NoLock)
            .unwrap();
        assert_eq!(
            reg.register(KeyDescriptor::new("B", 2, Locator::Code(0x100)), &NoLock),
            Err(Error::Duplicate)
        );
        // Codes are never range checked.
        assert!(reg
            .register(KeyDescriptor::new("C", 3, Locator::Code(u16::MAX)), &NoLock)
            .is_ok());
    }

    #[test]
    fn test_register_under_spin_lock() {
        let lock = spin::Mutex::new(());
        let mut reg = gpio_registry::<4>();
        assert_eq!(reg.register(pin("A", 1, 1), &lock), Ok(0));
        assert_eq!(reg.register(pin("B", 1, 2), &lock), Err(Error::Duplicate));
        assert!(!lock.is_locked());
    }
}
