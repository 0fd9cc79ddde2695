//! Fixed-block allocator backing the key registry.
//!
//! All blocks have the same size, so the pool never fragments. Unused blocks
//! are threaded into a free list through their indices; allocation pops the
//! head and release pushes it back, both in constant time.

use core::mem::size_of;
use core::ops::{Index, IndexMut};

use crate::error::Error;

/// Block sizes are rounded up to this many bytes.
pub const BLOCK_ALIGN: usize = 4;

/// Round `size` up to the block alignment.
pub const fn align_up(size: usize) -> usize {
    (size + BLOCK_ALIGN - 1) & !(BLOCK_ALIGN - 1)
}

/// Handle to an allocated block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u16);

impl BlockId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

enum Block<T> {
    Free { next: Option<BlockId> },
    Used(T),
}

/// Pool of up to `N` uniform blocks holding values of type `T`.
///
/// How many of the `N` blocks are usable is decided by the byte budget
/// passed to [`BlockPool::new`]: each block costs [`BlockPool::stride`] bytes.
pub struct BlockPool<T, const N: usize> {
    blocks: [Block<T>; N],
    free_head: Option<BlockId>,
    total: u16,
    used: u16,
}

impl<T: Default, const N: usize> BlockPool<T, N> {
    /// Bytes one block occupies: the value plus its free-list link, aligned.
    pub const fn stride() -> usize {
        align_up(size_of::<T>() + size_of::<Option<BlockId>>())
    }

    /// Number of blocks a budget of `pool_bytes` yields, clamped to `N`.
    pub const fn capacity_for(pool_bytes: usize) -> usize {
        let count = pool_bytes / Self::stride();
        if count > N {
            N
        } else {
            count
        }
    }

    /// Partition a `pool_bytes` budget into blocks and link them all into the
    /// free list.
    pub fn new(pool_bytes: usize) -> Result<Self, Error> {
        let total = Self::capacity_for(pool_bytes);
        if total == 0 || total > u16::MAX as usize {
            return Err(Error::PoolConfiguration);
        }

        let blocks = core::array::from_fn(|i| Block::Free {
            next: if i + 1 < total {
                Some(BlockId((i + 1) as u16))
            } else {
                None
            },
        });

        Ok(Self {
            blocks,
            free_head: Some(BlockId(0)),
            total: total as u16,
            used: 0,
        })
    }

    /// Take a block off the free list and reset it to `T::default()`.
    pub fn alloc(&mut self) -> Result<BlockId, Error> {
        let id = self.free_head.ok_or(Error::OutOfMemory)?;
        let block = &mut self.blocks[id.index()];
        let next = match block {
            Block::Free { next } => *next,
            Block::Used(_) => unreachable!("free list reached allocated block {}", id.index()),
        };

        *block = Block::Used(T::default());
        self.free_head = next;
        self.used += 1;
        Ok(id)
    }

    /// Return a block to the pool.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a live allocation of this pool (double free or
    /// a foreign handle).
    pub fn free(&mut self, id: BlockId) {
        let index = id.index();
        assert!(
            index < self.total as usize,
            "block {} does not belong to this pool",
            index
        );
        let block = &mut self.blocks[index];
        assert!(matches!(block, Block::Used(_)), "block {} freed twice", index);

        *block = Block::Free {
            next: self.free_head,
        };
        self.free_head = Some(id);
        self.used -= 1;
    }
}

impl<T, const N: usize> BlockPool<T, N> {
    pub fn get(&self, id: BlockId) -> Option<&T> {
        match self.blocks.get(id.index())? {
            Block::Used(value) => Some(value),
            Block::Free { .. } => None,
        }
    }

    pub fn get_mut(&mut self, id: BlockId) -> Option<&mut T> {
        match self.blocks.get_mut(id.index())? {
            Block::Used(value) => Some(value),
            Block::Free { .. } => None,
        }
    }

    /// Blocks currently handed out.
    pub fn used(&self) -> usize {
        self.used as usize
    }

    /// Blocks still on the free list.
    pub fn available(&self) -> usize {
        (self.total - self.used) as usize
    }

    /// Total usable blocks.
    pub fn capacity(&self) -> usize {
        self.total as usize
    }
}

impl<T, const N: usize> Index<BlockId> for BlockPool<T, N> {
    type Output = T;

    fn index(&self, id: BlockId) -> &T {
        match self.get(id) {
            Some(value) => value,
            None => panic!("block {} is not allocated", id.index()),
        }
    }
}

impl<T, const N: usize> IndexMut<BlockId> for BlockPool<T, N> {
    fn index_mut(&mut self, id: BlockId) -> &mut T {
        match self.get_mut(id) {
            Some(value) => value,
            None => panic!("block {} is not allocated", id.index()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    type Pool = BlockPool<[u8; 12], 8>;

    #[test]
    fn test_stride() {
        assert_eq!(align_up(0), 0);
        assert_eq!(align_up(1), 4);
        assert_eq!(align_up(16), 16);
        assert_eq!(align_up(17), 20);
        // 12 bytes of payload plus a 4 byte link.
        assert_eq!(Pool::stride(), 16);
    }

    #[test]
    fn test_capacity_clamped_to_n() {
        assert_eq!(Pool::capacity_for(16 * 3), 3);
        assert_eq!(Pool::capacity_for(16 * 3 + 15), 3);
        assert_eq!(Pool::capacity_for(4096), 8);
    }

    #[test]
    fn test_budget_too_small() {
        assert!(matches!(Pool::new(15), Err(Error::PoolConfiguration)));
        assert!(matches!(Pool::new(0), Err(Error::PoolConfiguration)));
    }

    #[test]
    fn test_exhaustion() {
        let mut pool = Pool::new(16 * 5).unwrap();
        assert_eq!(pool.capacity(), 5);
        for i in 0..5 {
            assert!(pool.alloc().is_ok(), "allocation {} failed", i);
        }
        assert_eq!(pool.alloc(), Err(Error::OutOfMemory));
        assert_eq!(pool.used(), 5);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_realloc_is_zeroed() {
        let mut pool = Pool::new(16).unwrap();
        let id = pool.alloc().unwrap();
        pool[id] = [0xAA; 12];
        pool.free(id);
        assert_eq!(pool.get(id), None);

        let again = pool.alloc().unwrap();
        assert_eq!(again, id);
        assert_eq!(pool[again], [0; 12]);
    }

    #[test]
    fn test_free_is_lifo() {
        let mut pool = Pool::new(16 * 4).unwrap();
        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        pool.free(a);
        pool.free(b);
        assert_eq!(pool.alloc().unwrap(), b);
        assert_eq!(pool.alloc().unwrap(), a);
    }

    #[test]
    #[should_panic(expected = "freed twice")]
    fn test_double_free_panics() {
        let mut pool = Pool::new(16 * 2).unwrap();
        let id = pool.alloc().unwrap();
        pool.free(id);
        pool.free(id);
    }

    #[test]
    #[should_panic(expected = "does not belong")]
    fn test_foreign_block_panics() {
        let mut pool = Pool::new(16 * 2).unwrap();
        pool.free(BlockId(7));
    }

    proptest! {
        #[test]
        fn prop_used_count_tracks_allocations(ops in prop::collection::vec(any::<bool>(), 0..64)) {
            let mut pool = Pool::new(16 * 6).unwrap();
            let mut live = Vec::new();
            for alloc in ops {
                if alloc {
                    match pool.alloc() {
                        Ok(id) => {
                            prop_assert!(!live.contains(&id));
                            live.push(id);
                        }
                        Err(e) => {
                            prop_assert_eq!(e, Error::OutOfMemory);
                            prop_assert_eq!(live.len(), 6);
                        }
                    }
                } else if let Some(id) = live.pop() {
                    pool.free(id);
                }
                prop_assert_eq!(pool.used(), live.len());
                prop_assert_eq!(pool.used() + pool.available(), pool.capacity());
            }
        }
    }
}
