//! Mount-id allocator.
//!
//! Hands out the smallest unused integer in `[0, limit]`. Released ids go
//! back to a free set and are handed out again before the high-water mark
//! advances.

use std::collections::BTreeSet;

use devfs_types::MountId;
use parking_lot::Mutex;

use crate::error::{DevfsError, DevfsResult};

/// Default inclusive upper bound (`INT_MAX`).
pub const DEFAULT_ID_LIMIT: u32 = i32::MAX as u32;

#[derive(Debug, Default)]
struct IdSpace {
    /// Every id below `next` that is currently unallocated.
    free: BTreeSet<u32>,
    /// One past the largest id ever handed out and still tracked.
    next: u64,
}

/// Internally synchronized allocator of [`MountId`]s.
#[derive(Debug)]
pub struct MountIdAllocator {
    limit: u32,
    space: Mutex<IdSpace>,
}

impl Default for MountIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl MountIdAllocator {
    /// Create an allocator over `[0, DEFAULT_ID_LIMIT]`.
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_ID_LIMIT)
    }

    /// Create an allocator over `[0, limit]`.
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit,
            space: Mutex::new(IdSpace::default()),
        }
    }

    /// Allocate the smallest unused id.
    pub fn allocate(&self) -> DevfsResult<MountId> {
        let mut space = self.space.lock();
        if let Some(id) = space.free.pop_first() {
            return Ok(MountId::new(id));
        }
        if space.next > u64::from(self.limit) {
            return Err(DevfsError::Exhausted);
        }
        let id = space.next as u32;
        space.next += 1;
        Ok(MountId::new(id))
    }

    /// Return an id to the pool.
    ///
    /// Releasing an id that is not allocated is logged and ignored.
    pub fn release(&self, id: MountId) {
        let raw = id.get();
        let space = &mut *self.space.lock();
        if u64::from(raw) >= space.next || space.free.contains(&raw) {
            tracing::error!("release of unallocated mount id {}", raw);
            return;
        }
        if u64::from(raw) + 1 == space.next {
            space.next -= 1;
            // Pull the high-water mark down over any trailing free ids.
            while space.next > 0 && space.free.remove(&((space.next - 1) as u32)) {
                space.next -= 1;
            }
        } else {
            space.free.insert(raw);
        }
    }

    /// True if `id` is currently handed out.
    pub fn is_allocated(&self, id: MountId) -> bool {
        let raw = id.get();
        let space = self.space.lock();
        u64::from(raw) < space.next && !space.free.contains(&raw)
    }

    /// Number of ids currently handed out.
    pub fn in_use(&self) -> usize {
        let space = self.space.lock();
        space.next as usize - space.free.len()
    }

    /// Inclusive upper bound of the id space.
    pub fn limit(&self) -> u32 {
        self.limit
    }
}
