//! Cross-group carry propagation for the single-pass scan.
//!
//! Groups are not scheduled in launch order, so a group's physical block index
//! says nothing about which groups have already run. Each group instead claims
//! a virtual index from a global counter when it starts; every group with a
//! smaller virtual index has therefore already started, and the group only
//! waits on its immediate virtual predecessor.
//!
//! Memory ordering contract:
//!
//! * the virtual group counter is only used for uniqueness, so it is bumped
//!   with `Relaxed` ordering;
//! * the completion counter is bumped with `Release` after the group total has
//!   been written and polled with `Acquire` before the predecessor's total is
//!   read. This is the only edge ordering one group's write of
//!   `group_totals[g]` before the read by group `g + 1`, and must not be
//!   weakened.

use crate::{element::ScanElement, group::ThreadGroup};
use core::{
    ptr,
    sync::atomic::{AtomicU32, Ordering},
};

/// Index of the virtual group counter in the counters buffer.
pub const VIRTUAL_GROUP_COUNTER: usize = 0;
/// Index of the completion counter in the counters buffer.
pub const COMPLETION_COUNTER: usize = 1;
/// Number of `u32` counters the look-back needs. Both start at zero.
pub const COUNTERS_LEN: usize = 2;

/// Global state shared by every group of one scan launch.
#[derive(Debug)]
pub struct LookBackState<T> {
    group_totals: *mut T,
    counters: *const AtomicU32,
}

impl<T> Clone for LookBackState<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for LookBackState<T> {}

// The state is a bundle of pointers into global device memory that every group
// reads and writes under the protocol documented above.
unsafe impl<T: Send> Send for LookBackState<T> {}
unsafe impl<T: Send> Sync for LookBackState<T> {}

impl<T> LookBackState<T>
where
    T: ScanElement,
{
    /// # Safety
    ///
    /// `group_totals` must be valid for one element per launched group and
    /// `counters` must point at [`COUNTERS_LEN`] zero-initialized `u32`s that
    /// are only accessed atomically for the duration of the launch.
    pub unsafe fn new(group_totals: *mut T, counters: *mut u32) -> Self {
        Self {
            group_totals,
            counters: counters as *const AtomicU32,
        }
    }

    #[inline(always)]
    unsafe fn counter(&self, idx: usize) -> &AtomicU32 {
        &*self.counters.add(idx)
    }

    /// Hands out the next virtual group index. Called once per group, by the
    /// group's leader.
    ///
    /// # Safety
    ///
    /// The state must be live (see [`LookBackState::new`]).
    #[inline(always)]
    pub unsafe fn claim_virtual_group(&self) -> u32 {
        self.counter(VIRTUAL_GROUP_COUNTER)
            .fetch_add(1, Ordering::Relaxed)
    }

    /// Publishes this group's inclusive total and returns its exclusive
    /// carry, the combined total of every group with a smaller virtual index.
    ///
    /// Spins until virtual group `v_group - 1` has published. There is no
    /// timeout: if the predecessor never runs, neither does this call return.
    ///
    /// # Safety
    ///
    /// Called exactly once per virtual group, by the leader lane of the group
    /// that claimed `v_group`.
    pub unsafe fn resolve_carry<G>(&self, group: &G, v_group: u32, local_total: T) -> T
    where
        G: ThreadGroup,
    {
        let completion = self.counter(COMPLETION_COUNTER);

        if v_group == 0 {
            ptr::write_volatile(self.group_totals, local_total);
            completion.fetch_add(1, Ordering::Release);
            return T::ZERO;
        }

        // Exactly `v_group` groups have published once the counter reaches
        // our index.
        while completion.load(Ordering::Acquire) != v_group {
            group.backoff();
        }

        // Volatile so the device does not serve the read from a
        // non-coherent cache line.
        let v_group = v_group as usize;
        let carry = ptr::read_volatile(self.group_totals.add(v_group - 1));
        ptr::write_volatile(self.group_totals.add(v_group), carry.combine(local_total));
        completion.fetch_add(1, Ordering::Release);

        carry
    }
}
