use crate::{
    element::ScanElement,
    group::ThreadGroup,
    local_scan::{group_total, inclusive_scan_group},
    look_back::LookBackState,
};

/// Group-local storage used by one group of the single-pass scan.
#[derive(Debug)]
pub struct GroupShared<T> {
    /// Local scan buffer, one element per lane.
    pub scan: *mut T,
    /// Broadcast slot for the group's exclusive carry.
    pub carry: *mut T,
    /// Broadcast slot for the group's virtual index.
    pub virtual_group: *mut u32,
}

impl<T> Clone for GroupShared<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for GroupShared<T> {}

/// Kernel arguments shared by every lane of one launch.
#[derive(Debug)]
pub struct ScanArgs<T> {
    /// The sequence being scanned in place.
    pub data: *mut T,
    /// Number of valid elements behind `data`.
    pub len: usize,
    pub look_back: LookBackState<T>,
}

impl<T> Clone for ScanArgs<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ScanArgs<T> {}

// Lanes write disjoint elements of `data`; the look-back state carries its own
// protocol.
unsafe impl<T: Send> Send for ScanArgs<T> {}
unsafe impl<T: Send> Sync for ScanArgs<T> {}

/// The body of the single-pass inclusive scan, run by every lane of every
/// group.
///
/// 1. The leader claims a virtual group index and broadcasts it.
/// 2. Each lane loads its element (zero past the end) and the group runs a
///    local inclusive scan.
/// 3. The leader resolves the group's exclusive carry through the look-back
///    and broadcasts it.
/// 4. Each lane in range writes `local_inclusive + carry`.
///
/// # Safety
///
/// Every lane of the group must call this with the same `shared` and `args`.
/// The launch must have at least `args.len` lanes in total and the look-back
/// state must have a group-total slot for every launched group.
pub unsafe fn scan_group<G, T>(group: &G, shared: GroupShared<T>, args: ScanArgs<T>)
where
    G: ThreadGroup,
    T: ScanElement,
{
    let t_idx = group.local_id();

    if group.is_leader() {
        *shared.virtual_group = args.look_back.claim_virtual_group();
    }
    group.barrier();
    let v_group = *shared.virtual_group;

    // Global index of this lane's element under virtual, not physical,
    // group order.
    let v_idx = v_group as usize * group.width() + t_idx;
    let in_range = v_idx < args.len;

    let item = if in_range {
        *args.data.add(v_idx)
    } else {
        T::ZERO
    };

    let local_inclusive = inclusive_scan_group(group, item, shared.scan);

    if group.is_leader() {
        let local_total = group_total(group, shared.scan);
        *shared.carry = args.look_back.resolve_carry(group, v_group, local_total);
    }
    group.barrier();

    if in_range {
        *args.data.add(v_idx) = local_inclusive.combine(*shared.carry);
    }
}
