use crate::{element::ScanElement, group::ThreadGroup, step::scan_offsets};

/// Inclusive scan of one item per lane across a group.
///
/// Every lane of the group must call this with the same `scratch`, which must
/// point at group-local storage with room for `group.width()` elements.
/// Returns the calling lane's inclusive prefix within the group. When this
/// returns, `scratch[i]` holds lane `i`'s result for every lane, so the group
/// total can be read from `scratch[width - 1]` by any lane.
///
/// Implemented using the Kogge-Stone algorithm. Each round is split into a
/// read phase and a write phase by a barrier, so no lane observes a value
/// another lane already updated in the same round.
///
/// # Safety
///
/// `scratch` must be valid for `group.width()` elements and must not be used
/// by anything else until every lane has returned.
pub unsafe fn inclusive_scan_group<G, T>(group: &G, item: T, scratch: *mut T) -> T
where
    G: ThreadGroup,
    T: ScanElement,
{
    let t_idx = group.local_id();
    let width = group.width();

    let mut running = item;
    *scratch.add(t_idx) = running;

    for offset in scan_offsets(width) {
        let needs_update = t_idx >= offset;

        group.barrier();
        if needs_update {
            running = (*scratch.add(t_idx - offset)).combine(running);
        }

        group.barrier();
        if needs_update {
            *scratch.add(t_idx) = running;
        }
    }

    // Publish the last round's writes.
    group.barrier();
    running
}

/// Reads the group total left behind by [`inclusive_scan_group`].
///
/// # Safety
///
/// Must be called after [`inclusive_scan_group`] returned on the calling lane
/// and before any lane writes to `scratch` again.
#[inline(always)]
pub unsafe fn group_total<G, T>(group: &G, scratch: *const T) -> T
where
    G: ThreadGroup,
    T: ScanElement,
{
    *scratch.add(group.width() - 1)
}
