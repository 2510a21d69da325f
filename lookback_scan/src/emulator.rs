//! A host-side stand-in for a compute device.
//!
//! Each lane of a group is an OS thread, and the lanes of a group share a
//! [`Barrier`] and a block of group-local storage. The device has a fixed
//! number of resident slots. A slot runs one group at a time and pulls the
//! next physical group from a dispatch queue when its current group retires,
//! so at most `resident_groups` groups are ever in flight.

use crate::{
    config::{DispatchOrder, ScanConfig},
    error::ScanError,
};
use log::{debug, warn};
use lookback_scan_gpu::ThreadGroup;
use std::{
    panic,
    sync::{
        atomic::{AtomicU8, AtomicUsize, Ordering},
        Barrier,
    },
    thread,
};

/// Marks an empty dispatch queue in a slot's current-group cell.
const NO_GROUP: usize = usize::MAX;

/// One lane of a group running on the emulated device.
pub struct EmulatedLane<'a> {
    local_id: usize,
    width: usize,
    physical_group: usize,
    barrier: &'a Barrier,
}

impl EmulatedLane<'_> {
    /// Index the group was launched with. Only meaningful for diagnostics,
    /// since the dispatch order is arbitrary.
    pub fn physical_group(&self) -> usize {
        self.physical_group
    }
}

impl ThreadGroup for EmulatedLane<'_> {
    fn local_id(&self) -> usize {
        self.local_id
    }

    fn width(&self) -> usize {
        self.width
    }

    fn barrier(&self) {
        self.barrier.wait();
    }

    // Lanes outnumber cores, so a spinning lane gives its core to the group
    // it is waiting on.
    fn backoff(&self) {
        thread::yield_now();
    }
}

struct DispatchQueue {
    order: Vec<usize>,
    next: AtomicUsize,
}

impl DispatchQueue {
    fn pop(&self) -> Option<usize> {
        let i = self.next.fetch_add(1, Ordering::Relaxed);
        self.order.get(i).copied()
    }
}

/// Holds a slot's lanes back until all of them exist, so a failed spawn never
/// leaves the others stuck at a barrier.
struct LaunchGate(AtomicU8);

impl LaunchGate {
    const PENDING: u8 = 0;
    const OPEN: u8 = 1;
    const ABORTED: u8 = 2;

    fn new() -> Self {
        Self(AtomicU8::new(Self::PENDING))
    }

    fn set(&self, state: u8) {
        self.0.store(state, Ordering::Release);
    }

    /// Returns true if the lanes may start.
    fn wait(&self) -> bool {
        loop {
            match self.0.load(Ordering::Acquire) {
                Self::PENDING => thread::yield_now(),
                state => return state == Self::OPEN,
            }
        }
    }
}

/// The emulated device.
#[derive(Debug, Clone)]
pub struct Emulator {
    group_width: usize,
    resident_groups: usize,
    dispatch: DispatchOrder,
}

impl Default for Emulator {
    fn default() -> Self {
        let config = ScanConfig::default();
        Self {
            group_width: config.group_width,
            resident_groups: config.resident_groups,
            dispatch: config.dispatch,
        }
    }
}

impl Emulator {
    pub fn new(config: &ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        Ok(Self {
            group_width: config.group_width,
            resident_groups: config.resident_groups,
            dispatch: config.dispatch,
        })
    }

    pub fn group_width(&self) -> usize {
        self.group_width
    }

    /// Runs `kernel` on every lane of `num_groups` groups and returns once
    /// all of them have retired.
    ///
    /// `init_shared` is called once per resident slot to allocate its
    /// group-local storage. Like real shared memory, the storage is reused by
    /// every group that runs in the slot and is not cleared in between.
    ///
    /// # Panics
    ///
    /// A panic in `kernel` is propagated. The panicking lane's siblings are
    /// still blocked at the group barrier, so unless the group has a single
    /// lane the launch never returns.
    pub fn launch<S, I, K>(&self, num_groups: usize, init_shared: I, kernel: K) -> Result<(), ScanError>
    where
        S: Sync,
        I: Fn() -> S + Sync,
        K: Fn(&EmulatedLane<'_>, &S) + Sync,
    {
        if num_groups == 0 {
            return Ok(());
        }

        let queue = DispatchQueue {
            order: self.dispatch.physical_order(num_groups),
            next: AtomicUsize::new(0),
        };
        let slots = self.resident_groups.min(num_groups);
        debug!(
            "launching {} groups of {} lanes on {} resident slots ({:?} dispatch)",
            num_groups, self.group_width, slots, self.dispatch
        );

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(slots);
            let mut spawn_error = None;
            for slot in 0..slots {
                let (queue, init_shared, kernel) = (&queue, &init_shared, &kernel);
                let spawned = thread::Builder::new()
                    .name(format!("slot-{slot}"))
                    .spawn_scoped(scope, move || self.run_slot(slot, queue, init_shared, kernel));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        // Slots are independent; the ones already running
                        // drain the queue before the scope ends.
                        warn!("failed to start slot {}: {}", slot, err);
                        spawn_error = Some(ScanError::Launch(err.to_string()));
                        break;
                    }
                }
            }

            let mut result = spawn_error.map_or(Ok(()), Err);
            for handle in handles {
                let slot_result = handle
                    .join()
                    .unwrap_or_else(|payload| panic::resume_unwind(payload));
                if result.is_ok() {
                    result = slot_result;
                }
            }
            result
        })
    }

    fn run_slot<S, I, K>(&self, slot: usize, queue: &DispatchQueue, init_shared: &I, kernel: &K) -> Result<(), ScanError>
    where
        S: Sync,
        I: Fn() -> S + Sync,
        K: Fn(&EmulatedLane<'_>, &S) + Sync,
    {
        let width = self.group_width;
        let shared = init_shared();
        let barrier = Barrier::new(width);
        let current = AtomicUsize::new(NO_GROUP);
        let gate = LaunchGate::new();

        thread::scope(|scope| {
            for local_id in 0..width {
                let (shared, barrier, current, gate) = (&shared, &barrier, &current, &gate);
                let spawned = thread::Builder::new()
                    .name(format!("slot-{slot}-lane-{local_id}"))
                    .spawn_scoped(scope, move || {
                        if !gate.wait() {
                            return;
                        }
                        loop {
                            if local_id == 0 {
                                current.store(queue.pop().unwrap_or(NO_GROUP), Ordering::Relaxed);
                            }
                            barrier.wait();

                            let physical_group = current.load(Ordering::Relaxed);
                            if physical_group == NO_GROUP {
                                break;
                            }
                            let lane = EmulatedLane {
                                local_id,
                                width,
                                physical_group,
                                barrier,
                            };
                            kernel(&lane, shared);

                            // Retire the group before the leader fetches the
                            // next one.
                            barrier.wait();
                        }
                    });

                if let Err(err) = spawned {
                    warn!("failed to start lane {} of slot {}: {}", local_id, slot, err);
                    gate.set(LaunchGate::ABORTED);
                    return Err(ScanError::Launch(err.to_string()));
                }
            }
            gate.set(LaunchGate::OPEN);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn emulator(group_width: usize, resident_groups: usize, dispatch: DispatchOrder) -> Emulator {
        let config = ScanConfig::default()
            .with_group_width(group_width)
            .with_resident_groups(resident_groups)
            .with_dispatch(dispatch);
        Emulator::new(&config).unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let config = ScanConfig::default().with_group_width(3);
        assert!(matches!(
            Emulator::new(&config),
            Err(ScanError::GroupWidthNotPowerOfTwo { width: 3 })
        ));
    }

    #[test]
    fn every_lane_of_every_group_runs_once() {
        let visits = Mutex::new(Vec::new());
        emulator(4, 3, DispatchOrder::Shuffled { seed: 1 })
            .launch(10, || (), |lane, _| {
                visits
                    .lock()
                    .unwrap()
                    .push((lane.physical_group(), lane.local_id()));
            })
            .unwrap();

        let mut visits = visits.into_inner().unwrap();
        visits.sort_unstable();
        let expected: Vec<_> = (0..10)
            .flat_map(|g| (0..4).map(move |l| (g, l)))
            .collect();
        assert_eq!(visits, expected);
    }

    #[test]
    fn dispatch_follows_configured_order() {
        let started = Mutex::new(Vec::new());
        emulator(2, 1, DispatchOrder::Reversed)
            .launch(5, || (), |lane, _| {
                if lane.is_leader() {
                    started.lock().unwrap().push(lane.physical_group());
                }
            })
            .unwrap();
        assert_eq!(started.into_inner().unwrap(), vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn no_more_groups_in_flight_than_resident_slots() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        emulator(2, 3, DispatchOrder::InOrder)
            .launch(24, || (), |lane, _| {
                if lane.is_leader() {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::yield_now();
                }
                lane.barrier();
                if lane.is_leader() {
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .unwrap();
        let peak = peak.load(Ordering::SeqCst);
        assert!((1..=3).contains(&peak), "peak of {peak} groups in flight");
    }

    #[test]
    fn barrier_publishes_group_local_writes() {
        struct Slot(Vec<AtomicUsize>);
        let mismatches = AtomicUsize::new(0);
        emulator(8, 2, DispatchOrder::InOrder)
            .launch(
                6,
                || Slot((0..8).map(|_| AtomicUsize::new(0)).collect()),
                |lane, slot| {
                    let token = lane.physical_group() * 100 + lane.local_id();
                    slot.0[lane.local_id()].store(token, Ordering::Relaxed);
                    lane.barrier();
                    let neighbour = (lane.local_id() + 1) % lane.width();
                    let expected = lane.physical_group() * 100 + neighbour;
                    if slot.0[neighbour].load(Ordering::Relaxed) != expected {
                        mismatches.fetch_add(1, Ordering::Relaxed);
                    }
                    lane.barrier();
                },
            )
            .unwrap();
        assert_eq!(mismatches.load(Ordering::Relaxed), 0);
    }

    #[test]
    #[should_panic]
    fn kernel_panic_reaches_the_caller() {
        emulator(1, 1, DispatchOrder::InOrder)
            .launch(1, || (), |_, _| panic!("kernel failed"))
            .unwrap();
    }

    #[test]
    fn zero_groups_is_a_no_op() {
        emulator(4, 2, DispatchOrder::InOrder)
            .launch(0, || (), |_, _| panic!("no lane should run"))
            .unwrap();
    }
}
