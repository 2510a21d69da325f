/// The view one lane has of the group of lanes it executes with.
///
/// Lanes of a group share fast local storage and can wait for each other at
/// a barrier. Lanes of different groups can only communicate through global
/// memory and atomics.
pub trait ThreadGroup {
    /// Index of the calling lane within its group, in `0..width()`.
    fn local_id(&self) -> usize;

    /// Number of lanes in the group.
    fn width(&self) -> usize;

    /// Blocks until every lane of the group has reached the barrier. Writes to
    /// group-local storage made before the barrier are visible to every lane
    /// after it.
    fn barrier(&self);

    /// Called between polls of a spin-wait.
    #[inline(always)]
    fn backoff(&self) {
        core::hint::spin_loop();
    }

    /// True for the single lane that talks to other groups on behalf of the
    /// group.
    #[inline(always)]
    fn is_leader(&self) -> bool {
        self.local_id() == 0
    }
}
