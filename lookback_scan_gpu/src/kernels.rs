use crate::{
    group::ThreadGroup,
    look_back::LookBackState,
    single_pass::{scan_group, GroupShared, ScanArgs},
};
use cuda_std::{kernel, shared_array, thread};

/// Number of lanes per group. Kernel launches must use this as the block
/// size, and the group-local scan buffer is sized by it.
pub const GROUP_WIDTH: usize = 512;

/// A CUDA thread block seen as a scan group.
struct CudaBlock;

impl ThreadGroup for CudaBlock {
    #[inline(always)]
    fn local_id(&self) -> usize {
        thread::thread_idx_x() as usize
    }

    #[inline(always)]
    fn width(&self) -> usize {
        GROUP_WIDTH
    }

    #[inline(always)]
    fn barrier(&self) {
        thread::sync_threads();
    }
}

macro_rules! single_pass_scan_kernel {
    ($($name:ident => $ty:ty),* $(,)?) => {
        $(
            /// Single-pass inclusive scan of `data[..len]` in place.
            ///
            /// Launch with a block size of [`GROUP_WIDTH`] and
            /// `len.div_ceil(GROUP_WIDTH)` blocks. `group_totals` needs one
            /// slot per block and `counters` must hold
            /// [`COUNTERS_LEN`](crate::look_back::COUNTERS_LEN) zeroed words.
            #[kernel]
            #[allow(improper_ctypes_definitions, clippy::missing_safety_doc)]
            pub unsafe fn $name(
                data: *mut $ty,
                len: usize,
                group_totals: *mut $ty,
                counters: *mut u32,
            ) {
                let shared = GroupShared {
                    scan: shared_array![$ty; GROUP_WIDTH],
                    carry: shared_array![$ty; 1],
                    virtual_group: shared_array![u32; 1],
                };
                let args = ScanArgs {
                    data,
                    len,
                    look_back: LookBackState::new(group_totals, counters),
                };
                scan_group(&CudaBlock, shared, args);
            }
        )*
    };
}

single_pass_scan_kernel! {
    single_pass_scan_u32 => u32,
    single_pass_scan_i32 => i32,
    single_pass_scan_u64 => u64,
    single_pass_scan_i64 => i64,
    single_pass_scan_f32 => f32,
    single_pass_scan_f64 => f64,
}
