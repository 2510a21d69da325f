use crate::{
    config::{LaunchShape, ScanConfig},
    emulator::Emulator,
    error::ScanError,
};
use log::debug;
use lookback_scan_gpu::{
    look_back::COUNTERS_LEN, single_pass::scan_group, GroupShared, LookBackState, ScanArgs,
    ScanElement,
};
use std::{
    cell::UnsafeCell,
    mem,
    time::{Duration, Instant},
};

/// A backend that can compute an inclusive scan in place.
pub trait InclusiveScan {
    /// Overwrites `data` with its inclusive prefix sum.
    ///
    /// On error `data` is left untouched.
    fn inclusive_scan<T>(&self, data: &mut [T]) -> Result<ScanSummary<T>, ScanError>
    where
        T: ScanElement;
}

/// What a completed scan leaves behind besides the scanned data.
#[derive(Debug, Clone)]
pub struct ScanSummary<T> {
    pub shape: LaunchShape,
    /// Inclusive running total at the end of each virtual group, copied back
    /// from the device.
    pub group_totals: Vec<T>,
    /// Wall time of the kernel alone, without transfers.
    pub kernel_time: Duration,
}

impl<T> ScanSummary<T> {
    /// GiB of input scanned per second of kernel time.
    pub fn throughput_gib_per_sec(&self) -> f64 {
        let bytes = (self.shape.len * mem::size_of::<T>()) as f64;
        bytes / (1024.0 * 1024.0 * 1024.0) / self.kernel_time.as_secs_f64()
    }
}

/// Scans on the host [`Emulator`], running the same kernel body a CUDA block
/// runs.
#[derive(Debug, Clone, Default)]
pub struct EmulatedScanner {
    emulator: Emulator,
}

impl EmulatedScanner {
    pub fn new(config: &ScanConfig) -> Result<Self, ScanError> {
        Ok(Self {
            emulator: Emulator::new(config)?,
        })
    }
}

/// Group-local storage of one emulated slot.
struct GroupScratch<T> {
    scan: Vec<UnsafeCell<T>>,
    carry: UnsafeCell<T>,
    virtual_group: UnsafeCell<u32>,
}

// Only the lanes of the slot's current group touch the scratch, ordered by
// the group's barriers.
unsafe impl<T: Send> Sync for GroupScratch<T> {}

impl<T: ScanElement> GroupScratch<T> {
    fn new(width: usize) -> Self {
        Self {
            scan: (0..width).map(|_| UnsafeCell::new(T::ZERO)).collect(),
            carry: UnsafeCell::new(T::ZERO),
            virtual_group: UnsafeCell::new(0),
        }
    }

    fn as_shared(&self) -> GroupShared<T> {
        GroupShared {
            scan: UnsafeCell::raw_get(self.scan.as_ptr()),
            carry: self.carry.get(),
            virtual_group: self.virtual_group.get(),
        }
    }
}

/// Device-resident buffers of one scan.
struct DeviceScratch<T> {
    data: Vec<T>,
    group_totals: Vec<T>,
    counters: [u32; COUNTERS_LEN],
}

impl<T: ScanElement> DeviceScratch<T> {
    /// Allocates the scratch and copies the input in. Fails without touching
    /// the device if any allocation fails.
    fn upload(input: &[T], shape: &LaunchShape) -> Result<Self, ScanError> {
        let data = alloc_copy(input)?;
        let mut group_totals = Vec::new();
        group_totals
            .try_reserve_exact(shape.num_groups)
            .map_err(|_| ScanError::Allocation {
                bytes: shape.num_groups * mem::size_of::<T>(),
            })?;
        group_totals.resize(shape.num_groups, T::ZERO);
        debug!(
            "allocated {} bytes of data and {} bytes of group totals",
            data.len() * mem::size_of::<T>(),
            group_totals.len() * mem::size_of::<T>()
        );
        Ok(Self {
            data,
            group_totals,
            counters: [0; COUNTERS_LEN],
        })
    }

    fn args(&mut self) -> ScanArgs<T> {
        ScanArgs {
            data: self.data.as_mut_ptr(),
            len: self.data.len(),
            // The counters are only touched atomically while the kernel runs.
            look_back: unsafe {
                LookBackState::new(self.group_totals.as_mut_ptr(), self.counters.as_mut_ptr())
            },
        }
    }
}

fn alloc_copy<T: Copy>(input: &[T]) -> Result<Vec<T>, ScanError> {
    let mut data = Vec::new();
    data.try_reserve_exact(input.len())
        .map_err(|_| ScanError::Allocation {
            bytes: mem::size_of_val(input),
        })?;
    data.extend_from_slice(input);
    Ok(data)
}

impl InclusiveScan for EmulatedScanner {
    fn inclusive_scan<T>(&self, data: &mut [T]) -> Result<ScanSummary<T>, ScanError>
    where
        T: ScanElement,
    {
        let width = self.emulator.group_width();
        let shape = LaunchShape::new(data.len(), width)?;
        let mut scratch = DeviceScratch::upload(data, &shape)?;
        let args = scratch.args();

        let now = Instant::now();
        self.emulator.launch(
            shape.num_groups,
            || GroupScratch::<T>::new(width),
            |lane, group_scratch| unsafe { scan_group(lane, group_scratch.as_shared(), args) },
        )?;
        let kernel_time = now.elapsed();
        debug!("single-pass scan of {} elements took {:.2?}", shape.len, kernel_time);

        data.copy_from_slice(&scratch.data);
        Ok(ScanSummary {
            shape,
            group_totals: scratch.group_totals,
            kernel_time,
        })
    }
}
