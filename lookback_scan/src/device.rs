use crate::{
    config::{LaunchShape, ScanConfig},
    error::ScanError,
    scan::{InclusiveScan, ScanSummary},
};
use cust::{
    context::Context,
    device::{Device, DeviceAttribute},
    function::{BlockSize, Function},
    memory::mem_get_info,
    prelude::*,
};
use log::{debug, info, warn};
use lookback_scan_gpu::{kernels::GROUP_WIDTH, look_back::COUNTERS_LEN, ScanElement};
use std::{mem, time::Instant};

static PTX: &str = include_str!("../../resources/lookback_scan_gpu.ptx");

/// Scans on the first CUDA device.
pub struct CudaScanner {
    device: Device,
    module: Module,
    stream: Stream,
    // Dropped last: the module and stream belong to it.
    _ctx: Context,
}

impl CudaScanner {
    pub fn new() -> Result<Self, ScanError> {
        let ctx = cust::quick_init()?;
        let device = Device::get_device(0)?;
        let module = Module::from_ptx(PTX, &[])?;
        let stream = Stream::new(StreamFlags::NON_BLOCKING, None)?;
        Ok(Self {
            device,
            module,
            stream,
            _ctx: ctx,
        })
    }

    /// Like [`CudaScanner::new`], but rejects configurations the compiled
    /// kernels cannot honour. Residency and dispatch order are up to the
    /// hardware scheduler and are ignored.
    pub fn with_config(config: &ScanConfig) -> Result<Self, ScanError> {
        config.validate_for_width(GROUP_WIDTH)?;
        Self::new()
    }

    pub fn device_name(&self) -> Result<String, ScanError> {
        Ok(self.device.name()?)
    }

    /// Logs how many groups the device can hold at once. Every launched group
    /// claims its virtual index only once it is running, so a group never
    /// waits on one that has not started; a launch larger than the resident
    /// capacity is therefore safe as long as started blocks keep making
    /// progress.
    fn log_occupancy(&self, kernel: &Function, shape: &LaunchShape) -> Result<(), ScanError> {
        let per_sm = kernel.max_active_blocks_per_multiprocessor(BlockSize::x(GROUP_WIDTH as u32), 0)?;
        let sms = self.device.get_attribute(DeviceAttribute::MultiprocessorCount)?;
        let resident = per_sm as usize * sms as usize;
        info!(
            "launching {} groups; device holds {} at once ({} per multiprocessor x {})",
            shape.num_groups, resident, per_sm, sms
        );
        if resident == 0 {
            warn!("occupancy query reports no resident groups for the scan kernel");
        }
        Ok(())
    }
}

impl InclusiveScan for CudaScanner {
    fn inclusive_scan<T>(&self, data: &mut [T]) -> Result<ScanSummary<T>, ScanError>
    where
        T: ScanElement,
    {
        let shape = LaunchShape::new(data.len(), GROUP_WIDTH)?;

        // Check VRAM before allocating anything.
        let required =
            (shape.len + shape.num_groups) * mem::size_of::<T>() + COUNTERS_LEN * mem::size_of::<u32>();
        let (free, _total) = mem_get_info()?;
        if required > free {
            return Err(ScanError::OutOfDeviceMemory { required, free });
        }

        // Allocate global memory on the GPU and copy the input over.
        let dev_data = data.as_dbuf()?;
        let dev_group_totals = vec![T::ZERO; shape.num_groups].as_slice().as_dbuf()?;
        let dev_counters = [0u32; COUNTERS_LEN].as_slice().as_dbuf()?;
        debug!("allocated {} bytes of device scratch", required);

        let kernel = self.module.get_function(T::KERNEL_NAME)?;
        self.log_occupancy(&kernel, &shape)?;

        let stream = &self.stream;
        let now = Instant::now();
        unsafe {
            launch!(
                kernel<<<shape.num_groups as u32, GROUP_WIDTH as u32, 0, stream>>>(
                    dev_data.as_device_ptr(),
                    shape.len,
                    dev_group_totals.as_device_ptr(),
                    dev_counters.as_device_ptr()
                )
            )?;
        }
        stream.synchronize()?;
        let kernel_time = now.elapsed();
        debug!("single-pass scan of {} elements took {:.2?}", shape.len, kernel_time);

        // Copy results from GPU back to CPU.
        let mut group_totals = vec![T::ZERO; shape.num_groups];
        dev_group_totals.copy_to(&mut group_totals)?;
        dev_data.copy_to(data)?;

        Ok(ScanSummary {
            shape,
            group_totals,
            kernel_time,
        })
    }
}
