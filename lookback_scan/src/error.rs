use thiserror::Error;

/// Errors surfaced by a scan before or after the kernel runs.
///
/// A stalled look-back is not among them: it never returns.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot scan an empty sequence")]
    EmptyInput,
    #[error("group width must be a power of two, got {width}")]
    GroupWidthNotPowerOfTwo { width: usize },
    #[error("group width {requested} is not supported by this backend, which is built for {supported}")]
    UnsupportedGroupWidth { requested: usize, supported: usize },
    #[error("at least one group must be resident on the device")]
    NoResidentGroups,
    #[error("{num_groups} groups exceed the range of the virtual group counter")]
    TooManyGroups { num_groups: usize },
    #[error("failed to allocate {bytes} bytes of device scratch")]
    Allocation { bytes: usize },
    #[error("out of device memory: required={required} free={free}")]
    OutOfDeviceMemory { required: usize, free: usize },
    #[error("kernel launch failed: {0}")]
    Launch(String),
    #[cfg(feature = "cuda")]
    #[error(transparent)]
    Cuda(#[from] cust::error::CudaError),
}
