//! Single-pass inclusive prefix sum with decoupled look-back.
//!
//! The kernel body lives in `lookback_scan_gpu`. This crate drives it, either
//! on a CUDA device (`cuda` feature) or on the host [`emulator`], which runs
//! the same body with one OS thread per lane.

pub mod config;
#[cfg(feature = "cuda")]
pub mod device;
pub mod emulator;
pub mod error;
pub mod reference;
pub mod scan;

pub use config::{DispatchOrder, LaunchShape, ScanConfig};
#[cfg(feature = "cuda")]
pub use device::CudaScanner;
pub use error::ScanError;
pub use lookback_scan_gpu::ScanElement;
pub use scan::{EmulatedScanner, InclusiveScan, ScanSummary};
