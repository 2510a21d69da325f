#![cfg_attr(
    target_os = "cuda",
    no_std,
    feature(register_attr),
    register_attr(nvvm_internal)
)]

//! Device side of the single-pass inclusive scan.
//!
//! Everything except [`kernels`] is written against the [`ThreadGroup`]
//! abstraction so the same kernel body runs on a CUDA block and on the host
//! emulator in the `lookback_scan` crate.

pub mod element;
pub mod group;
pub mod kernels;
pub mod local_scan;
pub mod look_back;
pub mod single_pass;
mod step;

pub use element::ScanElement;
pub use group::ThreadGroup;
pub use look_back::LookBackState;
pub use single_pass::{GroupShared, ScanArgs};
