use core::fmt::Debug;
use cust_core::DeviceCopy;

/// An element that can be scanned on the device.
///
/// The scan operator is addition. Integer types wrap on overflow the way
/// device arithmetic does, so the host emulator and the CUDA kernels agree
/// bit for bit. Floating point types carry no accuracy guarantee beyond what
/// the summation order happens to give.
pub trait ScanElement: Copy + DeviceCopy + PartialEq + Debug + Send + Sync + 'static {
    /// Identity of the scan operator. Lanes past the end of the input load
    /// this value.
    const ZERO: Self;

    /// Name of the PTX entry point that scans a buffer of this type.
    const KERNEL_NAME: &'static str;

    /// The scan operator.
    fn combine(self, other: Self) -> Self;
}

macro_rules! impl_wrapping_element {
    ($($ty:ty => $kernel:literal),* $(,)?) => {
        $(
            impl ScanElement for $ty {
                const ZERO: Self = 0;
                const KERNEL_NAME: &'static str = $kernel;

                #[inline(always)]
                fn combine(self, other: Self) -> Self {
                    self.wrapping_add(other)
                }
            }
        )*
    };
}

macro_rules! impl_float_element {
    ($($ty:ty => $kernel:literal),* $(,)?) => {
        $(
            impl ScanElement for $ty {
                const ZERO: Self = 0.0;
                const KERNEL_NAME: &'static str = $kernel;

                #[inline(always)]
                fn combine(self, other: Self) -> Self {
                    self + other
                }
            }
        )*
    };
}

impl_wrapping_element! {
    u32 => "single_pass_scan_u32",
    i32 => "single_pass_scan_i32",
    u64 => "single_pass_scan_u64",
    i64 => "single_pass_scan_i64",
}

impl_float_element! {
    f32 => "single_pass_scan_f32",
    f64 => "single_pass_scan_f64",
}
