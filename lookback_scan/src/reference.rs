//! Sequential host scan used to check device results.

use itertools::{EitherOrBoth, Itertools};
use lookback_scan_gpu::ScanElement;

/// Inclusive scan of `xs` into a new vector.
pub fn inclusive_scan<T: ScanElement>(xs: &[T]) -> Vec<T> {
    xs.iter()
        .scan(T::ZERO, |acc, &x| {
            *acc = acc.combine(x);
            Some(*acc)
        })
        .collect_vec()
}

/// In-place inclusive scan.
pub fn inclusive_scan_in_place<T: ScanElement>(xs: &mut [T]) {
    for i in 1..xs.len() {
        xs[i] = xs[i - 1].combine(xs[i]);
    }
}

/// Index of the first position where `actual` differs from `expected`, or of
/// the shorter length if one is a prefix of the other.
pub fn first_mismatch<T: PartialEq>(expected: &[T], actual: &[T]) -> Option<usize> {
    expected
        .iter()
        .zip_longest(actual)
        .position(|pair| match pair {
            EitherOrBoth::Both(e, a) => e != a,
            _ => true,
        })
}
