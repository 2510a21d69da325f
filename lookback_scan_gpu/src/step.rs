/// Geometric sequence of scan offsets: `init`, `init * factor`, ... stopping
/// before `limit`.
pub struct MultStep {
    factor: usize,
    next: usize,
    limit: usize,
}

impl Iterator for MultStep {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.limit || self.next == 0 {
            return None;
        }
        let next = self.next;
        self.next = self.next.saturating_mul(self.factor);
        Some(next)
    }
}

// Returns an iterator that generates offsets below `limit` by repeatedly
// multiplying by the given factor.
pub fn mult_step(init: usize, factor: usize, limit: usize) -> MultStep {
    MultStep {
        factor,
        next: init,
        limit,
    }
}

/// The offsets visited by a Kogge-Stone scan over `width` lanes.
pub fn scan_offsets(width: usize) -> MultStep {
    mult_step(1, 2, width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_double_until_width() {
        let offsets: Vec<usize> = scan_offsets(64).collect();
        assert_eq!(offsets, vec![1, 2, 4, 8, 16, 32]);
    }

    #[test]
    fn single_lane_has_no_rounds() {
        assert_eq!(scan_offsets(1).count(), 0);
    }

    #[test]
    fn round_count_is_ceil_log2() {
        assert_eq!(scan_offsets(512).count(), 9);
        assert_eq!(scan_offsets(5).count(), 3);
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        let offsets: Vec<usize> = mult_step(usize::MAX / 2 + 1, 2, usize::MAX).collect();
        assert_eq!(offsets, vec![usize::MAX / 2 + 1]);
    }
}
