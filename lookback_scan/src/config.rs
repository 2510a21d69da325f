use crate::error::ScanError;
use rand::{seq::SliceRandom, SeedableRng};
use rand_hc::Hc128Rng;

/// Lanes per group used by the emulated device unless configured otherwise.
pub const DEFAULT_GROUP_WIDTH: usize = 64;

/// Groups the emulated device keeps resident at once unless configured
/// otherwise.
pub const DEFAULT_RESIDENT_GROUPS: usize = 8;

/// Order in which the emulated device hands physical groups to free slots.
///
/// The scan assigns its own virtual group order, so every order must give
/// the same result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchOrder {
    #[default]
    InOrder,
    Reversed,
    Shuffled { seed: u64 },
}

impl DispatchOrder {
    /// The physical group indices `0..num_groups` in dispatch order.
    pub fn physical_order(&self, num_groups: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..num_groups).collect();
        match *self {
            DispatchOrder::InOrder => {}
            DispatchOrder::Reversed => order.reverse(),
            DispatchOrder::Shuffled { seed } => {
                let mut rng = Hc128Rng::seed_from_u64(seed);
                order.shuffle(&mut rng);
            }
        }
        order
    }
}

/// How a scan is laid out on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    /// Lanes per group. Must be a power of two.
    pub group_width: usize,
    /// Upper bound on groups executing at the same time. Groups beyond it
    /// wait for a slot, the way blocks wait for a free multiprocessor.
    pub resident_groups: usize,
    pub dispatch: DispatchOrder,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            group_width: DEFAULT_GROUP_WIDTH,
            resident_groups: DEFAULT_RESIDENT_GROUPS,
            dispatch: DispatchOrder::default(),
        }
    }
}

impl ScanConfig {
    pub fn with_group_width(mut self, group_width: usize) -> Self {
        self.group_width = group_width;
        self
    }

    pub fn with_resident_groups(mut self, resident_groups: usize) -> Self {
        self.resident_groups = resident_groups;
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchOrder) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        check_group_width(self.group_width)?;
        if self.resident_groups == 0 {
            return Err(ScanError::NoResidentGroups);
        }
        Ok(())
    }

    /// Validates the config for a backend whose kernels were compiled for a
    /// single group width.
    pub fn validate_for_width(&self, supported: usize) -> Result<(), ScanError> {
        self.validate()?;
        if self.group_width != supported {
            return Err(ScanError::UnsupportedGroupWidth {
                requested: self.group_width,
                supported,
            });
        }
        Ok(())
    }
}

fn check_group_width(width: usize) -> Result<(), ScanError> {
    if !width.is_power_of_two() {
        return Err(ScanError::GroupWidthNotPowerOfTwo { width });
    }
    Ok(())
}

/// Launch geometry for one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchShape {
    /// Number of elements scanned.
    pub len: usize,
    pub group_width: usize,
    pub num_groups: usize,
}

impl LaunchShape {
    pub fn new(len: usize, group_width: usize) -> Result<Self, ScanError> {
        check_group_width(group_width)?;
        if len == 0 {
            return Err(ScanError::EmptyInput);
        }
        let num_groups = div_ceil(len, group_width);
        if u32::try_from(num_groups).is_err() {
            return Err(ScanError::TooManyGroups { num_groups });
        }
        Ok(Self {
            len,
            group_width,
            num_groups,
        })
    }

    /// Total lanes launched, padding lanes included.
    pub fn num_threads(&self) -> usize {
        self.num_groups * self.group_width
    }

    /// True when virtual group `group` has no padding lanes.
    pub fn is_full_group(&self, group: usize) -> bool {
        (group + 1) * self.group_width <= self.len
    }
}

fn div_ceil(numerator: usize, denominator: usize) -> usize {
    (numerator + denominator - 1) / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ScanConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_power_of_two_width() {
        let err = ScanConfig::default().with_group_width(48).validate();
        assert!(matches!(err, Err(ScanError::GroupWidthNotPowerOfTwo { width: 48 })));
        let err = ScanConfig::default().with_group_width(0).validate();
        assert!(matches!(err, Err(ScanError::GroupWidthNotPowerOfTwo { width: 0 })));
    }

    #[test]
    fn rejects_zero_resident_groups() {
        let err = ScanConfig::default().with_resident_groups(0).validate();
        assert!(matches!(err, Err(ScanError::NoResidentGroups)));
    }

    #[test]
    fn shape_pads_last_group() {
        let shape = LaunchShape::new(65, 64).unwrap();
        assert_eq!(shape.num_groups, 2);
        assert_eq!(shape.num_threads(), 128);
        assert!(shape.is_full_group(0));
        assert!(!shape.is_full_group(1));
    }

    #[test]
    fn shape_of_aligned_len() {
        let shape = LaunchShape::new(3 * 64, 64).unwrap();
        assert_eq!(shape.num_groups, 3);
        assert!(shape.is_full_group(2));
    }

    #[test]
    fn empty_shape_is_an_error() {
        assert!(matches!(LaunchShape::new(0, 64), Err(ScanError::EmptyInput)));
    }

    #[test]
    fn shape_rejects_bad_widths() {
        assert!(matches!(
            LaunchShape::new(100, 0),
            Err(ScanError::GroupWidthNotPowerOfTwo { width: 0 })
        ));
        assert!(matches!(
            LaunchShape::new(100, 24),
            Err(ScanError::GroupWidthNotPowerOfTwo { width: 24 })
        ));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn shape_rejects_more_groups_than_the_counter_holds() {
        let len = u32::MAX as usize + 1;
        assert!(matches!(
            LaunchShape::new(len, 1),
            Err(ScanError::TooManyGroups { num_groups }) if num_groups == len
        ));
        let shape = LaunchShape::new(u32::MAX as usize, 1).unwrap();
        assert_eq!(shape.num_groups, u32::MAX as usize);
    }

    #[test]
    fn fixed_width_backends_reject_other_widths() {
        let config = ScanConfig::default().with_group_width(512);
        assert!(config.validate_for_width(512).is_ok());
        assert!(matches!(
            config.validate_for_width(256),
            Err(ScanError::UnsupportedGroupWidth {
                requested: 512,
                supported: 256
            })
        ));
        // A bad config is reported as such before the width comparison.
        let config = ScanConfig::default().with_resident_groups(0);
        assert!(matches!(
            config.validate_for_width(DEFAULT_GROUP_WIDTH),
            Err(ScanError::NoResidentGroups)
        ));
    }

    #[test]
    fn dispatch_orders_are_permutations() {
        for dispatch in [
            DispatchOrder::InOrder,
            DispatchOrder::Reversed,
            DispatchOrder::Shuffled { seed: 7 },
        ] {
            let mut order = dispatch.physical_order(100);
            order.sort_unstable();
            assert_eq!(order, (0..100).collect::<Vec<_>>());
        }
        assert_eq!(DispatchOrder::Reversed.physical_order(3), vec![2, 1, 0]);
    }

    #[test]
    fn shuffled_order_is_reproducible() {
        let a = DispatchOrder::Shuffled { seed: 42 }.physical_order(50);
        let b = DispatchOrder::Shuffled { seed: 42 }.physical_order(50);
        assert_eq!(a, b);
        assert_ne!(a, DispatchOrder::InOrder.physical_order(50));
    }
}
