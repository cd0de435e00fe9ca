//! Address arithmetic used by the layout code and the host tools.

use core::ops::Range;

/// On-chip SRAM, where the first stage runs before DRAM exists.
pub const SRAM: usize = 0x0002_0000;
/// Default DRAM base.
pub const DRAM: usize = 0x4000_0000;
pub const PAGE: usize = 4096;

/// Rounds `addr` down to `align`, which must be a power of two.
#[inline]
pub const fn align_down(addr: usize, align: usize) -> usize {
    addr & !(align - 1)
}

/// Rounds `addr` up to `align`, which must be a power of two.
///
/// Returns `None` on overflow.
#[inline]
pub const fn align_up(addr: usize, align: usize) -> Option<usize> {
    match addr.checked_add(align - 1) {
        Some(end) => Some(end & !(align - 1)),
        None => None,
    }
}

#[inline]
pub fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

#[inline]
pub fn contains_range(outer: &Range<usize>, inner: &Range<usize>) -> bool {
    outer.start <= inner.start && inner.end <= outer.end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align() {
        assert_eq!(align_down(0x8FE8_0FFF, 0x1000), 0x8FE8_0000);
        assert_eq!(align_down(0x1000, 0x1000), 0x1000);
        assert_eq!(align_up(0x1001, 0x10), Some(0x1010));
        assert_eq!(align_up(0x1000, 0x10), Some(0x1000));
        assert_eq!(align_up(usize::MAX - 3, 0x10), None);
    }

    #[test]
    fn ranges() {
        assert!(overlaps(&(0..10), &(9..20)));
        assert!(!overlaps(&(0..10), &(10..20)));
        assert!(contains_range(&(0..10), &(2..10)));
        assert!(!contains_range(&(0..10), &(2..11)));
    }
}
