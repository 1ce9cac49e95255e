//! Segregated free-list bin index.
//!
//! Sixteen bins cover the adjusted-size space: the first five are exact-size
//! bins (every block in bin `i` has exactly size `16 + 8*i`), the remaining
//! eleven cover widening power-of-two-ish ranges up to the largest blocks the
//! allocator will ever place through a bin (blocks past the last bin's upper
//! bound fall into it too — only the wilderness grows without limit).

/// Number of segregated free-list bins.
pub(crate) const NUM_BINS: usize = 16;

/// Number of bins whose members are all exactly one size (16, 24, 32, 40, 48).
pub(crate) const EXACT_BINS: usize = 5;

/// Maps an adjusted block size to the bin that holds it.
///
/// `size` is expected to already be a multiple of 8 and at least
/// [`crate::block::MINSIZE`]; the mapping is monotone non-decreasing in `size`.
pub(crate) fn index_of(size: usize) -> usize {
    match size {
        16 => 0,
        24 => 1,
        32 => 2,
        40 => 3,
        48 => 4,
        s if s <= 72 => 5,
        s if s <= 136 => 6,
        s if s <= 264 => 7,
        s if s <= 520 => 8,
        s if s <= 1032 => 9,
        s if s <= 2056 => 10,
        s if s <= 4104 => 11,
        s if s <= 16392 => 12,
        s if s <= 32774 => 13,
        s if s <= 262152 => 14,
        _ => 15,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_bins_map_their_own_size() {
        assert_eq!(index_of(16), 0);
        assert_eq!(index_of(24), 1);
        assert_eq!(index_of(32), 2);
        assert_eq!(index_of(40), 3);
        assert_eq!(index_of(48), 4);
    }

    #[test]
    fn monotone_non_decreasing() {
        let mut prev = index_of(16);
        for size in (16..=300_000).step_by(8) {
            let idx = index_of(size);
            assert!(idx >= prev, "index_of regressed at size {size}");
            prev = idx;
        }
    }

    #[test]
    fn huge_sizes_fall_into_last_bin() {
        assert_eq!(index_of(10_000_000), NUM_BINS - 1);
    }
}
