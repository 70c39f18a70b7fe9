//! Sequence-space arithmetic (see spec GLOSSARY: "Sequence-space
//! arithmetic"): comparison of wrapping counters where `a < b` iff
//! `(a - b) mod 2^N` falls in the upper half of the range. This lets RTP
//! timestamps and sequence numbers wrap cleanly without the comparison
//! flipping sign.

use std::cmp::Ordering;

/// Compare two `u32` values (RTP timestamps / sample-index truncations)
/// in sequence space. Correct for windows smaller than 2^31.
pub fn seq_cmp_u32(a: u32, b: u32) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let diff = a.wrapping_sub(b);
    if diff < 0x8000_0000 {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

/// `true` iff `a` is strictly before `b` in sequence space.
pub fn seq_lt_u32(a: u32, b: u32) -> bool {
    seq_cmp_u32(a, b) == Ordering::Less
}

/// Compare two `u16` values (RTP sequence numbers) in sequence space.
pub fn seq_cmp_u16(a: u16, b: u16) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let diff = a.wrapping_sub(b);
    if diff < 0x8000 {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

/// `true` iff `a` is strictly before `b` in sequence space.
pub fn seq_lt_u16(a: u16, b: u16) -> bool {
    seq_cmp_u16(a, b) == Ordering::Less
}

/// Signed distance `a - b` in sequence space, i.e. how far ahead `a` is of
/// `b`. Negative means `a` is behind `b`.
pub fn seq_diff_u32(a: u32, b: u32) -> i64 {
    let diff = a.wrapping_sub(b) as i32;
    diff as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_ordering() {
        assert!(seq_lt_u32(1, 2));
        assert!(!seq_lt_u32(2, 1));
        assert_eq!(seq_cmp_u32(5, 5), Ordering::Equal);
    }

    #[test]
    fn wraps_correctly() {
        // smallest + 2^31 vs largest - 2^31: the boundary case from spec §8.
        let smallest = 0u32;
        let largest = u32::MAX;
        assert!(seq_lt_u32(largest, smallest));
        assert!(!seq_lt_u32(smallest, largest));
    }

    #[test]
    fn half_window_wrap() {
        let a = u32::MAX - 10;
        let b = 10u32;
        // b is 21 "ticks" after a, wrapping through u32::MAX.
        assert!(seq_lt_u32(a, b));
    }

    #[test]
    fn u16_wraps() {
        assert!(seq_lt_u16(65535, 0));
        assert!(!seq_lt_u16(0, 65535));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// For any base and any two small forward offsets within a single
        /// window (well under the 2^31 ambiguity boundary), sequence-space
        /// ordering agrees with the plain offset ordering: `base+a < base+b`
        /// iff `a < b`.
        #[test]
        fn agrees_with_offset_ordering_within_a_window(
            base in any::<u32>(),
            a in 0u32..0x3FFF_FFFF,
            b in 0u32..0x3FFF_FFFF,
        ) {
            let ta = base.wrapping_add(a);
            let tb = base.wrapping_add(b);
            prop_assert_eq!(seq_lt_u32(ta, tb), a < b);
            prop_assert_eq!(seq_cmp_u32(ta, tb) == Ordering::Equal, a == b);
        }

        /// `seq_cmp_u32` is antisymmetric: swapping the arguments flips a
        /// strict ordering and preserves equality.
        #[test]
        fn antisymmetric(a in any::<u32>(), b in any::<u32>()) {
            match (seq_cmp_u32(a, b), seq_cmp_u32(b, a)) {
                (Ordering::Equal, Ordering::Equal) => prop_assert_eq!(a, b),
                (Ordering::Less, Ordering::Greater) => {}
                (Ordering::Greater, Ordering::Less) => {}
                other => prop_assert!(false, "inconsistent comparison: {:?}", other),
            }
        }

        /// The u16 sequence-number comparator has the same within-a-window
        /// agreement property as the u32 timestamp comparator, scaled to
        /// its own ambiguity boundary.
        #[test]
        fn u16_agrees_with_offset_ordering_within_a_window(
            base in any::<u16>(),
            a in 0u16..0x3FFF,
            b in 0u16..0x3FFF,
        ) {
            let ta = base.wrapping_add(a);
            let tb = base.wrapping_add(b);
            prop_assert_eq!(seq_lt_u16(ta, tb), a < b);
        }
    }
}
