// SPDX-License-Identifier: Apache-2.0

//! 64-bit truth tables for cuts with at most six leaves.
//!
//! A function of `n <= 6` leaves is stored as a full six-variable table in
//! which variables `n..6` are don't-cares, so negation and conjunction are
//! plain bit operations.

pub const MAX_TRUTH_VARS: usize = 6;

const VAR_MASKS: [u64; MAX_TRUTH_VARS] = [
    0xAAAA_AAAA_AAAA_AAAA,
    0xCCCC_CCCC_CCCC_CCCC,
    0xF0F0_F0F0_F0F0_F0F0,
    0xFF00_FF00_FF00_FF00,
    0xFFFF_0000_FFFF_0000,
    0xFFFF_FFFF_0000_0000,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TruthTable64(pub u64);

impl TruthTable64 {
    pub fn const0() -> Self {
        TruthTable64(0)
    }

    pub fn var(i: usize) -> Self {
        TruthTable64(VAR_MASKS[i])
    }

    #[must_use]
    pub fn not(self) -> Self {
        TruthTable64(!self.0)
    }

    #[must_use]
    pub fn and(self, other: Self) -> Self {
        TruthTable64(self.0 & other.0)
    }

    pub fn get_bit(self, assignment: u8) -> bool {
        (self.0 >> assignment) & 1 != 0
    }

    pub fn set_bit(&mut self, assignment: u8, value: bool) {
        if value {
            self.0 |= 1 << assignment;
        } else {
            self.0 &= !(1 << assignment);
        }
    }

    /// Returns true if the function does not depend on variable `i`.
    pub fn is_independent_of(self, i: usize) -> bool {
        let mask = VAR_MASKS[i];
        let shift = 1u32 << i;
        ((self.0 & mask) >> shift) == (self.0 & !mask)
    }
}

/// Remaps `tt` from `old_leaves` order into the larger `union_leaves` order.
/// Both leaf lists are sorted.
pub fn embed_tt_into_union(tt: TruthTable64, old_leaves: &[u32], union_leaves: &[u32]) -> TruthTable64 {
    if old_leaves == union_leaves {
        return tt;
    }
    let mut map = [0usize; MAX_TRUTH_VARS];
    for (i, leaf) in old_leaves.iter().enumerate() {
        map[i] = union_leaves
            .binary_search(leaf)
            .expect("old leaf must appear in union");
    }
    let mut out = TruthTable64::const0();
    for assign in 0u8..64 {
        let mut old_assign: u8 = 0;
        for (i, j) in map.iter().enumerate().take(old_leaves.len()) {
            let bit = (assign >> *j) & 1;
            old_assign |= bit << i;
        }
        out.set_bit(assign, tt.get_bit(old_assign));
    }
    out
}

/// Truth table of `and(f0 ^ compl0, f1 ^ compl1)` over `union_leaves`.
pub fn and_of_cuts(
    tt0: TruthTable64,
    leaves0: &[u32],
    compl0: bool,
    tt1: TruthTable64,
    leaves1: &[u32],
    compl1: bool,
    union_leaves: &[u32],
) -> TruthTable64 {
    let mut a = embed_tt_into_union(tt0, leaves0, union_leaves);
    let mut b = embed_tt_into_union(tt1, leaves1, union_leaves);
    if compl0 {
        a = a.not();
    }
    if compl1 {
        b = b.not();
    }
    a.and(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_moves_variable() {
        // f(x) = x over leaf 7, embedded into [3, 7]: becomes variable 1.
        let embedded = embed_tt_into_union(TruthTable64::var(0), &[7], &[3, 7]);
        assert_eq!(embedded, TruthTable64::var(1));
        assert!(embedded.is_independent_of(0));
        assert!(!embedded.is_independent_of(1));
    }

    #[test]
    fn test_and_of_cuts_with_complement() {
        // and(x, not(y)) over leaves [1, 2].
        let tt = and_of_cuts(
            TruthTable64::var(0),
            &[1],
            false,
            TruthTable64::var(0),
            &[2],
            true,
            &[1, 2],
        );
        assert_eq!(tt, TruthTable64::var(0).and(TruthTable64::var(1).not()));
        for assign in 0u8..4 {
            let x = assign & 1 != 0;
            let y = assign & 2 != 0;
            assert_eq!(tt.get_bit(assign), x && !y);
        }
    }

    #[test]
    fn test_embed_identity_is_noop() {
        let tt = TruthTable64(0x1234_5678_9abc_def0);
        assert_eq!(embed_tt_into_union(tt, &[1, 2], &[1, 2]), tt);
    }
}
