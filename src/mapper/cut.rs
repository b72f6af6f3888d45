// SPDX-License-Identifier: Apache-2.0

//! Cuts and the bounded per-node cut storage.

use std::cmp::Ordering;

use crate::mapper::truth::TruthTable64;

/// Upper bound on the LUT size the mapper supports.
pub const MAX_CUT_LEAVES: usize = 8;

/// 64-bit membership signature of a single node id.
pub fn cut_sign(id: u32) -> u64 {
    1u64 << (id % 64)
}

/// A set of leaves (mapper ids, sorted ascending) together with the cost
/// estimates of implementing the root as one LUT over those leaves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cut {
    leaves: [u32; MAX_CUT_LEAVES],
    n_leaves: u8,
    pub sign: u64,
    pub delay: f32,
    pub area: f32,
    pub truth: Option<TruthTable64>,
}

impl Default for Cut {
    fn default() -> Self {
        Cut {
            leaves: [0; MAX_CUT_LEAVES],
            n_leaves: 0,
            sign: 0,
            delay: 0.0,
            area: 0.0,
            truth: None,
        }
    }
}

impl Cut {
    /// The cut `{id}`; its function is the identity of leaf 0.
    pub fn trivial(id: u32) -> Self {
        let mut cut = Cut::default();
        cut.leaves[0] = id;
        cut.n_leaves = 1;
        cut.sign = cut_sign(id);
        cut.truth = Some(TruthTable64::var(0));
        cut
    }

    /// Builds a cut from sorted, distinct leaves.
    pub fn from_leaves(leaves: &[u32]) -> Self {
        assert!(leaves.len() <= MAX_CUT_LEAVES, "too many leaves");
        debug_assert!(leaves.windows(2).all(|w| w[0] < w[1]), "leaves must be sorted");
        let mut cut = Cut::default();
        cut.leaves[..leaves.len()].copy_from_slice(leaves);
        cut.n_leaves = leaves.len() as u8;
        cut.sign = leaves.iter().fold(0, |sign, leaf| sign | cut_sign(*leaf));
        cut
    }

    pub fn leaves(&self) -> &[u32] {
        &self.leaves[..self.n_leaves as usize]
    }

    pub fn len(&self) -> usize {
        self.n_leaves as usize
    }

    pub fn is_empty(&self) -> bool {
        self.n_leaves == 0
    }

    pub fn is_trivial_of(&self, id: u32) -> bool {
        self.n_leaves == 1 && self.leaves[0] == id
    }

    /// True if every leaf of `self` is also a leaf of `other`.
    pub fn is_subset_of(&self, other: &Cut) -> bool {
        if self.sign & !other.sign != 0 || self.len() > other.len() {
            return false;
        }
        let theirs = other.leaves();
        self.leaves().iter().all(|leaf| theirs.binary_search(leaf).is_ok())
    }
}

/// Merges two sorted leaf sets; `None` if the union exceeds `limit` leaves.
pub fn merge_ordered(a: &Cut, b: &Cut, limit: usize) -> Option<Cut> {
    let (la, lb) = (a.leaves(), b.leaves());
    let mut out = Cut::default();
    let (mut i, mut j, mut n) = (0, 0, 0);
    while i < la.len() || j < lb.len() {
        let next = if j == lb.len() || (i < la.len() && la[i] < lb[j]) {
            i += 1;
            la[i - 1]
        } else if i == la.len() || lb[j] < la[i] {
            j += 1;
            lb[j - 1]
        } else {
            i += 1;
            j += 1;
            la[i - 1]
        };
        if n == limit {
            return None;
        }
        out.leaves[n] = next;
        n += 1;
    }
    out.n_leaves = n as u8;
    out.sign = a.sign | b.sign;
    Some(out)
}

/// Which cost a cut set is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    Delay,
    Area,
}

fn cmp_with_eps(a: f32, b: f32, eps: f32) -> Ordering {
    if a < b - eps {
        Ordering::Less
    } else if a > b + eps {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

pub fn compare_cuts(a: &Cut, b: &Cut, mode: SortMode, eps: f32) -> Ordering {
    match mode {
        SortMode::Delay => cmp_with_eps(a.delay, b.delay, eps)
            .then(a.len().cmp(&b.len()))
            .then(cmp_with_eps(a.area, b.area, eps)),
        SortMode::Area => cmp_with_eps(a.area, b.area, eps)
            .then(a.len().cmp(&b.len()))
            .then(cmp_with_eps(a.delay, b.delay, eps)),
    }
}

/// Priority-ordered cuts of one node, holding at most `capacity` ranked cuts
/// plus the node's own trivial cut.
#[derive(Debug, Clone, Default)]
pub struct CutSet {
    cuts: Vec<Cut>,
    capacity: usize,
    initialized: bool,
}

impl CutSet {
    pub fn with_capacity(capacity: usize) -> Self {
        CutSet {
            cuts: Vec::with_capacity(capacity + 1),
            capacity,
            initialized: false,
        }
    }

    /// Invalidates the previous round's cuts so the slot can be refilled.
    pub fn reset(&mut self) {
        self.cuts.clear();
        self.initialized = true;
    }

    /// Drops the cuts and marks the slot as not holding a cut set.
    pub fn release(&mut self) {
        self.cuts.clear();
        self.initialized = false;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn cuts(&self) -> &[Cut] {
        &self.cuts
    }

    pub fn len(&self) -> usize {
        self.cuts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true if `cut` is dominated by a cut already in the set; cuts
    /// that `cut` dominates are removed.
    pub fn filter_dominated(&mut self, cut: &Cut) -> bool {
        let mut i = 0;
        while i < self.cuts.len() {
            let existing = &self.cuts[i];
            if existing.len() > cut.len() {
                if cut.is_subset_of(existing) {
                    self.cuts.remove(i);
                    continue;
                }
            } else if existing.is_subset_of(cut) {
                return true;
            }
            i += 1;
        }
        false
    }

    /// Inserts `cut` at its priority position; returns false if it ranks
    /// below a full set.
    pub fn insert_sorted(&mut self, cut: Cut, mode: SortMode, eps: f32) -> bool {
        let pos = self
            .cuts
            .iter()
            .position(|existing| compare_cuts(&cut, existing, mode, eps) == Ordering::Less)
            .unwrap_or(self.cuts.len());
        if pos >= self.capacity {
            return false;
        }
        self.cuts.insert(pos, cut);
        self.cuts.truncate(self.capacity);
        true
    }

    /// Appends `cut` without ranking; used for the node's own trivial cut,
    /// which may exceed the capacity by one.
    pub fn push_unranked(&mut self, cut: Cut) {
        debug_assert!(self.cuts.len() <= self.capacity);
        self.cuts.push(cut);
    }

    /// Replaces the contents with the single cut `cut`.
    pub fn set_single(&mut self, cut: Cut) {
        self.cuts.clear();
        self.cuts.push(cut);
        self.initialized = true;
    }
}

/// Reused cut storage for every mapper node, indexed by mapper id.
#[derive(Debug, Clone, Default)]
pub struct CutArena {
    sets: Vec<CutSet>,
}

impl CutArena {
    pub fn new(num_nodes: usize, capacity: usize) -> Self {
        CutArena {
            sets: (0..num_nodes).map(|_| CutSet::with_capacity(capacity)).collect(),
        }
    }

    pub fn get(&self, id: usize) -> &CutSet {
        &self.sets[id]
    }

    pub fn get_mut(&mut self, id: usize) -> &mut CutSet {
        &mut self.sets[id]
    }

    pub fn is_initialized(&self, id: usize) -> bool {
        self.sets[id].is_initialized()
    }

    /// Moves the set of `id` out so it can be rebuilt while the fanin sets
    /// are read; must be handed back with `restore`.
    pub fn take(&mut self, id: usize) -> CutSet {
        std::mem::take(&mut self.sets[id])
    }

    pub fn restore(&mut self, id: usize, set: CutSet) {
        self.sets[id] = set;
    }

    /// Total number of cuts currently stored.
    pub fn total_cuts(&self) -> usize {
        self.sets.iter().map(|s| s.len()).sum()
    }
}
