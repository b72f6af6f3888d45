// SPDX-License-Identifier: Apache-2.0

//! Generic per-node cut computation and the cost helpers it shares with the
//! partition-aware routine.

use crate::mapper::cut::{merge_ordered, Cut, CutSet, SortMode};
use crate::mapper::truth::{and_of_cuts, TruthTable64};
use crate::mapper::{MapObjKind, Mapper, NodeMapState};

impl Mapper {
    pub(crate) fn and_fanins(&self, id: usize) -> (usize, usize, bool, bool) {
        match self.objs[id].kind {
            MapObjKind::And {
                fanin0,
                fanin1,
                compl0,
                compl1,
            } => (fanin0, fanin1, compl0, compl1),
            other => panic!("node {} is not an AND: {:?}", id, other),
        }
    }

    pub(crate) fn lut_area(&self, _n_leaves: usize) -> f32 {
        1.0
    }

    pub(crate) fn sort_mode(mode: u8) -> SortMode {
        if mode == 0 {
            SortMode::Delay
        } else {
            SortMode::Area
        }
    }

    /// The leaves a LUT for `cut` actually reads. A cut equal to the node's
    /// own trivial cut stands for a two-input LUT over its fanins.
    pub(crate) fn implementation_cut(&self, id: usize, cut: &Cut) -> Cut {
        if !cut.is_trivial_of(id as u32) || !self.objs[id].is_and() {
            return *cut;
        }
        let (f0, f1, _, _) = self.and_fanins(id);
        let (lo, hi) = (f0.min(f1) as u32, f0.max(f1) as u32);
        let mut implementation = if lo == hi {
            Cut::from_leaves(&[lo])
        } else {
            Cut::from_leaves(&[lo, hi])
        };
        implementation.delay = cut.delay;
        implementation.area = cut.area;
        implementation
    }

    /// Truth table of the node as a function of its own fanins.
    pub(crate) fn fanin_function_truth(&self, id: usize) -> Option<TruthTable64> {
        let (f0, f1, c0, c1) = self.and_fanins(id);
        let union = self.implementation_cut(id, &Cut::trivial(id as u32));
        Some(and_of_cuts(
            TruthTable64::var(0),
            &[f0 as u32],
            c0,
            TruthTable64::var(0),
            &[f1 as u32],
            c1,
            union.leaves(),
        ))
    }

    pub(crate) fn cut_delay(&self, id: usize, cut: &Cut) -> f32 {
        let implementation = self.implementation_cut(id, cut);
        let arrival = implementation
            .leaves()
            .iter()
            .map(|leaf| self.objs[*leaf as usize].best.delay)
            .fold(0.0f32, f32::max);
        1.0 + arrival
    }

    pub(crate) fn area_flow(&self, id: usize, cut: &Cut) -> f32 {
        let implementation = self.implementation_cut(id, cut);
        let mut flow = self.lut_area(implementation.len());
        for leaf in implementation.leaves() {
            let leaf = &self.objs[*leaf as usize];
            if leaf.n_refs == 0 || leaf.is_const() {
                flow += leaf.best.area;
            } else {
                flow += leaf.best.area / leaf.est_refs.max(1.0);
            }
        }
        flow
    }

    /// References the LUTs of `cut` and, recursively, of every AND leaf that
    /// becomes referenced; returns the area added.
    pub(crate) fn cut_area_ref(&mut self, id: usize, cut: &Cut) -> f32 {
        let mut area = 0.0;
        let mut stack = vec![self.implementation_cut(id, cut)];
        while let Some(cut) = stack.pop() {
            area += self.lut_area(cut.len());
            for leaf in cut.leaves() {
                let leaf = *leaf as usize;
                let obj = &mut self.objs[leaf];
                obj.n_refs += 1;
                if obj.n_refs > 1 || !obj.is_and() {
                    continue;
                }
                stack.push(self.implementation_cut(leaf, &self.objs[leaf].best));
            }
        }
        area
    }

    /// Inverse of `cut_area_ref`; returns the area removed.
    pub(crate) fn cut_area_deref(&mut self, id: usize, cut: &Cut) -> f32 {
        let mut area = 0.0;
        let mut stack = vec![self.implementation_cut(id, cut)];
        while let Some(cut) = stack.pop() {
            area += self.lut_area(cut.len());
            for leaf in cut.leaves() {
                let leaf = *leaf as usize;
                let obj = &mut self.objs[leaf];
                debug_assert!(obj.n_refs > 0, "node {} dereferenced below zero", leaf);
                obj.n_refs -= 1;
                if obj.n_refs > 0 || !obj.is_and() {
                    continue;
                }
                stack.push(self.implementation_cut(leaf, &self.objs[leaf].best));
            }
        }
        area
    }

    /// Area of the LUTs that `cut` alone would add to the current mapping.
    pub(crate) fn exact_area(&mut self, id: usize, cut: &Cut) -> f32 {
        let added = self.cut_area_ref(id, cut);
        let removed = self.cut_area_deref(id, cut);
        debug_assert!(
            (added - removed).abs() <= self.params.epsilon,
            "unbalanced ref/deref at node {}: {} vs {}",
            id,
            added,
            removed
        );
        removed
    }

    pub(crate) fn update_est_refs(&mut self, id: usize, mode: u8) {
        let obj = &mut self.objs[id];
        match mode {
            0 => obj.est_refs = obj.n_refs as f32,
            1 => obj.est_refs = (2.0 * obj.est_refs + obj.n_refs as f32) / 3.0,
            _ => {}
        }
    }

    /// Dereferences the node's best cut before re-optimizing it.
    pub(crate) fn release_best(&mut self, id: usize, mode: u8) {
        if mode > 0 && self.objs[id].n_refs > 0 {
            let best = self.objs[id].best;
            self.cut_area_deref(id, &best);
            self.advance_state(id, NodeMapState::Dereferenced);
        }
    }

    /// The cuts of fanin `fanin`, or its trivial cut when it has no set.
    pub(crate) fn fanin_cuts(&self, fanin: usize) -> Vec<Cut> {
        let set = self.cut_sets.get(fanin);
        if set.is_initialized() && !set.is_empty() {
            set.cuts().to_vec()
        } else {
            let mut trivial = Cut::trivial(fanin as u32);
            trivial.delay = self.objs[fanin].best.delay;
            trivial.area = self.objs[fanin].best.area;
            vec![trivial]
        }
    }

    /// Previous best cut with refreshed costs, or `None` in the first round.
    pub(crate) fn refreshed_best(&mut self, id: usize, mode: u8, first: bool) -> Option<Cut> {
        if first || self.objs[id].best.is_empty() {
            return None;
        }
        let mut best = self.objs[id].best;
        best.delay = self.cut_delay(id, &best);
        best.area = if mode == 2 {
            self.exact_area(id, &best)
        } else {
            self.area_flow(id, &best)
        };
        Some(best)
    }

    pub(crate) fn merged_truth(
        &self,
        id: usize,
        cut0: &Cut,
        cut1: &Cut,
        merged: &Cut,
    ) -> Option<TruthTable64> {
        let (_, _, c0, c1) = self.and_fanins(id);
        Some(and_of_cuts(
            cut0.truth?,
            cut0.leaves(),
            c0,
            cut1.truth?,
            cut1.leaves(),
            c1,
            merged.leaves(),
        ))
    }

    /// The node's own cut when no merged cut survived.
    pub(crate) fn synthesized_trivial(&self, id: usize) -> Cut {
        let mut trivial = Cut::trivial(id as u32);
        trivial.delay = self.cut_delay(id, &trivial);
        trivial.area = self.area_flow(id, &trivial);
        trivial
    }

    /// Selects the best cut from the filled `set`, exposes the node's trivial
    /// cut to its fanouts, stores the set and re-references the best cut.
    pub(crate) fn finish_node(&mut self, id: usize, mut set: CutSet, mode: u8, preprocess: bool) {
        if set.is_empty() {
            set.push_unranked(self.synthesized_trivial(id));
        }
        self.advance_state(id, NodeMapState::CutsGenerated);

        let eps = self.params.epsilon;
        let candidate = set.cuts()[0];
        if !preprocess || candidate.delay <= self.objs[id].required + eps {
            self.objs[id].best = candidate;
        }
        self.advance_state(id, NodeMapState::BestSelected);

        let best = self.objs[id].best;
        if best.len() > 1 {
            let mut trivial = Cut::trivial(id as u32);
            trivial.delay = best.delay;
            trivial.area = best.area;
            set.push_unranked(trivial);
        }
        self.cut_sets.restore(id, set);

        if mode > 0 && self.objs[id].n_refs > 0 {
            self.cut_area_ref(id, &best);
            self.advance_state(id, NodeMapState::Referenced);
        }
    }

    /// Computes the cuts of AND node `id` by merging its fanins' cuts.
    ///
    /// `mode` 0 ranks cuts by delay; 1 and 2 rank them by area flow and
    /// exact area and drop cuts that miss the node's required time.
    pub fn map_node_generic(&mut self, id: usize, mode: u8, preprocess: bool, first: bool) {
        let (f0, f1, _, _) = self.and_fanins(id);
        let k = self.params.lut_size;
        let eps = self.params.epsilon;
        let sort = Self::sort_mode(mode);

        self.update_est_refs(id, mode);
        self.release_best(id, mode);

        let mut set = self.cut_sets.take(id);
        set.reset();
        if let Some(best) = self.refreshed_best(id, mode, first) {
            if !preprocess || best.len() <= 1 {
                set.insert_sorted(best, sort, eps);
            }
        }

        let cuts0 = self.fanin_cuts(f0);
        let cuts1 = self.fanin_cuts(f1);
        let required = self.objs[id].required;
        for cut0 in &cuts0 {
            for cut1 in &cuts1 {
                if (cut0.sign | cut1.sign).count_ones() as usize > k {
                    continue;
                }
                let Some(mut cut) = merge_ordered(cut0, cut1, k) else {
                    continue;
                };
                self.cuts_merged += 1;
                if !self.params.skip_cut_filter && set.filter_dominated(&cut) {
                    continue;
                }
                if self.params.compute_truth {
                    cut.truth = self.merged_truth(id, cut0, cut1, &cut);
                }
                cut.delay = self.cut_delay(id, &cut);
                if mode > 0 && cut.delay > required + eps {
                    continue;
                }
                cut.area = if mode == 2 {
                    self.exact_area(id, &cut)
                } else {
                    self.area_flow(id, &cut)
                };
                set.insert_sorted(cut, sort, eps);
            }
        }

        self.finish_node(id, set, mode, preprocess);
    }
}

#[cfg(test)]
mod tests {
    use crate::mapper::{Cut, Mapper, MapperParams, NodeMapState};
    use crate::test_utils::setup_simple_network;
    use pretty_assertions::assert_eq;

    fn mapper_id(mapper: &Mapper, node: crate::aig::NodeRef) -> usize {
        mapper.id_map().get(node).unwrap()
    }

    #[test]
    fn test_first_round_cut_sets() {
        let t = setup_simple_network();
        let mut mapper = Mapper::from_network(&t.network, MapperParams::default());
        let a = mapper_id(&mapper, t.a);
        mapper.map_node_generic(a, 0, false, true);
        let set = mapper.cut_set(a);
        // {i0, i1} plus the trivial cut exposed to fanouts.
        assert_eq!(set.len(), 2);
        assert_eq!(set.cuts()[0].leaves(), &[1, 2]);
        assert_eq!(set.cuts()[0].delay, 1.0);
        assert!(set.cuts()[1].is_trivial_of(a as u32));
        assert_eq!(mapper.obj(a).state, NodeMapState::BestSelected);
    }

    #[test]
    fn test_self_cut_reads_fanins() {
        let t = setup_simple_network();
        let mapper = Mapper::from_network(&t.network, MapperParams::default());
        let c = mapper_id(&mapper, t.c);
        let a = mapper_id(&mapper, t.a);
        let b = mapper_id(&mapper, t.b);
        let implementation = mapper.implementation_cut(c, &Cut::trivial(c as u32));
        assert_eq!(implementation.leaves(), &[a as u32, b as u32]);
    }

    #[test]
    fn test_ref_deref_balance() {
        let t = setup_simple_network();
        let mut mapper = Mapper::from_network(&t.network, MapperParams::default());
        mapper.perform_mapping();
        let c = mapper_id(&mapper, t.c);
        let before: Vec<i32> = (0..mapper.num_objs()).map(|i| mapper.obj(i).n_refs).collect();
        let best = mapper.obj(c).best;
        let removed = mapper.cut_area_deref(c, &best);
        let added = mapper.cut_area_ref(c, &best);
        assert_eq!(removed, added);
        let after: Vec<i32> = (0..mapper.num_objs()).map(|i| mapper.obj(i).n_refs).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_missing_fanin_set_uses_trivial_cut() {
        let t = setup_simple_network();
        let mut mapper = Mapper::from_network(&t.network, MapperParams::default());
        let a = mapper_id(&mapper, t.a);
        let b = mapper_id(&mapper, t.b);
        let c = mapper_id(&mapper, t.c);
        // a and b are never mapped, so c only sees {a} and {b}.
        mapper.map_node_generic(c, 0, false, true);
        assert_eq!(mapper.cut_set(c).cuts()[0].leaves(), &[a as u32, b as u32]);
        mapper.release_cut_set(c);
        assert!(!mapper.cut_set(c).is_initialized());
    }
}
