// SPDX-License-Identifier: Apache-2.0

//! Partition-aware cut computation.
//!
//! A cut of a node in partition `p` is kept only when each of its leaves is
//! unassigned, lives in `p`, or is a recorded input of `p` (see
//! `PartitionInfo::cut_is_local`). When nothing survives, the node's own
//! trivial cut is used so the node is still implementable.

use crate::mapper::cut::{merge_ordered, Cut};
use crate::mapper::{CutStrategy, Mapper};

impl Mapper {
    /// Computes the cuts of AND node `id` keeping only partition-local cuts.
    ///
    /// Area is always ranked by area flow and candidates are not checked
    /// against required times. Falls back to `map_node_generic` when a
    /// fanin has no cut set.
    pub fn map_node_partition_aware(&mut self, id: usize, mode: u8, preprocess: bool, first: bool) {
        let (f0, f1, _, _) = self.and_fanins(id);
        if !self.cut_sets.is_initialized(f0) || !self.cut_sets.is_initialized(f1) {
            log::warn!(
                "map_node_partition_aware: fanin of node {} has no cut set; using the generic routine",
                id
            );
            self.generic_fallbacks += 1;
            self.map_node_generic(id, mode, preprocess, first);
            return;
        }
        if !matches!(self.strategy, CutStrategy::PartitionAware(_)) {
            self.map_node_generic(id, mode, preprocess, first);
            return;
        }

        let k = self.params.lut_size;
        let eps = self.params.epsilon;
        let sort = Self::sort_mode(mode);

        self.update_est_refs(id, mode);
        self.release_best(id, mode);
        for fanin in [f0, f1] {
            let obj = &mut self.objs[fanin];
            if obj.est_refs <= eps {
                obj.est_refs = obj.n_refs.max(1) as f32;
            }
        }

        let mut set = self.cut_sets.take(id);
        set.reset();
        let previous = self.refreshed_best(id, 1, first);

        let cuts0 = self.fanin_cuts(f0);
        let cuts1 = self.fanin_cuts(f1);
        let part = self.objs[id].partition;
        let CutStrategy::PartitionAware(info) = &self.strategy else {
            unreachable!("strategy checked above");
        };
        if let Some(best) = previous {
            if (!preprocess || best.len() <= 1) && info.cut_is_local(best.leaves(), part) {
                set.insert_sorted(best, sort, eps);
            }
        }

        let mut merged = 0;
        let mut rejected = 0;
        for cut0 in &cuts0 {
            for cut1 in &cuts1 {
                if (cut0.sign | cut1.sign).count_ones() as usize > k {
                    continue;
                }
                let Some(mut cut) = merge_ordered(cut0, cut1, k) else {
                    continue;
                };
                merged += 1;
                if !info.cut_is_local(cut.leaves(), part) {
                    rejected += 1;
                    continue;
                }
                if !self.params.skip_cut_filter && set.filter_dominated(&cut) {
                    continue;
                }
                if self.params.compute_truth {
                    cut.truth = self.merged_truth(id, cut0, cut1, &cut);
                }
                cut.delay = self.cut_delay(id, &cut);
                cut.area = self.area_flow(id, &cut);
                set.insert_sorted(cut, sort, eps);
            }
        }
        self.cuts_merged += merged;
        if rejected > 0 {
            log::trace!(
                "node {} (partition {}): {} of {} cuts rejected as non-local, {} kept",
                id,
                part,
                rejected,
                merged,
                set.len()
            );
        }

        self.finish_node(id, set, mode, preprocess);
    }

    /// Replaces the cut set of `id` with its trivial cut, so fanouts can
    /// only use the node as a leaf. Does nothing if the set was never built.
    pub fn limit_cuts_to_trivial(&mut self, id: usize) {
        if !self.cut_sets.is_initialized(id) {
            return;
        }
        let obj = &mut self.objs[id];
        if obj.est_refs <= self.params.epsilon {
            obj.est_refs = obj.n_refs.max(1) as f32;
        }
        let mut trivial = Cut::trivial(id as u32);
        trivial.delay = self.objs[id].best.delay;
        trivial.area = self.lut_area(1);
        self.cut_sets.get_mut(id).set_single(trivial);
    }
}

#[cfg(test)]
mod tests {
    use crate::aig::NetworkBuilder;
    use crate::mapper::{CutStrategy, Mapper, MapperParams};
    use crate::propagate::{IdMap, PartitionInfo};
    use crate::test_utils::{random_network, setup_chain};
    use pretty_assertions::assert_eq;

    fn chain_mapper(params: MapperParams) -> (Mapper, crate::test_utils::Chain) {
        let t = setup_chain();
        // {const?, a, x1, b} | {x2, x3, c, d, o}
        let mut partition = vec![-1; t.network.id_bound()];
        for node in [t.a, t.side[0], t.b] {
            partition[node.id] = 0;
        }
        for node in [t.side[1], t.side[2], t.c, t.d, t.o] {
            partition[node.id] = 1;
        }
        let mapper = Mapper::from_network_partitioned(&t.network, params, &partition, 2);
        (mapper, t)
    }

    #[test]
    fn test_boundary_cut_is_rejected_and_input_cut_kept() {
        let (mut mapper, t) = chain_mapper(MapperParams::default());
        let id = |n| mapper.id_map().get(n).unwrap();
        let (a, b, c) = (id(t.a), id(t.b), id(t.c));
        mapper.map_node(b, 0, false, true);
        mapper.map_node(c, 0, false, true);
        let set = mapper.cut_set(c);
        assert!(set
            .cuts()
            .iter()
            .all(|cut| !cut.leaves().contains(&(a as u32))));
        assert!(set
            .cuts()
            .iter()
            .any(|cut| cut.leaves().contains(&(b as u32))));
        assert!(mapper.check_locality().is_empty());
    }

    #[test]
    fn test_all_cuts_rejected_leaves_self_cut() {
        let mut builder = NetworkBuilder::new("cross");
        let u = builder.add_input("u");
        let v = builder.add_input("v");
        let x = builder.add_and(u.into(), v.into());
        builder.add_output("o", x.into());
        let network = builder.build().unwrap();
        let id_map = IdMap::from_network(&network);
        let mut info = PartitionInfo::new(id_map.len(), 2);
        info.set_partition(id_map.get(u).unwrap(), 0);
        info.set_partition(id_map.get(v).unwrap(), 0);
        let x_id = id_map.get(x).unwrap();
        info.set_partition(x_id, 1);
        let mut mapper = Mapper::with_strategy(
            &network,
            MapperParams::default(),
            CutStrategy::PartitionAware(Box::new(info)),
        );
        mapper.map_node_partition_aware(x_id, 0, false, true);
        let set = mapper.cut_set(x_id);
        assert_eq!(set.len(), 1);
        assert!(set.cuts()[0].is_trivial_of(x_id as u32));
        assert_eq!(set.cuts()[0].delay, 1.0);
    }

    #[test]
    fn test_missing_fanin_set_falls_back_to_generic() {
        let (mut mapper, t) = chain_mapper(MapperParams::default());
        let c = mapper.id_map().get(t.c).unwrap();
        // b was never mapped, so its cut set is uninitialized.
        mapper.map_node(c, 0, false, true);
        assert!(!mapper.cut_set(c).is_empty());
        let stats_fallbacks = mapper.perform_mapping().generic_fallbacks;
        assert_eq!(stats_fallbacks, 1);
    }

    #[test]
    fn test_limit_cuts_to_trivial() {
        let (mut mapper, t) = chain_mapper(MapperParams::default());
        let b = mapper.id_map().get(t.b).unwrap();
        mapper.limit_cuts_to_trivial(b);
        assert!(!mapper.cut_set(b).is_initialized());
        mapper.map_node(b, 0, false, true);
        assert!(mapper.cut_set(b).len() > 1);
        mapper.limit_cuts_to_trivial(b);
        let set = mapper.cut_set(b);
        assert_eq!(set.len(), 1);
        assert!(set.cuts()[0].is_trivial_of(b as u32));
        assert_eq!(set.cuts()[0].area, 1.0);
        assert_eq!(set.cuts()[0].delay, 1.0);
    }

    #[test]
    fn test_sealed_outputs_are_boundaries() {
        let params = MapperParams {
            seal_partition_outputs: true,
            ..MapperParams::default()
        };
        let (mut mapper, t) = chain_mapper(params);
        let stats = mapper.perform_mapping();
        // Only `b` feeds another partition.
        assert_eq!(stats.sealed_outputs, 1);
        assert_eq!(stats.rounds.len(), 4);
        let b = mapper.id_map().get(t.b).unwrap();
        assert_eq!(mapper.cut_set(b).len(), 1);
        assert_eq!(stats.locality_violations, 0);
    }

    #[test]
    fn test_random_partitioned_mapping_is_local() {
        let _ = env_logger::builder().is_test(true).try_init();
        let n = random_network(11, 8, 150, 5);
        let partition: Vec<i32> = (0..n.id_bound()).map(|i| ((i / 20) % 3) as i32).collect();
        let mut mapper = Mapper::from_network_partitioned(&n, MapperParams::default(), &partition, 3);
        let stats = mapper.perform_mapping();
        assert!(stats.partitioned);
        assert_eq!(stats.locality_violations, 0);
        assert_eq!(stats.generic_fallbacks, 0);
        for id in 0..mapper.num_objs() {
            if mapper.obj(id).is_and() {
                assert!(!mapper.cut_set(id).is_empty(), "node {} has no cuts", id);
            }
        }
    }

    #[test]
    fn test_clear_partition_info_switches_to_generic() {
        let (mut mapper, _) = chain_mapper(MapperParams::default());
        assert!(mapper.partition_info().is_some());
        mapper.clear_partition_info();
        assert!(mapper.partition_info().is_none());
        let stats = mapper.perform_mapping();
        assert!(!stats.partitioned);
        assert_eq!(stats.lut_count, 1);
    }
}
