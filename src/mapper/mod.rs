// SPDX-License-Identifier: Apache-2.0

//! Priority-cut LUT mapper.
//!
//! The mapper works on its own dense copy of the network (`MapObj`s indexed
//! by mapper id, see `IdMap`). Each round visits the AND nodes in
//! topological order, recomputes a bounded, priority-ordered set of
//! K-feasible cuts per node and picks a best cut; the first round optimizes
//! delay, later rounds recover area via area flow and then exact local area.
//!
//! How a node's cuts are computed is fixed when the mapper is built
//! (`CutStrategy`): either the generic routine or the partition-aware one,
//! which only keeps cuts that stay inside the node's partition.

pub mod cut;
mod engine;
pub mod partition_cuts;
pub mod truth;

use serde::Serialize;

use crate::aig::{Network, NodeKind, NodeRef};
use crate::propagate::{propagate_partition, IdMap, PartitionInfo};

pub use crate::mapper::cut::{Cut, CutArena, CutSet, SortMode, MAX_CUT_LEAVES};
pub use crate::mapper::truth::TruthTable64;

/// Where a node is in the per-round mapping cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeMapState {
    Uninitialized,
    CutsGenerated,
    BestSelected,
    /// The best cut is counted toward the global area.
    Referenced,
    /// The best cut was temporarily removed from the global area while the
    /// node is re-optimized.
    Dereferenced,
}

impl NodeMapState {
    pub fn can_advance_to(self, next: NodeMapState) -> bool {
        use NodeMapState::*;
        matches!(
            (self, next),
            (Uninitialized, CutsGenerated)
                | (CutsGenerated, BestSelected)
                | (BestSelected, Referenced)
                | (BestSelected, CutsGenerated)
                | (Referenced, Dereferenced)
                | (Referenced, CutsGenerated)
                | (Dereferenced, CutsGenerated)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapObjKind {
    Const,
    Ci,
    And {
        fanin0: usize,
        fanin1: usize,
        compl0: bool,
        compl1: bool,
    },
    Co {
        fanin0: usize,
        compl0: bool,
    },
}

#[derive(Debug, Clone)]
pub struct MapObj {
    pub kind: MapObjKind,
    pub level: usize,
    /// Partition id, `-1` when unassigned.
    pub partition: i32,
    /// Number of references from the current mapping (structural fanout
    /// count before the first round).
    pub n_refs: i32,
    pub est_refs: f32,
    pub required: f32,
    pub best: Cut,
    pub state: NodeMapState,
}

impl MapObj {
    pub fn is_const(&self) -> bool {
        matches!(self.kind, MapObjKind::Const)
    }

    pub fn is_ci(&self) -> bool {
        matches!(self.kind, MapObjKind::Ci)
    }

    pub fn is_and(&self) -> bool {
        matches!(self.kind, MapObjKind::And { .. })
    }

    pub fn is_co(&self) -> bool {
        matches!(self.kind, MapObjKind::Co { .. })
    }
}

#[derive(Debug, Clone)]
pub struct MapperParams {
    /// Maximum number of LUT inputs (K).
    pub lut_size: usize,
    /// Ranked cuts kept per node.
    pub cuts_max: usize,
    pub flow_iters: usize,
    pub area_iters: usize,
    /// Adds a delay round that only accepts best cuts meeting the required
    /// times of the first round.
    pub preprocess: bool,
    /// Compute cut truth tables (K <= 6 only).
    pub compute_truth: bool,
    pub skip_cut_filter: bool,
    pub epsilon: f32,
    /// Required time at the outputs; the achieved delay when `None` or
    /// smaller.
    pub delay_target: Option<f32>,
    /// After mapping a partition output, restrict its cut set to its trivial
    /// cut so fanouts in other partitions see it as a boundary pass-through.
    pub seal_partition_outputs: bool,
}

impl Default for MapperParams {
    fn default() -> Self {
        MapperParams {
            lut_size: 6,
            cuts_max: 8,
            flow_iters: 1,
            area_iters: 2,
            preprocess: false,
            compute_truth: false,
            skip_cut_filter: false,
            epsilon: 0.005,
            delay_target: None,
            seal_partition_outputs: false,
        }
    }
}

pub enum CutStrategy {
    Generic,
    PartitionAware(Box<PartitionInfo>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundStats {
    pub name: String,
    pub mode: u8,
    pub delay: f32,
    pub area: f32,
    pub lut_count: usize,
    pub cuts_merged: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingStats {
    pub rounds: Vec<RoundStats>,
    pub delay: f32,
    pub area: f32,
    pub lut_count: usize,
    pub partitioned: bool,
    pub locality_violations: usize,
    pub generic_fallbacks: usize,
    /// Partition outputs restricted to their trivial cut.
    pub sealed_outputs: usize,
}

/// One LUT of the final cover, in network ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lut {
    pub root: NodeRef,
    pub inputs: Vec<NodeRef>,
    pub truth: Option<TruthTable64>,
}

pub struct Mapper {
    params: MapperParams,
    objs: Vec<MapObj>,
    id_map: IdMap,
    cut_sets: CutArena,
    strategy: CutStrategy,
    /// AND nodes in topological order.
    and_order: Vec<usize>,
    cos: Vec<usize>,
    cuts_merged: usize,
    generic_fallbacks: usize,
    sealed_outputs: usize,
}

impl Mapper {
    /// Builds a mapper using the generic cut routine.
    pub fn from_network(network: &Network, params: MapperParams) -> Self {
        Self::with_strategy(network, params, CutStrategy::Generic)
    }

    /// Builds a mapper whose cuts respect `partition`, a partition vector
    /// indexed by network id.
    pub fn from_network_partitioned(
        network: &Network,
        params: MapperParams,
        partition: &[i32],
        num_partitions: usize,
    ) -> Self {
        let id_map = IdMap::from_network(network);
        let info = propagate_partition(network, partition, num_partitions, &id_map);
        Self::build(
            network,
            params,
            id_map,
            CutStrategy::PartitionAware(Box::new(info)),
        )
    }

    /// Builds a mapper with an explicit strategy; partition info must be in
    /// the mapper id space of `IdMap::from_network(network)`.
    pub fn with_strategy(network: &Network, params: MapperParams, strategy: CutStrategy) -> Self {
        let id_map = IdMap::from_network(network);
        Self::build(network, params, id_map, strategy)
    }

    fn build(network: &Network, mut params: MapperParams, id_map: IdMap, strategy: CutStrategy) -> Self {
        assert!(
            (2..=MAX_CUT_LEAVES).contains(&params.lut_size),
            "lut_size must be in [2, {}], got {}",
            MAX_CUT_LEAVES,
            params.lut_size
        );
        assert!(params.cuts_max >= 1, "cuts_max must be positive");
        if params.compute_truth && params.lut_size > truth::MAX_TRUTH_VARS {
            log::warn!(
                "truth tables are limited to {} inputs; disabling them for K={}",
                truth::MAX_TRUTH_VARS,
                params.lut_size
            );
            params.compute_truth = false;
        }

        let mapper_id = |node_ref: NodeRef| id_map.get(node_ref).expect("every node is mapped");
        let mut objs: Vec<MapObj> = Vec::with_capacity(id_map.len());
        let mut and_order = Vec::new();
        let mut cos = Vec::new();
        for id in 0..id_map.len() {
            let node_ref = id_map.network_ref(id);
            let node = network.get(node_ref);
            let kind = match &node.kind {
                NodeKind::Const => MapObjKind::Const,
                NodeKind::Ci { .. } => MapObjKind::Ci,
                NodeKind::And2 { a, b } => {
                    and_order.push(id);
                    MapObjKind::And {
                        fanin0: mapper_id(a.node),
                        fanin1: mapper_id(b.node),
                        compl0: a.negated,
                        compl1: b.negated,
                    }
                }
                NodeKind::Co { driver, .. } => {
                    cos.push(id);
                    MapObjKind::Co {
                        fanin0: mapper_id(driver.node),
                        compl0: driver.negated,
                    }
                }
            };
            let n_refs = node.fanouts.len() as i32;
            let is_source = matches!(kind, MapObjKind::Const | MapObjKind::Ci);
            objs.push(MapObj {
                kind,
                level: node.level,
                partition: -1,
                n_refs,
                est_refs: n_refs as f32,
                required: f32::INFINITY,
                best: if is_source {
                    Cut::trivial(id as u32)
                } else {
                    Cut::default()
                },
                state: if is_source {
                    NodeMapState::BestSelected
                } else {
                    NodeMapState::Uninitialized
                },
            });
        }

        let mut cut_sets = CutArena::new(objs.len(), params.cuts_max);
        for (id, obj) in objs.iter().enumerate() {
            if obj.is_const() || obj.is_ci() {
                cut_sets.get_mut(id).set_single(obj.best);
            }
        }

        if let CutStrategy::PartitionAware(info) = &strategy {
            for (id, obj) in objs.iter_mut().enumerate() {
                obj.partition = info.partition_of(id);
            }
        }

        log::debug!(
            "Mapper: {} objects, {} ands, {} outputs, K={}, C={}, partitioned={}",
            objs.len(),
            and_order.len(),
            cos.len(),
            params.lut_size,
            params.cuts_max,
            matches!(strategy, CutStrategy::PartitionAware(_))
        );

        Mapper {
            params,
            objs,
            id_map,
            cut_sets,
            strategy,
            and_order,
            cos,
            cuts_merged: 0,
            generic_fallbacks: 0,
            sealed_outputs: 0,
        }
    }

    pub fn params(&self) -> &MapperParams {
        &self.params
    }

    pub fn id_map(&self) -> &IdMap {
        &self.id_map
    }

    pub fn obj(&self, id: usize) -> &MapObj {
        &self.objs[id]
    }

    pub fn num_objs(&self) -> usize {
        self.objs.len()
    }

    pub fn cut_set(&self, id: usize) -> &CutSet {
        self.cut_sets.get(id)
    }

    /// Drops the stored cut set of `id`; fanouts mapped afterwards find it
    /// uninitialized.
    pub fn release_cut_set(&mut self, id: usize) {
        self.cut_sets.get_mut(id).release();
    }

    pub fn strategy(&self) -> &CutStrategy {
        &self.strategy
    }

    pub fn partition_info(&self) -> Option<&PartitionInfo> {
        match &self.strategy {
            CutStrategy::PartitionAware(info) => Some(info),
            CutStrategy::Generic => None,
        }
    }

    /// Releases the partition data; later rounds use the generic routine.
    pub fn clear_partition_info(&mut self) {
        if matches!(self.strategy, CutStrategy::Generic) {
            return;
        }
        self.strategy = CutStrategy::Generic;
        for obj in &mut self.objs {
            obj.partition = -1;
        }
        log::debug!("Mapper: partition info released");
    }

    pub(crate) fn advance_state(&mut self, id: usize, next: NodeMapState) {
        let current = self.objs[id].state;
        debug_assert!(
            current.can_advance_to(next),
            "node {}: illegal map state transition {:?} -> {:?}",
            id,
            current,
            next
        );
        self.objs[id].state = next;
    }

    /// Computes cuts and selects the best cut of AND node `id` with the
    /// strategy chosen at construction.
    pub fn map_node(&mut self, id: usize, mode: u8, preprocess: bool, first: bool) {
        match self.strategy {
            CutStrategy::Generic => self.map_node_generic(id, mode, preprocess, first),
            CutStrategy::PartitionAware(_) => {
                self.map_node_partition_aware(id, mode, preprocess, first)
            }
        }
    }

    fn mapping_round(&mut self, name: &str, mode: u8, preprocess: bool, first: bool) -> RoundStats {
        let start = std::time::Instant::now();
        let merged_before = self.cuts_merged;
        let mut sealed = 0;
        for i in 0..self.and_order.len() {
            let id = self.and_order[i];
            self.map_node(id, mode, preprocess, first);
            if self.params.seal_partition_outputs
                && self
                    .partition_info()
                    .is_some_and(|info| info.is_partition_output(id))
            {
                self.limit_cuts_to_trivial(id);
                sealed += 1;
            }
        }
        // Every round seals the same nodes; keep the per-round count.
        self.sealed_outputs = sealed;
        let (delay, area, lut_count) = self.mark_mapping();
        self.compute_required(delay);
        let stats = RoundStats {
            name: name.to_string(),
            mode,
            delay,
            area,
            lut_count,
            cuts_merged: self.cuts_merged - merged_before,
        };
        log::debug!(
            "{:<8}: delay = {:.2} area = {:.2} luts = {} cuts = {} ({:?})",
            stats.name,
            stats.delay,
            stats.area,
            stats.lut_count,
            stats.cuts_merged,
            start.elapsed()
        );
        stats
    }

    /// Runs all mapping rounds and returns the final statistics.
    pub fn perform_mapping(&mut self) -> MappingStats {
        let mut rounds = Vec::new();
        rounds.push(self.mapping_round("delay", 0, false, true));
        if self.params.preprocess {
            rounds.push(self.mapping_round("delay-pp", 0, true, false));
        }
        for _ in 0..self.params.flow_iters {
            rounds.push(self.mapping_round("flow", 1, false, false));
        }
        for _ in 0..self.params.area_iters {
            rounds.push(self.mapping_round("area", 2, false, false));
        }
        let last = rounds.last().expect("at least one round").clone();
        let locality_violations = self.check_locality().len();
        if locality_violations > 0 {
            log::warn!(
                "perform_mapping: {} nodes select cuts that leave their partition",
                locality_violations
            );
        }
        let stats = MappingStats {
            rounds,
            delay: last.delay,
            area: last.area,
            lut_count: last.lut_count,
            partitioned: matches!(self.strategy, CutStrategy::PartitionAware(_)),
            locality_violations,
            generic_fallbacks: self.generic_fallbacks,
            sealed_outputs: self.sealed_outputs,
        };
        log::info!(
            "perform_mapping: delay = {:.2} luts = {} area = {:.2} (partitioned={})",
            stats.delay,
            stats.lut_count,
            stats.area,
            stats.partitioned
        );
        stats
    }

    /// Recounts the references of the current mapping from the outputs and
    /// returns `(delay, area, lut_count)`.
    fn mark_mapping(&mut self) -> (f32, f32, usize) {
        for obj in &mut self.objs {
            obj.n_refs = 0;
        }
        let mut area = 0.0;
        let mut lut_count = 0;
        let mut delay: f32 = 0.0;
        let mut stack: Vec<usize> = Vec::new();
        for i in 0..self.cos.len() {
            let MapObjKind::Co { fanin0, .. } = self.objs[self.cos[i]].kind else {
                unreachable!("cos only lists outputs");
            };
            delay = delay.max(self.objs[fanin0].best.delay);
            stack.push(fanin0);
        }
        while let Some(id) = stack.pop() {
            let obj = &mut self.objs[id];
            obj.n_refs += 1;
            if obj.n_refs > 1 || !obj.is_and() {
                continue;
            }
            let cut = self.implementation_cut(id, &self.objs[id].best);
            lut_count += 1;
            area += self.lut_area(cut.len());
            stack.extend(cut.leaves().iter().map(|leaf| *leaf as usize));
        }
        for obj in &mut self.objs {
            if obj.is_and() && obj.state != NodeMapState::Uninitialized {
                obj.state = if obj.n_refs > 0 {
                    NodeMapState::Referenced
                } else {
                    NodeMapState::BestSelected
                };
            }
        }
        (delay, area, lut_count)
    }

    /// Propagates required times backward through the current mapping.
    fn compute_required(&mut self, delay: f32) {
        let target = self.params.delay_target.map_or(delay, |t| t.max(delay));
        for obj in &mut self.objs {
            obj.required = f32::INFINITY;
        }
        for i in 0..self.cos.len() {
            let MapObjKind::Co { fanin0, .. } = self.objs[self.cos[i]].kind else {
                unreachable!("cos only lists outputs");
            };
            let driver = &mut self.objs[fanin0];
            driver.required = driver.required.min(target);
        }
        for i in (0..self.and_order.len()).rev() {
            let id = self.and_order[i];
            if self.objs[id].n_refs == 0 {
                continue;
            }
            let required = self.objs[id].required - 1.0;
            let cut = self.implementation_cut(id, &self.objs[id].best);
            for leaf in cut.leaves() {
                let leaf = &mut self.objs[*leaf as usize];
                leaf.required = leaf.required.min(required);
            }
        }
    }

    /// Returns the nodes whose best cut uses a leaf outside the node's
    /// partition that is not a recorded input of it.
    pub fn check_locality(&self) -> Vec<usize> {
        let Some(info) = self.partition_info() else {
            return Vec::new();
        };
        self.and_order
            .iter()
            .copied()
            .filter(|id| {
                let obj = &self.objs[*id];
                obj.state != NodeMapState::Uninitialized
                    && !info.cut_is_local(obj.best.leaves(), obj.partition)
            })
            .collect()
    }

    /// The LUTs of the current mapping, in mapper topological order.
    pub fn lut_cover(&self) -> Vec<Lut> {
        self.and_order
            .iter()
            .copied()
            .filter(|id| self.objs[*id].n_refs > 0)
            .map(|id| {
                let best = &self.objs[id].best;
                let cut = self.implementation_cut(id, best);
                let truth = if !self.params.compute_truth {
                    None
                } else if best.is_trivial_of(id as u32) {
                    self.fanin_function_truth(id)
                } else {
                    best.truth
                };
                Lut {
                    root: self.id_map.network_ref(id),
                    inputs: cut
                        .leaves()
                        .iter()
                        .map(|leaf| self.id_map.network_ref(*leaf as usize))
                        .collect(),
                    truth,
                }
            })
            .collect()
    }

    /// The cover's primary output drivers, as `(output, driver, negated)` in
    /// network ids.
    pub fn output_drivers(&self) -> Vec<(NodeRef, NodeRef, bool)> {
        self.cos
            .iter()
            .map(|co| {
                let MapObjKind::Co { fanin0, compl0 } = self.objs[*co].kind else {
                    unreachable!("cos only lists outputs");
                };
                (
                    self.id_map.network_ref(*co),
                    self.id_map.network_ref(fanin0),
                    compl0,
                )
            })
            .collect()
    }
}
