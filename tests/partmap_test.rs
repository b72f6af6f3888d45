// SPDX-License-Identifier: Apache-2.0

//! End-to-end checks of the partition-constrained mapping pass through the
//! public API.

use std::io::Write;

use g8r_partmap::aig::{load_aiger, NetworkBuilder};
use g8r_partmap::flow::{run_partitioned_mapping, FlowOptions};
use g8r_partmap::hypergraph::{build_hypergraph, HypergraphOptions};
use g8r_partmap::mapper::{CutStrategy, Mapper, MapperParams};
use g8r_partmap::oracle::{
    partition_hypergraph, OracleRequest, OracleResponse, PartitionFileOracle, PartitionOracle,
    PartitionParams,
};
use g8r_partmap::propagate::{propagate_partition, IdMap, PartitionInfo};
use g8r_partmap::test_utils::{random_network, setup_chain};
use g8r_partmap::PartmapError;
use maplit::btreeset;
use pretty_assertions::assert_eq;

const XOR_AAG: &str = "aag 5 2 0 2 3
2
4
10
6
6 2 4
8 3 5
10 7 9
i0 x
i1 y
o0 s
o1 c
";

struct UnreachableOracle;

impl PartitionOracle for UnreachableOracle {
    fn name(&self) -> &str {
        "unreachable"
    }

    fn partition(&mut self, _: &OracleRequest<'_>) -> Result<OracleResponse, PartmapError> {
        panic!("the oracle must not be consulted");
    }
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_chain_boundary_and_cut_locality() {
    init_logger();
    let t = setup_chain();
    let mut partition = vec![-1; t.network.id_bound()];
    for node in [t.a, t.side[0], t.b] {
        partition[node.id] = 0;
    }
    for node in [t.side[1], t.side[2], t.c, t.d, t.o] {
        partition[node.id] = 1;
    }
    let id_map = IdMap::from_network(&t.network);
    let info = propagate_partition(&t.network, &partition, 2, &id_map);
    let id = |n| id_map.get(n).unwrap();
    assert_eq!(info.inputs(1), &btreeset! {id(t.b)});
    assert_eq!(info.outputs(0), &btreeset! {id(t.b)});
    assert!(info.inputs(0).is_empty());

    let mut mapper = Mapper::with_strategy(
        &t.network,
        MapperParams::default(),
        CutStrategy::PartitionAware(Box::new(info)),
    );
    let stats = mapper.perform_mapping();
    assert_eq!(stats.locality_violations, 0);
    let (a, b) = (id(t.a) as u32, id(t.b) as u32);
    let c_cuts = mapper.cut_set(id(t.c)).cuts();
    assert!(c_cuts.iter().all(|cut| !cut.leaves().contains(&a)));
    assert!(c_cuts.iter().any(|cut| cut.leaves().contains(&b)));
    // b cannot be absorbed across the boundary.
    assert_eq!(stats.lut_count, 2);
}

#[test]
fn test_single_partition_skips_the_oracle() {
    init_logger();
    let n = random_network(21, 6, 40, 3);
    let hg = build_hypergraph(&n, &HypergraphOptions::default());
    let params = PartitionParams {
        num_partitions: 1,
        ..PartitionParams::default()
    };
    let result = partition_hypergraph(&hg, &params, &mut UnreachableOracle);
    assert!(result.success);
    assert_eq!(result.objective, 0);
    assert!(result.partition.iter().all(|p| *p == 0));

    let id_map = IdMap::from_network(&n);
    let info = propagate_partition(&n, &result.partition, 1, &id_map);
    assert!(info.inputs(0).is_empty());
    assert!(info.outputs(0).is_empty());
    assert_eq!(info.stats().interface_signals, 0);
}

#[test]
fn test_node_without_local_cuts_keeps_self_cut() {
    init_logger();
    let mut builder = NetworkBuilder::new("isolated");
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
    let cuts = mapper.cut_set(x_id).cuts();
    assert_eq!(cuts.len(), 1);
    assert_eq!(cuts[0].leaves(), &[x_id as u32]);

    // The flow and area rounds re-insert the previous best and must still
    // end with the node's own cut only.
    let stats = mapper.perform_mapping();
    assert_eq!(stats.rounds.len(), 4);
    assert_eq!(stats.locality_violations, 0);
    assert_eq!(stats.lut_count, 1);
    let cuts = mapper.cut_set(x_id).cuts();
    assert_eq!(cuts.len(), 1);
    assert_eq!(cuts[0].leaves(), &[x_id as u32]);
    assert!(mapper.obj(x_id).best.is_trivial_of(x_id as u32));
    let cover = mapper.lut_cover();
    assert_eq!(cover[0].inputs, vec![u, v]);
}

#[test]
fn test_aiger_flow_with_partition_file() {
    init_logger();
    let network = load_aiger(XOR_AAG, "xor").unwrap();
    // const, x, y, c, n | s | outputs s, c
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"0\n0\n0\n0\n0\n1\n1\n0\n").unwrap();
    let mut oracle = PartitionFileOracle::new(file.path());

    let (report, mapper) =
        run_partitioned_mapping(&network, &FlowOptions::default(), &mut oracle);
    assert!(report.partitioned);
    assert_eq!(report.partition.sizes, vec![6, 2]);
    let boundaries = report.boundaries.clone().unwrap();
    assert_eq!(boundaries.input_counts, vec![0, 2]);
    // s keeps its fanins as leaves, so c, n and s each need a LUT.
    assert_eq!(report.mapping.lut_count, 3);
    assert!(mapper.check_locality().is_empty());

    let mut generic = Mapper::from_network(&network, MapperParams::default());
    assert_eq!(generic.perform_mapping().lut_count, 2);
}
