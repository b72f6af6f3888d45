// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use g8r_partmap::aig::load_aiger;
use g8r_partmap::flow::{run_partitioned_mapping, FlowOptions};
use g8r_partmap::hypergraph::emit_hmetis::emit_hmetis;
use g8r_partmap::hypergraph::{build_hypergraph, HypergraphOptions};
use g8r_partmap::mapper::MapperParams;
use g8r_partmap::oracle::kahypar::KahyparOracle;
use g8r_partmap::oracle::partition_file::PartitionFileOracle;
use g8r_partmap::oracle::{PartitionOracle, PartitionParams, WeightMode};

/// Partitions an ASCII AIGER network and maps it to K-input LUTs whose cuts
/// never cross a partition boundary.
#[derive(Parser, Debug)]
struct Args {
    /// Number of partitions.
    #[arg(long, default_value_t = 2)]
    partitions: usize,

    /// Allowed imbalance between partition sizes.
    #[arg(long, default_value_t = 0.9)]
    imbalance: f64,

    /// Weight vertices and edges by timing criticality.
    #[arg(long, default_value_t = false)]
    #[arg(action = clap::ArgAction::Set)]
    timing_aware: bool,

    /// Pass the hypergraph weights to the partitioner.
    #[arg(long, default_value_t = false)]
    #[arg(action = clap::ArgAction::Set)]
    weighted: bool,

    /// Path to the KaHyPar shared library (defaults to $KAHYPAR_LIBRARY or
    /// the system library).
    #[arg(long)]
    kahypar_lib: Option<PathBuf>,

    /// KaHyPar configuration file replacing the built-in configuration.
    #[arg(long)]
    kahypar_config: Option<PathBuf>,

    /// Read the partition from this file (one id per vertex) instead of
    /// calling KaHyPar.
    #[arg(long)]
    partition_file: Option<PathBuf>,

    /// Write the hypergraph in hMetis format and exit.
    #[arg(long)]
    hmetis_out: Option<PathBuf>,

    /// Write the flow report as JSON.
    #[arg(long)]
    report_json: Option<PathBuf>,

    /// Maximum number of LUT inputs.
    #[arg(long, default_value_t = 6)]
    lut_size: usize,

    /// Maximum number of cuts kept per node.
    #[arg(long, default_value_t = 8)]
    cuts_max: usize,

    #[arg(long, default_value_t = 1)]
    flow_iters: usize,

    #[arg(long, default_value_t = 2)]
    area_iters: usize,

    /// Restrict partition outputs to their trivial cut once mapped.
    #[arg(long, default_value_t = false)]
    #[arg(action = clap::ArgAction::Set)]
    seal_outputs: bool,

    /// Print the LUT cover.
    #[arg(long, default_value_t = false)]
    #[arg(action = clap::ArgAction::Set)]
    emit_cover: bool,

    /// The path to the ASCII AIGER file.
    input: PathBuf,
}

fn make_oracle(args: &Args) -> Result<Box<dyn PartitionOracle>> {
    if let Some(path) = &args.partition_file {
        return Ok(Box::new(PartitionFileOracle::new(path)));
    }
    // One partition never reaches the oracle.
    if args.partitions <= 1 {
        return Ok(Box::new(KahyparOracle::deferred()));
    }
    let oracle = match &args.kahypar_lib {
        Some(path) => KahyparOracle::load(path),
        None => KahyparOracle::system(),
    }
    .context("loading the KaHyPar library")?;
    Ok(Box::new(oracle))
}

fn main() -> Result<()> {
    let _ = env_logger::builder().try_init();
    let args = Args::parse();

    let src = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let name = args
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "network".to_string());
    let network = match load_aiger(&src, &name) {
        Ok(network) => network,
        Err(e) => bail!("parsing {}: {}", args.input.display(), e),
    };

    let hypergraph_options = HypergraphOptions {
        timing_aware: args.timing_aware,
        ..HypergraphOptions::default()
    };

    if let Some(path) = &args.hmetis_out {
        let hypergraph = build_hypergraph(&network, &hypergraph_options);
        std::fs::write(path, emit_hmetis(&hypergraph, args.weighted))
            .with_context(|| format!("writing {}", path.display()))?;
        println!("{}", hypergraph.stats());
        return Ok(());
    }

    let config = match &args.kahypar_config {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?,
        ),
        None => None,
    };
    let weights = if args.weighted {
        WeightMode::Supplied
    } else {
        WeightMode::Omit
    };
    let options = FlowOptions {
        hypergraph: hypergraph_options,
        partition: PartitionParams {
            num_partitions: args.partitions,
            imbalance: args.imbalance,
            vertex_weights: weights,
            edge_weights: weights,
            config,
        },
        mapper: MapperParams {
            lut_size: args.lut_size,
            cuts_max: args.cuts_max,
            flow_iters: args.flow_iters,
            area_iters: args.area_iters,
            seal_partition_outputs: args.seal_outputs,
            ..MapperParams::default()
        },
    };

    let mut oracle = make_oracle(&args)?;
    let (report, mapper) = run_partitioned_mapping(&network, &options, oracle.as_mut());

    if args.emit_cover {
        for lut in mapper.lut_cover() {
            let inputs: Vec<String> = lut.inputs.iter().map(|i| i.id.to_string()).collect();
            println!("lut {} <- [{}]", lut.root.id, inputs.join(", "));
        }
    }
    println!(
        "{}: partitioned={} objective={} luts={} delay={:.1} area={:.1}",
        report.network,
        report.partitioned,
        report.partition.objective,
        report.mapping.lut_count,
        report.mapping.delay,
        report.mapping.area
    );

    if let Some(path) = &args.report_json {
        let json = serde_json::to_string_pretty(&report).context("serializing report")?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}
