// SPDX-License-Identifier: Apache-2.0

//! `PartitionOracle` that reads a partition computed out of process.
//!
//! The expected format is the one hMetis and KaHyPar write for a hypergraph
//! exported with `emit_hmetis`: one partition id per line, one line per
//! vertex. Since such a file carries no objective, the connectivity objective
//! is recomputed from the request.

use std::path::{Path, PathBuf};

use crate::error::PartmapError;
use crate::oracle::{km1_objective, OracleRequest, OracleResponse, PartitionOracle};

pub struct PartitionFileOracle {
    path: PathBuf,
    description: String,
}

impl PartitionFileOracle {
    pub fn new(path: &Path) -> Self {
        PartitionFileOracle {
            path: path.to_path_buf(),
            description: format!("partition file {}", path.display()),
        }
    }
}

/// Parses one partition id per non-empty line.
pub fn parse_partition_file(text: &str) -> Result<Vec<i32>, String> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(lineno, line)| {
            line.trim().parse::<i32>().map_err(|e| {
                format!(
                    "line {}: invalid partition id '{}': {}",
                    lineno + 1,
                    line.trim(),
                    e
                )
            })
        })
        .collect()
}

impl PartitionOracle for PartitionFileOracle {
    fn name(&self) -> &str {
        &self.description
    }

    fn partition(&mut self, request: &OracleRequest<'_>) -> Result<OracleResponse, PartmapError> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| {
            PartmapError::Oracle(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let partition = parse_partition_file(&text).map_err(PartmapError::Parse)?;
        let objective = if partition.len() == request.num_vertices {
            km1_objective(request.pins, request.offsets, request.edge_weights, &partition)
        } else {
            // Length mismatches are reported by the caller's validation.
            0
        };
        Ok(OracleResponse {
            partition,
            objective,
        })
    }
}
