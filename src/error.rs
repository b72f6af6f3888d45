// SPDX-License-Identifier: Apache-2.0

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartmapError {
    /// The partitioning oracle could not be reached or reported a failure.
    Oracle(String),
    /// A CSR export violated its structural contract.
    MalformedCsr(String),
    /// The oracle answered with a vector that cannot be applied.
    InvalidPartition(String),
    /// An input file could not be parsed.
    Parse(String),
}

impl std::fmt::Display for PartmapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartmapError::Oracle(msg) => write!(f, "partition oracle error: {}", msg),
            PartmapError::MalformedCsr(msg) => write!(f, "malformed CSR hypergraph: {}", msg),
            PartmapError::InvalidPartition(msg) => write!(f, "invalid partition: {}", msg),
            PartmapError::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for PartmapError {}
