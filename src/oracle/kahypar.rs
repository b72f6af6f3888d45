// SPDX-License-Identifier: Apache-2.0

//! `PartitionOracle` backed by the KaHyPar C library, loaded at run time.

use std::ffi::CString;
use std::io::Write;
use std::path::Path;

use libloading::{Library, Symbol};
use once_cell::sync::OnceCell;

use crate::error::PartmapError;
use crate::oracle::{OracleRequest, OracleResponse, PartitionOracle};

extern crate libc;
extern crate libloading;

/// Direct k-way, connectivity objective; the preset the partition-aware
/// mapper was tuned with.
pub const DEFAULT_KAHYPAR_CONFIG: &str = "# general
mode=direct
objective=km1
seed=-1
cmaxnet=1000
vcycles=0
# main -> preprocessing -> min hash sparsifier
p-use-sparsifier=true
p-sparsifier-min-median-he-size=28
p-sparsifier-max-hyperedge-size=1200
p-sparsifier-max-cluster-size=10
p-sparsifier-min-cluster-size=2
p-sparsifier-num-hash-func=5
p-sparsifier-combined-num-hash-func=100
# main -> preprocessing -> community detection
p-detect-communities=true
p-detect-communities-in-ip=true
p-reuse-communities=false
p-max-louvain-pass-iterations=100
p-min-eps-improvement=0.0001
p-louvain-edge-weight=hybrid
# main -> coarsening
c-type=ml_style
c-s=1
c-t=160
# main -> coarsening -> rating
c-rating-score=heavy_edge
c-rating-use-communities=true
c-rating-heavy_node_penalty=no_penalty
c-rating-acceptance-criterion=best_prefer_unmatched
c-fixed-vertex-acceptance-criterion=fixed_vertex_allowed
# main -> initial partitioning
i-mode=recursive
i-technique=multi
# initial partitioning -> coarsening
i-c-type=ml_style
i-c-s=1
i-c-t=150
# initial partitioning -> coarsening -> rating
i-c-rating-score=heavy_edge
i-c-rating-use-communities=true
i-c-rating-heavy_node_penalty=no_penalty
i-c-rating-acceptance-criterion=best_prefer_unmatched
i-c-fixed-vertex-acceptance-criterion=fixed_vertex_allowed
# initial partitioning -> initial partitioning
i-algo=pool
i-runs=20
# initial partitioning -> bin packing
i-bp-algorithm=worst_fit
i-bp-heuristic-prepacking=false
i-bp-early-restart=true
i-bp-late-restart=true
# initial partitioning -> local search
i-r-type=twoway_fm
i-r-runs=-1
i-r-fm-stop=simple
i-r-fm-stop-i=50
# main -> local search
r-type=kway_fm_hyperflow_cutter_km1
r-runs=-1
r-fm-stop=adaptive_opt
r-fm-stop-alpha=1
r-fm-stop-i=350
# local_search -> flow scheduling and heuristics
r-flow-execution-policy=exponential
# local_search -> hyperflowcutter configuration
r-hfc-size-constraint=mf-style
r-hfc-scaling=16
r-hfc-distance-based-piercing=true
r-hfc-mbc=true
";

/// Environment variable naming the KaHyPar shared object to load by default.
pub const KAHYPAR_LIBRARY_ENV: &str = "KAHYPAR_LIBRARY";

static DEFAULT_LIBRARY: OnceCell<Library> = OnceCell::new();

fn default_library_name() -> String {
    if let Ok(name) = std::env::var(KAHYPAR_LIBRARY_ENV) {
        return name;
    }
    let dso_extension = if cfg!(target_os = "macos") {
        "dylib"
    } else {
        "so"
    };
    format!("libkahypar.{}", dso_extension)
}

fn get_default_library() -> Result<&'static Library, PartmapError> {
    DEFAULT_LIBRARY.get_or_try_init(|| {
        let name = default_library_name();
        unsafe { Library::new(&name) }
            .map_err(|e| PartmapError::Oracle(format!("cannot load {}: {}", name, e)))
    })
}

#[repr(C)]
struct CKahyparContext {
    _private: [u8; 0], // Ensures the struct cannot be instantiated
}

#[repr(C)]
struct CKahyparHypergraph {
    _private: [u8; 0], // Ensures the struct cannot be instantiated
}

type KahyparContextNew = unsafe extern "C" fn() -> *mut CKahyparContext;
type KahyparContextFree = unsafe extern "C" fn(context: *mut CKahyparContext);
type KahyparConfigureContextFromFile = unsafe extern "C" fn(
    context: *mut CKahyparContext,
    ini_file_name: *const std::os::raw::c_char,
);
type KahyparCreateHypergraph = unsafe extern "C" fn(
    num_blocks: i32,
    num_vertices: u32,
    num_hyperedges: u32,
    hyperedge_indices: *const libc::size_t,
    hyperedges: *const u32,
    hyperedge_weights: *const i32,
    vertex_weights: *const i32,
) -> *mut CKahyparHypergraph;
type KahyparHypergraphFree = unsafe extern "C" fn(hypergraph: *mut CKahyparHypergraph);
type KahyparPartitionHypergraph = unsafe extern "C" fn(
    hypergraph: *mut CKahyparHypergraph,
    num_blocks: i32,
    epsilon: f64,
    objective: *mut i32,
    context: *mut CKahyparContext,
    partition: *mut i32,
);

fn get_symbol<'lib, T>(lib: &'lib Library, name: &str) -> Result<Symbol<'lib, T>, PartmapError> {
    unsafe { lib.get(name.as_bytes()) }.map_err(|e| {
        PartmapError::Oracle(format!("Failed to load symbol `{}`: {}", name, e))
    })
}

/// Owns a `kahypar_context_t` for the duration of one call.
struct Context {
    ptr: *mut CKahyparContext,
    free: KahyparContextFree,
}

impl Drop for Context {
    fn drop(&mut self) {
        unsafe { (self.free)(self.ptr) }
    }
}

/// Owns a `kahypar_hypergraph_t` for the duration of one call.
struct KahyparHypergraph {
    ptr: *mut CKahyparHypergraph,
    free: KahyparHypergraphFree,
}

impl Drop for KahyparHypergraph {
    fn drop(&mut self) {
        unsafe { (self.free)(self.ptr) }
    }
}

enum LibraryHandle {
    Shared(&'static Library),
    Owned(Library),
    /// The process-wide default library, loaded on first use.
    Deferred,
}

impl LibraryHandle {
    fn get(&self) -> Result<&Library, PartmapError> {
        match self {
            LibraryHandle::Shared(lib) => Ok(lib),
            LibraryHandle::Owned(lib) => Ok(lib),
            LibraryHandle::Deferred => get_default_library(),
        }
    }
}

pub struct KahyparOracle {
    library: LibraryHandle,
    description: String,
}

impl KahyparOracle {
    /// Uses the process-wide KaHyPar library named by `KAHYPAR_LIBRARY`, or
    /// the platform's `libkahypar` when unset.
    pub fn system() -> Result<Self, PartmapError> {
        let library = get_default_library()?;
        Ok(KahyparOracle {
            library: LibraryHandle::Shared(library),
            description: format!("kahypar ({})", default_library_name()),
        })
    }

    /// Like `system`, but the library is only loaded when a partition is
    /// actually requested, so single-partition runs work without it.
    pub fn deferred() -> Self {
        KahyparOracle {
            library: LibraryHandle::Deferred,
            description: format!("kahypar ({})", default_library_name()),
        }
    }

    /// Loads the KaHyPar library at `path`.
    pub fn load(path: &Path) -> Result<Self, PartmapError> {
        let library = unsafe { Library::new(path) }.map_err(|e| {
            PartmapError::Oracle(format!("cannot load {}: {}", path.display(), e))
        })?;
        Ok(KahyparOracle {
            library: LibraryHandle::Owned(library),
            description: format!("kahypar ({})", path.display()),
        })
    }
}

fn to_u32(value: usize, what: &str) -> Result<u32, PartmapError> {
    u32::try_from(value)
        .map_err(|_| PartmapError::Oracle(format!("{} {} exceeds the KaHyPar id range", what, value)))
}

impl PartitionOracle for KahyparOracle {
    fn name(&self) -> &str {
        &self.description
    }

    fn partition(&mut self, request: &OracleRequest<'_>) -> Result<OracleResponse, PartmapError> {
        let lib = self.library.get()?;
        let context_new: Symbol<KahyparContextNew> = get_symbol(lib, "kahypar_context_new")?;
        let context_free: Symbol<KahyparContextFree> = get_symbol(lib, "kahypar_context_free")?;
        let configure: Symbol<KahyparConfigureContextFromFile> =
            get_symbol(lib, "kahypar_configure_context_from_file")?;
        let create_hypergraph: Symbol<KahyparCreateHypergraph> =
            get_symbol(lib, "kahypar_create_hypergraph")?;
        let hypergraph_free: Symbol<KahyparHypergraphFree> =
            get_symbol(lib, "kahypar_hypergraph_free")?;
        let partition_hypergraph: Symbol<KahyparPartitionHypergraph> =
            get_symbol(lib, "kahypar_partition_hypergraph")?;

        let num_vertices = to_u32(request.num_vertices, "vertex count")?;
        let num_hyperedges = to_u32(request.num_hyperedges(), "hyperedge count")?;
        let num_blocks = i32::try_from(request.num_partitions).map_err(|_| {
            PartmapError::Oracle(format!("{} partitions requested", request.num_partitions))
        })?;

        // KaHyPar only reads its configuration from a file.
        let mut config_file = tempfile::Builder::new()
            .prefix("kahypar_config_")
            .suffix(".ini")
            .tempfile()
            .map_err(|e| PartmapError::Oracle(format!("cannot create config file: {}", e)))?;
        config_file
            .write_all(request.config.as_bytes())
            .and_then(|_| config_file.flush())
            .map_err(|e| PartmapError::Oracle(format!("cannot write config file: {}", e)))?;
        let config_path = CString::new(config_file.path().to_string_lossy().as_bytes())
            .map_err(|e| PartmapError::Oracle(format!("bad config path: {}", e)))?;

        let indices: Vec<libc::size_t> = request.offsets.to_vec();
        let mut partition: Vec<i32> = vec![-1; request.num_vertices];
        let mut objective: i32 = 0;

        unsafe {
            let context = Context {
                ptr: context_new(),
                free: *context_free,
            };
            if context.ptr.is_null() {
                return Err(PartmapError::Oracle(
                    "kahypar_context_new returned null".to_string(),
                ));
            }
            configure(context.ptr, config_path.as_ptr());

            let hypergraph = KahyparHypergraph {
                ptr: create_hypergraph(
                    num_blocks,
                    num_vertices,
                    num_hyperedges,
                    indices.as_ptr(),
                    request.pins.as_ptr(),
                    request
                        .edge_weights
                        .map_or(std::ptr::null(), |w| w.as_ptr()),
                    request
                        .vertex_weights
                        .map_or(std::ptr::null(), |w| w.as_ptr()),
                ),
                free: *hypergraph_free,
            };
            if hypergraph.ptr.is_null() {
                return Err(PartmapError::Oracle(
                    "kahypar_create_hypergraph returned null".to_string(),
                ));
            }

            partition_hypergraph(
                hypergraph.ptr,
                num_blocks,
                request.imbalance,
                &mut objective,
                context.ptr,
                partition.as_mut_ptr(),
            );
        }

        Ok(OracleResponse {
            partition,
            objective: objective as i64,
        })
    }
}
