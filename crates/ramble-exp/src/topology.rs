//! MPI topology completion: `n_ranks`, `n_nodes`, `processes_per_node` and
//! `n_threads`.

use ramble_core::keywords::{N_NODES, N_RANKS, N_THREADS, PROCESSES_PER_NODE};
use ramble_core::{ErrorInfo, RambleError, VarValue};
use ramble_expand::{ExpandOptions, Expander};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Topology values after derivation. `None` means the value stayed unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    /// Total MPI ranks.
    pub n_ranks: Option<i64>,
    /// Node count.
    pub n_nodes: Option<i64>,
    /// Ranks per node.
    pub processes_per_node: Option<i64>,
    /// Threads per rank, `1` when unset.
    pub n_threads: i64,
}

fn config_error(variable: &str, message: String) -> RambleError {
    RambleError::Config(
        ErrorInfo::new("config.topology", message).with_context("variable", variable),
    )
}

fn read_int(
    expander: &Expander,
    variable: &str,
    opts: &ExpandOptions<'_>,
) -> Result<Option<i64>, RambleError> {
    if !expander.contains(variable) {
        return Ok(None);
    }
    let text = expander.expand_var_name_with(variable, opts)?;
    text.trim().parse::<i64>().map(Some).map_err(|_| {
        config_error(
            variable,
            format!("'{variable}' must expand to an integer, got '{text}'"),
        )
    })
}

fn ceil_div(numerator: i64, denominator: i64, variable: &str) -> Result<i64, RambleError> {
    if denominator <= 0 {
        return Err(config_error(
            variable,
            format!("'{variable}' must be positive, got {denominator}"),
        ));
    }
    let quotient = numerator.div_euclid(denominator);
    Ok(if numerator.rem_euclid(denominator) == 0 {
        quotient
    } else {
        quotient + 1
    })
}

/// Completes the topology variables of `expander` in place.
///
/// The first matching rule wins:
/// 1. ranks and processes per node known: nodes become `ceil(ranks / ppn)`
///    when absent; an explicit smaller node count only warns.
/// 2. ranks and nodes known: `processes_per_node = ceil(ranks / nodes)`.
/// 3. processes per node and nodes known: `n_ranks = ppn * nodes`.
/// 4. nothing known: `n_nodes = 1`.
///
/// `n_threads` defaults to 1 independently.
pub fn derive_topology(
    expander: &mut Expander,
    opts: &ExpandOptions<'_>,
) -> Result<Topology, RambleError> {
    let mut topology = Topology {
        n_ranks: read_int(expander, N_RANKS, opts)?,
        n_nodes: read_int(expander, N_NODES, opts)?,
        processes_per_node: read_int(expander, PROCESSES_PER_NODE, opts)?,
        n_threads: 1,
    };

    match (topology.n_ranks, topology.processes_per_node, topology.n_nodes) {
        (Some(ranks), Some(ppn), nodes) => {
            let required = ceil_div(ranks, ppn, PROCESSES_PER_NODE)?;
            match nodes {
                Some(nodes) if nodes < required => {
                    warn!(
                        n_nodes = nodes,
                        required,
                        n_ranks = ranks,
                        processes_per_node = ppn,
                        "n_nodes is smaller than n_ranks / processes_per_node"
                    );
                }
                Some(_) => {}
                None => {
                    expander.set_variable(N_NODES, required);
                    topology.n_nodes = Some(required);
                }
            }
        }
        (Some(ranks), None, Some(nodes)) => {
            let ppn = ceil_div(ranks, nodes, N_NODES)?;
            expander.set_variable(PROCESSES_PER_NODE, ppn);
            topology.processes_per_node = Some(ppn);
        }
        (None, Some(ppn), Some(nodes)) => {
            let ranks = ppn.checked_mul(nodes).ok_or_else(|| {
                config_error(N_RANKS, format!("{ppn} * {nodes} ranks overflows"))
            })?;
            expander.set_variable(N_RANKS, ranks);
            topology.n_ranks = Some(ranks);
        }
        (None, None, None) => {
            expander.set_variable(N_NODES, 1_i64);
            topology.n_nodes = Some(1);
        }
        _ => {}
    }

    match read_int(expander, N_THREADS, opts)? {
        Some(threads) => topology.n_threads = threads,
        None => expander.set_variable(N_THREADS, VarValue::Int(1)),
    }
    Ok(topology)
}
