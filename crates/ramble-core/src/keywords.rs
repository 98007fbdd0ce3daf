//! Reserved variable names with engine-defined meaning.

/// Name of the application an experiment belongs to.
pub const APPLICATION_NAME: &str = "application_name";
/// Name of the workload an experiment belongs to.
pub const WORKLOAD_NAME: &str = "workload_name";
/// Name of the experiment itself.
pub const EXPERIMENT_NAME: &str = "experiment_name";
/// Name of the workspace, when one is set.
pub const WORKSPACE_NAME: &str = "workspace_name";

/// Root directory of the workspace on disk.
pub const WORKSPACE_ROOT: &str = "workspace_root";
/// Directory holding every experiment run directory.
pub const WORKSPACE_EXPERIMENTS_DIR: &str = "workspace_experiments_dir";
/// Directory holding staged inputs.
pub const WORKSPACE_INPUTS_DIR: &str = "workspace_inputs_dir";

/// Per-application run directory.
pub const APPLICATION_RUN_DIR: &str = "application_run_dir";
/// Per-workload run directory.
pub const WORKLOAD_RUN_DIR: &str = "workload_run_dir";
/// Per-experiment run directory.
pub const EXPERIMENT_RUN_DIR: &str = "experiment_run_dir";
/// Per-application input directory.
pub const APPLICATION_INPUT_DIR: &str = "application_input_dir";
/// Per-workload input directory.
pub const WORKLOAD_INPUT_DIR: &str = "workload_input_dir";

/// Dotted application namespace.
pub const APPLICATION_NAMESPACE: &str = "application_namespace";
/// Dotted workload namespace.
pub const WORKLOAD_NAMESPACE: &str = "workload_namespace";
/// Dotted experiment namespace.
pub const EXPERIMENT_NAMESPACE: &str = "experiment_namespace";

/// Default log file of an experiment.
pub const LOG_FILE: &str = "log_file";
/// Command an experiment runs.
pub const COMMAND: &str = "command";
/// Index of a repeated experiment instance.
pub const REPEAT_INDEX: &str = "repeat_index";

/// Total MPI ranks.
pub const N_RANKS: &str = "n_ranks";
/// Node count.
pub const N_NODES: &str = "n_nodes";
/// Ranks placed on each node.
pub const PROCESSES_PER_NODE: &str = "processes_per_node";
/// Threads per rank.
pub const N_THREADS: &str = "n_threads";

/// Directory component under a parent run dir holding chained experiments.
pub const CHAINED_EXPERIMENTS_DIR: &str = "chained_experiments";
