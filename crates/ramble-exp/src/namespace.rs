//! Experiment identity and the derived directory/namespace variables.

use std::fmt::{self, Display};

use ramble_core::keywords::{
    APPLICATION_INPUT_DIR, APPLICATION_NAME, APPLICATION_NAMESPACE, APPLICATION_RUN_DIR,
    EXPERIMENT_NAME, EXPERIMENT_NAMESPACE, EXPERIMENT_RUN_DIR, LOG_FILE, WORKLOAD_INPUT_DIR,
    WORKLOAD_NAME, WORKLOAD_NAMESPACE, WORKLOAD_RUN_DIR, WORKSPACE_EXPERIMENTS_DIR,
    WORKSPACE_INPUTS_DIR, WORKSPACE_ROOT,
};
use ramble_core::{RambleError, VarValue, VariableEnv};
use ramble_expand::{ExpandOptions, Expander};
use serde::{Deserialize, Serialize};

/// Application, workload and experiment names of one experiment.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExperimentIdentity {
    /// Application name.
    pub application: String,
    /// Workload name.
    pub workload: String,
    /// Expanded experiment name.
    pub experiment: String,
}

impl ExperimentIdentity {
    /// Creates an identity from its three parts.
    pub fn new(
        application: impl Into<String>,
        workload: impl Into<String>,
        experiment: impl Into<String>,
    ) -> Self {
        Self {
            application: application.into(),
            workload: workload.into(),
            experiment: experiment.into(),
        }
    }

    /// Dotted `application.workload.experiment` key.
    pub fn namespace(&self) -> String {
        format!("{}.{}.{}", self.application, self.workload, self.experiment)
    }

    /// Expands the three name variables. Unresolved references are errors.
    pub fn resolve(expander: &Expander) -> Result<Self, RambleError> {
        let opts = ExpandOptions::strict();
        Ok(Self {
            application: expander.expand_var_name_with(APPLICATION_NAME, &opts)?,
            workload: expander.expand_var_name_with(WORKLOAD_NAME, &opts)?,
            experiment: expander.expand_var_name_with(EXPERIMENT_NAME, &opts)?,
        })
    }
}

impl Display for ExperimentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.namespace())
    }
}

fn reference(name: &str) -> String {
    format!("{{{name}}}")
}

/// Injects the directory and namespace variables, each defined in terms of
/// the others so later overrides flow through.
///
/// The workspace-level directories are only added when absent.
pub fn derive_identity_variables(env: &mut VariableEnv) {
    let workspace_defaults = [
        (WORKSPACE_EXPERIMENTS_DIR, format!("{}/experiments", reference(WORKSPACE_ROOT))),
        (WORKSPACE_INPUTS_DIR, format!("{}/inputs", reference(WORKSPACE_ROOT))),
    ];
    for (key, value) in workspace_defaults {
        env.entry(key.to_string()).or_insert(VarValue::Str(value));
    }

    let derived = [
        (APPLICATION_RUN_DIR, format!("{}/{}", reference(WORKSPACE_EXPERIMENTS_DIR), reference(APPLICATION_NAME))),
        (WORKLOAD_RUN_DIR, format!("{}/{}", reference(APPLICATION_RUN_DIR), reference(WORKLOAD_NAME))),
        (EXPERIMENT_RUN_DIR, format!("{}/{}", reference(WORKLOAD_RUN_DIR), reference(EXPERIMENT_NAME))),
        (APPLICATION_INPUT_DIR, format!("{}/{}", reference(WORKSPACE_INPUTS_DIR), reference(APPLICATION_NAME))),
        (WORKLOAD_INPUT_DIR, format!("{}/{}", reference(APPLICATION_INPUT_DIR), reference(WORKLOAD_NAME))),
        (APPLICATION_NAMESPACE, reference(APPLICATION_NAME)),
        (WORKLOAD_NAMESPACE, format!("{}.{}", reference(APPLICATION_NAMESPACE), reference(WORKLOAD_NAME))),
        (EXPERIMENT_NAMESPACE, format!("{}.{}", reference(WORKLOAD_NAMESPACE), reference(EXPERIMENT_NAME))),
        (LOG_FILE, format!("{}/{}.out", reference(EXPERIMENT_RUN_DIR), reference(EXPERIMENT_NAME))),
    ];
    for (key, value) in derived {
        env.insert(key.to_string(), VarValue::Str(value));
    }
}
