//! Workspace configuration files.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use ramble_core::keywords::{WORKSPACE_NAME, WORKSPACE_ROOT};
use ramble_core::{ErrorInfo, RambleError, VariableEnv};
use ramble_expand::ExpansionConfig;
use serde::{Deserialize, Serialize};

use crate::scope::{Scope, ScopeLevel};
use crate::serde::from_yaml_str;
use crate::set::{ExperimentSet, ExperimentSpec};

fn default_workspace_name() -> String {
    "default".to_string()
}

/// Settings under `ramble.config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSettings {
    /// Workspace name, exposed as `workspace_name`.
    #[serde(default = "default_workspace_name")]
    pub name: String,
    /// Expansion settings shared by every experiment.
    #[serde(flatten)]
    pub expansion: ExpansionConfig,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            name: default_workspace_name(),
            expansion: ExpansionConfig::default(),
        }
    }
}

/// Experiments of one workload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    /// Workload-level variables.
    #[serde(default)]
    pub variables: VariableEnv,
    /// Experiment declarations keyed by name template.
    #[serde(default)]
    pub experiments: IndexMap<String, ExperimentSpec>,
}

/// Workloads of one application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSpec {
    /// Application-level variables.
    #[serde(default)]
    pub variables: VariableEnv,
    /// Workloads keyed by name.
    #[serde(default)]
    pub workloads: IndexMap<String, WorkloadSpec>,
}

/// Contents of the top-level `ramble` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Workspace settings.
    #[serde(default)]
    pub config: WorkspaceSettings,
    /// Workspace-level variables.
    #[serde(default)]
    pub variables: VariableEnv,
    /// Applications keyed by name.
    #[serde(default)]
    pub applications: IndexMap<String, ApplicationSpec>,
}

/// Parsed workspace file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    /// Contents of the top-level `ramble:` key.
    pub ramble: WorkspaceConfig,
}

impl Workspace {
    /// Parses a workspace from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, RambleError> {
        from_yaml_str(text)
    }

    /// Reads and parses a workspace file.
    pub fn load(path: &Path) -> Result<Self, RambleError> {
        let text = fs::read_to_string(path).map_err(|err| {
            RambleError::Config(
                ErrorInfo::new("config.read", "failed to read workspace file")
                    .with_context("path", path.display().to_string())
                    .with_hint(err.to_string()),
            )
        })?;
        Self::from_yaml_str(&text)
    }

    /// Assembles every declared experiment and builds their chains.
    ///
    /// `required` is the highest-precedence scope, typically command-line
    /// overrides.
    pub fn assemble(&self, root: &str, required: VariableEnv) -> Result<ExperimentSet, RambleError> {
        let config = &self.ramble;
        let mut set = ExperimentSet::new(config.config.expansion.clone());
        set.set_scope(
            Scope::new(ScopeLevel::Base)
                .with_variable(WORKSPACE_ROOT, root)
                .with_variable(WORKSPACE_NAME, config.config.name.as_str()),
        )?;
        set.set_scope(Scope::new(ScopeLevel::Workspace).with_variables(config.variables.clone()))?;
        set.set_scope(Scope::new(ScopeLevel::Required).with_variables(required))?;

        for (app_name, application) in &config.applications {
            let app_scope = Scope::named(ScopeLevel::Application, app_name.as_str())
                .with_variables(application.variables.clone());
            for (workload_name, workload) in &application.workloads {
                let workload_scope = Scope::named(ScopeLevel::Workload, workload_name.as_str())
                    .with_variables(workload.variables.clone());
                for (experiment_name, spec) in &workload.experiments {
                    set.add_experiment(&app_scope, &workload_scope, experiment_name, spec)?;
                }
            }
        }
        set.build_chains()?;
        Ok(set)
    }
}
