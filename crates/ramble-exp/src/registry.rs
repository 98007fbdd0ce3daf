use globset::Glob;
use indexmap::IndexMap;
use ramble_core::{ErrorInfo, ExperimentLookup, RambleError};
use ramble_expand::ExpandOptions;

use crate::experiment::Experiment;

/// Storage of every experiment in a set, keyed by namespace.
pub trait ExperimentRegistry {
    /// Experiment registered under `namespace`.
    fn get(&self, namespace: &str) -> Option<&Experiment>;

    /// True when `namespace` is registered.
    fn contains(&self, namespace: &str) -> bool {
        self.get(namespace).is_some()
    }

    /// Namespaces of primary (non-chained) experiments matching `pattern`,
    /// in registration order.
    fn matching(&self, pattern: &str) -> Result<Vec<String>, RambleError>;

    /// Adds an experiment. A namespace can only be registered once.
    fn insert(&mut self, experiment: Experiment) -> Result<(), RambleError>;
}

/// In-memory registry preserving registration order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    experiments: IndexMap<String, Experiment>,
}

fn registry_error(code: &str, message: String) -> RambleError {
    RambleError::Registry(ErrorInfo::new(code, message))
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered experiments, chained copies included.
    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// Mutable access to one experiment.
    pub fn get_mut(&mut self, namespace: &str) -> Option<&mut Experiment> {
        self.experiments.get_mut(namespace)
    }

    /// Experiments in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Experiment> {
        self.experiments.values()
    }

    /// Namespaces in registration order.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.experiments.keys().map(String::as_str)
    }

    /// Primary experiments in registration order.
    pub fn primaries(&self) -> impl Iterator<Item = &Experiment> {
        self.iter().filter(|experiment| !experiment.is_chained())
    }
}

impl ExperimentRegistry for Registry {
    fn get(&self, namespace: &str) -> Option<&Experiment> {
        self.experiments.get(namespace)
    }

    fn matching(&self, pattern: &str) -> Result<Vec<String>, RambleError> {
        let matcher = Glob::new(pattern)
            .map_err(|err| {
                RambleError::Registry(
                    ErrorInfo::new("registry.pattern", err.to_string())
                        .with_context("pattern", pattern),
                )
            })?
            .compile_matcher();
        Ok(self
            .primaries()
            .filter(|experiment| matcher.is_match(experiment.namespace()))
            .map(|experiment| experiment.namespace().to_string())
            .collect())
    }

    fn insert(&mut self, experiment: Experiment) -> Result<(), RambleError> {
        let namespace = experiment.namespace().to_string();
        if self.experiments.contains_key(&namespace) {
            return Err(RambleError::Registry(
                ErrorInfo::new(
                    "registry.duplicate",
                    format!("experiment '{namespace}' is already defined"),
                )
                .with_context("namespace", namespace)
                .with_hint("experiment names must be unique within a workload"),
            ));
        }
        if namespace.is_empty() {
            return Err(registry_error(
                "registry.unnamed",
                "experiment has no namespace".to_string(),
            ));
        }
        self.experiments.insert(namespace, experiment);
        Ok(())
    }
}

impl ExperimentLookup for Registry {
    fn variable_in(
        &self,
        namespace: &str,
        variable: &str,
        depth: usize,
    ) -> Result<Option<String>, RambleError> {
        let Some(experiment) = self.experiments.get(namespace) else {
            return Ok(None);
        };
        if !experiment.expander().contains(variable) {
            return Err(RambleError::Lookup(
                ErrorInfo::new(
                    "lookup.unknown_variable",
                    format!("experiment '{namespace}' does not define '{variable}'"),
                )
                .with_context("variable", variable)
                .with_context("namespace", namespace),
            ));
        }
        let opts = ExpandOptions::default()
            .with_lookup(self)
            .at_depth(depth + 1);
        experiment
            .expander()
            .expand_var_name_with(variable, &opts)
            .map(Some)
    }
}
