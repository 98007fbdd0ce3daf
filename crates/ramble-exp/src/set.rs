//! Experiment-set assembly.

use std::collections::BTreeSet;

use ramble_core::keywords::{COMMAND, EXPERIMENT_NAME};
use ramble_core::{ErrorInfo, ExperimentLookup, RambleError, VarValue, VariableEnv};
use ramble_expand::{ExpandOptions, ExpansionConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::chain::build_chain;
use crate::experiment::{Experiment, GenericFactory, ObjectFactory};
use crate::manifest::SetManifest;
use crate::namespace::{derive_identity_variables, ExperimentIdentity};
use crate::registry::{ExperimentRegistry, Registry};
use crate::render::{CrossProductRenderer, RenderSpec, RenderedBinding, Renderer};
use crate::scope::{Scope, ScopeLevel, ScopeStack};
use crate::topology::derive_topology;

/// Declaration of one (possibly multi-valued) experiment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSpec {
    /// Registered for chaining and lookups but never run on its own.
    #[serde(default)]
    pub template: bool,
    /// Numbered copies registered after each rendered experiment.
    #[serde(default)]
    pub n_repeats: usize,
    /// Experiment-level variables.
    #[serde(default)]
    pub variables: VariableEnv,
    /// Groups of vector variables crossed with one another.
    #[serde(default)]
    pub matrices: Vec<Vec<String>>,
    /// Predicates; an experiment for which any is `True` is dropped.
    #[serde(default)]
    pub exclude_where: Vec<String>,
    /// Raw chained-experiment declarations.
    #[serde(default)]
    pub chained_experiments: Vec<Value>,
}

fn config_error(code: &str, message: String) -> RambleError {
    RambleError::Config(ErrorInfo::new(code, message))
}

/// Every experiment of a workspace and the scopes they share.
pub struct ExperimentSet {
    scopes: ScopeStack,
    config: ExpansionConfig,
    renderer: Box<dyn Renderer>,
    factory: Box<dyn ObjectFactory>,
    registry: Registry,
}

impl ExperimentSet {
    /// Creates an empty set using the default renderer and factory.
    pub fn new(config: ExpansionConfig) -> Self {
        Self {
            scopes: ScopeStack::new(),
            factory: Box::new(GenericFactory::new(config.clone())),
            renderer: Box::new(CrossProductRenderer),
            config,
            registry: Registry::new(),
        }
    }

    /// Replaces the renderer.
    pub fn with_renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Replaces the experiment factory.
    pub fn with_factory(mut self, factory: Box<dyn ObjectFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Expansion settings shared by every experiment.
    pub fn config(&self) -> &ExpansionConfig {
        &self.config
    }

    /// Installs a set-wide scope. Application, workload and experiment
    /// scopes belong to individual declarations and are rejected here.
    pub fn set_scope(&mut self, scope: Scope) -> Result<(), RambleError> {
        match scope.level {
            ScopeLevel::Global | ScopeLevel::Base | ScopeLevel::Workspace | ScopeLevel::Required => {
                self.scopes.set(scope);
                Ok(())
            }
            level => Err(config_error(
                "config.scope",
                format!("'{}' scopes are given per experiment", level.as_str()),
            )),
        }
    }

    /// Set-wide scopes.
    pub fn scopes(&self) -> &ScopeStack {
        &self.scopes
    }

    /// Renders one declaration and registers every experiment it produces.
    ///
    /// Returns the registered namespaces. Nothing is registered when any
    /// experiment of the declaration fails.
    pub fn add_experiment(
        &mut self,
        application: &Scope,
        workload: &Scope,
        name: &str,
        spec: &ExperimentSpec,
    ) -> Result<Vec<String>, RambleError> {
        for (scope, expected) in [
            (application, ScopeLevel::Application),
            (workload, ScopeLevel::Workload),
        ] {
            if scope.level != expected {
                return Err(config_error(
                    "config.scope",
                    format!(
                        "expected a {} scope, got {}",
                        expected.as_str(),
                        scope.level.as_str()
                    ),
                ));
            }
        }
        let application_name = application.name.as_deref().ok_or_else(|| {
            config_error("config.scope", "application scope has no name".to_string())
        })?;

        let mut merged = self
            .scopes
            .clone()
            .with(application.clone())
            .with(workload.clone())
            .with(Scope::named(ScopeLevel::Experiment, name).with_variables(spec.variables.clone()))
            .merge();
        derive_identity_variables(&mut merged);

        let render_spec = RenderSpec {
            matrices: spec.matrices.clone(),
            n_repeats: spec.n_repeats,
        };
        let bindings = self.renderer.render(&merged, &render_spec)?;

        let mut pending: Vec<Experiment> = Vec::new();
        for binding in bindings {
            let n_repeats = binding.n_repeats;
            if let Some(experiment) = self.assemble(application_name, binding, spec)? {
                let repeats = repeat_copies(&experiment, n_repeats, &self.registry)?;
                pending.push(experiment);
                pending.extend(repeats);
            }
        }

        let mut seen = BTreeSet::new();
        for experiment in &pending {
            let namespace = experiment.namespace();
            if self.registry.contains(namespace) || !seen.insert(namespace) {
                return Err(RambleError::Registry(
                    ErrorInfo::new(
                        "registry.duplicate",
                        format!("experiment '{namespace}' is defined more than once"),
                    )
                    .with_context("namespace", namespace)
                    .with_hint("include a rendered variable in the experiment name"),
                ));
            }
        }

        let namespaces = pending
            .iter()
            .map(|experiment| experiment.namespace().to_string())
            .collect();
        for experiment in pending {
            self.registry.insert(experiment)?;
        }
        Ok(namespaces)
    }

    fn assemble(
        &self,
        application: &str,
        binding: RenderedBinding,
        spec: &ExperimentSpec,
    ) -> Result<Option<Experiment>, RambleError> {
        let mut experiment = self.factory.instantiate(application)?;
        *experiment.expander_mut().variables_mut() = binding.variables;

        let lookup: &dyn ExperimentLookup = &self.registry;
        let opts = ExpandOptions::default().with_lookup(lookup);
        // Names may reference derived topology values such as `n_nodes`.
        derive_topology(experiment.expander_mut(), &opts)?;
        let identity = ExperimentIdentity::resolve(experiment.expander())?;
        experiment.set_identity(identity);

        for predicate in &spec.exclude_where {
            if experiment.expander().evaluate_predicate(predicate, &opts)? {
                debug!(
                    experiment = experiment.namespace(),
                    predicate = predicate.as_str(),
                    "excluded experiment"
                );
                return Ok(None);
            }
        }

        experiment.set_template(spec.template);
        experiment.set_chain_declarations(spec.chained_experiments.clone());
        let command = experiment.variables().get(COMMAND).map(VarValue::to_template);
        if let Some(command) = command {
            experiment.resolve_command(&command, Some(lookup))?;
        }
        Ok(Some(experiment))
    }

    /// Builds the chain of every runnable primary experiment.
    pub fn build_chains(&mut self) -> Result<(), RambleError> {
        let roots: Vec<String> = self
            .registry
            .primaries()
            .filter(|experiment| !experiment.is_template() && !experiment.is_chain_built())
            .map(|experiment| experiment.namespace().to_string())
            .collect();
        for root in roots {
            build_chain(&mut self.registry, &root)?;
        }
        Ok(())
    }

    /// Looks up an experiment by namespace.
    pub fn get(&self, namespace: &str) -> Option<&Experiment> {
        self.registry.get(namespace)
    }

    /// Registry of every experiment in the set.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Experiments in registration order.
    pub fn experiments(&self) -> impl Iterator<Item = &Experiment> {
        self.registry.iter()
    }

    /// Builds the manifest of the current registry.
    pub fn manifest(&self) -> Result<SetManifest, RambleError> {
        SetManifest::from_registry(&self.registry)
    }
}

fn repeat_copies(
    base: &Experiment,
    n_repeats: usize,
    lookup: &dyn ExperimentLookup,
) -> Result<Vec<Experiment>, RambleError> {
    let command = base.variables().get(COMMAND).map(VarValue::to_template);
    (1..=n_repeats)
        .map(|index| {
            let mut copy = base.clone();
            let identity = base.identity();
            let name = format!("{}.{index}", identity.experiment);
            copy.set_variable(EXPERIMENT_NAME, name.clone());
            copy.set_identity(ExperimentIdentity::new(
                identity.application.clone(),
                identity.workload.clone(),
                name,
            ));
            copy.set_repeat_index(index);
            if let Some(command) = &command {
                copy.resolve_command(command, Some(lookup))?;
            }
            Ok(copy)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ramble_core::variable_env;

    fn scopes() -> (Scope, Scope) {
        (
            Scope::named(ScopeLevel::Application, "app"),
            Scope::named(ScopeLevel::Workload, "wl"),
        )
    }

    fn set() -> ExperimentSet {
        let mut set = ExperimentSet::new(ExpansionConfig::default());
        set.set_scope(Scope::new(ScopeLevel::Workspace).with_variable("workspace_root", "/ws"))
            .expect("workspace scope");
        set
    }

    #[test]
    fn rendered_names_are_expanded() {
        let (app, wl) = scopes();
        let mut set = set();
        let spec = ExperimentSpec {
            variables: variable_env([("n", VarValue::from(vec![1_i64, 2]))]),
            ..ExperimentSpec::default()
        };
        let names = set.add_experiment(&app, &wl, "run_{n}", &spec).expect("add");
        assert_eq!(names, ["app.wl.run_1", "app.wl.run_2"]);
    }

    #[test]
    fn per_experiment_scopes_are_rejected_set_wide() {
        let mut set = set();
        assert!(set.set_scope(Scope::named(ScopeLevel::Workload, "wl")).is_err());
    }

    #[test]
    fn failed_declarations_register_nothing() {
        let (app, wl) = scopes();
        let mut set = set();
        let spec = ExperimentSpec {
            variables: variable_env([("n_ranks", "lots")]),
            ..ExperimentSpec::default()
        };
        assert!(set.add_experiment(&app, &wl, "bad", &spec).is_err());
        assert!(set.registry().is_empty());
    }
}
