//! Experiment instances and the factory that creates them.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use ramble_core::keywords::{COMMAND, EXPERIMENT_RUN_DIR, LOG_FILE, REPEAT_INDEX};
use ramble_core::{ExperimentLookup, RambleError, VarValue, VariableEnv};
use ramble_expand::{ExpandOptions, Expander, ExpansionConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::namespace::ExperimentIdentity;

/// Execution order of one chain group.
///
/// The primary experiment and every chained instance of its group hold the
/// same handle, so later changes are seen by all members.
pub type ChainOrder = Rc<RefCell<Vec<String>>>;

/// One concrete experiment: identity, variables and chain bookkeeping.
#[derive(Debug, Clone)]
pub struct Experiment {
    application: String,
    identity: ExperimentIdentity,
    namespace: String,
    expander: Expander,
    chain_declarations: Vec<Value>,
    chain_order: ChainOrder,
    chained: bool,
    template: bool,
    repeat_index: Option<usize>,
    chain_built: bool,
    command: Option<String>,
}

/// Which declared variables were touched while resolving an experiment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableUsage {
    /// Declared variables that some expansion touched.
    pub used: BTreeSet<String>,
    /// Declared variables that no expansion touched.
    pub unused: BTreeSet<String>,
}

impl Experiment {
    /// Creates an unnamed experiment for `application`.
    pub fn new(application: impl Into<String>, expander: Expander) -> Self {
        let application = application.into();
        Self {
            identity: ExperimentIdentity::new(application.clone(), "", ""),
            application,
            namespace: String::new(),
            expander,
            chain_declarations: Vec::new(),
            chain_order: Rc::new(RefCell::new(Vec::new())),
            chained: false,
            template: false,
            repeat_index: None,
            chain_built: false,
            command: None,
        }
    }

    /// Name of the application the experiment belongs to.
    pub fn application(&self) -> &str {
        &self.application
    }

    /// Application, workload and experiment names.
    pub fn identity(&self) -> &ExperimentIdentity {
        &self.identity
    }

    /// Registry key of the experiment.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Fixes the identity, reseeds the random stream from the namespace and
    /// starts a fresh single-member chain order.
    pub fn set_identity(&mut self, identity: ExperimentIdentity) {
        self.namespace = identity.namespace();
        self.expander.reseed(&self.namespace);
        self.chain_order = Rc::new(RefCell::new(vec![self.namespace.clone()]));
        self.identity = identity;
    }

    /// Renames a chained copy without touching its identity.
    pub(crate) fn set_namespace(&mut self, namespace: String) {
        self.expander.reseed(&namespace);
        self.namespace = namespace;
    }

    /// Expander holding the experiment's variables.
    pub fn expander(&self) -> &Expander {
        &self.expander
    }

    /// Mutable access to the expander.
    pub fn expander_mut(&mut self) -> &mut Expander {
        &mut self.expander
    }

    /// Variables of the experiment, unexpanded.
    pub fn variables(&self) -> &VariableEnv {
        self.expander.variables()
    }

    /// Defines or replaces one variable.
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<VarValue>) {
        self.expander.set_variable(name, value);
    }

    /// Raw chained-experiment declarations, validated when the chain is built.
    pub fn chain_declarations(&self) -> &[Value] {
        &self.chain_declarations
    }

    /// Replaces the chained-experiment declarations.
    pub fn set_chain_declarations(&mut self, declarations: Vec<Value>) {
        self.chain_declarations = declarations;
    }

    /// Snapshot of the group's execution order.
    pub fn chain_order(&self) -> Vec<String> {
        self.chain_order.borrow().clone()
    }

    /// Shared handle to the group's execution order.
    pub fn chain_order_handle(&self) -> ChainOrder {
        Rc::clone(&self.chain_order)
    }

    pub(crate) fn share_chain_order(&mut self, order: &ChainOrder) {
        self.chain_order = Rc::clone(order);
    }

    /// True when both experiments belong to the same chain group.
    pub fn shares_chain_order_with(&self, other: &Experiment) -> bool {
        Rc::ptr_eq(&self.chain_order, &other.chain_order)
    }

    /// True for instances created by the chain builder.
    pub fn is_chained(&self) -> bool {
        self.chained
    }

    pub(crate) fn mark_chained(&mut self) {
        self.chained = true;
        self.chain_declarations.clear();
        self.chain_built = true;
    }

    /// True for experiments that only serve as chain targets.
    pub fn is_template(&self) -> bool {
        self.template
    }

    /// Marks the experiment as a template.
    pub fn set_template(&mut self, template: bool) {
        self.template = template;
    }

    /// Repeat number, `None` for the base experiment.
    pub fn repeat_index(&self) -> Option<usize> {
        self.repeat_index
    }

    /// Numbers a repeat and exposes the number as `repeat_index`.
    pub fn set_repeat_index(&mut self, index: usize) {
        self.repeat_index = Some(index);
        self.expander.set_variable(REPEAT_INDEX, index as i64);
    }

    /// True once the chain rooted here has been built.
    pub fn is_chain_built(&self) -> bool {
        self.chain_built
    }

    pub(crate) fn mark_chain_built(&mut self) {
        self.chain_built = true;
    }

    /// Final command, once resolved.
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    /// Stores `template` as the `command` variable and expands it.
    pub fn resolve_command(
        &mut self,
        template: &str,
        lookup: Option<&dyn ExperimentLookup>,
    ) -> Result<&str, RambleError> {
        self.expander.set_variable(COMMAND, template);
        let opts = options(lookup);
        let resolved = self.expander.expand_var_name_with(COMMAND, &opts)?;
        Ok(self.command.insert(resolved).as_str())
    }

    /// Expanded `experiment_run_dir`.
    pub fn run_dir(&self, lookup: Option<&dyn ExperimentLookup>) -> Result<String, RambleError> {
        self.expander
            .expand_var_name_with(EXPERIMENT_RUN_DIR, &options(lookup))
    }

    /// Resolves the run directory, log file and command, then reports which
    /// of the experiment's variables took part.
    pub fn variable_usage(
        &self,
        lookup: Option<&dyn ExperimentLookup>,
    ) -> Result<VariableUsage, RambleError> {
        let opts = options(lookup);
        self.expander.reset_used_variables();
        self.expander.expand_var_name_with(EXPERIMENT_RUN_DIR, &opts)?;
        self.expander.expand_var_name_with(LOG_FILE, &opts)?;
        if self.expander.contains(COMMAND) {
            self.expander.expand_var_name_with(COMMAND, &opts)?;
        }
        let touched = self.expander.used_variables();
        let (used, unused) = self
            .variables()
            .keys()
            .cloned()
            .partition(|name| touched.contains(name));
        Ok(VariableUsage { used, unused })
    }
}

fn options(lookup: Option<&dyn ExperimentLookup>) -> ExpandOptions<'_> {
    match lookup {
        Some(lookup) => ExpandOptions::default().with_lookup(lookup),
        None => ExpandOptions::default(),
    }
}

/// Creates blank experiments for an application.
pub trait ObjectFactory {
    /// Creates an unnamed experiment with an empty environment.
    fn instantiate(&self, application: &str) -> Result<Experiment, RambleError>;
}

/// Factory producing experiments with no application-specific behaviour.
#[derive(Debug, Clone, Default)]
pub struct GenericFactory {
    config: ExpansionConfig,
}

impl GenericFactory {
    /// Factory whose experiments expand with `config`.
    pub fn new(config: ExpansionConfig) -> Self {
        Self { config }
    }
}

impl ObjectFactory for GenericFactory {
    fn instantiate(&self, application: &str) -> Result<Experiment, RambleError> {
        let expander = Expander::with_config(VariableEnv::new(), self.config.clone());
        Ok(Experiment::new(application, expander))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::derive_identity_variables;
    use ramble_core::variable_env;

    fn experiment() -> Experiment {
        let mut env = variable_env([
            ("workspace_root", "/ws"),
            ("application_name", "app"),
            ("workload_name", "wl"),
            ("experiment_name", "exp"),
            ("threads", "4"),
            ("unused", "x"),
        ]);
        derive_identity_variables(&mut env);
        let mut exp = GenericFactory::default().instantiate("app").expect("instantiate");
        *exp.expander_mut().variables_mut() = env;
        let identity = ExperimentIdentity::resolve(exp.expander()).expect("identity");
        exp.set_identity(identity);
        exp
    }

    #[test]
    fn identity_starts_a_single_member_order() {
        let exp = experiment();
        assert_eq!(exp.namespace(), "app.wl.exp");
        assert_eq!(exp.chain_order(), vec!["app.wl.exp".to_string()]);
    }

    #[test]
    fn command_resolution_and_usage() {
        let mut exp = experiment();
        let command = exp
            .resolve_command("run -t {threads} > {log_file}", None)
            .expect("command")
            .to_string();
        assert_eq!(command, "run -t 4 > /ws/experiments/app/wl/exp/exp.out");
        assert_eq!(exp.command(), Some(command.as_str()));
        let usage = exp.variable_usage(None).expect("usage");
        assert!(usage.used.contains("threads"));
        assert!(usage.used.contains("workspace_root"));
        assert!(usage.unused.contains("unused"));
    }

    #[test]
    fn repeat_index_is_a_variable() {
        let mut exp = experiment();
        exp.set_repeat_index(3);
        assert_eq!(exp.repeat_index(), Some(3));
        assert_eq!(exp.expander().expand_var("{repeat_index}").expect("idx"), "3");
    }

    #[test]
    fn clones_share_order_only_when_asked() {
        let exp = experiment();
        let mut copy = exp.clone();
        assert!(copy.shares_chain_order_with(&exp));
        copy.set_identity(ExperimentIdentity::new("app", "wl", "other"));
        assert!(!copy.shares_chain_order_with(&exp));
        copy.share_chain_order(&exp.chain_order_handle());
        assert!(copy.shares_chain_order_with(&exp));
    }
}
