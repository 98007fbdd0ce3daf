//! Chained experiments: declaration validation and group construction.
//!
//! A primary experiment may declare other primary experiments (by glob) to
//! run before or after it. Building the chain walks those declarations with
//! an explicit stack, copies every referenced experiment under the primary's
//! run directory and records one execution order shared by the whole group.

use std::collections::VecDeque;

use indexmap::IndexSet;
use ramble_core::keywords::{CHAINED_EXPERIMENTS_DIR, EXPERIMENT_NAMESPACE, EXPERIMENT_RUN_DIR};
use ramble_core::{ErrorInfo, ExperimentLookup, RambleError, VariableEnv};
use ramble_expand::ExpandOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::experiment::Experiment;
use crate::registry::{ExperimentRegistry, Registry};

/// Where a chained experiment lands relative to its primary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainPosition {
    /// Front of the group.
    BeforeChain,
    /// Immediately before the primary, after earlier `before_root` entries.
    BeforeRoot,
    /// Immediately after the primary, ahead of earlier `after_root` entries.
    #[default]
    AfterRoot,
    /// End of the group.
    AfterChain,
}

impl ChainPosition {
    /// Accepted spellings of `order`.
    pub const NAMES: [&'static str; 4] = ["before_root", "after_root", "before_chain", "after_chain"];

    /// Parses an `order` value; unknown names yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "before_chain" => Some(ChainPosition::BeforeChain),
            "before_root" => Some(ChainPosition::BeforeRoot),
            "after_root" => Some(ChainPosition::AfterRoot),
            "after_chain" => Some(ChainPosition::AfterChain),
            _ => None,
        }
    }
}

/// A validated chained-experiment declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainDeclaration {
    /// Glob over primary experiment namespaces.
    pub name: String,
    /// Command run by the chained copy.
    pub command: String,
    /// Placement relative to the primary experiment.
    pub order: ChainPosition,
    /// Variables overriding the target's own.
    pub variables: VariableEnv,
    /// Variables copied from the declaring experiment's resolved values.
    pub inherit_variables: Vec<String>,
}

fn invalid(parent: &str, raw: &Value, message: String) -> RambleError {
    RambleError::InvalidChain(
        ErrorInfo::new("chain.invalid", message)
            .with_context("parent", parent)
            .with_context("declaration", raw.to_string()),
    )
}

impl ChainDeclaration {
    /// Checks a raw declaration made by the experiment `parent`.
    pub fn validate(parent: &str, raw: &Value) -> Result<Self, RambleError> {
        let Value::Object(fields) = raw else {
            return Err(invalid(
                parent,
                raw,
                format!("chained experiment declared by '{parent}' must be a mapping"),
            ));
        };
        let required = |key: &str| match fields.get(key) {
            Some(Value::String(value)) => Ok(value.clone()),
            Some(_) => Err(invalid(
                parent,
                raw,
                format!("chained experiment '{key}' declared by '{parent}' must be a string"),
            )),
            None => Err(invalid(
                parent,
                raw,
                format!("chained experiment declared by '{parent}' is missing '{key}'"),
            )),
        };
        let name = required("name")?;
        let command = required("command")?;

        let order = match fields.get("order") {
            None | Some(Value::Null) => ChainPosition::default(),
            Some(Value::String(value)) => ChainPosition::parse(value).ok_or_else(|| {
                invalid(
                    parent,
                    raw,
                    format!(
                        "order '{value}' of chained experiment '{name}' is not one of {}",
                        ChainPosition::NAMES.join(", ")
                    ),
                )
            })?,
            Some(other) => {
                return Err(invalid(
                    parent,
                    raw,
                    format!("order of chained experiment '{name}' must be a string, got {other}"),
                ))
            }
        };

        let variables = match fields.get("variables") {
            None | Some(Value::Null) => VariableEnv::new(),
            Some(value @ Value::Object(_)) => serde_json::from_value(value.clone())
                .map_err(|err| invalid(parent, raw, format!("invalid chained variables: {err}")))?,
            Some(_) => {
                return Err(invalid(
                    parent,
                    raw,
                    format!("variables of chained experiment '{name}' must be a mapping"),
                ))
            }
        };

        let inherit_variables = match fields.get("inherit_variables") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        invalid(parent, raw, "inherit_variables must list names".to_string())
                    })
                })
                .collect::<Result<_, _>>()?,
            Some(_) => {
                return Err(invalid(
                    parent,
                    raw,
                    format!("inherit_variables of chained experiment '{name}' must be a list"),
                ))
            }
        };

        Ok(Self {
            name,
            command,
            order,
            variables,
            inherit_variables,
        })
    }
}

struct Frame {
    parent: String,
    target: String,
    declaration: ChainDeclaration,
    raw: Value,
    opened: bool,
}

fn push_declarations(
    registry: &Registry,
    declaring: &Experiment,
    path: &IndexSet<String>,
    stack: &mut Vec<Frame>,
) -> Result<(), RambleError> {
    let parent = declaring.namespace();
    let mut frames = Vec::new();
    for raw in declaring.chain_declarations() {
        let declaration = ChainDeclaration::validate(parent, raw)?;
        let targets = registry.matching(&declaration.name)?;
        if targets.is_empty() {
            warn!(
                parent,
                pattern = %declaration.name,
                "chained experiment declaration matches no experiment"
            );
        }
        for target in targets {
            if path.contains(&target) {
                let cycle = path
                    .iter()
                    .map(String::as_str)
                    .chain([target.as_str()])
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(RambleError::ChainCycle(
                    ErrorInfo::new(
                        "chain.cycle",
                        format!("chaining '{target}' from '{parent}' forms a cycle: {cycle}"),
                    )
                    .with_context("parent", parent)
                    .with_context("reference", target.as_str())
                    .with_context("declaration", raw.to_string())
                    .with_context("path", cycle),
                ));
            }
            frames.push(Frame {
                parent: parent.to_string(),
                target,
                declaration: declaration.clone(),
                raw: raw.clone(),
                opened: false,
            });
        }
    }
    stack.extend(frames.into_iter().rev());
    Ok(())
}

fn unknown_experiment(namespace: &str) -> RambleError {
    RambleError::Registry(
        ErrorInfo::new(
            "registry.unknown",
            format!("experiment '{namespace}' is not registered"),
        )
        .with_context("namespace", namespace),
    )
}

fn registered<'r>(registry: &'r Registry, namespace: &str) -> Result<&'r Experiment, RambleError> {
    registry
        .get(namespace)
        .ok_or_else(|| unknown_experiment(namespace))
}

fn instantiate(
    registry: &Registry,
    frame: &Frame,
    root_namespace: &str,
    root_run_dir: &str,
    index: usize,
) -> Result<Experiment, RambleError> {
    let base = registered(registry, &frame.target)?;
    let parent = registered(registry, &frame.parent)?;
    let namespace = format!("{root_namespace}.chain.{index}.{}", frame.target);
    let run_dir = format!(
        "{root_run_dir}/{CHAINED_EXPERIMENTS_DIR}/{index}.{}",
        frame.target
    );

    let mut instance = base.clone();
    instance.set_namespace(namespace.clone());
    instance.mark_chained();
    instance.set_variable(EXPERIMENT_NAMESPACE, namespace);
    instance.set_variable(EXPERIMENT_RUN_DIR, run_dir);
    for (name, value) in &frame.declaration.variables {
        instance.set_variable(name.clone(), value.clone());
    }

    let opts = ExpandOptions::default().with_lookup(registry);
    for name in &frame.declaration.inherit_variables {
        if !parent.expander().contains(name) {
            return Err(RambleError::InvalidChain(
                ErrorInfo::new(
                    "chain.inherit",
                    format!("'{}' cannot inherit '{name}': it is not defined", frame.parent),
                )
                .with_context("parent", frame.parent.as_str())
                .with_context("variable", name.as_str())
                .with_context("declaration", frame.raw.to_string()),
            ));
        }
        let value = parent.expander().expand_var_name_with(name, &opts)?;
        instance.set_variable(name.clone(), value);
    }

    instance.resolve_command(&frame.declaration.command, Some(registry as &dyn ExperimentLookup))?;
    Ok(instance)
}

/// Builds the chain group of the primary experiment `root`.
///
/// Returns the group's execution order. Chained instances are registered
/// only once the whole group has been built; on error the registry is left
/// untouched. Building an already-built chain returns its current order.
pub fn build_chain(registry: &mut Registry, root: &str) -> Result<Vec<String>, RambleError> {
    let (order, instances) = {
        let root_experiment = registered(registry, root)?;
        if root_experiment.is_chain_built() {
            return Ok(root_experiment.chain_order());
        }
        plan_chain(registry, root_experiment)?
    };

    if let Some(clash) = instances
        .iter()
        .find(|instance| registry.contains(instance.namespace()))
    {
        return Err(RambleError::Registry(
            ErrorInfo::new(
                "registry.duplicate",
                format!("chained experiment '{}' is already defined", clash.namespace()),
            )
            .with_context("namespace", clash.namespace()),
        ));
    }

    let root_experiment = registry
        .get_mut(root)
        .ok_or_else(|| unknown_experiment(root))?;
    let handle = root_experiment.chain_order_handle();
    *handle.borrow_mut() = order.clone();
    root_experiment.mark_chain_built();

    for mut instance in instances {
        instance.share_chain_order(&handle);
        registry.insert(instance)?;
    }
    debug!(root, members = order.len(), "built chain");
    Ok(order)
}

fn plan_chain(
    registry: &Registry,
    root: &Experiment,
) -> Result<(Vec<String>, Vec<Experiment>), RambleError> {
    let root_namespace = root.namespace().to_string();
    let root_run_dir = root.run_dir(Some(registry))?;

    let mut path = IndexSet::from([root_namespace.clone()]);
    let mut stack = Vec::new();
    push_declarations(registry, root, &path, &mut stack)?;

    let mut prepend = VecDeque::new();
    let mut append = VecDeque::new();
    let mut instances = Vec::new();

    loop {
        let Some(top) = stack.last_mut() else {
            break;
        };
        if !top.opened {
            top.opened = true;
            let target = top.target.clone();
            let declaring = registered(registry, &target)?;
            path.insert(target);
            push_declarations(registry, declaring, &path, &mut stack)?;
            continue;
        }
        let Some(frame) = stack.pop() else {
            break;
        };
        path.shift_remove(&frame.target);

        let instance = instantiate(
            registry,
            &frame,
            &root_namespace,
            &root_run_dir,
            instances.len(),
        )?;
        let namespace = instance.namespace().to_string();
        match frame.declaration.order {
            ChainPosition::BeforeChain => prepend.push_front(namespace),
            ChainPosition::BeforeRoot => prepend.push_back(namespace),
            ChainPosition::AfterRoot => append.push_front(namespace),
            ChainPosition::AfterChain => append.push_back(namespace),
        }
        instances.push(instance);
    }

    let order = prepend
        .into_iter()
        .chain([root_namespace])
        .chain(append)
        .collect();
    Ok((order, instances))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{GenericFactory, ObjectFactory};
    use crate::namespace::{derive_identity_variables, ExperimentIdentity};
    use ramble_core::variable_env;
    use serde_json::json;

    fn experiment(name: &str, chains: Value) -> Experiment {
        let mut env = variable_env([
            ("workspace_root", "/ws"),
            ("application_name", "app"),
            ("workload_name", "wl"),
            ("experiment_name", name),
            ("label", name),
        ]);
        derive_identity_variables(&mut env);
        let mut exp = GenericFactory::default().instantiate("app").expect("instantiate");
        *exp.expander_mut().variables_mut() = env;
        exp.set_identity(ExperimentIdentity::new("app", "wl", name));
        if let Value::Array(items) = chains {
            exp.set_chain_declarations(items);
        }
        exp
    }

    fn registry(experiments: Vec<Experiment>) -> Registry {
        let mut registry = Registry::new();
        for exp in experiments {
            registry.insert(exp).expect("insert");
        }
        registry
    }

    #[test]
    fn before_and_after_root_surround_the_primary() {
        let mut reg = registry(vec![
            experiment("x", json!([])),
            experiment("y", json!([])),
            experiment(
                "z",
                json!([
                    {"name": "app.wl.x", "command": "x", "order": "before_root"},
                    {"name": "app.wl.y", "command": "y", "order": "after_root"},
                ]),
            ),
        ]);
        let order = build_chain(&mut reg, "app.wl.z").expect("chain");
        assert_eq!(
            order,
            vec!["app.wl.z.chain.0.app.wl.x", "app.wl.z", "app.wl.z.chain.1.app.wl.y"]
        );
    }

    #[test]
    fn four_buckets_keep_their_relative_order() {
        let mut reg = registry(vec![
            experiment("a", json!([])),
            experiment(
                "root",
                json!([
                    {"name": "app.wl.a", "command": "1", "order": "before_root"},
                    {"name": "app.wl.a", "command": "2", "order": "before_chain"},
                    {"name": "app.wl.a", "command": "3", "order": "before_root"},
                    {"name": "app.wl.a", "command": "4"},
                    {"name": "app.wl.a", "command": "5", "order": "after_chain"},
                    {"name": "app.wl.a", "command": "6", "order": "after_root"},
                ]),
            ),
        ]);
        let order = build_chain(&mut reg, "app.wl.root").expect("chain");
        let commands: Vec<_> = order
            .iter()
            .map(|ns| reg.get(ns).expect("member").command().unwrap_or("root").to_string())
            .collect();
        assert_eq!(commands, ["2", "1", "3", "root", "6", "4", "5"]);
    }

    #[test]
    fn members_share_one_order_and_live_under_the_primary() {
        let mut reg = registry(vec![
            experiment("dep", json!([])),
            experiment(
                "main",
                json!([{"name": "app.wl.dep", "command": "echo {label} {extra}",
                        "variables": {"extra": "7"}}]),
            ),
        ]);
        build_chain(&mut reg, "app.wl.main").expect("chain");
        let root = reg.get("app.wl.main").expect("root");
        let member = reg.get("app.wl.main.chain.0.app.wl.dep").expect("member");
        assert!(member.is_chained());
        assert!(member.shares_chain_order_with(root));
        assert_eq!(member.command(), Some("echo dep 7"));
        assert_eq!(
            member.run_dir(None).expect("run dir"),
            "/ws/experiments/app/wl/main/chained_experiments/0.app.wl.dep"
        );
        root.chain_order_handle().borrow_mut().push("later".to_string());
        assert_eq!(member.chain_order().last().map(String::as_str), Some("later"));
        assert!(!reg.get("app.wl.dep").expect("base").shares_chain_order_with(root));
    }

    #[test]
    fn inherited_variables_come_from_the_declaring_experiment() {
        let mut reg = registry(vec![
            experiment("dep", json!([])),
            experiment(
                "main",
                json!([{"name": "app.wl.dep", "command": "{label}", "inherit_variables": ["label"]}]),
            ),
        ]);
        build_chain(&mut reg, "app.wl.main").expect("chain");
        let member = reg.get("app.wl.main.chain.0.app.wl.dep").expect("member");
        assert_eq!(member.command(), Some("main"));
    }

    #[test]
    fn inheriting_an_undefined_variable_fails() {
        let mut reg = registry(vec![
            experiment("dep", json!([])),
            experiment(
                "main",
                json!([{"name": "app.wl.dep", "command": "c", "inherit_variables": ["ghost"]}]),
            ),
        ]);
        let err = build_chain(&mut reg, "app.wl.main").expect_err("missing");
        assert!(matches!(err, RambleError::InvalidChain(_)));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn mutual_chains_are_cycles() {
        let mut reg = registry(vec![
            experiment("a", json!([{"name": "app.wl.b", "command": "b"}])),
            experiment("b", json!([{"name": "app.wl.a", "command": "a"}])),
        ]);
        let err = build_chain(&mut reg, "app.wl.a").expect_err("cycle");
        assert!(matches!(err, RambleError::ChainCycle(_)));
        assert_eq!(
            err.info().context.get("path").map(String::as_str),
            Some("app.wl.a -> app.wl.b -> app.wl.a")
        );
        assert_eq!(reg.len(), 2);
        assert!(!reg.get("app.wl.a").expect("a").is_chain_built());
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mut reg = registry(vec![experiment("a", json!([{"name": "app.wl.*", "command": "a"}]))]);
        assert!(matches!(
            build_chain(&mut reg, "app.wl.a"),
            Err(RambleError::ChainCycle(_))
        ));
    }

    #[test]
    fn diamonds_are_not_cycles() {
        let mut reg = registry(vec![
            experiment("d", json!([])),
            experiment("b", json!([{"name": "app.wl.d", "command": "d"}])),
            experiment("c", json!([{"name": "app.wl.d", "command": "d"}])),
            experiment(
                "a",
                json!([
                    {"name": "app.wl.b", "command": "b"},
                    {"name": "app.wl.c", "command": "c"},
                ]),
            ),
        ]);
        let order = build_chain(&mut reg, "app.wl.a").expect("diamond");
        assert_eq!(order.len(), 5);
        assert_eq!(order[0], "app.wl.a");
    }

    #[test]
    fn declarations_are_validated_eagerly() {
        let parent = "app.wl.p";
        let missing = ChainDeclaration::validate(parent, &json!({"name": "x"})).expect_err("command");
        assert!(matches!(missing, RambleError::InvalidChain(_)));
        assert_eq!(missing.info().context.get("parent").map(String::as_str), Some(parent));
        assert!(ChainDeclaration::validate(parent, &json!({"name": "x", "command": "c", "order": "sideways"})).is_err());
        assert!(ChainDeclaration::validate(parent, &json!({"name": "x", "command": "c", "variables": [1]})).is_err());
        let ok = ChainDeclaration::validate(parent, &json!({"name": "x", "command": "c"})).expect("valid");
        assert_eq!(ok.order, ChainPosition::AfterRoot);
    }

    #[test]
    fn invalid_declaration_aborts_the_build() {
        let mut reg = registry(vec![experiment("p", json!([{"name": "app.wl.p"}]))]);
        let err = build_chain(&mut reg, "app.wl.p").expect_err("invalid");
        assert_eq!(err.code(), "chain.invalid");
    }

    #[test]
    fn unmatched_globs_build_an_empty_chain() {
        let mut reg = registry(vec![experiment("p", json!([{"name": "nope.*", "command": "c"}]))]);
        assert_eq!(build_chain(&mut reg, "app.wl.p").expect("chain"), vec!["app.wl.p"]);
        assert_eq!(build_chain(&mut reg, "app.wl.p").expect("again"), vec!["app.wl.p"]);
    }
}
