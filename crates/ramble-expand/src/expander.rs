//! Resolution of `{...}` references against a variable environment.

use std::cell::RefCell;
use std::collections::BTreeSet;

use ramble_core::{ErrorInfo, ExperimentLookup, RambleError, RngHandle, VarValue, VariableEnv};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::expr::{parse_expression, EvalError, Evaluator, Expr, Value};
use crate::format::apply_format;
use crate::template::{parse_template, unescape_braces, NodeId, TemplateTree};

fn default_max_depth() -> usize {
    64
}

/// Expansion settings shared by every expander of a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionConfig {
    /// Forces every expansion to reject unresolved references.
    #[serde(default)]
    pub disable_passthrough: bool,
    /// Deepest chain of variable indirections followed before failing.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Master seed for `randint` / `randrange`.
    #[serde(default)]
    pub seed: u64,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            disable_passthrough: false,
            max_depth: default_max_depth(),
            seed: 0,
        }
    }
}

/// Per-call expansion options.
#[derive(Clone, Copy)]
pub struct ExpandOptions<'a> {
    /// Variables overriding the expander's own for this call only.
    pub extra_vars: Option<&'a VariableEnv>,
    /// Whether unresolved references may be left in the output.
    pub allow_passthrough: bool,
    /// Registry consulted by `<variable> in <namespace>` expressions.
    pub lookup: Option<&'a dyn ExperimentLookup>,
    /// Starting recursion depth.
    pub depth: usize,
}

impl Default for ExpandOptions<'_> {
    fn default() -> Self {
        Self {
            extra_vars: None,
            allow_passthrough: true,
            lookup: None,
            depth: 0,
        }
    }
}

impl std::fmt::Debug for ExpandOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpandOptions")
            .field("extra_vars", &self.extra_vars)
            .field("allow_passthrough", &self.allow_passthrough)
            .field("lookup", &self.lookup.is_some())
            .field("depth", &self.depth)
            .finish()
    }
}

impl<'a> ExpandOptions<'a> {
    /// Options that reject unresolved references.
    pub fn strict() -> Self {
        Self {
            allow_passthrough: false,
            ..Self::default()
        }
    }

    /// Layers `vars` above the expander's variables.
    pub fn with_extra_vars(mut self, vars: &'a VariableEnv) -> Self {
        self.extra_vars = Some(vars);
        self
    }

    /// Enables cross-experiment lookups through `lookup`.
    pub fn with_lookup(mut self, lookup: &'a dyn ExperimentLookup) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Starts counting recursion from `depth`.
    pub fn at_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Sets whether unresolved references may be left in the output.
    pub fn passthrough(mut self, allow: bool) -> Self {
        self.allow_passthrough = allow;
        self
    }
}

/// Expands templates against one experiment's variables.
#[derive(Debug, Clone)]
pub struct Expander {
    variables: VariableEnv,
    no_expand: BTreeSet<String>,
    config: ExpansionConfig,
    used: RefCell<BTreeSet<String>>,
    rng: RefCell<RngHandle>,
}

impl Expander {
    /// Creates an expander with default configuration.
    pub fn new(variables: VariableEnv) -> Self {
        Self::with_config(variables, ExpansionConfig::default())
    }

    /// Creates an expander with explicit configuration.
    pub fn with_config(variables: VariableEnv, config: ExpansionConfig) -> Self {
        let rng = RngHandle::from_seed(config.seed);
        Self {
            variables,
            no_expand: BTreeSet::new(),
            config,
            used: RefCell::new(BTreeSet::new()),
            rng: RefCell::new(rng),
        }
    }

    /// Restarts the random stream from the configured seed and `label`.
    pub fn reseed(&mut self, label: &str) {
        self.rng = RefCell::new(RngHandle::for_label(self.config.seed, label));
    }

    /// Expansion settings in effect.
    pub fn config(&self) -> &ExpansionConfig {
        &self.config
    }

    /// Variables visible to this expander.
    pub fn variables(&self) -> &VariableEnv {
        &self.variables
    }

    /// Mutable access to the variable environment.
    pub fn variables_mut(&mut self) -> &mut VariableEnv {
        &mut self.variables
    }

    /// Defines or replaces a variable.
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<VarValue>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Raw, unexpanded value of `name`.
    pub fn get(&self, name: &str) -> Option<&VarValue> {
        self.variables.get(name)
    }

    /// True when `name` is defined.
    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Marks `name` so its raw value is substituted verbatim.
    pub fn set_no_expand(&mut self, name: impl Into<String>) {
        self.no_expand.insert(name.into());
    }

    /// True when `name` is substituted without expansion.
    pub fn is_no_expand(&self, name: &str) -> bool {
        self.no_expand.contains(name)
    }

    /// Names referenced by expansions since the last reset.
    pub fn used_variables(&self) -> BTreeSet<String> {
        self.used.borrow().clone()
    }

    /// Forgets every name recorded by earlier expansions.
    pub fn reset_used_variables(&self) {
        self.used.borrow_mut().clear();
    }

    /// Expands `value` with default options.
    pub fn expand_var(&self, value: &str) -> Result<String, RambleError> {
        self.expand_var_with(value, &ExpandOptions::default())
    }

    /// Expands `value` with explicit options.
    pub fn expand_var_with(
        &self,
        value: &str,
        opts: &ExpandOptions<'_>,
    ) -> Result<String, RambleError> {
        self.expand_at(value, opts, opts.depth)
    }

    /// Expands the variable called `name`.
    pub fn expand_var_name(&self, name: &str) -> Result<String, RambleError> {
        self.expand_var_name_with(name, &ExpandOptions::default())
    }

    /// Expands the variable called `name` with explicit options.
    pub fn expand_var_name_with(
        &self,
        name: &str,
        opts: &ExpandOptions<'_>,
    ) -> Result<String, RambleError> {
        self.expand_var_with(&format!("{{{name}}}"), opts)
    }

    /// Expands `text` and requires the result to be `True` or `False`.
    pub fn evaluate_predicate(
        &self,
        text: &str,
        opts: &ExpandOptions<'_>,
    ) -> Result<bool, RambleError> {
        let result = self.expand_var_with(text, opts)?;
        match result.as_str() {
            "True" => Ok(true),
            "False" => Ok(false),
            _ => Err(RambleError::Syntax(
                ErrorInfo::new(
                    "syntax.predicate",
                    format!("predicate '{text}' evaluated to '{result}', not a boolean"),
                )
                .with_context("predicate", text)
                .with_context("result", result.clone())
                .with_hint("predicates must reduce to True or False"),
            )),
        }
    }

    fn lookup_var<'v>(&'v self, name: &str, opts: &ExpandOptions<'v>) -> Option<&'v VarValue> {
        opts.extra_vars
            .and_then(|extra| extra.get(name))
            .or_else(|| self.variables.get(name))
    }

    fn allow_passthrough(&self, opts: &ExpandOptions<'_>) -> bool {
        opts.allow_passthrough && !self.config.disable_passthrough
    }

    fn expand_at(
        &self,
        text: &str,
        opts: &ExpandOptions<'_>,
        depth: usize,
    ) -> Result<String, RambleError> {
        if depth > self.config.max_depth {
            return Err(RambleError::Expansion(
                ErrorInfo::new(
                    "expansion.max_depth",
                    format!(
                        "expansion of '{text}' exceeded the maximum depth of {}",
                        self.config.max_depth
                    ),
                )
                .with_context("text", text)
                .with_hint("check for variables that refer to each other"),
            ));
        }

        let tree = parse_template(text);
        if !tree.has_references() {
            return Ok(unescape_braces(text));
        }

        let mut rendered: Vec<String> = Vec::with_capacity(tree.len());
        for id in tree.post_order() {
            let contents = splice(text, &tree, id, &rendered);
            let value = if tree.node(id).is_root() {
                match self.try_evaluate(&contents, opts, depth)? {
                    Some(value) => value.to_string(),
                    None => contents,
                }
            } else {
                self.evaluate_node(text, contents, opts, depth)?
            };
            rendered.push(value);
        }

        let root = rendered.pop().unwrap_or_default();
        Ok(unescape_braces(&root))
    }

    fn evaluate_node(
        &self,
        original: &str,
        contents: String,
        opts: &ExpandOptions<'_>,
        depth: usize,
    ) -> Result<String, RambleError> {
        if contents == "{}" {
            return Ok(contents);
        }
        let payload = &contents[1..contents.len() - 1];
        let (keyword, spec) = match payload.split_once(':') {
            Some((keyword, spec)) => (keyword, Some(spec)),
            None => (payload, None),
        };

        let mut passthrough = false;
        let current = match self.lookup_var(keyword, opts) {
            Some(raw) if self.is_no_expand(keyword) => {
                self.used.borrow_mut().insert(keyword.to_string());
                return Ok(raw.to_template());
            }
            Some(raw) => {
                self.used.borrow_mut().insert(keyword.to_string());
                self.expand_at(&raw.to_template(), opts, depth + 1)?
            }
            None => {
                passthrough = true;
                keyword.to_string()
            }
        };

        let value = match self.try_evaluate(&current, opts, depth)? {
            Some(value) => {
                passthrough = false;
                value
            }
            None => Value::Str(current),
        };

        if passthrough {
            // Unresolved references keep their format spec for a later pass.
            let text = format!("{{{payload}}}");
            if !self.allow_passthrough(opts) {
                return Err(RambleError::Passthrough(
                    ErrorInfo::new(
                        "passthrough.unresolved",
                        format!("unable to resolve '{keyword}' while expanding '{original}'"),
                    )
                    .with_context("original", original)
                    .with_context("result", text)
                    .with_hint("define the variable or allow passthrough"),
                ));
            }
            return Ok(text);
        }

        Ok(match spec {
            Some(spec) => apply_format(&value, spec).unwrap_or_else(|err| {
                debug!(error = %err, "format spec not applied");
                format!("{value}:{spec}")
            }),
            None => value.to_string(),
        })
    }

    /// Evaluates `text` as an expression. `None` means the text stays literal:
    /// it did not parse, failed recoverably, or is a bare name.
    fn try_evaluate(
        &self,
        text: &str,
        opts: &ExpandOptions<'_>,
        depth: usize,
    ) -> Result<Option<Value>, RambleError> {
        let expr = match parse_expression(text) {
            Ok(Expr::Name(_) | Expr::Attribute(_)) => return Ok(None),
            Ok(expr) => expr,
            Err(err) => {
                debug!(expression = text, error = %err, "kept literal text");
                return Ok(None);
            }
        };
        let mut evaluator = Evaluator::new().with_rng(&self.rng).at_depth(depth);
        if let Some(lookup) = opts.lookup {
            evaluator = evaluator.with_lookup(lookup);
        }
        match evaluator.eval(&expr) {
            Ok(value) => Ok(Some(value)),
            Err(EvalError::Fatal(err)) => Err(err),
            Err(err) => {
                debug!(expression = text, error = %err, "kept literal text");
                Ok(None)
            }
        }
    }
}

/// Rebuilds the text of `id` with every child replaced by its rendered value.
fn splice(source: &str, tree: &TemplateTree, id: NodeId, rendered: &[String]) -> String {
    let node = tree.node(id);
    let span = node.span();
    let mut out = String::with_capacity(span.len());
    let mut cursor = span.start;
    for child in node.children() {
        let child_span = tree.node(*child).span();
        out.push_str(&source[cursor..child_span.start]);
        out.push_str(&rendered[child.index()]);
        cursor = child_span.end;
    }
    out.push_str(&source[cursor..span.end]);
    out
}
