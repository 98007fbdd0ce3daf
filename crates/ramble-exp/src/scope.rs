//! Precedence-ordered variable scopes merged into one environment per
//! experiment.

use std::collections::BTreeMap;

use ramble_core::{VarValue, VariableEnv};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Precedence level of a scope, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeLevel {
    /// Site-wide defaults.
    Global,
    /// Values the workspace itself provides, such as `workspace_root`.
    Base,
    /// The workspace file's `variables`.
    Workspace,
    /// One application.
    Application,
    /// One workload of an application.
    Workload,
    /// One experiment declaration.
    Experiment,
    /// Overrides given on the command line.
    Required,
}

impl ScopeLevel {
    /// Every level in merge order.
    pub const ALL: [ScopeLevel; 7] = [
        ScopeLevel::Global,
        ScopeLevel::Base,
        ScopeLevel::Workspace,
        ScopeLevel::Application,
        ScopeLevel::Workload,
        ScopeLevel::Experiment,
        ScopeLevel::Required,
    ];

    /// Lower-case level name used in variable keys and messages.
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeLevel::Global => "global",
            ScopeLevel::Base => "base",
            ScopeLevel::Workspace => "workspace",
            ScopeLevel::Application => "application",
            ScopeLevel::Workload => "workload",
            ScopeLevel::Experiment => "experiment",
            ScopeLevel::Required => "required",
        }
    }

    /// Levels that only contribute precedence and never inject a name.
    pub fn is_precedence_only(self) -> bool {
        matches!(
            self,
            ScopeLevel::Global | ScopeLevel::Base | ScopeLevel::Required
        )
    }

    /// Variable receiving the scope's display name, e.g. `workload_name`.
    pub fn name_key(self) -> Option<String> {
        (!self.is_precedence_only()).then(|| format!("{}_name", self.as_str()))
    }
}

/// One named precedence level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    /// Precedence level.
    pub level: ScopeLevel,
    /// Display name, injected as `<level>_name`.
    #[serde(default)]
    pub name: Option<String>,
    /// Variables defined at this level.
    #[serde(default)]
    pub variables: VariableEnv,
    /// Modifiers, chain declarations and similar, carried untouched.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Scope {
    /// Creates an empty, unnamed scope.
    pub fn new(level: ScopeLevel) -> Self {
        Self {
            level,
            name: None,
            variables: VariableEnv::new(),
            metadata: Map::new(),
        }
    }

    /// Creates an empty scope with a display name.
    pub fn named(level: ScopeLevel, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(level)
        }
    }

    /// Replaces the scope's variables.
    pub fn with_variables(mut self, variables: VariableEnv) -> Self {
        self.variables = variables;
        self
    }

    /// Adds one variable.
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<VarValue>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Adds one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// At most one scope per level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeStack {
    scopes: BTreeMap<ScopeLevel, Scope>,
}

impl ScopeStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `scope` at its level, returning the scope it replaced.
    pub fn set(&mut self, scope: Scope) -> Option<Scope> {
        self.scopes.insert(scope.level, scope)
    }

    /// Builder form of [`ScopeStack::set`].
    pub fn with(mut self, scope: Scope) -> Self {
        self.set(scope);
        self
    }

    /// Scope installed at `level`.
    pub fn get(&self, level: ScopeLevel) -> Option<&Scope> {
        self.scopes.get(&level)
    }

    /// Mutable access to the scope at `level`.
    pub fn get_mut(&mut self, level: ScopeLevel) -> Option<&mut Scope> {
        self.scopes.get_mut(&level)
    }

    /// Removes the scope at `level`.
    pub fn remove(&mut self, level: ScopeLevel) -> Option<Scope> {
        self.scopes.remove(&level)
    }

    /// Flattens the stack into one environment.
    ///
    /// Later levels overwrite earlier ones key by key. After each named,
    /// non-precedence-only level is merged, its display name is injected as
    /// `<level>_name` unless the merged environment already defines that key.
    pub fn merge(&self) -> VariableEnv {
        let mut merged = VariableEnv::new();
        for scope in self.scopes.values() {
            for (key, value) in &scope.variables {
                merged.insert(key.clone(), value.clone());
            }
            if let (Some(key), Some(name)) = (scope.level.name_key(), &scope.name) {
                if !merged.contains_key(&key) {
                    merged.insert(key, VarValue::Str(name.clone()));
                }
            }
        }
        merged
    }

    /// Metadata of every scope, keyed by level name.
    pub fn metadata(&self) -> BTreeMap<&'static str, &Map<String, Value>> {
        self.scopes
            .values()
            .map(|scope| (scope.level.as_str(), &scope.metadata))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_levels_win() {
        let stack = ScopeStack::new()
            .with(Scope::new(ScopeLevel::Workspace).with_variable("n", "1"))
            .with(Scope::named(ScopeLevel::Experiment, "e").with_variable("n", "2"));
        assert_eq!(stack.merge().get("n"), Some(&VarValue::from("2")));
    }

    #[test]
    fn names_are_injected_unless_defined() {
        let stack = ScopeStack::new()
            .with(Scope::named(ScopeLevel::Base, "ignored"))
            .with(Scope::named(ScopeLevel::Application, "hpl"))
            .with(Scope::named(ScopeLevel::Workload, "standard").with_variable("workload_name", "custom"));
        let merged = stack.merge();
        assert_eq!(merged.get("application_name"), Some(&VarValue::from("hpl")));
        assert_eq!(merged.get("workload_name"), Some(&VarValue::from("custom")));
        assert!(!merged.contains_key("base_name"));
    }

    #[test]
    fn merge_follows_precedence_not_insertion_order() {
        let stack = ScopeStack::new()
            .with(Scope::new(ScopeLevel::Required).with_variable("x", "required"))
            .with(Scope::new(ScopeLevel::Global).with_variable("x", "global"));
        assert_eq!(stack.merge().get("x"), Some(&VarValue::from("required")));
    }
}
