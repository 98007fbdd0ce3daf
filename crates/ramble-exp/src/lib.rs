#![deny(missing_docs)]
//! Scope merging, identity and topology derivation, chained experiments and
//! experiment-set assembly for Ramble workspaces.

mod chain;
mod experiment;
mod hash;
mod manifest;
mod namespace;
mod registry;
mod render;
mod scope;
mod serde;
mod set;
mod topology;
mod workspace;

pub use chain::{build_chain, ChainDeclaration, ChainPosition};
pub use experiment::{ChainOrder, Experiment, GenericFactory, ObjectFactory, VariableUsage};
pub use hash::stable_hash_string;
pub use manifest::{ManifestEntry, SetManifest, MANIFEST_FILE};
pub use namespace::{derive_identity_variables, ExperimentIdentity};
pub use registry::{ExperimentRegistry, Registry};
pub use render::{CrossProductRenderer, RenderSpec, RenderedBinding, Renderer};
pub use scope::{Scope, ScopeLevel, ScopeStack};
pub use set::{ExperimentSet, ExperimentSpec};
pub use topology::{derive_topology, Topology};
pub use workspace::{ApplicationSpec, WorkloadSpec, Workspace, WorkspaceConfig, WorkspaceSettings};

pub use self::serde::{from_json_slice, from_yaml_str, to_canonical_json_bytes, to_yaml_string};
