#![deny(missing_docs)]
#![doc = "Core error, variable and lookup types shared by the Ramble expansion and experiment-assembly crates."]

pub mod errors;
pub mod keywords;
pub mod lookup;
pub mod rng;
mod variables;

pub use errors::{ErrorInfo, RambleError};
pub use lookup::ExperimentLookup;
pub use rng::{derive_label_seed, RngHandle};
pub use variables::{format_float, variable_env, VarValue, VariableEnv};
