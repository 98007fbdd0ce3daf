//! Cross-experiment variable lookup seam.

use crate::errors::RambleError;

/// Resolves a variable inside another experiment, addressed by its
/// fully-qualified namespace.
///
/// Implemented by the experiment registry and consumed by the `in` operator
/// of the expression evaluator.
pub trait ExperimentLookup {
    /// Returns the fully expanded value of `variable` inside the experiment
    /// registered as `namespace`, or `Ok(None)` when no such experiment exists.
    ///
    /// `depth` is the recursion depth of the expansion that triggered the
    /// lookup; implementations continue counting from it so that experiments
    /// referring to each other cannot recurse without bound.
    fn variable_in(
        &self,
        namespace: &str,
        variable: &str,
        depth: usize,
    ) -> Result<Option<String>, RambleError>;
}
