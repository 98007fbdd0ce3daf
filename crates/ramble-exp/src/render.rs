//! Turning vector and matrix declarations into concrete variable bindings.

use std::collections::BTreeSet;

use ramble_core::{ErrorInfo, RambleError, VarValue, VariableEnv};
use serde::{Deserialize, Serialize};

/// Combination declarations attached to one experiment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSpec {
    /// Each entry names vector variables crossed with one another.
    #[serde(default)]
    pub matrices: Vec<Vec<String>>,
    /// Extra repetitions of every rendered experiment.
    #[serde(default)]
    pub n_repeats: usize,
}

/// One concrete experiment's variables.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedBinding {
    /// Scalar value of every variable.
    pub variables: VariableEnv,
    /// Repeats requested for this binding.
    pub n_repeats: usize,
}

/// Produces the concrete bindings for a merged environment.
pub trait Renderer {
    /// Expands `env` into one binding per concrete experiment.
    fn render(
        &self,
        env: &VariableEnv,
        spec: &RenderSpec,
    ) -> Result<Vec<RenderedBinding>, RambleError>;
}

/// Default renderer.
///
/// Variables named in a matrix form a cartesian product, first name slowest.
/// Every other vector is zipped element-wise and all of them must share one
/// length. The zipped group and the matrices are then crossed in that order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossProductRenderer;

type Assignment = Vec<(String, VarValue)>;

fn render_error(message: String) -> RambleError {
    RambleError::Config(ErrorInfo::new("config.render", message))
}

impl Renderer for CrossProductRenderer {
    fn render(
        &self,
        env: &VariableEnv,
        spec: &RenderSpec,
    ) -> Result<Vec<RenderedBinding>, RambleError> {
        let mut claimed = BTreeSet::new();
        let mut dimensions: Vec<Vec<Assignment>> = Vec::new();

        let mut matrix_dimensions = Vec::with_capacity(spec.matrices.len());
        for matrix in &spec.matrices {
            let mut axes = Vec::with_capacity(matrix.len());
            for name in matrix {
                let values = env.get(name).and_then(VarValue::as_list).ok_or_else(|| {
                    render_error(format!("matrix variable '{name}' is not a vector"))
                })?;
                if !claimed.insert(name.clone()) {
                    return Err(render_error(format!(
                        "variable '{name}' appears in more than one matrix"
                    )));
                }
                axes.push((name.clone(), values));
            }
            let mut rows = Vec::new();
            expand_grid(&axes, 0, Vec::new(), &mut rows);
            matrix_dimensions.push(rows);
        }

        let zipped: Vec<(&String, &[VarValue])> = env
            .iter()
            .filter(|(name, _)| !claimed.contains(*name))
            .filter_map(|(name, value)| value.as_list().map(|items| (name, items)))
            .collect();
        if let Some((first_name, first)) = zipped.first() {
            for (name, items) in &zipped[1..] {
                if items.len() != first.len() {
                    return Err(RambleError::Config(
                        ErrorInfo::new(
                            "config.render",
                            format!(
                                "vector '{name}' has {} values but '{first_name}' has {}",
                                items.len(),
                                first.len()
                            ),
                        )
                        .with_hint("list the vectors in a matrix to cross them instead"),
                    ));
                }
            }
            let rows = (0..first.len())
                .map(|idx| {
                    zipped
                        .iter()
                        .map(|(name, items)| ((*name).clone(), items[idx].clone()))
                        .collect()
                })
                .collect();
            dimensions.push(rows);
        }
        dimensions.extend(matrix_dimensions);

        let mut combined = Vec::new();
        cross(&dimensions, 0, Vec::new(), &mut combined);
        Ok(combined
            .into_iter()
            .map(|assignment| {
                let mut variables = env.clone();
                for (name, value) in assignment {
                    variables.insert(name, value);
                }
                RenderedBinding {
                    variables,
                    n_repeats: spec.n_repeats,
                }
            })
            .collect())
    }
}

fn expand_grid(
    axes: &[(String, &[VarValue])],
    idx: usize,
    current: Assignment,
    outputs: &mut Vec<Assignment>,
) {
    if idx == axes.len() {
        outputs.push(current);
        return;
    }
    let (name, values) = &axes[idx];
    for value in values.iter() {
        let mut next = current.clone();
        next.push((name.clone(), value.clone()));
        expand_grid(axes, idx + 1, next, outputs);
    }
}

fn cross(
    dimensions: &[Vec<Assignment>],
    idx: usize,
    current: Assignment,
    outputs: &mut Vec<Assignment>,
) {
    if idx == dimensions.len() {
        outputs.push(current);
        return;
    }
    for row in &dimensions[idx] {
        let mut next = current.clone();
        next.extend(row.iter().cloned());
        cross(dimensions, idx + 1, next, outputs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ramble_core::variable_env;

    fn list(items: &[i64]) -> VarValue {
        VarValue::from(items.to_vec())
    }

    fn column(bindings: &[RenderedBinding], name: &str) -> Vec<String> {
        bindings
            .iter()
            .map(|binding| binding.variables[name].to_template())
            .collect()
    }

    #[test]
    fn scalars_render_once() {
        let env = variable_env([("a", "1")]);
        let out = CrossProductRenderer.render(&env, &RenderSpec::default()).expect("render");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].variables, env);
    }

    #[test]
    fn vectors_zip_and_matrices_cross() {
        let env = variable_env([
            ("nodes", list(&[1, 2])),
            ("ppn", list(&[4, 8])),
            ("size", list(&[10, 20, 30])),
        ]);
        let spec = RenderSpec {
            matrices: vec![vec!["size".to_string()]],
            n_repeats: 2,
        };
        let out = CrossProductRenderer.render(&env, &spec).expect("render");
        assert_eq!(out.len(), 6);
        assert_eq!(column(&out, "nodes"), ["1", "1", "1", "2", "2", "2"]);
        assert_eq!(column(&out, "ppn"), ["4", "4", "4", "8", "8", "8"]);
        assert_eq!(column(&out, "size"), ["10", "20", "30", "10", "20", "30"]);
        assert!(out.iter().all(|binding| binding.n_repeats == 2));
    }

    #[test]
    fn matrix_order_is_first_name_slowest() {
        let env = variable_env([("a", list(&[1, 2])), ("b", list(&[3, 4]))]);
        let spec = RenderSpec {
            matrices: vec![vec!["b".to_string(), "a".to_string()]],
            n_repeats: 0,
        };
        let out = CrossProductRenderer.render(&env, &spec).expect("render");
        assert_eq!(column(&out, "b"), ["3", "3", "4", "4"]);
        assert_eq!(column(&out, "a"), ["1", "2", "1", "2"]);
    }

    #[test]
    fn mismatched_zip_lengths_fail() {
        let env = variable_env([("a", list(&[1, 2])), ("b", list(&[3]))]);
        assert!(matches!(
            CrossProductRenderer.render(&env, &RenderSpec::default()),
            Err(RambleError::Config(_))
        ));
    }

    #[test]
    fn matrix_members_must_be_vectors() {
        let env = variable_env([("a", "1")]);
        let spec = RenderSpec {
            matrices: vec![vec!["a".to_string()]],
            n_repeats: 0,
        };
        assert!(CrossProductRenderer.render(&env, &spec).is_err());
    }
}
