//! Variable values and environments.

use std::fmt::{self, Display};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered mapping from variable name to value. Declaration order is kept so
/// rendered manifests list variables the way users wrote them.
pub type VariableEnv = IndexMap<String, VarValue>;

/// Value bound to a variable name.
///
/// Scalars and strings are template material for the expander; lists are the
/// vector declarations consumed by the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    /// Boolean scalar, rendered as `True` / `False`.
    Bool(bool),
    /// Integer scalar.
    Int(i64),
    /// Floating point scalar.
    Float(f64),
    /// Resolved string or unresolved template.
    Str(String),
    /// Vector of values.
    List(Vec<VarValue>),
}

impl VarValue {
    /// Returns the template text the expander operates on.
    pub fn to_template(&self) -> String {
        match self {
            VarValue::Bool(true) => "True".to_string(),
            VarValue::Bool(false) => "False".to_string(),
            VarValue::Int(value) => value.to_string(),
            VarValue::Float(value) => format_float(*value),
            VarValue::Str(value) => value.clone(),
            VarValue::List(items) => {
                let rendered: Vec<String> = items.iter().map(VarValue::repr).collect();
                format!("[{}]", rendered.join(", "))
            }
        }
    }

    fn repr(&self) -> String {
        match self {
            VarValue::Str(value) => format!("'{value}'"),
            other => other.to_template(),
        }
    }

    /// Returns the elements when the value is a vector.
    pub fn as_list(&self) -> Option<&[VarValue]> {
        match self {
            VarValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns true for vector values.
    pub fn is_list(&self) -> bool {
        matches!(self, VarValue::List(_))
    }
}

impl Display for VarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_template())
    }
}

impl From<&str> for VarValue {
    fn from(value: &str) -> Self {
        VarValue::Str(value.to_string())
    }
}

impl From<String> for VarValue {
    fn from(value: String) -> Self {
        VarValue::Str(value)
    }
}

impl From<i64> for VarValue {
    fn from(value: i64) -> Self {
        VarValue::Int(value)
    }
}

impl From<f64> for VarValue {
    fn from(value: f64) -> Self {
        VarValue::Float(value)
    }
}

impl From<bool> for VarValue {
    fn from(value: bool) -> Self {
        VarValue::Bool(value)
    }
}

impl<T: Into<VarValue>> From<Vec<T>> for VarValue {
    fn from(values: Vec<T>) -> Self {
        VarValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Builds a [`VariableEnv`] from `(name, value)` pairs.
pub fn variable_env<K, V, I>(pairs: I) -> VariableEnv
where
    K: Into<String>,
    V: Into<VarValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

/// Formats a float the way users see it in rendered templates: integral
/// values keep a trailing `.0`, very large or very small magnitudes switch to
/// exponent notation with a signed two digit exponent.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let raw = format!("{value:e}");
        let (mantissa, exponent) = raw.split_once('e').unwrap_or((raw.as_str(), "0"));
        let exponent: i32 = exponent.parse().unwrap_or(0);
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exponent.abs());
    }
    if value.fract() == 0.0 {
        return format!("{value:.1}");
    }
    format!("{value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_render_like_user_facing_numbers() {
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(0.5), "0.5");
        assert_eq!(format_float(1e16), "1e+16");
        assert_eq!(format_float(1.5e-5), "1.5e-05");
        assert_eq!(format_float(-3.25), "-3.25");
    }

    #[test]
    fn lists_render_with_quoted_strings() {
        let value = VarValue::List(vec![VarValue::Int(1), VarValue::from("a")]);
        assert_eq!(value.to_template(), "[1, 'a']");
    }

    #[test]
    fn booleans_render_capitalised() {
        assert_eq!(VarValue::Bool(true).to_template(), "True");
        assert_eq!(VarValue::Bool(false).to_string(), "False");
    }
}
