pub mod expand;
pub mod setup;

use std::error::Error;

use ramble_core::{VarValue, VariableEnv};

/// Parses repeated `--var key=value` flags. Values are read as YAML scalars or
/// lists, so `4` is an integer and `[1, 2]` a vector; anything else is kept as
/// text.
pub fn parse_var_assignments(pairs: &[String]) -> Result<VariableEnv, Box<dyn Error>> {
    let mut env = VariableEnv::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            return Err(format!("expected KEY=VALUE, got '{pair}'").into());
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("empty variable name in '{pair}'").into());
        }
        let value = serde_yaml::from_str::<VarValue>(raw)
            .unwrap_or_else(|_| VarValue::Str(raw.to_string()));
        env.insert(key.to_string(), value);
    }
    Ok(env)
}
