use std::error::Error;

use clap::Args;
use ramble_expand::{ExpandOptions, Expander, ExpansionConfig};

use super::parse_var_assignments;

#[derive(Args, Debug)]
pub struct ExpandArgs {
    /// Template to expand.
    #[arg(long)]
    pub template: String,
    /// Variable definition as KEY=VALUE; repeat for more.
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,
    /// Fail on references that cannot be resolved.
    #[arg(long)]
    pub strict: bool,
    /// Require the template to evaluate to True or False.
    #[arg(long)]
    pub predicate: bool,
    /// Master seed for randint and randrange.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

pub fn run(args: &ExpandArgs) -> Result<(), Box<dyn Error>> {
    println!("{}", render(args)?);
    Ok(())
}

pub fn render(args: &ExpandArgs) -> Result<String, Box<dyn Error>> {
    let config = ExpansionConfig {
        disable_passthrough: args.strict,
        seed: args.seed,
        ..ExpansionConfig::default()
    };
    let expander = Expander::with_config(parse_var_assignments(&args.vars)?, config);
    let opts = ExpandOptions::default();
    if args.predicate {
        let value = expander.evaluate_predicate(&args.template, &opts)?;
        return Ok(if value { "True" } else { "False" }.to_string());
    }
    Ok(expander.expand_var_with(&args.template, &opts)?)
}
