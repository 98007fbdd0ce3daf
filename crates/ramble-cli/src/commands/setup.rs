use std::error::Error;
use std::path::{Path, PathBuf};

use clap::Args;
use ramble_exp::{SetManifest, Workspace};
use tracing::info;

use super::parse_var_assignments;

#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Workspace YAML file.
    #[arg(long)]
    pub workspace: PathBuf,
    /// Workspace root directory; defaults to the directory of the file.
    #[arg(long)]
    pub root: Option<PathBuf>,
    /// Highest-precedence variable override as KEY=VALUE; repeat for more.
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,
    /// Directory receiving manifest.json; prints to stdout when omitted.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn run(args: &SetupArgs) -> Result<(), Box<dyn Error>> {
    let manifest = build_manifest(args)?;
    match &args.out {
        Some(dir) => {
            let path = manifest.write(dir)?;
            println!("{}", path.display());
        }
        None => println!("{}", String::from_utf8(manifest.to_json_bytes()?)?),
    }
    Ok(())
}

pub fn build_manifest(args: &SetupArgs) -> Result<SetManifest, Box<dyn Error>> {
    let workspace = Workspace::load(&args.workspace)?;
    let root = args.root.clone().unwrap_or_else(|| {
        args.workspace
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });
    let set = workspace.assemble(&root.to_string_lossy(), parse_var_assignments(&args.vars)?)?;
    let manifest = set.manifest()?;
    info!(
        experiments = manifest.experiments.len(),
        set_hash = %manifest.set_hash,
        "assembled workspace"
    );
    Ok(manifest)
}
