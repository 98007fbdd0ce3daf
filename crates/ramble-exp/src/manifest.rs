use std::fs;
use std::path::{Path, PathBuf};

use ramble_core::{ErrorInfo, ExperimentLookup, RambleError};
use serde::{Deserialize, Serialize};

use crate::hash::stable_hash_string;
use crate::registry::Registry;
use crate::serde::to_canonical_json_bytes;

/// File name written by [`SetManifest::write`].
pub const MANIFEST_FILE: &str = "manifest.json";

/// Summary of one registered experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Registry key.
    pub namespace: String,
    /// Application name.
    pub application: String,
    /// Workload name.
    pub workload: String,
    /// Experiment name.
    pub experiment: String,
    /// Expanded run directory.
    pub run_dir: String,
    /// Resolved command, if one was declared.
    #[serde(default)]
    pub command: Option<String>,
    /// Execution order of the experiment's chain group.
    pub chain_order: Vec<String>,
    /// Created by the chain builder.
    #[serde(default)]
    pub chained: bool,
    /// Template experiment, never run on its own.
    #[serde(default)]
    pub template: bool,
    /// Repeat number of a repeated copy.
    #[serde(default)]
    pub repeat_index: Option<usize>,
    /// Declared variables used by this experiment.
    #[serde(default)]
    pub used_variables: Vec<String>,
}

/// Canonical description of an assembled experiment set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetManifest {
    /// SHA-256 of the canonical JSON of `experiments`.
    pub set_hash: String,
    /// One entry per registered experiment, in registration order.
    pub experiments: Vec<ManifestEntry>,
}

fn io_error(code: &str, path: &Path, err: std::io::Error) -> RambleError {
    RambleError::Serde(
        ErrorInfo::new(code, "failed to write manifest")
            .with_context("path", path.display().to_string())
            .with_hint(err.to_string()),
    )
}

impl SetManifest {
    /// Builds the manifest of every experiment in `registry`.
    pub fn from_registry(registry: &Registry) -> Result<Self, RambleError> {
        let lookup: &dyn ExperimentLookup = registry;
        let experiments = registry
            .iter()
            .map(|experiment| {
                let usage = experiment.variable_usage(Some(lookup))?;
                let identity = experiment.identity();
                Ok(ManifestEntry {
                    namespace: experiment.namespace().to_string(),
                    application: identity.application.clone(),
                    workload: identity.workload.clone(),
                    experiment: identity.experiment.clone(),
                    run_dir: experiment.run_dir(Some(lookup))?,
                    command: experiment.command().map(str::to_string),
                    chain_order: experiment.chain_order(),
                    chained: experiment.is_chained(),
                    template: experiment.is_template(),
                    repeat_index: experiment.repeat_index(),
                    used_variables: usage.used.into_iter().collect(),
                })
            })
            .collect::<Result<Vec<_>, RambleError>>()?;
        let set_hash = stable_hash_string(&experiments)?;
        Ok(Self {
            set_hash,
            experiments,
        })
    }

    /// Canonical JSON encoding.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, RambleError> {
        to_canonical_json_bytes(self)
    }

    /// Writes `manifest.json` into `dir`, creating it when needed.
    pub fn write(&self, dir: &Path) -> Result<PathBuf, RambleError> {
        fs::create_dir_all(dir).map_err(|err| io_error("manifest.create_dir", dir, err))?;
        let path = dir.join(MANIFEST_FILE);
        fs::write(&path, self.to_json_bytes()?)
            .map_err(|err| io_error("manifest.write", &path, err))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serde::from_json_slice;

    #[test]
    fn empty_registry_has_a_stable_hash() {
        let first = SetManifest::from_registry(&Registry::new()).expect("manifest");
        let second = SetManifest::from_registry(&Registry::new()).expect("manifest");
        assert_eq!(first.set_hash, second.set_hash);
        assert_eq!(first.set_hash.len(), 64);
    }

    #[test]
    fn written_manifest_reads_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manifest = SetManifest::from_registry(&Registry::new()).expect("manifest");
        let path = manifest.write(&dir.path().join("out")).expect("write");
        let bytes = fs::read(path).expect("read");
        let decoded: SetManifest = from_json_slice(&bytes).expect("decode");
        assert_eq!(decoded, manifest);
    }
}
