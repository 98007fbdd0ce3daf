use std::fs;

use ramble_core::variable_env;
use ramble_exp::{from_json_slice, SetManifest, Workspace, MANIFEST_FILE};

const WORKSPACE: &str = r#"
ramble:
  config:
    name: bench
    seed: 7
  variables:
    processes_per_node: 2
  applications:
    hpl:
      variables:
        command: "xhpl -n {n_ranks}"
      workloads:
        standard:
          experiments:
            "scale_{n_nodes}":
              variables:
                n_nodes: [1, 2]
            setup:
              template: true
              variables:
                stage: init
            main:
              variables:
                n_nodes: 1
              chained_experiments:
                - name: hpl.standard.setup
                  order: before_root
                  command: "prep {stage}"
                  variables:
                    stage: warm
"#;

#[test]
fn workspace_file_assembles_experiments_and_chains() {
    let ws = Workspace::from_yaml_str(WORKSPACE).expect("parse");
    let set = ws.assemble("/ws", Default::default()).expect("assemble");

    let scale_2 = set.get("hpl.standard.scale_2").expect("scale_2");
    assert_eq!(scale_2.command(), Some("xhpl -n 4"));
    assert_eq!(
        scale_2.expander().expand_var("{workspace_name}").expect("name"),
        "bench"
    );

    let main = set.get("hpl.standard.main").expect("main");
    assert_eq!(
        main.chain_order(),
        vec![
            "hpl.standard.main.chain.0.hpl.standard.setup".to_string(),
            "hpl.standard.main".to_string(),
        ]
    );
    let setup_copy = set
        .get("hpl.standard.main.chain.0.hpl.standard.setup")
        .expect("chained setup");
    assert_eq!(setup_copy.command(), Some("prep warm"));
    assert!(set.get("hpl.standard.setup").expect("template").is_template());
}

#[test]
fn required_overrides_take_precedence() {
    let ws = Workspace::from_yaml_str(WORKSPACE).expect("parse");
    let set = ws
        .assemble("/ws", variable_env([("processes_per_node", 4_i64)]))
        .expect("assemble");
    assert_eq!(
        set.get("hpl.standard.scale_2").expect("scale_2").command(),
        Some("xhpl -n 8")
    );
}

#[test]
fn manifest_is_written_and_hash_is_reproducible() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ramble.yaml");
    fs::write(&path, WORKSPACE).expect("write workspace");

    let root = dir.path().to_string_lossy().to_string();
    let first = Workspace::load(&path)
        .expect("load")
        .assemble(&root, Default::default())
        .expect("assemble")
        .manifest()
        .expect("manifest");
    let second = Workspace::load(&path)
        .expect("load")
        .assemble(&root, Default::default())
        .expect("assemble")
        .manifest()
        .expect("manifest");
    assert_eq!(first.set_hash, second.set_hash);
    assert_eq!(first.experiments.len(), 5);

    let written = first.write(&dir.path().join("out")).expect("write manifest");
    assert!(written.ends_with(MANIFEST_FILE));
    let decoded: SetManifest = from_json_slice(&fs::read(written).expect("read")).expect("decode");
    assert_eq!(decoded, first);

    let scale_1 = decoded
        .experiments
        .iter()
        .find(|entry| entry.namespace == "hpl.standard.scale_1")
        .expect("scale_1 entry");
    assert_eq!(scale_1.run_dir, format!("{root}/experiments/hpl/standard/scale_1"));
    assert!(scale_1.used_variables.contains(&"n_ranks".to_string()));
}

#[test]
fn malformed_yaml_is_a_serde_error() {
    let err = Workspace::from_yaml_str("ramble: [not, a, mapping]").expect_err("bad yaml");
    assert!(err.code().starts_with("serde."));
}
