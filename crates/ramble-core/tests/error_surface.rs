use ramble_core::errors::{ErrorInfo, RambleError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("namespace", "app.wl.exp")
        .with_context("reason", "example")
}

#[test]
fn passthrough_error_surface() {
    let err = RambleError::Passthrough(sample_info("unresolved-reference", "{missing}"));
    assert_eq!(err.code(), "unresolved-reference");
    assert!(err.info().context.contains_key("namespace"));
}

#[test]
fn chain_cycle_error_surface() {
    let err = RambleError::ChainCycle(sample_info("chain-cycle", "cycle detected"));
    assert_eq!(err.info().code, "chain-cycle");
    assert!(err.to_string().starts_with("chain cycle: cycle detected"));
}

#[test]
fn invalid_chain_error_surface() {
    let err = RambleError::InvalidChain(sample_info("chain-missing-command", "missing command"));
    assert_eq!(err.info().context["reason"], "example");
}

#[test]
fn lookup_error_surface() {
    let err = RambleError::Lookup(sample_info("unknown-experiment", "no experiment"));
    assert_eq!(err.code(), "unknown-experiment");
}

#[test]
fn display_includes_context_and_hint() {
    let err = RambleError::Syntax(
        ErrorInfo::new("predicate", "not a boolean")
            .with_context("text", "maybe")
            .with_hint("predicates must evaluate to True or False"),
    );
    let rendered = err.to_string();
    assert!(rendered.contains("text=maybe"));
    assert!(rendered.contains("hint: predicates must evaluate"));
}

#[test]
fn errors_serialize_with_family_tag() {
    let err = RambleError::Config(ErrorInfo::new("bad", "bad config"));
    let json = serde_json::to_value(&err).expect("serialize");
    assert_eq!(json["family"], "Config");
    let decoded: RambleError = serde_json::from_value(json).expect("deserialize");
    assert_eq!(decoded, err);
}
