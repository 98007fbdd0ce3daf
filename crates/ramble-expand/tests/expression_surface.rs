use std::cell::RefCell;

use ramble_core::RngHandle;
use ramble_expand::expr::{CompareOp, ALLOWED_FUNCTIONS};
use ramble_expand::{apply_format, parse_expression, EvalError, Evaluator, Expr, Value};

#[test]
fn evaluator_reports_recoverable_failures() {
    let evaluator = Evaluator::new();
    for text in ["hello world", "a = 1", "007", "1 +", "[1, 2", "é"] {
        let err = evaluator.evaluate(text).expect_err(text);
        assert!(matches!(err, EvalError::Parse(_)), "{text}: {err}");
        assert!(err.is_recoverable());
    }
    let err = evaluator.evaluate("eval('1')").expect_err("not allowed");
    assert!(matches!(err, EvalError::Unsupported(_)));
}

#[test]
fn values_render_like_python() {
    let evaluator = Evaluator::new();
    let render = |text: &str| evaluator.evaluate(text).expect(text).to_string();
    assert_eq!(render("1 == 1"), "True");
    assert_eq!(render("10 / 4"), "2.5");
    assert_eq!(render("6 / 3"), "2.0");
    assert_eq!(render("range(3)"), "[0, 1, 2]");
    assert_eq!(render("['a', 1]"), "['a', 1]");
    assert_eq!(render("None"), "None");
    assert_eq!(render("str(1) "), "1");
}

#[test]
fn rng_handle_drives_random_functions() {
    let rng = RefCell::new(RngHandle::from_seed(3));
    let evaluator = Evaluator::new().with_rng(&rng);
    let Value::Int(value) = evaluator.evaluate("randrange(10, 20, 2)").expect("randrange") else {
        panic!("expected int");
    };
    assert!((10..20).contains(&value) && value % 2 == 0);
}

#[test]
fn parsed_tree_is_inspectable() {
    let expr = parse_expression("x in ['a', 'b']").expect("parse");
    let Expr::Compare { ops, .. } = expr else {
        panic!("expected comparison");
    };
    assert_eq!(ops, vec![CompareOp::In]);
    assert!(ALLOWED_FUNCTIONS.contains(&"simplify_str"));
}

#[test]
fn format_specs_are_public() {
    assert_eq!(apply_format(&Value::Int(42), ">6").expect("format"), "    42");
    assert_eq!(apply_format(&Value::Float(0.5), "%").expect("format"), "50.000000%");
}
