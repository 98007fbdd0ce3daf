use std::cell::RefCell;
use std::cmp::Ordering;

use ramble_core::{ErrorInfo, ExperimentLookup, RambleError, RngHandle};

use super::ast::{BinOp, BoolOp, CompareOp, Expr, UnaryOp};
use super::functions::call_function;
use super::parser::parse_expression;
use super::value::{Number, Value};
use super::EvalError;

/// Tree-walking evaluator for parsed expressions.
///
/// The evaluator is cheap to build per call: it only borrows the optional
/// cross-experiment lookup and random stream of its caller.
#[derive(Clone, Copy, Default)]
pub struct Evaluator<'a> {
    lookup: Option<&'a dyn ExperimentLookup>,
    rng: Option<&'a RefCell<RngHandle>>,
    depth: usize,
}

impl std::fmt::Debug for Evaluator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("lookup", &self.lookup.is_some())
            .field("rng", &self.rng.is_some())
            .field("depth", &self.depth)
            .finish()
    }
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator without lookup or random stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `<name> in <namespace>` through `lookup`.
    pub fn with_lookup(mut self, lookup: &'a dyn ExperimentLookup) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Draws `randint`/`randrange` values from `rng`.
    pub fn with_rng(mut self, rng: &'a RefCell<RngHandle>) -> Self {
        self.rng = Some(rng);
        self
    }

    /// Sets the expansion depth forwarded to cross-experiment lookups.
    pub fn at_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Parses and evaluates `text`.
    pub fn evaluate(&self, text: &str) -> Result<Value, EvalError> {
        let expr = parse_expression(text)?;
        self.eval(&expr)
    }

    /// Evaluates an already parsed expression.
    pub fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Name(name) => Ok(Value::Str(name.clone())),
            Expr::Attribute(path) => Ok(Value::Str(path.join("."))),
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Expr::UnaryOp { op, operand } => {
                let value = self.eval(operand)?;
                eval_unary(*op, &value)
            }
            Expr::BinOp { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                eval_binary(*op, &left, &right)
            }
            Expr::BoolOp { op, values } => self.eval_bool(*op, values),
            Expr::Compare {
                left,
                ops,
                comparators,
            } => self.eval_compare(left, ops, comparators),
            Expr::Call { func, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                call_function(func, &args, self.rng)
            }
        }
    }

    fn eval_bool(&self, op: BoolOp, values: &[Expr]) -> Result<Value, EvalError> {
        let mut iter = values.iter();
        let Some(first) = iter.next() else {
            return Err(EvalError::Parse("empty boolean expression".to_string()));
        };
        let mut acc = self.eval(first)?;
        for expr in iter {
            let next = self.eval(expr)?;
            acc = match (&acc, &next) {
                (Value::Bool(a), Value::Bool(b)) => Value::Bool(match op {
                    BoolOp::And => *a && *b,
                    BoolOp::Or => *a || *b,
                }),
                _ => match (as_integer(&acc), as_integer(&next)) {
                    (Some(a), Some(b)) => Value::Int(match op {
                        BoolOp::And => a & b,
                        BoolOp::Or => a | b,
                    }),
                    _ => {
                        return Err(EvalError::Operand(format!(
                            "unsupported operand types for {op:?}: {} and {}",
                            acc.type_name(),
                            next.type_name()
                        )))
                    }
                },
            };
        }
        Ok(acc)
    }

    fn eval_compare(
        &self,
        left: &Expr,
        ops: &[CompareOp],
        comparators: &[Expr],
    ) -> Result<Value, EvalError> {
        if let ([CompareOp::In], [right]) = (ops, comparators) {
            if let (Expr::Name(variable), Expr::Attribute(path)) = (left, right) {
                return self.lookup_variable(variable, &path.join("."));
            }
        }

        let mut current = self.eval(left)?;
        for (op, comparator) in ops.iter().zip(comparators) {
            let right = self.eval(comparator)?;
            if !compare(*op, &current, &right)? {
                return Ok(Value::Bool(false));
            }
            current = right;
        }
        Ok(Value::Bool(true))
    }

    fn lookup_variable(&self, variable: &str, namespace: &str) -> Result<Value, EvalError> {
        let found = match self.lookup {
            Some(lookup) => lookup.variable_in(namespace, variable, self.depth)?,
            None => None,
        };
        found.map(Value::Str).ok_or_else(|| {
            EvalError::Fatal(RambleError::Lookup(
                ErrorInfo::new(
                    "lookup.unknown_experiment",
                    format!(
                        "unable to find variable '{variable}': experiment '{namespace}' does not exist"
                    ),
                )
                .with_context("variable", variable)
                .with_context("namespace", namespace),
            ))
        })
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Bool(flag) => Some(i64::from(*flag)),
        Value::Int(number) => Some(*number),
        _ => None,
    }
}

fn operand_error(op: impl std::fmt::Debug, left: &Value, right: &Value) -> EvalError {
    EvalError::Operand(format!(
        "unsupported operand types for {op:?}: {} and {}",
        left.type_name(),
        right.type_name()
    ))
}

fn overflow(op: BinOp) -> EvalError {
    EvalError::Operand(format!("integer overflow in {op:?}"))
}

fn eval_unary(op: UnaryOp, value: &Value) -> Result<Value, EvalError> {
    match (op, value.as_number()) {
        (UnaryOp::Neg, Some(Number::Int(number))) => number
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| EvalError::Operand("integer overflow in negation".to_string())),
        (UnaryOp::Neg, Some(Number::Float(number))) => Ok(Value::Float(-number)),
        (UnaryOp::Neg, None) => Err(EvalError::Operand(format!(
            "bad operand type for unary -: {}",
            value.type_name()
        ))),
    }
}

pub(crate) fn eval_binary(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
        return Err(operand_error(op, left, right));
    };

    match (op, a, b) {
        (BinOp::Div, _, _) => {
            let divisor = b.as_f64();
            if divisor == 0.0 {
                return Err(EvalError::Operand("division by zero".to_string()));
            }
            Ok(Value::Float(a.as_f64() / divisor))
        }
        (BinOp::Add, Number::Int(x), Number::Int(y)) => {
            x.checked_add(y).map(Value::Int).ok_or_else(|| overflow(op))
        }
        (BinOp::Sub, Number::Int(x), Number::Int(y)) => {
            x.checked_sub(y).map(Value::Int).ok_or_else(|| overflow(op))
        }
        (BinOp::Mul, Number::Int(x), Number::Int(y)) => {
            x.checked_mul(y).map(Value::Int).ok_or_else(|| overflow(op))
        }
        (BinOp::Mod, Number::Int(x), Number::Int(y)) => {
            if y == 0 {
                return Err(EvalError::Operand("modulo by zero".to_string()));
            }
            let rem = x.checked_rem(y).ok_or_else(|| overflow(op))?;
            Ok(Value::Int(if rem != 0 && (rem < 0) != (y < 0) {
                rem + y
            } else {
                rem
            }))
        }
        (BinOp::Pow, Number::Int(x), Number::Int(y)) => {
            if y < 0 {
                return float_pow(x as f64, y as f64);
            }
            let exp = u32::try_from(y).map_err(|_| overflow(op))?;
            x.checked_pow(exp).map(Value::Int).ok_or_else(|| overflow(op))
        }
        (BinOp::Add, _, _) => Ok(Value::Float(a.as_f64() + b.as_f64())),
        (BinOp::Sub, _, _) => Ok(Value::Float(a.as_f64() - b.as_f64())),
        (BinOp::Mul, _, _) => Ok(Value::Float(a.as_f64() * b.as_f64())),
        (BinOp::Mod, _, _) => {
            let (x, y) = (a.as_f64(), b.as_f64());
            if y == 0.0 {
                return Err(EvalError::Operand("modulo by zero".to_string()));
            }
            let rem = x % y;
            Ok(Value::Float(if rem != 0.0 && (rem < 0.0) != (y < 0.0) {
                rem + y
            } else {
                rem
            }))
        }
        (BinOp::Pow, _, _) => float_pow(a.as_f64(), b.as_f64()),
    }
}

fn float_pow(base: f64, exp: f64) -> Result<Value, EvalError> {
    if base == 0.0 && exp < 0.0 {
        return Err(EvalError::Operand(
            "zero cannot be raised to a negative power".to_string(),
        ));
    }
    let result = base.powf(exp);
    if result.is_nan() && !base.is_nan() && !exp.is_nan() {
        return Err(EvalError::Operand(format!(
            "{base} ** {exp} has no real result"
        )));
    }
    if result.is_infinite() && base.is_finite() && exp.is_finite() {
        return Err(EvalError::Operand(format!("{base} ** {exp} overflows")));
    }
    Ok(Value::Float(result))
}

fn loosely_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::None, Value::None) => true,
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loosely_equal(x, y))
        }
        _ => match (left.as_number(), right.as_number()) {
            (Some(Number::Int(x)), Some(Number::Int(y))) => x == y,
            (Some(x), Some(y)) => x.as_f64() == y.as_f64(),
            _ => false,
        },
    }
}

fn ordering(op: CompareOp, left: &Value, right: &Value) -> Result<Option<Ordering>, EvalError> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        _ => match (left.as_number(), right.as_number()) {
            (Some(Number::Int(x)), Some(Number::Int(y))) => Ok(Some(x.cmp(&y))),
            (Some(x), Some(y)) => Ok(x.as_f64().partial_cmp(&y.as_f64())),
            _ => Err(operand_error(op, left, right)),
        },
    }
}

pub(crate) fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
    let mixed_str = matches!(left, Value::Str(_)) != matches!(right, Value::Str(_));
    match op {
        CompareOp::In => match (left, right) {
            (_, Value::List(items)) => Ok(items.iter().any(|item| loosely_equal(left, item))),
            (Value::Str(needle), Value::Str(haystack)) => Ok(haystack.contains(needle.as_str())),
            _ => Err(operand_error(op, left, right)),
        },
        _ if mixed_str => Err(operand_error(op, left, right)),
        CompareOp::Eq => Ok(loosely_equal(left, right)),
        CompareOp::NotEq => Ok(!loosely_equal(left, right)),
        CompareOp::Lt => Ok(ordering(op, left, right)? == Some(Ordering::Less)),
        CompareOp::LtE => Ok(matches!(
            ordering(op, left, right)?,
            Some(Ordering::Less | Ordering::Equal)
        )),
        CompareOp::Gt => Ok(ordering(op, left, right)? == Some(Ordering::Greater)),
        CompareOp::GtE => Ok(matches!(
            ordering(op, left, right)?,
            Some(Ordering::Greater | Ordering::Equal)
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(text: &str) -> Value {
        Evaluator::new().evaluate(text).expect("evaluate")
    }

    #[test]
    fn arithmetic_follows_python_semantics() {
        assert_eq!(eval("1 + 2"), Value::Int(3));
        assert_eq!(eval("7 / 2"), Value::Float(3.5));
        assert_eq!(eval("4 / 2"), Value::Float(2.0));
        assert_eq!(eval("-7 % 3"), Value::Int(2));
        assert_eq!(eval("7 % -3"), Value::Int(-2));
        assert_eq!(eval("2 ** 10"), Value::Int(1024));
        assert_eq!(eval("2 ^ 3"), Value::Int(8));
        assert_eq!(eval("2 ** -1"), Value::Float(0.5));
        assert_eq!(eval("True + 1"), Value::Int(2));
    }

    #[test]
    fn names_and_attributes_evaluate_to_text() {
        assert_eq!(eval("foo"), Value::Str("foo".into()));
        assert_eq!(eval("a.b.c"), Value::Str("a.b.c".into()));
    }

    #[test]
    fn comparisons_chain() {
        assert_eq!(eval("1 < 2 < 3"), Value::Bool(true));
        assert_eq!(eval("3 > 2 > 2"), Value::Bool(false));
        assert_eq!(eval("1 == 1.0"), Value::Bool(true));
        assert_eq!(eval("'a' != 'b'"), Value::Bool(true));
        assert_eq!(eval("fast == fast"), Value::Bool(true));
    }

    #[test]
    fn boolean_operators_are_bitwise() {
        assert_eq!(eval("True and False"), Value::Bool(false));
        assert_eq!(eval("1 < 2 or 3 < 2"), Value::Bool(true));
        assert_eq!(eval("6 and 3"), Value::Int(2));
    }

    #[test]
    fn list_membership() {
        assert_eq!(eval("2 in [1, 2, 3]"), Value::Bool(true));
        assert_eq!(eval("'x' in ['a', 'b']"), Value::Bool(false));
    }

    #[test]
    fn operand_mismatches_are_recoverable() {
        for text in ["a - b", "1 + 'x'", "'a' < 1", "1 / 0", "5 % 0", "9223372036854775807 + 1"] {
            let err = Evaluator::new().evaluate(text).expect_err(text);
            assert!(err.is_recoverable(), "{text}: {err}");
            assert!(matches!(err, EvalError::Operand(_)), "{text}: {err}");
        }
    }

    #[test]
    fn unknown_functions_are_rejected() {
        assert!(matches!(
            Evaluator::new().evaluate("exec('x')"),
            Err(EvalError::Unsupported(_))
        ));
    }

    #[test]
    fn namespace_lookup_without_registry_is_fatal() {
        let err = Evaluator::new()
            .evaluate("v in app.wl.exp")
            .expect_err("missing experiment");
        let EvalError::Fatal(RambleError::Lookup(info)) = err else {
            panic!("expected lookup error");
        };
        assert_eq!(info.context.get("namespace").map(String::as_str), Some("app.wl.exp"));
        assert_eq!(info.context.get("variable").map(String::as_str), Some("v"));
    }
}
