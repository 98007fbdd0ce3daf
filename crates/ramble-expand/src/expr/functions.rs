use std::cell::RefCell;

use ramble_core::RngHandle;

use super::value::{Number, Value};
use super::EvalError;

/// Function names callable from expressions.
pub const ALLOWED_FUNCTIONS: &[&str] = &[
    "str",
    "int",
    "float",
    "max",
    "min",
    "ceil",
    "floor",
    "randint",
    "randrange",
    "simplify_str",
    "range",
    "replace",
];

/// Largest sequence `range` will materialise.
const MAX_RANGE_LEN: i64 = 1_000_000;

pub(crate) fn call_function(
    name: &str,
    args: &[Value],
    rng: Option<&RefCell<RngHandle>>,
) -> Result<Value, EvalError> {
    match name {
        "str" => {
            let [value] = expect_args::<1>(name, args)?;
            Ok(Value::Str(value.to_string()))
        }
        "int" => {
            let [value] = expect_args::<1>(name, args)?;
            to_int(value)
        }
        "float" => {
            let [value] = expect_args::<1>(name, args)?;
            to_float(value)
        }
        "max" => extremum(name, args, std::cmp::Ordering::Greater),
        "min" => extremum(name, args, std::cmp::Ordering::Less),
        "ceil" => {
            let [value] = expect_args::<1>(name, args)?;
            round_with(name, value, f64::ceil)
        }
        "floor" => {
            let [value] = expect_args::<1>(name, args)?;
            round_with(name, value, f64::floor)
        }
        "randint" => {
            let [low, high] = expect_args::<2>(name, args)?;
            let (low, high) = (int_arg(name, low)?, int_arg(name, high)?);
            if low > high {
                return Err(EvalError::Operand(format!(
                    "empty range for randint({low}, {high})"
                )));
            }
            Ok(Value::Int(draw(rng, low, high)))
        }
        "randrange" => {
            let (start, stop, step) = range_args(name, args)?;
            let len = range_len(start, stop, step);
            if len == 0 {
                return Err(EvalError::Operand(format!(
                    "empty range for randrange({start}, {stop}, {step})"
                )));
            }
            let idx = draw(rng, 0, len - 1);
            Ok(Value::Int(start.wrapping_add(idx.wrapping_mul(step))))
        }
        "simplify_str" => {
            let [value] = expect_args::<1>(name, args)?;
            Ok(Value::Str(simplify_str(&value.to_string())))
        }
        "range" => {
            let (start, stop, step) = range_args(name, args)?;
            let len = range_len(start, stop, step);
            if len > MAX_RANGE_LEN {
                return Err(EvalError::Operand(format!(
                    "range of {len} elements exceeds the limit of {MAX_RANGE_LEN}"
                )));
            }
            Ok(Value::List(
                (0..len)
                    .map(|idx| Value::Int(start.wrapping_add(idx.wrapping_mul(step))))
                    .collect(),
            ))
        }
        "replace" => {
            let [value, old, new] = expect_args::<3>(name, args)?;
            Ok(Value::Str(
                value.to_string().replace(&old.to_string(), &new.to_string()),
            ))
        }
        other => Err(EvalError::Unsupported(format!(
            "function '{other}' is not allowed"
        ))),
    }
}

/// Lowercases `text` and collapses every run of characters outside
/// `[a-z0-9_-]` into a single `-`, trimming dashes at both ends.
pub fn simplify_str(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_dash = false;
    for ch in text.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' || ch == '-' {
            if pending_dash {
                out.push('-');
                pending_dash = false;
            }
            out.push(ch);
        } else {
            pending_dash = true;
        }
    }
    if pending_dash {
        out.push('-');
    }
    out.trim_matches('-').to_string()
}

fn expect_args<'v, const N: usize>(
    name: &str,
    args: &'v [Value],
) -> Result<&'v [Value; N], EvalError> {
    args.try_into().map_err(|_| {
        EvalError::Operand(format!(
            "{name}() takes {N} argument(s), {} given",
            args.len()
        ))
    })
}

fn int_arg(name: &str, value: &Value) -> Result<i64, EvalError> {
    match value {
        Value::Bool(flag) => Ok(i64::from(*flag)),
        Value::Int(number) => Ok(*number),
        other => Err(EvalError::Operand(format!(
            "{name}() expects integer arguments, got {}",
            other.type_name()
        ))),
    }
}

fn float_to_int(value: f64) -> Result<i64, EvalError> {
    if !value.is_finite() || value.abs() >= 9.223_372_036_854_776e18 {
        return Err(EvalError::Operand(format!(
            "cannot convert {value} to an integer"
        )));
    }
    Ok(value as i64)
}

fn to_int(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Bool(flag) => Ok(Value::Int(i64::from(*flag))),
        Value::Int(number) => Ok(Value::Int(*number)),
        Value::Float(number) => float_to_int(number.trunc()).map(Value::Int),
        Value::Str(text) => text
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| EvalError::Operand(format!("invalid literal for int(): '{text}'"))),
        other => Err(EvalError::Operand(format!(
            "int() argument must be a string or a number, not {}",
            other.type_name()
        ))),
    }
}

fn to_float(value: &Value) -> Result<Value, EvalError> {
    if let Some(number) = value.as_number() {
        return Ok(Value::Float(number.as_f64()));
    }
    match value {
        Value::Str(text) => text
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| {
                EvalError::Operand(format!("could not convert string to float: '{text}'"))
            }),
        other => Err(EvalError::Operand(format!(
            "float() argument must be a string or a number, not {}",
            other.type_name()
        ))),
    }
}

fn round_with(name: &str, value: &Value, round: fn(f64) -> f64) -> Result<Value, EvalError> {
    match value.as_number() {
        Some(Number::Int(number)) => Ok(Value::Int(number)),
        Some(Number::Float(number)) => float_to_int(round(number)).map(Value::Int),
        None => Err(EvalError::Operand(format!(
            "{name}() expects a number, got {}",
            value.type_name()
        ))),
    }
}

fn extremum(
    name: &str,
    args: &[Value],
    wanted: std::cmp::Ordering,
) -> Result<Value, EvalError> {
    let items: &[Value] = match args {
        [Value::List(items)] => items,
        [_] | [] => {
            return Err(EvalError::Operand(format!(
                "{name}() expects a list or at least two arguments"
            )))
        }
        _ => args,
    };
    let Some(first) = items.first() else {
        return Err(EvalError::Operand(format!("{name}() arg is an empty sequence")));
    };

    let mut best = first;
    for item in &items[1..] {
        let ordering = match (item, best) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => match (item.as_number(), best.as_number()) {
                (Some(Number::Int(a)), Some(Number::Int(b))) => Some(a.cmp(&b)),
                (Some(a), Some(b)) => a.as_f64().partial_cmp(&b.as_f64()),
                _ => {
                    return Err(EvalError::Operand(format!(
                        "{name}() cannot compare {} and {}",
                        item.type_name(),
                        best.type_name()
                    )))
                }
            },
        };
        if ordering == Some(wanted) {
            best = item;
        }
    }
    Ok(best.clone())
}

fn range_args(name: &str, args: &[Value]) -> Result<(i64, i64, i64), EvalError> {
    let (start, stop, step) = match args {
        [stop] => (0, int_arg(name, stop)?, 1),
        [start, stop] => (int_arg(name, start)?, int_arg(name, stop)?, 1),
        [start, stop, step] => (
            int_arg(name, start)?,
            int_arg(name, stop)?,
            int_arg(name, step)?,
        ),
        _ => {
            return Err(EvalError::Operand(format!(
                "{name}() takes 1 to 3 arguments, {} given",
                args.len()
            )))
        }
    };
    if step == 0 {
        return Err(EvalError::Operand(format!("{name}() step must not be zero")));
    }
    Ok((start, stop, step))
}

fn range_len(start: i64, stop: i64, step: i64) -> i64 {
    let (span, step) = if step > 0 {
        (i128::from(stop) - i128::from(start), i128::from(step))
    } else {
        (i128::from(start) - i128::from(stop), -i128::from(step))
    };
    if span <= 0 {
        return 0;
    }
    i64::try_from((span + step - 1) / step).unwrap_or(i64::MAX)
}

fn draw(rng: Option<&RefCell<RngHandle>>, low: i64, high: i64) -> i64 {
    match rng {
        Some(cell) => cell.borrow_mut().int_inclusive(low, high),
        None => RngHandle::from_seed(0).int_inclusive(low, high),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Value>) -> Result<Value, EvalError> {
        call_function(name, &args, None)
    }

    #[test]
    fn conversions() {
        assert_eq!(call("int", vec![Value::Str(" 42 ".into())]), Ok(Value::Int(42)));
        assert_eq!(call("int", vec![Value::Float(-2.7)]), Ok(Value::Int(-2)));
        assert_eq!(call("float", vec![Value::Int(3)]), Ok(Value::Float(3.0)));
        assert_eq!(call("str", vec![Value::Float(2.0)]), Ok(Value::Str("2.0".into())));
        assert!(call("int", vec![Value::Str("abc".into())]).is_err());
    }

    #[test]
    fn extremes_keep_the_winning_value() {
        assert_eq!(call("max", vec![Value::Int(1), Value::Float(2.5)]), Ok(Value::Float(2.5)));
        assert_eq!(
            call("min", vec![Value::List(vec![Value::Int(4), Value::Int(-1)])]),
            Ok(Value::Int(-1))
        );
        assert!(call("max", vec![Value::List(vec![])]).is_err());
    }

    #[test]
    fn rounding_returns_integers() {
        assert_eq!(call("ceil", vec![Value::Float(2.1)]), Ok(Value::Int(3)));
        assert_eq!(call("floor", vec![Value::Float(-2.1)]), Ok(Value::Int(-3)));
    }

    #[test]
    fn ranges_materialise() {
        assert_eq!(
            call("range", vec![Value::Int(1), Value::Int(7), Value::Int(3)]),
            Ok(Value::List(vec![Value::Int(1), Value::Int(4)]))
        );
        assert_eq!(
            call("range", vec![Value::Int(3), Value::Int(0), Value::Int(-1)]),
            Ok(Value::List(vec![Value::Int(3), Value::Int(2), Value::Int(1)]))
        );
        assert!(call("range", vec![Value::Int(i64::MAX)]).is_err());
        assert!(call("range", vec![Value::Int(1), Value::Int(2), Value::Int(0)]).is_err());
    }

    #[test]
    fn random_draws_stay_in_bounds_and_are_reproducible() {
        let first = RefCell::new(RngHandle::from_seed(7));
        let second = RefCell::new(RngHandle::from_seed(7));
        for _ in 0..32 {
            let a = call_function("randint", &[Value::Int(1), Value::Int(6)], Some(&first))
                .expect("randint");
            let b = call_function("randint", &[Value::Int(1), Value::Int(6)], Some(&second))
                .expect("randint");
            assert_eq!(a, b);
            let Value::Int(n) = a else { panic!("int") };
            assert!((1..=6).contains(&n));
        }
        let Value::Int(n) = call("randrange", vec![Value::Int(0), Value::Int(10), Value::Int(5)])
            .expect("randrange")
        else {
            panic!("int");
        };
        assert!(n == 0 || n == 5);
        assert!(call("randint", vec![Value::Int(3), Value::Int(1)]).is_err());
    }

    #[test]
    fn simplify_and_replace() {
        assert_eq!(simplify_str("Hello, World!"), "hello-world");
        assert_eq!(simplify_str("--gcc@12.1.0--"), "gcc-12-1-0");
        assert_eq!(simplify_str("a_b"), "a_b");
        assert_eq!(
            call(
                "replace",
                vec![Value::Str("a-b-c".into()), Value::Str("-".into()), Value::Str("_".into())]
            ),
            Ok(Value::Str("a_b_c".into()))
        );
    }

    #[test]
    fn other_names_are_unsupported() {
        assert!(matches!(call("open", vec![]), Err(EvalError::Unsupported(_))));
    }
}
