//! Format-spec application for `{name:spec}` references.
//!
//! Supports the standard mini-language
//! `[[fill]align][sign][#][0][width][grouping][.precision][type]` over
//! expression values. Incompatible specs are reported as [`FormatError`]; the
//! expander then keeps the value and appends the raw spec.

use ramble_core::format_float;
use thiserror::Error;

use crate::expr::Value;

/// A format spec that cannot be parsed or applied to the value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot apply format spec '{spec}': {reason}")]
pub struct FormatError {
    spec: String,
    reason: String,
}

impl FormatError {
    fn new(spec: &str, reason: impl Into<String>) -> Self {
        Self {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
    AfterSign,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<Align>,
    sign: Option<char>,
    alternate: bool,
    zero: bool,
    width: usize,
    grouping: Option<char>,
    precision: Option<usize>,
    kind: Option<char>,
}

fn align_of(ch: char) -> Option<Align> {
    match ch {
        '<' => Some(Align::Left),
        '>' => Some(Align::Right),
        '^' => Some(Align::Center),
        '=' => Some(Align::AfterSign),
        _ => None,
    }
}

fn parse_spec(spec: &str) -> Result<FormatSpec, FormatError> {
    let chars: Vec<char> = spec.chars().collect();
    let mut parsed = FormatSpec::default();
    let mut i = 0;

    if chars.len() >= 2 && align_of(chars[1]).is_some() {
        parsed.fill = Some(chars[0]);
        parsed.align = align_of(chars[1]);
        i = 2;
    } else if let Some(align) = chars.first().copied().and_then(align_of) {
        parsed.align = Some(align);
        i = 1;
    }
    if let Some(&sign @ ('+' | '-' | ' ')) = chars.get(i) {
        parsed.sign = Some(sign);
        i += 1;
    }
    if chars.get(i) == Some(&'#') {
        parsed.alternate = true;
        i += 1;
    }
    if chars.get(i) == Some(&'0') {
        parsed.zero = true;
        i += 1;
    }
    let width_start = i;
    while chars.get(i).is_some_and(char::is_ascii_digit) {
        i += 1;
    }
    if i > width_start {
        parsed.width = digits(spec, &chars[width_start..i])?;
    }
    if let Some(&group @ (',' | '_')) = chars.get(i) {
        parsed.grouping = Some(group);
        i += 1;
    }
    if chars.get(i) == Some(&'.') {
        i += 1;
        let start = i;
        while chars.get(i).is_some_and(char::is_ascii_digit) {
            i += 1;
        }
        if i == start {
            return Err(FormatError::new(spec, "format specifier missing precision"));
        }
        parsed.precision = Some(digits(spec, &chars[start..i])?);
    }
    if let Some(&kind) = chars.get(i) {
        if !"bcdeEfFgGnosxX%".contains(kind) {
            return Err(FormatError::new(spec, format!("unknown format code '{kind}'")));
        }
        parsed.kind = Some(kind);
        i += 1;
    }
    if i != chars.len() {
        return Err(FormatError::new(spec, "invalid format specifier"));
    }
    Ok(parsed)
}

fn digits(spec: &str, chars: &[char]) -> Result<usize, FormatError> {
    chars
        .iter()
        .collect::<String>()
        .parse()
        .map_err(|_| FormatError::new(spec, "width or precision too large"))
}

/// Applies `spec` to `value`, producing the formatted text.
pub fn apply_format(value: &Value, spec: &str) -> Result<String, FormatError> {
    let parsed = parse_spec(spec)?;
    match value {
        Value::Str(text) => format_str(spec, &parsed, text),
        Value::Bool(flag) if matches!(parsed.kind, None | Some('s')) => {
            format_str(spec, &parsed, &value.to_string())
                .or_else(|_| format_int(spec, &parsed, i64::from(*flag)))
        }
        Value::Bool(flag) => format_int(spec, &parsed, i64::from(*flag)),
        Value::Int(number) => format_int(spec, &parsed, *number),
        Value::Float(number) => format_float_spec(spec, &parsed, *number),
        Value::None | Value::List(_) if spec.is_empty() => Ok(value.to_string()),
        other => Err(FormatError::new(
            spec,
            format!("unsupported format string passed to {}", other.type_name()),
        )),
    }
}

fn format_str(spec: &str, parsed: &FormatSpec, text: &str) -> Result<String, FormatError> {
    if !matches!(parsed.kind, None | Some('s')) {
        return Err(FormatError::new(spec, "numeric format code for a string"));
    }
    if parsed.sign.is_some() || parsed.alternate || parsed.grouping.is_some() {
        return Err(FormatError::new(spec, "sign, '#' or grouping not allowed for strings"));
    }
    if parsed.align == Some(Align::AfterSign) {
        return Err(FormatError::new(spec, "'=' alignment not allowed for strings"));
    }
    let body: String = match parsed.precision {
        Some(limit) => text.chars().take(limit).collect(),
        None => text.to_string(),
    };
    let fill = parsed
        .fill
        .unwrap_or(if parsed.zero { '0' } else { ' ' });
    Ok(pad(
        "",
        &body,
        parsed.width,
        fill,
        parsed.align.unwrap_or(Align::Left),
    ))
}

fn format_int(spec: &str, parsed: &FormatSpec, number: i64) -> Result<String, FormatError> {
    let magnitude = number.unsigned_abs();
    let (prefix, body) = match parsed.kind {
        None | Some('d') | Some('n') => ("", group(magnitude.to_string(), parsed.grouping, 3)),
        Some('b') => ("0b", group(format!("{magnitude:b}"), parsed.grouping, 4)),
        Some('o') => ("0o", group(format!("{magnitude:o}"), parsed.grouping, 4)),
        Some('x') => ("0x", group(format!("{magnitude:x}"), parsed.grouping, 4)),
        Some('X') => ("0X", group(format!("{magnitude:X}"), parsed.grouping, 4)),
        Some('c') => {
            let ch = u32::try_from(number)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| FormatError::new(spec, "%c arg not in range"))?;
            if parsed.sign.is_some() {
                return Err(FormatError::new(spec, "sign not allowed with 'c'"));
            }
            return Ok(pad(
                "",
                &ch.to_string(),
                parsed.width,
                parsed.fill.unwrap_or(' '),
                parsed.align.unwrap_or(Align::Left),
            ));
        }
        Some('s') => return Err(FormatError::new(spec, "'s' format code for an integer")),
        Some(_) => return format_float_spec(spec, parsed, number as f64),
    };
    if parsed.precision.is_some() {
        return Err(FormatError::new(spec, "precision not allowed in integer format"));
    }
    let prefix = if parsed.alternate { prefix } else { "" };
    Ok(finish_number(parsed, number < 0, prefix, &body))
}

fn format_float_spec(spec: &str, parsed: &FormatSpec, number: f64) -> Result<String, FormatError> {
    let negative = number.is_sign_negative() && !number.is_nan();
    let magnitude = number.abs();
    let upper = matches!(parsed.kind, Some('E' | 'F' | 'G'));

    let body = if !magnitude.is_finite() {
        let text = if magnitude.is_nan() { "nan" } else { "inf" };
        let text = if parsed.kind == Some('%') {
            format!("{text}%")
        } else {
            text.to_string()
        };
        if upper {
            text.to_uppercase()
        } else {
            text
        }
    } else {
        let body = match parsed.kind {
            Some('f' | 'F') => fixed(magnitude, parsed.precision.unwrap_or(6)),
            Some('e' | 'E') => scientific(magnitude, parsed.precision.unwrap_or(6)),
            Some('g' | 'G' | 'n') => general(magnitude, parsed.precision.unwrap_or(6), parsed.alternate),
            Some('%') => format!("{}%", fixed(magnitude * 100.0, parsed.precision.unwrap_or(6))),
            None => match parsed.precision {
                Some(precision) => general(magnitude, precision, true),
                None => format_float(magnitude),
            },
            Some(kind) => {
                return Err(FormatError::new(
                    spec,
                    format!("unknown format code '{kind}' for a float"),
                ))
            }
        };
        let body = if upper { body.to_uppercase() } else { body };
        group_float(&body, parsed.grouping)
    };
    Ok(finish_number(parsed, negative, "", &body))
}

fn fixed(value: f64, precision: usize) -> String {
    format!("{value:.precision$}")
}

fn scientific(value: f64, precision: usize) -> String {
    let raw = format!("{value:.precision$e}");
    let Some((mantissa, exponent)) = raw.split_once('e') else {
        return raw;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exponent.abs())
}

fn general(value: f64, precision: usize, keep_point: bool) -> String {
    let precision = precision.max(1);
    if value == 0.0 {
        return if keep_point { "0.0".to_string() } else { "0".to_string() };
    }
    let sci = format!("{value:.prec$e}", prec = precision - 1);
    let exponent: i32 = sci
        .split_once('e')
        .and_then(|(_, exp)| exp.parse().ok())
        .unwrap_or(0);
    if exponent >= -4 && i64::from(exponent) < precision as i64 {
        let decimals = (precision as i64 - 1 - i64::from(exponent)).max(0) as usize;
        strip_zeros(fixed(value, decimals), keep_point)
    } else {
        let raw = scientific(value, precision - 1);
        match raw.split_once('e') {
            Some((mantissa, exp)) => format!("{}e{exp}", strip_zeros(mantissa.to_string(), false)),
            None => raw,
        }
    }
}

fn strip_zeros(text: String, keep_point: bool) -> String {
    if !text.contains('.') {
        return if keep_point { format!("{text}.0") } else { text };
    }
    let trimmed = text.trim_end_matches('0');
    if trimmed.ends_with('.') {
        if keep_point {
            format!("{trimmed}0")
        } else {
            trimmed.trim_end_matches('.').to_string()
        }
    } else {
        trimmed.to_string()
    }
}

fn group(digits: String, separator: Option<char>, size: usize) -> String {
    let Some(separator) = separator else {
        return digits;
    };
    let chars: Vec<char> = digits.chars().collect();
    let mut out = String::with_capacity(chars.len() + chars.len() / size);
    for (idx, ch) in chars.iter().enumerate() {
        if idx > 0 && (chars.len() - idx) % size == 0 {
            out.push(separator);
        }
        out.push(*ch);
    }
    out
}

fn group_float(body: &str, separator: Option<char>) -> String {
    if separator.is_none() {
        return body.to_string();
    }
    let split = body
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(body.len());
    let (int_part, rest) = body.split_at(split);
    format!("{}{rest}", group(int_part.to_string(), separator, 3))
}

fn finish_number(parsed: &FormatSpec, negative: bool, prefix: &str, body: &str) -> String {
    let sign = match (negative, parsed.sign) {
        (true, _) => "-",
        (false, Some('+')) => "+",
        (false, Some(' ')) => " ",
        _ => "",
    };
    let lead = format!("{sign}{prefix}");
    let (fill, align) = match (parsed.fill, parsed.align) {
        (Some(fill), Some(align)) => (fill, align),
        (None, Some(align)) => (if parsed.zero { '0' } else { ' ' }, align),
        (_, None) if parsed.zero => ('0', Align::AfterSign),
        _ => (' ', Align::Right),
    };
    pad(&lead, body, parsed.width, fill, align)
}

fn pad(lead: &str, body: &str, width: usize, fill: char, align: Align) -> String {
    let len = lead.chars().count() + body.chars().count();
    let missing = width.saturating_sub(len);
    let fill_str = |count: usize| std::iter::repeat(fill).take(count).collect::<String>();
    match align {
        Align::Left => format!("{lead}{body}{}", fill_str(missing)),
        Align::Right => format!("{}{lead}{body}", fill_str(missing)),
        Align::Center => {
            let left = missing / 2;
            format!("{}{lead}{body}{}", fill_str(left), fill_str(missing - left))
        }
        Align::AfterSign => format!("{lead}{}{body}", fill_str(missing)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(value: Value, spec: &str) -> String {
        apply_format(&value, spec).expect("format")
    }

    #[test]
    fn integers() {
        assert_eq!(fmt(Value::Int(7), "03d"), "007");
        assert_eq!(fmt(Value::Int(-7), "04"), "-007");
        assert_eq!(fmt(Value::Int(255), "#x"), "0xff");
        assert_eq!(fmt(Value::Int(1234567), ","), "1,234,567");
        assert_eq!(fmt(Value::Int(5), "+"), "+5");
        assert_eq!(fmt(Value::Int(5), "*^5"), "**5**");
    }

    #[test]
    fn floats() {
        assert_eq!(fmt(Value::Float(3.14159), ".2f"), "3.14");
        assert_eq!(fmt(Value::Float(1234.56), ".3e"), "1.235e+03");
        assert_eq!(fmt(Value::Float(0.00001234), "g"), "1.234e-05");
        assert_eq!(fmt(Value::Float(2.5), "g"), "2.5");
        assert_eq!(fmt(Value::Float(0.25), ".0%"), "25%");
        assert_eq!(fmt(Value::Int(3), ".1f"), "3.0");
        assert_eq!(fmt(Value::Float(1.5), "8.2f"), "    1.50");
    }

    #[test]
    fn strings() {
        assert_eq!(fmt(Value::Str("ab".into()), ">4"), "  ab");
        assert_eq!(fmt(Value::Str("abcdef".into()), ".3"), "abc");
        assert_eq!(fmt(Value::Str("ab".into()), "4"), "ab  ");
    }

    #[test]
    fn incompatible_specs_fail() {
        assert!(apply_format(&Value::Str("x".into()), "d").is_err());
        assert!(apply_format(&Value::Int(1), ".2d").is_err());
        assert!(apply_format(&Value::Int(1), "q").is_err());
        assert!(apply_format(&Value::List(vec![]), "5").is_err());
    }
}
