use super::EvalError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    Percent,
    Caret,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) offset: usize,
}

fn lex_err(offset: usize, message: impl Into<String>) -> EvalError {
    EvalError::Parse(format!("offset {offset}: {}", message.into()))
}

fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_ident_continue(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, EvalError> {
    if let Some((offset, _)) = input.char_indices().find(|(_, ch)| !ch.is_ascii()) {
        return Err(lex_err(offset, "non-ASCII input"));
    }

    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b' ' || b == b'\t' {
            i += 1;
            continue;
        }

        if i + 1 < bytes.len() {
            let kind = match &input[i..i + 2] {
                "**" => Some(TokenKind::DoubleStar),
                "==" => Some(TokenKind::EqEq),
                "!=" => Some(TokenKind::NotEq),
                "<=" => Some(TokenKind::Le),
                ">=" => Some(TokenKind::Ge),
                _ => None,
            };
            if let Some(kind) = kind {
                tokens.push(Token { kind, offset: i });
                i += 2;
                continue;
            }
        }

        let start = i;
        let kind = match b {
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'^' => TokenKind::Caret,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b',' => TokenKind::Comma,
            b'<' => TokenKind::Lt,
            b'>' => TokenKind::Gt,
            b'.' if !bytes.get(i + 1).is_some_and(u8::is_ascii_digit) => TokenKind::Dot,
            b'0'..=b'9' | b'.' => {
                let (kind, end) = lex_number(input, start)?;
                tokens.push(Token { kind, offset: start });
                i = end;
                continue;
            }
            b'\'' | b'"' => {
                let (text, end) = lex_string(input, start)?;
                tokens.push(Token {
                    kind: TokenKind::Str(text),
                    offset: start,
                });
                i = end;
                continue;
            }
            b'{' => {
                // A passthrough reference `{name}` reads as the bare name.
                let mut end = i + 1;
                if !bytes.get(end).copied().is_some_and(is_ident_start) {
                    return Err(lex_err(i, "expected identifier after '{'"));
                }
                while end < bytes.len() && is_ident_continue(bytes[end]) {
                    end += 1;
                }
                if bytes.get(end) != Some(&b'}') {
                    return Err(lex_err(end, "unterminated braced reference"));
                }
                tokens.push(Token {
                    kind: TokenKind::Ident(input[i + 1..end].to_string()),
                    offset: start,
                });
                i = end + 1;
                continue;
            }
            _ if is_ident_start(b) => {
                let mut end = i + 1;
                while end < bytes.len() && is_ident_continue(bytes[end]) {
                    end += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Ident(input[i..end].to_string()),
                    offset: start,
                });
                i = end;
                continue;
            }
            _ => {
                return Err(lex_err(
                    i,
                    format!("unexpected character '{}'", b as char),
                ))
            }
        };
        tokens.push(Token { kind, offset: start });
        i += 1;
    }

    Ok(tokens)
}

fn lex_number(input: &str, start: usize) -> Result<(TokenKind, usize), EvalError> {
    let bytes = input.as_bytes();
    let mut i = start;
    let mut is_float = false;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        is_float = true;
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            is_float = true;
            i = j;
        }
    }
    if i < bytes.len() && is_ident_continue(bytes[i]) {
        return Err(lex_err(i, "invalid numeric literal"));
    }

    let text = &input[start..i];
    if is_float {
        let value: f64 = text
            .parse()
            .map_err(|_| lex_err(start, format!("invalid number '{text}'")))?;
        return Ok((TokenKind::Float(value), i));
    }
    if text.len() > 1 && text.starts_with('0') && text.bytes().any(|b| b != b'0') {
        return Err(lex_err(start, "leading zeros in integer literal"));
    }
    let value: i64 = text
        .parse()
        .map_err(|_| lex_err(start, format!("integer literal '{text}' out of range")))?;
    Ok((TokenKind::Int(value), i))
}

fn lex_string(input: &str, start: usize) -> Result<(String, usize), EvalError> {
    let bytes = input.as_bytes();
    let quote = bytes[start];
    let mut out = String::new();
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b if b == quote => return Ok((out, i + 1)),
            b'\\' if i + 1 < bytes.len() => {
                match bytes[i + 1] {
                    b'\\' => out.push('\\'),
                    b'\'' => out.push('\''),
                    b'"' => out.push('"'),
                    b'n' => out.push('\n'),
                    b't' => out.push('\t'),
                    other => {
                        out.push('\\');
                        out.push(other as char);
                    }
                }
                i += 2;
            }
            b'\n' => break,
            other => {
                out.push(other as char);
                i += 1;
            }
        }
    }
    Err(lex_err(start, "unterminated string literal"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .expect("tokenize")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn operators_and_numbers() {
        assert_eq!(
            kinds("2**3 ^ 1.5e1"),
            vec![
                TokenKind::Int(2),
                TokenKind::DoubleStar,
                TokenKind::Int(3),
                TokenKind::Caret,
                TokenKind::Float(15.0),
            ]
        );
    }

    #[test]
    fn dotted_names_keep_dots() {
        assert_eq!(
            kinds("app.wl.exp"),
            vec![
                TokenKind::Ident("app".into()),
                TokenKind::Dot,
                TokenKind::Ident("wl".into()),
                TokenKind::Dot,
                TokenKind::Ident("exp".into()),
            ]
        );
    }

    #[test]
    fn braced_reference_is_an_identifier() {
        assert_eq!(kinds("{v}"), vec![TokenKind::Ident("v".into())]);
    }

    #[test]
    fn rejects_leading_zero_integers() {
        assert!(tokenize("007").is_err());
        assert!(tokenize("0").is_ok());
        assert!(tokenize("0.5").is_ok());
    }

    #[test]
    fn rejects_newlines_and_unknown_characters() {
        assert!(tokenize("1\n2").is_err());
        assert!(tokenize("a = b").is_err());
        assert!(tokenize("'open").is_err());
    }

    #[test]
    fn version_strings_lex_as_adjacent_numbers() {
        assert_eq!(
            kinds("2.1.1"),
            vec![TokenKind::Float(2.1), TokenKind::Float(0.1)]
        );
    }
}
