use super::ast::{BinOp, BoolOp, CompareOp, Expr, UnaryOp};
use super::lexer::{tokenize, Token, TokenKind};
use super::value::Value;
use super::EvalError;

/// Deepest nesting of parentheses, lists and prefix operators accepted.
const MAX_NESTING: usize = 128;

/// Parses one expression, requiring every token to be consumed.
pub fn parse_expression(input: &str) -> Result<Expr, EvalError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(EvalError::Parse("empty expression".to_string()));
    }
    let mut parser = Parser::new(&tokens);
    let expr = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(EvalError::Parse(format!(
            "offset {}: unexpected trailing {:?}",
            token.offset, token.kind
        )));
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|token| &token.kind)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Ident(name)) if name == keyword)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: TokenKind) -> Result<(), EvalError> {
        match self.advance() {
            Some(token) if token.kind == expected => Ok(()),
            Some(token) => Err(EvalError::Parse(format!(
                "offset {}: expected {:?}, got {:?}",
                token.offset, expected, token.kind
            ))),
            None => Err(EvalError::Parse(format!(
                "expected {expected:?}, got end of input"
            ))),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, EvalError> {
        let first = self.parse_and()?;
        let mut values = vec![first];
        while self.peek_keyword("or") {
            self.advance();
            values.push(self.parse_and()?);
        }
        Ok(fold_bool(BoolOp::Or, values))
    }

    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let first = self.parse_cmp()?;
        let mut values = vec![first];
        while self.peek_keyword("and") {
            self.advance();
            values.push(self.parse_cmp()?);
        }
        Ok(fold_bool(BoolOp::And, values))
    }

    fn parse_cmp(&mut self) -> Result<Expr, EvalError> {
        let left = self.parse_arith()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::EqEq) => CompareOp::Eq,
                Some(TokenKind::NotEq) => CompareOp::NotEq,
                Some(TokenKind::Lt) => CompareOp::Lt,
                Some(TokenKind::Le) => CompareOp::LtE,
                Some(TokenKind::Gt) => CompareOp::Gt,
                Some(TokenKind::Ge) => CompareOp::GtE,
                Some(TokenKind::Ident(name)) if name == "in" => CompareOp::In,
                _ => break,
            };
            self.advance();
            ops.push(op);
            comparators.push(self.parse_arith()?);
        }
        if ops.is_empty() {
            return Ok(left);
        }
        if ops.len() > 1 && ops.contains(&CompareOp::In) {
            return Err(EvalError::Unsupported(
                "membership test inside a comparison chain".to_string(),
            ));
        }
        Ok(Expr::Compare {
            left: Box::new(left),
            ops,
            comparators,
        })
    }

    fn parse_arith(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinOp::Add,
                Some(TokenKind::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_term()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_factor()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinOp::Mul,
                Some(TokenKind::Slash) => BinOp::Div,
                Some(TokenKind::Percent) => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_factor()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> Result<Expr, EvalError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(EvalError::Parse(format!(
                "expression nested deeper than {MAX_NESTING} levels"
            )));
        }
        let result = if matches!(self.peek_kind(), Some(TokenKind::Minus)) {
            self.advance();
            self.parse_factor().map(|operand| Expr::UnaryOp {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            })
        } else {
            self.parse_power()
        };
        self.depth -= 1;
        result
    }

    fn parse_power(&mut self) -> Result<Expr, EvalError> {
        let base = self.parse_primary()?;
        if matches!(
            self.peek_kind(),
            Some(TokenKind::DoubleStar) | Some(TokenKind::Caret)
        ) {
            self.advance();
            let exponent = self.parse_factor()?;
            return Ok(binary(BinOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        let Some(token) = self.advance() else {
            return Err(EvalError::Parse("unexpected end of input".to_string()));
        };
        match token.kind {
            TokenKind::Int(value) => Ok(Expr::Literal(Value::Int(value))),
            TokenKind::Float(value) => Ok(Expr::Literal(Value::Float(value))),
            TokenKind::Str(text) => Ok(Expr::Literal(Value::Str(text))),
            TokenKind::LParen => {
                let inner = self.parse_or()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                let items = self.parse_items(TokenKind::RBracket)?;
                Ok(Expr::List(items))
            }
            TokenKind::Ident(name) => self.parse_name(name, token.offset),
            other => Err(EvalError::Parse(format!(
                "offset {}: unexpected {other:?}",
                token.offset
            ))),
        }
    }

    fn parse_name(&mut self, name: String, offset: usize) -> Result<Expr, EvalError> {
        match name.as_str() {
            "True" => return Ok(Expr::Literal(Value::Bool(true))),
            "False" => return Ok(Expr::Literal(Value::Bool(false))),
            "None" => return Ok(Expr::Literal(Value::None)),
            "and" | "or" | "in" => {
                return Err(EvalError::Parse(format!(
                    "offset {offset}: unexpected keyword '{name}'"
                )))
            }
            _ => {}
        }

        let mut path = vec![name];
        while matches!(self.peek_kind(), Some(TokenKind::Dot)) {
            self.advance();
            match self.advance() {
                Some(Token {
                    kind: TokenKind::Ident(part),
                    ..
                }) => path.push(part),
                Some(token) => {
                    return Err(EvalError::Parse(format!(
                        "offset {}: expected attribute name, got {:?}",
                        token.offset, token.kind
                    )))
                }
                None => {
                    return Err(EvalError::Parse(
                        "expected attribute name, got end of input".to_string(),
                    ))
                }
            }
        }

        if matches!(self.peek_kind(), Some(TokenKind::LParen)) {
            if path.len() > 1 {
                return Err(EvalError::Unsupported(format!(
                    "call on attribute '{}'",
                    path.join(".")
                )));
            }
            self.advance();
            let args = self.parse_items(TokenKind::RParen)?;
            let func = path.remove(0);
            return Ok(Expr::Call { func, args });
        }

        if path.len() == 1 {
            Ok(Expr::Name(path.remove(0)))
        } else {
            Ok(Expr::Attribute(path))
        }
    }

    /// Comma-separated expressions up to `close`; a trailing comma is allowed.
    fn parse_items(&mut self, close: TokenKind) -> Result<Vec<Expr>, EvalError> {
        let mut items = Vec::new();
        loop {
            if self.peek_kind() == Some(&close) {
                self.advance();
                return Ok(items);
            }
            items.push(self.parse_or()?);
            match self.peek_kind() {
                Some(TokenKind::Comma) => {
                    self.advance();
                }
                _ => {
                    self.expect(close)?;
                    return Ok(items);
                }
            }
        }
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::BinOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn fold_bool(op: BoolOp, mut values: Vec<Expr>) -> Expr {
    if values.len() == 1 {
        values.remove(0)
    } else {
        Expr::BoolOp { op, values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Expr {
        parse_expression(input).expect("parse")
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = parse("1 + 2 * 3");
        let Expr::BinOp { op, right, .. } = expr else {
            panic!("expected binop");
        };
        assert_eq!(op, BinOp::Add);
        assert!(matches!(*right, Expr::BinOp { op: BinOp::Mul, .. }));
    }

    #[test]
    fn power_is_right_associative_and_accepts_caret() {
        let expr = parse("2 ^ 3 ** 2");
        let Expr::BinOp { op, right, .. } = expr else {
            panic!("expected binop");
        };
        assert_eq!(op, BinOp::Pow);
        assert!(matches!(*right, Expr::BinOp { op: BinOp::Pow, .. }));
    }

    #[test]
    fn unary_minus_binds_looser_than_power() {
        let expr = parse("-2 ** 2");
        assert!(matches!(
            expr,
            Expr::UnaryOp {
                op: UnaryOp::Neg,
                ..
            }
        ));
    }

    #[test]
    fn dotted_names_become_attributes() {
        assert_eq!(
            parse("app.wl.exp"),
            Expr::Attribute(vec!["app".into(), "wl".into(), "exp".into()])
        );
    }

    #[test]
    fn membership_against_namespace() {
        let expr = parse("{v} in app.wl.exp");
        let Expr::Compare { left, ops, .. } = expr else {
            panic!("expected compare");
        };
        assert_eq!(*left, Expr::Name("v".into()));
        assert_eq!(ops, vec![CompareOp::In]);
    }

    #[test]
    fn comparison_chains_collect_every_operator() {
        let Expr::Compare { ops, comparators, .. } = parse("1 < 2 <= 3") else {
            panic!("expected compare");
        };
        assert_eq!(ops, vec![CompareOp::Lt, CompareOp::LtE]);
        assert_eq!(comparators.len(), 2);
    }

    #[test]
    fn calls_and_lists() {
        assert!(matches!(parse("max(1, 2,)"), Expr::Call { ref args, .. } if args.len() == 2));
        assert!(matches!(parse("[1, 'a']"), Expr::List(ref items) if items.len() == 2));
    }

    #[test]
    fn rejects_calls_on_attributes() {
        assert!(matches!(
            parse_expression("os.system('x')"),
            Err(EvalError::Unsupported(_))
        ));
    }

    #[test]
    fn rejects_trailing_tokens_and_plain_prose() {
        assert!(parse_expression("1 2").is_err());
        assert!(parse_expression("hello world").is_err());
        assert!(parse_expression("/usr/bin/env").is_err());
        assert!(parse_expression("").is_err());
    }

    #[test]
    fn nesting_is_bounded() {
        let deep = format!("{}1{}", "(".repeat(500), ")".repeat(500));
        assert!(matches!(parse_expression(&deep), Err(EvalError::Parse(_))));
    }
}
