use super::value::Value;

/// Expression tree produced by [`parse_expression`](super::parse_expression).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric, string, boolean or `None` literal.
    Literal(Value),
    /// Bare identifier; evaluates to its own name.
    Name(String),
    /// Dotted path `a.b.c`; evaluates to the joined string.
    Attribute(Vec<String>),
    /// Chain of comparisons sharing operands left to right.
    Compare {
        /// Leftmost operand.
        left: Box<Expr>,
        /// Operators, one per comparator.
        ops: Vec<CompareOp>,
        /// Right-hand operands.
        comparators: Vec<Expr>,
    },
    /// `and` / `or` over two or more operands.
    BoolOp {
        /// Operator applied between operands.
        op: BoolOp,
        /// Operands in source order.
        values: Vec<Expr>,
    },
    /// Arithmetic operator.
    BinOp {
        /// Operator.
        op: BinOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Prefix operator.
    UnaryOp {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// Call of an allow-listed function.
    Call {
        /// Function name.
        func: String,
        /// Positional arguments.
        args: Vec<Expr>,
    },
    /// Literal list `[a, b]`.
    List(Vec<Expr>),
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtE,
    /// `>`
    Gt,
    /// `>=`
    GtE,
    /// `in`
    In,
}

/// Logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    /// `and`
    And,
    /// `or`
    Or,
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`, always producing a float.
    Div,
    /// `%`, result takes the sign of the divisor.
    Mod,
    /// `**`, also spelled `^`.
    Pow,
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-`
    Neg,
}
