//! Calculator: a sandboxed arithmetic evaluator.
//!
//! Evaluation is a three-step pipeline:
//!
//! 1. **Parse** the input with a general expression grammar (names, calls,
//!    attribute access, subscripts, strings, comparisons, boolean and
//!    bitwise operators, assignment, tuples and lists).
//! 2. **Validate** the syntax tree against an allow-list: numeric
//!    literals, unary `+`/`-`, binary `+ - * / % // **`, grouping, and
//!    tuple/list literals. Any other node is rejected with
//!    [`EvalError::Disallowed`] naming its kind.
//! 3. **Evaluate** the validated tree. The evaluator has no environment:
//!    there are no names, functions or attributes to resolve, and it
//!    refuses every node the validator would have refused.
//!
//! `^` parses as bitwise xor and is therefore rejected, as in the host
//! grammar users know from scripting languages.
//!
//! Input size is bounded before any recursion happens: at most
//! [`MAX_TOKENS`] tokens, and at most [`MAX_NESTING`] levels of
//! parentheses, brackets, unary operators and exponents. Longer or deeper
//! input is a syntax error, never a stack overflow.

use crate::value::{ArithOp, MAX_INT_BITS, MAX_INT_DIGITS, Value, check_int_size, int_too_large};
use nova_core::error::EvalError;
use num_bigint::BigInt;

/// Longest accepted expression, in tokens.
pub const MAX_TOKENS: usize = 1000;

/// Deepest accepted nesting.
pub const MAX_NESTING: usize = 200;

/// Parse, validate and evaluate an arithmetic expression.
pub fn evaluate(expr: &str) -> Result<Value, EvalError> {
    let tree = parse(expr)?;
    validate(&tree)?;
    eval(&tree)
}

// ── Syntax tree ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Number {
    Int(BigInt),
    Float(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Pos,
    Neg,
    Not,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Arith(ArithOp),
    BitXor,
    BitAnd,
    BitOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

/// A parsed expression. Only a subset is ever evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(Number),
    Str(String),
    Name(String),
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinOp, left: Box<Expr>, right: Box<Expr> },
    Compare { op: CmpOp, left: Box<Expr>, right: Box<Expr> },
    Bool { op: BoolOp, left: Box<Expr>, right: Box<Expr> },
    Call { func: Box<Expr>, args: Vec<Expr> },
    Attribute { value: Box<Expr>, attr: String },
    Subscript { value: Box<Expr>, index: Box<Expr> },
    Assign { target: Box<Expr>, value: Box<Expr> },
    Tuple(Vec<Expr>),
    List(Vec<Expr>),
}

impl Expr {
    /// Node kind, as reported in rejections.
    pub fn kind(&self) -> String {
        match self {
            Self::Num(_) => "Num".into(),
            Self::Str(_) => "Str".into(),
            Self::Name(_) => "Name".into(),
            Self::Unary { op, .. } => format!("UnaryOp({op:?})"),
            Self::Binary { op: BinOp::Arith(op), .. } => format!("BinOp({op:?})"),
            Self::Binary { op, .. } => format!("BinOp({op:?})"),
            Self::Compare { .. } => "Compare".into(),
            Self::Bool { .. } => "BoolOp".into(),
            Self::Call { .. } => "Call".into(),
            Self::Attribute { .. } => "Attribute".into(),
            Self::Subscript { .. } => "Subscript".into(),
            Self::Assign { .. } => "Assign".into(),
            Self::Tuple(_) => "Tuple".into(),
            Self::List(_) => "List".into(),
        }
    }
}

// ── Validation ────────────────────────────────────────────────────────────

/// Walk the whole tree and reject any node outside the arithmetic allow-list.
pub fn validate(expr: &Expr) -> Result<(), EvalError> {
    match expr {
        Expr::Num(_) => Ok(()),
        Expr::Unary { op: UnaryOp::Pos | UnaryOp::Neg, operand } => validate(operand),
        Expr::Binary { op: BinOp::Arith(_), left, right } => {
            validate(left)?;
            validate(right)
        }
        Expr::Tuple(items) | Expr::List(items) => items.iter().try_for_each(validate),
        other => Err(EvalError::Disallowed(other.kind())),
    }
}

// ── Evaluation ────────────────────────────────────────────────────────────

fn eval(expr: &Expr) -> Result<Value, EvalError> {
    match expr {
        Expr::Num(Number::Int(i)) => Ok(Value::Int(i.clone())),
        Expr::Num(Number::Float(f)) => Ok(Value::Float(*f)),
        Expr::Unary { op: UnaryOp::Neg, operand } => eval(operand)?.negate(),
        Expr::Unary { op: UnaryOp::Pos, operand } => eval(operand)?.positive(),
        Expr::Binary { op: BinOp::Arith(op), left, right } => {
            let lhs = eval(left)?;
            let rhs = eval(right)?;
            lhs.apply(*op, rhs)
        }
        Expr::Tuple(items) => Ok(Value::Tuple(
            items.iter().map(eval).collect::<Result<_, _>>()?,
        )),
        Expr::List(items) => Ok(Value::List(
            items.iter().map(eval).collect::<Result<_, _>>()?,
        )),
        other => Err(EvalError::Disallowed(other.kind())),
    }
}

// ── Tokenizer ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Number),
    Str(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    Caret,
    Amp,
    Pipe,
    Tilde,
    Assign,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
}

fn tokenize(input: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    // Two-character operators are checked before their one-character prefixes.
    let next_is = |i: usize, c: char| chars.get(i + 1) == Some(&c);

    while i < chars.len() {
        let c = chars[i];
        let (token, width) = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '*' if next_is(i, '*') => (Token::DoubleStar, 2),
            '*' => (Token::Star, 1),
            '/' if next_is(i, '/') => (Token::DoubleSlash, 2),
            '/' => (Token::Slash, 1),
            '=' if next_is(i, '=') => (Token::EqEq, 2),
            '=' => (Token::Assign, 1),
            '!' if next_is(i, '=') => (Token::NotEq, 2),
            '<' if next_is(i, '=') => (Token::Le, 2),
            '<' => (Token::Lt, 1),
            '>' if next_is(i, '=') => (Token::Ge, 2),
            '>' => (Token::Gt, 1),
            '+' => (Token::Plus, 1),
            '-' => (Token::Minus, 1),
            '%' => (Token::Percent, 1),
            '^' => (Token::Caret, 1),
            '&' => (Token::Amp, 1),
            '|' => (Token::Pipe, 1),
            '~' => (Token::Tilde, 1),
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '[' => (Token::LBracket, 1),
            ']' => (Token::RBracket, 1),
            ',' => (Token::Comma, 1),
            '.' if !chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()) => (Token::Dot, 1),
            c if c.is_ascii_digit() || c == '.' => {
                let (number, end) = lex_number(&chars, i)?;
                tokens.push(Token::Number(number));
                i = end;
                continue;
            }
            '\'' | '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == c)
                    .map(|p| i + 1 + p)
                    .ok_or_else(|| EvalError::Syntax("Unterminated string literal".into()))?;
                tokens.push(Token::Str(chars[i + 1..end].iter().collect()));
                i = end + 1;
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
                continue;
            }
            c => return Err(EvalError::Syntax(format!("Unexpected character: '{c}'"))),
        };
        tokens.push(token);
        i += width;
    }

    Ok(tokens)
}

/// Lex a numeric literal starting at `start`: a `0x`/`0o`/`0b` integer, or
/// decimal digits with an optional fraction and exponent. Single
/// underscores may separate digits. Returns the number and the index
/// after it.
fn lex_number(chars: &[char], start: usize) -> Result<(Number, usize), EvalError> {
    if chars[start] == '0' {
        let radix = match chars.get(start + 1) {
            Some('x' | 'X') => Some(16),
            Some('o' | 'O') => Some(8),
            Some('b' | 'B') => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            return lex_radix_int(chars, start + 2, radix);
        }
    }

    let digit_at = |i: usize| chars.get(i).is_some_and(|c| c.is_ascii_digit());
    let mut text = String::new();
    let mut is_float = false;
    let mut i = start;

    while i < chars.len() {
        match chars[i] {
            c if c.is_ascii_digit() => text.push(c),
            '.' => {
                is_float = true;
                text.push('.');
            }
            '_' if i > start && digit_at(i - 1) && digit_at(i + 1) => {}
            _ => break,
        }
        i += 1;
    }

    if i < chars.len() && matches!(chars[i], 'e' | 'E') {
        let mut j = i + 1;
        if j < chars.len() && matches!(chars[j], '+' | '-') {
            j += 1;
        }
        if digit_at(j) {
            while digit_at(j) {
                j += 1;
            }
            is_float = true;
            text.extend(&chars[i..j]);
            i = j;
        }
    }

    let number = if is_float {
        Number::Float(
            text.parse()
                .map_err(|_| EvalError::Syntax(format!("Invalid number: {text}")))?,
        )
    } else {
        if text.len() > 1 && text.starts_with('0') && text.bytes().any(|b| b != b'0') {
            return Err(EvalError::Syntax(
                "Leading zeros in decimal integer literals are not permitted".into(),
            ));
        }
        if text.len() > MAX_INT_DIGITS {
            return Err(int_too_large());
        }
        Number::Int(parse_int(&text, 10)?)
    };
    Ok((number, i))
}

/// Lex the digits of a `0x`, `0o` or `0b` literal; `start` is just past
/// the prefix.
fn lex_radix_int(chars: &[char], start: usize, radix: u32) -> Result<(Number, usize), EvalError> {
    let mut end = start;
    while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
        end += 1;
    }
    let raw: String = chars[start..end].iter().collect();
    if raw.trim_start_matches('_').is_empty() || raw.ends_with('_') || raw.contains("__") {
        return Err(EvalError::Syntax(format!("Invalid base-{radix} literal")));
    }

    let digits = raw.replace('_', "");
    // Binary needs the most digits per bit; anything longer cannot fit.
    if digits.len() as u64 > MAX_INT_BITS {
        return Err(int_too_large());
    }
    Ok((Number::Int(parse_int(&digits, radix)?), end))
}

fn parse_int(digits: &str, radix: u32) -> Result<BigInt, EvalError> {
    let n = BigInt::parse_bytes(digits.as_bytes(), radix)
        .ok_or_else(|| EvalError::Syntax(format!("Invalid base-{radix} literal: {digits}")))?;
    check_int_size(&n)?;
    Ok(n)
}

// ── Parser ────────────────────────────────────────────────────────────────

/// Parse an expression into a syntax tree without validating it.
pub fn parse(expr: &str) -> Result<Expr, EvalError> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err(EvalError::Syntax("Empty expression".into()));
    }
    if tokens.len() > MAX_TOKENS {
        return Err(EvalError::Syntax(format!(
            "Expression longer than {MAX_TOKENS} tokens"
        )));
    }
    let mut parser = Parser::new(&tokens);
    let tree = parser.parse_statement()?;
    if let Some(tok) = parser.peek() {
        return Err(EvalError::Syntax(format!(
            "Unexpected token at position {}: {:?}",
            parser.pos, tok
        )));
    }
    Ok(tree)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    /// Current recursion depth through `parse_factor` and `parse_not`
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

    /// Run `parse` one nesting level deeper, refusing past `MAX_NESTING`.
    ///
    /// Every recursive path in the grammar passes through `parse_factor`
    /// or `parse_not`, so guarding those two bounds the whole parse.
    fn nested(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<Expr, EvalError>,
    ) -> Result<Expr, EvalError> {
        if self.depth >= MAX_NESTING {
            return Err(EvalError::Syntax(format!(
                "Expression nested more than {MAX_NESTING} levels deep"
            )));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(name)) if name == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), EvalError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(EvalError::Syntax(format!("Expected {what}")))
        }
    }

    // statement = exprlist ('=' exprlist)?
    fn parse_statement(&mut self) -> Result<Expr, EvalError> {
        let target = self.parse_exprlist()?;
        if self.eat(&Token::Assign) {
            let value = self.parse_exprlist()?;
            return Ok(Expr::Assign {
                target: Box::new(target),
                value: Box::new(value),
            });
        }
        Ok(target)
    }

    // exprlist = expr (',' expr)* ','?  (a bare comma makes a tuple)
    fn parse_exprlist(&mut self) -> Result<Expr, EvalError> {
        let first = self.parse_expr()?;
        if self.peek() != Some(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if self.at_sequence_end() {
                break;
            }
            items.push(self.parse_expr()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn at_sequence_end(&self) -> bool {
        matches!(
            self.peek(),
            None | Some(Token::RParen) | Some(Token::RBracket) | Some(Token::Assign)
        )
    }

    // expr = and_expr ('or' and_expr)*
    fn parse_expr(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("or") {
            let right = self.parse_and()?;
            left = Expr::Bool { op: BoolOp::Or, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    // and_expr = not_expr ('and' not_expr)*
    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_not()?;
        while self.eat_keyword("and") {
            let right = self.parse_not()?;
            left = Expr::Bool { op: BoolOp::And, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    // not_expr = 'not' not_expr | comparison
    fn parse_not(&mut self) -> Result<Expr, EvalError> {
        self.nested(Self::parse_not_inner)
    }

    fn parse_not_inner(&mut self) -> Result<Expr, EvalError> {
        if self.eat_keyword("not") {
            let operand = self.parse_not()?;
            return Ok(Expr::Unary { op: UnaryOp::Not, operand: Box::new(operand) });
        }
        self.parse_comparison()
    }

    // comparison = bitor (cmp_op bitor)*
    fn parse_comparison(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_bitor()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => CmpOp::Eq,
                Some(Token::NotEq) => CmpOp::NotEq,
                Some(Token::Lt) => CmpOp::Lt,
                Some(Token::Le) => CmpOp::Le,
                Some(Token::Gt) => CmpOp::Gt,
                Some(Token::Ge) => CmpOp::Ge,
                _ => break,
            };
            self.consume();
            let right = self.parse_bitor()?;
            left = Expr::Compare { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_bitor(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_bitxor()?;
        while self.eat(&Token::Pipe) {
            let right = self.parse_bitxor()?;
            left = binary(BinOp::BitOr, left, right);
        }
        Ok(left)
    }

    fn parse_bitxor(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_bitand()?;
        while self.eat(&Token::Caret) {
            let right = self.parse_bitand()?;
            left = binary(BinOp::BitXor, left, right);
        }
        Ok(left)
    }

    fn parse_bitand(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_arith()?;
        while self.eat(&Token::Amp) {
            let right = self.parse_arith()?;
            left = binary(BinOp::BitAnd, left, right);
        }
        Ok(left)
    }

    // arith = term (('+' | '-') term)*
    fn parse_arith(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => ArithOp::Add,
                Some(Token::Minus) => ArithOp::Sub,
                _ => break,
            };
            self.consume();
            let right = self.parse_term()?;
            left = binary(BinOp::Arith(op), left, right);
        }
        Ok(left)
    }

    // term = factor (('*' | '/' | '//' | '%') factor)*
    fn parse_term(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => ArithOp::Mul,
                Some(Token::Slash) => ArithOp::Div,
                Some(Token::DoubleSlash) => ArithOp::FloorDiv,
                Some(Token::Percent) => ArithOp::Mod,
                _ => break,
            };
            self.consume();
            let right = self.parse_factor()?;
            left = binary(BinOp::Arith(op), left, right);
        }
        Ok(left)
    }

    // factor = ('+' | '-' | '~') factor | power
    fn parse_factor(&mut self) -> Result<Expr, EvalError> {
        self.nested(Self::parse_factor_inner)
    }

    fn parse_factor_inner(&mut self) -> Result<Expr, EvalError> {
        let op = match self.peek() {
            Some(Token::Plus) => UnaryOp::Pos,
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Tilde) => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        self.consume();
        let operand = self.parse_factor()?;
        Ok(Expr::Unary { op, operand: Box::new(operand) })
    }

    // power = postfix ('**' factor)?  (right-associative, binds tighter)
    // than a unary operator on its left: -2 ** 2 == -(2 ** 2)
    fn parse_power(&mut self) -> Result<Expr, EvalError> {
        let base = self.parse_postfix()?;
        if self.eat(&Token::DoubleStar) {
            let exponent = self.parse_factor()?;
            return Ok(binary(BinOp::Arith(ArithOp::Pow), base, exponent));
        }
        Ok(base)
    }

    // postfix = atom ('(' args ')' | '.' NAME | '[' exprlist ']')*
    fn parse_postfix(&mut self) -> Result<Expr, EvalError> {
        let mut expr = self.parse_atom()?;
        loop {
            if self.eat(&Token::LParen) {
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.parse_expr()?);
                        if !self.eat(&Token::Comma) || self.peek() == Some(&Token::RParen) {
                            break;
                        }
                    }
                    self.expect(&Token::RParen, "closing parenthesis after arguments")?;
                }
                expr = Expr::Call { func: Box::new(expr), args };
            } else if self.eat(&Token::Dot) {
                let attr = match self.consume() {
                    Some(Token::Ident(name)) => name.clone(),
                    _ => return Err(EvalError::Syntax("Expected attribute name".into())),
                };
                expr = Expr::Attribute { value: Box::new(expr), attr };
            } else if self.eat(&Token::LBracket) {
                let index = self.parse_exprlist()?;
                self.expect(&Token::RBracket, "closing bracket")?;
                expr = Expr::Subscript { value: Box::new(expr), index: Box::new(index) };
            } else {
                return Ok(expr);
            }
        }
    }

    // atom = NUMBER | STRING | NAME | '(' exprlist? ')' | '[' items? ']'
    fn parse_atom(&mut self) -> Result<Expr, EvalError> {
        match self.consume().cloned() {
            Some(Token::Number(n)) => Ok(Expr::Num(n)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::Ident(name)) => Ok(Expr::Name(name)),
            Some(Token::LParen) => {
                if self.eat(&Token::RParen) {
                    return Ok(Expr::Tuple(vec![]));
                }
                let inner = self.parse_exprlist()?;
                self.expect(&Token::RParen, "closing parenthesis")?;
                Ok(inner)
            }
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                while !self.eat(&Token::RBracket) {
                    items.push(self.parse_expr()?);
                    if !self.eat(&Token::Comma) {
                        self.expect(&Token::RBracket, "closing bracket")?;
                        break;
                    }
                }
                Ok(Expr::List(items))
            }
            Some(tok) => Err(EvalError::Syntax(format!("Unexpected token: {tok:?}"))),
            None => Err(EvalError::Syntax("Unexpected end of expression".into())),
        }
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary { op, left: Box::new(left), right: Box::new(right) }
}

// ── Tests ─────────────────────────────────────────────────────────────────
