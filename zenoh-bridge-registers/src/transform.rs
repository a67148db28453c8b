//! Per-register value transforms.
//!
//! A transform is a scalar arithmetic expression over one variable, `_`,
//! which stands for the decoded raw register value:
//!
//! ```text
//! _ / 1000            scale
//! (_ - 32) * 5 / 9    offset and scale
//! max(_, 0)           clamp
//! 2(_ + 1)            implicit multiplication
//! _ * pi / 180        built-in constants (pi, e, phi)
//! ```
//!
//! Expressions are compiled once when the register catalog is built. A
//! compiled [`Transform`] cannot fail structurally at evaluation time; the
//! only runtime failure is a non-finite result (division by zero, `sqrt`
//! of a negative value, ...).

use std::fmt;

use thiserror::Error;

/// Name of the variable bound to the raw register value.
pub const VARIABLE: &str = "_";

/// Deepest nesting of parentheses, signs and exponents a transform may use.
pub const MAX_DEPTH: usize = 128;

fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" | "π" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        "phi" | "φ" => Some(1.618_033_988_749_895),
        _ => None,
    }
}

/// An expression failed to compile.
#[derive(Debug, Clone, Error)]
#[error("Invalid transform '{expression}': {}", .errors.join("; "))]
pub struct TransformError {
    /// The expression as written in the configuration.
    pub expression: String,
    /// Every problem found while compiling it.
    pub errors: Vec<String>,
}

/// A compiled transform failed on a particular input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("Transform '{expression}' produced {value} for input {input}")]
    NonFinite {
        expression: String,
        input: f64,
        value: f64,
    },
}

/// A compiled, validated transform expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    text: String,
    root: Expr,
}

impl Transform {
    /// Compile an expression over [`VARIABLE`].
    pub fn compile(text: &str) -> Result<Self, TransformError> {
        Self::compile_over(text, VARIABLE)
    }

    fn compile_over(text: &str, variable: &str) -> Result<Self, TransformError> {
        let fail = |errors| TransformError {
            expression: text.to_string(),
            errors,
        };

        let mut errors = Vec::new();
        let tokens = tokenize(text, &mut errors);
        if tokens.is_empty() && errors.is_empty() {
            return Err(fail(vec!["expression is empty".to_string()]));
        }

        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            variable,
            end: text.len(),
            depth: 0,
            errors,
        };
        let root = parser.parse_expression();
        if root.is_some() {
            if let Some(extra) = parser.peek() {
                let msg = match extra.token {
                    Token::RParen => format!("unbalanced ')' at position {}", extra.pos),
                    _ => format!("unexpected {} at position {}", extra.token, extra.pos),
                };
                parser.errors.push(msg);
            }
        }

        match root {
            Some(root) if parser.errors.is_empty() => Ok(Self {
                text: text.to_string(),
                root,
            }),
            _ => Err(fail(parser.errors)),
        }
    }

    /// Evaluate the transform with `raw` bound to the variable.
    pub fn evaluate(&self, raw: f64) -> Result<f64, EvaluationError> {
        let value = self.root.eval(raw);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EvaluationError::NonFinite {
                expression: self.text.clone(),
                input: raw,
                value,
            })
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Variable,
    Negate(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
}

impl Expr {
    fn eval(&self, x: f64) -> f64 {
        match self {
            Expr::Number(n) => *n,
            Expr::Variable => x,
            Expr::Negate(inner) => -inner.eval(x),
            Expr::Binary(op, lhs, rhs) => op.apply(lhs.eval(x), rhs.eval(x)),
            Expr::Call(func, args) => {
                let values: Vec<f64> = args.iter().map(|a| a.eval(x)).collect();
                func.apply(&values)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl BinaryOp {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Rem => a % b,
            BinaryOp::Pow => a.powf(b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Abs,
    Ceil,
    Floor,
    Round,
    Sqrt,
    Cbrt,
    Exp,
    Log,
    Log2,
    Log10,
    Sin,
    Cos,
    Tan,
    Cot,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Log1p,
    Expm1,
    Signum,
    Min,
    Max,
    Pow,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        let func = match name {
            "abs" => Function::Abs,
            "ceil" => Function::Ceil,
            "floor" => Function::Floor,
            "round" => Function::Round,
            "sqrt" => Function::Sqrt,
            "cbrt" => Function::Cbrt,
            "exp" => Function::Exp,
            "log" => Function::Log,
            "log2" => Function::Log2,
            "log10" => Function::Log10,
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "cot" => Function::Cot,
            "asin" => Function::Asin,
            "acos" => Function::Acos,
            "atan" => Function::Atan,
            "sinh" => Function::Sinh,
            "cosh" => Function::Cosh,
            "tanh" => Function::Tanh,
            "log1p" => Function::Log1p,
            "expm1" => Function::Expm1,
            "signum" => Function::Signum,
            "min" => Function::Min,
            "max" => Function::Max,
            "pow" => Function::Pow,
            _ => return None,
        };
        Some(func)
    }

    fn arity(self) -> usize {
        match self {
            Function::Min | Function::Max | Function::Pow => 2,
            _ => 1,
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        let a = args[0];
        match self {
            Function::Abs => a.abs(),
            Function::Ceil => a.ceil(),
            Function::Floor => a.floor(),
            Function::Round => a.round(),
            Function::Sqrt => a.sqrt(),
            Function::Cbrt => a.cbrt(),
            Function::Exp => a.exp(),
            Function::Log => a.ln(),
            Function::Log2 => a.log2(),
            Function::Log10 => a.log10(),
            Function::Sin => a.sin(),
            Function::Cos => a.cos(),
            Function::Tan => a.tan(),
            Function::Cot => 1.0 / a.tan(),
            Function::Asin => a.asin(),
            Function::Acos => a.acos(),
            Function::Atan => a.atan(),
            Function::Sinh => a.sinh(),
            Function::Cosh => a.cosh(),
            Function::Tanh => a.tanh(),
            Function::Log1p => a.ln_1p(),
            Function::Expm1 => a.exp_m1(),
            Function::Signum => {
                if a == 0.0 {
                    0.0
                } else {
                    a.signum()
                }
            }
            Function::Min => a.min(args[1]),
            Function::Max => a.max(args[1]),
            Function::Pow => a.powf(args[1]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {}", n),
            Token::Ident(name) => write!(f, "'{}'", name),
            Token::Op(c) => write!(f, "'{}'", c),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Comma => f.write_str("','"),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    pos: usize,
}

fn tokenize(text: &str, errors: &mut Vec<String>) -> Vec<Spanned> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        let token = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // Exponent, only when digits actually follow.
                if let Some(&(_, e)) = chars.peek() {
                    if e == 'e' || e == 'E' {
                        let mut ahead = chars.clone();
                        ahead.next();
                        let mut exponent = String::from("e");
                        if let Some(&(_, sign)) = ahead.peek() {
                            if sign == '+' || sign == '-' {
                                exponent.push(sign);
                                ahead.next();
                            }
                        }
                        let mut digits = false;
                        while let Some(&(_, d)) = ahead.peek() {
                            if d.is_ascii_digit() {
                                exponent.push(d);
                                ahead.next();
                                digits = true;
                            } else {
                                break;
                            }
                        }
                        if digits {
                            literal.push_str(&exponent);
                            chars = ahead;
                        }
                    }
                }
                match literal.parse::<f64>() {
                    Ok(n) => Token::Number(n),
                    Err(_) => {
                        errors.push(format!("invalid number '{}' at position {}", literal, pos));
                        Token::Number(f64::NAN)
                    }
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' {
                        name.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Ident(name)
            }
            '+' | '-' | '*' | '/' | '%' | '^' => {
                chars.next();
                Token::Op(c)
            }
            '(' => {
                chars.next();
                Token::LParen
            }
            ')' => {
                chars.next();
                Token::RParen
            }
            ',' => {
                chars.next();
                Token::Comma
            }
            other => {
                chars.next();
                errors.push(format!("unexpected character '{}' at position {}", other, pos));
                continue;
            }
        };
        tokens.push(Spanned { token, pos });
    }

    tokens
}

/// Recursive-descent parser.
///
/// ```text
/// expression := term (('+' | '-') term)*
/// term       := unary (('*' | '/' | '%')? unary)*
/// unary      := ('-' | '+') unary | power
/// power      := primary ('^' unary)?
/// primary    := number | variable | constant | function '(' args ')' | '(' expression ')'
/// ```
///
/// A missing operator before a name or `(` is an implicit multiplication
/// (`2_`, `2(_ + 1)`, `(_ + 1)(_ - 1)`).
///
/// Syntax errors stop parsing (`None`); name errors are recorded and parsing
/// carries on so that all of them are reported together.
struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    variable: &'a str,
    end: usize,
    depth: usize,
    errors: Vec<String>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Spanned> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Spanned> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_op(&mut self, ops: &[char]) -> Option<char> {
        match self.peek() {
            Some(Spanned {
                token: Token::Op(c),
                ..
            }) if ops.contains(c) => {
                self.pos += 1;
                Some(*c)
            }
            _ => None,
        }
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek().is_some_and(|t| &t.token == expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn syntax_error(&mut self, msg: String) -> Option<Expr> {
        self.errors.push(msg);
        None
    }

    fn parse_expression(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_term()?;
        while let Some(op) = self.eat_op(&['+', '-']) {
            let rhs = self.parse_term()?;
            let op = if op == '+' {
                BinaryOp::Add
            } else {
                BinaryOp::Sub
            };
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Some(lhs)
    }

    fn parse_term(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.eat_op(&['*', '/', '%']) {
                Some('*') => BinaryOp::Mul,
                Some('/') => BinaryOp::Div,
                Some(_) => BinaryOp::Rem,
                None if self.implicit_product() => BinaryOp::Mul,
                None => break,
            };
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Some(lhs)
    }

    fn implicit_product(&self) -> bool {
        matches!(
            self.peek(),
            Some(Spanned {
                token: Token::Ident(_) | Token::LParen,
                ..
            })
        )
    }

    fn parse_unary(&mut self) -> Option<Expr> {
        if self.depth >= MAX_DEPTH {
            let pos = self.peek().map_or(self.end, |t| t.pos);
            return self.syntax_error(format!(
                "expression nested deeper than {} levels at position {}",
                MAX_DEPTH, pos
            ));
        }
        self.depth += 1;
        let expr = match self.eat_op(&['-', '+']) {
            Some('-') => self.parse_unary().map(|inner| Expr::Negate(Box::new(inner))),
            Some(_) => self.parse_unary(),
            None => self.parse_power(),
        };
        self.depth -= 1;
        expr
    }

    fn parse_power(&mut self) -> Option<Expr> {
        let base = self.parse_primary()?;
        if self.eat_op(&['^']).is_some() {
            let exponent = self.parse_unary()?;
            return Some(Expr::Binary(
                BinaryOp::Pow,
                Box::new(base),
                Box::new(exponent),
            ));
        }
        Some(base)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let Some(spanned) = self.next() else {
            return self.syntax_error(format!("unexpected end of expression at position {}", self.end));
        };

        match &spanned.token {
            Token::Number(n) => Some(Expr::Number(*n)),
            Token::Ident(name) if name == self.variable => Some(Expr::Variable),
            Token::Ident(name) => {
                if let Some(value) = constant(name) {
                    Some(Expr::Number(value))
                } else if self.eat(&Token::LParen) {
                    self.parse_call(name, spanned.pos)
                } else {
                    self.errors.push(format!(
                        "unknown variable '{}' at position {} (only '{}' is bound)",
                        name, spanned.pos, self.variable
                    ));
                    Some(Expr::Number(f64::NAN))
                }
            }
            Token::LParen => {
                let inner = self.parse_expression()?;
                if !self.eat(&Token::RParen) {
                    return self.syntax_error(format!(
                        "missing ')' for '(' at position {}",
                        spanned.pos
                    ));
                }
                Some(inner)
            }
            Token::RParen => {
                self.syntax_error(format!("unbalanced ')' at position {}", spanned.pos))
            }
            other => self.syntax_error(format!("unexpected {} at position {}", other, spanned.pos)),
        }
    }

    fn parse_call(&mut self, name: &str, pos: usize) -> Option<Expr> {
        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if self.eat(&Token::Comma) {
                    continue;
                }
                if self.eat(&Token::RParen) {
                    break;
                }
                return self.syntax_error(format!(
                    "missing ')' for call to '{}' at position {}",
                    name, pos
                ));
            }
        }

        let Some(func) = Function::lookup(name) else {
            self.errors
                .push(format!("unknown function '{}' at position {}", name, pos));
            return Some(Expr::Number(f64::NAN));
        };

        if args.len() != func.arity() {
            self.errors.push(format!(
                "function '{}' takes {} argument(s), got {}",
                name,
                func.arity(),
                args.len()
            ));
            return Some(Expr::Number(f64::NAN));
        }

        Some(Expr::Call(func, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(text: &str, x: f64) -> f64 {
        Transform::compile(text).unwrap().evaluate(x).unwrap()
    }

    fn errors(text: &str) -> Vec<String> {
        Transform::compile(text).unwrap_err().errors
    }

    #[test]
    fn test_identity_and_scale() {
        assert_eq!(eval("_", 1.0), 1.0);
        assert_eq!(eval("_ * 2", 12.5), 25.0);
        assert_eq!(eval("_/1000", 2500.0), 2.5);
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("1 + 2 * 3", 0.0), 7.0);
        assert_eq!(eval("(1 + 2) * 3", 0.0), 9.0);
        assert_eq!(eval("10 - 4 - 3", 0.0), 3.0);
        assert_eq!(eval("_ % 7", 23.0), 2.0);
        assert_eq!(eval("(_ - 32) * 5 / 9", 212.0), 100.0);
    }

    #[test]
    fn test_power_and_unary() {
        assert_eq!(eval("2 ^ 3 ^ 2", 0.0), 512.0);
        assert_eq!(eval("-2 ^ 2", 0.0), -4.0);
        assert_eq!(eval("2 ^ -1", 0.0), 0.5);
        assert_eq!(eval("--_", 3.0), 3.0);
        assert_eq!(eval("+_", 3.0), 3.0);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(eval("1e3", 0.0), 1000.0);
        assert_eq!(eval("_ * 2.5E-1", 8.0), 2.0);
        assert_eq!(eval(".5 + _", 1.0), 1.5);
    }

    #[test]
    fn test_functions() {
        assert_eq!(eval("abs(_)", -4.0), 4.0);
        assert_eq!(eval("max(_, 0)", -4.0), 0.0);
        assert_eq!(eval("min(_, 10)", 40.0), 10.0);
        assert_eq!(eval("round(_ / 3)", 10.0), 3.0);
        assert_eq!(eval("sqrt(_)", 16.0), 4.0);
        assert_eq!(eval("pow(_, 2)", 3.0), 9.0);
        assert_eq!(eval("signum(_)", 0.0), 0.0);
        assert_eq!(eval("signum(_)", -7.0), -1.0);
        assert!((eval("log10(_)", 1000.0) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_trigonometric_and_hyperbolic_functions() {
        assert!((eval("asin(_)", 1.0) - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert_eq!(eval("acos(_)", 1.0), 0.0);
        assert!((eval("atan(_)", 1.0) - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
        assert!((eval("cot(_)", std::f64::consts::FRAC_PI_4) - 1.0).abs() < 1e-12);
        assert_eq!(eval("sinh(_)", 0.0), 0.0);
        assert_eq!(eval("cosh(_)", 0.0), 1.0);
        assert!((eval("tanh(_)", 0.5) - 0.5f64.tanh()).abs() < 1e-12);
        assert!((eval("log1p(_)", 1e-10) - 1e-10).abs() < 1e-20);
        assert!((eval("expm1(_)", 1e-10) - 1e-10).abs() < 1e-20);
        assert!(errors("asin(_, 1)").iter().any(|e| e.contains("takes 1")));
    }

    #[test]
    fn test_builtin_constants() {
        assert!((eval("_ * pi", 2.0) - std::f64::consts::TAU).abs() < 1e-12);
        assert!((eval("e ^ _", 1.0) - std::f64::consts::E).abs() < 1e-12);
        assert!((eval("_ * π / 180", 180.0) - std::f64::consts::PI).abs() < 1e-12);
        assert!((eval("phi", 0.0) - (1.0 + 5f64.sqrt()) / 2.0).abs() < 1e-12);

        // The bound variable shadows a constant of the same name.
        let transform = Transform::compile_over("e * 2", "e").unwrap();
        assert_eq!(transform.evaluate(3.0), Ok(6.0));
    }

    #[test]
    fn test_implicit_multiplication() {
        assert_eq!(eval("2_", 3.0), 6.0);
        assert_eq!(eval("2(_ + 1)", 3.0), 8.0);
        assert_eq!(eval("(_ + 1)(_ - 1)", 3.0), 8.0);
        assert_eq!(eval("_(_ + 1)", 3.0), 12.0);
        assert_eq!(eval("2_ ^ 2", 3.0), 18.0);
        assert_eq!(eval("1 / 2_", 2.0), 1.0);
        assert!((eval("2pi", 0.0) - std::f64::consts::TAU).abs() < 1e-12);
        assert!((eval("2e", 0.0) - 2.0 * std::f64::consts::E).abs() < 1e-12);
        assert_eq!(eval("2e3", 0.0), 2000.0);
        assert_eq!(eval("3abs(_)", -2.0), 6.0);
        assert!(errors("2x").iter().any(|e| e.contains("unknown variable 'x'")));
    }

    #[test]
    fn test_nesting_depth_limited() {
        let deep = format!("{}_{}", "(".repeat(10_000), ")".repeat(10_000));
        let errs = errors(&deep);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("nested deeper than"), "{:?}", errs);

        assert!(errors(&format!("{}_", "-".repeat(10_000)))[0].contains("nested deeper than"));
        assert!(errors(&format!("{}1", "2^".repeat(10_000)))[0].contains("nested deeper than"));

        let shallow = format!("{}_{}", "(".repeat(MAX_DEPTH - 1), ")".repeat(MAX_DEPTH - 1));
        assert_eq!(eval(&shallow, 5.0), 5.0);
    }

    #[test]
    fn test_constant_expression_allowed() {
        assert_eq!(eval("42", 7.0), 42.0);
    }

    #[test]
    fn test_unbalanced_parentheses() {
        let errs = errors("(_ * 2");
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("missing ')'"));

        let errs = errors("_ * 2)");
        assert!(errs[0].contains("unbalanced ')'"));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(errors("").iter().any(|e| e.contains("empty")));
        assert!(errors("   ").iter().any(|e| e.contains("empty")));
        assert!(errors("_ *").iter().any(|e| e.contains("end of expression")));
        assert!(errors("_ 2").iter().any(|e| e.contains("unexpected")));
        assert!(errors("1.2.3").iter().any(|e| e.contains("invalid number")));
        assert!(errors("_ & 1").iter().any(|e| e.contains("'&'")));
    }

    #[test]
    fn test_all_name_errors_reported() {
        let errs = errors("x * foo(_) + y");
        assert_eq!(errs.len(), 3, "{:?}", errs);
        assert!(errs[0].contains("unknown variable 'x'"));
        assert!(errs[1].contains("unknown function 'foo'"));
        assert!(errs[2].contains("unknown variable 'y'"));
    }

    #[test]
    fn test_arity_checked() {
        assert!(errors("max(_)").iter().any(|e| e.contains("takes 2")));
        assert!(errors("abs(_, 1)").iter().any(|e| e.contains("takes 1")));
    }

    #[test]
    fn test_error_names_expression() {
        let err = Transform::compile("(_ * 2").unwrap_err();
        assert_eq!(err.expression, "(_ * 2");
        assert!(err.to_string().starts_with("Invalid transform '(_ * 2'"));
    }

    #[test]
    fn test_non_finite_is_evaluation_error() {
        let transform = Transform::compile("1 / _").unwrap();
        assert_eq!(transform.evaluate(4.0), Ok(0.25));
        assert!(matches!(
            transform.evaluate(0.0),
            Err(EvaluationError::NonFinite { input, .. }) if input == 0.0
        ));

        let transform = Transform::compile("sqrt(_)").unwrap();
        assert!(transform.evaluate(-1.0).is_err());
    }

    #[test]
    fn test_custom_variable() {
        let transform = Transform::compile_over("raw * 2", "raw").unwrap();
        assert_eq!(transform.evaluate(4.0), Ok(8.0));
        assert!(Transform::compile_over("_ * 2", "raw").is_err());
    }

    #[test]
    fn test_source_preserved() {
        let transform = Transform::compile(" _ * 0.1 ").unwrap();
        assert_eq!(transform.to_string(), " _ * 0.1 ");
    }
}
