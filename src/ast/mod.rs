//! Abstract syntax tree of a single infix math expression, as written by the user.

use std::fmt::Display;
use std::rc::Rc;

use crate::diagnostics::CompilationResult;
use crate::text::{SourceText, TextSpan};

use self::lexer::Lexer;
use self::parser::Parser;

pub mod lexer;
pub mod parser;

/// A parsed expression.
#[derive(Debug, Clone)]
pub struct AST {
    pub expression: Expression,
}

impl AST {
    /// Lex and parse a source text.
    pub fn from_source(text: Rc<SourceText>) -> CompilationResult<Self> {
        let tokens = Lexer::from_source(text).collect();
        let expression = Parser::new(tokens).parse()?;
        Ok(Self { expression })
    }

    pub fn print(&self) {
        Printer::new().visit_expression(&self.expression);
    }
}

pub trait Visitor {
    fn do_visit_expression(&mut self, expression: &Expression) {
        match &expression.kind {
            ExpressionKind::Integer(n) => self.visit_integer(*n),
            ExpressionKind::Float(f) => self.visit_float(*f),
            ExpressionKind::Variable(name) => self.visit_variable(name),
            ExpressionKind::Binary(expr) => self.visit_binary_expression(expr),
            ExpressionKind::Negative(expr) => self.visit_negative_expression(expr),
            ExpressionKind::Call(expr) => self.visit_call_expression(expr),
            ExpressionKind::Parenthesized(expr) => self.visit_parenthesized_expression(expr),
        }
    }

    fn visit_expression(&mut self, expression: &Expression) {
        self.do_visit_expression(expression);
    }

    fn visit_binary_expression(&mut self, binary_expression: &BinaryExpression) {
        self.visit_expression(&binary_expression.left);
        self.visit_expression(&binary_expression.right);
    }

    fn visit_negative_expression(&mut self, expr: &NegativeExpression) {
        self.visit_expression(&expr.expression);
    }

    fn visit_call_expression(&mut self, expr: &CallExpression) {
        for arg in &expr.args {
            self.visit_expression(arg);
        }
    }

    fn visit_parenthesized_expression(&mut self, expr: &ParenthesizedExpression) {
        self.visit_expression(&expr.expression);
    }

    fn visit_integer(&mut self, n: i64);
    fn visit_float(&mut self, f: f64);
    fn visit_variable(&mut self, name: &str);
}

#[derive(Debug, Clone)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub span: TextSpan,
}

impl Expression {
    pub fn new(kind: ExpressionKind, span: TextSpan) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone)]
pub enum ExpressionKind {
    Integer(i64),
    Float(f64),
    Variable(String),
    Binary(BinaryExpression),
    Negative(NegativeExpression),
    Call(CallExpression),
    Parenthesized(ParenthesizedExpression),
}

#[derive(Debug, Clone)]
pub struct ParenthesizedExpression {
    pub expression: Box<Expression>,
}

impl ParenthesizedExpression {
    pub fn new(expression: Expression) -> Self {
        Self {
            expression: Box::new(expression),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NegativeExpression {
    pub expression: Box<Expression>,
}

impl NegativeExpression {
    pub fn new(expression: Expression) -> Self {
        Self {
            expression: Box::new(expression),
        }
    }
}

/// A function call like `sin(x)` or `atan2(y, x)`.
#[derive(Debug, Clone)]
pub struct CallExpression {
    pub name: String,
    pub args: Vec<Expression>,
}

#[derive(Debug, Clone)]
pub struct BinaryExpression {
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub operator: BinaryOperator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
}

impl BinaryOperator {
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Add => 1,
            BinaryOperator::Subtract => 1,
            BinaryOperator::Multiply => 2,
            BinaryOperator::Divide => 2,
            BinaryOperator::Modulo => 2,
            BinaryOperator::Power => 4,
        }
    }

    pub fn is_right_associative(&self) -> bool {
        matches!(self, BinaryOperator::Power)
    }
}

/// Binding strength of a leading `-`. Weaker than `**` so `-x**2` is `-(x**2)`.
pub const UNARY_PRECEDENCE: u8 = 3;

impl Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOperator::Add => write!(f, "+"),
            BinaryOperator::Subtract => write!(f, "-"),
            BinaryOperator::Multiply => write!(f, "*"),
            BinaryOperator::Divide => write!(f, "/"),
            BinaryOperator::Modulo => write!(f, "%"),
            BinaryOperator::Power => write!(f, "**"),
        }
    }
}

const INDENTATON: usize = 4;

struct Printer {
    current_indent: usize,
}

impl Printer {
    fn new() -> Self {
        Self { current_indent: 0 }
    }

    fn print(&self, text: &str) {
        println!("{}{}", " ".repeat(self.current_indent), text);
    }

    fn indent(&mut self) {
        self.current_indent += INDENTATON;
    }

    fn unindent(&mut self) {
        self.current_indent -= INDENTATON;
    }
}

impl Visitor for Printer {
    fn visit_integer(&mut self, n: i64) {
        self.print(&format!("Integer: {}", n));
    }

    fn visit_float(&mut self, f: f64) {
        self.print(&format!("Float: {}", f));
    }

    fn visit_variable(&mut self, name: &str) {
        self.print(&format!("Variable: {}", name))
    }

    fn visit_binary_expression(&mut self, binary_expression: &BinaryExpression) {
        self.print(&format!("BinaryExpression: {}", binary_expression.operator));
        self.indent();
        self.visit_expression(&binary_expression.left);
        self.visit_expression(&binary_expression.right);
        self.unindent();
    }

    fn visit_negative_expression(&mut self, expr: &NegativeExpression) {
        self.print("Negative:");
        self.indent();
        self.visit_expression(&expr.expression);
        self.unindent();
    }

    fn visit_call_expression(&mut self, expr: &CallExpression) {
        self.print(&format!("Call: {}", expr.name));
        self.indent();
        for arg in &expr.args {
            self.visit_expression(arg);
        }
        self.unindent();
    }

    fn visit_parenthesized_expression(&mut self, expr: &ParenthesizedExpression) {
        self.print("Parenthesized:");
        self.indent();
        self.visit_expression(&expr.expression);
        self.unindent();
    }
}
