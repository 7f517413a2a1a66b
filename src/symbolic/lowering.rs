//! Lowering of the [AST] into the symbolic DAG.
//!
//! This is where the light canonicalisation happens: subtraction, division and negation are
//! rewritten in terms of `Add`, `Mul` and `Pow`, nested sums and products are flattened, and
//! numbers are folded exactly. Every node goes through [ExprArena::intern], so equal sub-trees
//! come out as one shared node.

use fnv::FnvHashMap;
use lazy_static::lazy_static;

use crate::ast::{BinaryOperator, CallExpression, Expression, ExpressionKind, AST};
use crate::diagnostics::{CompilationError, CompilationResult};
use crate::symbolic::{ExprArena, ExprId, Literal, Number, OperatorKind, SymExpr};

#[derive(Debug, Clone, Copy)]
struct Arity {
    min: usize,
    max: Option<usize>,
}

impl Arity {
    const fn exactly(n: usize) -> Self {
        Self {
            min: n,
            max: Some(n),
        }
    }

    const fn at_least(n: usize) -> Self {
        Self { min: n, max: None }
    }

    fn accepts(&self, n: usize) -> bool {
        n >= self.min && self.max.map_or(true, |max| n <= max)
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{}", self.min),
            Some(max) => write!(f, "{} to {}", self.min, max),
            None => write!(f, "at least {}", self.min),
        }
    }
}

lazy_static! {
    /// Functions the front end knows by name.
    static ref FUNCTIONS: FnvHashMap<&'static str, (OperatorKind, Arity)> = {
        let one = Arity::exactly(1);
        let mut m = FnvHashMap::default();
        m.insert("abs", (OperatorKind::Abs, one));
        m.insert("Abs", (OperatorKind::Abs, one));
        m.insert("exp", (OperatorKind::Exp, one));
        m.insert("log", (OperatorKind::Log, Arity { min: 1, max: Some(2) }));
        m.insert("ln", (OperatorKind::Log, one));
        m.insert("sin", (OperatorKind::Sin, one));
        m.insert("cos", (OperatorKind::Cos, one));
        m.insert("tan", (OperatorKind::Tan, one));
        m.insert("cot", (OperatorKind::Cot, one));
        m.insert("sec", (OperatorKind::Sec, one));
        m.insert("csc", (OperatorKind::Csc, one));
        m.insert("asin", (OperatorKind::Asin, one));
        m.insert("acos", (OperatorKind::Acos, one));
        m.insert("atan", (OperatorKind::Atan, one));
        m.insert("atan2", (OperatorKind::Atan2, Arity::exactly(2)));
        m.insert("sinh", (OperatorKind::Sinh, one));
        m.insert("cosh", (OperatorKind::Cosh, one));
        m.insert("tanh", (OperatorKind::Tanh, one));
        m.insert("asinh", (OperatorKind::Asinh, one));
        m.insert("acosh", (OperatorKind::Acosh, one));
        m.insert("atanh", (OperatorKind::Atanh, one));
        m.insert("Min", (OperatorKind::Min, Arity::at_least(1)));
        m.insert("min", (OperatorKind::Min, Arity::at_least(1)));
        m.insert("Max", (OperatorKind::Max, Arity::at_least(1)));
        m.insert("max", (OperatorKind::Max, Arity::at_least(1)));
        m.insert("floor", (OperatorKind::Floor, one));
        m.insert("ceiling", (OperatorKind::Ceiling, one));
        m.insert("ceil", (OperatorKind::Ceiling, one));
        m.insert("sqrt", (OperatorKind::Sqrt, one));
        m.insert("cbrt", (OperatorKind::Cbrt, one));
        m.insert("Mod", (OperatorKind::Mod, Arity::exactly(2)));
        m
    };
}

/// Lower a parsed expression into `arena`, returning the root.
pub fn lower(ast: &AST, arena: &mut ExprArena) -> CompilationResult<ExprId> {
    Lowering { arena }.lower_expression(&ast.expression)
}

struct Lowering<'a> {
    arena: &'a mut ExprArena,
}

impl Lowering<'_> {
    fn lower_expression(&mut self, expr: &Expression) -> CompilationResult<ExprId> {
        match &expr.kind {
            ExpressionKind::Integer(n) => Ok(self.arena.number(Number::integer(*n))),
            ExpressionKind::Float(f) => Ok(self.arena.literal(Literal::Float(*f))),
            ExpressionKind::Variable(name) => Ok(self.lower_variable(name)),
            ExpressionKind::Binary(binary) => {
                let left = self.lower_expression(&binary.left)?;
                let right = self.lower_expression(&binary.right)?;
                match binary.operator {
                    BinaryOperator::Add => Ok(self.add(vec![left, right])),
                    BinaryOperator::Subtract => {
                        let right = self.negate(right);
                        Ok(self.add(vec![left, right]))
                    }
                    BinaryOperator::Multiply => Ok(self.mul(vec![left, right])),
                    BinaryOperator::Divide => {
                        let inverse = self.reciprocal(right);
                        Ok(self.mul(vec![left, inverse]))
                    }
                    BinaryOperator::Modulo => self.modulo(left, right, expr),
                    BinaryOperator::Power => Ok(self.pow(left, right)),
                }
            }
            ExpressionKind::Negative(negative) => {
                let operand = self.lower_expression(&negative.expression)?;
                Ok(self.negate(operand))
            }
            ExpressionKind::Call(call) => self.lower_call(call, expr),
            ExpressionKind::Parenthesized(inner) => self.lower_expression(&inner.expression),
        }
    }

    fn lower_variable(&mut self, name: &str) -> ExprId {
        match name {
            "pi" => self.arena.literal(Literal::Pi),
            "E" => self.arena.literal(Literal::Exp1),
            "zoo" => self.arena.literal(Literal::ComplexInfinity),
            _ => self.arena.symbol(name),
        }
    }

    fn lower_call(&mut self, call: &CallExpression, expr: &Expression) -> CompilationResult<ExprId> {
        let (op, arity) = match FUNCTIONS.get(call.name.as_str()) {
            Some((op, arity)) => (op.clone(), *arity),
            None => (OperatorKind::Undefined(call.name.clone()), Arity::at_least(1)),
        };
        if !arity.accepts(call.args.len()) {
            return Err(CompilationError::new_localized(
                format!(
                    "`{}` takes {} argument(s) but {} were given.",
                    call.name,
                    arity,
                    call.args.len()
                ),
                expr.span.clone(),
            ));
        }

        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(self.lower_expression(arg)?);
        }

        match (&op, args.as_slice()) {
            (OperatorKind::Log, &[x, base]) => {
                let numerator = self.arena.operation(OperatorKind::Log, vec![x]);
                let denominator = self.arena.operation(OperatorKind::Log, vec![base]);
                let denominator = self.reciprocal(denominator);
                return Ok(self.mul(vec![numerator, denominator]));
            }
            (OperatorKind::Min | OperatorKind::Max, &[single]) => return Ok(single),
            (OperatorKind::Mod, &[a, b]) => return self.modulo(a, b, expr),
            _ => {}
        }
        Ok(self.arena.operation(op, args))
    }

    fn numeric(&self, id: ExprId) -> Option<Number> {
        match self.arena.get(id) {
            SymExpr::Literal(literal) => literal.as_number(),
            _ => None,
        }
    }

    fn is_complex_infinity(&self, id: ExprId) -> bool {
        matches!(
            self.arena.get(id),
            SymExpr::Literal(Literal::ComplexInfinity)
        )
    }

    /// Arguments of `id` if it is an `op` operation, otherwise `id` itself.
    fn flattened(&self, op: &OperatorKind, args: Vec<ExprId>) -> Vec<ExprId> {
        let mut flat = vec![];
        for arg in args {
            match self.arena.get(arg) {
                SymExpr::Operation { op: inner, args } if inner == op => {
                    flat.extend_from_slice(args)
                }
                _ => flat.push(arg),
            }
        }
        flat
    }

    fn add(&mut self, args: Vec<ExprId>) -> ExprId {
        let args = self.flattened(&OperatorKind::Add, args);
        if args.iter().any(|a| self.is_complex_infinity(*a)) {
            return self.arena.literal(Literal::ComplexInfinity);
        }

        let mut coefficient: Option<Number> = None;
        let mut terms = vec![];
        for arg in args {
            match self.numeric(arg) {
                Some(n) => coefficient = Some(coefficient.map_or(n, |c| c.add(n))),
                None => terms.push(arg),
            }
        }
        self.combine(OperatorKind::Add, coefficient.filter(|c| !c.is_zero()), terms)
            .unwrap_or_else(|| self.arena.number(coefficient.unwrap_or(Number::zero())))
    }

    fn mul(&mut self, args: Vec<ExprId>) -> ExprId {
        let args = self.flattened(&OperatorKind::Mul, args);
        if args.iter().any(|a| self.is_complex_infinity(*a)) {
            return self.arena.literal(Literal::ComplexInfinity);
        }

        let mut coefficient: Option<Number> = None;
        let mut factors = vec![];
        for arg in args {
            match self.numeric(arg) {
                Some(n) => coefficient = Some(coefficient.map_or(n, |c| c.mul(n))),
                None => factors.push(arg),
            }
        }
        if coefficient.is_some_and(Number::is_zero) {
            return self.arena.number(Number::zero());
        }
        self.combine(OperatorKind::Mul, coefficient.filter(|c| !c.is_one()), factors)
            .unwrap_or_else(|| self.arena.number(coefficient.unwrap_or(Number::one())))
    }

    /// Build `op(coefficient, rest...)`, collapsing a single argument. `None` when nothing is
    /// left but the (dropped) coefficient.
    fn combine(
        &mut self,
        op: OperatorKind,
        coefficient: Option<Number>,
        rest: Vec<ExprId>,
    ) -> Option<ExprId> {
        if rest.is_empty() {
            return None;
        }
        let mut args = Vec::with_capacity(rest.len() + 1);
        if let Some(c) = coefficient {
            args.push(self.arena.number(c));
        }
        args.extend(rest);
        if args.len() == 1 {
            return Some(args[0]);
        }
        Some(self.arena.operation(op, args))
    }

    fn negate(&mut self, id: ExprId) -> ExprId {
        let minus_one = self.arena.number(Number::integer(-1));
        self.mul(vec![minus_one, id])
    }

    fn reciprocal(&mut self, id: ExprId) -> ExprId {
        let minus_one = self.arena.number(Number::integer(-1));
        self.pow(id, minus_one)
    }

    fn pow(&mut self, base: ExprId, exponent: ExprId) -> ExprId {
        let base_value = self.numeric(base);
        let exponent_value = self.numeric(exponent);

        if exponent_value.is_some_and(Number::is_one) {
            return base;
        }
        if exponent_value.is_some_and(Number::is_zero) || base_value.is_some_and(Number::is_one) {
            return self.arena.number(Number::one());
        }
        if let (Some(b), Some(e)) = (base_value, exponent_value) {
            if b.is_zero() && e.is_negative() {
                return self.arena.literal(Literal::ComplexInfinity);
            }
            if let Some(value) = b.pow(e) {
                return self.arena.number(value);
            }
        }
        self.arena.operation(OperatorKind::Pow, vec![base, exponent])
    }

    fn modulo(&mut self, a: ExprId, b: ExprId, expr: &Expression) -> CompilationResult<ExprId> {
        if let (Some(x), Some(y)) = (self.numeric(a), self.numeric(b)) {
            return match x.modulo(y) {
                Some(value) => Ok(self.arena.number(value)),
                None => Err(CompilationError::new_localized(
                    "Modulo by zero.",
                    expr.span.clone(),
                )),
            };
        }
        Ok(self.arena.operation(OperatorKind::Mod, vec![a, b]))
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::text::SourceText;
    use pretty_assertions::assert_eq;

    fn lower_str(text: &str) -> (ExprArena, CompilationResult<ExprId>) {
        let mut arena = ExprArena::new();
        let result = AST::from_source(Rc::new(SourceText::from_str(text)))
            .and_then(|ast| lower(&ast, &mut arena));
        (arena, result)
    }

    fn srepr(text: &str) -> String {
        let (arena, root) = lower_str(text);
        arena.srepr(root.unwrap())
    }

    #[test]
    fn subtraction_and_division() {
        assert_eq!(
            srepr("x - y"),
            "Add(Symbol('x'), Mul(Integer(-1), Symbol('y')))"
        );
        assert_eq!(
            srepr("x / y"),
            "Mul(Symbol('x'), Pow(Symbol('y'), Integer(-1)))"
        );
        assert_eq!(
            srepr("-x**2"),
            "Mul(Integer(-1), Pow(Symbol('x'), Integer(2)))"
        );
    }

    #[test]
    fn numbers_fold_into_leading_coefficient() {
        assert_eq!(
            srepr("2 + 3*x - 1"),
            "Add(Integer(1), Mul(Integer(3), Symbol('x')))"
        );
        assert_eq!(srepr("1/2"), "Rational(1, 2)");
        assert_eq!(srepr("2/6"), "Rational(1, 3)");
        assert_eq!(srepr("x + 0"), "Symbol('x')");
        assert_eq!(srepr("1 * x"), "Symbol('x')");
        assert_eq!(srepr("0 * x"), "Integer(0)");
        assert_eq!(srepr("2.5 * 2"), "Float(5.0)");
        assert_eq!(srepr("x - x"), "Add(Symbol('x'), Mul(Integer(-1), Symbol('x')))");
    }

    #[test]
    fn powers() {
        assert_eq!(srepr("x ** 1"), "Symbol('x')");
        assert_eq!(srepr("x ** 0"), "Integer(1)");
        assert_eq!(srepr("2 ** 10"), "Integer(1024)");
        assert_eq!(srepr("2 ** 0.5"), "Float(1.4142135623730951)");
        assert_eq!(srepr("2 ** (1/2)"), "Pow(Integer(2), Rational(1, 2))");
        assert_eq!(srepr("1 / 0"), "zoo");
    }

    #[test]
    fn shared_sub_expressions() {
        let (arena, root) = lower_str("x*x + x*x");
        let root = root.unwrap();
        let args = arena[root].args();
        assert_eq!(args.len(), 2);
        assert_eq!(args[0], args[1]);
        assert_eq!(arena.reachable_count(root), 3);
    }

    #[test]
    fn functions() {
        assert_eq!(srepr("sin(pi * t)"), "sin(Mul(pi, Symbol('t')))");
        assert_eq!(
            srepr("log(x, 2)"),
            "Mul(log(Symbol('x')), Pow(log(Integer(2)), Integer(-1)))"
        );
        assert_eq!(srepr("ln(E)"), "log(E)");
        assert_eq!(srepr("Min(x)"), "Symbol('x')");
        assert_eq!(srepr("max(a, b, c)"), "Max(Symbol('a'), Symbol('b'), Symbol('c'))");
        assert_eq!(srepr("gamma(x)"), "gamma(Symbol('x'))");
        assert_eq!(srepr("Mod(x, 2)"), "Mod(Symbol('x'), Integer(2))");
    }

    #[test]
    fn modulo() {
        assert_eq!(srepr("7 % -3"), "Integer(-2)");
        assert_eq!(srepr("x % 3"), "Mod(Symbol('x'), Integer(3))");
        let (_, result) = lower_str("5 % 0");
        assert!(result.unwrap_err().is_parse_error());
    }

    #[test]
    fn wrong_arity_is_rejected() {
        for text in ["atan2(y)", "sin(x, y)", "log(a, b, c)", "gamma()"] {
            let (_, result) = lower_str(text);
            let err = result.unwrap_err();
            assert!(err.is_parse_error(), "`{text}`: {err}");
        }
        let (_, result) = lower_str("atan2(y)");
        assert_eq!(
            result.unwrap_err().to_string(),
            "invalid expression: `atan2` takes 2 argument(s) but 1 were given."
        );
    }
}
