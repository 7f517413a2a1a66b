//! The symbolic expression DAG the graph compiler consumes.
//!
//! Nodes live in an [ExprArena] and are addressed by [ExprId]. The id *is* the identity of a
//! sub-expression: two ids are the same node exactly when they are equal, regardless of what the
//! nodes contain. [ExprArena::intern] hands out the same id for structurally equal nodes, which
//! is how shared sub-expressions come to exist.

use std::fmt::Display;
use std::hash::{Hash, Hasher};

use fnv::{FnvHashMap, FnvHashSet};
use serde::{Deserialize, Serialize};

pub use self::lowering::lower;
pub use self::number::Number;

mod lowering;
pub mod number;

/// Identity of a node in an [ExprArena].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExprId(pub u32);

impl ExprId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl Display for ExprId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of a non-symbol node. This is what the operator registry is keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    // Arithmetic
    Add,
    Mul,
    Pow,
    Mod,

    // Literals
    Integer,
    Rational,
    Float,
    Zero,
    One,
    NegativeOne,
    Half,
    Pi,
    Exp1,
    ComplexInfinity,

    // Functions
    Abs,
    Exp,
    Log,
    Sin,
    Cos,
    Tan,
    Cot,
    Sec,
    Csc,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,
    Min,
    Max,
    Floor,
    Ceiling,
    Sqrt,
    Cbrt,

    /// A called function nothing knows about, e.g. `gamma(x)`.
    Undefined(String),
}

impl OperatorKind {
    pub fn name(&self) -> &str {
        match self {
            OperatorKind::Add => "Add",
            OperatorKind::Mul => "Mul",
            OperatorKind::Pow => "Pow",
            OperatorKind::Mod => "Mod",
            OperatorKind::Integer => "Integer",
            OperatorKind::Rational => "Rational",
            OperatorKind::Float => "Float",
            OperatorKind::Zero => "Zero",
            OperatorKind::One => "One",
            OperatorKind::NegativeOne => "NegativeOne",
            OperatorKind::Half => "Half",
            OperatorKind::Pi => "Pi",
            OperatorKind::Exp1 => "Exp1",
            OperatorKind::ComplexInfinity => "ComplexInfinity",
            OperatorKind::Abs => "Abs",
            OperatorKind::Exp => "exp",
            OperatorKind::Log => "log",
            OperatorKind::Sin => "sin",
            OperatorKind::Cos => "cos",
            OperatorKind::Tan => "tan",
            OperatorKind::Cot => "cot",
            OperatorKind::Sec => "sec",
            OperatorKind::Csc => "csc",
            OperatorKind::Asin => "asin",
            OperatorKind::Acos => "acos",
            OperatorKind::Atan => "atan",
            OperatorKind::Atan2 => "atan2",
            OperatorKind::Sinh => "sinh",
            OperatorKind::Cosh => "cosh",
            OperatorKind::Tanh => "tanh",
            OperatorKind::Asinh => "asinh",
            OperatorKind::Acosh => "acosh",
            OperatorKind::Atanh => "atanh",
            OperatorKind::Min => "Min",
            OperatorKind::Max => "Max",
            OperatorKind::Floor => "floor",
            OperatorKind::Ceiling => "ceiling",
            OperatorKind::Sqrt => "sqrt",
            OperatorKind::Cbrt => "cbrt",
            OperatorKind::Undefined(name) => name,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            OperatorKind::Integer
                | OperatorKind::Rational
                | OperatorKind::Float
                | OperatorKind::Zero
                | OperatorKind::One
                | OperatorKind::NegativeOne
                | OperatorKind::Half
                | OperatorKind::Pi
                | OperatorKind::Exp1
                | OperatorKind::ComplexInfinity
        )
    }
}

impl Display for OperatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A numeric leaf.
#[derive(Debug, Clone, Copy)]
pub enum Literal {
    Integer(i64),
    /// Reduced, denominator > 1.
    Rational(i64, i64),
    Float(f64),
    Zero,
    One,
    NegativeOne,
    Half,
    Pi,
    Exp1,
    ComplexInfinity,
}

impl Literal {
    pub fn from_number(number: Number) -> Self {
        match number {
            Number::Rational { numer: 0, .. } => Literal::Zero,
            Number::Rational { numer: 1, denom: 1 } => Literal::One,
            Number::Rational {
                numer: -1,
                denom: 1,
            } => Literal::NegativeOne,
            Number::Rational { numer: 1, denom: 2 } => Literal::Half,
            Number::Rational { numer, denom: 1 } => Literal::Integer(numer),
            Number::Rational { numer, denom } => Literal::Rational(numer, denom),
            Number::Float(f) => Literal::Float(f),
        }
    }

    /// The exact value, if the literal has one that can be folded.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Literal::Integer(n) => Some(Number::integer(*n)),
            Literal::Rational(n, d) => Number::rational(*n, *d),
            Literal::Float(f) => Some(Number::Float(*f)),
            Literal::Zero => Some(Number::zero()),
            Literal::One => Some(Number::one()),
            Literal::NegativeOne => Some(Number::integer(-1)),
            Literal::Half => Number::rational(1, 2),
            Literal::Pi | Literal::Exp1 | Literal::ComplexInfinity => None,
        }
    }

    pub fn kind(&self) -> OperatorKind {
        match self {
            Literal::Integer(_) => OperatorKind::Integer,
            Literal::Rational(_, _) => OperatorKind::Rational,
            Literal::Float(_) => OperatorKind::Float,
            Literal::Zero => OperatorKind::Zero,
            Literal::One => OperatorKind::One,
            Literal::NegativeOne => OperatorKind::NegativeOne,
            Literal::Half => OperatorKind::Half,
            Literal::Pi => OperatorKind::Pi,
            Literal::Exp1 => OperatorKind::Exp1,
            Literal::ComplexInfinity => OperatorKind::ComplexInfinity,
        }
    }

    /// Floating point value of the literal.
    pub fn evalf(&self) -> f64 {
        match self {
            Literal::Pi => std::f64::consts::PI,
            Literal::Exp1 => std::f64::consts::E,
            Literal::ComplexInfinity => f64::INFINITY,
            other => other.as_number().map(Number::to_f64).unwrap_or(f64::NAN),
        }
    }

    fn srepr(&self) -> String {
        match self {
            Literal::Integer(n) => format!("Integer({n})"),
            Literal::Rational(n, d) => format!("Rational({n}, {d})"),
            Literal::Float(f) => format!("Float({f:?})"),
            Literal::Zero => "Integer(0)".to_string(),
            Literal::One => "Integer(1)".to_string(),
            Literal::NegativeOne => "Integer(-1)".to_string(),
            Literal::Half => "Rational(1, 2)".to_string(),
            Literal::Pi => "pi".to_string(),
            Literal::Exp1 => "E".to_string(),
            Literal::ComplexInfinity => "zoo".to_string(),
        }
    }

    /// Bitwise view used for equality and hashing, so floats can be interned.
    fn key(&self) -> (u8, i64, i64) {
        match self {
            Literal::Integer(n) => (0, *n, 0),
            Literal::Rational(n, d) => (1, *n, *d),
            Literal::Float(f) => (2, f.to_bits() as i64, 0),
            Literal::Zero => (3, 0, 0),
            Literal::One => (4, 0, 0),
            Literal::NegativeOne => (5, 0, 0),
            Literal::Half => (6, 0, 0),
            Literal::Pi => (7, 0, 0),
            Literal::Exp1 => (8, 0, 0),
            Literal::ComplexInfinity => (9, 0, 0),
        }
    }
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Literal {}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state)
    }
}

/// One node of the symbolic DAG.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SymExpr {
    /// A free variable.
    Symbol(String),
    Literal(Literal),
    Operation { op: OperatorKind, args: Vec<ExprId> },
}

impl SymExpr {
    pub fn args(&self) -> &[ExprId] {
        match self {
            SymExpr::Operation { args, .. } => args,
            _ => &[],
        }
    }
}

/// Owner of all nodes of one or more expressions.
#[derive(Debug, Clone, Default)]
pub struct ExprArena {
    nodes: Vec<SymExpr>,
    interned: FnvHashMap<SymExpr, ExprId>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a node with a fresh identity, even if an equal node exists.
    ///
    /// # Panics
    /// If an argument refers to a node not yet in the arena. Children always precede their
    /// parents, which keeps the arena acyclic.
    pub fn push(&mut self, expr: SymExpr) -> ExprId {
        let id = ExprId(self.nodes.len() as u32);
        assert!(
            expr.args().iter().all(|arg| *arg < id),
            "arguments must be added before the operation using them"
        );
        self.nodes.push(expr);
        id
    }

    /// Add a node, reusing the identity of a structurally equal node if there is one.
    pub fn intern(&mut self, expr: SymExpr) -> ExprId {
        if let Some(id) = self.interned.get(&expr) {
            return *id;
        }
        let id = self.push(expr.clone());
        self.interned.insert(expr, id);
        id
    }

    pub fn symbol<S>(&mut self, name: S) -> ExprId
    where
        S: ToString,
    {
        self.intern(SymExpr::Symbol(name.to_string()))
    }

    pub fn literal(&mut self, literal: Literal) -> ExprId {
        self.intern(SymExpr::Literal(literal))
    }

    pub fn number(&mut self, number: Number) -> ExprId {
        self.literal(Literal::from_number(number))
    }

    pub fn operation(&mut self, op: OperatorKind, args: Vec<ExprId>) -> ExprId {
        self.intern(SymExpr::Operation { op, args })
    }

    pub fn get(&self, id: ExprId) -> &SymExpr {
        &self.nodes[id.index()]
    }

    /// Distinct nodes reachable from `root`, `root` included.
    pub fn reachable_count(&self, root: ExprId) -> usize {
        let mut seen = FnvHashSet::default();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if seen.insert(id) {
                stack.extend_from_slice(self.get(id).args());
            }
        }
        seen.len()
    }

    /// Names of the symbols reachable from `root`, in order of first appearance.
    pub fn free_symbols(&self, root: ExprId) -> Vec<String> {
        let mut names: Vec<String> = vec![];
        let mut seen = FnvHashSet::default();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            match self.get(id) {
                SymExpr::Symbol(name) if !names.contains(name) => names.push(name.clone()),
                node => stack.extend(node.args().iter().rev()),
            }
        }
        names
    }

    /// Constructor-style representation, e.g. `Add(Symbol('x'), Integer(1))`.
    pub fn srepr(&self, id: ExprId) -> String {
        match self.get(id) {
            SymExpr::Symbol(name) => format!("Symbol('{name}')"),
            SymExpr::Literal(literal) => literal.srepr(),
            SymExpr::Operation { op, args } => {
                let args: Vec<String> = args.iter().map(|arg| self.srepr(*arg)).collect();
                format!("{}({})", op, args.join(", "))
            }
        }
    }
}

impl std::ops::Index<ExprId> for ExprArena {
    type Output = SymExpr;

    fn index(&self, id: ExprId) -> &Self::Output {
        self.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_shares_identity() {
        let mut arena = ExprArena::new();
        let x = arena.symbol("x");
        let a = arena.operation(OperatorKind::Mul, vec![x, x]);
        let b = arena.operation(OperatorKind::Mul, vec![x, x]);
        assert_eq!(a, b);

        let fresh = arena.push(SymExpr::Operation {
            op: OperatorKind::Mul,
            args: vec![x, x],
        });
        assert_ne!(a, fresh);
        assert_eq!(arena[a], arena[fresh]);
    }

    #[test]
    fn literal_kinds() {
        assert_eq!(Literal::from_number(Number::integer(2)), Literal::Integer(2));
        assert_eq!(Literal::from_number(Number::integer(0)), Literal::Zero);
        assert_eq!(Literal::from_number(Number::integer(-1)), Literal::NegativeOne);
        assert_eq!(
            Literal::from_number(Number::rational(2, 4).unwrap()),
            Literal::Half
        );
        assert_eq!(Literal::Rational(1, 3).kind(), OperatorKind::Rational);
        assert_eq!(Literal::Half.evalf(), 0.5);
        assert_eq!(Literal::Pi.evalf(), std::f64::consts::PI);
    }

    #[test]
    fn float_literals_intern_by_bits() {
        let mut arena = ExprArena::new();
        let a = arena.literal(Literal::Float(2.5));
        let b = arena.literal(Literal::Float(2.5));
        let c = arena.literal(Literal::Float(-2.5));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn reachable_and_free_symbols() {
        let mut arena = ExprArena::new();
        let y = arena.symbol("y");
        let x = arena.symbol("x");
        let xx = arena.operation(OperatorKind::Mul, vec![x, x]);
        let root = arena.operation(OperatorKind::Add, vec![xx, y, xx]);
        assert_eq!(arena.reachable_count(root), 4);
        assert_eq!(arena.free_symbols(root), vec!["x", "y"]);
        assert_eq!(
            arena.srepr(root),
            "Add(Mul(Symbol('x'), Symbol('x')), Symbol('y'), Mul(Symbol('x'), Symbol('x')))"
        );
    }
}
