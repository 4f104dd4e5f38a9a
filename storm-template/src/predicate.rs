//! Predicate AST rendered by a `Where` element (spec.md §4.4's operator set).

use storm_core::Value;
use storm_model::Metamodel;

/// Comparison and membership operators supported by the predicate builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    NotLike,
    In,
    NotIn,
    Between,
    IsNull,
    IsNotNull,
    IsTrue,
    IsFalse,
}

impl CompareOp {
    /// The SQL rendering of a binary operator, where one exists (`IN`/`NOT
    /// IN`/`BETWEEN`/the `IS ...` family render their own shape and are
    /// handled separately by the renderer).
    pub fn sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Like => "LIKE",
            CompareOp::NotLike => "NOT LIKE",
            CompareOp::In => "IN",
            CompareOp::NotIn => "NOT IN",
            CompareOp::Between => "BETWEEN",
            CompareOp::IsNull => "IS NULL",
            CompareOp::IsNotNull => "IS NOT NULL",
            CompareOp::IsTrue => "IS TRUE",
            CompareOp::IsFalse => "IS FALSE",
        }
    }
}

/// One side of a comparison: either a resolved column reference or a bound
/// value.
#[derive(Debug, Clone)]
pub enum Operand {
    Column(Metamodel),
    Value(Value),
    /// A tuple of operands, for multi-column comparisons such as composite
    /// tuple `IN`.
    Tuple(Vec<Operand>),
}

/// A predicate tree built by `storm-query`'s `PredicateBuilder` and rendered
/// by a template's `Where` element.
#[derive(Debug, Clone)]
pub enum Predicate {
    Compare {
        left: Operand,
        op: CompareOp,
        right: Vec<Operand>,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
    /// `EXISTS (subquery)` / correlated subquery predicate.
    Exists {
        inner: Box<crate::template::TemplateString>,
        negated: bool,
    },
}

impl Predicate {
    pub fn and(self, other: Predicate) -> Predicate {
        Predicate::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Predicate {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    pub fn not(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }

    /// Whether this predicate's right-hand side is an empty `IN`/`NOT IN`
    /// set, which renders as the spec.md §4.4 special case (`1<>1`/`1=1`)
    /// rather than an empty `IN ()`.
    pub fn is_empty_membership(&self) -> Option<bool> {
        match self {
            Predicate::Compare { op: CompareOp::In, right, .. } if right.is_empty() => Some(false),
            Predicate::Compare { op: CompareOp::NotIn, right, .. } if right.is_empty() => Some(true),
            _ => None,
        }
    }
}
