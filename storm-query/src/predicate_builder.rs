//! Fluent construction of [`Predicate`] trees (spec.md §4.4's operator set
//! and `IN (∅)`/`NOT IN (∅)` special cases).

use storm_core::Value;
use storm_model::Metamodel;
use storm_template::{CompareOp, Operand, Predicate};

/// Namespace of constructors for one comparison against a column, mirroring
/// the operator table in spec.md §4.4. Combine the results with
/// [`Predicate::and`]/[`Predicate::or`]/[`Predicate::not`].
pub struct PredicateBuilder;

impl PredicateBuilder {
    fn compare(mm: Metamodel, op: CompareOp, right: Vec<Operand>) -> Predicate {
        Predicate::Compare {
            left: Operand::Column(mm),
            op,
            right,
        }
    }

    pub fn eq(mm: Metamodel, value: impl Into<Value>) -> Predicate {
        Self::compare(mm, CompareOp::Eq, vec![Operand::Value(value.into())])
    }

    pub fn ne(mm: Metamodel, value: impl Into<Value>) -> Predicate {
        Self::compare(mm, CompareOp::Ne, vec![Operand::Value(value.into())])
    }

    pub fn lt(mm: Metamodel, value: impl Into<Value>) -> Predicate {
        Self::compare(mm, CompareOp::Lt, vec![Operand::Value(value.into())])
    }

    pub fn le(mm: Metamodel, value: impl Into<Value>) -> Predicate {
        Self::compare(mm, CompareOp::Le, vec![Operand::Value(value.into())])
    }

    pub fn gt(mm: Metamodel, value: impl Into<Value>) -> Predicate {
        Self::compare(mm, CompareOp::Gt, vec![Operand::Value(value.into())])
    }

    pub fn ge(mm: Metamodel, value: impl Into<Value>) -> Predicate {
        Self::compare(mm, CompareOp::Ge, vec![Operand::Value(value.into())])
    }

    pub fn like(mm: Metamodel, pattern: impl Into<String>) -> Predicate {
        Self::compare(mm, CompareOp::Like, vec![Operand::Value(Value::Text(pattern.into()))])
    }

    pub fn not_like(mm: Metamodel, pattern: impl Into<String>) -> Predicate {
        Self::compare(mm, CompareOp::NotLike, vec![Operand::Value(Value::Text(pattern.into()))])
    }

    /// `IN (values...)`; an empty `values` renders `1<>1` at expansion time
    /// rather than hitting the driver with a zero-argument placeholder list
    /// (spec.md §4.4, P7).
    pub fn in_values(mm: Metamodel, values: Vec<Value>) -> Predicate {
        Self::compare(mm, CompareOp::In, values.into_iter().map(Operand::Value).collect())
    }

    /// `NOT IN (values...)`; an empty `values` renders `1=1` (spec.md §4.4, P7).
    pub fn not_in_values(mm: Metamodel, values: Vec<Value>) -> Predicate {
        Self::compare(mm, CompareOp::NotIn, values.into_iter().map(Operand::Value).collect())
    }

    /// Multi-column tuple `IN`: the dialect's native tuple syntax when
    /// supported, else an OR-of-AND fallback (spec.md §4.4), decided at
    /// expansion time by the `Dialect` in use, not here.
    pub fn tuple_in(columns: Vec<Metamodel>, rows: Vec<Vec<Value>>) -> Predicate {
        let right = rows
            .into_iter()
            .map(|row| Operand::Tuple(row.into_iter().map(Operand::Value).collect()))
            .collect();
        Predicate::Compare {
            left: Operand::Tuple(columns.into_iter().map(Operand::Column).collect()),
            op: CompareOp::In,
            right,
        }
    }

    pub fn tuple_not_in(columns: Vec<Metamodel>, rows: Vec<Vec<Value>>) -> Predicate {
        let right = rows
            .into_iter()
            .map(|row| Operand::Tuple(row.into_iter().map(Operand::Value).collect()))
            .collect();
        Predicate::Compare {
            left: Operand::Tuple(columns.into_iter().map(Operand::Column).collect()),
            op: CompareOp::NotIn,
            right,
        }
    }

    pub fn between(mm: Metamodel, low: impl Into<Value>, high: impl Into<Value>) -> Predicate {
        Self::compare(
            mm,
            CompareOp::Between,
            vec![Operand::Value(low.into()), Operand::Value(high.into())],
        )
    }

    pub fn is_null(mm: Metamodel) -> Predicate {
        Self::compare(mm, CompareOp::IsNull, vec![])
    }

    pub fn is_not_null(mm: Metamodel) -> Predicate {
        Self::compare(mm, CompareOp::IsNotNull, vec![])
    }

    pub fn is_true(mm: Metamodel) -> Predicate {
        Self::compare(mm, CompareOp::IsTrue, vec![])
    }

    pub fn is_false(mm: Metamodel) -> Predicate {
        Self::compare(mm, CompareOp::IsFalse, vec![])
    }

    /// `column = column`, e.g. a join condition between two aliased tables.
    pub fn eq_column(left: Metamodel, right: Metamodel) -> Predicate {
        Predicate::Compare {
            left: Operand::Column(left),
            op: CompareOp::Eq,
            right: vec![Operand::Column(right)],
        }
    }

    pub fn exists(inner: storm_template::TemplateString) -> Predicate {
        Predicate::Exists {
            inner: Box::new(inner),
            negated: false,
        }
    }

    pub fn not_exists(inner: storm_template::TemplateString) -> Predicate {
        Predicate::Exists {
            inner: Box::new(inner),
            negated: true,
        }
    }
}
