//! Storm Query - Query Builder (C4)
//!
//! A fluent composer over `storm-template`'s `Element` stream: joins, where,
//! group-by, order-by, pagination, row locking, and subqueries, producing an
//! immutable [`Query`] (spec.md §4.4).

mod builder;
mod predicate_builder;

pub use builder::{LockRequest, OrderDirection, OrderTerm, Query, QueryBuilder};
pub use predicate_builder::PredicateBuilder;

pub use storm_template::{CompareOp, Element, JoinKind, Operand, Predicate, SelectMode};
