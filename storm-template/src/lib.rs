//! Storm Template - Template Engine (C3)
//!
//! `TemplateString`s made of literal SQL chunks and typed [`Element`] slots,
//! a fluent builder with contextual resolution for bare record-type tokens,
//! and the two-phase expansion algorithm that renders a template into SQL
//! text plus an ordered argument list.

mod element;
mod expand;
mod predicate;
mod template;

pub use element::{Element, FromSource, JoinKind, SelectMode, SetSource, ValuesSource, WhereSource};
pub use expand::{ArgList, Expander, JoinEdge, SchemaCatalog, TableInfo};
pub use predicate::{CompareOp, Operand, Predicate};
pub use template::{escape_literal_question_marks, TemplateBuilder, TemplateString};

pub use storm_model::ResolveScope;
