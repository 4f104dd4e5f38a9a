//! Element kinds a `TemplateString` slot can hold (spec.md §4.3's table).

use storm_core::Value;
use storm_model::ResolveScope;

use crate::predicate::Predicate;
use crate::template::TemplateString;

/// Which columns a `Select` element emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    /// Only the primary key columns.
    Pk,
    /// All mapped columns, flattened.
    Flat,
    /// All mapped columns, grouped so a row-mapper can reconstruct nested
    /// joined records.
    Nested,
}

/// How an explicit join combines with the table expression that precedes it
/// (spec.md §4.4's `innerJoin`/`leftJoin`/`rightJoin`/`crossJoin`). Distinct
/// from `From`'s `auto_join`, which derives its joins from the FK graph
/// rather than naming an explicit target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
}

/// What a `From`/`Update`/`Delete` element's table reference names.
#[derive(Debug, Clone)]
pub enum FromSource {
    /// A record type, resolved against the model registry.
    Type(&'static str),
    /// A correlated or uncorrelated subquery.
    Subquery(Box<TemplateString>),
}

/// The row source for a `Values` element.
#[derive(Debug, Clone)]
pub enum ValuesSource {
    /// Literal rows, one `Vec<Value>` per record, in column order.
    Records(Vec<Vec<Value>>),
    /// Named bind variables resolved at execution time.
    BindVars(Vec<String>),
}

/// The assignment source for a `Set` element.
#[derive(Debug, Clone)]
pub enum SetSource {
    /// `column = value` pairs taken from a dirty-checked record.
    Record(Vec<(String, Value)>),
    /// Named bind variables, one assignment per name.
    BindVars(Vec<String>),
}

/// The predicate source for a `Where` element.
#[derive(Debug, Clone)]
pub enum WhereSource {
    Predicate(Predicate),
    BindVars(Vec<String>),
}

/// A single typed slot within a [`TemplateString`] (spec.md §4.3).
#[derive(Debug, Clone)]
pub enum Element {
    Select {
        record_type: &'static str,
        mode: SelectMode,
    },
    From {
        source: FromSource,
        alias: Option<String>,
        auto_join: bool,
    },
    Insert {
        record_type: &'static str,
        ignore_auto_generate: bool,
    },
    Values {
        source: ValuesSource,
        ignore_auto_generate: bool,
    },
    Update {
        record_type: &'static str,
        alias: Option<String>,
    },
    /// An explicit join target named by the query builder (spec.md §4.4);
    /// renders its join keyword, table, and alias, and registers the alias
    /// so a following `Where`-rendered `ON` condition can reference it.
    Join {
        kind: JoinKind,
        record_type: &'static str,
        alias: String,
    },
    Set {
        source: SetSource,
    },
    Where {
        source: WhereSource,
    },
    Delete {
        record_type: &'static str,
        alias: Option<String>,
    },
    Table {
        record_type: &'static str,
        scope: ResolveScope,
    },
    Alias {
        record_type: &'static str,
        scope: ResolveScope,
    },
    Column {
        record_type: &'static str,
        field: String,
        scope: ResolveScope,
    },
    Param {
        name: Option<String>,
        value: Value,
    },
    BindVar {
        name: String,
    },
    Subquery {
        inner: Box<TemplateString>,
        correlated: bool,
    },
    /// Raw SQL text inserted verbatim, with no parameter binding.
    Unsafe(String),
}
