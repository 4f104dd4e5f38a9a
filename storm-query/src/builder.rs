//! The fluent Query Builder (C4, spec.md §4.4): a composer over
//! `storm-template`'s `Element` stream that emits an immutable [`Query`].

use std::marker::PhantomData;

use storm_core::RecordAccess;
use storm_model::Metamodel;
use storm_template::{Element, FromSource, JoinKind, Predicate, SelectMode, TemplateString, WhereSource};

/// Sort direction for an `ORDER BY` term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// One `ORDER BY` term.
#[derive(Debug, Clone)]
pub struct OrderTerm {
    pub column: Metamodel,
    pub direction: OrderDirection,
}

/// Row-locking mode requested by `forShare`/`forUpdate` (spec.md §4.4);
/// rendered by the execution engine against the active `Dialect`, since
/// lock-hint SQL and placement are dialect-specific (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockRequest {
    Share,
    Update,
}

#[derive(Debug, Clone)]
enum StatementKind {
    Select(SelectMode),
    Delete,
}

struct PendingJoin {
    kind: JoinKind,
    record_type: &'static str,
    alias: String,
    on: Predicate,
}

/// An immutable query plan: the rendered template plus the dialect-deferred
/// pagination and locking that `storm-exec` applies at expansion time.
#[derive(Debug, Clone)]
pub struct Query {
    pub template: TemplateString,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub lock: Option<LockRequest>,
}

/// Fluent composer producing an immutable [`Query`] (spec.md §4.4).
///
/// `T` is the root record type named in `selectFrom`/`deleteFrom`; joined
/// types are named per-call on `innerJoin`/`leftJoin`/etc. and do not need
/// to share `T`'s type parameter, matching the spec's "parameterised query
/// builders" redesign guidance (spec.md §9) without requiring a type-level
/// list of every joined type.
pub struct QueryBuilder<T> {
    kind: StatementKind,
    root_type: &'static str,
    root_alias: Option<String>,
    auto_join: bool,
    joins: Vec<PendingJoin>,
    where_predicate: Option<Predicate>,
    group_by: Vec<Metamodel>,
    having: Option<Predicate>,
    order_by: Vec<OrderTerm>,
    limit: Option<u64>,
    offset: Option<u64>,
    lock: Option<LockRequest>,
    appended: Vec<TemplateString>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: RecordAccess> QueryBuilder<T> {
    fn new(kind: StatementKind) -> Self {
        let auto_join_default = matches!(kind, StatementKind::Select(_));
        Self {
            kind,
            root_type: T::type_name(),
            root_alias: None,
            auto_join: auto_join_default,
            joins: Vec::new(),
            where_predicate: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            lock: None,
            appended: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// `SELECT <mode columns> FROM T ...` (spec.md §4.4 `selectFrom`).
    pub fn select_from(mode: SelectMode) -> Self {
        Self::new(StatementKind::Select(mode))
    }

    /// Shorthand for a PK-only projection, for `Ref`-backed lazy loads
    /// (spec.md §4.4 `selectRef`).
    pub fn select_ref() -> Self {
        Self::select_from(SelectMode::Pk)
    }

    /// `DELETE FROM T ...` (spec.md §4.4 `deleteFrom`).
    pub fn delete_from() -> Self {
        Self::new(StatementKind::Delete)
    }

    /// Alias the root table; joins and predicates built afterward can
    /// reference it via [`Metamodel::nested`] keyed on this alias's path.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.root_alias = Some(alias.into());
        self
    }

    /// Whether the root table's declared FK graph is auto-joined (default:
    /// on for `SELECT`, off for `DELETE`, matching spec.md §4.3's
    /// `From.autoJoin`).
    pub fn auto_join(mut self, enabled: bool) -> Self {
        self.auto_join = enabled;
        self
    }

    fn join<J: RecordAccess>(mut self, kind: JoinKind, alias: impl Into<String>, on: Predicate) -> Self {
        self.joins.push(PendingJoin {
            kind,
            record_type: J::type_name(),
            alias: alias.into(),
            on,
        });
        self
    }

    pub fn inner_join<J: RecordAccess>(self, alias: impl Into<String>, on: Predicate) -> Self {
        self.join::<J>(JoinKind::Inner, alias, on)
    }

    pub fn left_join<J: RecordAccess>(self, alias: impl Into<String>, on: Predicate) -> Self {
        self.join::<J>(JoinKind::Left, alias, on)
    }

    pub fn right_join<J: RecordAccess>(self, alias: impl Into<String>, on: Predicate) -> Self {
        self.join::<J>(JoinKind::Right, alias, on)
    }

    /// `CROSS JOIN` has no `ON` condition; pass [`Predicate::Compare`] with
    /// an always-true shape (e.g. `1 = 1` via a raw value comparison) if the
    /// renderer requires one, or prefer [`QueryBuilder::cross_join`].
    pub fn cross_join<J: RecordAccess>(mut self, alias: impl Into<String>) -> Self {
        self.joins.push(PendingJoin {
            kind: JoinKind::Cross,
            record_type: J::type_name(),
            alias: alias.into(),
            on: Predicate::Compare {
                left: storm_template::Operand::Value(storm_core::Value::Bool(true)),
                op: storm_template::CompareOp::IsTrue,
                right: vec![],
            },
        });
        self
    }

    /// Add a `WHERE` predicate, `AND`-combined with any predicate already
    /// present (spec.md §4.4 `where`).
    pub fn where_predicate(mut self, predicate: Predicate) -> Self {
        self.where_predicate = Some(match self.where_predicate {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn group_by(mut self, column: Metamodel) -> Self {
        self.group_by.push(column);
        self
    }

    /// Add a `HAVING` predicate, `AND`-combined with any already present.
    pub fn having(mut self, predicate: Predicate) -> Self {
        self.having = Some(match self.having {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn order_by(mut self, column: Metamodel, direction: OrderDirection) -> Self {
        self.order_by.push(OrderTerm { column, direction });
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn for_share(mut self) -> Self {
        self.lock = Some(LockRequest::Share);
        self
    }

    pub fn for_update(mut self) -> Self {
        self.lock = Some(LockRequest::Update);
        self
    }

    /// Append a raw template fragment verbatim after everything else built
    /// so far (spec.md §4.4 `append`), e.g. a dialect-specific tail the
    /// builder has no typed operation for.
    pub fn append(mut self, template: TemplateString) -> Self {
        self.appended.push(template);
        self
    }

    /// Finish composing, producing an immutable [`Query`] (spec.md §4.4).
    pub fn build(self) -> Query {
        let mut b = TemplateString::builder();

        b = match self.kind {
            StatementKind::Select(mode) => b
                .sql("SELECT ")
                .element(Element::Select {
                    record_type: self.root_type,
                    mode,
                })
                .sql(" FROM "),
            StatementKind::Delete => b.sql("DELETE FROM "),
        };

        b = b.element(Element::From {
            source: FromSource::Type(self.root_type),
            alias: self.root_alias.clone(),
            auto_join: self.auto_join,
        });

        for j in self.joins {
            b = b
                .sql(" ")
                .element(Element::Join {
                    kind: j.kind,
                    record_type: j.record_type,
                    alias: j.alias,
                })
                .sql(" ON ")
                .element(Element::Where {
                    source: WhereSource::Predicate(j.on),
                });
        }

        if let Some(predicate) = self.where_predicate {
            b = b.sql(" WHERE ").element(Element::Where {
                source: WhereSource::Predicate(predicate),
            });
        }

        for (i, column) in self.group_by.iter().enumerate() {
            b = b
                .sql(if i == 0 { " GROUP BY " } else { ", " })
                .element(Element::Column {
                    record_type: column.table_type,
                    field: column.field.clone(),
                    scope: storm_model::ResolveScope::Cascade,
                });
        }

        if let Some(predicate) = self.having {
            b = b.sql(" HAVING ").element(Element::Where {
                source: WhereSource::Predicate(predicate),
            });
        }

        for (i, term) in self.order_by.iter().enumerate() {
            b = b
                .sql(if i == 0 { " ORDER BY " } else { ", " })
                .element(Element::Column {
                    record_type: term.column.table_type,
                    field: term.column.field.clone(),
                    scope: storm_model::ResolveScope::Cascade,
                })
                .sql(match term.direction {
                    OrderDirection::Asc => " ASC",
                    OrderDirection::Desc => " DESC",
                });
        }

        for fragment in self.appended {
            for (i, chunk) in fragment.chunks.iter().enumerate() {
                b = b.sql(chunk);
                if let Some(element) = fragment.slots.get(i) {
                    b = b.element(element.clone());
                }
            }
        }

        Query {
            template: b.build(),
            limit: self.limit,
            offset: self.offset,
            lock: self.lock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storm_core::{ConvertError, Value};

    struct Pet;

    impl RecordAccess for Pet {
        fn type_name() -> &'static str {
            "Pet"
        }
        fn column_names() -> &'static [&'static str] {
            &["id", "name", "owner_id"]
        }
        fn column_value(&self, _index: usize) -> Value {
            Value::Null
        }
        fn primary_key_values(&self) -> Vec<Value> {
            vec![Value::Null]
        }
        fn from_ordered_values(_values: &[Value]) -> Result<Self, ConvertError> {
            Ok(Pet)
        }
    }

    struct Owner;

    impl RecordAccess for Owner {
        fn type_name() -> &'static str {
            "Owner"
        }
        fn column_names() -> &'static [&'static str] {
            &["id", "first_name"]
        }
        fn column_value(&self, _index: usize) -> Value {
            Value::Null
        }
        fn primary_key_values(&self) -> Vec<Value> {
            vec![Value::Null]
        }
        fn from_ordered_values(_values: &[Value]) -> Result<Self, ConvertError> {
            Ok(Owner)
        }
    }

    #[test]
    fn select_from_builds_select_and_from_elements() {
        let q = QueryBuilder::<Pet>::select_from(SelectMode::Flat).build();
        assert!(matches!(q.template.slots[0], Element::Select { .. }));
        assert!(matches!(q.template.slots[1], Element::From { .. }));
    }

    #[test]
    fn where_predicates_combine_with_and() {
        let q = QueryBuilder::<Pet>::select_from(SelectMode::Flat)
            .where_predicate(crate::PredicateBuilder::eq(Metamodel::direct("Pet", "id"), 7i64))
            .where_predicate(crate::PredicateBuilder::is_not_null(Metamodel::direct("Pet", "owner_id")))
            .build();
        let where_slot = q
            .template
            .slots
            .iter()
            .find_map(|e| match e {
                Element::Where {
                    source: WhereSource::Predicate(p),
                } => Some(p),
                _ => None,
            })
            .unwrap();
        assert!(matches!(where_slot, Predicate::And(_, _)));
    }

    #[test]
    fn limit_offset_and_lock_are_structured_not_inlined() {
        let q = QueryBuilder::<Pet>::select_from(SelectMode::Flat)
            .limit(10)
            .offset(20)
            .for_update()
            .build();
        assert_eq!(q.limit, Some(10));
        assert_eq!(q.offset, Some(20));
        assert_eq!(q.lock, Some(LockRequest::Update));
    }

    #[test]
    fn explicit_join_adds_join_and_where_elements_in_order() {
        let q = QueryBuilder::<Pet>::select_from(SelectMode::Flat)
            .left_join::<Owner>(
                "o",
                crate::PredicateBuilder::eq_column(
                    Metamodel::direct("Pet", "owner_id"),
                    Metamodel::nested("Pet", "Owner", "o", "id"),
                ),
            )
            .build();
        let has_join = q.template.slots.iter().any(|e| matches!(e, Element::Join { .. }));
        assert!(has_join);
    }

    #[test]
    fn delete_from_has_no_select_element() {
        let q = QueryBuilder::<Pet>::delete_from().build();
        assert!(!q.template.slots.iter().any(|e| matches!(e, Element::Select { .. })));
    }
}
