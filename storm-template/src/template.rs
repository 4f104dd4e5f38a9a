//! `TemplateString`: literal text chunks interleaved with typed [`Element`]
//! slots (spec.md §4.3), built fluently and finalised by a single-pass
//! contextual resolution step for bare type tokens.

use storm_core::RecordAccess;
use storm_model::ResolveScope;

use crate::element::{Element, FromSource, SelectMode, SetSource, ValuesSource, WhereSource};
use crate::predicate::Predicate;

/// A sequence of literal SQL chunks interleaved with resolved [`Element`]
/// slots. Invariant: `chunks.len() == slots.len() + 1`, the same invariant a
/// `format!`-style template maintains between its literal fragments and
/// its arguments.
#[derive(Debug, Clone, Default)]
pub struct TemplateString {
    pub chunks: Vec<String>,
    pub slots: Vec<Element>,
}

impl TemplateString {
    pub fn builder() -> TemplateBuilder {
        TemplateBuilder::new()
    }
}

/// Keyword immediately preceding a bare type token, used to infer which
/// [`Element`] kind it should become (spec.md §4.3's contextual resolution).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrecedingKeyword {
    Select,
    From,
    InsertInto,
    Update,
    Delete,
    WhereValuesOrSet,
}

fn preceding_keyword(chunk: &str) -> Option<PrecedingKeyword> {
    let upper = chunk.trim_end().to_uppercase();
    if upper.ends_with("INSERT INTO") {
        Some(PrecedingKeyword::InsertInto)
    } else if upper.ends_with("SELECT") {
        Some(PrecedingKeyword::Select)
    } else if upper.ends_with("FROM") {
        Some(PrecedingKeyword::From)
    } else if upper.ends_with("UPDATE") {
        Some(PrecedingKeyword::Update)
    } else if upper.ends_with("DELETE") {
        Some(PrecedingKeyword::Delete)
    } else if upper.ends_with("WHERE") || upper.ends_with("VALUES") || upper.ends_with("SET") {
        Some(PrecedingKeyword::WhereValuesOrSet)
    } else {
        None
    }
}

/// A bare `.ty::<T>()` token hasn't committed to an [`Element`] kind until
/// [`TemplateBuilder::build`] sees both the literal chunk before it and the
/// one after it.
enum PendingSlot {
    Bare { record_type: &'static str },
    Resolved(Element),
}

/// Fluent constructor for a [`TemplateString`].
///
/// Two ways to add a slot: an explicit, already-typed [`Element`] (the path
/// the query builder uses), or a bare record type via [`TemplateBuilder::ty`],
/// whose [`Element`] kind is only decided at [`TemplateBuilder::build`] time
/// by the surrounding literal text (spec.md §4.3's contextual resolution).
pub struct TemplateBuilder {
    chunks: Vec<String>,
    pending: Vec<PendingSlot>,
    current: String,
}

impl TemplateBuilder {
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            pending: Vec::new(),
            current: String::new(),
        }
    }

    fn close_chunk(&mut self) {
        self.chunks.push(std::mem::take(&mut self.current));
    }

    /// Append literal SQL text.
    pub fn sql(mut self, text: &str) -> Self {
        self.current.push_str(text);
        self
    }

    /// Append a bare type token whose element kind is inferred from context
    /// at build time (spec.md §4.3).
    pub fn ty<T: RecordAccess>(mut self) -> Self {
        self.close_chunk();
        self.pending.push(PendingSlot::Bare {
            record_type: T::type_name(),
        });
        self
    }

    /// Append an already-resolved element.
    pub fn element(mut self, element: Element) -> Self {
        self.close_chunk();
        self.pending.push(PendingSlot::Resolved(element));
        self
    }

    pub fn select<T: RecordAccess>(self, mode: SelectMode) -> Self {
        self.element(Element::Select {
            record_type: T::type_name(),
            mode,
        })
    }

    pub fn from_type<T: RecordAccess>(self, alias: Option<String>, auto_join: bool) -> Self {
        self.element(Element::From {
            source: FromSource::Type(T::type_name()),
            alias,
            auto_join,
        })
    }

    pub fn from_subquery(self, inner: TemplateString, alias: Option<String>) -> Self {
        self.element(Element::From {
            source: FromSource::Subquery(Box::new(inner)),
            alias,
            auto_join: false,
        })
    }

    pub fn insert<T: RecordAccess>(self, ignore_auto_generate: bool) -> Self {
        self.element(Element::Insert {
            record_type: T::type_name(),
            ignore_auto_generate,
        })
    }

    pub fn values(self, source: ValuesSource, ignore_auto_generate: bool) -> Self {
        self.element(Element::Values {
            source,
            ignore_auto_generate,
        })
    }

    pub fn update<T: RecordAccess>(self, alias: Option<String>) -> Self {
        self.element(Element::Update {
            record_type: T::type_name(),
            alias,
        })
    }

    pub fn set(self, source: SetSource) -> Self {
        self.element(Element::Set { source })
    }

    pub fn where_predicate(self, predicate: Predicate) -> Self {
        self.element(Element::Where {
            source: WhereSource::Predicate(predicate),
        })
    }

    pub fn where_bind_vars(self, names: Vec<String>) -> Self {
        self.element(Element::Where {
            source: WhereSource::BindVars(names),
        })
    }

    pub fn delete<T: RecordAccess>(self, alias: Option<String>) -> Self {
        self.element(Element::Delete {
            record_type: T::type_name(),
            alias,
        })
    }

    pub fn param(self, name: Option<String>, value: storm_core::Value) -> Self {
        self.element(Element::Param { name, value })
    }

    pub fn bind_var(self, name: impl Into<String>) -> Self {
        self.element(Element::BindVar { name: name.into() })
    }

    pub fn subquery(self, inner: TemplateString, correlated: bool) -> Self {
        self.element(Element::Subquery {
            inner: Box::new(inner),
            correlated,
        })
    }

    /// Raw text with no parameter binding (spec.md §4.3's `Unsafe` kind).
    pub fn unsafe_sql(self, raw: impl Into<String>) -> Self {
        self.element(Element::Unsafe(raw.into()))
    }

    /// Finalise the template, resolving every bare type token's element kind
    /// against the literal text immediately before and after it.
    pub fn build(mut self) -> TemplateString {
        self.close_chunk();
        debug_assert_eq!(self.chunks.len(), self.pending.len() + 1);

        let slots: Vec<Element> = self
            .pending
            .into_iter()
            .enumerate()
            .map(|(i, slot)| match slot {
                PendingSlot::Resolved(element) => element,
                PendingSlot::Bare { record_type } => {
                    resolve_bare_slot(record_type, &self.chunks[i], &self.chunks[i + 1])
                }
            })
            .collect();

        TemplateString {
            chunks: self.chunks,
            slots,
        }
    }
}

impl Default for TemplateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_bare_slot(record_type: &'static str, preceding: &str, following: &str) -> Element {
    match preceding_keyword(preceding) {
        Some(PrecedingKeyword::Select) => Element::Select {
            record_type,
            mode: SelectMode::Flat,
        },
        Some(PrecedingKeyword::From) => Element::From {
            source: FromSource::Type(record_type),
            alias: None,
            auto_join: true,
        },
        Some(PrecedingKeyword::InsertInto) => Element::Insert {
            record_type,
            ignore_auto_generate: false,
        },
        Some(PrecedingKeyword::Update) => Element::Update {
            record_type,
            alias: None,
        },
        Some(PrecedingKeyword::Delete) => Element::Delete {
            record_type,
            alias: None,
        },
        // WHERE/VALUES/SET don't have a table-token shape of their own; a
        // bare type token there is a column-path reference like any other,
        // so it falls through to the Table/Alias rule below.
        Some(PrecedingKeyword::WhereValuesOrSet) | None => {
            if following.starts_with('.') {
                Element::Alias {
                    record_type,
                    scope: ResolveScope::Cascade,
                }
            } else {
                Element::Table {
                    record_type,
                    scope: ResolveScope::Cascade,
                }
            }
        }
    }
}

/// Escape literal `?` characters in a rendered literal chunk so they are not
/// mistaken for a parameter placeholder once the template is flattened into
/// driver-facing SQL text (spec.md §4.3).
pub fn escape_literal_question_marks(chunk: &str) -> String {
    chunk.replace('?', "??")
}

#[cfg(test)]
mod tests {
    use super::*;
    use storm_core::Value;

    struct Pet;

    impl RecordAccess for Pet {
        fn type_name() -> &'static str {
            "Pet"
        }
        fn column_names() -> &'static [&'static str] {
            &["id", "name"]
        }
        fn column_value(&self, _index: usize) -> Value {
            Value::Null
        }
        fn primary_key_values(&self) -> Vec<Value> {
            vec![Value::Null]
        }
        fn from_ordered_values(_values: &[Value]) -> Result<Self, storm_core::ConvertError> {
            Ok(Pet)
        }
    }

    #[test]
    fn bare_token_after_from_becomes_from_element() {
        let t = TemplateString::builder()
            .sql("SELECT * FROM ")
            .ty::<Pet>()
            .sql(" WHERE id = ?")
            .build();
        assert!(matches!(t.slots[0], Element::From { .. }));
    }

    #[test]
    fn bare_token_followed_by_dot_becomes_alias() {
        let t = TemplateString::builder()
            .sql("WHERE ")
            .ty::<Pet>()
            .sql(".name = 'Rex'")
            .build();
        assert!(matches!(t.slots[0], Element::Alias { .. }));
    }

    #[test]
    fn bare_token_otherwise_becomes_table() {
        let t = TemplateString::builder()
            .sql("JOIN ")
            .ty::<Pet>()
            .sql(" ON 1=1")
            .build();
        assert!(matches!(t.slots[0], Element::Table { .. }));
    }

    #[test]
    fn chunk_count_matches_slot_count_plus_one() {
        let t = TemplateString::builder()
            .sql("SELECT * FROM ")
            .ty::<Pet>()
            .sql(" WHERE ")
            .ty::<Pet>()
            .sql(".id = 1")
            .build();
        assert_eq!(t.chunks.len(), t.slots.len() + 1);
    }

    #[test]
    fn escapes_literal_question_marks() {
        assert_eq!(escape_literal_question_marks("a ? b"), "a ?? b");
    }
}
