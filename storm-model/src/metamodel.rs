//! Metamodel: type-safe path-to-column resolution (C2, spec.md §4.2).

use storm_core::TemplateError;

/// `ResolveScope` governs whether outer-query aliases participate in
/// resolution, for subquery correlation (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveScope {
    /// Both the local query's aliases and any enclosing query's aliases
    /// participate.
    Cascade,
    /// Only the local query's aliases participate; a correlated subquery
    /// cannot see its enclosing query's tables.
    Local,
    /// Only an enclosing query's aliases participate (used when the
    /// metamodel explicitly names the outer table).
    Outer,
}

/// A logical field location within a root record type (spec.md §3).
///
/// Equality is `(table_type, field)`, independent of `path`: two metamodels
/// reached via different navigation paths that land on the same column of
/// the same table compare equal (spec.md P2).
#[derive(Debug, Clone)]
pub struct Metamodel {
    pub root: &'static str,
    pub table_type: &'static str,
    /// Dot-separated navigation from `root` to `table_type`, empty for a
    /// direct field on `root` itself.
    pub path: String,
    pub field: String,
    pub is_column: bool,
    pub is_inline: bool,
}

impl Metamodel {
    /// A metamodel for a field directly on the root type (no navigation).
    pub fn direct(root: &'static str, field: impl Into<String>) -> Self {
        Self {
            root,
            table_type: root,
            path: String::new(),
            field: field.into(),
            is_column: true,
            is_inline: false,
        }
    }

    /// A metamodel reached via a dotted navigation path to a (possibly
    /// nested) joined table.
    pub fn nested(
        root: &'static str,
        table_type: &'static str,
        path: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            root,
            table_type,
            path: path.into(),
            field: field.into(),
            is_column: true,
            is_inline: false,
        }
    }

    /// An inlined-record field: same table as its parent, different logical
    /// component (spec.md §3's "inlined records expanded in place").
    pub fn inline(root: &'static str, table_type: &'static str, path: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            root,
            table_type,
            path: path.into(),
            field: field.into(),
            is_column: true,
            is_inline: true,
        }
    }

    fn canonical_key(&self) -> (&'static str, &str) {
        (self.table_type, self.field.as_str())
    }
}

impl PartialEq for Metamodel {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_key() == other.canonical_key()
    }
}

impl Eq for Metamodel {}

/// A table alias participating in the effective graph of a query: the main
/// table, its auto-joins, and any explicit joins (spec.md §4.2).
#[derive(Debug, Clone)]
pub struct AliasEntry {
    pub table_type: &'static str,
    pub alias: String,
    /// True if this alias comes from an enclosing query (subquery
    /// correlation), false if it is local to the query being resolved.
    pub outer: bool,
}

impl AliasEntry {
    pub fn local(table_type: &'static str, alias: impl Into<String>) -> Self {
        Self {
            table_type,
            alias: alias.into(),
            outer: false,
        }
    }

    pub fn outer(table_type: &'static str, alias: impl Into<String>) -> Self {
        Self {
            table_type,
            alias: alias.into(),
            outer: true,
        }
    }
}

/// Resolve a [`Metamodel`] to a concrete alias within `graph`, per spec.md
/// §4.2:
///
/// 1. **Nested path** — a non-empty `path` already names an unambiguous
///    navigation, so it resolves deterministically without consulting the
///    graph's cardinality.
/// 2. **Short form** — an empty `path` resolves by `table_type` alone,
///    valid iff the target table appears exactly once in the scoped graph.
/// 3. **Ambiguity** — more than one candidate raises `AmbiguousTable`.
pub fn resolve(metamodel: &Metamodel, graph: &[AliasEntry], scope: ResolveScope) -> Result<String, TemplateError> {
    let scoped: Vec<&AliasEntry> = graph
        .iter()
        .filter(|a| match scope {
            ResolveScope::Cascade => true,
            ResolveScope::Local => !a.outer,
            ResolveScope::Outer => a.outer,
        })
        .collect();

    if !metamodel.path.is_empty() {
        // Nested path: the navigation already disambiguates which join this
        // metamodel refers to, so we look for the alias whose table_type
        // matches and whose alias was derived from this exact path. Callers
        // that build the graph are expected to name joined aliases after
        // their navigation path (the query builder does this, see
        // storm-query).
        return scoped
            .iter()
            .find(|a| a.table_type == metamodel.table_type && a.alias == path_alias(&metamodel.path))
            .map(|a| a.alias.clone())
            .ok_or_else(|| TemplateError::UnknownAlias {
                alias: path_alias(&metamodel.path),
            });
    }

    let candidates: Vec<&&AliasEntry> = scoped
        .iter()
        .filter(|a| a.table_type == metamodel.table_type)
        .collect();

    match candidates.len() {
        0 => Err(TemplateError::UnknownAlias {
            alias: metamodel.table_type.to_string(),
        }),
        1 => Ok(candidates[0].alias.clone()),
        _ => Err(TemplateError::AmbiguousTable {
            type_name: metamodel.table_type,
            paths: candidates.iter().map(|a| a.alias.clone()).collect(),
        }),
    }
}

/// Deterministic alias derived from a navigation path, e.g. `"owner.address"`
/// becomes `"owner__address"`. Joins built by the query builder name their
/// alias this way so nested-path metamodels resolve without ambiguity
/// checks.
pub fn path_alias(path: &str) -> String {
    path.replace('.', "__")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_path_and_root() {
        let a = Metamodel::direct("Pet", "name");
        let b = Metamodel::nested("Owner", "Pet", "pets", "name");
        assert_eq!(a, b);
    }

    #[test]
    fn inequality_on_field() {
        let a = Metamodel::direct("Pet", "name");
        let b = Metamodel::direct("Pet", "birth_date");
        assert_ne!(a, b);
    }

    #[test]
    fn short_form_resolves_unique_table() {
        let mm = Metamodel::direct("PetType", "name");
        let graph = vec![
            AliasEntry::local("Pet", "p"),
            AliasEntry::local("PetType", "pt"),
        ];
        assert_eq!(resolve(&mm, &graph, ResolveScope::Cascade).unwrap(), "pt");
    }

    #[test]
    fn short_form_ambiguous_raises_error() {
        let mm = Metamodel::direct("Pet", "name");
        let graph = vec![
            AliasEntry::local("Pet", "p1"),
            AliasEntry::local("Pet", "p2"),
        ];
        let err = resolve(&mm, &graph, ResolveScope::Cascade).unwrap_err();
        assert!(matches!(err, TemplateError::AmbiguousTable { .. }));
    }

    #[test]
    fn local_scope_excludes_outer_aliases() {
        let mm = Metamodel::direct("Pet", "name");
        let graph = vec![AliasEntry::outer("Pet", "op")];
        let err = resolve(&mm, &graph, ResolveScope::Local).unwrap_err();
        assert!(matches!(err, TemplateError::UnknownAlias { .. }));
        assert_eq!(resolve(&mm, &graph, ResolveScope::Cascade).unwrap(), "op");
    }

    #[test]
    fn nested_path_resolves_without_cardinality_check() {
        let mm = Metamodel::nested("Pet", "Owner", "owner", "first_name");
        let graph = vec![
            AliasEntry::local("Pet", "p"),
            AliasEntry::local("Owner", "owner"),
        ];
        assert_eq!(resolve(&mm, &graph, ResolveScope::Cascade).unwrap(), "owner");
    }
}
