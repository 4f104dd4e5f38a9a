//! Two-phase expansion (spec.md §4.3): resolve a [`TemplateString`]'s
//! elements against a schema catalog and alias graph, then render literal
//! chunks and resolved elements into SQL text plus an ordered argument list.

use storm_core::{Dialect, TemplateError, Value};
use storm_model::{path_alias, resolve, AliasEntry, Metamodel, ResolveScope};

use crate::element::{Element, FromSource, JoinKind, SelectMode, SetSource, ValuesSource, WhereSource};
use crate::predicate::{CompareOp, Operand, Predicate};
use crate::template::{escape_literal_question_marks, TemplateString};

/// Parameters collected in bind order, ready to hand to a `Driver`.
pub type ArgList = Vec<Value>;

/// One declared foreign key edge, as the expander needs it to compute
/// auto-joins (spec.md §4.3's "DFS over FK graph").
#[derive(Debug, Clone)]
pub struct JoinEdge {
    pub referenced_type: &'static str,
    pub local_columns: Vec<String>,
    pub referenced_columns: Vec<String>,
    pub nullable: bool,
    /// Declaration order on the owning record type; the tie-break among
    /// joins that are otherwise equal (spec.md §4.3).
    pub component_index: usize,
}

/// Table and column identifiers for one record type, and the foreign keys
/// that seed its auto-joins. An adapter over `storm-model`'s `ModelRegistry`
/// provides this; `storm-template` only consumes the port.
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub table_name: String,
    pub columns: Vec<String>,
    pub pk_columns: Vec<String>,
    pub insertable_columns: Vec<String>,
    pub updatable_columns: Vec<String>,
    pub foreign_keys: Vec<JoinEdge>,
}

/// Resolves a record type name to its [`TableInfo`] (C1/C2 in spec.md §4.3's
/// resolution phase).
pub trait SchemaCatalog: Send + Sync {
    fn table_info(&self, record_type: &str) -> Result<TableInfo, TemplateError>;
}

/// Expands [`TemplateString`]s against a [`SchemaCatalog`] and a [`Dialect`].
pub struct Expander<'a> {
    catalog: &'a dyn SchemaCatalog,
    dialect: &'a dyn Dialect,
}

impl<'a> Expander<'a> {
    pub fn new(catalog: &'a dyn SchemaCatalog, dialect: &'a dyn Dialect) -> Self {
        Self { catalog, dialect }
    }

    /// Run both phases and return the rendered SQL plus its bind arguments
    /// in the order they must be supplied to the driver.
    pub fn expand(&self, template: &TemplateString) -> Result<(String, ArgList), TemplateError> {
        let mut graph: Vec<AliasEntry> = Vec::new();
        let mut sql = String::new();
        let mut args = ArgList::new();

        for (i, chunk) in template.chunks.iter().enumerate() {
            sql.push_str(&escape_literal_question_marks(chunk));
            if let Some(element) = template.slots.get(i) {
                self.render_element(element, &mut graph, &mut sql, &mut args)?;
            }
        }

        Ok((sql, args))
    }

    fn render_element(
        &self,
        element: &Element,
        graph: &mut Vec<AliasEntry>,
        sql: &mut String,
        args: &mut ArgList,
    ) -> Result<(), TemplateError> {
        match element {
            Element::Select { record_type, mode } => self.render_select(record_type, *mode, sql),
            Element::From {
                source,
                alias,
                auto_join,
            } => self.render_from(source, alias.as_deref(), *auto_join, graph, sql, args),
            Element::Insert {
                record_type,
                ignore_auto_generate,
            } => self.render_insert(record_type, *ignore_auto_generate, sql),
            Element::Values {
                source,
                ignore_auto_generate: _,
            } => self.render_values(source, sql, args),
            Element::Update { record_type, alias } => {
                self.render_table_ref(record_type, alias.as_deref(), graph, sql)
            }
            Element::Join { kind, record_type, alias } => self.render_join(*kind, record_type, alias, graph, sql),
            Element::Set { source } => self.render_set(source, sql, args),
            Element::Where { source } => self.render_where(source, graph, sql, args),
            Element::Delete { record_type, alias } => {
                self.render_delete(record_type, alias.as_deref(), graph, sql)
            }
            Element::Table { record_type, scope } => {
                let alias = resolve(&Metamodel::direct(record_type, ""), graph, *scope)?;
                sql.push_str(&self.dialect.escape(&alias));
                Ok(())
            }
            Element::Alias { record_type, scope } => {
                let alias = resolve(&Metamodel::direct(record_type, ""), graph, *scope)?;
                sql.push_str(&self.dialect.escape(&alias));
                Ok(())
            }
            Element::Column {
                record_type,
                field,
                scope,
            } => {
                let alias = resolve(&Metamodel::direct(record_type, field.clone()), graph, *scope)?;
                sql.push_str(&self.dialect.escape(&alias));
                sql.push('.');
                sql.push_str(&self.dialect.escape(field));
                Ok(())
            }
            Element::Param { name: _, value } => {
                args.push(value.clone());
                sql.push('?');
                Ok(())
            }
            Element::BindVar { name: _ } => {
                sql.push('?');
                Ok(())
            }
            Element::Subquery { inner, correlated: _ } => {
                let (inner_sql, inner_args) = self.expand(inner)?;
                sql.push('(');
                sql.push_str(&inner_sql);
                sql.push(')');
                args.extend(inner_args);
                Ok(())
            }
            Element::Unsafe(raw) => {
                sql.push_str(raw);
                Ok(())
            }
        }
    }

    fn render_select(&self, record_type: &str, mode: SelectMode, sql: &mut String) -> Result<(), TemplateError> {
        let info = self.catalog.table_info(record_type)?;
        let cols: &[String] = match mode {
            SelectMode::Pk => &info.pk_columns,
            SelectMode::Flat | SelectMode::Nested => &info.columns,
        };
        let rendered: Vec<String> = cols.iter().map(|c| self.dialect.escape(c)).collect();
        sql.push_str(&rendered.join(", "));
        Ok(())
    }

    fn render_from(
        &self,
        source: &FromSource,
        alias: Option<&str>,
        auto_join: bool,
        graph: &mut Vec<AliasEntry>,
        sql: &mut String,
        args: &mut ArgList,
    ) -> Result<(), TemplateError> {
        match source {
            FromSource::Type(record_type) => {
                let info = self.catalog.table_info(record_type)?;
                let alias_name = alias.map(str::to_string).unwrap_or_else(|| record_type.to_lowercase());
                sql.push_str(&self.dialect.escape(&info.table_name));
                sql.push_str(" AS ");
                sql.push_str(&self.dialect.escape(&alias_name));
                graph.push(AliasEntry::local(record_type, alias_name.clone()));
                if auto_join {
                    self.render_auto_joins(record_type, &alias_name, graph, sql)?;
                }
                Ok(())
            }
            FromSource::Subquery(inner) => {
                let (inner_sql, inner_args) = self.expand(inner)?;
                sql.push('(');
                sql.push_str(&inner_sql);
                sql.push(')');
                args.extend(inner_args);
                if let Some(a) = alias {
                    sql.push_str(" AS ");
                    sql.push_str(&self.dialect.escape(a));
                }
                Ok(())
            }
        }
    }

    /// DFS over the FK graph rooted at `record_type`'s already-aliased row,
    /// one level deep per call site; joins render inner-first, outer-last,
    /// stable by declaration order among equals (spec.md §4.3).
    fn render_auto_joins(
        &self,
        record_type: &str,
        parent_alias: &str,
        graph: &mut Vec<AliasEntry>,
        sql: &mut String,
    ) -> Result<(), TemplateError> {
        let info = self.catalog.table_info(record_type)?;
        let mut edges = info.foreign_keys.clone();
        edges.sort_by_key(|e| (e.nullable, e.component_index));

        for edge in edges {
            let child_info = self.catalog.table_info(edge.referenced_type)?;
            let child_alias = path_alias(&format!("{}.{}", parent_alias, edge.referenced_type.to_lowercase()));
            let join_kw = if edge.nullable { "LEFT JOIN" } else { "INNER JOIN" };

            sql.push(' ');
            sql.push_str(join_kw);
            sql.push(' ');
            sql.push_str(&self.dialect.escape(&child_info.table_name));
            sql.push_str(" AS ");
            sql.push_str(&self.dialect.escape(&child_alias));
            sql.push_str(" ON ");

            let conditions: Vec<String> = edge
                .local_columns
                .iter()
                .zip(edge.referenced_columns.iter())
                .map(|(l, r)| {
                    format!(
                        "{}.{} = {}.{}",
                        self.dialect.escape(parent_alias),
                        self.dialect.escape(l),
                        self.dialect.escape(&child_alias),
                        self.dialect.escape(r)
                    )
                })
                .collect();
            sql.push_str(&conditions.join(" AND "));

            graph.push(AliasEntry::local(edge.referenced_type, child_alias));
        }
        Ok(())
    }

    /// Render an explicit join's keyword, table, and alias, registering the
    /// alias in `graph` so a following `ON` predicate (rendered through a
    /// `Where` element) can reference it (spec.md §4.4).
    fn render_join(
        &self,
        kind: JoinKind,
        record_type: &str,
        alias: &str,
        graph: &mut Vec<AliasEntry>,
        sql: &mut String,
    ) -> Result<(), TemplateError> {
        let info = self.catalog.table_info(record_type)?;
        let keyword = match kind {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Cross => "CROSS JOIN",
        };
        sql.push_str(keyword);
        sql.push(' ');
        sql.push_str(&self.dialect.escape(&info.table_name));
        sql.push_str(" AS ");
        sql.push_str(&self.dialect.escape(alias));
        graph.push(AliasEntry::local(record_type, alias.to_string()));
        Ok(())
    }

    fn render_insert(&self, record_type: &str, ignore_auto_generate: bool, sql: &mut String) -> Result<(), TemplateError> {
        let info = self.catalog.table_info(record_type)?;
        let cols: &[String] = if ignore_auto_generate {
            &info.insertable_columns
        } else {
            &info.columns
        };
        sql.push_str("INTO ");
        sql.push_str(&self.dialect.escape(&info.table_name));
        sql.push('(');
        let rendered: Vec<String> = cols.iter().map(|c| self.dialect.escape(c)).collect();
        sql.push_str(&rendered.join(", "));
        sql.push(')');
        Ok(())
    }

    fn render_values(&self, source: &ValuesSource, sql: &mut String, args: &mut ArgList) -> Result<(), TemplateError> {
        match source {
            ValuesSource::Records(rows) => {
                let rendered: Vec<String> = rows
                    .iter()
                    .map(|row| {
                        args.extend(row.iter().cloned());
                        format!("({})", vec!["?"; row.len()].join(", "))
                    })
                    .collect();
                sql.push_str(&rendered.join(", "));
            }
            ValuesSource::BindVars(names) => {
                sql.push('(');
                sql.push_str(&vec!["?"; names.len()].join(", "));
                sql.push(')');
            }
        }
        Ok(())
    }

    fn render_table_ref(
        &self,
        record_type: &str,
        alias: Option<&str>,
        graph: &mut Vec<AliasEntry>,
        sql: &mut String,
    ) -> Result<(), TemplateError> {
        let info = self.catalog.table_info(record_type)?;
        sql.push_str(&self.dialect.escape(&info.table_name));
        if let Some(a) = alias {
            sql.push_str(" AS ");
            sql.push_str(&self.dialect.escape(a));
            graph.push(AliasEntry::local(record_type, a.to_string()));
        }
        Ok(())
    }

    fn render_delete(
        &self,
        record_type: &str,
        alias: Option<&str>,
        graph: &mut Vec<AliasEntry>,
        sql: &mut String,
    ) -> Result<(), TemplateError> {
        let info = self.catalog.table_info(record_type)?;
        sql.push_str(&self.dialect.escape(&info.table_name));
        if let Some(a) = alias {
            if self.dialect.supports_delete_alias() {
                sql.push_str(" AS ");
                sql.push_str(&self.dialect.escape(a));
                graph.push(AliasEntry::local(record_type, a.to_string()));
            } else {
                graph.push(AliasEntry::local(record_type, info.table_name.clone()));
            }
        }
        Ok(())
    }

    fn render_set(&self, source: &SetSource, sql: &mut String, args: &mut ArgList) -> Result<(), TemplateError> {
        match source {
            SetSource::Record(pairs) => {
                let parts: Vec<String> = pairs
                    .iter()
                    .map(|(col, val)| {
                        args.push(val.clone());
                        format!("{} = ?", self.dialect.escape(col))
                    })
                    .collect();
                sql.push_str(&parts.join(", "));
            }
            SetSource::BindVars(names) => {
                let parts: Vec<String> = names
                    .iter()
                    .map(|n| format!("{} = ?", self.dialect.escape(n)))
                    .collect();
                sql.push_str(&parts.join(", "));
            }
        }
        Ok(())
    }

    fn render_where(
        &self,
        source: &WhereSource,
        graph: &mut Vec<AliasEntry>,
        sql: &mut String,
        args: &mut ArgList,
    ) -> Result<(), TemplateError> {
        match source {
            WhereSource::Predicate(pred) => self.render_predicate(pred, graph, sql, args),
            WhereSource::BindVars(names) => {
                let parts: Vec<String> = names
                    .iter()
                    .map(|n| format!("{} = ?", self.dialect.escape(n)))
                    .collect();
                sql.push_str(&parts.join(" AND "));
                Ok(())
            }
        }
    }

    fn render_predicate(
        &self,
        predicate: &Predicate,
        graph: &mut Vec<AliasEntry>,
        sql: &mut String,
        args: &mut ArgList,
    ) -> Result<(), TemplateError> {
        match predicate {
            Predicate::And(l, r) => {
                sql.push('(');
                self.render_predicate(l, graph, sql, args)?;
                sql.push_str(" AND ");
                self.render_predicate(r, graph, sql, args)?;
                sql.push(')');
                Ok(())
            }
            Predicate::Or(l, r) => {
                sql.push('(');
                self.render_predicate(l, graph, sql, args)?;
                sql.push_str(" OR ");
                self.render_predicate(r, graph, sql, args)?;
                sql.push(')');
                Ok(())
            }
            Predicate::Not(inner) => {
                sql.push_str("NOT (");
                self.render_predicate(inner, graph, sql, args)?;
                sql.push(')');
                Ok(())
            }
            Predicate::Exists { inner, negated } => {
                if *negated {
                    sql.push_str("NOT ");
                }
                sql.push_str("EXISTS (");
                let (inner_sql, inner_args) = self.expand(inner)?;
                sql.push_str(&inner_sql);
                sql.push(')');
                args.extend(inner_args);
                Ok(())
            }
            Predicate::Compare { left, op, right } => self.render_compare(left, *op, right, graph, sql, args),
        }
    }

    fn render_compare(
        &self,
        left: &Operand,
        op: CompareOp,
        right: &[Operand],
        graph: &mut Vec<AliasEntry>,
        sql: &mut String,
        args: &mut ArgList,
    ) -> Result<(), TemplateError> {
        match op {
            CompareOp::In | CompareOp::NotIn => {
                // Empty membership is a constant-truth special case, not an
                // empty IN (), which some dialects reject outright
                // (spec.md §4.4).
                if right.is_empty() {
                    sql.push_str(if matches!(op, CompareOp::In) { "1<>1" } else { "1=1" });
                    return Ok(());
                }
                self.render_membership(left, op, right, graph, sql, args)
            }
            CompareOp::Between => {
                self.render_operand(left, graph, sql, args)?;
                sql.push_str(" BETWEEN ");
                self.render_operand(&right[0], graph, sql, args)?;
                sql.push_str(" AND ");
                self.render_operand(&right[1], graph, sql, args)?;
                Ok(())
            }
            CompareOp::IsNull | CompareOp::IsNotNull | CompareOp::IsTrue | CompareOp::IsFalse => {
                self.render_operand(left, graph, sql, args)?;
                sql.push(' ');
                sql.push_str(op.sql());
                Ok(())
            }
            _ => {
                self.render_operand(left, graph, sql, args)?;
                sql.push(' ');
                sql.push_str(op.sql());
                sql.push(' ');
                self.render_operand(&right[0], graph, sql, args)?;
                Ok(())
            }
        }
    }

    fn render_membership(
        &self,
        left: &Operand,
        op: CompareOp,
        right: &[Operand],
        graph: &mut Vec<AliasEntry>,
        sql: &mut String,
        args: &mut ArgList,
    ) -> Result<(), TemplateError> {
        let columns = match left {
            Operand::Tuple(cols) if cols.len() > 1 => cols.as_slice(),
            _ => std::slice::from_ref(left),
        };

        if columns.len() == 1 || self.dialect.supports_multi_value_tuples() {
            self.render_operand(left, graph, sql, args)?;
            sql.push(' ');
            sql.push_str(op.sql());
            sql.push_str(" (");
            for (i, row) in right.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                self.render_operand(row, graph, sql, args)?;
            }
            sql.push(')');
            return Ok(());
        }

        // No native tuple IN: fall back to OR-of-AND, negating the whole
        // disjunction for NOT IN rather than negating each comparison
        // (spec.md §4.4).
        if matches!(op, CompareOp::NotIn) {
            sql.push_str("NOT ");
        }
        sql.push('(');
        for (i, row) in right.iter().enumerate() {
            if i > 0 {
                sql.push_str(" OR ");
            }
            let values = match row {
                Operand::Tuple(vals) => vals.as_slice(),
                other => std::slice::from_ref(other),
            };
            sql.push('(');
            for (j, (col, val)) in columns.iter().zip(values.iter()).enumerate() {
                if j > 0 {
                    sql.push_str(" AND ");
                }
                self.render_operand(col, graph, sql, args)?;
                sql.push_str(" = ");
                self.render_operand(val, graph, sql, args)?;
            }
            sql.push(')');
        }
        sql.push(')');
        Ok(())
    }

    fn render_operand(
        &self,
        operand: &Operand,
        graph: &mut Vec<AliasEntry>,
        sql: &mut String,
        args: &mut ArgList,
    ) -> Result<(), TemplateError> {
        match operand {
            Operand::Column(metamodel) => {
                let alias = resolve(metamodel, graph, ResolveScope::Cascade)?;
                sql.push_str(&self.dialect.escape(&alias));
                sql.push('.');
                sql.push_str(&self.dialect.escape(&metamodel.field));
                Ok(())
            }
            Operand::Value(v) => {
                args.push(v.clone());
                sql.push('?');
                Ok(())
            }
            Operand::Tuple(items) => {
                sql.push('(');
                for (i, it) in items.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    self.render_operand(it, graph, sql, args)?;
                }
                sql.push(')');
                Ok(())
            }
        }
    }
}
