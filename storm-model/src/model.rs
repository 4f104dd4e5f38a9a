//! Schema descriptors (spec.md §3): `Model<T>`, `Column`, `PrimaryKey`,
//! `ForeignKey`, and the version column.

use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use storm_core::Value;

/// A qualified table (or view) name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub schema: Option<String>,
    pub name: String,
    /// Force identifier escaping even when the dialect wouldn't otherwise
    /// require it (e.g. a table name that collides with a reserved word).
    pub force_escape: bool,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
            force_escape: false,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn escaped(mut self) -> Self {
        self.force_escape = true;
        self
    }
}

/// A single mapped column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    /// Position of the owning record component in declaration order, with
    /// inlined records expanded in place (spec.md §3).
    pub component_index: usize,
    pub insertable: bool,
    pub updatable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, component_index: usize) -> Self {
        Self {
            name: name.into(),
            component_index,
            insertable: true,
            updatable: true,
        }
    }

    pub fn not_insertable(mut self) -> Self {
        self.insertable = false;
        self
    }

    pub fn not_updatable(mut self) -> Self {
        self.updatable = false;
        self
    }
}

/// The primary key shape of a record type (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryKey {
    None,
    Identity(Column),
    Sequence { sequence_name: String, column: Column },
    Composite(Vec<Column>),
}

impl PrimaryKey {
    /// The PK columns, in declaration order, regardless of shape.
    pub fn columns(&self) -> Vec<&Column> {
        match self {
            PrimaryKey::None => Vec::new(),
            PrimaryKey::Identity(c) => vec![c],
            PrimaryKey::Sequence { column, .. } => vec![column],
            PrimaryKey::Composite(cols) => cols.iter().collect(),
        }
    }

    /// True for generation strategies the execution engine must capture a
    /// generated key for on insert (spec.md §4.6).
    pub fn is_auto_generated(&self) -> bool {
        matches!(self, PrimaryKey::Identity(_) | PrimaryKey::Sequence { .. })
    }
}

/// Numeric or temporal semantics of the optimistic-lock version column
/// (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionKind {
    Numeric,
    Temporal,
}

/// The optimistic-lock version column, always included in the UPDATE WHERE
/// clause and auto-bumped (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionColumn {
    pub column: Column,
    pub kind: VersionKind,
}

/// A foreign key from `local_columns` on this model to `referenced_columns`
/// on `referenced_type` (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub referenced_type: &'static str,
    pub local_columns: Vec<String>,
    pub referenced_columns: Vec<String>,
    /// Whether the referencing component is `Option<Ref<_>>` (nullable FK,
    /// emitted as a LEFT JOIN by the template engine, spec.md §4.3).
    pub nullable: bool,
}

/// A converter that has already been erased to operate on [`Value`], so
/// `Model` does not need to be generic over each column's domain type.
/// Concrete `Converter<D>` implementations are adapted into this at
/// registration time (see `storm-model::registry::adapt_converter`).
pub trait ErasedConverter: Send + Sync {
    fn to_database(&self, value: &Value) -> Value;
    fn from_database(&self, value: &Value) -> Result<Value, storm_core::ConvertError>;
}

/// Schema descriptor for a record type `T`, computed once and cached by the
/// [`crate::registry::ModelRegistry`] (spec.md §3, §4.1).
pub struct Model<T> {
    pub table: Table,
    /// Columns in canonical (declaration) order.
    pub columns: Vec<Column>,
    pub pk: PrimaryKey,
    pub version: Option<VersionColumn>,
    /// Component index -> foreign key.
    pub fks: HashMap<usize, ForeignKey>,
    pub converters: HashMap<String, Arc<dyn ErasedConverter>>,
    _marker: PhantomData<fn() -> T>,
}

// Manual impls: `T` never actually appears in a field, so Model<T> should
// not require T: Debug/Clone to derive these.
impl<T> std::fmt::Debug for Model<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("pk", &self.pk)
            .field("version", &self.version)
            .field("fks", &self.fks)
            .finish()
    }
}

impl<T> Model<T> {
    /// Column in insertion order, excluding `insertable=false` columns
    /// (spec.md §3).
    pub fn insertable_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.insertable)
    }

    /// Columns eligible for UPDATE, excluding `updatable=false` columns
    /// (spec.md §3).
    pub fn updatable_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.updatable)
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Builds a [`Model<T>`], validating the invariants in spec.md §3.
pub struct ModelBuilder<T> {
    table: Table,
    columns: Vec<Column>,
    pk: PrimaryKey,
    version: Option<VersionColumn>,
    fks: HashMap<usize, ForeignKey>,
    converters: HashMap<String, Arc<dyn ErasedConverter>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ModelBuilder<T> {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            columns: Vec::new(),
            pk: PrimaryKey::None,
            version: None,
            fks: HashMap::new(),
            converters: HashMap::new(),
            _marker: PhantomData,
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn pk(mut self, pk: PrimaryKey) -> Self {
        self.pk = pk;
        self
    }

    pub fn version(mut self, version: VersionColumn) -> Self {
        self.version = Some(version);
        self
    }

    pub fn foreign_key(mut self, component_index: usize, fk: ForeignKey) -> Self {
        self.fks.insert(component_index, fk);
        self
    }

    pub fn converter(mut self, column: impl Into<String>, conv: Arc<dyn ErasedConverter>) -> Self {
        self.converters.insert(column.into(), conv);
        self
    }

    /// Finish building, validating the invariants in spec.md §3:
    /// exactly one PK group, no duplicate column names, FK targets known,
    /// sequence PKs name a sequence.
    pub fn build(self) -> Result<Model<T>, storm_core::ConfigError>
    where
        T: 'static,
    {
        let type_name = std::any::type_name::<T>();
        let type_name: &'static str = Box::leak(type_name.to_string().into_boxed_str());

        if matches!(self.pk, PrimaryKey::None) {
            return Err(storm_core::ConfigError::MissingPrimaryKey { type_name });
        }
        if let PrimaryKey::Sequence { sequence_name, .. } = &self.pk {
            if sequence_name.trim().is_empty() {
                return Err(storm_core::ConfigError::SequenceNameRequired { type_name });
            }
        }

        let mut seen = std::collections::HashSet::new();
        for col in &self.columns {
            if !seen.insert(col.name.clone()) {
                return Err(storm_core::ConfigError::ColumnNameCollision {
                    type_name,
                    column: col.name.clone(),
                });
            }
        }

        Ok(Model {
            table: self.table,
            columns: self.columns,
            pk: self.pk,
            version: self.version,
            fks: self.fks,
            converters: self.converters,
            _marker: PhantomData,
        })
    }
}

/// Type-erased handle stored in the registry cache; downcast back to
/// `Arc<Model<T>>` on lookup.
pub(crate) fn erase<T: 'static>(model: Arc<Model<T>>) -> Arc<dyn Any + Send + Sync> {
    model as Arc<dyn Any + Send + Sync>
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pet;

    #[test]
    fn missing_pk_is_rejected() {
        let err = ModelBuilder::<Pet>::new(Table::new("pet"))
            .column(Column::new("name", 0))
            .build()
            .unwrap_err();
        assert!(matches!(err, storm_core::ConfigError::MissingPrimaryKey { .. }));
    }

    #[test]
    fn duplicate_column_name_is_rejected() {
        let err = ModelBuilder::<Pet>::new(Table::new("pet"))
            .column(Column::new("id", 0))
            .column(Column::new("id", 1))
            .pk(PrimaryKey::Identity(Column::new("id", 0)))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            storm_core::ConfigError::ColumnNameCollision { .. }
        ));
    }

    #[test]
    fn sequence_pk_requires_name() {
        let err = ModelBuilder::<Pet>::new(Table::new("pet"))
            .column(Column::new("id", 0))
            .pk(PrimaryKey::Sequence {
                sequence_name: String::new(),
                column: Column::new("id", 0),
            })
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            storm_core::ConfigError::SequenceNameRequired { .. }
        ));
    }

    #[test]
    fn insertable_and_updatable_filters() {
        let model = ModelBuilder::<Pet>::new(Table::new("pet"))
            .column(Column::new("id", 0).not_insertable().not_updatable())
            .column(Column::new("name", 1))
            .pk(PrimaryKey::Identity(Column::new("id", 0)))
            .build()
            .unwrap();
        assert_eq!(model.insertable_columns().count(), 1);
        assert_eq!(model.updatable_columns().count(), 1);
    }
}
