//! Storm Model - Model Registry and Metamodel
//!
//! `Model<T>` schema descriptors, reflect-and-cache registration (C1, spec.md
//! §4.1), and type-safe path-to-column resolution (C2, spec.md §4.2).

mod metamodel;
mod model;
mod registry;

pub use metamodel::{path_alias, resolve, AliasEntry, Metamodel, ResolveScope};
pub use model::{
    Column, ErasedConverter, ForeignKey, Model, ModelBuilder, PrimaryKey, Table, VersionColumn,
    VersionKind,
};
pub use registry::{pk_of, ModelRegistry};
