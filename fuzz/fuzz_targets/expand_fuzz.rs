//! Fuzz `Expander::expand` over arbitrary literal text surrounding a `Table`
//! element for an unregistered type: the catalog lookup should fail cleanly
//! with `TemplateError`, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use storm_core::{Dialect, LockClause, TemplateError};
use storm_template::{Element, Expander, ResolveScope, SchemaCatalog, TableInfo, TemplateString};

struct NullDialect;

impl Dialect for NullDialect {
    fn supports_delete_alias(&self) -> bool {
        true
    }
    fn supports_multi_value_tuples(&self) -> bool {
        false
    }
    fn escape(&self, ident: &str) -> String {
        format!("\"{ident}\"")
    }
    fn limit(&self, n: u64) -> String {
        format!("LIMIT {n}")
    }
    fn limit_offset(&self, n: u64, offset: u64) -> String {
        format!("LIMIT {n} OFFSET {offset}")
    }
    fn multi_value_in(&self, _columns: &[String], _row_count: usize) -> String {
        String::new()
    }
    fn for_share(&self) -> Option<LockClause> {
        None
    }
    fn for_update(&self) -> Option<LockClause> {
        None
    }
    fn upsert(&self, _table: &str, _columns: &[String], _conflict_columns: &[String]) -> Option<String> {
        None
    }
}

struct EmptyCatalog;

impl SchemaCatalog for EmptyCatalog {
    fn table_info(&self, record_type: &str) -> Result<TableInfo, TemplateError> {
        Err(TemplateError::UnresolvedElement {
            detail: format!("no such type {record_type}"),
        })
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let template = TemplateString::builder()
        .sql(text)
        .element(Element::Table {
            record_type: "Unregistered",
            scope: ResolveScope::Cascade,
        })
        .sql(text)
        .build();

    let dialect = NullDialect;
    let catalog = EmptyCatalog;
    let expander = Expander::new(&catalog, &dialect);
    let _ = expander.expand(&template);
});
