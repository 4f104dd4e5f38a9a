//! Postgres's implementation of the `Dialect` port (spec.md §6).

use storm_core::{Dialect, LockClause, LockPlacement, Value};

/// Dialect-specific SQL fragments for Postgres.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn supports_delete_alias(&self) -> bool {
        // `DELETE FROM t AS alias USING ... WHERE ...` is valid Postgres.
        true
    }

    fn supports_multi_value_tuples(&self) -> bool {
        // Postgres compares row constructors directly: `(a, b) IN ((1, 2), (3, 4))`.
        true
    }

    fn escape(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn limit(&self, n: u64) -> String {
        format!("LIMIT {n}")
    }

    fn limit_offset(&self, n: u64, offset: u64) -> String {
        format!("LIMIT {n} OFFSET {offset}")
    }

    fn multi_value_in(&self, columns: &[String], row_count: usize) -> String {
        let tuple = format!(
            "({})",
            columns.iter().map(|c| self.escape(c)).collect::<Vec<_>>().join(", ")
        );
        let placeholders = (0..row_count)
            .map(|_| {
                format!(
                    "({})",
                    columns.iter().map(|_| "?").collect::<Vec<_>>().join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{tuple} IN ({placeholders})")
    }

    fn for_share(&self) -> Option<LockClause> {
        Some(LockClause {
            sql: "FOR SHARE".to_string(),
            placement: LockPlacement::Trailing,
        })
    }

    fn for_update(&self) -> Option<LockClause> {
        Some(LockClause {
            sql: "FOR UPDATE".to_string(),
            placement: LockPlacement::Trailing,
        })
    }

    fn upsert(&self, table: &str, columns: &[String], conflict_columns: &[String]) -> Option<String> {
        let escaped_table = self.escape(table);
        let column_list = columns.iter().map(|c| self.escape(c)).collect::<Vec<_>>().join(", ");
        let placeholders = columns.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let conflict_list = conflict_columns
            .iter()
            .map(|c| self.escape(c))
            .collect::<Vec<_>>()
            .join(", ");
        let update_set = columns
            .iter()
            .filter(|c| !conflict_columns.contains(c))
            .map(|c| {
                let escaped = self.escape(c);
                format!("{escaped} = EXCLUDED.{escaped}")
            })
            .collect::<Vec<_>>()
            .join(", ");

        if update_set.is_empty() {
            // Every column participates in the conflict target: nothing to
            // update, so degrade to a no-op conflict (DO NOTHING) rather than
            // emitting an empty SET clause.
            return Some(format!(
                "INSERT INTO {escaped_table} ({column_list}) VALUES ({placeholders}) ON CONFLICT ({conflict_list}) DO NOTHING"
            ));
        }

        Some(format!(
            "INSERT INTO {escaped_table} ({column_list}) VALUES ({placeholders}) ON CONFLICT ({conflict_list}) DO UPDATE SET {update_set}"
        ))
    }

    fn normalize_temporal(&self, value: Value) -> Value {
        // tokio-postgres already round-trips `DateTime<Utc>` as `timestamptz`
        // with no further massaging needed; this dialect has no temporal
        // quirks to normalise away.
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_embedded_quotes() {
        assert_eq!(PostgresDialect.escape("weird\"name"), "\"weird\"\"name\"");
    }

    #[test]
    fn multi_value_in_renders_tuple_comparison() {
        let sql = PostgresDialect.multi_value_in(&["a".to_string(), "b".to_string()], 2);
        assert_eq!(sql, "(\"a\", \"b\") IN ((?, ?), (?, ?))");
    }

    #[test]
    fn upsert_excludes_conflict_columns_from_the_update_set() {
        let sql = PostgresDialect.upsert(
            "pet",
            &["id".to_string(), "name".to_string()],
            &["id".to_string()],
        );
        assert_eq!(
            sql.unwrap(),
            "INSERT INTO \"pet\" (\"id\", \"name\") VALUES (?, ?) ON CONFLICT (\"id\") DO UPDATE SET \"name\" = EXCLUDED.\"name\""
        );
    }
}
