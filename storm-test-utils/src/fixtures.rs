//! The `Pet`/`PetType`/`Owner` record types spec.md §8's end-to-end
//! scenarios are written against, plus a [`SchemaCatalog`] wired the same
//! way (spec.md scenario 1: `Pet` has a non-null `petType` FK and a
//! nullable `owner` FK, so expansion emits an inner join for one and a left
//! join for the other).

use chrono::{DateTime, Utc};

use storm_core::{ConvertError, RecordAccess, Value};
use storm_template::{JoinEdge, SchemaCatalog, TableInfo};

/// `Pet(id PK, name, birthDate, petType FK PetType(id), owner FK? Owner(id))`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pet {
    pub id: i64,
    pub name: String,
    pub birth_date: DateTime<Utc>,
    pub pet_type_id: i64,
    pub owner_id: Option<i64>,
}

impl RecordAccess for Pet {
    fn type_name() -> &'static str {
        "Pet"
    }

    fn column_names() -> &'static [&'static str] {
        &["id", "name", "birth_date", "type_id", "owner_id"]
    }

    fn column_value(&self, index: usize) -> Value {
        match index {
            0 => Value::I64(self.id),
            1 => Value::Text(self.name.clone()),
            2 => Value::Timestamp(self.birth_date),
            3 => Value::I64(self.pet_type_id),
            4 => self.owner_id.into(),
            _ => Value::Null,
        }
    }

    fn primary_key_values(&self) -> Vec<Value> {
        vec![Value::I64(self.id)]
    }

    fn from_ordered_values(values: &[Value]) -> Result<Self, ConvertError> {
        let get_i64 = |i: usize| match values.get(i) {
            Some(Value::I64(v)) => Ok(*v),
            other => Err(ConvertError(format!("column {i}: expected I64, got {other:?}"))),
        };
        Ok(Self {
            id: get_i64(0)?,
            name: match values.get(1) {
                Some(Value::Text(s)) => s.clone(),
                other => return Err(ConvertError(format!("column 1: expected Text, got {other:?}"))),
            },
            birth_date: match values.get(2) {
                Some(Value::Timestamp(t)) => *t,
                other => return Err(ConvertError(format!("column 2: expected Timestamp, got {other:?}"))),
            },
            pet_type_id: get_i64(3)?,
            owner_id: match values.get(4) {
                Some(Value::Null) | None => None,
                Some(Value::I64(v)) => Some(*v),
                other => return Err(ConvertError(format!("column 4: expected I64 or Null, got {other:?}"))),
            },
        })
    }
}

/// `PetType(id PK, name)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PetType {
    pub id: i64,
    pub name: String,
}

impl RecordAccess for PetType {
    fn type_name() -> &'static str {
        "PetType"
    }

    fn column_names() -> &'static [&'static str] {
        &["id", "name"]
    }

    fn column_value(&self, index: usize) -> Value {
        match index {
            0 => Value::I64(self.id),
            1 => Value::Text(self.name.clone()),
            _ => Value::Null,
        }
    }

    fn primary_key_values(&self) -> Vec<Value> {
        vec![Value::I64(self.id)]
    }

    fn from_ordered_values(values: &[Value]) -> Result<Self, ConvertError> {
        let id = match values.first() {
            Some(Value::I64(v)) => *v,
            other => return Err(ConvertError(format!("column 0: expected I64, got {other:?}"))),
        };
        let name = match values.get(1) {
            Some(Value::Text(s)) => s.clone(),
            other => return Err(ConvertError(format!("column 1: expected Text, got {other:?}"))),
        };
        Ok(Self { id, name })
    }
}

/// `Owner(id PK, firstName)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Owner {
    pub id: i64,
    pub first_name: String,
}

impl RecordAccess for Owner {
    fn type_name() -> &'static str {
        "Owner"
    }

    fn column_names() -> &'static [&'static str] {
        &["id", "first_name"]
    }

    fn column_value(&self, index: usize) -> Value {
        match index {
            0 => Value::I64(self.id),
            1 => Value::Text(self.first_name.clone()),
            _ => Value::Null,
        }
    }

    fn primary_key_values(&self) -> Vec<Value> {
        vec![Value::I64(self.id)]
    }

    fn from_ordered_values(values: &[Value]) -> Result<Self, ConvertError> {
        let id = match values.first() {
            Some(Value::I64(v)) => *v,
            other => return Err(ConvertError(format!("column 0: expected I64, got {other:?}"))),
        };
        let first_name = match values.get(1) {
            Some(Value::Text(s)) => s.clone(),
            other => return Err(ConvertError(format!("column 1: expected Text, got {other:?}"))),
        };
        Ok(Self { id, first_name })
    }
}

/// A [`SchemaCatalog`] over exactly `Pet`/`PetType`/`Owner`, matching
/// spec.md §8 scenario 1 verbatim: `pet` inner-joins `pet_type` (non-null
/// FK) and left-joins `owner` (nullable FK).
pub struct PetSchemaCatalog;

impl SchemaCatalog for PetSchemaCatalog {
    fn table_info(&self, record_type: &str) -> Result<TableInfo, storm_core::TemplateError> {
        match record_type {
            "Pet" => Ok(TableInfo {
                table_name: "pet".to_string(),
                columns: vec![
                    "id".to_string(),
                    "name".to_string(),
                    "birth_date".to_string(),
                    "type_id".to_string(),
                    "owner_id".to_string(),
                ],
                pk_columns: vec!["id".to_string()],
                insertable_columns: vec![
                    "name".to_string(),
                    "birth_date".to_string(),
                    "type_id".to_string(),
                    "owner_id".to_string(),
                ],
                updatable_columns: vec![
                    "name".to_string(),
                    "birth_date".to_string(),
                    "type_id".to_string(),
                    "owner_id".to_string(),
                ],
                foreign_keys: vec![
                    JoinEdge {
                        referenced_type: "PetType",
                        local_columns: vec!["type_id".to_string()],
                        referenced_columns: vec!["id".to_string()],
                        nullable: false,
                        component_index: 3,
                    },
                    JoinEdge {
                        referenced_type: "Owner",
                        local_columns: vec!["owner_id".to_string()],
                        referenced_columns: vec!["id".to_string()],
                        nullable: true,
                        component_index: 4,
                    },
                ],
            }),
            "PetType" => Ok(TableInfo {
                table_name: "pet_type".to_string(),
                columns: vec!["id".to_string(), "name".to_string()],
                pk_columns: vec!["id".to_string()],
                insertable_columns: vec!["name".to_string()],
                updatable_columns: vec!["name".to_string()],
                foreign_keys: vec![],
            }),
            "Owner" => Ok(TableInfo {
                table_name: "owner".to_string(),
                columns: vec!["id".to_string(), "first_name".to_string()],
                pk_columns: vec!["id".to_string()],
                insertable_columns: vec!["first_name".to_string()],
                updatable_columns: vec!["first_name".to_string()],
                foreign_keys: vec![],
            }),
            other => Err(storm_core::TemplateError::UnresolvedElement {
                detail: format!("no fixture table for record type {other:?}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pet_round_trips_through_ordered_values() {
        let pet = Pet {
            id: 7,
            name: "Rex".to_string(),
            birth_date: Utc::now(),
            pet_type_id: 1,
            owner_id: Some(3),
        };
        let values: Vec<Value> = (0..Pet::column_names().len()).map(|i| pet.column_value(i)).collect();
        let rebuilt = Pet::from_ordered_values(&values).unwrap();
        assert_eq!(pet, rebuilt);
    }

    #[test]
    fn pet_schema_catalog_resolves_the_two_fks() {
        let catalog = PetSchemaCatalog;
        let info = catalog.table_info("Pet").unwrap();
        assert_eq!(info.table_name, "pet");
        assert_eq!(info.foreign_keys.len(), 2);
        assert!(!info.foreign_keys[0].nullable);
        assert!(info.foreign_keys[1].nullable);
    }
}
