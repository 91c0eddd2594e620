//! Extracted SQL model: catalogs, schemas, tables, columns, indexes and
//! foreign keys.
//!
//! This is the database-agnostic snapshot both sides of a comparison are
//! expressed in. The extractor produces one, the model converter renders the
//! domain model into one, and the pruner mutates one in place.

use crate::model::types::StorageType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whole extracted model: every catalog visible to the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageModel {
    /// Catalogs keyed by physical name.
    pub catalogs: BTreeMap<String, Catalog>,
}

impl StorageModel {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a model holding a single catalog.
    pub fn single(catalog: Catalog) -> Self {
        let mut model = Self::new();
        model.add_catalog(catalog);
        model
    }

    /// Insert a catalog, replacing any existing one with the same name.
    pub fn add_catalog(&mut self, catalog: Catalog) {
        self.catalogs.insert(catalog.name.clone(), catalog);
    }

    /// Look up a catalog by physical name.
    pub fn catalog(&self, name: &str) -> Option<&Catalog> {
        self.catalogs.get(name)
    }

    /// Look up a catalog mutably by physical name.
    pub fn catalog_mut(&mut self, name: &str) -> Option<&mut Catalog> {
        self.catalogs.get_mut(name)
    }

    /// Name of the only catalog, if the model holds exactly one.
    pub fn single_catalog_name(&self) -> Option<&str> {
        if self.catalogs.len() == 1 {
            self.catalogs.keys().next().map(|s| s.as_str())
        } else {
            None
        }
    }

    /// Total number of tables across all catalogs and schemas.
    pub fn table_count(&self) -> usize {
        self.catalogs
            .values()
            .flat_map(|c| c.schemas.values())
            .map(|s| s.tables.len())
            .sum()
    }
}

/// One physical catalog (database).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Physical catalog name.
    pub name: String,

    /// Schema used when a rule or mapping names none.
    pub default_schema: String,

    /// Schemas keyed by name.
    pub schemas: BTreeMap<String, Schema>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new(name: impl Into<String>, default_schema: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_schema: default_schema.into(),
            schemas: BTreeMap::new(),
        }
    }

    /// Insert a schema, replacing any existing one with the same name.
    pub fn add_schema(&mut self, schema: Schema) {
        self.schemas.insert(schema.name.clone(), schema);
    }

    /// Look up a schema by name.
    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    /// Look up a schema mutably by name.
    pub fn schema_mut(&mut self, name: &str) -> Option<&mut Schema> {
        self.schemas.get_mut(name)
    }

    /// Remove every foreign key in any schema of this catalog whose owner or
    /// referenced table is `schema.table`. Returns the number removed.
    pub fn remove_foreign_keys_for_table(&mut self, schema: &str, table: &str) -> usize {
        let mut removed = 0;
        for (owner_schema, s) in self.schemas.iter_mut() {
            let owner_schema = owner_schema.clone();
            for t in s.tables.values_mut() {
                let owner_matches = owner_schema == schema && t.name == table;
                let before = t.foreign_keys.len();
                t.foreign_keys.retain(|fk| {
                    let references = fk.ref_schema == schema && fk.ref_table == table;
                    !(owner_matches || references)
                });
                removed += before - t.foreign_keys.len();
            }
        }
        removed
    }

    /// Remove every foreign key in any schema of this catalog that involves
    /// column `schema.table.column` on either end. Returns the number removed.
    pub fn remove_foreign_keys_for_column(
        &mut self,
        schema: &str,
        table: &str,
        column: &str,
    ) -> usize {
        let mut removed = 0;
        for (owner_schema, s) in self.schemas.iter_mut() {
            let owner_schema = owner_schema.clone();
            for t in s.tables.values_mut() {
                let owner_matches = owner_schema == schema && t.name == table;
                let before = t.foreign_keys.len();
                t.foreign_keys.retain(|fk| {
                    let owns_column = owner_matches && fk.columns.iter().any(|c| c == column);
                    let references_column = fk.ref_schema == schema
                        && fk.ref_table == table
                        && fk.ref_columns.iter().any(|c| c == column);
                    !(owns_column || references_column)
                });
                removed += before - t.foreign_keys.len();
            }
        }
        removed
    }
}

/// One schema inside a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Schema name.
    pub name: String,

    /// Tables keyed by name.
    pub tables: BTreeMap<String, Table>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: BTreeMap::new(),
        }
    }

    /// Insert a table, replacing any existing one with the same name.
    pub fn add_table(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    /// Look up a table by name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }
}

/// Table metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Column definitions in ordinal order.
    pub columns: Vec<Column>,

    /// Secondary indexes.
    pub indexes: Vec<Index>,

    /// Foreign keys owned by this table.
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    /// Create a table with the given columns and no indexes or foreign keys.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether the table has a column with the given name.
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Remove a column by name. Returns whether anything was removed.
    pub fn remove_column(&mut self, name: &str) -> bool {
        let before = self.columns.len();
        self.columns.retain(|c| c.name != name);
        self.columns.len() != before
    }

    /// Remove every index whose key or include list contains the column.
    /// Returns the number removed.
    pub fn remove_indexes_containing(&mut self, column: &str) -> usize {
        let before = self.indexes.len();
        self.indexes.retain(|ix| {
            !(ix.columns.iter().any(|c| c == column) || ix.include_cols.iter().any(|c| c == column))
        });
        before - self.indexes.len()
    }
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Storage type.
    pub column_type: StorageType,
}

impl Column {
    /// Create a column.
    pub fn new(name: impl Into<String>, column_type: StorageType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Index metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,

    /// Key column names.
    pub columns: Vec<String>,

    /// Whether the index is unique.
    pub is_unique: bool,

    /// Included columns (non-key).
    #[serde(default)]
    pub include_cols: Vec<String>,
}

/// Foreign key metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,

    /// Owning-side column names.
    pub columns: Vec<String>,

    /// Referenced schema name.
    pub ref_schema: String,

    /// Referenced table name.
    pub ref_table: String,

    /// Referenced column names.
    pub ref_columns: Vec<String>,
}

/// Fully qualified `schema.table` name for log lines.
pub fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", schema, table)
}
