//! Removes ignored structures from an extracted storage model.
//!
//! Ignore rules make parts of the database invisible to the engine: a
//! pruned table or column is never reported as extra, never diffed and
//! never touched by generated DDL. Pruning runs right after extraction,
//! before the model reaches the differencer.

use crate::config::{IgnoreRule, UpgradeConfiguration};
use crate::model::schema::{qualified, Catalog, StorageModel};
use tracing::debug;

/// Applies the configuration's ignore rules to extracted models.
pub struct SchemaPruner<'a> {
    config: &'a UpgradeConfiguration,
}

impl<'a> SchemaPruner<'a> {
    /// Pruner over the given configuration's ignore rules.
    pub fn new(config: &'a UpgradeConfiguration) -> Self {
        SchemaPruner { config }
    }

    /// Apply every ignore rule to the model, in rule order.
    ///
    /// Rules naming catalogs, schemas, tables or columns that do not
    /// exist are skipped silently, which also makes pruning idempotent.
    pub fn apply(&self, model: &mut StorageModel) {
        for rule in &self.config.ignore_rules {
            self.apply_rule(model, rule);
        }
    }

    fn apply_rule(&self, model: &mut StorageModel, rule: &IgnoreRule) {
        let Some(catalog_name) = self.resolve_catalog(model, rule) else {
            debug!("Skipping ignore rule: unresolvable database {:?}", rule.database);
            return;
        };
        let Some(catalog) = model.catalog_mut(&catalog_name) else {
            debug!("Skipping ignore rule: no catalog '{}'", catalog_name);
            return;
        };

        let schema_name = match &rule.schema {
            Some(schema) => schema.clone(),
            None => catalog.default_schema.clone(),
        };
        if !catalog.schemas.contains_key(&schema_name) {
            debug!("Skipping ignore rule: no schema '{}'", schema_name);
            return;
        }

        match (&rule.table, &rule.column) {
            (Some(table), None) => {
                let table = table.clone();
                let removed = catalog.remove_foreign_keys_for_table(&schema_name, &table);
                if let Some(schema) = catalog.schema_mut(&schema_name) {
                    if schema.tables.remove(&table).is_some() {
                        debug!(
                            "Ignoring table {} ({} dependent foreign keys removed)",
                            qualified(&schema_name, &table),
                            removed
                        );
                    }
                }
            }
            (Some(table), Some(column)) => {
                remove_column(catalog, &schema_name, table, column);
            }
            (None, Some(column)) => {
                let tables: Vec<String> = catalog
                    .schema(&schema_name)
                    .map(|s| s.tables.keys().cloned().collect())
                    .unwrap_or_default();
                for table in tables {
                    remove_column(catalog, &schema_name, &table, column);
                }
            }
            (None, None) => {}
        }
    }

    /// Physical catalog a rule applies to, or `None` when unresolvable.
    fn resolve_catalog(&self, model: &StorageModel, rule: &IgnoreRule) -> Option<String> {
        let logical = rule.database.as_deref().unwrap_or("");
        if self.config.is_multidatabase() {
            self.config.resolve_database(logical)
        } else if logical.is_empty() {
            model.single_catalog_name().map(str::to_string)
        } else {
            Some(logical.to_string())
        }
    }
}

/// Remove one column with everything that depends on it: foreign keys on
/// either end, then indexes keying or including it, then the column.
fn remove_column(catalog: &mut Catalog, schema: &str, table: &str, column: &str) {
    let exists = catalog
        .schema(schema)
        .and_then(|s| s.table(table))
        .map(|t| t.has_column(column))
        .unwrap_or(false);
    if !exists {
        return;
    }

    let removed_fks = catalog.remove_foreign_keys_for_column(schema, table, column);
    if let Some(t) = catalog
        .schema_mut(schema)
        .and_then(|s| s.tables.get_mut(table))
    {
        let removed_indexes = t.remove_indexes_containing(column);
        t.remove_column(column);
        debug!(
            "Ignoring column {}.{} ({} foreign keys, {} indexes removed)",
            qualified(schema, table),
            column,
            removed_fks,
            removed_indexes
        );
    }
}
