//! Configuration type definitions.

use serde::{Deserialize, Serialize};

/// User-facing schema reconciliation mode.
///
/// The mode selects which stages an upgrade runs and which
/// [`ReconciliationPolicy`](crate::policy::ReconciliationPolicy) governs
/// each of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeMode {
    /// Trust the database as-is. No comparison, no changes.
    Skip,
    /// Require the database to match the model exactly.
    Validate,
    /// Trust a legacy database without comparing.
    LegacySkip,
    /// Require the database to be compatible in legacy mode.
    LegacyValidate,
    /// Drop everything the model covers and rebuild from scratch.
    Recreate,
    /// Upgrade the schema, permitting destructive actions.
    Perform,
    /// Upgrade the schema, refusing any action that can lose data.
    #[default]
    PerformSafely,
}

impl UpgradeMode {
    /// Whether this mode runs the intermediate upgrading stage.
    pub fn requires_upgrading_stage(&self) -> bool {
        matches!(self, UpgradeMode::Perform | UpgradeMode::PerformSafely)
    }

    /// Whether this mode treats the database as a legacy schema.
    pub fn is_legacy(&self) -> bool {
        matches!(self, UpgradeMode::LegacySkip | UpgradeMode::LegacyValidate)
    }
}

/// Marks a database object the upgrade engine must not see or touch.
///
/// A rule with a `column` removes matching columns (plus dependent
/// indexes and foreign keys); a rule without one removes whole tables
/// (plus inbound foreign keys). Omitted parts act as wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreRule {
    /// Logical database the rule applies to. Empty or omitted means the
    /// default database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Schema the rule applies to. Omitted means the catalog's default
    /// schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Table name. Omitted means every table in the schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Column name. Omitted means the whole table is ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl IgnoreRule {
    /// Rule that hides a whole table.
    pub fn table(name: impl Into<String>) -> Self {
        IgnoreRule {
            table: Some(name.into()),
            ..Default::default()
        }
    }

    /// Rule that hides one column of a table.
    pub fn column(table: impl Into<String>, column: impl Into<String>) -> Self {
        IgnoreRule {
            table: Some(table.into()),
            column: Some(column.into()),
            ..Default::default()
        }
    }

    /// Restrict the rule to a logical database.
    pub fn in_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Restrict the rule to a schema.
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

/// Maps a logical database name to the physical catalog that backs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseAlias {
    /// Logical name used by persistent types and ignore rules.
    pub name: String,
    /// Physical catalog name in the storage.
    pub physical_name: String,
}

/// Root configuration for an upgrade run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeConfiguration {
    /// Reconciliation mode. Defaults to `perform_safely`.
    #[serde(default)]
    pub mode: UpgradeMode,
    /// Name of the storage node this run targets.
    #[serde(default = "default_node_name")]
    pub node_name: String,
    /// Run schema extraction and the final-stage model build on
    /// background tasks while the upgrading stage proceeds.
    #[serde(default = "default_build_in_parallel")]
    pub build_in_parallel: bool,
    /// Logical name of the default database in multidatabase setups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_database: Option<String>,
    /// Default schema for rules that do not name one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_schema: Option<String>,
    /// Logical-to-physical database mappings. Non-empty enables
    /// multidatabase resolution.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub databases: Vec<DatabaseAlias>,
    /// Structures the upgrade engine must not see or touch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore_rules: Vec<IgnoreRule>,
}

impl Default for UpgradeConfiguration {
    fn default() -> Self {
        UpgradeConfiguration {
            mode: UpgradeMode::default(),
            node_name: default_node_name(),
            build_in_parallel: default_build_in_parallel(),
            default_database: None,
            default_schema: None,
            databases: Vec::new(),
            ignore_rules: Vec::new(),
        }
    }
}

impl UpgradeConfiguration {
    /// Whether logical database names need alias resolution.
    pub fn is_multidatabase(&self) -> bool {
        !self.databases.is_empty()
    }

    /// Physical catalog name for a logical database name, or `None` when
    /// the name cannot be resolved.
    ///
    /// An empty logical name stands for the default database. Names
    /// without an explicit mapping resolve to themselves.
    pub fn resolve_database(&self, logical: &str) -> Option<String> {
        let logical = if logical.is_empty() {
            self.default_database.as_deref()?
        } else {
            logical
        };
        let physical = self
            .databases
            .iter()
            .find(|alias| alias.name == logical)
            .map(|alias| alias.physical_name.as_str())
            .unwrap_or(logical);
        Some(physical.to_string())
    }
}

fn default_node_name() -> String {
    "default".to_string()
}

fn default_build_in_parallel() -> bool {
    true
}
