//! Configuration validation.

use super::UpgradeConfiguration;
use crate::error::{Result, UpgradeError};

/// Validate the configuration.
pub fn validate(config: &UpgradeConfiguration) -> Result<()> {
    if config.node_name.is_empty() {
        return Err(UpgradeError::Config("node_name is required".into()));
    }

    if config.default_database.is_some() && config.databases.is_empty() {
        return Err(UpgradeError::Config(
            "default_database requires at least one databases entry".into(),
        ));
    }

    for alias in &config.databases {
        if alias.name.is_empty() {
            return Err(UpgradeError::Config(
                "databases entries must have a non-empty name".into(),
            ));
        }
        if alias.physical_name.is_empty() {
            return Err(UpgradeError::Config(format!(
                "database '{}' must have a non-empty physical_name",
                alias.name
            )));
        }
    }
    for (i, alias) in config.databases.iter().enumerate() {
        if config.databases[..i].iter().any(|a| a.name == alias.name) {
            return Err(UpgradeError::Config(format!(
                "database '{}' is mapped more than once",
                alias.name
            )));
        }
    }

    for rule in &config.ignore_rules {
        if rule.table.is_none() && rule.column.is_none() {
            return Err(UpgradeError::Config(
                "ignore rule must name a table or a column".into(),
            ));
        }
    }

    Ok(())
}
