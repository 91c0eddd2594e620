//! The metadata record set persisted alongside the schema.
//!
//! Written at the end of the upgrading stage and re-read at the start of
//! the next run, where it drives the stored-version gate and hint
//! inference. The set is forward compatible: entries written by a newer
//! version of the engine survive a read-modify-write cycle untouched.

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Persisted name and version of one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Package name.
    pub name: String,

    /// Version recorded by the last successful upgrade.
    pub version: Version,
}

/// Everything the engine persists about the current model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataSet {
    /// Package records from the last successful upgrade.
    #[serde(default)]
    pub packages: Vec<PackageRecord>,

    /// Stable numeric identifier per full type name.
    #[serde(default)]
    pub type_ids: BTreeMap<String, u32>,

    /// JSON snapshot of the domain model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_snapshot: Option<String>,

    /// When the set was last written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Entries written by engine versions this one does not know about.
    #[serde(flatten)]
    pub extras: HashMap<String, Value>,
}

impl MetadataSet {
    /// Empty record set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored version of a package, if one was recorded.
    pub fn package_version(&self, name: &str) -> Option<&Version> {
        self.packages
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.version)
    }

    /// Record the current version of a package, replacing any older record.
    pub fn record_package(&mut self, name: impl Into<String>, version: Version) {
        let name = name.into();
        match self.packages.iter_mut().find(|p| p.name == name) {
            Some(record) => record.version = version,
            None => self.packages.push(PackageRecord { name, version }),
        }
    }

    /// Assign identifiers to types that do not have one yet. Existing
    /// assignments never change.
    pub fn assign_type_ids<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        let mut next = self.type_ids.values().copied().max().map_or(1, |m| m + 1);
        for name in names {
            if !self.type_ids.contains_key(name) {
                self.type_ids.insert(name.to_string(), next);
                next += 1;
            }
        }
    }

    /// Store a fresh domain-model snapshot and stamp the set.
    pub fn set_snapshot(&mut self, snapshot: String) {
        self.model_snapshot = Some(snapshot);
        self.updated_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_package_replaces_older_version() {
        let mut set = MetadataSet::new();
        set.record_package("app", Version::new(1, 0, 0));
        set.record_package("app", Version::new(1, 1, 0));
        set.record_package("plugin", Version::new(0, 3, 0));

        assert_eq!(set.packages.len(), 2);
        assert_eq!(set.package_version("app"), Some(&Version::new(1, 1, 0)));
        assert_eq!(set.package_version("missing"), None);
    }

    #[test]
    fn test_assign_type_ids_keeps_existing_assignments() {
        let mut set = MetadataSet::new();
        set.assign_type_ids(["App.Order", "App.Customer"]);
        let order_id = set.type_ids["App.Order"];
        let customer_id = set.type_ids["App.Customer"];
        assert_ne!(order_id, customer_id);

        set.assign_type_ids(["App.Customer", "App.Invoice"]);
        assert_eq!(set.type_ids["App.Order"], order_id);
        assert_eq!(set.type_ids["App.Customer"], customer_id);
        assert!(set.type_ids["App.Invoice"] > customer_id.max(order_id));
    }

    #[test]
    fn test_unknown_entries_survive_round_trip() {
        let json = r#"{
            "packages": [{"name": "app", "version": "1.2.3"}],
            "type_ids": {"App.Order": 1},
            "future_section": {"anything": true}
        }"#;
        let mut set: MetadataSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.package_version("app"), Some(&Version::new(1, 2, 3)));
        assert!(set.extras.contains_key("future_section"));

        set.record_package("plugin", Version::new(0, 1, 0));
        let rewritten = serde_json::to_string(&set).unwrap();
        let reread: MetadataSet = serde_json::from_str(&rewritten).unwrap();
        assert!(reread.extras.contains_key("future_section"));
        assert_eq!(reread.packages.len(), 2);
    }
}
