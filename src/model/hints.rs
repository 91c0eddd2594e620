//! Upgrade hints fed to the external differencer.
//!
//! Handlers contribute hints explicitly during `on_before_stage`; the registry
//! derives rename hints automatically from recycled types. The differencer
//! treats them as directives when comparing the extracted and target schemas.

use serde::{Deserialize, Serialize};

/// One renaming/copy/removal directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeHint {
    /// A persistent type was renamed between versions.
    RenameType { old: String, new: String },

    /// A field was renamed within a persistent type.
    RenameField {
        type_name: String,
        old: String,
        new: String,
    },

    /// A persistent type was removed; its storage may be dropped.
    RemoveType { name: String },

    /// A field was removed; its column may be dropped.
    RemoveField { type_name: String, field: String },

    /// Data should be copied between columns during the upgrade.
    CopyField { source: String, target: String },
}

impl std::fmt::Display for UpgradeHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpgradeHint::RenameType { old, new } => write!(f, "rename type {} -> {}", old, new),
            UpgradeHint::RenameField {
                type_name,
                old,
                new,
            } => write!(f, "rename field {}.{} -> {}", type_name, old, new),
            UpgradeHint::RemoveType { name } => write!(f, "remove type {}", name),
            UpgradeHint::RemoveField { type_name, field } => {
                write!(f, "remove field {}.{}", type_name, field)
            }
            UpgradeHint::CopyField { source, target } => {
                write!(f, "copy field {} -> {}", source, target)
            }
        }
    }
}

/// Ordered hint collection for one stage, plus the flags hint processing
/// produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HintSet {
    /// Hints in contribution order.
    pub hints: Vec<UpgradeHint>,

    /// Set when hint processing found type-identifier changes that structural
    /// comparison alone would not reveal. Read by the ValidateExact policy.
    #[serde(default)]
    pub has_suspicious_type_changes: bool,
}

impl HintSet {
    /// Create an empty hint set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hint.
    pub fn add(&mut self, hint: UpgradeHint) {
        self.hints.push(hint);
    }

    /// Append several hints, preserving order.
    pub fn extend(&mut self, hints: impl IntoIterator<Item = UpgradeHint>) {
        self.hints.extend(hints);
    }

    /// Flag suspicious type-identifier changes.
    pub fn mark_suspicious(&mut self) {
        self.has_suspicious_type_changes = true;
    }

    /// Number of hints.
    pub fn len(&self) -> usize {
        self.hints.len()
    }

    /// Whether the set holds no hints.
    pub fn is_empty(&self) -> bool {
        self.hints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_display() {
        let hint = UpgradeHint::RenameType {
            old: "App.Model.Client".into(),
            new: "App.Model.Customer".into(),
        };
        assert_eq!(
            hint.to_string(),
            "rename type App.Model.Client -> App.Model.Customer"
        );

        let hint = UpgradeHint::RenameField {
            type_name: "App.Model.Customer".into(),
            old: "Phone".into(),
            new: "PhoneNumber".into(),
        };
        assert_eq!(
            hint.to_string(),
            "rename field App.Model.Customer.Phone -> PhoneNumber"
        );
    }

    #[test]
    fn test_hint_set_defaults() {
        let mut set = HintSet::new();
        assert!(set.is_empty());
        assert!(!set.has_suspicious_type_changes);

        set.add(UpgradeHint::RemoveType {
            name: "App.Model.Obsolete".into(),
        });
        set.mark_suspicious();
        assert_eq!(set.len(), 1);
        assert!(set.has_suspicious_type_changes);
    }
}
